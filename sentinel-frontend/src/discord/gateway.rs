//! Gateway websocket: presence updates out, reaction events in.
//!
//! One session at a time. Any disconnect, reconnect request or invalid
//! session ends the session; the outer loop waits and identifies again,
//! sending the latest presence with the identify payload.

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use sentinel_backend::rating::{ReactionEvent, ReactionIntake};
use sentinel_common::Presence;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_PRESENCE_UPDATE: u8 = 3;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// GUILDS | GUILD_MESSAGE_REACTIONS
pub const INTENTS: u64 = 1 | (1 << 10);

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const REACTION_QUEUE_SIZE: usize = 256;

#[derive(Deserialize, Debug)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

fn presence_data(presence: &Presence) -> Value {
    json!({
        "since": null,
        "activities": [{
            "name": presence.text,
            "type": presence.activity.code(),
        }],
        "status": presence.status.as_str(),
        "afk": false,
    })
}

pub fn presence_payload(presence: &Presence) -> Value {
    json!({ "op": OP_PRESENCE_UPDATE, "d": presence_data(presence) })
}

pub fn identify_payload(token: &str, presence: Option<&Presence>) -> Value {
    let mut d = json!({
        "token": token,
        "intents": INTENTS,
        "properties": {
            "os": std::env::consts::OS,
            "browser": "sentinel",
            "device": "sentinel",
        },
    });
    if let Some(presence) = presence {
        d["presence"] = presence_data(presence);
    }
    json!({ "op": OP_IDENTIFY, "d": d })
}

/// Custom emojis come out as `name:id`, the form the REST API expects
pub fn parse_reaction_add(d: &Value) -> Option<ReactionEvent> {
    let field = |key: &str| d.get(key).and_then(Value::as_str).map(str::to_string);

    let emoji = d.get("emoji")?;
    let name = emoji.get("name").and_then(Value::as_str)?;
    let emoji = match emoji.get("id").and_then(Value::as_str) {
        Some(id) => format!("{}:{}", name, id),
        None => name.to_string(),
    };

    let member = d.get("member");
    let user_is_bot = member
        .and_then(|m| m.pointer("/user/bot"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let member_roles = member
        .and_then(|m| m.get("roles"))
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });

    Some(ReactionEvent {
        channel_id: field("channel_id")?,
        message_id: field("message_id")?,
        guild_id: field("guild_id"),
        user_id: field("user_id")?,
        emoji,
        user_is_bot,
        member_roles,
    })
}

pub struct Gateway {
    url: String,
    token: String,
    presence_rx: watch::Receiver<Option<Presence>>,
    reactions_tx: Option<mpsc::Sender<ReactionEvent>>,
}

impl Gateway {
    pub fn new(
        url: &str,
        token: &str,
        presence_rx: watch::Receiver<Option<Presence>>,
        reactions_tx: Option<mpsc::Sender<ReactionEvent>>,
    ) -> Self {
        Self {
            url: url.to_string(),
            token: token.to_string(),
            presence_rx,
            reactions_tx,
        }
    }

    /// Keep a session alive forever
    pub fn start(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.run_session().await {
                    Ok(()) => tracing::warn!(
                        "Gateway session ended, reconnecting in {}s",
                        RECONNECT_DELAY.as_secs()
                    ),
                    Err(e) => tracing::error!(
                        "Gateway session failed: {:#}. Reconnecting in {}s",
                        e,
                        RECONNECT_DELAY.as_secs()
                    ),
                }
                sleep(RECONNECT_DELAY).await;
            }
        })
    }

    async fn run_session(&mut self) -> Result<()> {
        tracing::info!("Connecting to gateway {}", self.url);
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .context("Failed to connect to gateway")?;
        let (mut sink, mut stream) = socket.split();

        let hello = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => break serde_json::from_str::<GatewayPayload>(&text)?,
                Some(Ok(Message::Close(_))) | None => bail!("Gateway closed before Hello"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        };
        if hello.op != OP_HELLO {
            bail!("Expected Hello, got op {}", hello.op);
        }
        let interval_ms = hello
            .d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .context("Hello without heartbeat_interval")?;

        let presence = self.presence_rx.borrow_and_update().clone();
        let identify = identify_payload(&self.token, presence.as_ref());
        sink.send(Message::Text(identify.to_string())).await?;
        tracing::info!("Identified with gateway (heartbeat {} ms)", interval_ms);

        let period = Duration::from_millis(interval_ms.max(1));
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        let mut seq: Option<u64> = None;
        // A beat still unacknowledged at the next tick means a zombied connection
        let mut ack_pending = false;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if ack_pending {
                        tracing::warn!("Heartbeat not acknowledged, dropping the connection");
                        return Ok(());
                    }
                    let beat = json!({ "op": OP_HEARTBEAT, "d": seq });
                    sink.send(Message::Text(beat.to_string())).await?;
                    ack_pending = true;
                }
                changed = self.presence_rx.changed() => {
                    if changed.is_err() {
                        bail!("Presence channel closed");
                    }
                    let presence = self.presence_rx.borrow_and_update().clone();
                    if let Some(presence) = presence {
                        tracing::debug!("Sending presence: {}", presence.text);
                        sink.send(Message::Text(presence_payload(&presence).to_string())).await?;
                    }
                }
                next = stream.next() => {
                    let text = match next {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            tracing::warn!("Gateway closed the connection: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!("Unparseable gateway payload: {}", e);
                            continue;
                        }
                    };
                    if payload.s.is_some() {
                        seq = payload.s;
                    }

                    match payload.op {
                        OP_DISPATCH => self.dispatch(payload.t.as_deref(), &payload.d),
                        OP_HEARTBEAT => {
                            let beat = json!({ "op": OP_HEARTBEAT, "d": seq });
                            sink.send(Message::Text(beat.to_string())).await?;
                        }
                        OP_HEARTBEAT_ACK => {
                            tracing::trace!("Heartbeat acknowledged");
                            ack_pending = false;
                        }
                        OP_RECONNECT => {
                            tracing::info!("Gateway asked for a reconnect");
                            return Ok(());
                        }
                        OP_INVALID_SESSION => {
                            tracing::warn!("Gateway reported an invalid session");
                            return Ok(());
                        }
                        other => tracing::debug!("Ignoring gateway op {}", other),
                    }
                }
            }
        }
    }

    fn dispatch(&self, event: Option<&str>, d: &Value) {
        match event {
            Some("READY") => tracing::info!(
                "Gateway ready as {}",
                d.pointer("/user/username").and_then(serde_json::Value::as_str).unwrap_or("?")
            ),
            Some("MESSAGE_REACTION_ADD") => {
                let Some(tx) = &self.reactions_tx else {
                    return;
                };
                match parse_reaction_add(d) {
                    Some(event) => {
                        if tx.try_send(event).is_err() {
                            tracing::warn!("Reaction queue full or closed, dropping event");
                        }
                    }
                    None => tracing::warn!("Malformed MESSAGE_REACTION_ADD: {}", d),
                }
            }
            Some(other) => tracing::trace!("Unhandled dispatch {}", other),
            None => {}
        }
    }
}

/// Feed gateway reactions into the rating intake, one task per event
pub fn spawn_reaction_dispatch(
    intake: Arc<ReactionIntake>,
    mut reactions_rx: mpsc::Receiver<ReactionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = reactions_rx.recv().await {
            let intake = intake.clone();
            tokio::spawn(async move {
                let message_id = event.message_id.clone();
                let outcome = intake.handle(event).await;
                tracing::debug!("Reaction on {}: {:?}", message_id, outcome);
            });
        }
        tracing::warn!("Reaction queue closed");
    })
}
