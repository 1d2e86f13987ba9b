//! Discord REST v10: status message, reactions and member lookups.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use sentinel_backend::error::SurfaceError;
use sentinel_backend::surface::{EditOutcome, ReactionSurface, StatusSurface};
use sentinel_common::{Embed, Presence};

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize, Debug)]
struct WireEmbedField<'a> {
    name: &'a str,
    value: &'a str,
    inline: bool,
}

#[derive(Serialize, Debug)]
struct WireThumbnail<'a> {
    url: &'a str,
}

#[derive(Serialize, Debug)]
struct WireEmbed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    fields: Vec<WireEmbedField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<WireThumbnail<'a>>,
    timestamp: String,
}

impl<'a> From<&'a Embed> for WireEmbed<'a> {
    fn from(embed: &'a Embed) -> Self {
        Self {
            title: &embed.title,
            description: &embed.description,
            color: embed.color,
            fields: embed
                .fields
                .iter()
                .map(|f| WireEmbedField {
                    name: &f.name,
                    value: &f.value,
                    inline: f.inline,
                })
                .collect(),
            thumbnail: embed.thumbnail.as_deref().map(|url| WireThumbnail { url }),
            timestamp: embed.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Serialize, Debug)]
struct MessageBody<'a> {
    embeds: [WireEmbed<'a>; 1],
}

#[derive(Deserialize, Debug)]
struct CreatedMessage {
    id: String,
}

#[derive(Deserialize, Debug)]
struct GuildMember {
    #[serde(default)]
    roles: Vec<String>,
}

/// Thin authenticated client over the REST API
pub struct DiscordRest {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordRest {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("DiscordBot (sentinel, 0.1)")
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, SurfaceError> {
        builder
            .send()
            .await
            .map_err(|e| SurfaceError::Http(e.to_string()))
    }

    pub async fn create_message(&self, channel_id: &str, embed: &Embed) -> Result<String> {
        let body = MessageBody {
            embeds: [WireEmbed::from(embed)],
        };
        let resp = self
            .send(self.request(Method::POST, &format!("/channels/{}/messages", channel_id)).json(&body))
            .await?;
        let resp = ensure_success(resp).await?;

        let created: CreatedMessage = resp.json().await?;
        tracing::debug!("Created message {} in channel {}", created.id, channel_id);
        Ok(created.id)
    }

    pub async fn edit_message(&self, channel_id: &str, message_id: &str, embed: &Embed) -> Result<EditOutcome> {
        let body = MessageBody {
            embeds: [WireEmbed::from(embed)],
        };
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        let resp = self.send(self.request(Method::PATCH, &path).json(&body)).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(EditOutcome::NotFound);
        }
        ensure_success(resp).await?;
        Ok(EditOutcome::Edited)
    }

    /// A message that is already gone counts as deleted
    pub async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        let resp = self.send(self.request(Method::DELETE, &path)).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::warn!("Message {} was already deleted", message_id);
            return Ok(());
        }
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn put_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        let path = format!(
            "/channels/{}/messages/{}/reactions/{}/@me",
            channel_id,
            message_id,
            urlencoding::encode(emoji)
        );
        let resp = self.send(self.request(Method::PUT, &path)).await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn delete_user_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<()> {
        let path = format!(
            "/channels/{}/messages/{}/reactions/{}/{}",
            channel_id,
            message_id,
            urlencoding::encode(emoji),
            user_id
        );
        let resp = self.send(self.request(Method::DELETE, &path)).await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn guild_member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>> {
        let path = format!("/guilds/{}/members/{}", guild_id, user_id);
        let resp = self.send(self.request(Method::GET, &path)).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(SurfaceError::NotFound(format!("member {} of guild {}", user_id, guild_id)).into());
        }
        let member: GuildMember = ensure_success(resp).await?.json().await?;
        Ok(member.roles)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, SurfaceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SurfaceError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Status channel plus the presence handed to the gateway
pub struct DiscordStatusSurface {
    rest: Arc<DiscordRest>,
    channel_id: String,
    presence_tx: watch::Sender<Option<Presence>>,
}

impl DiscordStatusSurface {
    pub fn new(rest: Arc<DiscordRest>, channel_id: &str, presence_tx: watch::Sender<Option<Presence>>) -> Self {
        Self {
            rest,
            channel_id: channel_id.to_string(),
            presence_tx,
        }
    }
}

#[async_trait]
impl StatusSurface for DiscordStatusSurface {
    async fn publish(&self, embed: &Embed) -> Result<String> {
        self.rest.create_message(&self.channel_id, embed).await
    }

    async fn edit(&self, message_id: &str, embed: &Embed) -> Result<EditOutcome> {
        self.rest.edit_message(&self.channel_id, message_id, embed).await
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        self.rest.delete_message(&self.channel_id, message_id).await
    }

    /// Queued for the gateway, which also replays it after reconnecting
    async fn set_presence(&self, presence: &Presence) -> Result<()> {
        self.presence_tx.send_replace(Some(presence.clone()));
        Ok(())
    }
}

#[async_trait]
impl ReactionSurface for DiscordRest {
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        self.put_reaction(channel_id, message_id, emoji).await
    }

    async fn remove_reaction(&self, channel_id: &str, message_id: &str, emoji: &str, user_id: &str) -> Result<()> {
        self.delete_user_reaction(channel_id, message_id, emoji, user_id).await
    }

    async fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>> {
        self.guild_member_roles(guild_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{delete, get, patch, post, put},
        Json, Router,
    };
    use chrono::{TimeZone, Utc};
    use sentinel_common::EmbedField;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded {
        requests: Mutex<Vec<String>>,
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    async fn fake_discord() -> (String, Arc<Recorded>) {
        let recorded = Arc::new(Recorded::default());

        async fn create(
            State(rec): State<Arc<Recorded>>,
            headers: HeaderMap,
            Path(channel): Path<String>,
            Json(body): Json<serde_json::Value>,
        ) -> Result<Json<serde_json::Value>, AxumStatus> {
            if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bot t0ken") {
                return Err(AxumStatus::UNAUTHORIZED);
            }
            rec.requests.lock().unwrap().push(format!("POST {}", channel));
            rec.bodies.lock().unwrap().push(body);
            Ok(Json(serde_json::json!({"id": "900"})))
        }

        async fn edit(Path((_, message)): Path<(String, String)>) -> AxumStatus {
            if message == "gone" {
                AxumStatus::NOT_FOUND
            } else {
                AxumStatus::OK
            }
        }

        async fn remove(
            State(rec): State<Arc<Recorded>>,
            Path((_, _, emoji, user)): Path<(String, String, String, String)>,
        ) -> AxumStatus {
            rec.requests.lock().unwrap().push(format!("DELETE {} {}", emoji, user));
            AxumStatus::NO_CONTENT
        }

        async fn react(Path((_, _, emoji)): Path<(String, String, String)>) -> AxumStatus {
            if emoji == "👍" {
                AxumStatus::NO_CONTENT
            } else {
                AxumStatus::BAD_REQUEST
            }
        }

        async fn member(Path((_, user)): Path<(String, String)>) -> Result<Json<serde_json::Value>, AxumStatus> {
            if user == "stranger" {
                return Err(AxumStatus::NOT_FOUND);
            }
            Ok(Json(serde_json::json!({"roles": ["7", "8"], "nick": null})))
        }

        let app = Router::new()
            .route("/channels/{channel}/messages", post(create))
            .route(
                "/channels/{channel}/messages/{message}",
                patch(edit).delete(|| async { AxumStatus::NOT_FOUND }),
            )
            .route("/channels/{channel}/messages/{message}/reactions/{emoji}/@me", put(react))
            .route(
                "/channels/{channel}/messages/{message}/reactions/{emoji}/{user}",
                delete(remove),
            )
            .route("/guilds/{guild}/members/{user}", get(member))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), recorded)
    }

    fn embed() -> Embed {
        Embed {
            title: "GC Reforger".to_string(),
            description: "──".to_string(),
            color: 0x2ECC71,
            fields: vec![EmbedField::new("Status", "Online", false)],
            thumbnail: Some("https://example.org/t.png".to_string()),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_message_sends_embed_and_returns_id() {
        let (base, recorded) = fake_discord().await;
        let rest = DiscordRest::new(&base, "t0ken").unwrap();

        let id = rest.create_message("100", &embed()).await.unwrap();

        assert_eq!(id, "900");
        let body = recorded.bodies.lock().unwrap()[0].clone();
        assert_eq!(body["embeds"][0]["title"], "GC Reforger");
        assert_eq!(body["embeds"][0]["fields"][0]["inline"], false);
        assert_eq!(body["embeds"][0]["thumbnail"]["url"], "https://example.org/t.png");
        assert_eq!(body["embeds"][0]["timestamp"], "2026-03-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn test_wrong_token_is_a_status_error() {
        let (base, _) = fake_discord().await;
        let rest = DiscordRest::new(&base, "nope").unwrap();

        let err = rest.create_message("100", &embed()).await.unwrap_err();
        let surface = err.downcast_ref::<SurfaceError>().unwrap();
        assert!(matches!(surface, SurfaceError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_edit_missing_message_is_not_found() {
        let (base, _) = fake_discord().await;
        let rest = DiscordRest::new(&base, "t0ken").unwrap();

        assert_eq!(rest.edit_message("100", "1", &embed()).await.unwrap(), EditOutcome::Edited);
        assert_eq!(
            rest.edit_message("100", "gone", &embed()).await.unwrap(),
            EditOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_delete_of_missing_message_succeeds() {
        let (base, _) = fake_discord().await;
        let rest = DiscordRest::new(&base, "t0ken").unwrap();
        assert!(rest.delete_message("100", "1").await.is_ok());
    }

    #[tokio::test]
    async fn test_reaction_emoji_is_percent_encoded() {
        let (base, recorded) = fake_discord().await;
        let rest = DiscordRest::new(&base, "t0ken").unwrap();

        rest.add_reaction("100", "5", "👍").await.unwrap();
        rest.remove_reaction("100", "5", "🆗", "42").await.unwrap();

        assert_eq!(*recorded.requests.lock().unwrap(), vec!["DELETE 🆗 42"]);
    }

    #[tokio::test]
    async fn test_member_roles() {
        let (base, _) = fake_discord().await;
        let rest = DiscordRest::new(&base, "t0ken").unwrap();

        assert_eq!(rest.member_roles("g", "42").await.unwrap(), vec!["7", "8"]);
        let err = rest.member_roles("g", "stranger").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SurfaceError>(),
            Some(SurfaceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_presence_goes_to_watch_channel() {
        let rest = Arc::new(DiscordRest::new("http://127.0.0.1:9", "t0ken").unwrap());
        let (tx, rx) = watch::channel(None);
        let surface = DiscordStatusSurface::new(rest, "100", tx);

        let presence = Presence::new(
            sentinel_common::PresenceStatus::Idle,
            sentinel_common::ActivityKind::Watching,
            "maintenance",
        );
        surface.set_presence(&presence).await.unwrap();

        assert_eq!(*rx.borrow(), Some(presence));
    }
}
