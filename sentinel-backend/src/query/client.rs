use async_trait::async_trait;
use sentinel_common::{PlayerInfo, ServerSnapshot};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::a2s::{self, InfoResponse, Reply};
use crate::config::GameServerConfig;
use crate::error::QueryError;

/// Largest single A2S datagram we accept
const MAX_PACKET: usize = 4096;
/// A server may answer with a fresh challenge more than once
const MAX_CHALLENGE_ROUNDS: usize = 3;

/// Anything that can produce a snapshot of the game server
#[async_trait]
pub trait ServerQuery: Send + Sync {
    /// Never fails: errors surface as `reachable = false`
    async fn query(&self) -> ServerSnapshot;
}

pub struct GameQueryClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl GameQueryClient {
    pub fn new(config: &GameServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }

    /// Resolve, INFO and PLAYER all share one deadline
    async fn try_query(&self) -> Result<ServerSnapshot, QueryError> {
        let deadline = Instant::now() + self.timeout;

        let (socket, info) = tokio::time::timeout_at(deadline, async {
            let addr = resolve(&self.host, self.port).await?;
            let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
            let socket = UdpSocket::bind(bind_addr).await?;
            socket.connect(addr).await?;

            let info = exchange(&socket, a2s::info_request, a2s::parse_info).await?;
            Ok::<_, QueryError>((socket, info))
        })
        .await
        .map_err(|_| QueryError::Timeout(self.timeout.as_secs()))??;

        // The roster is optional; a server that hides it is still online
        let players = match tokio::time::timeout_at(
            deadline,
            exchange(&socket, a2s::player_request, a2s::parse_players),
        )
        .await
        {
            Ok(Ok(players)) => players,
            Ok(Err(e)) => {
                tracing::debug!("Player list query failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                tracing::debug!("Player list query ran out of time");
                Vec::new()
            }
        };

        Ok(snapshot_from(info, players))
    }
}

#[async_trait]
impl ServerQuery for GameQueryClient {
    async fn query(&self) -> ServerSnapshot {
        match self.try_query().await {
            Ok(snapshot) => {
                tracing::debug!(
                    "Queried {}:{} - '{}' {}/{} players",
                    self.host,
                    self.port,
                    snapshot.server_name,
                    snapshot.current_players,
                    snapshot.max_players
                );
                snapshot
            }
            Err(e) => {
                tracing::warn!("Game server {}:{} is unreachable: {}", self.host, self.port, e);
                ServerSnapshot::unreachable()
            }
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, QueryError> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| QueryError::Malformed(format!("no address for {}", host)))
}

/// Send a request and follow challenge replies until the payload arrives
async fn exchange<T>(
    socket: &UdpSocket,
    build: fn(Option<[u8; 4]>) -> Vec<u8>,
    parse: fn(&[u8]) -> Result<Reply<T>, QueryError>,
) -> Result<T, QueryError> {
    let mut buf = [0u8; MAX_PACKET];
    let mut challenge = None;

    for _ in 0..MAX_CHALLENGE_ROUNDS {
        socket.send(&build(challenge)).await?;
        let len = socket.recv(&mut buf).await?;
        match parse(&buf[..len])? {
            Reply::Payload(payload) => return Ok(payload),
            Reply::Challenge(value) => challenge = Some(value),
        }
    }

    Err(QueryError::Malformed(
        "server kept answering with challenges".to_string(),
    ))
}

fn snapshot_from(info: InfoResponse, players: Vec<PlayerInfo>) -> ServerSnapshot {
    ServerSnapshot {
        reachable: true,
        server_name: info.name,
        current_players: info.players as u32,
        max_players: info.max_players as u32,
        raw_game_string: info.game,
        map_name: Some(info.map).filter(|m| !m.is_empty()),
        players,
    }
}
