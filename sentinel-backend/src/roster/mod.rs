//! Roster enrichment from the server's admin stats export.
//!
//! The query protocol does not report player names or the loaded mission
//! for this game, so both are read from a JSON file the server writes:
//!
//! ```json
//! { "connected_players": { "1": "alpha", "2": "bravo" }, "mission": "Conflict" }
//! ```
//!
//! Display names are the map *values*. Any entry that is not a plain
//! string fails the whole cycle.

use sentinel_common::{PlayerInfo, ServerSnapshot};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::RosterError;

/// Query snapshot with the side-channel roster applied
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSnapshot {
    pub snapshot: ServerSnapshot,
    pub active_mission: Option<String>,
}

impl EnrichedSnapshot {
    /// Snapshot used as-is, without a side channel
    pub fn plain(snapshot: ServerSnapshot) -> Self {
        Self {
            snapshot,
            active_mission: None,
        }
    }

    pub fn unreachable() -> Self {
        Self::plain(ServerSnapshot::unreachable())
    }

    pub fn is_reachable(&self) -> bool {
        self.snapshot.reachable
    }
}

/// Parsed admin stats export
#[derive(Debug, Clone, PartialEq)]
pub struct RosterExport {
    pub players: Vec<String>,
    pub mission: Option<String>,
}

pub struct RosterEnricher {
    export_path: PathBuf,
}

impl RosterEnricher {
    pub fn new(export_path: impl AsRef<Path>) -> Self {
        Self {
            export_path: export_path.as_ref().to_path_buf(),
        }
    }

    /// Replace the snapshot's roster with the exported one.
    ///
    /// Only meaningful for reachable snapshots; the caller checks.
    pub async fn enrich(&self, snapshot: ServerSnapshot) -> Result<EnrichedSnapshot, RosterError> {
        let content = tokio::fs::read_to_string(&self.export_path)
            .await
            .map_err(|source| RosterError::Io {
                path: self.export_path.display().to_string(),
                source,
            })?;
        let export = parse_roster_export(&content)?;

        tracing::debug!(
            "Roster export: {} players, mission {:?}",
            export.players.len(),
            export.mission
        );

        let players: Vec<PlayerInfo> = export.players.into_iter().map(PlayerInfo::named).collect();
        Ok(EnrichedSnapshot {
            snapshot: ServerSnapshot {
                current_players: players.len() as u32,
                players,
                ..snapshot
            },
            active_mission: export.mission,
        })
    }
}

pub fn parse_roster_export(json: &str) -> Result<RosterExport, RosterError> {
    let root: Value = serde_json::from_str(json)?;

    let connected = root
        .get("connected_players")
        .ok_or(RosterError::MissingField("connected_players"))?
        .as_object()
        .ok_or(RosterError::InvalidField("connected_players"))?;

    let players = connected
        .iter()
        .map(|(key, value)| match value {
            Value::String(name) => Ok(name.clone()),
            _ => Err(RosterError::NonStringPlayer { key: key.clone() }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mission = match root.get("mission") {
        None | Some(Value::Null) => None,
        Some(Value::String(mission)) => Some(mission.clone()),
        Some(_) => return Err(RosterError::InvalidField("mission")),
    };

    Ok(RosterExport { players, mission })
}
