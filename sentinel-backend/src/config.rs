//! Configuration sections owned by the core.
//!
//! The frontend embeds these in its top-level config file; each section
//! fills its own defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServerConfig {
    pub host: String,

    pub port: u16,

    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Admin stats export with the connected players and active mission
    #[serde(default)]
    pub roster_export_path: Option<PathBuf>,
}

fn default_query_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_display_name")]
    pub display_name: String,

    #[serde(default)]
    pub thumbnail_url: Option<String>,

    /// Role pinged on the offline embed
    #[serde(default)]
    pub admin_role_id: Option<String>,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_display_name() -> String {
    "Arma Reforger Server".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("data/display_state.json")
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            display_name: default_display_name(),
            thumbnail_url: None,
            admin_role_id: None,
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConfig {
    /// Base URL of the system that stores ratings
    pub endpoint_base: String,

    pub api_secret: String,

    #[serde(default = "default_rating_timeout_secs")]
    pub timeout_secs: u64,

    /// Role a voter must hold; unset admits every guild member
    #[serde(default)]
    pub member_role_id: Option<String>,

    /// Tracked messages older than this stop accepting votes; unset keeps
    /// them until restart
    #[serde(default)]
    pub entry_ttl_hours: Option<u64>,
}

impl RatingConfig {
    /// `entry_ttl_hours` as a duration; values chrono cannot represent are
    /// rejected
    pub fn entry_ttl(&self) -> anyhow::Result<Option<chrono::Duration>> {
        self.entry_ttl_hours
            .map(|hours| {
                i64::try_from(hours)
                    .ok()
                    .and_then(chrono::Duration::try_hours)
                    .ok_or_else(|| anyhow::anyhow!("entry_ttl_hours {} is out of range", hours))
            })
            .transpose()
    }
}

fn default_rating_timeout_secs() -> u64 {
    5
}
