use anyhow::Context;
use serde::{Deserialize, Serialize};

use sentinel_backend::config::{GameServerConfig, RatingConfig, StatusConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: String,

    /// Channel holding the status message
    pub status_channel_id: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

/// Control API listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3110
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl ApiConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub discord: DiscordConfig,

    pub game_server: GameServerConfig,

    #[serde(default)]
    pub status: StatusConfig,

    /// Reaction voting is off without this section
    #[serde(default)]
    pub rating: Option<RatingConfig>,

    #[serde(default)]
    pub api: ApiConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        if let Some(rating) = &config.rating {
            rating.entry_ttl().context("Invalid [rating] section")?;
        }
        Ok(config)
    }
}
