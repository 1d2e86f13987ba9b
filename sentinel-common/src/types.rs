use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One connected player as reported by the query or the roster export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub score: i32,
    /// Seconds connected
    pub time_secs: f32,
}

impl PlayerInfo {
    /// Player with no performance stats (the roster export carries none)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: 0,
            time_secs: 0.0,
        }
    }
}

/// Result of one game-server query.
///
/// An unreachable snapshot carries nothing but `reachable = false`; there is
/// no partially successful state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub reachable: bool,
    pub server_name: String,
    pub current_players: u32,
    pub max_players: u32,
    /// Compact identifier legacy clients use for mode + slots + mission name,
    /// e.g. "CO40_Liberation"
    pub raw_game_string: String,
    pub map_name: Option<String>,
    /// Order as reported by the source
    pub players: Vec<PlayerInfo>,
}

impl ServerSnapshot {
    pub fn unreachable() -> Self {
        Self::default()
    }
}

/// One field of a rich status message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Structured visual payload published to the status channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Presence status shown next to the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresenceStatus {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "dnd")]
    Dnd,
    #[serde(rename = "idle")]
    Idle,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Dnd => "dnd",
            PresenceStatus::Idle => "idle",
        }
    }
}

/// Activity verb of the presence line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Playing,
    Streaming,
    Watching,
}

impl ActivityKind {
    /// Numeric activity type used on the wire
    pub fn code(&self) -> u8 {
        match self {
            ActivityKind::Playing => 0,
            ActivityKind::Streaming => 1,
            ActivityKind::Watching => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub status: PresenceStatus,
    pub activity: ActivityKind,
    pub text: String,
}

impl Presence {
    pub fn new(status: PresenceStatus, activity: ActivityKind, text: impl Into<String>) -> Self {
        Self {
            status,
            activity,
            text: text.into(),
        }
    }
}

/// A single rating vote on a tracked content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingValue {
    #[serde(rename = "positive")]
    Positive,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "negative")]
    Negative,
}

impl RatingValue {
    pub const ALL: [RatingValue; 3] = [
        RatingValue::Positive,
        RatingValue::Neutral,
        RatingValue::Negative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RatingValue::Positive => "positive",
            RatingValue::Neutral => "neutral",
            RatingValue::Negative => "negative",
        }
    }

    /// Reaction symbol that casts this vote
    pub fn emoji(&self) -> &'static str {
        match self {
            RatingValue::Positive => "👍",
            RatingValue::Neutral => "🆗",
            RatingValue::Negative => "👎",
        }
    }

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.emoji() == emoji)
    }
}

impl std::fmt::Display for RatingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
