//! Status embed and presence rendering.
//!
//! Pure functions of a [`ClassifiedStatus`]; the only input besides the
//! status is the render timestamp.

use chrono::{DateTime, Utc};
use sentinel_common::{ActivityKind, Embed, EmbedField, Presence, PresenceStatus};

use super::classify::{ClassifiedStatus, OnlineStatus};
use super::locale;
use crate::config::StatusConfig;

pub const COLOR_OK: u32 = 0x2ECC71;
pub const COLOR_MAINTENANCE: u32 = 0xF1C40F;
pub const COLOR_ERROR: u32 = 0xE74C3C;

/// The separator glyph is wider than a letter, so it is repeated for only
/// this fraction of the server name length
const SEPARATOR_RATIO: f64 = 0.625;

/// Which presence theme a cycle ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceKind {
    Ok,
    ServerError,
    Maintenance,
    BotError,
}

impl PresenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceKind::Ok => "ok",
            PresenceKind::ServerError => "serverError",
            PresenceKind::Maintenance => "maintenance",
            PresenceKind::BotError => "botError",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatus {
    pub embed: Embed,
    pub presence: Presence,
    pub kind: PresenceKind,
}

pub struct EmbedRenderer {
    display_name: String,
    thumbnail_url: Option<String>,
    admin_role_id: Option<String>,
}

impl EmbedRenderer {
    pub fn new(config: &StatusConfig) -> Self {
        Self {
            display_name: config.display_name.clone(),
            thumbnail_url: config.thumbnail_url.clone(),
            admin_role_id: config.admin_role_id.clone(),
        }
    }

    pub fn render(&self, status: &ClassifiedStatus) -> RenderedStatus {
        self.render_at(status, Utc::now())
    }

    pub fn render_at(&self, status: &ClassifiedStatus, now: DateTime<Utc>) -> RenderedStatus {
        match status {
            ClassifiedStatus::Online(online) => RenderedStatus {
                embed: Embed {
                    title: self.display_name.clone(),
                    description: separator_line(&online.server_name),
                    color: COLOR_OK,
                    fields: online_fields(online),
                    thumbnail: self.thumbnail_url.clone(),
                    timestamp: now,
                },
                presence: online_presence(online),
                kind: PresenceKind::Ok,
            },
            ClassifiedStatus::Maintenance => RenderedStatus {
                embed: Embed {
                    title: locale::MAINTENANCE.to_string(),
                    description: locale::MAINTENANCE.to_string(),
                    color: COLOR_MAINTENANCE,
                    fields: vec![
                        EmbedField::new(locale::STATUS, locale::OFFLINE, false),
                        EmbedField::new(locale::MAINTENANCE, locale::MAINTENANCE_DESCRIPTION, false),
                    ],
                    thumbnail: None,
                    timestamp: now,
                },
                presence: maintenance_presence(),
                kind: PresenceKind::Maintenance,
            },
            ClassifiedStatus::Offline => RenderedStatus {
                embed: Embed {
                    title: locale::SERVER_OFFLINE.to_string(),
                    description: locale::SERVER_OFFLINE.to_string(),
                    color: COLOR_ERROR,
                    fields: vec![
                        EmbedField::new(locale::STATUS, locale::OFFLINE, false),
                        EmbedField::new(
                            locale::SERVER_DOWN_ALTERNATIVE,
                            self.admin_ping_text(),
                            false,
                        ),
                    ],
                    thumbnail: None,
                    timestamp: now,
                },
                presence: server_error_presence(),
                kind: PresenceKind::ServerError,
            },
        }
    }

    fn admin_ping_text(&self) -> String {
        match &self.admin_role_id {
            Some(role) => format!("<@&{}>{}", role, locale::PLEASE_FIX_SERVER),
            None => locale::PLEASE_FIX_SERVER.trim_start().to_string(),
        }
    }
}

/// Decorative rule sized to 0.625x the server name's character count
pub fn separator_line(server_name: &str) -> String {
    let len = (server_name.chars().count() as f64 * SEPARATOR_RATIO).floor() as usize;
    "─".repeat(len)
}

fn online_fields(online: &OnlineStatus) -> Vec<EmbedField> {
    if !online.has_players {
        return vec![
            EmbedField::new(locale::STATUS, locale::ONLINE, true),
            EmbedField::new(locale::STATE, locale::NO_MISSION_LOADED, true),
        ];
    }

    vec![
        EmbedField::new(locale::STATUS, locale::ONLINE, false),
        EmbedField::new(locale::MISSION_TYPE, online.mission_type.label(), true),
        EmbedField::new(locale::MISSION, online.mission_name.as_str(), true),
        EmbedField::new(locale::BLANK, locale::BLANK, true),
        EmbedField::new(
            locale::PLAYER_COUNT,
            format!("{}/{}", online.player_count, online.capacity),
            true,
        ),
        EmbedField::new(
            locale::MAP,
            online.map_name.as_deref().unwrap_or(locale::NO_MAP),
            true,
        ),
        EmbedField::new(locale::BLANK, locale::BLANK, true),
        EmbedField::new(locale::PLAYER_LIST, online.player_list_text.as_str(), false),
    ]
}

fn online_presence(online: &OnlineStatus) -> Presence {
    let label = if online.has_players {
        online.mission_name.as_str()
    } else {
        online.map_name.as_deref().unwrap_or(locale::NO_MISSION_LOADED)
    };
    Presence::new(
        PresenceStatus::Online,
        ActivityKind::Playing,
        format!("{} ({}/{})", label, online.player_count, online.capacity),
    )
}

pub fn server_error_presence() -> Presence {
    Presence::new(PresenceStatus::Dnd, ActivityKind::Watching, locale::PRESENCE_ERROR)
}

pub fn maintenance_presence() -> Presence {
    Presence::new(PresenceStatus::Idle, ActivityKind::Watching, locale::PRESENCE_MAINTENANCE)
}

pub fn bot_failure_presence() -> Presence {
    Presence::new(PresenceStatus::Idle, ActivityKind::Streaming, locale::PRESENCE_BOT_FAILURE)
}
