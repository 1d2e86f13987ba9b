//! Snapshot classification and the legacy mission-name decoder.

use regex::Regex;
use sentinel_common::PlayerInfo;
use std::sync::LazyLock;

use super::locale;
use crate::roster::EnrichedSnapshot;

/// Player list field value must stay under this many characters
pub const PLAYER_LIST_BUDGET: usize = 1024;

/// Capacity assumed when the game string carries no slot count
pub const DEFAULT_CAPACITY: u32 = 64;

static SLOTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+([0-9]+)").expect("slot pattern compiles"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+.*").expect("name pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionType {
    Coop,
    Tvt,
    Cotvt,
    Lol,
    Undefined,
}

impl MissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionType::Coop => "COOP",
            MissionType::Tvt => "TVT",
            MissionType::Cotvt => "COTVT",
            MissionType::Lol => "LOL",
            MissionType::Undefined => "undefined",
        }
    }

    /// Text shown in the "Mission Type" field
    pub fn label(&self) -> &'static str {
        match self {
            MissionType::Undefined => locale::CUSTOM_MISSION_TYPE,
            other => other.as_str(),
        }
    }
}

/// Fields recovered from a compact game string such as "CO40_Liberation"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionDecode {
    pub mission_type: MissionType,
    pub slot_count: Option<String>,
    pub mission_name: String,
}

impl MissionDecode {
    fn undefined(raw: &str) -> Self {
        Self {
            mission_type: MissionType::Undefined,
            slot_count: None,
            mission_name: raw.to_string(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slot_count
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CAPACITY)
    }
}

/// Decode `<TYPE><SLOTS>_<Mission_Name>`.
///
/// `COTVT` wins over the two-letter prefixes. An unknown prefix, or a
/// string without a slot count, keeps the raw string as the mission name.
pub fn decode_game_string(raw: &str) -> MissionDecode {
    let (mission_type, type_len) = if raw.starts_with("COTVT") {
        (MissionType::Cotvt, 5)
    } else {
        match raw.get(..2) {
            Some("CO") => (MissionType::Coop, 2),
            Some("TV") => (MissionType::Tvt, 3),
            Some("LO") => (MissionType::Lol, 3),
            _ => (MissionType::Undefined, 2),
        }
    };

    if mission_type == MissionType::Undefined {
        return MissionDecode::undefined(raw);
    }

    let Some(slots) = SLOTS_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return MissionDecode::undefined(raw);
    };

    let suffix: String = raw.chars().skip(type_len + slots.len()).collect();
    let mission_name = NAME_RE
        .find(&suffix)
        .map(|m| m.as_str().replace('_', " ").trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| MissionType::Undefined.as_str().to_string());

    MissionDecode {
        mission_type,
        slot_count: Some(slots),
        mission_name,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerList {
    pub has_players: bool,
    pub text: String,
}

fn player_line(player: &PlayerInfo) -> String {
    format!("• {}", player.name)
}

fn fenced(body: &str) -> String {
    format!("```py\n{}\n```", body)
}

/// Code block listing players by name, or a placeholder.
///
/// The budget applies to the whole field value, fence and newlines included.
pub fn render_player_list(players: &[PlayerInfo]) -> PlayerList {
    if players.is_empty() {
        return PlayerList {
            has_players: false,
            text: fenced(locale::NO_PLAYERS),
        };
    }

    let mut sorted: Vec<&PlayerInfo> = players.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    let listed = fenced(&sorted.into_iter().map(player_line).collect::<Vec<_>>().join("\n"));

    let text = if listed.chars().count() < PLAYER_LIST_BUDGET {
        listed
    } else {
        fenced(locale::TOO_MANY_PLAYERS)
    };

    PlayerList {
        has_players: true,
        text,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnlineStatus {
    pub server_name: String,
    /// False reduces the message to status + "no mission loaded"
    pub has_players: bool,
    pub mission_type: MissionType,
    pub mission_name: String,
    pub map_name: Option<String>,
    /// Size of the roster, even when the list text is a placeholder
    pub player_count: usize,
    pub capacity: u32,
    pub player_list_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedStatus {
    Online(OnlineStatus),
    Offline,
    Maintenance,
}

/// Maintenance wins over reachability; an absent or unreachable snapshot
/// is offline.
pub fn classify(enriched: Option<&EnrichedSnapshot>, maintenance: bool) -> ClassifiedStatus {
    if maintenance {
        return ClassifiedStatus::Maintenance;
    }
    let Some(enriched) = enriched.filter(|e| e.is_reachable()) else {
        return ClassifiedStatus::Offline;
    };
    let snapshot = &enriched.snapshot;

    let (mission_type, mission_name, capacity) = match &enriched.active_mission {
        Some(mission) => (MissionType::Undefined, mission.clone(), snapshot.max_players),
        None => {
            let decoded = decode_game_string(&snapshot.raw_game_string);
            let capacity = decoded.capacity();
            (decoded.mission_type, decoded.mission_name, capacity)
        }
    };

    let list = render_player_list(&snapshot.players);

    ClassifiedStatus::Online(OnlineStatus {
        server_name: snapshot.server_name.clone(),
        has_players: list.has_players,
        mission_type,
        mission_name,
        map_name: snapshot.map_name.clone(),
        player_count: snapshot.players.len(),
        capacity,
        player_list_text: list.text,
    })
}
