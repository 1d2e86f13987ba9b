//! User-facing strings of the status message and presence.

pub const STATUS: &str = "Status";
pub const ONLINE: &str = "Online";
pub const OFFLINE: &str = "Offline";

pub const STATE: &str = "State";
pub const NO_MISSION_LOADED: &str = "No Mission Loaded";

pub const MISSION_TYPE: &str = "Mission Type";
pub const CUSTOM_MISSION_TYPE: &str = "Custom";
pub const MISSION: &str = "Mission";
pub const MAP: &str = "Map";
pub const NO_MAP: &str = "No map";
pub const PLAYER_COUNT: &str = "Player Count";
pub const PLAYER_LIST: &str = "Player List";
pub const TOO_MANY_PLAYERS: &str = "Too many players to list";
pub const NO_PLAYERS: &str = "No players online";

/// Zero-width space, used for spacer fields
pub const BLANK: &str = "\u{200b}";

pub const SERVER_OFFLINE: &str = "Server Offline";
pub const SERVER_DOWN_ALTERNATIVE: &str = "The server is not responding";
pub const PLEASE_FIX_SERVER: &str = " please check on the server.";

pub const MAINTENANCE: &str = "Server Down For Maintenance";
pub const MAINTENANCE_DESCRIPTION: &str =
    "The server is being worked on and will be back shortly.";

pub const PRESENCE_ERROR: &str = "the server fail to respond";
pub const PRESENCE_MAINTENANCE: &str = "the server under maintenance";
pub const PRESENCE_BOT_FAILURE: &str = "the status board break";
