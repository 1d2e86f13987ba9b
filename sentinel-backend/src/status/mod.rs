//! Server status: classification, rendering and display state.

pub mod classify;
pub mod locale;
pub mod render;
pub mod state;

pub use classify::{classify, decode_game_string, ClassifiedStatus, MissionType, OnlineStatus};
pub use render::{EmbedRenderer, PresenceKind, RenderedStatus};
pub use state::{DisplayState, DisplayStateStore};
