pub mod types;

pub use types::{
    ActivityKind, Embed, EmbedField, PlayerInfo, Presence, PresenceStatus, RatingValue,
    ServerSnapshot,
};
