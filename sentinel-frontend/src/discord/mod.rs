pub mod gateway;
pub mod rest;

pub use gateway::{spawn_reaction_dispatch, Gateway, REACTION_QUEUE_SIZE};
pub use rest::{DiscordRest, DiscordStatusSurface};
