//! Game server query over the Steam A2S protocol.
//!
//! Issues one A2S_INFO (plus a best-effort A2S_PLAYER) per poll and
//! normalizes the reply into a [`ServerSnapshot`](sentinel_common::ServerSnapshot).

pub mod a2s;
pub mod client;

pub use client::{GameQueryClient, ServerQuery};
