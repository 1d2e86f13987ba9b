//! Status board and rating core.
//!
//! Everything here talks to the chat platform through the capability
//! traits in [`surface`]; the frontend crate supplies the transport.

pub mod config;
pub mod error;
pub mod query;
pub mod rating;
pub mod roster;
pub mod scheduled;
pub mod status;
pub mod surface;
