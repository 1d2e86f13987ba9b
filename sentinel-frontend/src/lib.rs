pub mod api;
pub mod config;
pub mod discord;
pub mod logging;
