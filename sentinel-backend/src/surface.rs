//! Capabilities the core needs from the chat platform.
//!
//! The status pipeline and the rating intake only see these traits; the
//! transport lives in the frontend crate.

use anyhow::Result;
use async_trait::async_trait;
use sentinel_common::{Embed, Presence};
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    NotFound,
}

/// Publishing side: the status channel and the bot presence
#[async_trait]
pub trait StatusSurface: Send + Sync {
    /// Post a new message, returning its id
    async fn publish(&self, embed: &Embed) -> Result<String>;

    async fn edit(&self, message_id: &str, embed: &Embed) -> Result<EditOutcome>;

    async fn delete(&self, message_id: &str) -> Result<()>;

    async fn set_presence(&self, presence: &Presence) -> Result<()>;
}

/// Reaction side: per-message reactions and roster membership lookups
#[async_trait]
pub trait ReactionSurface: Send + Sync {
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()>;

    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<()>;

    /// Role ids the user holds in the guild
    async fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>>;
}

/// Run a side-effecting call that must never fail its caller.
///
/// Errors are logged at warn level with `label` and turned into `None`.
pub async fn best_effort<T, F>(label: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("{} failed (ignored): {:#}", label, e);
            None
        }
    }
}
