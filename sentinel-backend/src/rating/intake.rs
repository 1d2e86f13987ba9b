//! Reaction intake: turns a reaction on a tracked message into a rating.

use sentinel_common::RatingValue;
use std::sync::Arc;

use super::egress::RatingSink;
use super::ledger::{RatingLedger, SubmitOutcome};
use crate::error::RatingError;
use crate::surface::{best_effort, ReactionSurface};

/// A user added a reaction somewhere the bot can see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub channel_id: String,
    pub message_id: String,
    pub guild_id: Option<String>,
    pub user_id: String,
    pub emoji: String,
    pub user_is_bot: bool,
    /// Roles delivered with the event; looked up when absent
    pub member_roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    IgnoredBot,
    NotTracked,
    /// Reaction removed, nothing recorded
    InvalidSymbol,
    /// Reaction removed, nothing recorded
    NotMember,
    Recorded(SubmitOutcome),
}

/// Map a reaction symbol to a rating value
pub fn rating_from_reaction(emoji: &str) -> Result<RatingValue, RatingError> {
    RatingValue::from_emoji(emoji).ok_or_else(|| RatingError::InvalidValue(emoji.to_string()))
}

pub struct ReactionIntake {
    ledger: Arc<RatingLedger>,
    surface: Arc<dyn ReactionSurface>,
    sink: Arc<dyn RatingSink>,
    member_role_id: Option<String>,
}

impl ReactionIntake {
    pub fn new(
        ledger: Arc<RatingLedger>,
        surface: Arc<dyn ReactionSurface>,
        sink: Arc<dyn RatingSink>,
        member_role_id: Option<String>,
    ) -> Self {
        Self {
            ledger,
            surface,
            sink,
            member_role_id,
        }
    }

    pub async fn handle(&self, event: ReactionEvent) -> ReactionOutcome {
        if event.user_is_bot {
            return ReactionOutcome::IgnoredBot;
        }

        if self.ledger.lookup(&event.message_id).await.is_none() {
            return ReactionOutcome::NotTracked;
        }

        let value = match rating_from_reaction(&event.emoji) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Removing reaction on {}: {}", event.message_id, e);
                self.remove(&event, &event.emoji).await;
                return ReactionOutcome::InvalidSymbol;
            }
        };

        if !self.is_member(&event).await {
            tracing::info!(
                "User {} is not a member, removing vote on {}",
                event.user_id,
                event.message_id
            );
            self.remove(&event, &event.emoji).await;
            return ReactionOutcome::NotMember;
        }

        for other in RatingValue::ALL.into_iter().filter(|v| *v != value) {
            self.remove(&event, other.emoji()).await;
        }

        let outcome = self
            .ledger
            .submit(&event.message_id, &event.user_id, value)
            .await;

        if let Some(rating) = outcome.event() {
            best_effort("Rating forward", self.sink.forward(rating)).await;
        }

        ReactionOutcome::Recorded(outcome)
    }

    async fn is_member(&self, event: &ReactionEvent) -> bool {
        let Some(role) = &self.member_role_id else {
            return true;
        };

        if let Some(roles) = &event.member_roles {
            return roles.contains(role);
        }

        let Some(guild_id) = &event.guild_id else {
            return false;
        };
        best_effort(
            "Member role lookup",
            self.surface.member_roles(guild_id, &event.user_id),
        )
        .await
        .is_some_and(|roles| roles.contains(role))
    }

    async fn remove(&self, event: &ReactionEvent, emoji: &str) {
        best_effort(
            "Reaction removal",
            self.surface
                .remove_reaction(&event.channel_id, &event.message_id, emoji, &event.user_id),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::ledger::RatingEvent;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeReactions {
        removed: Mutex<Vec<String>>,
        roles: Vec<String>,
        fail_removal: bool,
    }

    #[async_trait]
    impl ReactionSurface for FakeReactions {
        async fn add_reaction(&self, _channel_id: &str, _message_id: &str, _emoji: &str) -> Result<()> {
            Ok(())
        }

        async fn remove_reaction(
            &self,
            _channel_id: &str,
            _message_id: &str,
            emoji: &str,
            _user_id: &str,
        ) -> Result<()> {
            self.removed.lock().unwrap().push(emoji.to_string());
            if self.fail_removal {
                anyhow::bail!("Unknown Emoji");
            }
            Ok(())
        }

        async fn member_roles(&self, _guild_id: &str, _user_id: &str) -> Result<Vec<String>> {
            Ok(self.roles.clone())
        }
    }

    #[derive(Default)]
    struct FakeSink {
        forwarded: Mutex<Vec<RatingEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl RatingSink for FakeSink {
        async fn forward(&self, event: &RatingEvent) -> Result<()> {
            self.forwarded.lock().unwrap().push(event.clone());
            if self.fail {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(())
        }
    }

    struct Setup {
        intake: ReactionIntake,
        ledger: Arc<RatingLedger>,
        reactions: Arc<FakeReactions>,
        sink: Arc<FakeSink>,
    }

    async fn setup(reactions: FakeReactions, sink: FakeSink, member_role: Option<&str>) -> Setup {
        let ledger = Arc::new(RatingLedger::new(None));
        ledger.register("msg-1", "mission-9", Some("hist-3")).await;
        let reactions = Arc::new(reactions);
        let sink = Arc::new(sink);
        let intake = ReactionIntake::new(
            ledger.clone(),
            reactions.clone(),
            sink.clone(),
            member_role.map(str::to_string),
        );
        Setup {
            intake,
            ledger,
            reactions,
            sink,
        }
    }

    fn reaction(emoji: &str) -> ReactionEvent {
        ReactionEvent {
            channel_id: "chan".to_string(),
            message_id: "msg-1".to_string(),
            guild_id: Some("guild".to_string()),
            user_id: "user-5".to_string(),
            emoji: emoji.to_string(),
            user_is_bot: false,
            member_roles: None,
        }
    }

    #[tokio::test]
    async fn test_valid_vote_is_recorded_and_forwarded() {
        let s = setup(FakeReactions::default(), FakeSink::default(), None).await;

        let outcome = s.intake.handle(reaction("👍")).await;

        assert!(matches!(outcome, ReactionOutcome::Recorded(SubmitOutcome::Created(_))));
        assert_eq!(s.ledger.rating_for("mission-9", "user-5").await, Some(RatingValue::Positive));
        let forwarded = s.sink.forwarded.lock().unwrap().clone();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].correlation_id.as_deref(), Some("hist-3"));
        // The other two rating reactions are cleared
        assert_eq!(*s.reactions.removed.lock().unwrap(), vec!["🆗", "👎"]);
    }

    #[tokio::test]
    async fn test_changed_vote_is_an_update() {
        let s = setup(FakeReactions::default(), FakeSink::default(), None).await;

        s.intake.handle(reaction("👍")).await;
        let outcome = s.intake.handle(reaction("👎")).await;

        assert!(matches!(outcome, ReactionOutcome::Recorded(SubmitOutcome::Updated(_))));
        assert_eq!(s.ledger.rating_for("mission-9", "user-5").await, Some(RatingValue::Negative));
    }

    #[tokio::test]
    async fn test_bot_reactions_are_ignored() {
        let s = setup(FakeReactions::default(), FakeSink::default(), None).await;
        let mut event = reaction("👍");
        event.user_is_bot = true;

        assert_eq!(s.intake.handle(event).await, ReactionOutcome::IgnoredBot);
        assert!(s.reactions.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_untracked_message_has_no_side_effects() {
        let s = setup(FakeReactions::default(), FakeSink::default(), None).await;
        let mut event = reaction("🔥");
        event.message_id = "elsewhere".to_string();

        assert_eq!(s.intake.handle(event).await, ReactionOutcome::NotTracked);
        assert!(s.reactions.removed.lock().unwrap().is_empty());
        assert!(s.sink.forwarded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_symbol_is_removed() {
        let s = setup(FakeReactions::default(), FakeSink::default(), None).await;

        assert_eq!(s.intake.handle(reaction("🔥")).await, ReactionOutcome::InvalidSymbol);
        assert_eq!(*s.reactions.removed.lock().unwrap(), vec!["🔥"]);
        assert_eq!(s.ledger.rating_for("mission-9", "user-5").await, None);
    }

    #[tokio::test]
    async fn test_non_member_vote_is_removed() {
        let reactions = FakeReactions {
            roles: vec!["guest".to_string()],
            ..FakeReactions::default()
        };
        let s = setup(reactions, FakeSink::default(), Some("member")).await;

        assert_eq!(s.intake.handle(reaction("👍")).await, ReactionOutcome::NotMember);
        assert_eq!(*s.reactions.removed.lock().unwrap(), vec!["👍"]);
        assert!(s.sink.forwarded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roles_on_event_skip_lookup() {
        let s = setup(FakeReactions::default(), FakeSink::default(), Some("member")).await;
        let mut event = reaction("🆗");
        event.member_roles = Some(vec!["member".to_string()]);

        let outcome = s.intake.handle(event).await;
        assert!(matches!(outcome, ReactionOutcome::Recorded(_)));
    }

    #[tokio::test]
    async fn test_cleanup_and_forward_failures_are_swallowed() {
        let reactions = FakeReactions {
            fail_removal: true,
            ..FakeReactions::default()
        };
        let sink = FakeSink {
            fail: true,
            ..FakeSink::default()
        };
        let s = setup(reactions, sink, None).await;

        let outcome = s.intake.handle(reaction("🆗")).await;

        assert!(matches!(outcome, ReactionOutcome::Recorded(SubmitOutcome::Created(_))));
        assert_eq!(s.sink.forwarded.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_rating_from_reaction() {
        assert_eq!(rating_from_reaction("👎"), Ok(RatingValue::Negative));
        assert_eq!(
            rating_from_reaction("x"),
            Err(RatingError::InvalidValue("x".to_string()))
        );
    }
}
