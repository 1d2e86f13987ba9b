//! Tracked messages and the one-vote-per-user rating sets.

use chrono::{DateTime, Duration, Utc};
use sentinel_common::RatingValue;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A message that accepts ratings for one content item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingEntry {
    pub message_id: String,
    pub item_id: String,
    /// Forwarded to the rating system as the history entry
    pub correlation_id: Option<String>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RatingRecord {
    value: RatingValue,
    updated_at: DateTime<Utc>,
}

/// Accepted rating, ready to forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingEvent {
    pub item_id: String,
    pub user_id: String,
    pub value: RatingValue,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Unknown (or expired) message, nothing recorded
    NotTracked,
    Created(RatingEvent),
    Updated(RatingEvent),
}

impl SubmitOutcome {
    pub fn event(&self) -> Option<&RatingEvent> {
        match self {
            SubmitOutcome::NotTracked => None,
            SubmitOutcome::Created(event) | SubmitOutcome::Updated(event) => Some(event),
        }
    }
}

#[derive(Default)]
struct LedgerInner {
    entries: HashMap<String, RatingEntry>,
    /// item id → user id → latest rating
    ratings: HashMap<String, HashMap<String, RatingRecord>>,
}

/// In-memory ledger; lost on restart
pub struct RatingLedger {
    inner: RwLock<LedgerInner>,
    ttl: Option<Duration>,
}

impl RatingLedger {
    /// A `ttl` of `None` keeps entries until restart
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(LedgerInner::default()),
            ttl,
        }
    }

    pub fn expires_entries(&self) -> bool {
        self.ttl.is_some()
    }

    /// Track a message; registering the same id again overwrites it
    pub async fn register(&self, message_id: &str, item_id: &str, correlation_id: Option<&str>) {
        self.register_at(message_id, item_id, correlation_id, Utc::now()).await
    }

    pub(crate) async fn register_at(
        &self,
        message_id: &str,
        item_id: &str,
        correlation_id: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let entry = RatingEntry {
            message_id: message_id.to_string(),
            item_id: item_id.to_string(),
            correlation_id: correlation_id.map(str::to_string),
            registered_at: now,
        };
        let previous = self.inner.write().await.entries.insert(message_id.to_string(), entry);

        match previous {
            Some(old) if old.item_id != item_id => tracing::info!(
                "Message {} re-registered: item {} -> {}",
                message_id,
                old.item_id,
                item_id
            ),
            Some(_) => tracing::debug!("Message {} re-registered for item {}", message_id, item_id),
            None => tracing::info!("Tracking message {} for item {}", message_id, item_id),
        }
    }

    pub async fn lookup(&self, message_id: &str) -> Option<RatingEntry> {
        self.lookup_at(message_id, Utc::now()).await
    }

    pub(crate) async fn lookup_at(&self, message_id: &str, now: DateTime<Utc>) -> Option<RatingEntry> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(message_id)
            .filter(|entry| !self.is_expired(entry, now))
            .cloned()
    }

    /// Record `user_id`'s rating on the item behind `message_id`
    pub async fn submit(&self, message_id: &str, user_id: &str, value: RatingValue) -> SubmitOutcome {
        self.submit_at(message_id, user_id, value, Utc::now()).await
    }

    pub(crate) async fn submit_at(
        &self,
        message_id: &str,
        user_id: &str,
        value: RatingValue,
        now: DateTime<Utc>,
    ) -> SubmitOutcome {
        let mut inner = self.inner.write().await;

        let Some(entry) = inner
            .entries
            .get(message_id)
            .filter(|entry| !self.is_expired(entry, now))
            .cloned()
        else {
            return SubmitOutcome::NotTracked;
        };

        let event = RatingEvent {
            item_id: entry.item_id.clone(),
            user_id: user_id.to_string(),
            value,
            correlation_id: entry.correlation_id,
        };
        let record = RatingRecord {
            value,
            updated_at: now,
        };

        let item_ratings = inner.ratings.entry(entry.item_id).or_default();
        match item_ratings.insert(user_id.to_string(), record) {
            Some(previous) => {
                tracing::debug!(
                    "Rating by {} on {} changed {} -> {}",
                    user_id,
                    event.item_id,
                    previous.value,
                    value
                );
                SubmitOutcome::Updated(event)
            }
            None => {
                tracing::debug!("Rating by {} on {}: {}", user_id, event.item_id, value);
                SubmitOutcome::Created(event)
            }
        }
    }

    /// Latest rating a user gave an item
    pub async fn rating_for(&self, item_id: &str, user_id: &str) -> Option<RatingValue> {
        let inner = self.inner.read().await;
        inner
            .ratings
            .get(item_id)
            .and_then(|ratings| ratings.get(user_id))
            .map(|record| record.value)
    }

    pub async fn tracked_count(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Drop expired entries and the ratings of items no longer tracked.
    /// Returns the number of entries removed.
    pub async fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now()).await
    }

    pub(crate) async fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - inner.entries.len();

        if removed > 0 {
            let LedgerInner { entries, ratings } = &mut *inner;
            ratings.retain(|item_id, _| entries.values().any(|e| &e.item_id == item_id));
        }
        removed
    }

    fn is_expired(&self, entry: &RatingEntry, now: DateTime<Utc>) -> bool {
        self.ttl
            .map(|ttl| now - entry.registered_at >= ttl)
            .unwrap_or(false)
    }
}
