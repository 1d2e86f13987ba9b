//! Scheduled task manager - drives the status board
//!
//! This module owns the periodic background work:
//! - Status poll cycle (query → enrich → classify → render → publish → presence)
//! - Rating ledger sweep (only when tracked messages expire)

use anyhow::Result;
use sentinel_common::Embed;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::query::ServerQuery;
use crate::rating::RatingLedger;
use crate::roster::{EnrichedSnapshot, RosterEnricher};
use crate::status::render::bot_failure_presence;
use crate::status::{
    classify, DisplayState, DisplayStateStore, EmbedRenderer, PresenceKind, RenderedStatus,
};
use crate::surface::{best_effort, EditOutcome, StatusSurface};

/// Configuration for scheduled tasks
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    /// Interval between status polls (in seconds)
    pub poll_interval_secs: u64,

    /// Run one poll immediately at startup
    pub perform_initial_update: bool,

    /// Interval for sweeping expired rating entries (in minutes)
    pub ledger_sweep_interval_minutes: u64,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            perform_initial_update: true,
            ledger_sweep_interval_minutes: 60,
        }
    }
}

/// Query plus optional side-channel enrichment
pub struct StatusPipeline {
    query: Arc<dyn ServerQuery>,
    enricher: Option<RosterEnricher>,
}

impl StatusPipeline {
    pub fn new(query: Arc<dyn ServerQuery>, enricher: Option<RosterEnricher>) -> Self {
        Self { query, enricher }
    }

    /// A roster export that cannot be used makes the whole cycle unreachable
    pub async fn poll(&self) -> EnrichedSnapshot {
        let snapshot = self.query.query().await;
        if !snapshot.reachable {
            return EnrichedSnapshot::plain(snapshot);
        }

        match &self.enricher {
            None => EnrichedSnapshot::plain(snapshot),
            Some(enricher) => match enricher.enrich(snapshot).await {
                Ok(enriched) => enriched,
                Err(e) => {
                    tracing::error!("Roster export unusable, reporting server offline: {}", e);
                    EnrichedSnapshot::unreachable()
                }
            },
        }
    }
}

/// What happened to the status message in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Edited,
    Created,
    /// Old message deleted, new one posted
    Recreated,
    /// Edit rejected; the stored id is kept for the next cycle
    EditFailed,
    /// Old message could not be deleted, a new one was posted anyway
    DeleteFailed,
    CreateFailed,
}

impl PublishAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishAction::Edited => "edited",
            PublishAction::Created => "created",
            PublishAction::Recreated => "recreated",
            PublishAction::EditFailed => "editFailed",
            PublishAction::DeleteFailed => "deleteFailed",
            PublishAction::CreateFailed => "createFailed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PublishAction::EditFailed | PublishAction::DeleteFailed | PublishAction::CreateFailed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    SkippedMaintenance,
    /// Another cycle held the display state
    Busy,
    Completed {
        action: PublishAction,
        presence: PresenceKind,
    },
}

/// Status board state machine over [`DisplayState`]
pub struct StatusScheduler {
    pipeline: StatusPipeline,
    renderer: EmbedRenderer,
    surface: Arc<dyn StatusSurface>,
    store: DisplayStateStore,
    /// Held for the whole cycle; doubles as the in-flight guard
    state: Mutex<DisplayState>,
    maintenance: AtomicBool,
}

impl StatusScheduler {
    /// Create the scheduler, restoring the last status message id
    pub async fn new(
        pipeline: StatusPipeline,
        renderer: EmbedRenderer,
        surface: Arc<dyn StatusSurface>,
        store: DisplayStateStore,
    ) -> Result<Self> {
        let state = store.load().await?;
        if let Some(id) = &state.status_message_id {
            tracing::info!("Restored status message id {}", id);
        }

        Ok(Self {
            pipeline,
            renderer,
            surface,
            store,
            state: Mutex::new(state),
            maintenance: AtomicBool::new(false),
        })
    }

    pub fn is_maintenance(&self) -> bool {
        self.maintenance.load(Ordering::SeqCst)
    }

    pub async fn status_message_id(&self) -> Option<String> {
        self.state.lock().await.status_message_id.clone()
    }

    /// Run one poll cycle. `force_new` deletes the current message and posts
    /// a fresh one instead of editing.
    pub async fn run_cycle(&self, force_new: bool) -> CycleReport {
        if self.is_maintenance() {
            tracing::info!("Maintenance mode, skipping status cycle");
            return CycleReport::SkippedMaintenance;
        }

        let Ok(mut state) = self.state.try_lock() else {
            tracing::warn!("Previous status cycle still running, skipping this trigger");
            return CycleReport::Busy;
        };

        let span = tracing::info_span!("status_cycle", id = %uuid::Uuid::now_v7(), force_new);
        async {
            let enriched = self.pipeline.poll().await;
            let status = classify(Some(&enriched), false);
            let rendered = self.renderer.render(&status);

            let action = self.publish(&mut state, &rendered.embed, force_new).await;
            let presence = self.reflect_presence(action, &rendered).await;

            tracing::info!(
                "Status cycle done: {:?}, presence {}",
                action,
                presence.as_str()
            );
            CycleReport::Completed { action, presence }
        }
        .instrument(span)
        .await
    }

    /// Toggle maintenance. Entering it shows the maintenance board once;
    /// leaving it polls right away.
    pub async fn set_maintenance(&self, enabled: bool) -> CycleReport {
        let was = self.maintenance.swap(enabled, Ordering::SeqCst);
        tracing::info!("Maintenance mode {} (was {})", enabled, was);

        if !enabled {
            return self.run_cycle(false).await;
        }

        // Wait for an in-flight cycle rather than skipping
        let mut state = self.state.lock().await;
        let rendered = self.renderer.render(&classify(None, true));
        let action = self.publish(&mut state, &rendered.embed, false).await;
        let presence = self.reflect_presence(action, &rendered).await;
        CycleReport::Completed { action, presence }
    }

    async fn publish(&self, state: &mut DisplayState, embed: &Embed, force_new: bool) -> PublishAction {
        if let (Some(id), false) = (state.status_message_id.clone(), force_new) {
            tracing::debug!("Editing status message {}", id);
            return match self.surface.edit(&id, embed).await {
                Ok(EditOutcome::Edited) => PublishAction::Edited,
                Ok(EditOutcome::NotFound) => {
                    tracing::error!("Status message {} not found, keeping id for next cycle", id);
                    PublishAction::EditFailed
                }
                Err(e) => {
                    tracing::error!("Failed to edit status message {}: {:#}", id, e);
                    PublishAction::EditFailed
                }
            };
        }

        let mut deleted = false;
        let mut delete_failed = false;
        if force_new {
            if let Some(old_id) = state.status_message_id.take() {
                tracing::info!("Deleting old status message {}", old_id);
                match self.surface.delete(&old_id).await {
                    Ok(()) => deleted = true,
                    Err(e) => {
                        tracing::error!("Failed to delete status message {}: {:#}", old_id, e);
                        delete_failed = true;
                    }
                }
                self.persist(state).await;
            }
        }

        tracing::info!("Posting new status message");
        match self.surface.publish(embed).await {
            Ok(new_id) => {
                tracing::info!("Status message posted: {}", new_id);
                state.status_message_id = Some(new_id);
                self.persist(state).await;
                if delete_failed {
                    PublishAction::DeleteFailed
                } else if deleted {
                    PublishAction::Recreated
                } else {
                    PublishAction::Created
                }
            }
            Err(e) => {
                tracing::error!("Failed to post status message: {:#}", e);
                PublishAction::CreateFailed
            }
        }
    }

    async fn reflect_presence(&self, action: PublishAction, rendered: &RenderedStatus) -> PresenceKind {
        let (kind, presence) = if action.is_failure() {
            (PresenceKind::BotError, bot_failure_presence())
        } else {
            (rendered.kind, rendered.presence.clone())
        };
        best_effort("Presence update", self.surface.set_presence(&presence)).await;
        kind
    }

    async fn persist(&self, state: &DisplayState) {
        best_effort("Display state save", self.store.save(state)).await;
    }
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    scheduler: Arc<StatusScheduler>,
    ledger: Option<Arc<RatingLedger>>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    /// Create a new scheduled task manager
    pub fn new(config: ScheduledTaskConfig, scheduler: Arc<StatusScheduler>) -> Self {
        Self {
            config,
            scheduler,
            ledger: None,
            task_handles: Vec::new(),
        }
    }

    /// Also sweep expired entries from this ledger
    pub fn with_ledger(mut self, ledger: Arc<RatingLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Start all scheduled tasks
    pub fn start_all(&mut self) {
        tracing::info!("Starting scheduled task manager...");

        let poll_handle = self.start_status_poll_task();
        self.task_handles.push(poll_handle);

        if let Some(ledger) = self.ledger.clone().filter(|l| l.expires_entries()) {
            let sweep_handle = self.start_ledger_sweep_task(ledger);
            self.task_handles.push(sweep_handle);
        }

        tracing::info!(
            "Started {} scheduled tasks (status poll every {} s)",
            self.task_handles.len(),
            self.config.poll_interval_secs
        );
    }

    fn start_status_poll_task(&self) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let interval_secs = self.config.poll_interval_secs.max(1);
        let perform_initial = self.config.perform_initial_update;

        tracing::info!(
            "Scheduling status poll task (interval: {} seconds, initial: {})",
            interval_secs,
            perform_initial
        );

        tokio::spawn(async move {
            Self::status_poll_loop(scheduler, interval_secs, perform_initial).await;
        })
    }

    /// Status poll loop; the first tick fires immediately
    async fn status_poll_loop(scheduler: Arc<StatusScheduler>, interval_secs: u64, perform_initial: bool) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if !perform_initial {
            interval.tick().await;
        }

        loop {
            interval.tick().await;
            let report = scheduler.run_cycle(false).await;
            tracing::debug!("Scheduled status cycle: {:?}", report);
        }
    }

    fn start_ledger_sweep_task(&self, ledger: Arc<RatingLedger>) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.ledger_sweep_interval_minutes.max(1) * 60);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = ledger.evict_expired().await;
                if removed > 0 {
                    tracing::info!("Rating ledger sweep removed {} expired entries", removed);
                } else {
                    tracing::debug!("Rating ledger sweep: nothing expired");
                }
            }
        })
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_common::{PlayerInfo, Presence, ServerSnapshot};
    use std::io::Write;
    use std::sync::Mutex as StdMutex;

    use crate::config::StatusConfig;
    use crate::status::render::COLOR_ERROR;

    struct FakeQuery {
        snapshot: ServerSnapshot,
        delay: Duration,
    }

    #[async_trait]
    impl ServerQuery for FakeQuery {
        async fn query(&self) -> ServerSnapshot {
            tokio::time::sleep(self.delay).await;
            self.snapshot.clone()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Publish,
        Edit(String),
        Delete(String),
        Presence(Presence),
    }

    #[derive(Default)]
    struct FakeSurface {
        calls: StdMutex<Vec<Call>>,
        embeds: StdMutex<Vec<Embed>>,
        edit_outcome: Option<EditOutcome>,
        fail_delete: bool,
    }

    impl FakeSurface {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }
    }

    #[async_trait]
    impl StatusSurface for FakeSurface {
        async fn publish(&self, embed: &Embed) -> Result<String> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Publish);
            self.embeds.lock().unwrap().push(embed.clone());
            let n = calls.iter().filter(|c| **c == Call::Publish).count();
            Ok(format!("msg-{}", n))
        }

        async fn edit(&self, message_id: &str, embed: &Embed) -> Result<EditOutcome> {
            self.calls.lock().unwrap().push(Call::Edit(message_id.to_string()));
            self.embeds.lock().unwrap().push(embed.clone());
            Ok(self.edit_outcome.unwrap_or(EditOutcome::Edited))
        }

        async fn delete(&self, message_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Delete(message_id.to_string()));
            if self.fail_delete {
                anyhow::bail!("Missing Permissions");
            }
            Ok(())
        }

        async fn set_presence(&self, presence: &Presence) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Presence(presence.clone()));
            Ok(())
        }
    }

    fn online_snapshot() -> ServerSnapshot {
        ServerSnapshot {
            reachable: true,
            server_name: "GC Main".to_string(),
            current_players: 1,
            max_players: 64,
            raw_game_string: "CO40_Liberation".to_string(),
            map_name: Some("Everon".to_string()),
            players: vec![PlayerInfo::named("alpha")],
        }
    }

    struct Harness {
        scheduler: StatusScheduler,
        surface: Arc<FakeSurface>,
        state_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn harness(
        snapshot: ServerSnapshot,
        enricher: Option<RosterEnricher>,
        stored_id: Option<&str>,
        surface: FakeSurface,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("display_state.json");
        let store = DisplayStateStore::new(&state_path);
        store
            .save(&DisplayState {
                status_message_id: stored_id.map(str::to_string),
            })
            .await
            .unwrap();

        let surface = Arc::new(surface);
        let query = Arc::new(FakeQuery {
            snapshot,
            delay: Duration::from_millis(50),
        });
        let scheduler = StatusScheduler::new(
            StatusPipeline::new(query, enricher),
            EmbedRenderer::new(&StatusConfig::default()),
            surface.clone(),
            store,
        )
        .await
        .unwrap();

        Harness {
            scheduler,
            surface,
            state_path,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_existing_message_is_edited_only() {
        let h = harness(online_snapshot(), None, Some("msg-old"), FakeSurface::default()).await;

        let report = h.scheduler.run_cycle(false).await;

        assert_eq!(
            report,
            CycleReport::Completed {
                action: PublishAction::Edited,
                presence: PresenceKind::Ok
            }
        );
        assert_eq!(h.surface.count(|c| *c == Call::Edit("msg-old".to_string())), 1);
        assert_eq!(h.surface.count(|c| *c == Call::Publish), 0);
        assert_eq!(h.surface.count(|c| matches!(c, Call::Delete(_))), 0);
    }

    #[tokio::test]
    async fn test_missing_id_creates_and_persists() {
        let h = harness(online_snapshot(), None, None, FakeSurface::default()).await;

        let report = h.scheduler.run_cycle(false).await;

        assert!(matches!(
            report,
            CycleReport::Completed {
                action: PublishAction::Created,
                ..
            }
        ));
        assert_eq!(h.surface.count(|c| *c == Call::Publish), 1);
        assert_eq!(h.scheduler.status_message_id().await.as_deref(), Some("msg-1"));
        let saved = DisplayStateStore::new(&h.state_path).load().await.unwrap();
        assert_eq!(saved.status_message_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_forced_recreate_deletes_then_creates() {
        let h = harness(online_snapshot(), None, Some("msg-old"), FakeSurface::default()).await;

        let report = h.scheduler.run_cycle(true).await;

        assert!(matches!(
            report,
            CycleReport::Completed {
                action: PublishAction::Recreated,
                ..
            }
        ));
        let calls: Vec<Call> = h
            .surface
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Presence(_)))
            .collect();
        assert_eq!(calls, vec![Call::Delete("msg-old".to_string()), Call::Publish]);
        assert_eq!(h.scheduler.status_message_id().await.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_failed_delete_still_posts_and_flags_bot_error() {
        let surface = FakeSurface {
            fail_delete: true,
            ..FakeSurface::default()
        };
        let h = harness(online_snapshot(), None, Some("msg-old"), surface).await;

        let report = h.scheduler.run_cycle(true).await;

        assert_eq!(
            report,
            CycleReport::Completed {
                action: PublishAction::DeleteFailed,
                presence: PresenceKind::BotError
            }
        );
        assert_eq!(h.scheduler.status_message_id().await.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_edit_failure_keeps_id_and_does_not_create() {
        let surface = FakeSurface {
            edit_outcome: Some(EditOutcome::NotFound),
            ..FakeSurface::default()
        };
        let h = harness(online_snapshot(), None, Some("msg-gone"), surface).await;

        let report = h.scheduler.run_cycle(false).await;

        assert_eq!(
            report,
            CycleReport::Completed {
                action: PublishAction::EditFailed,
                presence: PresenceKind::BotError
            }
        );
        assert_eq!(h.surface.count(|c| *c == Call::Publish), 0);
        assert_eq!(h.scheduler.status_message_id().await.as_deref(), Some("msg-gone"));
        assert!(h
            .surface
            .calls()
            .contains(&Call::Presence(bot_failure_presence())));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_server_error() {
        let h = harness(ServerSnapshot::unreachable(), None, Some("msg-old"), FakeSurface::default()).await;

        let report = h.scheduler.run_cycle(false).await;

        assert_eq!(
            report,
            CycleReport::Completed {
                action: PublishAction::Edited,
                presence: PresenceKind::ServerError
            }
        );
    }

    #[tokio::test]
    async fn test_broken_roster_export_renders_offline() {
        let mut export = tempfile::NamedTempFile::new().unwrap();
        write!(export, r#"{{"connected_players":{{"1":7}},"mission":"x"}}"#).unwrap();

        let h = harness(
            online_snapshot(),
            Some(RosterEnricher::new(export.path())),
            None,
            FakeSurface::default(),
        )
        .await;

        let report = h.scheduler.run_cycle(false).await;

        assert_eq!(
            report,
            CycleReport::Completed {
                action: PublishAction::Created,
                presence: PresenceKind::ServerError
            }
        );
        assert_eq!(h.surface.embeds.lock().unwrap()[0].color, COLOR_ERROR);
    }

    #[tokio::test]
    async fn test_maintenance_skips_cycles() {
        let h = harness(online_snapshot(), None, Some("msg-old"), FakeSurface::default()).await;

        let report = h.scheduler.set_maintenance(true).await;
        assert_eq!(
            report,
            CycleReport::Completed {
                action: PublishAction::Edited,
                presence: PresenceKind::Maintenance
            }
        );
        let calls_after_enter = h.surface.calls().len();

        assert_eq!(h.scheduler.run_cycle(false).await, CycleReport::SkippedMaintenance);
        assert_eq!(h.surface.calls().len(), calls_after_enter);

        let report = h.scheduler.set_maintenance(false).await;
        assert!(matches!(report, CycleReport::Completed { presence: PresenceKind::Ok, .. }));
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_busy() {
        let h = harness(online_snapshot(), None, Some("msg-old"), FakeSurface::default()).await;

        let (first, second) = tokio::join!(h.scheduler.run_cycle(false), h.scheduler.run_cycle(false));

        assert!(matches!(first, CycleReport::Completed { .. }));
        assert_eq!(second, CycleReport::Busy);
        assert_eq!(h.surface.count(|c| matches!(c, Call::Edit(_))), 1);
    }
}
