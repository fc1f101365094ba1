use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Timelike};
use log::{debug, warn};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::models::{
    ActiveTask, EndAction, HistoryEntry, ResetScope, ResetSource, SessionRecord,
};
use crate::reading::{page_indicates_expired, parse_timer_text};
use crate::sensor::PageSensor;
use crate::store::{Store, MAX_DAILY_SECONDS};

use super::clock::Clock;
use super::tracker::{TaskTracker, TickOutcome};

/// Emitted to subscribers whenever displayed numbers may have changed,
/// whether from this instance's own transitions or a foreign write to the
/// shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Updated,
}

/// Aggregated engine state for UI collaborators.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub committed_seconds: u64,
    /// The tracked task's elapsed time, 0 when nothing is tracked.
    pub pending_seconds: u64,
    pub submission_count: u64,
    pub is_active: bool,
    pub on_task_page: bool,
    pub task: Option<ActiveTask>,
    pub sessions: Vec<SessionRecord>,
    pub history: Vec<HistoryEntry>,
    pub last_reset_date: Option<NaiveDate>,
}

/// How many session records a snapshot carries.
const SNAPSHOT_SESSION_LIMIT: usize = 100;

struct EngineState {
    tracker: TaskTracker,
    /// In-memory mirror of the shared scalars. Kept current on every
    /// commit/reset and on foreign change notifications, so a failed store
    /// write degrades to in-memory operation instead of losing the tick.
    committed_cache: u64,
    count_cache: u64,
    /// Re-entrancy guard around the commit/reset critical section.
    /// Overlapping commands are rejected, not queued: a reset landing
    /// between a commit's store writes and its cache write-back would let
    /// the write-back resurrect the zeroed totals.
    in_flight: bool,
    on_task_page: bool,
}

/// Owns the task lifecycle: sampling, daily rollover, and the three
/// terminal operations (commit, discard, reset). All store writes flow
/// through here; the tracker never does I/O.
pub struct Coordinator {
    state: Mutex<EngineState>,
    store: Store,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<EngineEvent>,
}

impl Coordinator {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(EngineState {
                tracker: TaskTracker::new(),
                committed_cache: 0,
                count_cache: 0,
                in_flight: false,
                on_task_page: false,
            }),
            store,
            clock,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn emit(&self) {
        let _ = self.events.send(EngineEvent::Updated);
    }

    /// Prime the scalar mirror from the store. Called once at launch and
    /// again whenever a foreign instance writes.
    pub async fn refresh_shared(&self) {
        let committed = self.store.daily_committed_seconds().await;
        let count = self.store.submission_count().await;
        let mut state = self.state.lock().await;
        match committed {
            Ok(value) => state.committed_cache = value,
            Err(err) => warn!("failed to re-read committed seconds: {err:#}"),
        }
        match count {
            Ok(value) => state.count_cache = value,
            Err(err) => warn!("failed to re-read submission count: {err:#}"),
        }
        drop(state);
        self.emit();
    }

    pub async fn snapshot(&self) -> Snapshot {
        let sessions = self
            .store
            .recent_sessions(SNAPSHOT_SESSION_LIMIT)
            .await
            .unwrap_or_else(|err| {
                warn!("failed to read session log: {err:#}");
                Vec::new()
            });
        let history = self.store.history_entries().await.unwrap_or_else(|err| {
            warn!("failed to read history: {err:#}");
            Vec::new()
        });
        let last_reset_date = self.store.last_reset_date().await.unwrap_or_default();

        let state = self.state.lock().await;
        Snapshot {
            committed_seconds: state.committed_cache,
            pending_seconds: state.tracker.pending_seconds(),
            submission_count: state.count_cache,
            is_active: state.tracker.active().is_some(),
            on_task_page: state.on_task_page,
            task: state.tracker.active().cloned(),
            sessions,
            history,
            last_reset_date,
        }
    }

    // --- terminal operations ----------------------------------------------

    /// Convert the tracked task's elapsed time into the daily totals.
    /// Returns the committed seconds, 0 when there was nothing to commit
    /// (no task, zero elapsed, or a commit already in flight).
    pub async fn commit(&self) -> Result<u64> {
        let task = {
            let mut state = self.state.lock().await;
            if state.in_flight {
                debug!("commit rejected: another command is in flight");
                return Ok(0);
            }
            let Some(task) = state.tracker.active().cloned() else {
                return Ok(0);
            };
            if task.current_seconds == 0 {
                return Ok(0);
            }
            state.in_flight = true;
            state.tracker.take_active();
            state.tracker.clear_ignore_if(&task.id);
            state.committed_cache = state
                .committed_cache
                .saturating_add(task.current_seconds)
                .min(MAX_DAILY_SECONDS);
            state.count_cache += 1;
            task
        };

        let seconds = task.current_seconds;
        let now = self.clock.now_utc();
        let date = self.clock.today();
        let hour = self.clock.now().hour();

        // Store failures degrade to the in-memory mirror for this tick;
        // the sampling loop must keep running regardless.
        let stored_total = self.store.add_committed_seconds(seconds).await;
        if let Err(err) = &stored_total {
            warn!("failed to persist committed seconds: {err:#}");
        }
        if let Err(err) = self.store.add_history_seconds(date, hour, seconds).await {
            warn!("failed to persist history entry: {err:#}");
        }
        let stored_count = self.store.increment_submission_count().await;
        if let Err(err) = &stored_count {
            warn!("failed to persist submission count: {err:#}");
        }
        if let Err(err) = self
            .store
            .append_session(SessionRecord {
                id: Uuid::new_v4().to_string(),
                task_id: task.id.clone(),
                ended_at: now,
                duration_seconds: seconds,
                action: EndAction::Submitted,
            })
            .await
        {
            warn!("failed to append session record: {err:#}");
        }

        {
            let mut state = self.state.lock().await;
            if let Ok(total) = stored_total {
                state.committed_cache = total;
            }
            if let Ok(count) = stored_count {
                state.count_cache = count;
            }
            state.in_flight = false;
        }
        self.emit();
        Ok(seconds)
    }

    /// End the tracked task without counting its time. The task id is
    /// marked to be ignored so a stray late reading cannot re-adopt it
    /// before the page navigates away.
    pub async fn discard(&self, action: EndAction) -> Result<()> {
        self.end_task(action, true).await
    }

    async fn end_task(&self, action: EndAction, set_marker: bool) -> Result<()> {
        let task = {
            let mut state = self.state.lock().await;
            let Some(task) = state.tracker.take_active() else {
                return Ok(());
            };
            if set_marker {
                state.tracker.set_ignore(task.id.clone());
            } else {
                // Reset-driven discards clear the marker instead: the day
                // is rolling over and the id must be adoptable again.
                state.tracker.clear_ignore();
            }
            task
        };

        if let Err(err) = self
            .store
            .append_session(SessionRecord {
                id: Uuid::new_v4().to_string(),
                task_id: task.id.clone(),
                ended_at: self.clock.now_utc(),
                duration_seconds: task.current_seconds,
                action,
            })
            .await
        {
            warn!("failed to log {} session: {err:#}", action.as_str());
        }
        self.emit();
        Ok(())
    }

    /// Zero the requested scope(s), snapshotting the prior day into history
    /// first when this reset is a day boundary.
    ///
    /// Shares the in-flight flag with `commit`. A reset arriving while a
    /// commit is mid-persist is skipped; rollover resets come back on the
    /// next tick's check.
    pub async fn reset(&self, scope: ResetScope, source: ResetSource) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.in_flight {
                debug!("reset skipped: a commit is in flight");
                return Ok(());
            }
            state.in_flight = true;
        }
        let result = self.reset_locked(scope, source).await;
        self.state.lock().await.in_flight = false;
        result
    }

    async fn reset_locked(&self, scope: ResetScope, source: ResetSource) -> Result<()> {
        let today = self.clock.today();
        let now = self.clock.now_utc();

        if source.is_rollover() {
            let prior_total = match self.store.daily_committed_seconds().await {
                Ok(total) => total,
                Err(err) => {
                    warn!("rollover falling back to cached total: {err:#}");
                    self.state.lock().await.committed_cache
                }
            };
            if prior_total > 0 {
                let prior_date = self
                    .store
                    .last_reset_date()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| today - chrono::Duration::days(1));
                if let Err(err) = self.store.set_history_total(prior_date, prior_total).await {
                    warn!("failed to snapshot {prior_date} into history: {err:#}");
                }
            }
        }

        if scope.includes_timer() {
            if let Err(err) = self.store.zero_daily_committed().await {
                warn!("failed to zero committed seconds: {err:#}");
            }
            self.state.lock().await.committed_cache = 0;
        }
        if scope.includes_counter() {
            if let Err(err) = self.store.zero_submission_count().await {
                warn!("failed to zero submission count: {err:#}");
            }
            self.state.lock().await.count_cache = 0;
        }

        if let Err(err) = self.store.set_last_reset(today, now).await {
            warn!("failed to record reset bookkeeping: {err:#}");
        }

        if scope == ResetScope::Both || source.is_rollover() {
            let action = match source {
                ResetSource::Manual => EndAction::ManualReset(scope),
                ResetSource::Auto | ResetSource::Midnight => EndAction::MidnightReset,
            };
            self.end_task(action, false).await?;
            self.state.lock().await.tracker.clear_ignore();
        }

        self.emit();
        Ok(())
    }

    // --- sampling ----------------------------------------------------------

    /// Cheap date comparison; performs the day-boundary reset when the
    /// stored last-reset date is not today. Runs at the top of every tick,
    /// on the backup interval, and from the midnight scheduler.
    pub async fn rollover_check(&self, source: ResetSource) -> Result<()> {
        let today = self.clock.today();
        match self.store.last_reset_date().await {
            Ok(Some(date)) if date == today => Ok(()),
            Ok(_) => self.reset(ResetScope::Both, source).await,
            Err(err) => {
                warn!("rollover check could not read last reset date: {err:#}");
                Ok(())
            }
        }
    }

    /// One sampling tick: rollover first, then page-state checks, then the
    /// reading feeds the state machine, then expiry. Each tick completes
    /// before the next is scheduled.
    pub async fn tick(&self, sensor: &dyn PageSensor) {
        if let Err(err) = self.rollover_check(ResetSource::Auto).await {
            warn!("rollover failed: {err:#}");
        }

        let sample = sensor.sample();
        let Some(identity) = sample.identity else {
            let mut state = self.state.lock().await;
            if state.on_task_page {
                state.on_task_page = false;
                drop(state);
                self.emit();
            }
            return;
        };

        {
            let mut state = self.state.lock().await;
            state.on_task_page = true;
        }

        let text = sample.text.unwrap_or_default();
        if page_indicates_expired(&text) {
            let tracked = self.state.lock().await.tracker.active().is_some();
            if tracked {
                if let Err(err) = self.end_task(EndAction::Expired, true).await {
                    warn!("failed to discard expired task: {err:#}");
                }
            } else {
                // Nothing tracked yet; make sure the dead task is not
                // adopted from a late reading.
                self.state.lock().await.tracker.set_ignore(identity);
            }
            return;
        }

        let reading = parse_timer_text(&text);
        let outcome = {
            let mut state = self.state.lock().await;
            state.tracker.observe(&identity, reading, self.clock.now_utc())
        };

        match outcome {
            TickOutcome::Expired => {
                if let Err(err) = self.end_task(EndAction::Expired, true).await {
                    warn!("failed to discard expired task: {err:#}");
                }
            }
            TickOutcome::Adopted | TickOutcome::Updated(_) => self.emit(),
            TickOutcome::Idle | TickOutcome::SignalLoss | TickOutcome::Ignored => {}
        }
    }
}
