mod clock;
mod coordinator;
mod loops;
mod tracker;

pub use clock::{Clock, SystemClock};
pub use coordinator::{Coordinator, EngineEvent, Snapshot};
pub use tracker::{TaskTracker, TickOutcome};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::guard;
use crate::models::{EndAction, ResetScope, ResetSource};
use crate::sensor::PageSensor;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page-context key for the cross-instance guard; one engine per
    /// context per process.
    pub context: String,
    pub tick_interval: Duration,
    pub backup_rollover_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context: "tasktally".to_string(),
            tick_interval: Duration::from_secs(1),
            backup_rollover_interval: Duration::from_secs(60),
        }
    }
}

/// The query/command surface consumed by UI collaborators. Owns the
/// background loops; dropping or shutting down an engine stops sampling
/// and releases its context claim.
pub struct Engine {
    coordinator: Arc<Coordinator>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    context: String,
}

impl Engine {
    /// Start an engine for the given context, or decline if one is already
    /// running there. A declined launch registers nothing: no timers, no
    /// state, no store writes.
    pub async fn try_launch(
        store: &Store,
        sensor: Arc<dyn PageSensor>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Option<Engine>> {
        if !guard::try_register(&config.context) {
            warn!(
                "engine already running for context '{}', this instance will not start",
                config.context
            );
            return Ok(None);
        }

        let store = store.for_instance();
        let coordinator = Arc::new(Coordinator::new(store.clone(), Arc::clone(&clock)));

        coordinator.refresh_shared().await;
        // Catch up on a missed day boundary before the first sample runs.
        if let Err(err) = coordinator.rollover_check(ResetSource::Auto).await {
            warn!("startup rollover check failed: {err:#}");
        }

        let cancel = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(loops::sampling_loop(
                Arc::clone(&coordinator),
                sensor,
                config.tick_interval,
                cancel.clone(),
            )),
            tokio::spawn(loops::backup_rollover_loop(
                Arc::clone(&coordinator),
                config.backup_rollover_interval,
                cancel.clone(),
            )),
            tokio::spawn(loops::midnight_loop(
                Arc::clone(&coordinator),
                store.clone(),
                Arc::clone(&clock),
                cancel.clone(),
            )),
            tokio::spawn(loops::change_listener(
                Arc::clone(&coordinator),
                store,
                cancel.clone(),
            )),
        ];

        info!("engine started for context '{}'", config.context);
        Ok(Some(Engine {
            coordinator,
            cancel,
            tasks,
            context: config.context,
        }))
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.coordinator.snapshot().await
    }

    /// Commit the tracked task's elapsed time; returns the committed
    /// seconds, 0 when there was nothing to commit.
    pub async fn commit(&self) -> Result<u64> {
        self.coordinator.commit().await
    }

    pub async fn discard(&self, reason: EndAction) -> Result<()> {
        self.coordinator.discard(reason).await
    }

    pub async fn reset(&self, scope: ResetScope) -> Result<()> {
        self.coordinator.reset(scope, ResetSource::Manual).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.coordinator.subscribe()
    }

    /// Stop all loops and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                warn!("engine task failed to join: {err}");
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cancel.cancel();
        guard::release(&self.context);
    }
}
