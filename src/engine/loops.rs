//! Long-running engine tasks: the sampling ticker, the backup rollover
//! interval, the self-rescheduling midnight timer, and the listener for
//! foreign store writes. All of them shut down through one cancellation
//! token and none of them may crash the engine.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::sensor::PageSensor;
use crate::store::Store;
use crate::{log_info, log_warn};

use super::clock::Clock;
use super::coordinator::Coordinator;
use crate::models::ResetSource;

const ENABLE_LOGS: bool = true;

pub(super) async fn sampling_loop(
    coordinator: Arc<Coordinator>,
    sensor: Arc<dyn PageSensor>,
    tick_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                coordinator.tick(sensor.as_ref()).await;
            }
            _ = cancel.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
        }
    }
}

/// Slow interval that repeats the rollover check, so a process that slept
/// through midnight still rolls the day over shortly after waking.
pub(super) async fn backup_rollover_loop(
    coordinator: Arc<Coordinator>,
    backup_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(backup_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = coordinator.rollover_check(ResetSource::Auto).await {
                    log_warn!("backup rollover check failed: {err:#}");
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// One-shot sleep until the next local midnight, then reschedule. Paired
/// with the per-tick check because long sleeps can fire late or not at all.
pub(super) async fn midnight_loop(
    coordinator: Arc<Coordinator>,
    store: Store,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) {
    loop {
        let wait = clock.until_midnight();
        tokio::select! {
            _ = sleep(wait) => {
                log_info!("midnight timer fired");
                if let Err(err) = coordinator.rollover_check(ResetSource::Midnight).await {
                    log_warn!("midnight rollover failed: {err:#}");
                }
                if let Err(err) = store.set_last_midnight_check(clock.now_utc()).await {
                    log_warn!("failed to record midnight check: {err:#}");
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// Reacts to writes from other engine instances sharing the store:
/// re-reads the shared scalars and notifies subscribers. Never derives
/// local task state from a foreign signal.
pub(super) async fn change_listener(
    coordinator: Arc<Coordinator>,
    store: Store,
    cancel: CancellationToken,
) {
    let own_writer = store.writer_id();
    let mut changes = store.subscribe();

    loop {
        tokio::select! {
            result = changes.recv() => match result {
                Ok(change) if change.writer != own_writer => {
                    coordinator.refresh_shared().await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!("missed {skipped} store notifications, re-reading");
                    coordinator.refresh_shared().await;
                }
                Err(RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
}
