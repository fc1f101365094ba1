use chrono::{DateTime, Utc};

use crate::models::{ActiveTask, TaskStatus};
use crate::reading::TimerReading;

/// What one observation did to the tracked task. The tracker itself never
/// touches storage; the coordinator turns `Expired` into a discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No reading, nothing tracked.
    Idle,
    /// A task is tracked but this tick produced no reading. Not a discard:
    /// the page may be mid-transition, so the coordinator decides from
    /// accompanying page signals.
    SignalLoss,
    /// A task was adopted (first sighting, identity switch, or a
    /// page-reset re-seed after the reading went backwards).
    Adopted,
    /// Same task, reading applied; carries the derived status.
    Updated(TaskStatus),
    /// The reading reached the limit; the task must be discarded.
    Expired,
    /// Reading for an id under an ignore marker; not adopted.
    Ignored,
}

/// The task state machine: at most one `ActiveTask`, advanced by one
/// `(identity, reading)` observation per sampling tick.
#[derive(Debug, Default)]
pub struct TaskTracker {
    active: Option<ActiveTask>,
    ignore_marker: Option<String>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ActiveTask> {
        self.active.as_ref()
    }

    pub fn pending_seconds(&self) -> u64 {
        self.active.as_ref().map_or(0, |task| task.current_seconds)
    }

    pub fn take_active(&mut self) -> Option<ActiveTask> {
        self.active.take()
    }

    pub fn set_ignore(&mut self, task_id: String) {
        self.ignore_marker = Some(task_id);
    }

    pub fn clear_ignore(&mut self) {
        self.ignore_marker = None;
    }

    /// Drop the marker only if it points at the given task.
    pub fn clear_ignore_if(&mut self, task_id: &str) {
        if self.ignore_marker.as_deref() == Some(task_id) {
            self.ignore_marker = None;
        }
    }

    pub fn is_ignored(&self, task_id: &str) -> bool {
        self.ignore_marker.as_deref() == Some(task_id)
    }

    pub fn observe(
        &mut self,
        identity: &str,
        reading: Option<TimerReading>,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let Some(reading) = reading else {
            return if self.active.is_some() {
                TickOutcome::SignalLoss
            } else {
                TickOutcome::Idle
            };
        };

        let outcome = match &mut self.active {
            Some(task) if task.id == identity => {
                if reading.current_seconds < task.last_observed_seconds {
                    // The page restarted this task's timer. Never a
                    // subtraction: re-seed the pending time from scratch.
                    self.ignore_marker = None;
                    *task = ActiveTask::seed(identity.to_string(), &reading, now);
                    TickOutcome::Adopted
                } else {
                    task.status = if reading.current_seconds == task.last_observed_seconds {
                        TaskStatus::Paused
                    } else {
                        TaskStatus::Active
                    };
                    task.current_seconds = reading.current_seconds;
                    task.limit_seconds = reading.limit_seconds;
                    task.last_observed_seconds = reading.current_seconds;
                    TickOutcome::Updated(task.status)
                }
            }
            _ => {
                if self.is_ignored(identity) {
                    return TickOutcome::Ignored;
                }
                // A different identity means navigation happened, so any
                // marker for the previous task is moot.
                self.ignore_marker = None;
                self.active = Some(ActiveTask::seed(identity.to_string(), &reading, now));
                TickOutcome::Adopted
            }
        };

        // Expiry is evaluated after the state update so the final reading
        // is reflected in the task handed to the discard path.
        if self.active.as_ref().is_some_and(|task| task.is_over_limit()) {
            return TickOutcome::Expired;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 28, 9, 0, 0).unwrap()
    }

    fn reading(current: u64, limit: u64) -> Option<TimerReading> {
        Some(TimerReading::new(current, limit))
    }

    #[test]
    fn idle_without_reading_or_task() {
        let mut tracker = TaskTracker::new();
        assert_eq!(tracker.observe("/task/1", None, now()), TickOutcome::Idle);
        assert!(tracker.active().is_none());
    }

    #[test]
    fn signal_loss_keeps_the_task() {
        let mut tracker = TaskTracker::new();
        tracker.observe("/task/1", reading(50, 3600), now());
        assert_eq!(tracker.observe("/task/1", None, now()), TickOutcome::SignalLoss);
        assert_eq!(tracker.pending_seconds(), 50);
    }

    #[test]
    fn equal_readings_pause_increasing_readings_resume() {
        let mut tracker = TaskTracker::new();
        assert_eq!(
            tracker.observe("/task/1", reading(125, 3600), now()),
            TickOutcome::Adopted
        );
        assert_eq!(tracker.active().unwrap().status, TaskStatus::Active);

        assert_eq!(
            tracker.observe("/task/1", reading(125, 3600), now()),
            TickOutcome::Updated(TaskStatus::Paused)
        );
        assert_eq!(tracker.pending_seconds(), 125);

        assert_eq!(
            tracker.observe("/task/1", reading(126, 3600), now()),
            TickOutcome::Updated(TaskStatus::Active)
        );
        assert_eq!(tracker.pending_seconds(), 126);
    }

    #[test]
    fn identity_switch_starts_fresh() {
        let mut tracker = TaskTracker::new();
        tracker.observe("/task/7", reading(50, 3600), now());
        assert_eq!(
            tracker.observe("/task/8", reading(10, 3600), now()),
            TickOutcome::Adopted
        );
        let task = tracker.active().unwrap();
        assert_eq!(task.id, "/task/8");
        assert_eq!(task.current_seconds, 10);
    }

    #[test]
    fn over_limit_reading_expires_even_on_adoption() {
        let mut tracker = TaskTracker::new();
        assert_eq!(
            tracker.observe("/task/1", reading(3601, 3600), now()),
            TickOutcome::Expired
        );
        // The task is still held so the coordinator can log its duration.
        assert_eq!(tracker.active().unwrap().current_seconds, 3601);
    }

    #[test]
    fn reaching_the_limit_expires_a_tracked_task() {
        let mut tracker = TaskTracker::new();
        tracker.observe("/task/1", reading(3599, 3600), now());
        assert_eq!(
            tracker.observe("/task/1", reading(3600, 3600), now()),
            TickOutcome::Expired
        );
    }

    #[test]
    fn ignored_id_is_not_readopted() {
        let mut tracker = TaskTracker::new();
        tracker.set_ignore("/task/9".to_string());
        assert_eq!(
            tracker.observe("/task/9", reading(40, 3600), now()),
            TickOutcome::Ignored
        );
        assert!(tracker.active().is_none());

        // A different id clears the stale marker and is adopted.
        assert_eq!(
            tracker.observe("/task/10", reading(5, 3600), now()),
            TickOutcome::Adopted
        );
        assert!(!tracker.is_ignored("/task/9"));
    }

    #[test]
    fn backwards_reading_reseeds_without_subtracting() {
        let mut tracker = TaskTracker::new();
        tracker.observe("/task/1", reading(200, 3600), now());
        tracker.set_ignore("/task/1".to_string());

        assert_eq!(
            tracker.observe("/task/1", reading(3, 3600), now()),
            TickOutcome::Adopted
        );
        let task = tracker.active().unwrap();
        assert_eq!(task.current_seconds, 3);
        assert_eq!(task.last_observed_seconds, 3);
        assert!(!tracker.is_ignored("/task/1"));
    }
}
