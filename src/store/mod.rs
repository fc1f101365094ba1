//! Durable engine state: daily committed seconds, submission count, per-day
//! history and the capped session log, all behind a single SQLite
//! connection owned by a dedicated worker thread. Every write is serialized
//! through that thread; other engine instances on the same store learn
//! about writes through a broadcast change signal tagged with the writer's
//! instance id.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

mod migrations;

use crate::models::{EndAction, HistoryEntry, SessionRecord};
use migrations::run_migrations;

/// Daily totals above a full day are treated as corrupted and clamped.
pub const MAX_DAILY_SECONDS: u64 = 86_400;
/// History entries older than this many days are pruned on every write.
pub const HISTORY_RETENTION_DAYS: i64 = 30;
/// Session log cap; oldest records are dropped first.
pub const MAX_SESSION_RECORDS: usize = 500;
/// Degraded-capacity size after a failed write forces a shrink.
const SHRINK_KEEP_RECORDS: usize = MAX_SESSION_RECORDS / 2;

const KEY_DAILY_SECONDS: &str = "daily_committed_seconds";
const KEY_SUBMISSION_COUNT: &str = "submission_count";
const KEY_LAST_RESET_DATE: &str = "last_reset_date";
const KEY_LAST_RESET_AT: &str = "last_reset_at";
const KEY_LAST_MIDNIGHT_CHECK: &str = "last_midnight_check";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fired after every successful write. Receivers compare `writer` against
/// their own instance id and only react to foreign writes.
#[derive(Debug, Clone, Copy)]
pub struct StoreChange {
    pub writer: Uuid,
}

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
    writer: Uuid,
}

impl Store {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create store directory {}", parent.display())
                })?;
            }
        }
        Self::spawn_worker(move || {
            Connection::open(&db_path).context("failed to open SQLite store")
        })
    }

    /// Private throwaway store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::spawn_worker(|| {
            Connection::open_in_memory().context("failed to open in-memory store")
        })
    }

    fn spawn_worker<F>(open: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Connection> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (changes, _) = broadcast::channel(64);

        let worker = thread::Builder::new()
            .name("tasktally-store".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result = run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => task(&mut conn),
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .context("failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
                changes,
            }),
            writer: Uuid::new_v4(),
        })
    }

    /// Same underlying store, fresh writer identity. Each engine instance
    /// writes through its own handle so it can ignore its own change
    /// notifications.
    pub fn for_instance(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            writer: Uuid::new_v4(),
        }
    }

    pub fn writer_id(&self) -> Uuid {
        self.writer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    /// Run a write with the degraded-capacity recovery path: on failure,
    /// shrink the session log to free space and retry once. A second
    /// failure surfaces to the caller, which drops the write and keeps
    /// operating on its in-memory mirror.
    async fn write<F>(&self, label: &'static str, op: F) -> Result<()>
    where
        F: Fn(&mut Connection) -> Result<()> + Clone + Send + Sync + 'static,
    {
        self.write_value(label, op).await
    }

    /// Same recovery path for writes that also produce a value, such as the
    /// read-modify-write scalars.
    async fn write_value<F, T>(&self, label: &'static str, op: F) -> Result<T>
    where
        F: Fn(&mut Connection) -> Result<T> + Clone + Send + Sync + 'static,
        T: Send + 'static,
    {
        match self.execute(op.clone()).await {
            Ok(value) => {
                self.notify();
                Ok(value)
            }
            Err(first_err) => {
                warn!("store write '{label}' failed, shrinking session log and retrying: {first_err:#}");
                if let Err(shrink_err) = self
                    .execute(|conn| shrink_sessions(conn, SHRINK_KEEP_RECORDS))
                    .await
                {
                    warn!("session log shrink failed: {shrink_err:#}");
                }
                let value = self
                    .execute(op)
                    .await
                    .with_context(|| format!("store write '{label}' failed after retry"))?;
                self.notify();
                Ok(value)
            }
        }
    }

    fn notify(&self) {
        let _ = self.inner.changes.send(StoreChange { writer: self.writer });
    }

    // --- daily scalars -----------------------------------------------------

    pub async fn daily_committed_seconds(&self) -> Result<u64> {
        self.execute(|conn| {
            let raw = meta_get(conn, KEY_DAILY_SECONDS)?;
            Ok(clamp_daily_seconds(raw.as_deref()))
        })
        .await
    }

    pub async fn add_committed_seconds(&self, seconds: u64) -> Result<u64> {
        self.write_value("add committed seconds", move |conn| {
            let current = clamp_daily_seconds(meta_get(conn, KEY_DAILY_SECONDS)?.as_deref());
            let next = current.saturating_add(seconds).min(MAX_DAILY_SECONDS);
            meta_set(conn, KEY_DAILY_SECONDS, &next.to_string())?;
            Ok(next)
        })
        .await
    }

    pub async fn zero_daily_committed(&self) -> Result<()> {
        self.write("zero daily committed", |conn| {
            meta_set(conn, KEY_DAILY_SECONDS, "0")
        })
        .await
    }

    pub async fn submission_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let raw = meta_get(conn, KEY_SUBMISSION_COUNT)?;
            Ok(clamp_count(raw.as_deref()))
        })
        .await
    }

    pub async fn increment_submission_count(&self) -> Result<u64> {
        self.write_value("increment submission count", |conn| {
            let next = clamp_count(meta_get(conn, KEY_SUBMISSION_COUNT)?.as_deref()) + 1;
            meta_set(conn, KEY_SUBMISSION_COUNT, &next.to_string())?;
            Ok(next)
        })
        .await
    }

    pub async fn zero_submission_count(&self) -> Result<()> {
        self.write("zero submission count", |conn| {
            meta_set(conn, KEY_SUBMISSION_COUNT, "0")
        })
        .await
    }

    // --- reset bookkeeping -------------------------------------------------

    pub async fn last_reset_date(&self) -> Result<Option<NaiveDate>> {
        self.execute(|conn| {
            let raw = meta_get(conn, KEY_LAST_RESET_DATE)?;
            Ok(raw.and_then(|value| {
                NaiveDate::parse_from_str(&value, DATE_FORMAT)
                    .map_err(|err| warn!("discarding malformed last reset date '{value}': {err}"))
                    .ok()
            }))
        })
        .await
    }

    pub async fn set_last_reset(&self, date: NaiveDate, at: DateTime<Utc>) -> Result<()> {
        self.write("set last reset", move |conn| {
            meta_set(conn, KEY_LAST_RESET_DATE, &date.format(DATE_FORMAT).to_string())?;
            meta_set(conn, KEY_LAST_RESET_AT, &at.to_rfc3339())
        })
        .await
    }

    pub async fn last_reset_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.read_datetime(KEY_LAST_RESET_AT).await
    }

    pub async fn last_midnight_check(&self) -> Result<Option<DateTime<Utc>>> {
        self.read_datetime(KEY_LAST_MIDNIGHT_CHECK).await
    }

    pub async fn set_last_midnight_check(&self, at: DateTime<Utc>) -> Result<()> {
        self.write("set last midnight check", move |conn| {
            meta_set(conn, KEY_LAST_MIDNIGHT_CHECK, &at.to_rfc3339())
        })
        .await
    }

    async fn read_datetime(&self, key: &'static str) -> Result<Option<DateTime<Utc>>> {
        self.execute(move |conn| {
            let raw = meta_get(conn, key)?;
            Ok(raw.and_then(|value| {
                parse_datetime(&value)
                    .map_err(|err| warn!("discarding malformed '{key}' value: {err}"))
                    .ok()
            }))
        })
        .await
    }

    // --- history -----------------------------------------------------------

    /// Fold committed seconds into the day's entry (and its hourly bucket),
    /// pruning entries beyond the retention window.
    pub async fn add_history_seconds(
        &self,
        date: NaiveDate,
        hour: u32,
        seconds: u64,
    ) -> Result<()> {
        self.write("add history seconds", move |conn| {
            let mut entry = load_history_entry(conn, date)?.unwrap_or_else(|| HistoryEntry::new(date, 0));
            entry.total_seconds = entry.total_seconds.saturating_add(seconds);
            *entry.hourly.entry(hour).or_insert(0) += seconds;
            store_history_entry(conn, &entry)?;
            prune_history(conn, date)
        })
        .await
    }

    /// Overwrite a day's final total (rollover snapshot), preserving any
    /// hourly breakdown already recorded.
    pub async fn set_history_total(&self, date: NaiveDate, total_seconds: u64) -> Result<()> {
        self.write("set history total", move |conn| {
            let mut entry = load_history_entry(conn, date)?.unwrap_or_else(|| HistoryEntry::new(date, 0));
            entry.total_seconds = total_seconds;
            store_history_entry(conn, &entry)?;
            prune_history(conn, date)
        })
        .await
    }

    pub async fn history_entries(&self) -> Result<Vec<HistoryEntry>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT date, total_seconds, hourly FROM history ORDER BY date ASC")?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                let raw_date: String = row.get(0)?;
                let Ok(date) = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT) else {
                    warn!("skipping history row with malformed date '{raw_date}'");
                    continue;
                };
                let total: i64 = row.get(1)?;
                let hourly: Option<String> = row.get(2)?;
                entries.push(HistoryEntry {
                    date,
                    total_seconds: clamp_history_total(total, &raw_date),
                    hourly: parse_hourly(hourly.as_deref()),
                });
            }
            Ok(entries)
        })
        .await
    }

    // --- session log -------------------------------------------------------

    pub async fn append_session(&self, record: SessionRecord) -> Result<()> {
        self.write("append session", move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sessions (id, task_id, ended_at, duration_seconds, action)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.task_id,
                    record.ended_at.to_rfc3339(),
                    to_i64(record.duration_seconds)?,
                    record.action.as_str(),
                ],
            )
            .context("failed to insert session record")?;
            shrink_sessions(conn, MAX_SESSION_RECORDS)
        })
        .await
    }

    /// Newest first.
    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, ended_at, duration_seconds, action
                 FROM sessions
                 ORDER BY ended_at DESC, rowid DESC
                 LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![limit as i64])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let action_raw: String = row.get(4)?;
                let Some(action) = EndAction::from_str(&action_raw) else {
                    warn!("skipping session row with unknown action '{action_raw}'");
                    continue;
                };
                let raw_ended: String = row.get(2)?;
                let Ok(ended_at) = parse_datetime(&raw_ended) else {
                    warn!("skipping session row with malformed timestamp '{raw_ended}'");
                    continue;
                };
                let duration: i64 = row.get(3)?;
                records.push(SessionRecord {
                    id: row.get(0)?,
                    task_id: row.get(1)?,
                    ended_at,
                    duration_seconds: duration.max(0) as u64,
                    action,
                });
            }
            Ok(records)
        })
        .await
    }
}

fn meta_get(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .with_context(|| format!("failed to read meta key '{key}'"))
}

fn meta_set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .with_context(|| format!("failed to write meta key '{key}'"))?;
    Ok(())
}

/// Self-healing read of the daily total: non-numeric, negative or >24h
/// values are recoverable anomalies, clamped rather than propagated.
fn clamp_daily_seconds(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else { return 0 };
    match raw.parse::<i64>() {
        Ok(value) if value < 0 => {
            warn!("clamping negative daily total {value} to 0");
            0
        }
        Ok(value) if value as u64 > MAX_DAILY_SECONDS => {
            warn!("clamping out-of-range daily total {value} to {MAX_DAILY_SECONDS}");
            MAX_DAILY_SECONDS
        }
        Ok(value) => value as u64,
        Err(_) => {
            warn!("discarding malformed daily total '{raw}'");
            0
        }
    }
}

fn clamp_count(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else { return 0 };
    match raw.parse::<i64>() {
        Ok(value) if value >= 0 => value as u64,
        Ok(value) => {
            warn!("clamping negative submission count {value} to 0");
            0
        }
        Err(_) => {
            warn!("discarding malformed submission count '{raw}'");
            0
        }
    }
}

fn clamp_history_total(total: i64, date: &str) -> u64 {
    if total < 0 {
        warn!("clamping negative history total for {date}");
        0
    } else if total as u64 > MAX_DAILY_SECONDS {
        warn!("clamping out-of-range history total for {date}");
        MAX_DAILY_SECONDS
    } else {
        total as u64
    }
}

fn parse_hourly(raw: Option<&str>) -> BTreeMap<u32, u64> {
    let Some(raw) = raw else {
        return BTreeMap::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!("discarding malformed hourly buckets: {err}");
        BTreeMap::new()
    })
}

fn load_history_entry(conn: &Connection, date: NaiveDate) -> Result<Option<HistoryEntry>> {
    let key = date.format(DATE_FORMAT).to_string();
    let row = conn
        .query_row(
            "SELECT total_seconds, hourly FROM history WHERE date = ?1",
            params![key],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()
        .context("failed to read history entry")?;

    Ok(row.map(|(total, hourly)| HistoryEntry {
        date,
        total_seconds: clamp_history_total(total, &date.format(DATE_FORMAT).to_string()),
        hourly: parse_hourly(hourly.as_deref()),
    }))
}

fn store_history_entry(conn: &Connection, entry: &HistoryEntry) -> Result<()> {
    let hourly = serde_json::to_string(&entry.hourly).context("failed to encode hourly buckets")?;
    conn.execute(
        "INSERT INTO history (date, total_seconds, hourly) VALUES (?1, ?2, ?3)
         ON CONFLICT(date) DO UPDATE SET total_seconds = excluded.total_seconds,
                                         hourly = excluded.hourly",
        params![
            entry.date.format(DATE_FORMAT).to_string(),
            to_i64(entry.total_seconds)?,
            hourly,
        ],
    )
    .context("failed to write history entry")?;
    Ok(())
}

fn prune_history(conn: &Connection, newest: NaiveDate) -> Result<()> {
    let cutoff = newest - Duration::days(HISTORY_RETENTION_DAYS);
    conn.execute(
        "DELETE FROM history WHERE date < ?1",
        params![cutoff.format(DATE_FORMAT).to_string()],
    )
    .context("failed to prune history")?;
    Ok(())
}

fn shrink_sessions(conn: &Connection, keep: usize) -> Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE id NOT IN (
             SELECT id FROM sessions ORDER BY ended_at DESC, rowid DESC LIMIT ?1
         )",
        params![keep as i64],
    )
    .context("failed to cap session log")?;
    Ok(())
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(task_id: &str, at: DateTime<Utc>, duration: u64) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            ended_at: at,
            duration_seconds: duration,
            action: EndAction::Submitted,
        }
    }

    #[tokio::test]
    async fn scalars_start_at_zero_and_accumulate() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.daily_committed_seconds().await.unwrap(), 0);
        assert_eq!(store.submission_count().await.unwrap(), 0);

        assert_eq!(store.add_committed_seconds(300).await.unwrap(), 300);
        assert_eq!(store.add_committed_seconds(45).await.unwrap(), 345);
        assert_eq!(store.daily_committed_seconds().await.unwrap(), 345);

        store.increment_submission_count().await.unwrap();
        assert_eq!(store.submission_count().await.unwrap(), 1);

        store.zero_daily_committed().await.unwrap();
        store.zero_submission_count().await.unwrap();
        assert_eq!(store.daily_committed_seconds().await.unwrap(), 0);
        assert_eq!(store.submission_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_daily_total_is_clamped_on_read() {
        let store = Store::open_in_memory().unwrap();
        store
            .execute(|conn| meta_set(conn, KEY_DAILY_SECONDS, "-120"))
            .await
            .unwrap();
        assert_eq!(store.daily_committed_seconds().await.unwrap(), 0);

        store
            .execute(|conn| meta_set(conn, KEY_DAILY_SECONDS, "999999"))
            .await
            .unwrap();
        assert_eq!(store.daily_committed_seconds().await.unwrap(), MAX_DAILY_SECONDS);

        store
            .execute(|conn| meta_set(conn, KEY_DAILY_SECONDS, "not-a-number"))
            .await
            .unwrap();
        assert_eq!(store.daily_committed_seconds().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn session_log_is_capped_oldest_first() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap();
        for i in 0..(MAX_SESSION_RECORDS + 10) {
            let at = base + Duration::seconds(i as i64);
            store
                .append_session(record(&format!("/task/{i}"), at, 60))
                .await
                .unwrap();
        }

        let sessions = store.recent_sessions(MAX_SESSION_RECORDS * 2).await.unwrap();
        assert_eq!(sessions.len(), MAX_SESSION_RECORDS);
        // Newest kept, oldest dropped.
        assert_eq!(sessions[0].task_id, format!("/task/{}", MAX_SESSION_RECORDS + 9));
        assert!(sessions.iter().all(|s| s.task_id != "/task/0"));
    }

    #[tokio::test]
    async fn history_writes_prune_beyond_retention() {
        let store = Store::open_in_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();
        let stale = today - Duration::days(HISTORY_RETENTION_DAYS + 5);
        let recent = today - Duration::days(3);

        store.set_history_total(stale, 1000).await.unwrap();
        store.set_history_total(recent, 2000).await.unwrap();
        store.add_history_seconds(today, 9, 300).await.unwrap();

        let entries = store.history_entries().await.unwrap();
        let dates: Vec<NaiveDate> = entries.iter().map(|e| e.date).collect();
        assert!(!dates.contains(&stale));
        assert!(dates.contains(&recent));

        let todays = entries.iter().find(|e| e.date == today).unwrap();
        assert_eq!(todays.total_seconds, 300);
        assert_eq!(todays.hourly.get(&9), Some(&300));
    }

    #[tokio::test]
    async fn rollover_snapshot_preserves_hourly_buckets() {
        let store = Store::open_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        store.add_history_seconds(day, 10, 120).await.unwrap();
        store.set_history_total(day, 500).await.unwrap();

        let entries = store.history_entries().await.unwrap();
        let entry = entries.iter().find(|e| e.date == day).unwrap();
        assert_eq!(entry.total_seconds, 500);
        assert_eq!(entry.hourly.get(&10), Some(&120));
    }

    #[tokio::test]
    async fn last_reset_round_trips() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.last_reset_date().await.unwrap().is_none());

        let date = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 8, 28, 0, 0, 5).unwrap();
        store.set_last_reset(date, at).await.unwrap();

        assert_eq!(store.last_reset_date().await.unwrap(), Some(date));
        assert_eq!(store.last_reset_at().await.unwrap(), Some(at));
    }

    #[tokio::test]
    async fn failed_scalar_write_shrinks_the_session_log_before_retrying() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap();
        for i in 0..300 {
            let at = base + Duration::seconds(i as i64);
            store
                .append_session(record(&format!("/task/{i}"), at, 60))
                .await
                .unwrap();
        }

        // Break the meta table so every scalar write fails on both attempts.
        store
            .execute(|conn| {
                conn.execute_batch("DROP TABLE meta")?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(store.add_committed_seconds(60).await.is_err());

        // The recovery path freed session-log space between the attempts.
        let sessions = store.recent_sessions(MAX_SESSION_RECORDS).await.unwrap();
        assert_eq!(sessions.len(), SHRINK_KEEP_RECORDS);
        assert_eq!(sessions[0].task_id, "/task/299");
    }

    #[tokio::test]
    async fn change_notifications_carry_the_writer_id() {
        let store = Store::open_in_memory().unwrap();
        let other = store.for_instance();
        assert_ne!(store.writer_id(), other.writer_id());

        let mut changes = store.subscribe();
        other.add_committed_seconds(60).await.unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.writer, other.writer_id());
        assert_ne!(change.writer, store.writer_id());
    }
}
