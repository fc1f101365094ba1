//! Export contracts for external tooling: a JSON dump of the durable state
//! and two CSV shapes (per-session and per-day summary). Rows contain only
//! dates and numbers, so no quoting is needed.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::engine::Snapshot;
use crate::models::{EndAction, HistoryEntry, SessionRecord};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    history: &'a [HistoryEntry],
    sessions: &'a [SessionRecord],
    daily_committed_seconds: u64,
    submission_count: u64,
    last_reset_date: Option<NaiveDate>,
}

pub fn to_json(snapshot: &Snapshot) -> Result<String> {
    let export = JsonExport {
        history: &snapshot.history,
        sessions: &snapshot.sessions,
        daily_committed_seconds: snapshot.committed_seconds,
        submission_count: snapshot.submission_count,
        last_reset_date: snapshot.last_reset_date,
    };
    serde_json::to_string_pretty(&export).context("failed to serialize export")
}

/// One row per session record: date, start, stop, duration in seconds.
/// Start is derived by walking the recorded duration back from the end.
pub fn sessions_csv(sessions: &[SessionRecord]) -> String {
    let mut out = String::from("date,start,stop,duration_seconds\n");
    for record in sessions {
        let stop = record.ended_at;
        let start = stop - Duration::seconds(record.duration_seconds as i64);
        out.push_str(&format!(
            "{},{},{},{}\n",
            stop.format("%Y-%m-%d"),
            start.format("%H:%M:%S"),
            stop.format("%H:%M:%S"),
            record.duration_seconds,
        ));
    }
    out
}

/// One row per history date: date, formatted duration, raw seconds, and the
/// number of submitted sessions that day.
pub fn summary_csv(history: &[HistoryEntry], sessions: &[SessionRecord]) -> String {
    let mut out = String::from("date,duration,seconds,count\n");
    for entry in history {
        let count = sessions
            .iter()
            .filter(|record| {
                record.action == EndAction::Submitted
                    && record.ended_at.date_naive() == entry.date
            })
            .count();
        out.push_str(&format!(
            "{},{},{},{}\n",
            entry.date.format("%Y-%m-%d"),
            format_duration(entry.total_seconds),
            entry.total_seconds,
            count,
        ));
    }
    out
}

pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    format!("{hours}h {minutes:02}m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn record(action: EndAction, day: u32, duration: u64) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4().to_string(),
            task_id: "/task/1".to_string(),
            ended_at: Utc.with_ymd_and_hms(2026, 8, day, 10, 30, 0).unwrap(),
            duration_seconds: duration,
            action,
        }
    }

    #[test]
    fn formats_durations_as_hours_and_minutes() {
        assert_eq!(format_duration(0), "0h 00m");
        assert_eq!(format_duration(125), "0h 02m");
        assert_eq!(format_duration(7380), "2h 03m");
    }

    #[test]
    fn sessions_csv_walks_start_back_from_stop() {
        let csv = sessions_csv(&[record(EndAction::Submitted, 28, 300)]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("date,start,stop,duration_seconds"));
        assert_eq!(lines.next(), Some("2026-08-28,10:25:00,10:30:00,300"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn summary_csv_counts_only_submitted_sessions_per_day() {
        let history = vec![
            HistoryEntry::new(NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(), 7380),
            HistoryEntry::new(NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(), 300),
        ];
        let sessions = vec![
            record(EndAction::Submitted, 27, 3600),
            record(EndAction::Submitted, 27, 3780),
            record(EndAction::Expired, 27, 100),
            record(EndAction::Submitted, 28, 300),
        ];

        let csv = summary_csv(&history, &sessions);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,duration,seconds,count");
        assert_eq!(lines[1], "2026-08-27,2h 03m,7380,2");
        assert_eq!(lines[2], "2026-08-28,0h 05m,300,1");
    }
}
