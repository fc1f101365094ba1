use std::sync::OnceLock;

use regex::Regex;

use super::TimerReading;

/// Limit applied when the page shows elapsed time without a maximum.
pub const DEFAULT_LIMIT_SECONDS: u64 = 3600;

/// A matcher is pure: given normalized page text it either produces a
/// reading or declines. They are tried in order and the first hit wins, so
/// the most explicit formats must come first.
type Matcher = fn(&str) -> Option<TimerReading>;

const MATCHERS: &[Matcher] = &[
    match_mmss_of_min_sec,
    match_mmss_of_mmss,
    match_labeled_mmss,
    match_generic_mmss,
];

/// Extract a timer reading from raw visible page text.
///
/// This is a best-effort sensor: any text that does not look like a task
/// timer yields `None`, never an error. Unrelated pages are rejected by a
/// cheap keyword scan before any regex runs.
pub fn parse_timer_text(text: &str) -> Option<TimerReading> {
    let normalized = normalize_whitespace(text);
    if !has_timer_keywords(&normalized) {
        return None;
    }
    MATCHERS.iter().find_map(|matcher| matcher(&normalized))
}

/// True when the page explicitly says the task's time is up, independent of
/// any numeric reading.
pub fn page_indicates_expired(text: &str) -> bool {
    let normalized = normalize_whitespace(text).to_lowercase();
    ["task expired", "task has expired", "time limit reached", "time expired"]
        .iter()
        .any(|phrase| normalized.contains(phrase))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_timer_keywords(text: &str) -> bool {
    let lower = text.to_lowercase();
    // "timer" contains "time", so two probes cover all label variants.
    lower.contains("time") || lower.contains("task") || lower.contains("duration")
}

fn combine(minutes: u64, seconds: u64) -> u64 {
    minutes * 60 + seconds
}

fn capture_u64(captures: &regex::Captures<'_>, index: usize) -> Option<u64> {
    captures.get(index)?.as_str().parse().ok()
}

/// `"Task Time: 02:05 of 60 Min 0 Sec"` -- explicit current and limit.
fn match_mmss_of_min_sec(text: &str) -> Option<TimerReading> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:task\s+)?(?:time|timer|duration)\s*:?\s*(\d{1,4}):(\d{1,2})\s+of\s+(\d{1,4})\s*Min(?:utes?)?\.?\s+(\d{1,2})\s*Sec(?:onds?)?",
        )
        .unwrap()
    });
    let caps = re.captures(text)?;
    let current = combine(capture_u64(&caps, 1)?, capture_u64(&caps, 2)?);
    let limit = combine(capture_u64(&caps, 3)?, capture_u64(&caps, 4)?);
    Some(TimerReading::new(current, limit))
}

/// `"Time 02:05 of 60:00"` or `"Time 02:05/60:00"`.
fn match_mmss_of_mmss(text: &str) -> Option<TimerReading> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:task\s+)?(?:time|timer|duration)\s*:?\s*(\d{1,4}):(\d{1,2})\s*(?:of|/)\s*(\d{1,4}):(\d{1,2})",
        )
        .unwrap()
    });
    let caps = re.captures(text)?;
    let current = combine(capture_u64(&caps, 1)?, capture_u64(&caps, 2)?);
    let limit = combine(capture_u64(&caps, 3)?, capture_u64(&caps, 4)?);
    Some(TimerReading::new(current, limit))
}

/// `"Task Time 02:05"` or `"Timer 02:05"` alone -- current only, limit
/// falls back to one hour. Colon-separated labels are left to the generic
/// matcher below.
fn match_labeled_mmss(text: &str) -> Option<TimerReading> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:task\s+)?(?:time|timer|duration)\s+(\d{1,4}):(\d{1,2})").unwrap()
    });
    let caps = re.captures(text)?;
    let current = combine(capture_u64(&caps, 1)?, capture_u64(&caps, 2)?);
    Some(TimerReading::new(current, DEFAULT_LIMIT_SECONDS))
}

/// Last-resort `"Time: 02:05"` style match with a mandatory colon label.
fn match_generic_mmss(text: &str) -> Option<TimerReading> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:time|timer|duration)\s*:\s*(\d{1,4}):(\d{1,2})").unwrap()
    });
    let caps = re.captures(text)?;
    let current = combine(capture_u64(&caps, 1)?, capture_u64(&caps, 2)?);
    Some(TimerReading::new(current, DEFAULT_LIMIT_SECONDS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_min_sec_limit() {
        let reading = parse_timer_text("Task Time: 02:05 of 60 Min 0 Sec").unwrap();
        assert_eq!(reading.current_seconds, 125);
        assert_eq!(reading.limit_seconds, 3600);
    }

    #[test]
    fn parses_mmss_of_mmss() {
        let reading = parse_timer_text("Time 01:30 of 90:00").unwrap();
        assert_eq!(reading.current_seconds, 90);
        assert_eq!(reading.limit_seconds, 5400);

        let slash = parse_timer_text("Timer: 00:45/10:00").unwrap();
        assert_eq!(slash.current_seconds, 45);
        assert_eq!(slash.limit_seconds, 600);
    }

    #[test]
    fn bare_label_falls_back_to_default_limit() {
        let reading = parse_timer_text("Task Time 12:00").unwrap();
        assert_eq!(reading.current_seconds, 720);
        assert_eq!(reading.limit_seconds, DEFAULT_LIMIT_SECONDS);

        // A label with neither a "task" prefix nor a colon still reads.
        let bare = parse_timer_text("Timer 02:05").unwrap();
        assert_eq!(bare.current_seconds, 125);
        assert_eq!(bare.limit_seconds, DEFAULT_LIMIT_SECONDS);
    }

    #[test]
    fn generic_label_is_the_last_resort() {
        let reading = parse_timer_text("Duration: 00:09").unwrap();
        assert_eq!(reading.current_seconds, 9);
        assert_eq!(reading.limit_seconds, DEFAULT_LIMIT_SECONDS);
    }

    #[test]
    fn first_matching_pattern_wins() {
        // Text satisfying pattern 1 must not be re-read by the looser
        // patterns (which would drop the explicit limit).
        let reading =
            parse_timer_text("Task Time: 05:00 of 30 Min 0 Sec remaining today 08:00").unwrap();
        assert_eq!(reading.current_seconds, 300);
        assert_eq!(reading.limit_seconds, 1800);
    }

    #[test]
    fn unrelated_text_yields_nothing() {
        assert_eq!(parse_timer_text("Welcome back! You have 3 new messages"), None);
        assert_eq!(parse_timer_text(""), None);
        // Keyword present but no numeric timer.
        assert_eq!(parse_timer_text("Task queue is empty"), None);
    }

    #[test]
    fn whitespace_is_normalized_before_matching() {
        let reading = parse_timer_text("Task  Time:\n  02:05   of   60 Min   0 Sec").unwrap();
        assert_eq!(reading.current_seconds, 125);
        assert_eq!(reading.limit_seconds, 3600);
    }

    #[test]
    fn detects_explicit_expiration_text() {
        assert!(page_indicates_expired("This task has expired."));
        assert!(page_indicates_expired("TIME LIMIT REACHED"));
        assert!(!page_indicates_expired("Task Time: 02:05"));
    }
}
