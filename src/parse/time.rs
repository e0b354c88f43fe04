//! Timestamp and duration parsing for login records.

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Formats tried against `last -F` / `lastb -F` timestamps, in priority
/// order. The first two differ only in day padding; chrono accepts both
/// spellings for either, but the table mirrors the wtmp variants seen in
/// the wild.
const LOGIN_TIME_FORMATS: &[(&str, usize)] = &[
    // "Mon Dec 25 10:30:00 2023" (space- or zero-padded day)
    ("%a %b %e %H:%M:%S %Y", 5),
    ("%a %b %d %H:%M:%S %Y", 5),
    // "2023-12-25 10:30:00"
    ("%Y-%m-%d %H:%M:%S", 2),
];

static IDLE_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:\.\d+)?s$").expect("invalid idle seconds regex"));
static IDLE_HOURS_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d{2})$").expect("invalid idle h:mm regex"));
static IDLE_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)day").expect("invalid idle days regex"));

/// Converts a naive local timestamp to Unix milliseconds, resolving DST
/// ambiguity to the earlier instant.
fn local_ms(naive: NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// Parses a login timestamp out of the whitespace-separated fields that
/// follow the ip column in `last`/`lastb` output.
///
/// Returns `None` when no format in the table matches; the caller is
/// expected to substitute the current wall-clock and flag the record as
/// inferred.
pub fn parse_login_time(fields: &[&str]) -> Option<i64> {
    for (format, token_count) in LOGIN_TIME_FORMATS {
        if fields.len() < *token_count {
            continue;
        }
        let candidate = fields[..*token_count].join(" ");
        if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, format) {
            return local_ms(naive);
        }
    }
    None
}

/// Parses a syslog line timestamp into Unix milliseconds.
///
/// Classic syslog omits the year; it is synthesized from `now`, and a
/// result in the future rolls back one year (a December log read in
/// January). RFC 3339 timestamps (rsyslog with high-precision format,
/// journald exports) are accepted as-is.
pub fn parse_syslog_time(text: &str, now: DateTime<Utc>) -> Option<i64> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }

    let year = now.with_timezone(&Local).year();
    let candidate = format!("{year} {text}");
    let naive = NaiveDateTime::parse_from_str(&candidate, "%Y %b %e %H:%M:%S").ok()?;
    let ms = local_ms(naive)?;
    if ms > now.timestamp_millis() {
        let rolled = naive.with_year(year - 1)?;
        return local_ms(rolled);
    }
    Some(ms)
}

/// Parses the idle column of `w` output into seconds.
///
/// Grammar: `Ns` (seconds, fractions truncated), `H:MM` (hours:minutes),
/// `Nday(s)`. Anything else parses to 0.
pub fn parse_idle_time(text: &str) -> u64 {
    let text = text.trim();
    if let Some(caps) = IDLE_SECONDS.captures(text) {
        return caps[1].parse().unwrap_or(0);
    }
    if let Some(caps) = IDLE_HOURS_MINUTES.captures(text) {
        let hours: u64 = caps[1].parse().unwrap_or(0);
        let minutes: u64 = caps[2].parse().unwrap_or(0);
        return hours * 3600 + minutes * 60;
    }
    if let Some(caps) = IDLE_DAYS.captures(text) {
        let days: u64 = caps[1].parse().unwrap_or(0);
        return days * 86_400;
    }
    0
}
