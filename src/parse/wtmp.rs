//! Field extraction for `last` and `lastb` output.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collectors::logins::{LoginRecord, LoginStatus};
use crate::parse::time::parse_login_time;

/// Canonicalizes the ip column of wtmp-derived output.
///
/// Local logins surface as an empty column, `-`, or an X display
/// (`:0`, `:0.0`, `:1`, ...); all of them normalize to `localhost`.
pub fn canonicalize_ip(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" || raw.starts_with(':') {
        "localhost".to_string()
    } else {
        raw.to_string()
    }
}

/// Returns true for `last` lines that carry no login record: blanks, the
/// trailing `wtmp begins ...` footer, reboot markers, and system boot
/// pseudo-entries.
fn is_noise_line(line: &str) -> bool {
    line.is_empty()
        || line.starts_with("wtmp")
        || line.starts_with("btmp")
        || line.starts_with("reboot")
        || line.contains("system boot")
}

/// Parses one `last -F` / `lastb -F` line into a [`LoginRecord`].
///
/// Requires at least three fields (username, terminal, ip). A timestamp
/// that matches no known format falls back to `now` with
/// `timestamp_inferred` set, so consumers can tell real times from
/// substituted ones.
pub fn parse_wtmp_line(line: &str, status: LoginStatus, now: DateTime<Utc>) -> Option<LoginRecord> {
    let line = line.trim();
    if is_noise_line(line) {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }

    let (timestamp, inferred) = match parse_login_time(&fields[3..]) {
        Some(ms) => (ms, false),
        None => {
            debug!(line, "no timestamp format matched, substituting current time");
            (now.timestamp_millis(), true)
        }
    };

    Some(LoginRecord {
        username: fields[0].to_string(),
        terminal: fields[1].to_string(),
        ip: canonicalize_ip(fields[2]),
        timestamp,
        status,
        timestamp_inferred: inferred,
    })
}

/// Parses full `last`/`lastb` output, dropping noise lines.
pub fn parse_wtmp_output(
    output: &str,
    status: LoginStatus,
    now: DateTime<Utc>,
) -> Vec<LoginRecord> {
    output
        .lines()
        .filter_map(|line| parse_wtmp_line(line, status, now))
        .collect()
}
