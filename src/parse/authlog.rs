//! Failed-login extraction from `auth.log` / `secure`.
//!
//! Fallback source when `lastb` is unavailable (missing binary or btmp
//! unreadable without root). Handles both sshd phrasings seen across
//! distros: `Failed password for ...` (Debian/Ubuntu) and the PAM
//! `authentication failure ... rhost=` form (RHEL-family `secure`).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::collectors::logins::{LoginRecord, LoginStatus};
use crate::parse::time::parse_syslog_time;
use crate::parse::wtmp::canonicalize_ip;

static FAILED_PASSWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Failed password for (?:invalid user )?(\S+) from (\S+) port")
        .expect("invalid failed-password regex")
});

static AUTH_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"authentication failure;.*\brhost=(\S*)(?:.*\buser=(\S+))?")
        .expect("invalid auth-failure regex")
});

/// Returns true when the line records a failed login attempt.
pub fn is_failed_login_line(line: &str) -> bool {
    line.contains("Failed password") || line.contains("authentication failure")
}

/// Extracts the syslog timestamp prefix of a line: either an RFC 3339
/// token or the classic `Mon DD HH:MM:SS` triple.
fn line_timestamp(line: &str, now: DateTime<Utc>) -> Option<i64> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if first.contains('T') {
        return parse_syslog_time(first, now);
    }
    let second = tokens.next()?;
    let third = tokens.next()?;
    parse_syslog_time(&format!("{first} {second} {third}"), now)
}

/// Parses one auth-log line into a failed [`LoginRecord`].
///
/// The terminal is fixed to `ssh`; wtmp terminal names do not exist in
/// this source. Lines that match neither sshd phrasing return `None`.
pub fn parse_auth_log_line(line: &str, now: DateTime<Utc>) -> Option<LoginRecord> {
    let (username, ip) = if let Some(caps) = FAILED_PASSWORD.captures(line) {
        (caps[1].to_string(), caps[2].to_string())
    } else if let Some(caps) = AUTH_FAILURE.captures(line) {
        let user = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        (user, caps[1].to_string())
    } else {
        return None;
    };

    let (timestamp, inferred) = match line_timestamp(line, now) {
        Some(ms) => (ms, false),
        None => (now.timestamp_millis(), true),
    };

    Some(LoginRecord {
        username,
        terminal: "ssh".to_string(),
        ip: canonicalize_ip(&ip),
        timestamp,
        status: LoginStatus::Failed,
        timestamp_inferred: inferred,
    })
}
