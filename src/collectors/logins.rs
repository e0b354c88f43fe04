//! Login asset collection: historical logins, failures, live sessions,
//! and aggregate statistics.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;
use crate::exec::CommandRunner;
use crate::parse::authlog::{is_failed_login_line, parse_auth_log_line};
use crate::parse::time::parse_idle_time;
use crate::parse::wtmp::{canonicalize_ip, parse_wtmp_output};

/// Cap on records pulled from any single login source.
const MAX_RECORDS: usize = 100;

/// An IP seen more often than this lands in `highFrequencyIPs`.
const HIGH_FREQUENCY_THRESHOLD: u64 = 10;

/// Log files scanned when `lastb` is unusable, in priority order.
const AUTH_LOG_PATHS: &[&str] = &["/var/log/auth.log", "/var/log/secure"];

fn is_false(v: &bool) -> bool {
    !*v
}

/// Outcome of a single historical login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginStatus {
    Success,
    Failed,
}

/// One historical login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRecord {
    pub username: String,
    pub terminal: String,
    /// Canonicalized: local pseudo-addresses normalize to `localhost`
    pub ip: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub status: LoginStatus,
    /// True when no timestamp format matched and the collection instant
    /// was substituted
    #[serde(default, skip_serializing_if = "is_false")]
    pub timestamp_inferred: bool,
}

/// A currently active session from `w`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSession {
    pub username: String,
    pub terminal: String,
    pub ip: String,
    /// Unix milliseconds
    pub login_time: i64,
    /// Seconds
    pub idle_time: u64,
}

/// Aggregate counters over the collected records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStatistics {
    pub total_logins: usize,
    pub failed_logins: usize,
    pub current_sessions: usize,
    #[serde(rename = "uniqueIPs")]
    pub unique_ips: IndexMap<String, u64>,
    pub unique_users: IndexMap<String, u64>,
    #[serde(rename = "highFrequencyIPs")]
    pub high_frequency_ips: IndexMap<String, u64>,
}

/// Full login inventory for one audit run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAssets {
    pub successful_logins: Vec<LoginRecord>,
    pub failed_logins: Vec<LoginRecord>,
    pub current_sessions: Vec<LoginSession>,
    pub statistics: LoginStatistics,
}

/// Collects the complete login inventory.
pub async fn collect(runner: &CommandRunner) -> LoginAssets {
    let now = Utc::now();

    let successful_logins = collect_successful(runner, now).await;
    let failed_logins = collect_failed(runner, now).await;
    let current_sessions = collect_sessions(runner, now).await;

    let statistics = build_statistics(&successful_logins, &failed_logins, &current_sessions);

    LoginAssets {
        successful_logins,
        failed_logins,
        current_sessions,
        statistics,
    }
}

async fn collect_successful(runner: &CommandRunner, now: DateTime<Utc>) -> Vec<LoginRecord> {
    match runner.run("last", &["-n", "100", "-F", "-w"]).await {
        Ok(output) => parse_wtmp_output(&output, LoginStatus::Success, now),
        Err(e) if e.is_probe_unavailable() => {
            debug!(error = %e, "last unavailable");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "failed to read login history");
            Vec::new()
        }
    }
}

/// Failed logins: `lastb` first, auth log scan when btmp is unreadable or
/// the tool is missing.
async fn collect_failed(runner: &CommandRunner, now: DateTime<Utc>) -> Vec<LoginRecord> {
    match runner.run("lastb", &["-n", "100", "-F", "-w"]).await {
        Ok(output) => parse_wtmp_output(&output, LoginStatus::Failed, now),
        Err(Error::ToolMissing(_)) | Err(Error::PermissionDenied(_)) => {
            debug!("lastb unusable, scanning auth log from file head (oldest matches win)");
            scan_auth_log(runner, now)
        }
        Err(e) => {
            warn!(error = %e, "failed to read failed-login history");
            Vec::new()
        }
    }
}

/// Scans the first readable auth log for failed-login lines, up to
/// [`MAX_RECORDS`] matches.
///
/// TODO: the scan starts at the head of the file, so on logs longer than
/// 100 matches it returns the oldest attempts rather than the newest;
/// switching to a tail read changes what the login-history check sees and
/// needs sign-off from the report consumers first.
fn scan_auth_log(runner: &CommandRunner, now: DateTime<Utc>) -> Vec<LoginRecord> {
    for path in AUTH_LOG_PATHS {
        let file = match File::open(Path::new(path)) {
            Ok(file) => file,
            Err(e) => {
                debug!(path, error = %e, "auth log not readable");
                continue;
            }
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            if runner.cancel_token().is_cancelled() {
                break;
            }
            let Ok(line) = line else { break };
            if !is_failed_login_line(&line) {
                continue;
            }
            if let Some(record) = parse_auth_log_line(&line, now) {
                records.push(record);
                if records.len() >= MAX_RECORDS {
                    break;
                }
            }
        }
        return records;
    }
    Vec::new()
}

async fn collect_sessions(runner: &CommandRunner, now: DateTime<Utc>) -> Vec<LoginSession> {
    match runner.run("w", &["-h"]).await {
        Ok(output) => output
            .lines()
            .filter_map(|line| parse_w_line(line, now))
            .collect(),
        Err(e) => {
            debug!(error = %e, "w unavailable");
            Vec::new()
        }
    }
}

/// Parses one `w -h` line.
///
/// procps prints USER TTY FROM LOGIN@ IDLE JCPU PCPU WHAT (8+ fields);
/// short formats drop LOGIN@/JCPU/PCPU, leaving the idle column right
/// after FROM. Both layouts are accepted.
pub fn parse_w_line(line: &str, now: DateTime<Utc>) -> Option<LoginSession> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }

    let (login_raw, idle_raw) = if fields.len() >= 8 {
        (Some(fields[3]), fields[4])
    } else {
        (None, fields[3])
    };

    let login_time = login_raw
        .and_then(|raw| parse_login_at(raw, now))
        .unwrap_or_else(|| now.timestamp_millis());

    Some(LoginSession {
        username: fields[0].to_string(),
        terminal: fields[1].to_string(),
        ip: canonicalize_ip(fields[2]),
        login_time,
        idle_time: parse_idle_time(idle_raw),
    })
}

/// Interprets a `LOGIN@` column in `HH:MM` form against today's date; a
/// clock reading in the future belongs to yesterday. Other spellings
/// (`Mon10`, `10Jun24`) are not resolved.
fn parse_login_at(raw: &str, now: DateTime<Utc>) -> Option<i64> {
    let time = NaiveTime::parse_from_str(raw, "%H:%M").ok()?;
    let local_now = now.with_timezone(&Local);
    let candidate = Local
        .from_local_datetime(&local_now.date_naive().and_time(time))
        .earliest()?;
    let candidate = if candidate > local_now {
        candidate - ChronoDuration::days(1)
    } else {
        candidate
    };
    Some(candidate.timestamp_millis())
}

fn build_statistics(
    successful: &[LoginRecord],
    failed: &[LoginRecord],
    sessions: &[LoginSession],
) -> LoginStatistics {
    let mut unique_ips: IndexMap<String, u64> = IndexMap::new();
    let mut unique_users: IndexMap<String, u64> = IndexMap::new();

    for record in successful.iter().chain(failed) {
        *unique_ips.entry(record.ip.clone()).or_insert(0) += 1;
        *unique_users.entry(record.username.clone()).or_insert(0) += 1;
    }

    let high_frequency_ips = unique_ips
        .iter()
        .filter(|(_, &count)| count > HIGH_FREQUENCY_THRESHOLD)
        .map(|(ip, &count)| (ip.clone(), count))
        .collect();

    LoginStatistics {
        total_logins: successful.len(),
        failed_logins: failed.len(),
        current_sessions: sessions.len(),
        unique_ips,
        unique_users,
        high_frequency_ips,
    }
}
