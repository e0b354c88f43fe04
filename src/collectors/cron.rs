//! Cron job inventory.
//!
//! Sources: `/etc/crontab` and `/etc/cron.d/*` (system format with a user
//! column), plus per-user tables via `crontab -l -u`. Per-user reads need
//! root; permission errors degrade to skipping that user.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::exec::CommandRunner;

/// One scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronEntry {
    /// File path, or `crontab:<user>` for per-user tables
    pub source: String,
    /// Five-field schedule or an `@` shortcut
    pub schedule: String,
    pub user: String,
    pub command: String,
}

/// Collects the cron inventory.
pub async fn collect(runner: &CommandRunner) -> Vec<CronEntry> {
    let mut entries = Vec::new();

    if let Ok(content) = std::fs::read_to_string("/etc/crontab") {
        entries.extend(parse_system_crontab(&content, "/etc/crontab"));
    }

    if let Ok(dir) = std::fs::read_dir("/etc/cron.d") {
        for entry in dir.flatten() {
            if runner.cancel_token().is_cancelled() {
                return entries;
            }
            let path = entry.path();
            if !path.is_file() || is_hidden(&path) {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                entries.extend(parse_system_crontab(&content, &path.display().to_string()));
            }
        }
    }

    for user in crontab_users() {
        if runner.cancel_token().is_cancelled() {
            break;
        }
        match runner.run("crontab", &["-l", "-u", &user]).await {
            Ok(output) => {
                entries.extend(parse_user_crontab(&output, &user));
            }
            // Non-root cannot read other users' tables; "no crontab for
            // <user>" exits non-zero as well. Both are expected.
            Err(Error::PermissionDenied(_)) | Err(Error::CommandFailed { .. }) => {}
            Err(e) => {
                debug!(user, error = %e, "crontab unavailable");
                break;
            }
        }
    }

    entries
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true)
}

/// Users whose crontabs are worth reading: root plus interactive accounts
/// from `/etc/passwd`.
fn crontab_users() -> Vec<String> {
    let mut users = vec!["root".to_string()];
    if let Ok(passwd) = std::fs::read_to_string("/etc/passwd") {
        for line in passwd.lines() {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                continue;
            }
            let uid: u32 = match fields[2].parse() {
                Ok(uid) => uid,
                Err(_) => continue,
            };
            let shell = fields[6];
            if uid >= 1000 && !shell.ends_with("nologin") && !shell.ends_with("false") {
                users.push(fields[0].to_string());
            }
        }
    }
    users
}

/// True for comment, blank, and `VAR=value` environment lines.
fn is_non_job_line(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('#')
        || line
            .split_whitespace()
            .next()
            .is_some_and(|first| first.contains('='))
}

/// Parses the system crontab format: schedule, user column, command.
pub fn parse_system_crontab(content: &str, source: &str) -> Vec<CronEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !is_non_job_line(line))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (schedule, user, command) = if line.starts_with('@') {
                if fields.len() < 3 {
                    return None;
                }
                (fields[0].to_string(), fields[1], fields[2..].join(" "))
            } else {
                if fields.len() < 7 {
                    return None;
                }
                (fields[..5].join(" "), fields[5], fields[6..].join(" "))
            };
            Some(CronEntry {
                source: source.to_string(),
                schedule,
                user: user.to_string(),
                command,
            })
        })
        .collect()
}

/// Parses a per-user table (no user column).
pub fn parse_user_crontab(content: &str, user: &str) -> Vec<CronEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !is_non_job_line(line))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (schedule, command) = if line.starts_with('@') {
                if fields.len() < 2 {
                    return None;
                }
                (fields[0].to_string(), fields[1..].join(" "))
            } else {
                if fields.len() < 6 {
                    return None;
                }
                (fields[..5].join(" "), fields[5..].join(" "))
            };
            Some(CronEntry {
                source: format!("crontab:{user}"),
                schedule,
                user: user.to_string(),
                command,
            })
        })
        .collect()
}
