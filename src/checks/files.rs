//! Filesystem checks: executables in scratch space, recent changes to
//! core binaries, and unexpected immutable attributes.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use super::{Category, Check, CheckContext};
use crate::error::Error;
use crate::evidence::EvidenceBuilder;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

// ============================================================================
// suspicious_files
// ============================================================================

/// Walks the world-writable scratch directories for executables and
/// hashes what it finds.
pub struct SuspiciousFilesCheck {
    scan_dirs: Vec<PathBuf>,
}

impl Default for SuspiciousFilesCheck {
    fn default() -> Self {
        Self {
            scan_dirs: ["/tmp", "/var/tmp", "/dev/shm"]
                .iter()
                .map(PathBuf::from)
                .collect(),
        }
    }
}

impl SuspiciousFilesCheck {
    pub fn with_dirs(scan_dirs: Vec<PathBuf>) -> Self {
        Self { scan_dirs }
    }
}

/// Walk depth and detail caps keep a hostile /tmp from flooding the
/// report.
const SCAN_MAX_DEPTH: usize = 4;
const MAX_FILE_DETAILS: usize = 50;

fn is_executable(mode: u32) -> bool {
    mode & 0o111 != 0
}

/// True when any path component is dot-prefixed (`/tmp/.x/run`).
fn is_hidden_name(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(c, std::path::Component::Normal(n)
            if n.to_str().is_some_and(|s| s.starts_with('.')))
    })
}

fn classify_executable(path: &Path, scan_root: &Path) -> CheckDetail {
    // Anything executable in shared memory, and hidden executables
    // anywhere, go beyond routine scratch clutter.
    let shm = scan_root.starts_with("/dev/shm");
    let hidden = is_hidden_name(path);
    let (status, risk) = if shm || hidden {
        (CheckStatus::Fail, RiskLevel::High)
    } else {
        (CheckStatus::Warn, RiskLevel::Medium)
    };

    let qualifier = match (shm, hidden) {
        (true, _) => "executable in shared memory",
        (_, true) => "hidden executable",
        _ => "executable",
    };

    CheckDetail::new(
        format!("file_{}", path.display()),
        status,
        format!("{qualifier}: {}", path.display()),
    )
    .with_evidence(EvidenceBuilder::new(risk).file(path).build())
}

#[async_trait]
impl Check for SuspiciousFilesCheck {
    fn category(&self) -> Category {
        Category::SuspiciousFiles
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut details = Vec::new();
        let mut truncated = false;

        'dirs: for dir in &self.scan_dirs {
            for entry in WalkDir::new(dir)
                .max_depth(SCAN_MAX_DEPTH)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if ctx.cancel.is_cancelled() {
                    return CheckResult::skip(self.category(), "cancelled");
                }
                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        debug!(path = %entry.path().display(), error = %e, "stat failed");
                        continue;
                    }
                };
                if !metadata.is_file() || !is_executable(metadata.permissions().mode()) {
                    continue;
                }
                if details.len() >= MAX_FILE_DETAILS {
                    truncated = true;
                    break 'dirs;
                }
                details.push(classify_executable(entry.path(), dir));
            }
        }

        if truncated {
            details.push(CheckDetail::new(
                "scan_truncated",
                CheckStatus::Warn,
                format!("more than {MAX_FILE_DETAILS} executables found, scan truncated"),
            ));
        }

        if details.is_empty() {
            return CheckResult::pass(
                self.category(),
                "no executables in temp or shared-memory directories",
            );
        }
        CheckResult::from_details(self.category(), "scratch-space executables", details)
    }
}

// ============================================================================
// file_integrity
// ============================================================================

/// Core binaries and credential files whose modification time should be
/// boring.
const INTEGRITY_PATHS: &[&str] = &[
    "/bin/sh",
    "/usr/bin/ssh",
    "/usr/bin/sudo",
    "/usr/bin/passwd",
    "/etc/passwd",
    "/etc/shadow",
];

const RECENT_CHANGE_WINDOW: Duration = Duration::from_secs(24 * 3600);

/// Warns when a core binary or credential file changed within the last
/// day.
pub struct FileIntegrityCheck;

fn evaluate_mtime(path: &Path, mtime: SystemTime, now: SystemTime) -> Option<CheckDetail> {
    let age = now.duration_since(mtime).ok()?;
    if age >= RECENT_CHANGE_WINDOW {
        return None;
    }
    let ms = mtime
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()?
        .as_millis() as i64;
    Some(
        CheckDetail::new(
            format!("recent_change_{}", path.display()),
            CheckStatus::Warn,
            format!(
                "{} modified {} minutes ago",
                path.display(),
                age.as_secs() / 60
            ),
        )
        .with_evidence(
            EvidenceBuilder::new(RiskLevel::Medium)
                .file(path)
                .timestamp(ms)
                .build(),
        ),
    )
}

#[async_trait]
impl Check for FileIntegrityCheck {
    fn category(&self) -> Category {
        Category::FileIntegrity
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let now = SystemTime::now();
        let mut details = Vec::new();
        let mut probed = false;

        for path in INTEGRITY_PATHS {
            if ctx.cancel.is_cancelled() {
                return CheckResult::skip(self.category(), "cancelled");
            }
            let path = Path::new(path);
            let Ok(metadata) = std::fs::metadata(path) else {
                continue;
            };
            probed = true;
            let Ok(mtime) = metadata.modified() else {
                continue;
            };
            details.extend(evaluate_mtime(path, mtime, now));
        }

        if !probed {
            return CheckResult::skip(self.category(), "no monitored file present");
        }
        if details.is_empty() {
            return CheckResult::pass(self.category(), "core files unchanged in the last 24h");
        }
        CheckResult::from_details(self.category(), "core file modification times", details)
    }
}

// ============================================================================
// immutable_files
// ============================================================================

/// Paths where an immutable or append-only attribute means someone has
/// pinned config against change, commonly post-intrusion.
const LSATTR_PATHS: &[&str] = &[
    "/etc/passwd",
    "/etc/shadow",
    "/etc/group",
    "/etc/ssh/sshd_config",
    "/etc/crontab",
];

/// Runs `lsattr` over standard config files and flags `i`/`a` attributes.
pub struct ImmutableFilesCheck;

/// Parses one `lsattr` output line (`----i---------e------- /etc/passwd`)
/// into the attribute set and path.
pub fn parse_lsattr_line(line: &str) -> Option<(&str, &str)> {
    let (attrs, path) = line.trim().split_once(char::is_whitespace)?;
    // Attribute column is dashes and flag letters only
    if attrs.is_empty() || !attrs.chars().all(|c| c == '-' || c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((attrs, path.trim()))
}

fn evaluate_lsattr(output: &str) -> Vec<CheckDetail> {
    let mut details = Vec::new();
    for line in output.lines() {
        let Some((attrs, path)) = parse_lsattr_line(line) else {
            continue;
        };
        let mut flagged = Vec::new();
        if attrs.contains('i') {
            flagged.push("immutable");
        }
        if attrs.contains('a') {
            flagged.push("append-only");
        }
        if flagged.is_empty() {
            continue;
        }
        details.push(
            CheckDetail::new(
                format!("attr_{path}"),
                CheckStatus::Warn,
                format!("{path} carries unexpected {} attribute", flagged.join("+")),
            )
            .with_evidence(
                EvidenceBuilder::new(RiskLevel::Medium)
                    .file_path_only(Path::new(path))
                    .build(),
            ),
        );
    }
    details
}

#[async_trait]
impl Check for ImmutableFilesCheck {
    fn category(&self) -> Category {
        Category::ImmutableFiles
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        if !ctx.runner.tool_available("lsattr") {
            return CheckResult::skip(self.category(), "lsattr not installed");
        }

        let existing: Vec<&str> = LSATTR_PATHS
            .iter()
            .copied()
            .filter(|p| Path::new(p).exists())
            .collect();
        if existing.is_empty() {
            return CheckResult::skip(self.category(), "no monitored config file present");
        }

        // lsattr fails wholesale on filesystems without attribute
        // support, so probe files one at a time.
        let mut details = Vec::new();
        for path in existing {
            match ctx.runner.run("lsattr", &["-d", path]).await {
                Ok(output) => details.extend(evaluate_lsattr(&output)),
                Err(Error::Cancelled) => {
                    return CheckResult::skip(self.category(), "cancelled")
                }
                Err(Error::Timeout { .. }) => {
                    details.push(CheckDetail::new(
                        format!("timeout_{path}"),
                        CheckStatus::Warn,
                        "probe timed out",
                    ));
                }
                Err(e) => debug!(path, error = %e, "lsattr failed"),
            }
        }

        if details.is_empty() {
            return CheckResult::pass(self.category(), "no unexpected file attributes");
        }
        CheckResult::from_details(self.category(), "file attribute review", details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_lsattr_line() {
        let (attrs, path) = parse_lsattr_line("----i---------e------- /etc/passwd").unwrap();
        assert!(attrs.contains('i'));
        assert_eq!(path, "/etc/passwd");
    }

    #[test]
    fn test_lsattr_error_line_ignored() {
        assert!(parse_lsattr_line("lsattr: Operation not supported").is_none());
    }

    #[test]
    fn test_immutable_attribute_warns() {
        let details = evaluate_lsattr("----i---------e------- /etc/passwd\n");
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].status, CheckStatus::Warn);
        assert!(details[0].message.contains("immutable"));
    }

    #[test]
    fn test_append_only_attribute_warns() {
        let details = evaluate_lsattr("-----a--------e------- /var/log/audit.log\n");
        assert!(details[0].message.contains("append-only"));
    }

    #[test]
    fn test_plain_attributes_pass() {
        assert!(evaluate_lsattr("--------------e------- /etc/passwd\n").is_empty());
    }

    #[test]
    fn test_recent_mtime_warns() {
        let now = SystemTime::now();
        let detail = evaluate_mtime(
            Path::new("/etc/passwd"),
            now - Duration::from_secs(3600),
            now,
        )
        .unwrap();
        assert_eq!(detail.status, CheckStatus::Warn);
        assert!(detail.evidence.as_ref().unwrap().timestamp.is_some());
    }

    #[test]
    fn test_old_mtime_quiet() {
        let now = SystemTime::now();
        assert!(evaluate_mtime(
            Path::new("/etc/passwd"),
            now - Duration::from_secs(48 * 3600),
            now
        )
        .is_none());
    }

    #[test]
    fn test_classify_shm_executable_fails() {
        let detail = classify_executable(Path::new("/dev/shm/payload"), Path::new("/dev/shm"));
        assert_eq!(detail.status, CheckStatus::Fail);
    }

    #[test]
    fn test_classify_hidden_executable_fails() {
        let detail = classify_executable(Path::new("/tmp/.x/run"), Path::new("/tmp"));
        assert_eq!(detail.status, CheckStatus::Fail);
    }

    #[test]
    fn test_classify_plain_tmp_executable_warns() {
        let detail = classify_executable(Path::new("/tmp/build.sh"), Path::new("/tmp"));
        assert_eq!(detail.status, CheckStatus::Warn);
        assert_eq!(
            detail.evidence.as_ref().unwrap().risk_level,
            RiskLevel::Medium
        );
    }
}
