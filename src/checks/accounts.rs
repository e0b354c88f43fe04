//! Account hygiene checks over `/etc/passwd`, `/etc/shadow`, and the
//! permission bits of the credential files themselves.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use async_trait::async_trait;

use super::{Category, Check, CheckContext};
use crate::evidence::EvidenceBuilder;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

/// One `/etc/passwd` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub shell: String,
}

impl PasswdEntry {
    pub fn has_login_shell(&self) -> bool {
        !self.shell.is_empty()
            && !self.shell.ends_with("nologin")
            && !self.shell.ends_with("false")
            && !self.shell.ends_with("sync")
    }
}

/// Parses `/etc/passwd` content, skipping malformed rows.
pub fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    content
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(PasswdEntry {
                name: fields[0].to_string(),
                uid: fields[2].parse().ok()?,
                gid: fields[3].parse().ok()?,
                shell: fields[6].to_string(),
            })
        })
        .collect()
}

// ============================================================================
// non_root_user
// ============================================================================

/// Verifies day-to-day administration does not happen as uid 0: flags
/// extra uid-0 accounts and the absence of any non-root login account.
pub struct NonRootUserCheck;

fn evaluate_non_root_user(entries: &[PasswdEntry]) -> Vec<CheckDetail> {
    let mut details = Vec::new();

    let rogue_root: Vec<_> = entries
        .iter()
        .filter(|e| e.uid == 0 && e.name != "root")
        .collect();
    if rogue_root.is_empty() {
        details.push(CheckDetail::new(
            "uid_zero",
            CheckStatus::Pass,
            "root is the only uid 0 account",
        ));
    } else {
        for entry in rogue_root {
            details.push(
                CheckDetail::new(
                    format!("uid_zero_{}", entry.name),
                    CheckStatus::Fail,
                    format!("account '{}' has uid 0", entry.name),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::High)
                        .file_path_only(Path::new("/etc/passwd"))
                        .build(),
                ),
            );
        }
    }

    let has_admin_user = entries
        .iter()
        .any(|e| e.uid >= 1000 && e.uid != 65534 && e.has_login_shell());
    if has_admin_user {
        details.push(CheckDetail::new(
            "non_root_login",
            CheckStatus::Pass,
            "non-root login account present",
        ));
    } else {
        details.push(CheckDetail::new(
            "non_root_login",
            CheckStatus::Warn,
            "no non-root login account, administration happens as root",
        ));
    }

    details
}

#[async_trait]
impl Check for NonRootUserCheck {
    fn category(&self) -> Category {
        Category::NonRootUser
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckResult {
        match std::fs::read_to_string("/etc/passwd") {
            Ok(content) => CheckResult::from_details(
                self.category(),
                "root usage hygiene",
                evaluate_non_root_user(&parse_passwd(&content)),
            ),
            Err(e) => CheckResult::skip(self.category(), format!("/etc/passwd not readable: {e}")),
        }
    }
}

// ============================================================================
// system_accounts
// ============================================================================

/// Flags service accounts with interactive shells and passwordless rows
/// in `/etc/shadow`.
pub struct SystemAccountsCheck;

/// Service accounts commonly shipped with a real shell on purpose.
const SHELL_ALLOWED_SYSTEM_ACCOUNTS: &[&str] = &["root", "sync"];

fn evaluate_system_accounts(entries: &[PasswdEntry]) -> Vec<CheckDetail> {
    let mut details = Vec::new();

    for entry in entries {
        if entry.uid < 1000
            && entry.has_login_shell()
            && !SHELL_ALLOWED_SYSTEM_ACCOUNTS.contains(&entry.name.as_str())
        {
            details.push(CheckDetail::new(
                format!("shell_{}", entry.name),
                CheckStatus::Warn,
                format!(
                    "system account '{}' (uid {}) has login shell {}",
                    entry.name, entry.uid, entry.shell
                ),
            ));
        }
    }

    if details.is_empty() {
        details.push(CheckDetail::new(
            "system_shells",
            CheckStatus::Pass,
            "no system account carries an interactive shell",
        ));
    }

    details
}

/// Scans readable `/etc/shadow` content for accounts with an empty
/// password field.
fn evaluate_shadow(content: &str) -> Vec<CheckDetail> {
    let mut details = Vec::new();
    for line in content.lines() {
        let mut fields = line.split(':');
        let (Some(name), Some(password)) = (fields.next(), fields.next()) else {
            continue;
        };
        if password.is_empty() {
            details.push(
                CheckDetail::new(
                    format!("empty_password_{name}"),
                    CheckStatus::Fail,
                    format!("account '{name}' has an empty password"),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::High)
                        .file_path_only(Path::new("/etc/shadow"))
                        .build(),
                ),
            );
        }
    }
    details
}

#[async_trait]
impl Check for SystemAccountsCheck {
    fn category(&self) -> Category {
        Category::SystemAccounts
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckResult {
        let content = match std::fs::read_to_string("/etc/passwd") {
            Ok(content) => content,
            Err(e) => {
                return CheckResult::skip(
                    self.category(),
                    format!("/etc/passwd not readable: {e}"),
                );
            }
        };

        let mut details = evaluate_system_accounts(&parse_passwd(&content));

        match std::fs::read_to_string("/etc/shadow") {
            Ok(shadow) => details.extend(evaluate_shadow(&shadow)),
            // Shadow is root-only; without root only its metadata is
            // audited (see access_control).
            Err(e) => tracing::debug!(error = %e, "shadow password audit skipped"),
        }

        CheckResult::from_details(self.category(), "system account review", details)
    }
}

// ============================================================================
// access_control
// ============================================================================

/// Permission audit of the credential and privilege files.
pub struct AccessControlCheck;

/// Expected permission profile for one audited path.
struct ModePolicy {
    name: &'static str,
    path: &'static str,
    /// Bits that must not be set
    forbidden: u32,
    violation: &'static str,
    risk: RiskLevel,
}

const MODE_POLICIES: &[ModePolicy] = &[
    ModePolicy {
        name: "passwd_writable",
        path: "/etc/passwd",
        forbidden: 0o022,
        violation: "writable by group or other",
        risk: RiskLevel::High,
    },
    ModePolicy {
        name: "shadow_other_access",
        path: "/etc/shadow",
        forbidden: 0o007,
        violation: "accessible by other",
        risk: RiskLevel::High,
    },
    ModePolicy {
        name: "sudoers_writable",
        path: "/etc/sudoers",
        forbidden: 0o022,
        violation: "writable by group or other",
        risk: RiskLevel::High,
    },
    ModePolicy {
        name: "sudoers_other_read",
        path: "/etc/sudoers",
        forbidden: 0o004,
        violation: "readable by other",
        risk: RiskLevel::Medium,
    },
];

fn evaluate_mode(policy: &ModePolicy, mode: u32) -> Option<CheckDetail> {
    if mode & policy.forbidden == 0 {
        return None;
    }
    let status = match policy.risk {
        RiskLevel::High => CheckStatus::Fail,
        _ => CheckStatus::Warn,
    };
    Some(
        CheckDetail::new(
            policy.name,
            status,
            format!("{} is {} (mode {:o})", policy.path, policy.violation, mode & 0o7777),
        )
        .with_evidence(
            EvidenceBuilder::new(policy.risk)
                .file_path_only(Path::new(policy.path))
                .build(),
        ),
    )
}

#[async_trait]
impl Check for AccessControlCheck {
    fn category(&self) -> Category {
        Category::AccessControl
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckResult {
        let mut details = Vec::new();
        let mut probed = false;

        for policy in MODE_POLICIES {
            // Metadata stays readable even when the content is root-only.
            let Ok(metadata) = std::fs::metadata(policy.path) else {
                continue;
            };
            probed = true;
            details.extend(evaluate_mode(policy, metadata.mode()));
        }

        if !probed {
            return CheckResult::skip(self.category(), "no credential files found");
        }
        if details.is_empty() {
            return CheckResult::pass(
                self.category(),
                "credential file permissions are restrictive",
            );
        }
        CheckResult::from_details(self.category(), "credential file permissions", details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
backdoor:x:0:0::/root:/bin/bash
www-data:x:33:33:www-data:/var/www:/bin/sh
alice:x:1000:1000:Alice:/home/alice:/bin/bash
nobody:x:65534:65534:nobody:/nonexistent:/usr/sbin/nologin";

    #[test]
    fn test_parse_passwd() {
        let entries = parse_passwd(PASSWD);
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].name, "root");
        assert!(entries[0].has_login_shell());
        assert!(!entries[1].has_login_shell());
    }

    #[test]
    fn test_extra_uid_zero_fails() {
        let details = evaluate_non_root_user(&parse_passwd(PASSWD));
        assert!(details
            .iter()
            .any(|d| d.name == "uid_zero_backdoor" && d.status == CheckStatus::Fail));
        assert_eq!(
            CheckStatus::worst(&details),
            Some(CheckStatus::Fail)
        );
    }

    #[test]
    fn test_admin_user_present_passes() {
        let details = evaluate_non_root_user(&parse_passwd(PASSWD));
        assert!(details
            .iter()
            .any(|d| d.name == "non_root_login" && d.status == CheckStatus::Pass));
    }

    #[test]
    fn test_root_only_host_warns() {
        let content = "root:x:0:0:root:/root:/bin/bash\n";
        let details = evaluate_non_root_user(&parse_passwd(content));
        assert!(details
            .iter()
            .any(|d| d.name == "non_root_login" && d.status == CheckStatus::Warn));
    }

    #[test]
    fn test_system_account_with_shell_warns() {
        let details = evaluate_system_accounts(&parse_passwd(PASSWD));
        assert!(details
            .iter()
            .any(|d| d.name == "shell_www-data" && d.status == CheckStatus::Warn));
        // alice (uid 1000) is not a system account
        assert!(!details.iter().any(|d| d.name == "shell_alice"));
    }

    #[test]
    fn test_empty_shadow_password_fails() {
        let shadow = "root:$y$j9T$abc:19700:0:99999:7:::\nghost::19700:0:99999:7:::";
        let details = evaluate_shadow(shadow);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].status, CheckStatus::Fail);
        assert!(details[0].message.contains("ghost"));
    }

    #[test]
    fn test_mode_policy_world_writable_passwd() {
        let policy = &MODE_POLICIES[0];
        assert!(evaluate_mode(policy, 0o100644).is_none());
        let detail = evaluate_mode(policy, 0o100666).unwrap();
        assert_eq!(detail.status, CheckStatus::Fail);
        assert!(detail.message.contains("666"));
    }

    #[test]
    fn test_mode_policy_shadow_other_access() {
        let policy = &MODE_POLICIES[1];
        assert!(evaluate_mode(policy, 0o100640).is_none());
        assert!(evaluate_mode(policy, 0o100644).is_some());
    }

    #[test]
    fn test_mode_policy_sudoers_other_read_warns() {
        let policy = &MODE_POLICIES[3];
        let detail = evaluate_mode(policy, 0o100444).unwrap();
        assert_eq!(detail.status, CheckStatus::Warn);
    }
}
