//! SSH daemon configuration check.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{Category, Check, CheckContext};
use crate::evidence::EvidenceBuilder;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

/// Audits `/etc/ssh/sshd_config` for root login, password authentication,
/// and the default port.
pub struct SshConfigCheck {
    config_path: PathBuf,
}

impl Default for SshConfigCheck {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/ssh/sshd_config"),
        }
    }
}

impl SshConfigCheck {
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }
}

/// Effective sshd options: sshd uses the first occurrence of a keyword,
/// so later duplicates are ignored here too.
#[derive(Debug, Default)]
struct SshdOptions {
    permit_root_login: Option<String>,
    password_authentication: Option<String>,
    pubkey_authentication: Option<String>,
    port: Option<String>,
}

fn parse_sshd_config(content: &str) -> SshdOptions {
    let mut options = SshdOptions::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let value = value.to_string();
        match key.to_ascii_lowercase().as_str() {
            "permitrootlogin" => options.permit_root_login.get_or_insert(value),
            "passwordauthentication" => options.password_authentication.get_or_insert(value),
            "pubkeyauthentication" => options.pubkey_authentication.get_or_insert(value),
            "port" => options.port.get_or_insert(value),
            _ => continue,
        };
    }
    options
}

/// Classifies the parsed options into details. Split from the probe so
/// fixture configs can drive it directly.
fn evaluate_sshd_config(content: &str, config_path: &std::path::Path) -> Vec<CheckDetail> {
    let options = parse_sshd_config(content);
    let mut details = Vec::new();

    match options.permit_root_login.as_deref() {
        Some("yes") => details.push(
            CheckDetail::new(
                "root_login",
                CheckStatus::Fail,
                "PermitRootLogin yes allows direct root login over SSH",
            )
            .with_evidence(
                EvidenceBuilder::new(RiskLevel::High)
                    .file_path_only(config_path)
                    .build(),
            ),
        ),
        Some("no") => details.push(CheckDetail::new(
            "root_login",
            CheckStatus::Pass,
            "direct root login disabled",
        )),
        // prohibit-password / without-password / forced-commands-only
        Some(other) => details.push(CheckDetail::new(
            "root_login",
            CheckStatus::Pass,
            format!("root login restricted ({other})"),
        )),
        None => details.push(CheckDetail::new(
            "root_login",
            CheckStatus::Pass,
            "PermitRootLogin not set, daemon default restricts to key-only",
        )),
    }

    let pubkey_enabled = !matches!(options.pubkey_authentication.as_deref(), Some("no"));
    match options.password_authentication.as_deref() {
        Some("yes") if !pubkey_enabled => details.push(
            CheckDetail::new(
                "password_authentication",
                CheckStatus::Fail,
                "password-only authentication, no key enforcement",
            )
            .with_evidence(
                EvidenceBuilder::new(RiskLevel::High)
                    .file_path_only(config_path)
                    .build(),
            ),
        ),
        Some("yes") => details.push(
            CheckDetail::new(
                "password_authentication",
                CheckStatus::Fail,
                "PasswordAuthentication yes leaves the daemon open to brute force",
            )
            .with_evidence(
                EvidenceBuilder::new(RiskLevel::Medium)
                    .file_path_only(config_path)
                    .build(),
            ),
        ),
        Some(_) => details.push(CheckDetail::new(
            "password_authentication",
            CheckStatus::Pass,
            "password authentication disabled",
        )),
        None => details.push(CheckDetail::new(
            "password_authentication",
            CheckStatus::Warn,
            "PasswordAuthentication not set, most distros default it to yes",
        )),
    }

    match options.port.as_deref() {
        Some("22") | None => details.push(CheckDetail::new(
            "port",
            CheckStatus::Warn,
            "sshd listens on the default port 22",
        )),
        Some(port) => details.push(CheckDetail::new(
            "port",
            CheckStatus::Pass,
            format!("sshd listens on non-default port {port}"),
        )),
    }

    details
}

#[async_trait]
impl Check for SshConfigCheck {
    fn category(&self) -> Category {
        Category::SshSecurity
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckResult {
        let content = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return CheckResult::skip(
                    self.category(),
                    format!("{} not found", self.config_path.display()),
                );
            }
            Err(e) => {
                return CheckResult::skip(
                    self.category(),
                    format!("{} not readable: {e}", self.config_path.display()),
                );
            }
        };

        let details = evaluate_sshd_config(&content, &self.config_path);
        CheckResult::from_details(self.category(), "SSH daemon configuration", details)
    }
}
