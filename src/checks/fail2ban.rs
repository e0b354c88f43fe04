//! fail2ban presence and jail coverage check.

use async_trait::async_trait;
use tracing::debug;

use super::{Category, Check, CheckContext};
use crate::error::Error;
use crate::report::{CheckDetail, CheckResult, CheckStatus};

/// Verifies fail2ban is installed, running, and has at least one jail.
pub struct Fail2banCheck;

/// Extracts jail names from `fail2ban-client status` output:
/// `Jail list:	sshd, nginx-http-auth`.
fn parse_jail_list(output: &str) -> Vec<String> {
    output
        .lines()
        .find_map(|line| line.split("Jail list:").nth(1))
        .map(|list| {
            list.split(',')
                .map(|j| j.trim().to_string())
                .filter(|j| !j.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Check for Fail2banCheck {
    fn category(&self) -> Category {
        Category::Fail2ban
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        if !ctx.runner.tool_available("fail2ban-client")
            && !ctx.runner.tool_available("fail2ban-server")
        {
            return CheckResult::skip(self.category(), "fail2ban not installed");
        }

        let mut details = Vec::new();

        match ctx
            .runner
            .run("systemctl", &["is-active", "fail2ban"])
            .await
        {
            Ok(state) if state.trim() == "active" => details.push(CheckDetail::new(
                "service",
                CheckStatus::Pass,
                "fail2ban service is active",
            )),
            Err(Error::Timeout { .. }) => details.push(CheckDetail::new(
                "service",
                CheckStatus::Warn,
                "probe timed out",
            )),
            Err(Error::Cancelled) => {
                return CheckResult::skip(self.category(), "cancelled");
            }
            // "inactive"/"unknown" exit non-zero, so they land here too.
            _ => details.push(CheckDetail::new(
                "service",
                CheckStatus::Warn,
                "fail2ban installed but the service is not active",
            )),
        }

        match ctx.runner.run("fail2ban-client", &["status"]).await {
            Ok(output) => {
                let jails = parse_jail_list(&output);
                if jails.is_empty() {
                    details.push(CheckDetail::new(
                        "jails",
                        CheckStatus::Warn,
                        "no jails enabled, brute-force protection is idle",
                    ));
                } else {
                    details.push(CheckDetail::new(
                        "jails",
                        CheckStatus::Pass,
                        format!("{} jail(s) enabled: {}", jails.len(), jails.join(", ")),
                    ));
                }
            }
            Err(Error::PermissionDenied(_)) => {
                // The client socket is root-only on most installs.
                details.push(CheckDetail::new(
                    "jails",
                    CheckStatus::Warn,
                    "jail status requires root, coverage unknown",
                ));
            }
            Err(Error::Timeout { .. }) => {
                details.push(CheckDetail::new(
                    "jails",
                    CheckStatus::Warn,
                    "probe timed out",
                ));
            }
            Err(Error::Cancelled) => {
                return CheckResult::skip(self.category(), "cancelled");
            }
            Err(e) => {
                debug!(error = %e, "fail2ban-client status failed");
                details.push(CheckDetail::new(
                    "jails",
                    CheckStatus::Warn,
                    "could not query jail status",
                ));
            }
        }

        CheckResult::from_details(self.category(), "fail2ban coverage", details)
    }
}
