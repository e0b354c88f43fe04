//! Automatic security update check (Debian-family hosts).

use async_trait::async_trait;

use super::{Category, Check, CheckContext};
use crate::error::Error;
use crate::report::{CheckDetail, CheckResult, CheckStatus};

/// Verifies unattended-upgrades is configured on apt-based systems.
pub struct UnattendedUpgradesCheck;

const AUTO_UPGRADES_PATH: &str = "/etc/apt/apt.conf.d/20auto-upgrades";

/// True when the apt periodic config enables unattended upgrades.
fn auto_upgrades_enabled(content: &str) -> bool {
    content.lines().any(|line| {
        let line = line.trim();
        !line.starts_with("//")
            && line.contains("APT::Periodic::Unattended-Upgrade")
            && line.contains("\"1\"")
    })
}

#[async_trait]
impl Check for UnattendedUpgradesCheck {
    fn category(&self) -> Category {
        Category::UnattendedUpgrades
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        if !ctx.runner.tool_available("apt-get") {
            return CheckResult::skip(self.category(), "not an apt-based system");
        }

        if let Ok(content) = std::fs::read_to_string(AUTO_UPGRADES_PATH) {
            if auto_upgrades_enabled(&content) {
                return CheckResult::from_details(
                    self.category(),
                    "automatic security updates",
                    vec![CheckDetail::new(
                        "apt_periodic",
                        CheckStatus::Pass,
                        "unattended upgrades enabled via apt periodic config",
                    )],
                );
            }
        }

        // The config file is absent on systemd-timer-driven setups.
        match ctx
            .runner
            .run("systemctl", &["is-active", "unattended-upgrades"])
            .await
        {
            Ok(state) if state.trim() == "active" => {
                return CheckResult::from_details(
                    self.category(),
                    "automatic security updates",
                    vec![CheckDetail::new(
                        "service",
                        CheckStatus::Pass,
                        "unattended-upgrades service is active",
                    )],
                );
            }
            Err(Error::Timeout { .. }) => {
                return CheckResult::warn(self.category(), "probe timed out");
            }
            Err(Error::Cancelled) => {
                return CheckResult::skip(self.category(), "cancelled");
            }
            // "inactive" exits non-zero; a disabled setup falls through
            // to the warn below.
            _ => {}
        }

        CheckResult::from_details(
            self.category(),
            "automatic security updates",
            vec![CheckDetail::new(
                "disabled",
                CheckStatus::Warn,
                "security updates are not applied automatically",
            )],
        )
    }
}
