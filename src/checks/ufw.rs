//! UFW firewall state check.

use async_trait::async_trait;
use tracing::debug;

use super::{Category, Check, CheckContext};
use crate::error::Error;
use crate::report::{CheckDetail, CheckResult, CheckStatus};

/// Verifies that the Uncomplicated Firewall is present and active.
pub struct UfwCheck;

/// Classifies `ufw status` output.
fn evaluate_ufw_status(output: &str) -> CheckDetail {
    let lower = output.to_lowercase();
    if lower.contains("status: active") {
        CheckDetail::new("firewall_state", CheckStatus::Pass, "ufw is active")
    } else if lower.contains("status: inactive") {
        CheckDetail::new(
            "firewall_state",
            CheckStatus::Fail,
            "ufw is installed but inactive",
        )
    } else {
        CheckDetail::new(
            "firewall_state",
            CheckStatus::Warn,
            "ufw status output not recognized",
        )
    }
}

#[async_trait]
impl Check for UfwCheck {
    fn category(&self) -> Category {
        Category::UfwSecurity
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        match ctx.runner.run("ufw", &["status"]).await {
            Ok(output) => CheckResult::from_details(
                self.category(),
                "firewall state",
                vec![evaluate_ufw_status(&output)],
            ),
            Err(Error::ToolMissing(_)) => {
                debug!("ufw not installed");
                CheckResult::skip(self.category(), "ufw not installed")
            }
            Err(Error::PermissionDenied(_)) => CheckResult::warn(
                self.category(),
                "ufw status requires root, firewall state unknown",
            ),
            Err(Error::Timeout { .. }) => CheckResult::warn(self.category(), "probe timed out"),
            Err(Error::Cancelled) => CheckResult::skip(self.category(), "cancelled"),
            Err(e) => CheckResult::warn(self.category(), format!("ufw probe failed: {e}")),
        }
    }
}
