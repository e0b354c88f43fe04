//! Rootkit scanner integration (chkrootkit, rkhunter).

use async_trait::async_trait;
use tracing::debug;

use super::{Category, Check, CheckContext};
use crate::error::Error;
use crate::evidence::EvidenceBuilder;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

/// Warn details are capped per scanner; rkhunter alone can emit dozens on
/// an unmaintained host.
const MAX_WARNING_DETAILS: usize = 20;

/// Runs whichever of `chkrootkit` / `rkhunter` is installed and scans
/// their output for findings.
pub struct RootkitCheck;

/// Classifies one scanner's output lines.
fn evaluate_scanner_output(scanner: &str, output: &str) -> Vec<CheckDetail> {
    let mut details = Vec::new();
    let mut warnings = 0usize;

    for line in output.lines() {
        let line = line.trim();
        if line.contains("INFECTED") {
            details.push(
                CheckDetail::new(
                    format!("{scanner}_infected_{}", details.len()),
                    CheckStatus::Fail,
                    format!("{scanner}: {line}"),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::High)
                        .process_tree(vec![line.to_string()])
                        .build(),
                ),
            );
        } else if line.contains("Warning") {
            warnings += 1;
            if warnings <= MAX_WARNING_DETAILS {
                details.push(
                    CheckDetail::new(
                        format!("{scanner}_warning_{warnings}"),
                        CheckStatus::Warn,
                        format!("{scanner}: {line}"),
                    )
                    .with_evidence(
                        EvidenceBuilder::new(RiskLevel::Medium)
                            .process_tree(vec![line.to_string()])
                            .build(),
                    ),
                );
            }
        }
    }

    if warnings > MAX_WARNING_DETAILS {
        details.push(CheckDetail::new(
            format!("{scanner}_warnings_truncated"),
            CheckStatus::Warn,
            format!("{scanner}: {} further warnings omitted", warnings - MAX_WARNING_DETAILS),
        ));
    }

    details
}

#[async_trait]
impl Check for RootkitCheck {
    fn category(&self) -> Category {
        Category::RootkitDetection
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let scanners: &[(&str, &[&str])] = &[
            ("chkrootkit", &[]),
            ("rkhunter", &["--check", "--skip-keypress", "--nocolors"]),
        ];

        let mut details = Vec::new();
        let mut ran_any = false;

        for (scanner, args) in scanners {
            if !ctx.runner.tool_available(scanner) {
                continue;
            }
            // Scanners report findings through their exit code, so a
            // non-zero exit still carries a usable report.
            match ctx.runner.run_unchecked(scanner, args).await {
                Ok(output) => {
                    ran_any = true;
                    let findings = evaluate_scanner_output(scanner, &output.stdout);
                    if findings.is_empty() {
                        details.push(CheckDetail::new(
                            format!("{scanner}_clean"),
                            CheckStatus::Pass,
                            format!("{scanner} reported no findings"),
                        ));
                    } else {
                        details.extend(findings);
                    }
                }
                Err(Error::Timeout { .. }) => {
                    ran_any = true;
                    details.push(CheckDetail::new(
                        format!("{scanner}_timeout"),
                        CheckStatus::Warn,
                        "probe timed out",
                    ));
                }
                Err(Error::Cancelled) => {
                    return CheckResult::skip(self.category(), "cancelled");
                }
                Err(e) => {
                    debug!(scanner, error = %e, "scanner failed");
                    ran_any = true;
                    details.push(CheckDetail::new(
                        format!("{scanner}_error"),
                        CheckStatus::Warn,
                        format!("{scanner} could not be run: {e}"),
                    ));
                }
            }
        }

        if !ran_any {
            return CheckResult::skip(
                self.category(),
                "no rootkit scanner installed (chkrootkit, rkhunter)",
            );
        }

        CheckResult::from_details(self.category(), "rootkit scan", details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_infected_line_fails_with_high_risk() {
        let output = "\
Checking `lkm'... not infected
Checking `sniffer'... INFECTED (PACKET SNIFFER(/sbin/evil))";
        let details = evaluate_scanner_output("chkrootkit", output);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].status, CheckStatus::Fail);
        let evidence = details[0].evidence.as_ref().unwrap();
        assert_eq!(evidence.risk_level, RiskLevel::High);
        assert!(evidence.process_tree.as_ref().unwrap()[0].contains("INFECTED"));
    }

    #[test]
    fn test_warning_lines_warn() {
        let output = "Warning: The command '/usr/bin/lwp-request' has been replaced by a script";
        let details = evaluate_scanner_output("rkhunter", output);
        assert_eq!(details[0].status, CheckStatus::Warn);
    }

    #[test]
    fn test_clean_output_no_details() {
        assert!(evaluate_scanner_output("chkrootkit", "Checking `lkm'... not infected\n").is_empty());
    }

    #[test]
    fn test_warning_cap() {
        let output = (0..30)
            .map(|i| format!("Warning: issue {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let details = evaluate_scanner_output("rkhunter", &output);
        // 20 warnings + 1 truncation marker
        assert_eq!(details.len(), MAX_WARNING_DETAILS + 1);
        assert!(details.last().unwrap().message.contains("omitted"));
    }
}
