//! Process and environment checks: things executing out of temp
//! directories, known miner names, and library-preload hijacks.

use std::path::Path;

use async_trait::async_trait;

use super::{Category, Check, CheckContext};
use crate::collectors::processes::{self, ProcessInfo};
use crate::evidence::EvidenceBuilder;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

/// Executable names of widespread cryptominers and droppers.
const MINER_NAMES: &[&str] = &[
    "xmrig",
    "xmr-stak",
    "minerd",
    "kinsing",
    "kdevtmpfsi",
    "cryptonight",
    "stratum",
];

/// World-writable directories nothing legitimate should execute from.
const TEMP_EXEC_PREFIXES: &[&str] = &["/tmp/", "/var/tmp/", "/dev/shm/"];

// ============================================================================
// suspicious_processes
// ============================================================================

/// Flags miners and binaries running out of scratch space.
pub struct SuspiciousProcessesCheck;

/// Ancestry chain for a pid, oldest first, one `pid user command` line
/// per hop. Cycles are impossible in a live table but the walk is capped
/// anyway for inventories stitched from races.
pub fn build_process_tree(inventory: &[ProcessInfo], pid: u32) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = pid;
    for _ in 0..32 {
        let Some(proc_info) = inventory.iter().find(|p| p.pid == current) else {
            break;
        };
        chain.push(format!(
            "{} {} {}",
            proc_info.pid, proc_info.user, proc_info.args
        ));
        if proc_info.ppid == 0 || proc_info.ppid == current {
            break;
        }
        current = proc_info.ppid;
    }
    chain.reverse();
    chain
}

fn evaluate_processes(inventory: &[ProcessInfo]) -> Vec<CheckDetail> {
    let mut details = Vec::new();

    for proc_info in inventory {
        let comm = proc_info.command.to_lowercase();
        let first_arg = proc_info.args.split_whitespace().next().unwrap_or("");

        if MINER_NAMES.iter().any(|name| comm.contains(name)) {
            details.push(
                CheckDetail::new(
                    format!("miner_{}", proc_info.pid),
                    CheckStatus::Fail,
                    format!(
                        "process '{}' (pid {}) matches a known cryptominer",
                        proc_info.command, proc_info.pid
                    ),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::High)
                        .process_tree(build_process_tree(inventory, proc_info.pid))
                        .build(),
                ),
            );
        } else if TEMP_EXEC_PREFIXES
            .iter()
            .any(|prefix| first_arg.starts_with(prefix))
        {
            details.push(
                CheckDetail::new(
                    format!("temp_exec_{}", proc_info.pid),
                    CheckStatus::Warn,
                    format!(
                        "process {} executes from scratch space: {}",
                        proc_info.pid, first_arg
                    ),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::Medium)
                        .process_tree(build_process_tree(inventory, proc_info.pid))
                        .build(),
                ),
            );
        }
    }

    if details.is_empty() {
        details.push(CheckDetail::new(
            "process_table",
            CheckStatus::Pass,
            format!("{} processes reviewed, none suspicious", inventory.len()),
        ));
    }

    details
}

#[async_trait]
impl Check for SuspiciousProcessesCheck {
    fn category(&self) -> Category {
        Category::SuspiciousProcesses
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let inventory = processes::collect(&ctx.runner).await;
        if ctx.cancel.is_cancelled() {
            return CheckResult::skip(self.category(), "cancelled");
        }
        if inventory.is_empty() {
            return CheckResult::skip(self.category(), "ps unavailable");
        }
        CheckResult::from_details(
            self.category(),
            "process table review",
            evaluate_processes(&inventory),
        )
    }
}

// ============================================================================
// suspicious_env_vars
// ============================================================================

/// Detects dynamic-linker hijacks: `LD_PRELOAD`-style variables in the
/// ambient environment, `/etc/ld.so.preload`, and `/etc/environment`.
pub struct SuspiciousEnvVarsCheck;

const PRELOAD_VARS: &[&str] = &["LD_PRELOAD", "LD_AUDIT", "LD_LIBRARY_PATH"];

fn evaluate_environment_file(content: &str) -> Vec<CheckDetail> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            PRELOAD_VARS.contains(&key).then(|| {
                CheckDetail::new(
                    format!("environment_{}", key.to_lowercase()),
                    CheckStatus::Warn,
                    format!("/etc/environment sets {key}={}", value.trim()),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::Medium)
                        .file_path_only(Path::new("/etc/environment"))
                        .build(),
                )
            })
        })
        .collect()
}

#[async_trait]
impl Check for SuspiciousEnvVarsCheck {
    fn category(&self) -> Category {
        Category::SuspiciousEnvVars
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckResult {
        let mut details = Vec::new();

        for var in PRELOAD_VARS {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    details.push(CheckDetail::new(
                        format!("env_{}", var.to_lowercase()),
                        CheckStatus::Warn,
                        format!("{var} is set in the ambient environment: {value}"),
                    ));
                }
            }
        }

        let preload_path = Path::new("/etc/ld.so.preload");
        match std::fs::read_to_string(preload_path) {
            Ok(content) if !content.trim().is_empty() => {
                details.push(
                    CheckDetail::new(
                        "ld_so_preload",
                        CheckStatus::Fail,
                        format!(
                            "/etc/ld.so.preload forces libraries into every process: {}",
                            content.trim().replace('\n', ", ")
                        ),
                    )
                    .with_evidence(
                        EvidenceBuilder::new(RiskLevel::High).file(preload_path).build(),
                    ),
                );
            }
            _ => {}
        }

        if let Ok(content) = std::fs::read_to_string("/etc/environment") {
            details.extend(evaluate_environment_file(&content));
        }

        if details.is_empty() {
            return CheckResult::pass(self.category(), "no linker-preload overrides found");
        }
        CheckResult::from_details(self.category(), "linker environment review", details)
    }
}
