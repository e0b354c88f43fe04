//! Process inventory.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exec::CommandRunner;

/// One running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub user: String,
    /// Executable name as reported by the kernel
    pub command: String,
    /// Full command line
    pub args: String,
}

/// Collects the process inventory via `ps`.
pub async fn collect(runner: &CommandRunner) -> Vec<ProcessInfo> {
    match runner
        .run("ps", &["-eo", "pid,ppid,user,comm,args", "--no-headers"])
        .await
    {
        Ok(output) => parse_ps_output(&output),
        Err(e) => {
            debug!(error = %e, "ps unavailable");
            Vec::new()
        }
    }
}

/// Parses `ps -eo pid,ppid,user,comm,args --no-headers` output.
pub fn parse_ps_output(output: &str) -> Vec<ProcessInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(ProcessInfo {
                pid: fields[0].parse().ok()?,
                ppid: fields[1].parse().ok()?,
                user: fields[2].to_string(),
                command: fields[3].to_string(),
                args: fields[4..].join(" "),
            })
        })
        .collect()
}
