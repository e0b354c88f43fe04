//! System information probe.
//!
//! Every field is best-effort: a failed probe leaves its field empty and
//! logs at `debug`, the audit continues regardless.

use std::time::Duration;

use tracing::debug;

use crate::config::SysinfoConfig;
use crate::exec::CommandRunner;
use crate::report::SystemInfo;

/// Deadline for the optional public IP lookup.
const PUBLIC_IP_TIMEOUT: Duration = Duration::from_secs(5);

/// Extracts `PRETTY_NAME` from `/etc/os-release` content.
pub fn parse_os_release(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.strip_prefix("PRETTY_NAME=")
            .map(|value| value.trim_matches('"').to_string())
    })
}

/// Parses `/proc/uptime` (seconds-with-fraction, idle-seconds).
pub fn parse_uptime(content: &str) -> Option<u64> {
    content
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .map(|secs| secs as u64)
}

async fn probe_public_ip(config: &SysinfoConfig) -> Option<String> {
    let client = reqwest::Client::builder()
        .timeout(PUBLIC_IP_TIMEOUT)
        .build()
        .ok()?;
    let text = client
        .get(&config.public_ip_url)
        .send()
        .await
        .ok()?
        .text()
        .await
        .ok()?;
    let candidate = text.trim();
    // The endpoint answers with a bare address; anything else means a
    // captive portal or proxy got in the way.
    candidate
        .parse::<std::net::IpAddr>()
        .ok()
        .map(|ip| ip.to_string())
}

/// Gathers host facts.
pub async fn collect(runner: &CommandRunner, config: &SysinfoConfig) -> SystemInfo {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();

    let os = std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|content| parse_os_release(&content))
        .unwrap_or_default();

    let kernel_version = match runner.run("uname", &["-r"]).await {
        Ok(output) => output.trim().to_string(),
        Err(e) => {
            debug!(error = %e, "kernel version probe failed");
            String::new()
        }
    };

    let uptime = std::fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|content| parse_uptime(&content))
        .unwrap_or(0);

    let public_ip = if config.public_ip_probe {
        probe_public_ip(config).await
    } else {
        None
    };

    SystemInfo {
        hostname,
        os,
        kernel_version,
        uptime,
        public_ip,
    }
}
