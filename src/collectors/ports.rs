//! Listening socket inventory.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::exec::CommandRunner;

static SS_PROCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\(\("([^"]+)",pid=(\d+)"#).expect("invalid ss process regex"));

/// One listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningPort {
    /// `tcp` or `udp`
    pub protocol: String,
    /// Bind address without the port (`0.0.0.0`, `127.0.0.1`, `[::]`, ...)
    pub local_address: String,
    pub port: u16,
    /// `name(pid)` when the kernel exposed the owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
}

impl ListeningPort {
    /// True when the socket accepts traffic from other hosts.
    pub fn is_externally_reachable(&self) -> bool {
        !matches!(
            self.local_address.as_str(),
            "127.0.0.1" | "[::1]" | "::1" | "localhost"
        )
    }
}

/// Collects the listening socket inventory: `ss` first, `netstat` as the
/// fallback on older hosts.
pub async fn collect(runner: &CommandRunner) -> Vec<ListeningPort> {
    match runner.run("ss", &["-tulnp"]).await {
        Ok(output) => return parse_ss_output(&output),
        Err(Error::Cancelled) => return Vec::new(),
        Err(e) => debug!(error = %e, "ss unavailable, trying netstat"),
    }

    match runner.run("netstat", &["-tulnp"]).await {
        Ok(output) => parse_netstat_output(&output),
        Err(e) => {
            debug!(error = %e, "netstat unavailable");
            Vec::new()
        }
    }
}

/// Splits `0.0.0.0:22` / `[::]:22` / `*:22` into address and port.
fn split_local_address(local: &str) -> Option<(String, u16)> {
    let (addr, port) = local.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    let addr = if addr.is_empty() || addr == "*" {
        "0.0.0.0".to_string()
    } else {
        addr.to_string()
    };
    Some((addr, port))
}

/// Parses `ss -tulnp` output.
pub fn parse_ss_output(output: &str) -> Vec<ListeningPort> {
    output
        .lines()
        .filter(|line| !line.starts_with("Netid") && !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            let protocol = fields[0].to_string();
            if protocol != "tcp" && protocol != "udp" {
                return None;
            }
            let (local_address, port) = split_local_address(fields[4])?;
            let process = fields
                .get(6)
                .and_then(|p| SS_PROCESS.captures(p))
                .map(|caps| format!("{}({})", &caps[1], &caps[2]));
            Some(ListeningPort {
                protocol,
                local_address,
                port,
                process,
            })
        })
        .collect()
}

/// Parses `netstat -tulnp` output. UDP rows carry no state column, so the
/// process column is located from the end of the row.
pub fn parse_netstat_output(output: &str) -> Vec<ListeningPort> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            let protocol = match fields[0] {
                p if p.starts_with("tcp") => "tcp",
                p if p.starts_with("udp") => "udp",
                _ => return None,
            };
            if protocol == "tcp" && !fields.contains(&"LISTEN") {
                return None;
            }
            let (local_address, port) = split_local_address(fields[3])?;
            let process = fields
                .last()
                .filter(|p| p.contains('/'))
                .and_then(|p| p.split_once('/'))
                .map(|(pid, name)| format!("{name}({pid})"));
            Some(ListeningPort {
                protocol: protocol.to_string(),
                local_address,
                port,
                process,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ss() {
        let output = "\
Netid State  Recv-Q Send-Q Local Address:Port  Peer Address:Port Process
tcp   LISTEN 0      128          0.0.0.0:22         0.0.0.0:*     users:((\"sshd\",pid=712,fd=3))
tcp   LISTEN 0      511        127.0.0.1:6379       0.0.0.0:*     users:((\"redis-server\",pid=901,fd=6))
udp   UNCONN 0      0            0.0.0.0:68         0.0.0.0:*";
        let ports = parse_ss_output(output);
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0].port, 22);
        assert_eq!(ports[0].process.as_deref(), Some("sshd(712)"));
        assert!(ports[0].is_externally_reachable());
        assert_eq!(ports[1].local_address, "127.0.0.1");
        assert!(!ports[1].is_externally_reachable());
        assert_eq!(ports[2].protocol, "udp");
        assert!(ports[2].process.is_none());
    }

    #[test]
    fn test_parse_ss_ipv6_wildcard() {
        let output = "tcp   LISTEN 0      128             [::]:80            [::]:*";
        let ports = parse_ss_output(output);
        assert_eq!(ports[0].local_address, "[::]");
        assert_eq!(ports[0].port, 80);
        assert!(ports[0].is_externally_reachable());
    }

    #[test]
    fn test_parse_netstat() {
        let output = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN      712/sshd
tcp6       0      0 :::80                   :::*                    LISTEN      845/nginx
udp        0      0 0.0.0.0:68              0.0.0.0:*                           600/dhclient";
        let ports = parse_netstat_output(output);
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0].process.as_deref(), Some("sshd(712)"));
        assert_eq!(ports[1].port, 80);
        assert_eq!(ports[2].protocol, "udp");
    }

    #[test]
    fn test_netstat_established_rows_skipped() {
        let output =
            "tcp        0      0 10.0.0.5:22            203.0.113.9:40044       ESTABLISHED 712/sshd";
        assert!(parse_netstat_output(output).is_empty());
    }
}
