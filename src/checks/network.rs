//! Network surface checks: listening sockets and established
//! connections.

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

use super::{Category, Check, CheckContext};
use crate::collectors::ports::{self, ListeningPort};
use crate::error::Error;
use crate::evidence::EvidenceBuilder;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

/// Plaintext remote-administration ports; exposure is a hard failure.
const PLAINTEXT_ADMIN_PORTS: &[(u16, &str)] = &[(21, "ftp"), (23, "telnet"), (512, "rexec"), (513, "rlogin")];

/// Services that should never face the network unauthenticated.
const DATABASE_PORTS: &[(u16, &str)] = &[
    (3306, "mysql"),
    (5432, "postgresql"),
    (6379, "redis"),
    (9200, "elasticsearch"),
    (11211, "memcached"),
    (27017, "mongodb"),
];

/// Ports historically favored by reverse shells and IRC botnets.
const SUSPICIOUS_REMOTE_PORTS: &[u16] = &[1337, 4444, 5555, 6666, 6667, 31337];

/// Exposing more listeners than this is worth an operator's attention
/// even when every single one looks legitimate.
const EXPOSURE_WARN_THRESHOLD: usize = 20;

/// Established connections from a single remote address beyond this
/// count look like tunneling or data exfiltration.
const CONNECTION_FLOOD_THRESHOLD: usize = 50;

fn conn_evidence(port: &ListeningPort, risk: RiskLevel) -> Option<crate::report::Evidence> {
    EvidenceBuilder::new(risk)
        .network_conn(format!(
            "{} {}:{} {}",
            port.protocol,
            port.local_address,
            port.port,
            port.process.as_deref().unwrap_or("-")
        ))
        .build()
}

// ============================================================================
// port_security
// ============================================================================

/// Flags plaintext admin services and network-facing databases.
pub struct PortSecurityCheck;

fn evaluate_port_security(sockets: &[ListeningPort]) -> Vec<CheckDetail> {
    let mut details = Vec::new();

    for socket in sockets.iter().filter(|s| s.is_externally_reachable()) {
        if let Some((_, service)) = PLAINTEXT_ADMIN_PORTS
            .iter()
            .find(|(port, _)| *port == socket.port)
        {
            details.push(
                CheckDetail::new(
                    format!("{service}_{}", socket.port),
                    CheckStatus::Fail,
                    format!(
                        "{service} listening on {}:{}, credentials travel in plaintext",
                        socket.local_address, socket.port
                    ),
                )
                .with_evidence(conn_evidence(socket, RiskLevel::High)),
            );
        } else if let Some((_, service)) = DATABASE_PORTS
            .iter()
            .find(|(port, _)| *port == socket.port)
        {
            details.push(
                CheckDetail::new(
                    format!("{service}_{}", socket.port),
                    CheckStatus::Warn,
                    format!(
                        "{service} reachable from the network on {}:{}",
                        socket.local_address, socket.port
                    ),
                )
                .with_evidence(conn_evidence(socket, RiskLevel::Medium)),
            );
        }
    }

    if details.is_empty() {
        details.push(CheckDetail::new(
            "exposed_services",
            CheckStatus::Pass,
            "no plaintext or database service faces the network",
        ));
    }

    details
}

#[async_trait]
impl Check for PortSecurityCheck {
    fn category(&self) -> Category {
        Category::PortSecurity
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let sockets = ports::collect(&ctx.runner).await;
        if ctx.cancel.is_cancelled() {
            return CheckResult::skip(self.category(), "cancelled");
        }
        if sockets.is_empty() {
            return CheckResult::skip(self.category(), "ss and netstat unavailable");
        }
        CheckResult::from_details(
            self.category(),
            "exposed service review",
            evaluate_port_security(&sockets),
        )
    }
}

// ============================================================================
// listening_ports
// ============================================================================

/// Inventory-grade review of everything bound to a socket.
pub struct ListeningPortsCheck;

fn evaluate_listening_ports(sockets: &[ListeningPort]) -> Vec<CheckDetail> {
    let external: Vec<_> = sockets.iter().filter(|s| s.is_externally_reachable()).collect();
    let mut details = Vec::new();

    for socket in &external {
        details.push(CheckDetail::new(
            format!("{}_{}_{}", socket.protocol, socket.local_address, socket.port),
            CheckStatus::Pass,
            format!(
                "{} {}:{} {}",
                socket.protocol,
                socket.local_address,
                socket.port,
                socket.process.as_deref().unwrap_or("-")
            ),
        ));
    }

    if external.len() > EXPOSURE_WARN_THRESHOLD {
        details.push(CheckDetail::new(
            "exposure_breadth",
            CheckStatus::Warn,
            format!(
                "{} externally reachable listeners, review whether all are intended",
                external.len()
            ),
        ));
    }

    details
}

#[async_trait]
impl Check for ListeningPortsCheck {
    fn category(&self) -> Category {
        Category::ListeningPorts
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let sockets = ports::collect(&ctx.runner).await;
        if ctx.cancel.is_cancelled() {
            return CheckResult::skip(self.category(), "cancelled");
        }
        if sockets.is_empty() {
            return CheckResult::skip(self.category(), "ss and netstat unavailable");
        }
        let details = evaluate_listening_ports(&sockets);
        if details.is_empty() {
            return CheckResult::pass(self.category(), "no externally reachable listener");
        }
        CheckResult::from_details(
            self.category(),
            format!("{} listening socket(s)", sockets.len()),
            details,
        )
    }
}

// ============================================================================
// network_connections
// ============================================================================

/// Reviews established TCP connections for floods and known-bad remote
/// ports.
pub struct NetworkConnectionsCheck;

/// Parses established connections out of `ss -tn` or `netstat -tn`
/// output as `(local, peer)` address pairs.
pub fn parse_established(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            if fields[0].starts_with("ESTAB") {
                // ss: State Recv-Q Send-Q Local Peer
                Some((fields[3].to_string(), fields[4].to_string()))
            } else if fields[0].starts_with("tcp") && fields.contains(&"ESTABLISHED") {
                // netstat: Proto Recv-Q Send-Q Local Foreign State
                Some((fields[3].to_string(), fields[4].to_string()))
            } else {
                None
            }
        })
        .collect()
}

fn peer_ip(peer: &str) -> &str {
    peer.rsplit_once(':').map(|(ip, _)| ip).unwrap_or(peer)
}

fn peer_port(peer: &str) -> Option<u16> {
    peer.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
}

fn evaluate_connections(pairs: &[(String, String)]) -> Vec<CheckDetail> {
    let mut details = Vec::new();
    let mut per_remote: IndexMap<&str, usize> = IndexMap::new();

    for (_, peer) in pairs {
        *per_remote.entry(peer_ip(peer)).or_insert(0) += 1;

        if let Some(port) = peer_port(peer) {
            if SUSPICIOUS_REMOTE_PORTS.contains(&port) {
                details.push(
                    CheckDetail::new(
                        format!("suspicious_port_{}", peer),
                        CheckStatus::Warn,
                        format!("established connection to {peer}, a port favored by backdoors"),
                    )
                    .with_evidence(
                        EvidenceBuilder::new(RiskLevel::High)
                            .network_conn(peer.clone())
                            .build(),
                    ),
                );
            }
        }
    }

    for (remote, count) in &per_remote {
        if *count > CONNECTION_FLOOD_THRESHOLD {
            details.push(
                CheckDetail::new(
                    format!("flood_{remote}"),
                    CheckStatus::Warn,
                    format!("{count} established connections from {remote}"),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::Medium)
                        .network_conn(format!("{remote} x{count}"))
                        .build(),
                ),
            );
        }
    }

    if details.is_empty() {
        details.push(CheckDetail::new(
            "established",
            CheckStatus::Pass,
            format!("{} established connection(s), none anomalous", pairs.len()),
        ));
    }

    details
}

#[async_trait]
impl Check for NetworkConnectionsCheck {
    fn category(&self) -> Category {
        Category::NetworkConnections
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let output = match ctx.runner.run("ss", &["-tn"]).await {
            Ok(output) => output,
            Err(Error::Cancelled) => return CheckResult::skip(self.category(), "cancelled"),
            // The tool exists but blew its deadline; falling back would
            // just time out again.
            Err(Error::Timeout { .. }) => {
                return CheckResult::warn(self.category(), "probe timed out")
            }
            Err(e) => {
                debug!(error = %e, "ss unavailable, trying netstat");
                match ctx.runner.run("netstat", &["-tn"]).await {
                    Ok(output) => output,
                    Err(Error::Cancelled) => {
                        return CheckResult::skip(self.category(), "cancelled")
                    }
                    Err(Error::Timeout { .. }) => {
                        return CheckResult::warn(self.category(), "probe timed out")
                    }
                    Err(e) => {
                        return CheckResult::skip(
                            self.category(),
                            format!("connection listing unavailable: {e}"),
                        );
                    }
                }
            }
        };

        CheckResult::from_details(
            self.category(),
            "established connection review",
            evaluate_connections(&parse_established(&output)),
        )
    }
}
