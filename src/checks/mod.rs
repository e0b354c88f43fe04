//! Security check system.
//!
//! This module provides the core trait, category set, and registry for
//! the audit's security checks. Checks are independent read-only probes
//! that classify what they find; they never mutate the host.

pub mod accounts;
pub mod cron;
pub mod fail2ban;
pub mod files;
pub mod logins;
pub mod network;
pub mod process;
pub mod rootkit;
pub mod ssh;
pub mod ufw;
pub mod updates;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::exec::CommandRunner;
use crate::geoip::GeoIpResolver;
use crate::report::CheckResult;

/// Closed set of check categories. The serialized snake_case tags are a
/// stable contract with the report consumers; renaming a variant is a
/// breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NonRootUser,
    UfwSecurity,
    SshSecurity,
    AccessControl,
    PortSecurity,
    UnattendedUpgrades,
    Fail2ban,
    RootkitDetection,
    SuspiciousProcesses,
    ListeningPorts,
    CronJobs,
    SuspiciousFiles,
    SystemAccounts,
    NetworkConnections,
    FileIntegrity,
    LoginHistory,
    ImmutableFiles,
    SuspiciousEnvVars,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::NonRootUser => "non_root_user",
            Category::UfwSecurity => "ufw_security",
            Category::SshSecurity => "ssh_security",
            Category::AccessControl => "access_control",
            Category::PortSecurity => "port_security",
            Category::UnattendedUpgrades => "unattended_upgrades",
            Category::Fail2ban => "fail2ban",
            Category::RootkitDetection => "rootkit_detection",
            Category::SuspiciousProcesses => "suspicious_processes",
            Category::ListeningPorts => "listening_ports",
            Category::CronJobs => "cron_jobs",
            Category::SuspiciousFiles => "suspicious_files",
            Category::SystemAccounts => "system_accounts",
            Category::NetworkConnections => "network_connections",
            Category::FileIntegrity => "file_integrity",
            Category::LoginHistory => "login_history",
            Category::ImmutableFiles => "immutable_files",
            Category::SuspiciousEnvVars => "suspicious_env_vars",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context shared by every check in a run.
///
/// Collaborators are injected here rather than reached through globals so
/// tests can substitute doubles.
#[derive(Clone)]
pub struct CheckContext {
    pub config: Arc<Config>,
    pub runner: CommandRunner,
    pub geoip: Arc<GeoIpResolver>,
    pub cancel: CancellationToken,
}

impl CheckContext {
    pub fn new(
        config: Arc<Config>,
        runner: CommandRunner,
        geoip: Arc<GeoIpResolver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            runner,
            geoip,
            cancel,
        }
    }
}

/// Trait that all security checks implement.
///
/// A check owns exactly one category and produces exactly one
/// [`CheckResult`] per run. Probe failures are classified, never
/// propagated: a missing tool is a `skip`, a partial probe a `warn`, and
/// only an observed policy violation a `fail`.
#[async_trait]
pub trait Check: Send + Sync {
    /// The category tag this check reports under
    fn category(&self) -> Category;

    /// Runs the probe and classifies the findings
    async fn run(&self, ctx: &CheckContext) -> CheckResult;
}

/// Registry holding every check in report order.
///
/// The declaration order here is the order `securityChecks` appears in
/// the report, regardless of per-check completion order.
pub struct CheckRegistry {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Create a registry with all built-in checks
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // Account and access hygiene
        registry.register(Arc::new(accounts::NonRootUserCheck));

        // Perimeter
        registry.register(Arc::new(ufw::UfwCheck));
        registry.register(Arc::new(ssh::SshConfigCheck::default()));
        registry.register(Arc::new(accounts::AccessControlCheck));
        registry.register(Arc::new(network::PortSecurityCheck));

        // Patching and brute-force defenses
        registry.register(Arc::new(updates::UnattendedUpgradesCheck));
        registry.register(Arc::new(fail2ban::Fail2banCheck));

        // Intrusion artifacts
        registry.register(Arc::new(rootkit::RootkitCheck));
        registry.register(Arc::new(process::SuspiciousProcessesCheck));
        registry.register(Arc::new(network::ListeningPortsCheck));
        registry.register(Arc::new(cron::CronJobsCheck));
        registry.register(Arc::new(files::SuspiciousFilesCheck::default()));
        registry.register(Arc::new(accounts::SystemAccountsCheck));
        registry.register(Arc::new(network::NetworkConnectionsCheck));
        registry.register(Arc::new(files::FileIntegrityCheck));

        // History and persistence
        registry.register(Arc::new(logins::LoginHistoryCheck));
        registry.register(Arc::new(files::ImmutableFilesCheck));
        registry.register(Arc::new(process::SuspiciousEnvVarsCheck));

        registry
    }

    /// Register a check
    pub fn register(&mut self, check: Arc<dyn Check>) {
        self.checks.push(check);
    }

    /// Checks in report order
    pub fn checks(&self) -> &[Arc<dyn Check>] {
        &self.checks
    }

    /// Category tags in report order
    pub fn categories(&self) -> Vec<Category> {
        self.checks.iter().map(|c| c.category()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
