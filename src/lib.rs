//! # Hostaudit - Host-Level Security Audit Agent
//!
//! Hostaudit is an async-first security audit agent for Linux servers. It
//! probes the running system through external commands and filesystem
//! reads, parses semi-structured operator-tool output (`last`, `lastb`,
//! `w`, `auth.log`), classifies findings into statuses and risk levels,
//! and produces a structured JSON report plus remediation
//! recommendations.
//!
//! ## Core Concepts
//!
//! - **Checks**: independent read-only policy probes, each producing one
//!   `CheckResult` under a stable category tag
//! - **Details**: sub-findings within a check, carrying their own status
//!   and optional evidence
//! - **Evidence**: structured context (file path + SHA-256, timestamps,
//!   network data, process trees) with a risk level
//! - **Collectors**: inventory probes (logins, sockets, processes, cron)
//!   feeding the report's assets section
//! - **Runner**: bounded-concurrency orchestrator that seals one
//!   `AuditResult` per run
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use hostaudit::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let runner = AuditRunner::new(config);
//!     let result = runner.run(CancellationToken::new()).await;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of the most commonly needed types.

    pub use crate::checks::{Category, Check, CheckContext, CheckRegistry};
    pub use crate::collectors::Assets;
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::exec::CommandRunner;
    pub use crate::geoip::GeoIpResolver;
    pub use crate::report::{
        AuditResult, CheckDetail, CheckResult, CheckStatus, Evidence, RiskLevel, SystemInfo,
    };
    pub use crate::runner::AuditRunner;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for Hostaudit operations.
pub mod error;

/// Layered configuration (TOML files, environment, CLI overrides).
pub mod config;

/// Report data model: audit results, checks, details, evidence.
pub mod report;

// ============================================================================
// Probing Infrastructure
// ============================================================================

/// Command executor with per-call deadlines and cancellation.
///
/// Every external tool the audit invokes goes through this layer; it is
/// the only place child processes are created.
pub mod exec;

/// Text parsers for operator-tool output.
///
/// Table-driven parsing of `last`/`lastb` columns, syslog timestamps
/// (with year synthesis), auth-log failure lines, and the `w` idle-time
/// grammar.
pub mod parse;

/// Evidence construction: builders and streaming file hashing.
pub mod evidence;

/// System info probe (hostname, OS, kernel, uptime, public IP).
pub mod sysinfo;

/// GeoIP resolution with a shared, reloadable database handle.
pub mod geoip;

// ============================================================================
// Audit Engine
// ============================================================================

/// Security checks and their registry.
///
/// Each check implements the [`Check`](checks::Check) trait and reports
/// under one of the closed set of category tags. The registry's
/// declaration order is the report order.
pub mod checks;

/// Asset collectors: login history, listening sockets, processes, cron.
pub mod collectors;

/// Remediation recommendation builder.
pub mod recommend;

/// Audit orchestrator: bounded worker pool, cancellation, sealing.
pub mod runner;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of Hostaudit.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
