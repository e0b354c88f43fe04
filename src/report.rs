//! Report data model for audit runs.
//!
//! All types serialize with the exact field names the control-plane UI
//! consumes (`systemInfo`, `securityChecks`, `startTime`, ...). Absent
//! optional fields are omitted from the JSON, never emitted as null.

use serde::{Deserialize, Serialize};

use crate::checks::Category;
use crate::collectors::Assets;

/// Status of a single check or a sub-finding.
///
/// The variant order defines the aggregation lattice: `pass < skip < warn
/// < fail`. A parent's status is the worst status among its details.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Policy satisfied
    #[default]
    Pass,
    /// Probe not possible on this host (missing tool, missing file)
    Skip,
    /// Probe partially succeeded or a soft policy concern was observed
    Warn,
    /// A real policy violation was observed
    Fail,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Skip => "skip",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
        }
    }

    /// Worst status among the given details, or `None` for an empty slice.
    pub fn worst(details: &[CheckDetail]) -> Option<CheckStatus> {
        details.iter().map(|d| d.status).max()
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk level attached to evidence, independent of status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Structured context attached to a sub-finding.
///
/// Built through [`crate::evidence::EvidenceBuilder`], which guarantees at
/// least one context field is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Hex SHA-256 of the file at `file_path` (64 lowercase hex chars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    /// Unix milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_conn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_tree: Option<Vec<String>>,
    pub risk_level: RiskLevel,
}

/// A sub-finding within a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDetail {
    /// Unique within the parent check
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

impl CheckDetail {
    pub fn new(
        name: impl Into<String>,
        status: CheckStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Option<Evidence>) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Result of a single security check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub category: Category,
    pub status: CheckStatus,
    /// One-line human summary
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<CheckDetail>>,
}

impl CheckResult {
    /// A result with an explicit status and no details.
    pub fn new(category: Category, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            category,
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn pass(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, CheckStatus::Pass, message)
    }

    pub fn skip(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, CheckStatus::Skip, message)
    }

    pub fn warn(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, CheckStatus::Warn, message)
    }

    /// A result aggregated from details: status is the worst detail status.
    /// An empty detail list falls back to `pass` with no details attached.
    pub fn from_details(
        category: Category,
        message: impl Into<String>,
        details: Vec<CheckDetail>,
    ) -> Self {
        match CheckStatus::worst(&details) {
            Some(status) => Self {
                category,
                status,
                message: message.into(),
                details: Some(details),
            },
            None => Self::pass(category, message),
        }
    }

    /// Iterator over details, empty when none were attached.
    pub fn details(&self) -> impl Iterator<Item = &CheckDetail> {
        self.details.iter().flatten()
    }
}

/// Basic facts about the audited host.
///
/// Probe failures leave the affected field empty; the audit never aborts
/// on an unreadable fact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub kernel_version: String,
    /// Seconds since boot
    pub uptime: u64,
    #[serde(rename = "publicIP", skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

/// One complete audit run.
///
/// Created by the runner at run start and sealed (returned by value, no
/// mutation API) at run end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub system_info: SystemInfo,
    /// Registry declaration order, regardless of completion order
    pub security_checks: Vec<CheckResult>,
    pub assets: Assets,
    /// Severity-tagged remediation lines, stable order
    pub recommendations: Vec<String>,
    /// Unix milliseconds
    pub start_time: i64,
    /// Unix milliseconds
    pub end_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::Category;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_ordering() {
        assert!(CheckStatus::Pass < CheckStatus::Skip);
        assert!(CheckStatus::Skip < CheckStatus::Warn);
        assert!(CheckStatus::Warn < CheckStatus::Fail);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&CheckStatus::Fail).unwrap(),
            "\"fail\""
        );
        assert_eq!(
            serde_json::to_string(&CheckStatus::Skip).unwrap(),
            "\"skip\""
        );
    }

    #[test]
    fn test_worst_of_details() {
        let details = vec![
            CheckDetail::new("a", CheckStatus::Pass, "ok"),
            CheckDetail::new("b", CheckStatus::Warn, "hmm"),
            CheckDetail::new("c", CheckStatus::Skip, "n/a"),
        ];
        assert_eq!(CheckStatus::worst(&details), Some(CheckStatus::Warn));
        assert_eq!(CheckStatus::worst(&[]), None);
    }

    #[test]
    fn test_from_details_aggregates_worst() {
        let result = CheckResult::from_details(
            Category::SshSecurity,
            "ssh audit",
            vec![
                CheckDetail::new("root_login", CheckStatus::Fail, "PermitRootLogin yes"),
                CheckDetail::new("port", CheckStatus::Warn, "Port 22"),
            ],
        );
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.details().count(), 2);
    }

    #[test]
    fn test_from_details_empty_is_pass() {
        let result = CheckResult::from_details(Category::Fail2ban, "nothing", vec![]);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.details.is_none());
    }

    #[test]
    fn test_report_field_names() {
        let result = AuditResult {
            system_info: SystemInfo {
                hostname: "vps-1".into(),
                os: "Debian GNU/Linux 12".into(),
                kernel_version: "6.1.0-18-amd64".into(),
                uptime: 86_400,
                public_ip: Some("203.0.113.5".into()),
            },
            security_checks: vec![CheckResult::pass(Category::UfwSecurity, "active")],
            assets: Assets::default(),
            recommendations: vec![],
            start_time: 1,
            end_time: 2,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("systemInfo").is_some());
        assert!(json.get("securityChecks").is_some());
        assert!(json.get("startTime").is_some());
        assert!(json.get("endTime").is_some());
        assert_eq!(json["systemInfo"]["publicIP"], "203.0.113.5");
        assert_eq!(json["systemInfo"]["kernelVersion"], "6.1.0-18-amd64");
        assert_eq!(json["securityChecks"][0]["category"], "ufw_security");
    }

    #[test]
    fn test_absent_fields_omitted() {
        let detail = CheckDetail::new("x", CheckStatus::Pass, "ok");
        let json = serde_json::to_value(&detail).unwrap();
        assert!(json.get("evidence").is_none());

        let info = SystemInfo::default();
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("publicIP").is_none());
    }
}
