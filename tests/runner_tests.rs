//! Integration tests for the audit orchestrator
//!
//! These tests verify the run-level invariants:
//! - report order follows the registry regardless of completion order
//! - parent/child status consistency for every check with details
//! - time monotonicity and cancellation behavior
//! - recommendation determinism and the JSON field-name contract

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use hostaudit::checks::{Category, Check, CheckContext, CheckRegistry};
use hostaudit::config::Config;
use hostaudit::recommend;
use hostaudit::report::{CheckDetail, CheckResult, CheckStatus};
use hostaudit::runner::AuditRunner;

/// A check with a fixed outcome and an optional artificial delay, so
/// completion order can be forced to differ from registry order.
struct ScriptedCheck {
    category: Category,
    status: CheckStatus,
    delay: Duration,
}

impl ScriptedCheck {
    fn new(category: Category, status: CheckStatus) -> Self {
        Self {
            category,
            status,
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Check for ScriptedCheck {
    fn category(&self) -> Category {
        self.category
    }

    async fn run(&self, _ctx: &CheckContext) -> CheckResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        CheckResult::from_details(
            self.category,
            "scripted",
            vec![
                CheckDetail::new("outcome", self.status, "scripted outcome"),
                CheckDetail::new("baseline", CheckStatus::Pass, "always fine"),
            ],
        )
    }
}

fn scripted_registry() -> CheckRegistry {
    let mut registry = CheckRegistry::new();
    // The first-declared check finishes last
    registry.register(Arc::new(
        ScriptedCheck::new(Category::SshSecurity, CheckStatus::Fail)
            .with_delay(Duration::from_millis(100)),
    ));
    registry.register(Arc::new(ScriptedCheck::new(
        Category::UfwSecurity,
        CheckStatus::Warn,
    )));
    registry.register(Arc::new(ScriptedCheck::new(
        Category::Fail2ban,
        CheckStatus::Pass,
    )));
    registry
}

#[tokio::test]
async fn test_report_order_is_registry_order() {
    let runner = AuditRunner::with_registry(Config::default(), scripted_registry());
    let result = runner.run(CancellationToken::new()).await;

    let categories: Vec<_> = result.security_checks.iter().map(|c| c.category).collect();
    assert_eq!(
        categories,
        vec![Category::SshSecurity, Category::UfwSecurity, Category::Fail2ban]
    );
}

#[tokio::test]
async fn test_parent_status_is_worst_detail() {
    let runner = AuditRunner::with_registry(Config::default(), scripted_registry());
    let result = runner.run(CancellationToken::new()).await;

    for check in &result.security_checks {
        if let Some(details) = &check.details {
            let worst = details.iter().map(|d| d.status).max().unwrap();
            assert_eq!(check.status, worst, "category {}", check.category);
        }
    }
    assert_eq!(result.security_checks[0].status, CheckStatus::Fail);
    assert_eq!(result.security_checks[1].status, CheckStatus::Warn);
}

#[tokio::test]
async fn test_time_monotonicity() {
    let runner = AuditRunner::with_registry(Config::default(), scripted_registry());
    let result = runner.run(CancellationToken::new()).await;
    assert!(result.end_time >= result.start_time);
}

#[tokio::test]
async fn test_cancelled_run_marks_remaining_checks() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let runner = AuditRunner::with_registry(Config::default(), scripted_registry());
    let result = runner.run(cancel).await;

    assert_eq!(result.security_checks.len(), 3);
    for check in &result.security_checks {
        assert_eq!(check.status, CheckStatus::Skip);
        assert_eq!(check.message, "cancelled");
    }
    assert!(result.end_time >= result.start_time);
    // Cancelled checks carry no findings, so no recommendations either
    assert!(result.recommendations.is_empty());
}

#[tokio::test]
async fn test_recommendations_deterministic_for_same_inputs() {
    let runner = AuditRunner::with_registry(Config::default(), scripted_registry());
    let result = runner.run(CancellationToken::new()).await;

    let rebuilt = recommend::build(&result.security_checks);
    assert_eq!(result.recommendations, rebuilt);
    assert_eq!(rebuilt, recommend::build(&result.security_checks));

    // Fail before warn within the same check, tags intact
    assert!(result.recommendations[0].starts_with("【紧急】[ssh_security]"));
    assert!(result
        .recommendations
        .iter()
        .any(|line| line.starts_with("【警告】[ufw_security]")));
}

#[tokio::test]
async fn test_report_serializes_with_contract_field_names() {
    let runner = AuditRunner::with_registry(Config::default(), scripted_registry());
    let result = runner.run(CancellationToken::new()).await;

    let json = serde_json::to_value(&result).unwrap();
    for field in ["systemInfo", "securityChecks", "recommendations", "startTime", "endTime", "assets"] {
        assert!(json.get(field).is_some(), "missing field {field}");
    }

    let first = &json["securityChecks"][0];
    for field in ["category", "status", "message", "details"] {
        assert!(first.get(field).is_some(), "missing check field {field}");
    }
    assert_eq!(first["category"], "ssh_security");
    assert_eq!(first["status"], "fail");

    let detail = &first["details"][0];
    for field in ["name", "status", "message"] {
        assert!(detail.get(field).is_some(), "missing detail field {field}");
    }
    // Absent evidence is omitted, never null
    assert!(detail.get("evidence").is_none());
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCheck {
        category: Category,
        live: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Check for CountingCheck {
        fn category(&self) -> Category {
            self.category
        }

        async fn run(&self, _ctx: &CheckContext) -> CheckResult {
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(live, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.live.fetch_sub(1, Ordering::SeqCst);
            CheckResult::pass(self.category, "done")
        }
    }

    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let categories = [
        Category::NonRootUser,
        Category::UfwSecurity,
        Category::SshSecurity,
        Category::AccessControl,
        Category::PortSecurity,
        Category::Fail2ban,
    ];

    let mut registry = CheckRegistry::new();
    for category in categories {
        registry.register(Arc::new(CountingCheck {
            category,
            live: live.clone(),
            peak: peak.clone(),
        }));
    }

    let mut config = Config::default();
    config.audit.workers = 2;
    let runner = AuditRunner::with_registry(config, registry);
    let result = runner.run(CancellationToken::new()).await;

    assert_eq!(result.security_checks.len(), 6);
    assert!(
        peak.load(Ordering::SeqCst) <= 2,
        "worker pool exceeded its bound: peak {}",
        peak.load(Ordering::SeqCst)
    );
}

/// The full builtin suite must complete on any Linux host, downgrading
/// gracefully wherever tools or permissions are missing.
#[tokio::test]
async fn test_builtin_suite_always_seals_a_report() {
    let runner = AuditRunner::new(Config::default());
    let result = runner.run(CancellationToken::new()).await;

    assert_eq!(result.security_checks.len(), 18);
    assert!(result.end_time >= result.start_time);

    for check in &result.security_checks {
        if let Some(details) = &check.details {
            assert!(!details.is_empty());
            let worst = details.iter().map(|d| d.status).max().unwrap();
            assert_eq!(check.status, worst, "category {}", check.category);

            // Evidence well-formedness: at least one context field, and
            // hashes are 64 lowercase hex chars
            for detail in details {
                if let Some(evidence) = &detail.evidence {
                    let populated = evidence.file_path.is_some()
                        || evidence.file_hash.is_some()
                        || evidence.timestamp.is_some()
                        || evidence.network_conn.is_some()
                        || evidence.process_tree.is_some();
                    assert!(populated, "empty evidence in {}", check.category);
                    if let Some(hash) = &evidence.file_hash {
                        assert_eq!(hash.len(), 64);
                        assert!(hash
                            .chars()
                            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
                    }
                }
            }
        }
    }

    // The whole result must serialize
    serde_json::to_string(&result).unwrap();
}
