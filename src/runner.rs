//! Audit orchestrator.
//!
//! Fans the registered checks out over a bounded worker pool, runs the
//! asset collectors and the system info probe alongside them, and seals
//! everything into one [`AuditResult`]. The report's check order is the
//! registry's declaration order no matter which check finishes first.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checks::{CheckContext, CheckRegistry};
use crate::collectors;
use crate::config::Config;
use crate::exec::CommandRunner;
use crate::geoip::GeoIpResolver;
use crate::recommend;
use crate::report::{AuditResult, CheckResult};
use crate::sysinfo;

/// Runs audits against the local host.
pub struct AuditRunner {
    config: Arc<Config>,
    registry: CheckRegistry,
    geoip: Arc<GeoIpResolver>,
}

impl AuditRunner {
    /// Runner with the built-in check set.
    pub fn new(config: Config) -> Self {
        let geoip = Arc::new(GeoIpResolver::from_config(&config.geoip));
        Self {
            config: Arc::new(config),
            registry: CheckRegistry::with_builtins(),
            geoip,
        }
    }

    /// Runner with a caller-supplied registry (tests, partial audits).
    pub fn with_registry(config: Config, registry: CheckRegistry) -> Self {
        let geoip = Arc::new(GeoIpResolver::from_config(&config.geoip));
        Self {
            config: Arc::new(config),
            registry,
            geoip,
        }
    }

    /// Executes one audit run.
    ///
    /// Cancelling `cancel` (or hitting the configured deadline) turns
    /// every not-yet-finished check into `skip`/`cancelled`; whatever
    /// already completed stays in the report. The returned result is
    /// sealed: timing stamped, recommendations attached.
    pub async fn run(&self, cancel: CancellationToken) -> AuditResult {
        let start_time = Utc::now().timestamp_millis();
        info!(checks = self.registry.len(), "audit started");

        // The run token is a child so a configured deadline never
        // cancels the caller's token.
        let run_token = cancel.child_token();
        if let Some(deadline) = self.config.audit.deadline {
            let deadline_token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                deadline_token.cancel();
            });
        }

        let runner = CommandRunner::new(self.config.audit.probe_timeout, run_token.clone());
        let ctx = CheckContext::new(
            self.config.clone(),
            runner.clone(),
            self.geoip.clone(),
            run_token.clone(),
        );

        let workers = self.config.audit.effective_workers();
        let semaphore = Arc::new(Semaphore::new(workers));

        let mut handles = Vec::with_capacity(self.registry.len());
        for check in self.registry.checks() {
            let check = check.clone();
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            let token = run_token.clone();
            let category = check.category();

            handles.push((
                category,
                tokio::spawn(async move {
                    // Biased polling so an already-cancelled run always
                    // yields skip, even for checks that complete on
                    // their first poll.
                    let _permit = tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            return CheckResult::skip(category, "cancelled");
                        }
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return CheckResult::skip(category, "cancelled"),
                        },
                    };

                    debug!(category = %category, "check started");
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => CheckResult::skip(category, "cancelled"),
                        result = check.run(&ctx) => {
                            debug!(category = %category, status = %result.status, "check finished");
                            result
                        }
                    }
                }),
            ));
        }

        // Collectors and the system info probe run alongside the checks,
        // drawing slots from the same pool so total probe concurrency
        // stays within the configured worker count.
        let (system_info, assets) = tokio::join!(
            async {
                match semaphore.clone().acquire_owned().await {
                    Ok(_permit) => sysinfo::collect(&runner, &self.config.sysinfo).await,
                    Err(_) => crate::report::SystemInfo::default(),
                }
            },
            collectors::collect_all(&runner, semaphore.clone()),
        );

        let mut security_checks = Vec::with_capacity(handles.len());
        for (category, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(category = %category, error = %e, "check task aborted");
                    CheckResult::skip(category, "cancelled")
                }
            };
            security_checks.push(result);
        }

        let recommendations = recommend::build(&security_checks);
        let end_time = Utc::now().timestamp_millis();
        info!(
            duration_ms = end_time - start_time,
            recommendations = recommendations.len(),
            "audit finished"
        );

        AuditResult {
            system_info,
            security_checks,
            assets,
            recommendations,
            start_time,
            end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{Category, Check};
    use crate::report::CheckStatus;
    use async_trait::async_trait;

    struct StaticCheck {
        category: Category,
        status: CheckStatus,
    }

    #[async_trait]
    impl Check for StaticCheck {
        fn category(&self) -> Category {
            self.category
        }

        async fn run(&self, _ctx: &CheckContext) -> CheckResult {
            CheckResult::new(self.category, self.status, "static")
        }
    }

    fn registry_of(entries: &[(Category, CheckStatus)]) -> CheckRegistry {
        let mut registry = CheckRegistry::new();
        for (category, status) in entries {
            registry.register(Arc::new(StaticCheck {
                category: *category,
                status: *status,
            }));
        }
        registry
    }

    #[tokio::test]
    async fn test_report_preserves_registry_order() {
        let registry = registry_of(&[
            (Category::UfwSecurity, CheckStatus::Pass),
            (Category::SshSecurity, CheckStatus::Fail),
            (Category::Fail2ban, CheckStatus::Skip),
        ]);
        let runner = AuditRunner::with_registry(Config::default(), registry);
        let result = runner.run(CancellationToken::new()).await;

        let categories: Vec<_> = result.security_checks.iter().map(|c| c.category).collect();
        assert_eq!(
            categories,
            vec![Category::UfwSecurity, Category::SshSecurity, Category::Fail2ban]
        );
    }

    #[tokio::test]
    async fn test_time_monotonicity() {
        let runner = AuditRunner::with_registry(Config::default(), CheckRegistry::new());
        let result = runner.run(CancellationToken::new()).await;
        assert!(result.end_time >= result.start_time);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_checks() {
        let registry = registry_of(&[
            (Category::UfwSecurity, CheckStatus::Pass),
            (Category::SshSecurity, CheckStatus::Pass),
        ]);
        let runner = AuditRunner::with_registry(Config::default(), registry);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = runner.run(cancel).await;

        assert_eq!(result.security_checks.len(), 2);
        for check in &result.security_checks {
            assert_eq!(check.status, CheckStatus::Skip);
            assert_eq!(check.message, "cancelled");
        }
        assert!(result.end_time >= result.start_time);
    }
}
