//! Login history check: brute-force pressure and logins from unexpected
//! locations.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use indexmap::IndexMap;

use super::{Category, Check, CheckContext};
use crate::collectors::logins::{self, LoginAssets};
use crate::evidence::EvidenceBuilder;
use crate::geoip::PRIVATE_IP_LABEL;
use crate::report::{CheckDetail, CheckResult, CheckStatus, RiskLevel};

/// Failed attempts from one address inside the window before it is
/// called out.
const FAILED_LOGIN_THRESHOLD: usize = 50;

/// Evaluates collected login assets against the brute-force and
/// location policies.
pub struct LoginHistoryCheck;

/// Policy evaluation over collected records. The GeoIP lookup is taken
/// as a closure so fixtures can stand in for the database.
fn evaluate_login_history(
    assets: &LoginAssets,
    now: DateTime<Utc>,
    allowed_regions: &[String],
    lookup: &dyn Fn(&str) -> String,
) -> Vec<CheckDetail> {
    let mut details = Vec::new();
    let window_start = (now - ChronoDuration::hours(24)).timestamp_millis();

    // Brute-force pressure: failed attempts per source in the last 24h
    let mut failures_by_ip: IndexMap<&str, usize> = IndexMap::new();
    for record in &assets.failed_logins {
        if record.timestamp >= window_start {
            *failures_by_ip.entry(record.ip.as_str()).or_insert(0) += 1;
        }
    }
    for (ip, count) in &failures_by_ip {
        if *count > FAILED_LOGIN_THRESHOLD {
            details.push(
                CheckDetail::new(
                    format!("brute_force_{ip}"),
                    CheckStatus::Warn,
                    format!("{count} failed logins from {ip} in the last 24h"),
                )
                .with_evidence(
                    EvidenceBuilder::new(RiskLevel::High)
                        .network_conn(format!("{ip} x{count}"))
                        .build(),
                ),
            );
        }
    }

    // Location policy: successful logins must resolve inside the
    // allow-list. An empty allow-list disables the rule.
    if !allowed_regions.is_empty() {
        let mut seen: IndexMap<&str, &str> = IndexMap::new();
        for record in &assets.successful_logins {
            if record.ip == "localhost" || seen.contains_key(record.ip.as_str()) {
                continue;
            }
            seen.insert(record.ip.as_str(), record.username.as_str());
        }
        for (ip, username) in seen {
            let location = lookup(ip);
            if location.is_empty() || location == PRIVATE_IP_LABEL {
                continue;
            }
            let allowed = allowed_regions
                .iter()
                .any(|region| location.contains(region.as_str()));
            if !allowed {
                details.push(
                    CheckDetail::new(
                        format!("foreign_login_{ip}"),
                        CheckStatus::Fail,
                        format!("successful login for '{username}' from {ip} ({location}) outside the allowed regions"),
                    )
                    .with_evidence(
                        EvidenceBuilder::new(RiskLevel::High)
                            .network_conn(format!("{ip} {location}"))
                            .build(),
                    ),
                );
            }
        }
    }

    if details.is_empty() {
        details.push(CheckDetail::new(
            "login_review",
            CheckStatus::Pass,
            format!(
                "{} successful and {} failed logins reviewed, no anomaly",
                assets.successful_logins.len(),
                assets.failed_logins.len()
            ),
        ));
    }

    details
}

#[async_trait]
impl Check for LoginHistoryCheck {
    fn category(&self) -> Category {
        Category::LoginHistory
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let assets = logins::collect(&ctx.runner).await;
        if ctx.cancel.is_cancelled() {
            return CheckResult::skip(self.category(), "cancelled");
        }
        if assets.successful_logins.is_empty() && assets.failed_logins.is_empty() {
            return CheckResult::skip(self.category(), "no login records available");
        }

        let geoip = ctx.geoip.clone();
        let details = evaluate_login_history(
            &assets,
            Utc::now(),
            &ctx.config.geoip.allowed_login_regions,
            &move |ip| geoip.lookup(ip),
        );
        CheckResult::from_details(self.category(), "login history review", details)
    }
}
