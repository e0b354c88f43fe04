//! Asset collectors.
//!
//! Collectors produce inventory (logins, sockets, processes, cron jobs)
//! rather than pass/fail verdicts. They run concurrently with the security
//! checks, bounded by the same worker pool, and land in [`Assets`] on the
//! final report.

pub mod cron;
pub mod logins;
pub mod ports;
pub mod processes;

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::exec::CommandRunner;

pub use cron::CronEntry;
pub use logins::{LoginAssets, LoginRecord, LoginSession, LoginStatistics, LoginStatus};
pub use ports::ListeningPort;
pub use processes::ProcessInfo;

/// Structured inventory gathered during an audit run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assets {
    pub logins: LoginAssets,
    pub listening_ports: Vec<ListeningPort>,
    pub processes: Vec<ProcessInfo>,
    pub cron_jobs: Vec<CronEntry>,
}

/// Holds a pool permit for the duration of one collector, so collectors
/// and checks together never exceed the configured worker count.
async fn gated<T: Default>(pool: &Semaphore, collector: impl Future<Output = T>) -> T {
    match pool.acquire().await {
        Ok(_permit) => collector.await,
        Err(_) => T::default(),
    }
}

/// Runs every collector concurrently and merges the results.
///
/// Each collector occupies one slot of the shared worker pool while it
/// runs. Collector failures degrade to empty inventory; collection never
/// aborts the audit.
pub async fn collect_all(runner: &CommandRunner, pool: Arc<Semaphore>) -> Assets {
    let (logins, listening_ports, processes, cron_jobs) = tokio::join!(
        gated(&pool, logins::collect(runner)),
        gated(&pool, ports::collect(runner)),
        gated(&pool, processes::collect(runner)),
        gated(&pool, cron::collect(runner)),
    );

    Assets {
        logins,
        listening_ports,
        processes,
        cron_jobs,
    }
}
