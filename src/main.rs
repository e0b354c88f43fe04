//! Hostaudit - host-level security audit agent
//!
//! This is the main entry point for the Hostaudit CLI.

mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use cli::Cli;
use hostaudit::config::Config;
use hostaudit::report::CheckStatus;
use hostaudit::runner::AuditRunner;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbosity());

    let mut config = Config::load(cli.config.as_ref())
        .context("failed to load configuration")?;

    // CLI flags win over config files and environment
    if let Some(workers) = cli.workers {
        config.audit.workers = workers;
    }
    if let Some(timeout) = cli.timeout {
        config.audit.probe_timeout = Duration::from_secs(timeout);
    }
    if let Some(deadline) = cli.deadline {
        config.audit.deadline = Some(Duration::from_secs(deadline));
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, sealing partial audit");
            signal_token.cancel();
        }
    });

    let runner = AuditRunner::new(config);
    let result = runner.run(cancel).await;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };

    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?,
        None => println!("{json}"),
    }

    let worst = result
        .security_checks
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(CheckStatus::Pass);
    let exit_code = match worst {
        CheckStatus::Fail => 2,
        CheckStatus::Warn => 1,
        _ => 0,
    };
    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}
