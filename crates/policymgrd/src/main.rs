//! Policy Manager Daemon Entry Point

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sonic_policymgrd::{PolicyMgr, PolicyMgrConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// SONiC route-policy manager
#[derive(Parser, Debug)]
#[command(name = "policymgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Policy configuration file (.json, .yaml or .yml)
    #[arg(short = 'c', long, default_value = "/etc/sonic/policy_cfg.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Print live statements, policies and routes as JSON
    #[arg(long)]
    dump: bool,

    /// Stay resident until interrupted
    #[arg(long)]
    daemon: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting policymgrd");
    info!("Loading policy config: {}", args.config.display());

    let config = PolicyMgrConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let (mgr, report) = PolicyMgr::from_config(&config);
    for failure in &report.failures {
        error!(
            "{} {} {}: {}",
            failure.op, failure.table, failure.name, failure.error
        );
    }
    info!(
        "Applied {} of {} definitions ({} routes)",
        report.succeeded,
        config.definition_count(),
        mgr.routes().len()
    );

    if args.dump {
        let dump = serde_json::to_string_pretty(&mgr.dump()).context("failed to encode dump")?;
        println!("{}", dump);
    }

    if args.daemon {
        info!("policymgrd running, press Ctrl-C to exit");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("Shutting down policymgrd");
    }

    Ok(())
}
