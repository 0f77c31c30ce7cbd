// src/main.rs
mod config;
mod device;
mod errors;
mod harness;
mod scheduler;
mod timing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::device::CharDevice;
use crate::errors::ProbeError;
use crate::harness::Harness;

fn main() -> Result<()> {
    // -------- logging ----------
    // stderr only: stdout carries the task report lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("preempt_probe=info".parse()?)
                .add_directive("probe_types=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    // -------- config ----------
    let cfg = match config::Cli::parse_and_build_config() {
        Ok(cfg) => cfg,
        Err(e @ ProbeError::InvalidInvocation { .. }) => {
            // reported, nothing launched, still a success exit
            println!("{e}");
            return Ok(());
        }
        Err(e) => return Err(e).context("invalid configuration"),
    };
    info!(?cfg, "preemption probe starting");

    // -------- run ----------
    let harness = Harness::new(cfg.harness.clone(), Arc::new(CharDevice));
    let reports = harness.run(cfg.mode).context("harness run failed")?;

    if cfg.json {
        for r in &reports {
            println!("{}", serde_json::to_string(r)?);
        }
    }

    let failed = reports.iter().filter(|r| !r.result.is_success()).count();
    if failed > 0 {
        warn!(failed, total = reports.len(), "some tasks reported failures");
        if cfg.strict_exit {
            std::process::exit(1);
        }
    }
    Ok(())
}
