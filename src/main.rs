//! Pipeline runner
//!
//! Usage: `dataflow-rs <pipeline.toml|pipeline.json> [run_ms]`
//!
//! Builds the pipeline described by the file using the built-in node kinds plus
//! a `collect` sink, runs it for `run_ms` milliseconds (default 1000), stops it
//! and reports what reached the sinks and any unwired output ports.

use anyhow::{bail, Context};
use dataflow_rs::config::PipelineConfig;
use dataflow_rs::pipeline::nodes::ChannelSink;
use dataflow_rs::pipeline::{Capacity, NodeRegistry, Pipeline, Status};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_RUN_MS: u64 = 1000;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dataflow_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: dataflow-rs <pipeline.toml|pipeline.json> [run_ms]");
    };
    let run_ms = match args.next() {
        Some(ms) => ms.parse::<u64>().context("run_ms must be a number of milliseconds")?,
        None => DEFAULT_RUN_MS,
    };

    let config = PipelineConfig::load(&path)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut registry = NodeRegistry::with_builtins();
    registry.register("collect", move |name| Box::new(ChannelSink::new(name, tx.clone())));
    tracing::debug!("Node kinds: {:?}", registry.kinds());

    let mut pipeline = Pipeline::from_config(&config, &registry)
        .with_context(|| format!("Failed to build pipeline from {}", path))?;

    // Drain every output port nobody consumes.
    let mut drains = Vec::new();
    while let Some(stream) = pipeline.create_output_stream(Capacity::Unbounded) {
        drains.push(stream);
    }

    tracing::info!("Running pipeline '{}' for {} ms", pipeline.name(), run_ms);
    pipeline.start()?;
    std::thread::sleep(Duration::from_millis(run_ms));
    pipeline.stop()?;

    let collected = rx.try_iter().count();
    let drained: usize = drains.iter().map(|s| s.len()).sum();
    tracing::info!(
        "Collected {} packets in sinks, {} on {} unwired outputs",
        collected,
        drained,
        drains.len()
    );

    let failed: Vec<_> = pipeline
        .last_run_results()
        .iter()
        .filter(|exit| exit.status != Status::Success)
        .collect();
    for exit in &failed {
        tracing::error!(
            "Node '{}' exited with {}: {}",
            exit.name,
            exit.status,
            exit.message.as_deref().unwrap_or("")
        );
    }
    if !failed.is_empty() {
        bail!("{} node(s) failed", failed.len());
    }

    println!("{}", collected + drained);
    Ok(())
}
