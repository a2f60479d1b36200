//! Install the configured version into the cache store.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use offline_agent::{HostSignal, RecordingHost, Registration};
use serde::Serialize;

use super::activate::{print_report, ReportView};
use super::InstallArgs;
use crate::context::Context;
use crate::output::format_elapsed;

#[derive(Serialize)]
struct InstallSummary {
    version: String,
    assets: usize,
    elapsed_ms: u128,
    activation: Option<ReportView>,
}

/// Run the install command.
pub async fn run(args: InstallArgs, ctx: &Context) -> Result<()> {
    let agent_config = &ctx.config.agent;
    let assets = agent_config.manifest.unique_paths();

    ctx.output.header(&format!("Installing {}", agent_config.version));
    ctx.output.kv("Origin", &agent_config.origin);
    ctx.output.kv("Store", &ctx.store_dir().display().to_string());
    for (i, path) in assets.iter().enumerate() {
        ctx.output.step(i + 1, assets.len(), &agent_config.resolve(path));
    }

    let host = Arc::new(RecordingHost::new());
    let agent = Arc::new(ctx.agent(Arc::new(ctx.fetcher()?), host.clone()));
    let started = Instant::now();
    let spinner = ctx.output.spinner("Fetching assets...");

    let activation = if args.no_activate {
        let result = agent.install().await;
        spinner.finish_and_clear();
        result.context("Install failed")?;
        None
    } else {
        let result = Registration::new(agent.clone()).run().await;
        spinner.finish_and_clear();
        Some(result.context("Install failed")?)
    };
    let elapsed = started.elapsed();

    if host.signals().contains(&HostSignal::SkipWaiting) {
        ctx.output.debug("skip waiting signalled");
    }
    ctx.output.debug(&agent.metrics().snapshot().to_json());

    if ctx.output.is_json() {
        ctx.output.json(&InstallSummary {
            version: agent_config.version.to_string(),
            assets: assets.len(),
            elapsed_ms: elapsed.as_millis(),
            activation: activation.as_ref().map(ReportView::from),
        });
        return Ok(());
    }

    ctx.output.success(&format!(
        "Stored {} asset(s) in '{}' in {}",
        assets.len(),
        agent_config.version,
        format_elapsed(elapsed)
    ));

    match activation {
        Some(report) => print_report(&report, ctx),
        None => ctx
            .output
            .info("Run `offline activate` to discard older caches."),
    }

    Ok(())
}
