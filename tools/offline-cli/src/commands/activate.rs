//! Activate the installed version, discarding stale caches.

use std::sync::Arc;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use offline_agent::{ActivationReport, RecordingHost};
use offline_cache::CacheStore;
use offline_core::AgentPhase;
use serde::Serialize;

use super::ActivateArgs;
use crate::context::{Context, OfflineFetcher};

/// Run the activate command.
pub async fn run(args: ActivateArgs, ctx: &Context) -> Result<()> {
    let version = ctx.config.agent.version.to_string();
    let store = ctx.store();

    if !store.has(&version).await? {
        bail!(
            "Version '{}' is not installed. Run `offline install` first.",
            version
        );
    }

    let stale: Vec<String> = store
        .keys()
        .await?
        .into_iter()
        .filter(|name| *name != version)
        .collect();

    ctx.output.header(&format!("Activating {}", version));
    if stale.is_empty() {
        ctx.output.info("No stale caches.");
    } else {
        for name in &stale {
            ctx.output.list_item(name);
        }

        if !args.yes && !ctx.output.is_json() {
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete {} stale cache(s)?", stale.len()))
                .default(true)
                .interact()?;

            if !confirmed {
                ctx.output.warn("Cancelled");
                return Ok(());
            }
        }
    }

    let host = Arc::new(RecordingHost::new());
    let agent = ctx
        .agent(Arc::new(OfflineFetcher), host)
        .with_phase(AgentPhase::Waiting);
    let report = agent.activate().await;

    print_report(&report, ctx);
    Ok(())
}

/// Serializable view of an activation report.
#[derive(Serialize)]
pub struct ReportView {
    version: String,
    deleted: Vec<String>,
    failures: Vec<String>,
    listing_error: Option<String>,
    skipped: bool,
}

impl From<&ActivationReport> for ReportView {
    fn from(report: &ActivationReport) -> Self {
        Self {
            version: report.version.clone(),
            deleted: report.deleted.clone(),
            failures: report.failures.iter().map(|f| f.to_string()).collect(),
            listing_error: report.listing_error.clone(),
            skipped: report.skipped,
        }
    }
}

/// Print an activation report.
pub fn print_report(report: &ActivationReport, ctx: &Context) {
    if ctx.output.is_json() {
        ctx.output.json(&ReportView::from(report));
        return;
    }

    if report.skipped {
        ctx.output.warn(&format!(
            "Version '{}' was not activated; existing caches kept",
            report.version
        ));
        return;
    }

    for name in &report.deleted {
        ctx.output.debug(&format!("deleted {}", name));
    }
    for failure in &report.failures {
        ctx.output.warn(&failure.to_string());
    }
    if let Some(err) = &report.listing_error {
        ctx.output.warn(&format!("Could not list caches: {}", err));
    }

    ctx.output.success(&format!(
        "Version '{}' active ({} stale cache(s) deleted)",
        report.version,
        report.deleted.len()
    ));
}
