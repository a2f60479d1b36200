//! Cache inspection commands.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use dialoguer::Confirm;
use offline_cache::{CacheStore, FsCacheStore, StoredEntry};
use serde::Serialize;

use super::{CachesArgs, CachesCommand};
use crate::context::Context;
use crate::output::{format_bytes, version_badge};

/// Run the caches command.
pub async fn run(args: CachesArgs, ctx: &Context) -> Result<()> {
    match args.command {
        Some(CachesCommand::List) | None => list_caches(ctx).await,
        Some(CachesCommand::Show { name }) => {
            let name = name.unwrap_or_else(|| ctx.config.agent.version.to_string());
            show_cache(&name, ctx).await
        }
        Some(CachesCommand::Delete { name, yes }) => delete_cache(&name, yes, ctx).await,
    }
}

#[derive(Serialize)]
struct CacheInfo {
    name: String,
    entries: usize,
    bytes: u64,
    current: bool,
}

async fn list_caches(ctx: &Context) -> Result<()> {
    let store = ctx.store();
    let names = store.keys().await?;

    if names.is_empty() {
        if ctx.output.is_json() {
            ctx.output.json(&Vec::<CacheInfo>::new());
        } else {
            ctx.output.info("No caches found.");
            ctx.output.info("Run `offline install` to populate the current version.");
        }
        return Ok(());
    }

    let progress = ctx.output.progress(names.len() as u64, "Reading caches");
    let mut caches = Vec::with_capacity(names.len());
    for name in names {
        let entries = read_entries(&store, &name).await?;
        caches.push(CacheInfo {
            current: name == ctx.config.agent.version.as_str(),
            entries: entries.len(),
            bytes: entries.iter().map(|e| e.response.body.len() as u64).sum(),
            name,
        });
        progress.inc(1);
    }
    progress.finish_and_clear();

    if ctx.output.is_json() {
        ctx.output.json(&caches);
        return Ok(());
    }

    ctx.output.header(&format!("Caches in {}", ctx.store_dir().display()));
    let table = ctx
        .output
        .table(&[("NAME", 32), ("ENTRIES", 8), ("SIZE", 10), ("STATUS", 10)]);
    for cache in &caches {
        table.row(&[
            &cache.name,
            &cache.entries.to_string(),
            &format_bytes(cache.bytes),
            &version_badge(cache.current),
        ]);
    }

    let stale = caches.iter().filter(|c| !c.current).count();
    if stale > 0 {
        ctx.output.info("");
        ctx.output.info(&format!(
            "{} stale cache(s); run `offline activate` to delete them.",
            stale
        ));
    }

    Ok(())
}

async fn show_cache(name: &str, ctx: &Context) -> Result<()> {
    let store = ctx.store();
    if !store.has(name).await? {
        bail!("Cache '{}' not found", name);
    }
    let entries = read_entries(&store, name).await?;

    if ctx.output.is_json() {
        ctx.output.json(&entries);
        return Ok(());
    }

    ctx.output.header(&format!("Cache: {}", name));
    if entries.is_empty() {
        ctx.output.info("Cache is empty.");
        return Ok(());
    }

    let table = ctx.output.table(&[
        ("METHOD", 6),
        ("URL", 48),
        ("STATUS", 6),
        ("SIZE", 10),
        ("STORED", 24),
    ]);
    for entry in &entries {
        table.row(&[
            entry.key.method.as_str(),
            &entry.key.url,
            &entry.response.status.to_string(),
            &format_bytes(entry.response.body.len() as u64),
            &format_timestamp(&entry.stored_at),
        ]);
    }

    ctx.output.info("");
    ctx.output.info(&format!("Total: {} entr(ies)", entries.len()));
    Ok(())
}

async fn delete_cache(name: &str, yes: bool, ctx: &Context) -> Result<()> {
    let store = ctx.store();
    if !store.has(name).await? {
        bail!("Cache '{}' not found", name);
    }

    if name == ctx.config.agent.version.as_str() {
        ctx.output.warn(&format!(
            "'{}' is the current version; run `offline install` to restore it.",
            name
        ));
    }

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete cache '{}'?", name))
            .default(false)
            .interact()?;

        if !confirmed {
            ctx.output.warn("Cancelled");
            return Ok(());
        }
    }

    store.delete(name).await?;
    ctx.output.success(&format!("Deleted cache '{}'", name));
    Ok(())
}

async fn read_entries(store: &FsCacheStore, name: &str) -> Result<Vec<StoredEntry>> {
    match store.get(name).await? {
        Some(cache) => Ok(cache.entries().await?),
        None => Ok(Vec::new()),
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
