//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { origin, force } => init_config(&origin, force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let agent = &ctx.config.agent;
    ctx.output.info("");
    ctx.output.info("[agent]");
    ctx.output.kv("version", agent.version.as_str());
    ctx.output.kv("origin", &agent.origin);
    ctx.output.kv("root_path", &agent.root_path);
    ctx.output.kv("excluded_schemes", &agent.excluded_schemes.join(", "));
    ctx.output
        .kv("skip_waiting_on_install", &agent.skip_waiting_on_install.to_string());
    ctx.output.kv("manifest", "");
    for path in agent.manifest.paths() {
        ctx.output.list_item(path);
    }

    ctx.output.info("");
    ctx.output.info("[store]");
    ctx.output.kv("dir", &ctx.store_dir().display().to_string());

    ctx.output.info("");
    ctx.output.info("[network]");
    ctx.output
        .kv("timeout_secs", &ctx.config.network.timeout_secs.to_string());
    ctx.output.kv(
        "connect_timeout_secs",
        &ctx.config.network.connect_timeout_secs.to_string(),
    );

    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", &ctx.config.logging.level.to_string());
    ctx.output.kv("filter", &ctx.config.logging.filter_directives());

    Ok(())
}

async fn init_config(origin: &str, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let content = generate_default_config(origin);
    let parsed: crate::config::CliConfig = toml::from_str(&content)?;
    parsed.agent.validate()?;

    fs::write(&config_path, content)?;
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let agent = &ctx.config.agent;
    agent.validate()?;

    let mut warnings: Vec<String> = Vec::new();

    if agent.manifest.is_empty() {
        warnings.push("agent.manifest is empty; install stores nothing".to_string());
    }
    if agent.manifest.unique_paths().len() != agent.manifest.len() {
        warnings.push("agent.manifest lists duplicate paths".to_string());
    }
    if !agent
        .manifest
        .paths()
        .iter()
        .any(|p| *p == agent.root_path)
    {
        warnings.push(format!(
            "agent.root_path '{}' is not in the manifest; offline navigations have no fallback",
            agent.root_path
        ));
    }
    if ctx.config.network.connect_timeout_secs > ctx.config.network.timeout_secs {
        warnings.push("network.connect_timeout_secs exceeds network.timeout_secs".to_string());
    }

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }
    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}
