//! Offline CLI - Command line tool for the offline cache agent.
//!
//! Commands:
//! - `offline install` - Fetch the manifest into the current version's cache
//! - `offline activate` - Delete caches from other versions
//! - `offline fetch` - Send a request through the agent
//! - `offline caches` - List, inspect and delete caches
//! - `offline message` - Send a control message
//! - `offline config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use offline_observability::{init_logging, LogFormat, LogLevel};

use commands::{ActivateArgs, CachesArgs, ConfigArgs, FetchArgs, InstallArgs, MessageArgs};

/// Offline CLI - Install, activate and inspect versioned offline caches
#[derive(Parser)]
#[command(name = "offline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the configured version
    Install(InstallArgs),

    /// Activate the installed version
    Activate(ActivateArgs),

    /// Send a request through the agent
    Fetch(FetchArgs),

    /// Manage stored caches
    Caches(CachesArgs),

    /// Send a control message (GET_VERSION, SKIP_WAITING)
    Message(MessageArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose > 0, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = match context::Context::load(config_path, output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let mut logging = ctx.config.logging.clone();
    if cli.verbose > 0 {
        logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    if cli.json {
        logging.format = LogFormat::Json;
    }
    if let Err(e) = init_logging(&logging) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }

    let result = match cli.command {
        Commands::Install(args) => commands::install::run(args, &ctx).await,
        Commands::Activate(args) => commands::activate::run(args, &ctx).await,
        Commands::Fetch(args) => commands::fetch::run(args, &ctx).await,
        Commands::Caches(args) => commands::caches::run(args, &ctx).await,
        Commands::Message(args) => commands::message::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
