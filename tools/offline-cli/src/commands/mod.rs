//! CLI command implementations.

pub mod activate;
pub mod caches;
pub mod config;
pub mod fetch;
pub mod install;
pub mod message;

use clap::{Args, Subcommand};

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Stop after install; leave the new version waiting.
    #[arg(long)]
    pub no_activate: bool,
}

/// Arguments for the activate command.
#[derive(Args)]
pub struct ActivateArgs {
    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Treat the request as a top-level navigation.
    #[arg(short, long)]
    pub navigate: bool,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header (`name: value`), repeatable.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Simulate a network outage.
    #[arg(long)]
    pub offline: bool,

    /// Show response headers.
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the caches command.
#[derive(Args)]
pub struct CachesArgs {
    #[command(subcommand)]
    pub command: Option<CachesCommand>,
}

#[derive(Subcommand)]
pub enum CachesCommand {
    /// List all caches.
    List,
    /// Show entries of a cache.
    Show {
        /// Cache name (defaults to the current version).
        name: Option<String>,
    },
    /// Delete a cache.
    Delete {
        /// Cache name.
        name: String,
        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the message command.
#[derive(Args)]
pub struct MessageArgs {
    /// Message type, e.g. `GET_VERSION` or `SKIP_WAITING`.
    pub kind: String,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Origin the application is served from.
        #[arg(long, default_value = "http://localhost:8080")]
        origin: String,
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}
