//! Drives an agent instance through its lifecycle.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::info;

use crate::agent::{ActivationReport, CacheAgent};
use crate::error::InstallError;

/// Registration of one agent instance.
///
/// Each phase completes only once its async work has settled: install,
/// then wait, then activate.
#[derive(Debug)]
pub struct Registration {
    agent: Arc<CacheAgent>,
    previous_active: bool,
    released: Notify,
}

impl Registration {
    /// Register the first instance; it activates as soon as it installs.
    pub fn new(agent: Arc<CacheAgent>) -> Self {
        Self {
            agent,
            previous_active: false,
            released: Notify::new(),
        }
    }

    /// Register an instance replacing one that still controls pages.
    pub fn replacing(agent: Arc<CacheAgent>) -> Self {
        Self {
            previous_active: true,
            ..Self::new(agent)
        }
    }

    pub fn agent(&self) -> &Arc<CacheAgent> {
        &self.agent
    }

    /// Report that the previous instance no longer controls any page.
    pub fn release_previous(&self) {
        self.released.notify_one();
    }

    /// Install, wait until activation is allowed, then activate.
    ///
    /// A failed install ends the registration; no retry is attempted.
    pub async fn run(&self) -> Result<ActivationReport, InstallError> {
        self.agent.install().await?;

        if !self.agent.can_activate(!self.previous_active) {
            info!(version = %self.agent.version(), "waiting for previous instance");
            tokio::select! {
                _ = self.agent.wait_for_skip_waiting() => {
                    info!("skip waiting; activating now");
                }
                _ = self.released.notified() => {
                    info!("previous instance released its pages");
                }
            }
        }

        Ok(self.agent.activate().await)
    }
}
