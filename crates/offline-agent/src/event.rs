//! Typed event dispatch.

use offline_core::RequestRecord;
use tracing::{debug, info, warn};

use crate::agent::{ActivationReport, CacheAgent, FetchDecision};
use crate::error::{InstallError, NetworkError};
use crate::message::{ControlMessage, ReplyPort, VersionReply};

/// An event delivered to the agent by its host.
#[derive(Debug)]
pub enum AgentEvent {
    Install,
    Activate,
    Fetch(RequestRecord),
    /// Control message with an optional reply port.
    Message(ControlMessage, Option<ReplyPort>),
    /// Background sync. No-op.
    Sync { tag: String },
    /// Push delivery. No-op.
    Push { data: Option<String> },
    NotificationClick { tag: Option<String> },
}

impl AgentEvent {
    /// Event name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
            Self::Message(..) => "message",
            Self::Sync { .. } => "sync",
            Self::Push { .. } => "push",
            Self::NotificationClick { .. } => "notificationclick",
        }
    }
}

/// Result of dispatching an event.
#[derive(Debug)]
pub enum EventOutcome {
    Installed,
    Activated(ActivationReport),
    Fetched(FetchDecision),
    Handled,
}

/// Error from a dispatched event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl CacheAgent {
    /// Dispatch an event to its handler, settling all of its work before
    /// returning.
    pub async fn dispatch(&self, event: AgentEvent) -> Result<EventOutcome, EventError> {
        debug!(event = event.name(), "dispatch");
        match event {
            AgentEvent::Install => {
                self.install().await?;
                Ok(EventOutcome::Installed)
            }
            AgentEvent::Activate => Ok(EventOutcome::Activated(self.activate().await)),
            AgentEvent::Fetch(request) => {
                Ok(EventOutcome::Fetched(self.handle_fetch(&request).await?))
            }
            AgentEvent::Message(message, reply) => {
                debug!(message = message.tag(), "control message");
                self.handle_message(message, reply).await;
                Ok(EventOutcome::Handled)
            }
            AgentEvent::Sync { tag } => {
                debug!(tag = %tag, "background sync ignored");
                Ok(EventOutcome::Handled)
            }
            AgentEvent::Push { data } => {
                debug!(has_data = data.is_some(), "push ignored");
                Ok(EventOutcome::Handled)
            }
            AgentEvent::NotificationClick { tag } => {
                info!(tag = tag.as_deref().unwrap_or(""), "notification closed");
                self.host().open_window(&self.config().root_url()).await;
                Ok(EventOutcome::Handled)
            }
        }
    }

    /// Handle a control message. Unknown messages are ignored.
    pub async fn handle_message(&self, message: ControlMessage, reply: Option<ReplyPort>) {
        match message {
            ControlMessage::SkipWaiting => {
                info!("skip waiting requested by page");
                self.skip_waiting().await;
            }
            ControlMessage::GetVersion => match reply {
                Some(port) => {
                    let reply = VersionReply {
                        version: self.version().to_string(),
                    };
                    if port.send(reply).is_err() {
                        debug!("version reply dropped; receiver gone");
                    }
                }
                None => warn!("GET_VERSION without reply port"),
            },
            ControlMessage::Unknown => {}
        }
    }
}
