//! Control channel messages.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Inbound control message, tagged by its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Force activation of a waiting instance. No reply.
    SkipWaiting,
    /// Ask for the current cache version.
    GetVersion,
    /// Any other tag. Ignored.
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Parse a message payload. Anything unrecognized is `Unknown`.
    pub fn parse(data: &serde_json::Value) -> Self {
        serde_json::from_value(data.clone()).unwrap_or(Self::Unknown)
    }

    /// Wire tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SkipWaiting => "SKIP_WAITING",
            Self::GetVersion => "GET_VERSION",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Reply to `GET_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
}

/// Reply port supplied with a message.
pub type ReplyPort = oneshot::Sender<VersionReply>;
