//! Send a control message to the agent.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use offline_agent::{AgentEvent, ControlMessage, HostSignal, RecordingHost};
use tokio::sync::oneshot;

use super::MessageArgs;
use crate::context::{Context, OfflineFetcher};

/// Run the message command.
pub async fn run(args: MessageArgs, ctx: &Context) -> Result<()> {
    let data = serde_json::json!({ "type": args.kind.to_ascii_uppercase() });
    let message = ControlMessage::parse(&data);

    let host = Arc::new(RecordingHost::new());
    let agent = ctx.agent(Arc::new(OfflineFetcher), host.clone());
    let (tx, rx) = oneshot::channel();

    agent
        .dispatch(AgentEvent::Message(message, Some(tx)))
        .await?;

    match message {
        ControlMessage::GetVersion => {
            let reply = rx.await.context("Agent sent no version reply")?;
            if ctx.output.is_json() {
                ctx.output.json(&reply);
            } else {
                ctx.output.success(&format!("Version: {}", reply.version));
            }
        }
        ControlMessage::SkipWaiting => {
            let signalled = host.signals().contains(&HostSignal::SkipWaiting);
            if ctx.output.is_json() {
                ctx.output.json(&serde_json::json!({ "skip_waiting": signalled }));
            } else if signalled {
                ctx.output.success("Skip waiting requested");
                ctx.output
                    .info("Run `offline activate` to activate the waiting version.");
            }
        }
        ControlMessage::Unknown => {
            ctx.output
                .warn(&format!("Unknown message type '{}' ignored", args.kind));
        }
    }

    Ok(())
}
