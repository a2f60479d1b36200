//! Send one request through the agent.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use offline_agent::{FetchDecision, NetworkFetcher, RecordingHost};
use offline_cache::CacheStatus;
use offline_core::{AgentPhase, Headers, Method, RequestMode, RequestRecord, ResponseType};
use serde::Serialize;

use super::FetchArgs;
use crate::context::{Context, OfflineFetcher};
use crate::output::{cache_badge, format_bytes, format_elapsed};

#[derive(Serialize)]
struct FetchView<'a> {
    url: &'a str,
    cache: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    bypass_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    response_type: Option<ResponseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<&'a Headers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    elapsed_ms: u128,
}

/// Run the fetch command.
pub async fn run(args: FetchArgs, ctx: &Context) -> Result<()> {
    let request = build_request(&args, ctx)?;

    let fetcher: Arc<dyn NetworkFetcher> = if args.offline {
        Arc::new(OfflineFetcher)
    } else {
        Arc::new(ctx.fetcher()?)
    };
    let agent = ctx
        .agent(fetcher, Arc::new(RecordingHost::new()))
        .with_phase(AgentPhase::Active);

    ctx.output.debug(&format!("{} {} ({})", request.method, request.url, request.mode));
    let started = Instant::now();
    let decision = agent
        .handle_fetch(&request)
        .await
        .with_context(|| format!("Fetch failed: {}", request.url))?;
    let elapsed = started.elapsed();

    match decision {
        FetchDecision::PassThrough(reason) => {
            if ctx.output.is_json() {
                ctx.output.json(&FetchView {
                    url: &request.url,
                    cache: CacheStatus::Bypass,
                    bypass_reason: Some(reason.to_string()),
                    status: None,
                    response_type: None,
                    headers: None,
                    body: None,
                    elapsed_ms: elapsed.as_millis(),
                });
            } else {
                ctx.output.info(&format!(
                    "{} not intercepted ({}); the host fetches it directly",
                    cache_badge(CacheStatus::Bypass),
                    reason
                ));
            }
        }
        FetchDecision::Respond { response, status } => {
            if ctx.output.is_json() {
                ctx.output.json(&FetchView {
                    url: &request.url,
                    cache: status,
                    bypass_reason: None,
                    status: Some(response.status),
                    response_type: Some(response.response_type),
                    headers: Some(&response.headers),
                    body: Some(response.text().into_owned()),
                    elapsed_ms: elapsed.as_millis(),
                });
                return Ok(());
            }

            ctx.output.info(&format!(
                "{} {} {}",
                cache_badge(status),
                response.status,
                response.reason().unwrap_or("")
            ));
            ctx.output.kv("Type", &response.response_type.to_string());
            ctx.output.kv("Size", &format_bytes(response.bytes().len() as u64));
            ctx.output.kv("Time", &format_elapsed(elapsed));
            if args.include {
                for (name, value) in &response.headers {
                    ctx.output.kv(name, value);
                }
            }
            println!("{}", response.text());
        }
    }

    ctx.output.debug(&agent.metrics().snapshot().to_json());
    Ok(())
}

fn build_request(args: &FetchArgs, ctx: &Context) -> Result<RequestRecord> {
    let method: Method = args.method.parse()?;
    let url = if args.url.starts_with('/') {
        ctx.config.agent.resolve(&args.url)
    } else {
        args.url.clone()
    };

    let mut request = RequestRecord::new(method, url);
    if args.navigate {
        request = request.with_mode(RequestMode::Navigate);
    }
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Invalid header '{}', expected 'name: value'", header))?;
        request = request.with_header(name.trim(), value.trim());
    }

    Ok(request)
}
