//! Cache-first request interception and versioned cache lifecycle.
//!
//! This crate provides:
//! - `CacheAgent` - Install / activate / fetch / message handling
//! - `Registration` - Drives an agent through its lifecycle with wait-until semantics
//! - `NetworkFetcher` / `ReqwestFetcher` - Network retrieval capability
//! - `ClientHost` - Lifecycle signals to the hosting runtime
//! - `ControlMessage` - `SKIP_WAITING` / `GET_VERSION` control channel
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use offline_agent::{CacheAgent, FetchDecision, ReqwestFetcher};
//! use offline_cache::MemoryCacheStore;
//! use offline_core::{AgentConfig, RequestRecord};
//!
//! let config = AgentConfig::new("https://app.example");
//! let fetcher = ReqwestFetcher::new(&config)?;
//! let agent = CacheAgent::new(config, Arc::new(MemoryCacheStore::new()), Arc::new(fetcher));
//!
//! agent.install().await?;
//! agent.activate().await;
//!
//! match agent.handle_fetch(&RequestRecord::navigate("https://app.example/654/")).await? {
//!     FetchDecision::Respond { response, .. } => println!("{}", response.text()),
//!     FetchDecision::PassThrough(_) => {}
//! }
//! ```

mod agent;
mod error;
mod event;
mod fetcher;
mod host;
mod message;
mod registration;

pub use agent::*;
pub use error::*;
pub use event::*;
pub use fetcher::*;
pub use host::*;
pub use message::*;
pub use registration::*;
