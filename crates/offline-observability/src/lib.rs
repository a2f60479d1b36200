//! Logging and metrics for the offline cache agent.
//!
//! This crate provides:
//! - `init_logging` - `tracing` subscriber setup (JSON or human output)
//! - `AgentMetrics` - Counters for cache hits, misses, stores and fallbacks

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
