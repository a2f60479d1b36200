//! Core types for the offline cache agent.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `RequestRecord` / `ResponseRecord` - Intercepted request and captured response
//! - `AgentConfig` - Cache version, origin and asset manifest
//! - `LifecycleState` - Installing / Waiting / Activating / Active tracking

mod config;
mod context;
mod lifecycle;
mod response;

pub use config::*;
pub use context::*;
pub use lifecycle::*;
pub use response::*;
