//! Agent lifecycle tracking.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Lifecycle phases of an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentPhase {
    /// Pre-populating the versioned cache.
    Installing,
    /// Installed, waiting for the previous instance to release its pages.
    Waiting,
    /// Discarding stale caches.
    Activating,
    /// Controlling pages and serving fetches.
    Active,
    /// Install failed; this instance never becomes active.
    InstallFailed,
}

impl AgentPhase {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::InstallFailed)
    }
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Waiting => write!(f, "waiting"),
            Self::Activating => write!(f, "activating"),
            Self::Active => write!(f, "active"),
            Self::InstallFailed => write!(f, "install-failed"),
        }
    }
}

/// Error for transitions the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: AgentPhase, to: AgentPhase },
}

/// Timing context for lifecycle phases.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time from start to a named mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer trait for lifecycle events.
pub trait LifecycleObserver: Send + Sync {
    /// Called after every successful phase transition.
    fn on_phase(&self, phase: AgentPhase, elapsed: Duration);
}

/// Lifecycle state machine for one agent instance.
///
/// `Installing -> Waiting -> Activating -> Active`, with
/// `Installing -> InstallFailed` as the failure exit. Callers check
/// `can_activate` before leaving `Waiting`.
#[derive(Debug, Clone)]
pub struct LifecycleState {
    phase: AgentPhase,
    skip_waiting: bool,
    failure: Option<String>,
    timing: TimingContext,
}

impl LifecycleState {
    /// Start a new instance in `Installing`.
    pub fn new() -> Self {
        let mut timing = TimingContext::new();
        timing.mark(&AgentPhase::Installing.to_string());
        Self {
            phase: AgentPhase::Installing,
            skip_waiting: false,
            failure: None,
            timing,
        }
    }

    /// Resume an instance whose phase was recorded by the host.
    pub fn resume(phase: AgentPhase) -> Self {
        let mut state = Self::new();
        state.phase = phase;
        state.timing.mark(&phase.to_string());
        state
    }

    /// Current phase.
    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Whether skip-waiting has been requested.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    /// Reason for an install failure, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Timing marks, keyed by phase name.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    /// Request immediate activation once installed.
    pub fn request_skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    /// `Installing -> Waiting`.
    pub fn installed(&mut self) -> Result<AgentPhase, LifecycleError> {
        self.transition(AgentPhase::Waiting)
    }

    /// `Installing -> InstallFailed`.
    pub fn install_failed(&mut self, reason: impl Into<String>) -> Result<AgentPhase, LifecycleError> {
        self.transition(AgentPhase::InstallFailed)?;
        self.failure = Some(reason.into());
        Ok(self.phase)
    }

    /// Whether a waiting instance may move on to `Activating`.
    ///
    /// True once skip-waiting was requested or the previous instance has
    /// released all of its pages.
    pub fn can_activate(&self, clients_released: bool) -> bool {
        self.phase == AgentPhase::Waiting && (self.skip_waiting || clients_released)
    }

    /// `Waiting -> Activating`.
    pub fn begin_activation(&mut self) -> Result<AgentPhase, LifecycleError> {
        self.transition(AgentPhase::Activating)
    }

    /// `Activating -> Active`.
    pub fn activated(&mut self) -> Result<AgentPhase, LifecycleError> {
        self.transition(AgentPhase::Active)
    }

    fn transition(&mut self, to: AgentPhase) -> Result<AgentPhase, LifecycleError> {
        let allowed = matches!(
            (self.phase, to),
            (AgentPhase::Installing, AgentPhase::Waiting)
                | (AgentPhase::Installing, AgentPhase::InstallFailed)
                | (AgentPhase::Waiting, AgentPhase::Activating)
                | (AgentPhase::Activating, AgentPhase::Active)
        );

        if !allowed {
            return Err(LifecycleError::InvalidTransition {
                from: self.phase,
                to,
            });
        }

        self.phase = to;
        self.timing.mark(&to.to_string());
        Ok(to)
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}
