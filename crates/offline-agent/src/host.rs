//! Lifecycle signals sent to the hosting runtime.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

/// Host-side capability receiving the agent's lifecycle signals.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Make this instance eligible for activation without waiting for the
    /// previous one to release its pages.
    async fn skip_waiting(&self);

    /// Take control of every open page.
    async fn claim(&self);

    /// Open (or focus) a window at the given URL.
    async fn open_window(&self, url: &str);
}

/// A signal received by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    SkipWaiting,
    Claim,
    OpenWindow(String),
}

/// Host that only logs the signals it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHost;

#[async_trait]
impl ClientHost for LoggingHost {
    async fn skip_waiting(&self) {
        info!("host: skip waiting");
    }

    async fn claim(&self) {
        info!("host: claim clients");
    }

    async fn open_window(&self, url: &str) {
        info!(url, "host: open window");
    }
}

/// Host that records every signal in order.
#[derive(Debug, Default)]
pub struct RecordingHost {
    signals: Mutex<Vec<HostSignal>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals received so far.
    pub fn signals(&self) -> Vec<HostSignal> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, signal: HostSignal) {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal);
    }
}

#[async_trait]
impl ClientHost for RecordingHost {
    async fn skip_waiting(&self) {
        self.record(HostSignal::SkipWaiting);
    }

    async fn claim(&self) {
        self.record(HostSignal::Claim);
    }

    async fn open_window(&self, url: &str) {
        self.record(HostSignal::OpenWindow(url.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_host_keeps_order() {
        let host = RecordingHost::new();
        host.skip_waiting().await;
        host.claim().await;
        host.open_window("https://app.test/654/").await;

        assert_eq!(
            host.signals(),
            vec![
                HostSignal::SkipWaiting,
                HostSignal::Claim,
                HostSignal::OpenWindow("https://app.test/654/".into()),
            ]
        );
    }
}
