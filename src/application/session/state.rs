//! Per-station runtime state (spec §3.1 `StationSession`).

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::application::events::EventSink;
use crate::application::transport::StationTransport;
use crate::config::StationProfileConfig;
use crate::domain::store::ProfileStore;
use crate::support::shutdown::ShutdownSignal;

/// `Connecting -> Booted -> Available -> (InSession -> Available)* -> Closing`.
/// `Offline` may replace `Booted`/`Available` while the transport is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Booted,
    Available,
    InSession,
    Offline,
    Closing,
}

/// Fixed-capacity ring buffer for this station's recent log lines (cap 50).
#[derive(Debug, Default)]
pub struct LogRing {
    lines: VecDeque<String>,
}

const LOG_RING_CAPACITY: usize = 50;

impl LogRing {
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == LOG_RING_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

/// The currently open transaction on this station, if any.
#[derive(Debug, Clone, Copy)]
pub struct ActiveTransaction {
    pub transaction_id: i64,
    pub started_at: DateTime<Utc>,
    pub connector_id: u32,
}

/// Owned solely by its own session task (spec §5) — internal mutability is via
/// `tokio::sync::Mutex` purely so the struct can be shared as `Arc<StationSession>`
/// across the cooperative workers of the *same* task, never across tasks.
pub struct StationSession {
    pub station_id: String,
    pub owner_id: String,
    pub profile: StationProfileConfig,
    pub transport: Arc<StationTransport>,
    pub store: Mutex<ProfileStore>,
    pub log_ring: Mutex<LogRing>,
    pub current_tx: Mutex<Option<ActiveTransaction>>,
    pub phase: Mutex<SessionPhase>,
    pub shutdown: ShutdownSignal,
    pub event_sink: Arc<dyn EventSink>,
}

impl StationSession {
    pub async fn log(&self, line: impl Into<String>) {
        self.log_ring.lock().await.push(line);
    }

    pub async fn logs(&self) -> Vec<String> {
        self.log_ring.lock().await.snapshot()
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        *self.phase.lock().await = phase;
    }
}
