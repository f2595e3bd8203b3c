//! Optional event sink for "profile accepted / limit applied" records (spec §6.3).
//! Not required for correctness — a no-op implementation is the default.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ProfileEvent {
    pub timestamp: DateTime<Utc>,
    pub station_id: String,
    pub kind: String,
    pub description: String,
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: ProfileEvent);
}

/// Default collaborator: discards every event.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn record(&self, _event: ProfileEvent) {}
}

/// Logs accepted profiles and applied limits at `info!` via `tracing`.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn record(&self, event: ProfileEvent) {
        tracing::info!(
            station_id = event.station_id.as_str(),
            kind = event.kind.as_str(),
            description = event.description.as_str(),
            "profile event"
        );
    }
}
