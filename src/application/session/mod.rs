//! Per-station session: runtime state, cooperative worker loop, and inbound handlers.

pub mod handlers;
pub mod machine;
pub mod state;

pub use machine::run;
pub use state::{ActiveTransaction, LogRing, SessionPhase, StationSession};
