//! Crate-wide error kinds (see spec §7 for the source-of-truth table).

use thiserror::Error;

/// Errors from parsing/validating a `ChargingProfile` (component A).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid enum at {path}: {value}")]
    InvalidEnum { path: String, value: String },

    #[error("invalid shape at {path}: {reason}")]
    InvalidShape { path: String, reason: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Errors from `ProfileStore` operations (component B).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("profile conflicts with an existing (purpose, stackLevel) pair on this connector")]
    ConflictingStack,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Errors surfaced by the transport adapter (component G).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("call timed out waiting for response")]
    CallTimeout,

    #[error("transport closed")]
    TransportClosed,

    #[error("CallError {code}: {description}")]
    CallError { code: String, description: String },
}

/// Errors surfaced by the supervisor (component F).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("station {station_id} is not owned by {caller}")]
    NotOwned { station_id: String, caller: String },

    #[error("station {0} is not running")]
    NotRunning(String),

    #[error("unknown profile name: {0}")]
    UnknownProfileName(String),
}

/// Umbrella error for call sites that need to bubble up any of the above.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
