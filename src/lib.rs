//! # ocpp-fleet-sim
//!
//! OCPP 1.6-J EV charging station fleet simulator core: a Smart Charging
//! profile engine, a per-station session state machine, a pure charging
//! policy, and a supervisor that scales a simulated fleet against a CSMS.
//!
//! ## Layout
//!
//! - **support**: cross-cutting utilities (errors, shutdown, OCPP-J framing)
//! - **domain**: the charging profile model, store, schedule resolver, and
//!   policy engine — all pure, synchronous, and unit-testable in isolation
//! - **application**: async orchestration — the transport adapter, the
//!   per-station session runtime, and the fleet supervisor
//! - **config**: TOML-backed fleet and station-profile configuration

pub mod application;
pub mod config;
pub mod domain;
pub mod support;

pub use application::Supervisor;
pub use config::{default_config_path, FleetConfig};
