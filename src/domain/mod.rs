//! Domain layer: Smart Charging profile model, store, resolver, and policy engine.

pub mod policy;
pub mod profile;
pub mod resolver;
pub mod store;

pub use policy::{evaluate, evaluate_meter_value_decision, Action, Decision, Env, MeterDecision, MeterValueDecision, ProfileConfig, StationState};
pub use profile::{ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod, RecurrencyKind};
pub use resolver::{composite_schedule, current_limit, TransactionContext};
pub use store::{ClearFilter, ProfileStore};
