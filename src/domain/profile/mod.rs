//! ChargingProfile aggregate: typed model, codec, and validation (spec §4.A).

pub mod codec;
pub mod types;
pub mod validate;

pub use codec::{parse, serialize, serialize_schedule};
pub use types::{
    ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit,
    ChargingSchedule, ChargingSchedulePeriod, RecurrencyKind,
};
pub use validate::validate;
