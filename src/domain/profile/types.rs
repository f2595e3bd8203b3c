//! Typed representation of OCPP 1.6 Smart Charging profiles (spec §3.1).

use chrono::{DateTime, Utc};

/// Unit a `ChargingSchedule`'s limits are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingRateUnit {
    Watts,
    Amps,
}

impl ChargingRateUnit {
    pub fn wire_str(self) -> &'static str {
        match self {
            Self::Watts => "W",
            Self::Amps => "A",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "W" => Some(Self::Watts),
            "A" => Some(Self::Amps),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingProfilePurpose {
    ChargePointMax,
    TxDefault,
    Tx,
}

impl ChargingProfilePurpose {
    pub fn wire_str(self) -> &'static str {
        match self {
            Self::ChargePointMax => "ChargePointMaxProfile",
            Self::TxDefault => "TxDefaultProfile",
            Self::Tx => "TxProfile",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "ChargePointMaxProfile" => Some(Self::ChargePointMax),
            "TxDefaultProfile" => Some(Self::TxDefault),
            "TxProfile" => Some(Self::Tx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingProfileKind {
    Absolute,
    Recurring,
    Relative,
}

impl ChargingProfileKind {
    pub fn wire_str(self) -> &'static str {
        match self {
            Self::Absolute => "Absolute",
            Self::Recurring => "Recurring",
            Self::Relative => "Relative",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "Absolute" => Some(Self::Absolute),
            "Recurring" => Some(Self::Recurring),
            "Relative" => Some(Self::Relative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencyKind {
    Daily,
    Weekly,
}

impl RecurrencyKind {
    pub fn wire_str(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "Daily" => Some(Self::Daily),
            "Weekly" => Some(Self::Weekly),
            _ => None,
        }
    }
}

/// `(startPeriod, limit, numberPhases?)`. Immutable once part of a schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargingSchedulePeriod {
    pub start_period: u32,
    pub limit: f64,
    pub number_phases: Option<u8>,
}

/// An ordered, non-empty sequence of periods plus schedule-wide metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargingSchedule {
    pub rate_unit: ChargingRateUnit,
    pub periods: Vec<ChargingSchedulePeriod>,
    pub duration: Option<u32>,
    pub start_schedule: Option<DateTime<Utc>>,
    pub min_charging_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingProfile {
    pub id: u32,
    pub stack_level: u32,
    pub purpose: ChargingProfilePurpose,
    pub kind: ChargingProfileKind,
    pub schedule: ChargingSchedule,
    pub transaction_id: Option<i64>,
    pub recurrency_kind: Option<RecurrencyKind>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl ChargingProfile {
    /// The `(purpose, stackLevel)` pair the store uses for conflict detection.
    pub fn stack_key(&self) -> (ChargingProfilePurpose, u32) {
        (self.purpose, self.stack_level)
    }
}
