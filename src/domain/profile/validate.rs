//! Invariant checks for a parsed `ChargingProfile` (spec §3.1, §4.A).

use crate::support::errors::ProfileError;

use super::types::{ChargingProfile, ChargingProfileKind, ChargingProfilePurpose};

pub fn validate(profile: &ChargingProfile) -> Result<(), ProfileError> {
    if profile.purpose == ChargingProfilePurpose::Tx && profile.transaction_id.is_none() {
        return Err(ProfileError::InvariantViolation(
            "purpose=Tx requires transactionId".to_string(),
        ));
    }

    match profile.kind {
        ChargingProfileKind::Recurring => {
            if profile.recurrency_kind.is_none() {
                return Err(ProfileError::InvariantViolation(
                    "kind=Recurring requires recurrencyKind".to_string(),
                ));
            }
            if profile.schedule.start_schedule.is_none() {
                return Err(ProfileError::InvariantViolation(
                    "kind=Recurring requires schedule.startSchedule".to_string(),
                ));
            }
        }
        ChargingProfileKind::Absolute => {
            if profile.schedule.start_schedule.is_none() {
                return Err(ProfileError::InvariantViolation(
                    "kind=Absolute requires schedule.startSchedule".to_string(),
                ));
            }
        }
        // kind=Relative: startSchedule is ignored; origin is the transaction start.
        ChargingProfileKind::Relative => {}
    }

    if let (Some(from), Some(to)) = (profile.valid_from, profile.valid_to) {
        if from > to {
            return Err(ProfileError::InvariantViolation(
                "validFrom must be <= validTo".to_string(),
            ));
        }
    }

    let periods = &profile.schedule.periods;
    if periods.is_empty() {
        return Err(ProfileError::InvariantViolation(
            "schedule must contain at least one period".to_string(),
        ));
    }
    if periods[0].start_period != 0 {
        return Err(ProfileError::InvariantViolation(
            "first period must have startPeriod=0".to_string(),
        ));
    }
    for p in periods {
        if !(p.limit > 0.0) {
            return Err(ProfileError::InvariantViolation(format!(
                "period at startPeriod={} must have limit > 0",
                p.start_period
            )));
        }
        if let Some(phases) = p.number_phases {
            if !(1..=3).contains(&phases) {
                return Err(ProfileError::InvariantViolation(format!(
                    "numberPhases must be 1, 2 or 3, got {phases}"
                )));
            }
        }
    }
    for pair in periods.windows(2) {
        if pair[1].start_period <= pair[0].start_period {
            return Err(ProfileError::InvariantViolation(
                "periods must be strictly sorted ascending by startPeriod".to_string(),
            ));
        }
    }

    // `duration` should exceed the last period's startPeriod (recommended, not
    // required — spec §9 leaves this as a non-fatal advisory, so it is not checked
    // here as a hard error).

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::codec::parse;
    use serde_json::json;

    fn base() -> serde_json::Value {
        json!({
            "chargingProfileId": 1,
            "stackLevel": 0,
            "chargingProfilePurpose": "TxDefaultProfile",
            "chargingProfileKind": "Absolute",
            "chargingSchedule": {
                "chargingRateUnit": "W",
                "chargingSchedulePeriod": [{"startPeriod": 0, "limit": 11000.0}],
                "startSchedule": "2026-01-08T10:00:00Z",
            },
        })
    }

    #[test]
    fn valid_profile_passes() {
        let profile = parse(&base()).unwrap();
        assert!(validate(&profile).is_ok());
    }

    #[test]
    fn tx_purpose_requires_transaction_id() {
        let mut v = base();
        v["chargingProfilePurpose"] = json!("TxProfile");
        let profile = parse(&v).unwrap();
        assert!(validate(&profile).is_err());
    }

    #[test]
    fn non_ascending_periods_rejected() {
        let mut v = base();
        v["chargingSchedule"]["chargingSchedulePeriod"] = json!([
            {"startPeriod": 0, "limit": 100.0},
            {"startPeriod": 0, "limit": 50.0},
        ]);
        let profile = parse(&v).unwrap();
        assert!(validate(&profile).is_err());
    }

    #[test]
    fn zero_limit_rejected() {
        let mut v = base();
        v["chargingSchedule"]["chargingSchedulePeriod"] = json!([{"startPeriod": 0, "limit": 0.0}]);
        let profile = parse(&v).unwrap();
        assert!(validate(&profile).is_err());
    }
}
