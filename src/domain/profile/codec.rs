//! Parse/serialize `ChargingProfile` OCPP JSON dictionaries (spec §4.A).
//!
//! Parsing is done by hand, field by field, rather than via `#[derive(Deserialize)]`,
//! so that a malformed payload fails with a precise `MissingField`/`InvalidEnum`/
//! `InvalidShape` naming the offending JSON path instead of a generic serde error.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::support::errors::ProfileError;

use super::types::{
    ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit,
    ChargingSchedule, ChargingSchedulePeriod, RecurrencyKind,
};

fn field<'a>(obj: &'a Value, path: &str, key: &str) -> Result<&'a Value, ProfileError> {
    obj.get(key)
        .ok_or_else(|| ProfileError::MissingField(format!("{path}.{key}")))
}

fn as_u64(v: &Value, path: &str) -> Result<u64, ProfileError> {
    v.as_u64().ok_or_else(|| ProfileError::InvalidShape {
        path: path.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}

fn as_i64(v: &Value, path: &str) -> Result<i64, ProfileError> {
    v.as_i64().ok_or_else(|| ProfileError::InvalidShape {
        path: path.to_string(),
        reason: "expected an integer".to_string(),
    })
}

fn as_f64(v: &Value, path: &str) -> Result<f64, ProfileError> {
    v.as_f64().ok_or_else(|| ProfileError::InvalidShape {
        path: path.to_string(),
        reason: "expected a number".to_string(),
    })
}

fn as_str<'a>(v: &'a Value, path: &str) -> Result<&'a str, ProfileError> {
    v.as_str().ok_or_else(|| ProfileError::InvalidShape {
        path: path.to_string(),
        reason: "expected a string".to_string(),
    })
}

fn parse_timestamp(v: &Value, path: &str) -> Result<DateTime<Utc>, ProfileError> {
    let s = as_str(v, path)?;
    // A trailing `Z` maps to UTC; naive values are interpreted as UTC (spec §4.A).
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    Err(ProfileError::InvalidShape {
        path: path.to_string(),
        reason: format!("not a valid ISO-8601 timestamp: {s}"),
    })
}

/// Parse an untyped JSON object into a `ChargingProfile`.
pub fn parse(v: &Value) -> Result<ChargingProfile, ProfileError> {
    if !v.is_object() {
        return Err(ProfileError::InvalidShape {
            path: "$".to_string(),
            reason: "expected a JSON object".to_string(),
        });
    }

    let id = as_u64(field(v, "$", "chargingProfileId")?, "$.chargingProfileId")? as u32;
    let stack_level =
        as_u64(field(v, "$", "stackLevel")?, "$.stackLevel")? as u32;

    let purpose_raw = as_str(field(v, "$", "chargingProfilePurpose")?, "$.chargingProfilePurpose")?;
    let purpose = ChargingProfilePurpose::from_wire_str(purpose_raw).ok_or_else(|| {
        ProfileError::InvalidEnum {
            path: "$.chargingProfilePurpose".to_string(),
            value: purpose_raw.to_string(),
        }
    })?;

    let kind_raw = as_str(field(v, "$", "chargingProfileKind")?, "$.chargingProfileKind")?;
    let kind = ChargingProfileKind::from_wire_str(kind_raw).ok_or_else(|| ProfileError::InvalidEnum {
        path: "$.chargingProfileKind".to_string(),
        value: kind_raw.to_string(),
    })?;

    let schedule = parse_schedule(field(v, "$", "chargingSchedule")?, "$.chargingSchedule")?;

    let transaction_id = match v.get("transactionId") {
        Some(tv) if !tv.is_null() => Some(as_i64(tv, "$.transactionId")?),
        _ => None,
    };

    let recurrency_kind = match v.get("recurrencyKind") {
        Some(rv) if !rv.is_null() => {
            let s = as_str(rv, "$.recurrencyKind")?;
            Some(RecurrencyKind::from_wire_str(s).ok_or_else(|| ProfileError::InvalidEnum {
                path: "$.recurrencyKind".to_string(),
                value: s.to_string(),
            })?)
        }
        _ => None,
    };

    let valid_from = match v.get("validFrom") {
        Some(fv) if !fv.is_null() => Some(parse_timestamp(fv, "$.validFrom")?),
        _ => None,
    };
    let valid_to = match v.get("validTo") {
        Some(tv) if !tv.is_null() => Some(parse_timestamp(tv, "$.validTo")?),
        _ => None,
    };

    Ok(ChargingProfile {
        id,
        stack_level,
        purpose,
        kind,
        schedule,
        transaction_id,
        recurrency_kind,
        valid_from,
        valid_to,
    })
}

fn parse_schedule(v: &Value, path: &str) -> Result<ChargingSchedule, ProfileError> {
    let rate_unit_raw = as_str(field(v, path, "chargingRateUnit")?, &format!("{path}.chargingRateUnit"))?;
    let rate_unit = ChargingRateUnit::from_wire_str(rate_unit_raw).ok_or_else(|| ProfileError::InvalidEnum {
        path: format!("{path}.chargingRateUnit"),
        value: rate_unit_raw.to_string(),
    })?;

    let periods_raw = field(v, path, "chargingSchedulePeriod")?
        .as_array()
        .ok_or_else(|| ProfileError::InvalidShape {
            path: format!("{path}.chargingSchedulePeriod"),
            reason: "expected an array".to_string(),
        })?;

    if periods_raw.is_empty() {
        return Err(ProfileError::InvariantViolation(
            "chargingSchedulePeriod must contain at least one period".to_string(),
        ));
    }

    let mut periods = Vec::with_capacity(periods_raw.len());
    for (idx, pv) in periods_raw.iter().enumerate() {
        let p_path = format!("{path}.chargingSchedulePeriod[{idx}]");
        let start_period = as_u64(field(pv, &p_path, "startPeriod")?, &format!("{p_path}.startPeriod"))? as u32;
        let limit = as_f64(field(pv, &p_path, "limit")?, &format!("{p_path}.limit"))?;
        let number_phases = match pv.get("numberPhases") {
            Some(nv) if !nv.is_null() => Some(as_u64(nv, &format!("{p_path}.numberPhases"))? as u8),
            _ => None,
        };
        periods.push(ChargingSchedulePeriod {
            start_period,
            limit,
            number_phases,
        });
    }

    let duration = match v.get("duration") {
        Some(dv) if !dv.is_null() => Some(as_u64(dv, &format!("{path}.duration"))? as u32),
        _ => None,
    };
    let start_schedule = match v.get("startSchedule") {
        Some(sv) if !sv.is_null() => Some(parse_timestamp(sv, &format!("{path}.startSchedule"))?),
        _ => None,
    };
    let min_charging_rate = match v.get("minChargingRate") {
        Some(mv) if !mv.is_null() => Some(as_f64(mv, &format!("{path}.minChargingRate"))?),
        _ => None,
    };

    Ok(ChargingSchedule {
        rate_unit,
        periods,
        duration,
        start_schedule,
        min_charging_rate,
    })
}

/// Serialize a bare `ChargingSchedule` (no enclosing profile) into its OCPP
/// JSON dictionary shape. Shared by `serialize` and by `GetCompositeSchedule`,
/// which returns a schedule on its own rather than a whole profile.
pub fn serialize_schedule(schedule: &ChargingSchedule) -> Value {
    let mut periods = Vec::with_capacity(schedule.periods.len());
    for p in &schedule.periods {
        let mut period = serde_json::json!({
            "startPeriod": p.start_period,
            "limit": p.limit,
        });
        if let Some(phases) = p.number_phases {
            period["numberPhases"] = Value::from(phases);
        }
        periods.push(period);
    }

    let mut out = serde_json::json!({
        "chargingRateUnit": schedule.rate_unit.wire_str(),
        "chargingSchedulePeriod": periods,
    });
    if let Some(d) = schedule.duration {
        out["duration"] = Value::from(d);
    }
    if let Some(s) = schedule.start_schedule {
        out["startSchedule"] = Value::from(s.to_rfc3339());
    }
    if let Some(r) = schedule.min_charging_rate {
        out["minChargingRate"] = Value::from(r);
    }
    out
}

/// Serialize a `ChargingProfile` back into its OCPP JSON dictionary form.
/// The inverse of `parse`: absent optional fields are omitted.
pub fn serialize(profile: &ChargingProfile) -> Value {
    let mut obj = serde_json::json!({
        "chargingProfileId": profile.id,
        "stackLevel": profile.stack_level,
        "chargingProfilePurpose": profile.purpose.wire_str(),
        "chargingProfileKind": profile.kind.wire_str(),
        "chargingSchedule": serialize_schedule(&profile.schedule),
    });
    if let Some(tx) = profile.transaction_id {
        obj["transactionId"] = Value::from(tx);
    }
    if let Some(rk) = profile.recurrency_kind {
        obj["recurrencyKind"] = Value::from(rk.wire_str());
    }
    if let Some(vf) = profile.valid_from {
        obj["validFrom"] = Value::from(vf.to_rfc3339());
    }
    if let Some(vt) = profile.valid_to {
        obj["validTo"] = Value::from(vt.to_rfc3339());
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
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
    fn parses_minimal_profile() {
        let profile = parse(&sample()).unwrap();
        assert_eq!(profile.id, 1);
        assert_eq!(profile.purpose, ChargingProfilePurpose::TxDefault);
        assert_eq!(profile.schedule.periods.len(), 1);
        assert_eq!(profile.schedule.periods[0].limit, 11000.0);
    }

    #[test]
    fn missing_field_names_the_path() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("stackLevel");
        let err = parse(&v).unwrap_err();
        assert_eq!(err, ProfileError::MissingField("$.stackLevel".to_string()));
    }

    #[test]
    fn invalid_enum_names_the_offending_value() {
        let mut v = sample();
        v["chargingProfileKind"] = json!("Bogus");
        let err = parse(&v).unwrap_err();
        assert_eq!(
            err,
            ProfileError::InvalidEnum {
                path: "$.chargingProfileKind".to_string(),
                value: "Bogus".to_string(),
            }
        );
    }

    #[test]
    fn empty_periods_is_an_invariant_violation() {
        let mut v = sample();
        v["chargingSchedule"]["chargingSchedulePeriod"] = json!([]);
        let err = parse(&v).unwrap_err();
        assert!(matches!(err, ProfileError::InvariantViolation(_)));
    }

    #[test]
    fn roundtrip_preserves_semantic_fields() {
        let profile = parse(&sample()).unwrap();
        let reparsed = parse(&serialize(&profile)).unwrap();
        assert_eq!(profile, reparsed);
    }
}
