//! Black-box tests driving the public domain API the way a collaborator
//! consuming this crate would: through `ocpp_fleet_sim::domain`, not its
//! internals.

use chrono::{TimeZone, Utc};
use serde_json::json;

use ocpp_fleet_sim::domain::{
    current_limit, ChargingProfilePurpose, ProfileStore,
};
use ocpp_fleet_sim::domain::profile::{parse, validate};

fn profile_json(id: u32, stack_level: u32, purpose: &str, limit: f64) -> serde_json::Value {
    json!({
        "chargingProfileId": id,
        "stackLevel": stack_level,
        "chargingProfilePurpose": purpose,
        "chargingProfileKind": "Absolute",
        "chargingSchedule": {
            "chargingRateUnit": "W",
            "chargingSchedulePeriod": [{"startPeriod": 0, "limit": limit}],
            "startSchedule": "2026-01-08T10:00:00Z",
        },
    })
}

#[test]
fn set_then_query_reflects_the_most_restrictive_stack_level() {
    let mut store = ProfileStore::new();

    let cp_max = parse(&profile_json(1, 0, "ChargePointMaxProfile", 22000.0)).unwrap();
    validate(&cp_max).unwrap();
    store.add(0, cp_max).unwrap();

    let tx_default = parse(&profile_json(2, 0, "TxDefaultProfile", 11000.0)).unwrap();
    validate(&tx_default).unwrap();
    store.add(1, tx_default).unwrap();

    let now = Utc.with_ymd_and_hms(2026, 1, 8, 10, 0, 0).unwrap();
    assert_eq!(current_limit(&store, 1, now, None), Some(11000.0));
    assert_eq!(current_limit(&store, 2, now, None), Some(22000.0));
}

#[test]
fn rejecting_a_second_profile_at_the_same_stack_level_leaves_the_first_in_place() {
    let mut store = ProfileStore::new();
    let first = parse(&profile_json(1, 0, "TxDefaultProfile", 11000.0)).unwrap();
    store.add(1, first).unwrap();

    let conflicting = parse(&profile_json(2, 0, "TxDefaultProfile", 5000.0)).unwrap();
    assert!(store.add(1, conflicting).is_err());

    let now = Utc.with_ymd_and_hms(2026, 1, 8, 10, 0, 0).unwrap();
    assert_eq!(current_limit(&store, 1, now, None), Some(11000.0));
}

#[test]
fn malformed_wire_profile_is_rejected_before_it_ever_reaches_the_store() {
    let mut payload = profile_json(1, 0, "TxDefaultProfile", 11000.0);
    payload.as_object_mut().unwrap().remove("chargingProfileKind");
    assert!(parse(&payload).is_err());
}

#[test]
fn tx_purpose_without_transaction_id_fails_validation() {
    let profile = parse(&profile_json(1, 0, "TxProfile", 11000.0)).unwrap();
    assert_eq!(profile.purpose, ChargingProfilePurpose::Tx);
    assert!(validate(&profile).is_err());
}
