//! Station-handled inbound actions (spec §4.E "Inbound handlers" table).

use serde_json::{json, Value};
use tracing::warn;

use crate::application::events::ProfileEvent;
use crate::domain::profile::{parse as parse_profile, validate as validate_profile, ChargingProfilePurpose};
use crate::domain::resolver::composite_schedule;
use crate::domain::store::ClearFilter;
use crate::domain::ChargingRateUnit;
use crate::support::errors::TransportError;

use super::state::StationSession;

/// Dispatch one inbound `[2, uniqueId, action, payload]` call to the matching
/// handler and send its `[3,...]` response. Parse/validation failures never
/// crash the session — they surface as `Rejected`/`Unknown` responses (spec §7).
pub async fn handle_call(
    session: &StationSession,
    unique_id: &str,
    action: &str,
    payload: Value,
) -> Result<(), TransportError> {
    let response = match action {
        "Reset" => handle_reset(),
        "RemoteStartTransaction" => handle_remote_start_transaction(),
        "RemoteStopTransaction" => handle_remote_stop_transaction(),
        "SetChargingProfile" => handle_set_charging_profile(session, &payload).await,
        "GetCompositeSchedule" => handle_get_composite_schedule(session, &payload).await,
        "ClearChargingProfile" => handle_clear_charging_profile(session, &payload).await,
        other => {
            warn!(action = other, "unsupported inbound action");
            return session
                .transport
                .send_error(unique_id, "NotImplemented", "Action not supported")
                .await;
        }
    };

    session.transport.send_result(unique_id, response).await
}

fn handle_reset() -> Value {
    json!({ "status": "Accepted" })
}

fn handle_remote_start_transaction() -> Value {
    // No-op beyond acknowledging — the transactions worker keeps driving sessions
    // on its own cadence regardless (spec §4.E).
    json!({ "status": "Accepted" })
}

fn handle_remote_stop_transaction() -> Value {
    json!({ "status": "Accepted" })
}

async fn handle_set_charging_profile(session: &StationSession, payload: &Value) -> Value {
    let connector_id = payload.get("connectorId").and_then(Value::as_u64).unwrap_or(0) as u32;

    let profile_json = match payload.get("csChargingProfiles") {
        Some(p) => p,
        None => return json!({ "status": "Rejected" }),
    };

    let profile = match parse_profile(profile_json).and_then(|p| {
        validate_profile(&p)?;
        Ok(p)
    }) {
        Ok(p) => p,
        Err(e) => {
            session
                .log(format!("SetChargingProfile rejected: {e}"))
                .await;
            return json!({ "status": "Rejected" });
        }
    };

    let mut store = session.store.lock().await;
    let profile_id = profile.id;
    match store.add(connector_id, profile) {
        Ok(()) => {
            drop(store);
            session.log("SetChargingProfile accepted").await;
            session
                .event_sink
                .record(ProfileEvent {
                    timestamp: chrono::Utc::now(),
                    station_id: session.station_id.clone(),
                    kind: "profile_accepted".to_string(),
                    description: format!("profile {profile_id} accepted on connector {connector_id}"),
                })
                .await;
            json!({ "status": "Accepted" })
        }
        Err(e) => {
            session
                .log(format!("SetChargingProfile rejected: {e}"))
                .await;
            json!({ "status": "Rejected" })
        }
    }
}

async fn handle_get_composite_schedule(session: &StationSession, payload: &Value) -> Value {
    let connector_id = payload.get("connectorId").and_then(Value::as_u64).unwrap_or(0) as u32;
    let duration = payload.get("duration").and_then(Value::as_u64).unwrap_or(0) as u32;
    let unit = payload
        .get("chargingRateUnit")
        .and_then(Value::as_str)
        .and_then(ChargingRateUnit::from_wire_str)
        .unwrap_or(ChargingRateUnit::Watts);

    let now = chrono::Utc::now();
    let store = session.store.lock().await;
    match composite_schedule(&store, connector_id, duration, unit, now) {
        Some(schedule) => json!({
            "status": "Accepted",
            "connectorId": connector_id,
            "scheduleStart": now.to_rfc3339(),
            "chargingSchedule": crate::domain::profile::serialize_schedule(&schedule),
        }),
        None => json!({ "status": "Rejected" }),
    }
}

async fn handle_clear_charging_profile(session: &StationSession, payload: &Value) -> Value {
    let filter = ClearFilter {
        connector_id: payload.get("connectorId").and_then(Value::as_u64).map(|c| c as u32),
        profile_id: payload.get("id").and_then(Value::as_u64).map(|c| c as u32),
        purpose: payload
            .get("chargingProfilePurpose")
            .and_then(Value::as_str)
            .and_then(ChargingProfilePurpose::from_wire_str),
        stack_level: payload.get("stackLevel").and_then(Value::as_u64).map(|c| c as u32),
    };

    // connectorId=0 means "apply to every connector" at the OCPP boundary (spec §6.2);
    // translate that into a filter with no connector restriction at all.
    let filter = if filter.connector_id == Some(0) {
        ClearFilter { connector_id: None, ..filter }
    } else {
        filter
    };

    let mut store = session.store.lock().await;
    let removed = store.clear(filter);
    if removed > 0 {
        json!({ "status": "Accepted" })
    } else {
        json!({ "status": "Unknown" })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    // The handlers above are thin glue around `domain::profile`/`domain::store`,
    // which carry their own unit tests; here we only pin the malformed-payload path.
    #[test]
    fn malformed_charging_profile_payload_fails_to_parse() {
        let payload = json!({
            "connectorId": 1,
            "csChargingProfiles": { "chargingProfileId": 1 },
        });
        let profile_json = payload.get("csChargingProfiles").unwrap();
        assert!(crate::domain::profile::parse(profile_json).is_err());
    }
}
