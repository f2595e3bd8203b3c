//! The per-station cooperative session loop (spec §4.E, §5).
//!
//! Three logical workers — receiver, heartbeat, transactions — interleave on a
//! single task via `tokio::select!`, the idiomatic single-threaded-cooperative
//! pattern for this runtime: only one branch's body runs at a time, and each
//! branch only yields back to the scheduler at its own suspension points
//! (network I/O, `sleep`, awaiting a pending call, awaiting cancellation).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::policy::{evaluate, evaluate_meter_value_decision, Env, ProfileConfig, StationState};
use crate::domain::resolver::current_limit;
use crate::support::errors::TransportError;
use crate::support::ocpp_frame::OcppFrame;

use super::handlers::handle_call;
use super::state::{ActiveTransaction, SessionPhase, StationSession};
use crate::application::transport::{recv_frame, WsSource};

/// Drives one station for its whole lifetime, until cancelled or until a
/// transport error aborts the session (spec §7: the supervisor may restart it).
pub async fn run(session: Arc<StationSession>, mut source: WsSource) {
    let mut shutdown_fut = Box::pin(session.shutdown.notified().wait());

    // Boot's two outbound calls are resolved by the very same receiver worker
    // that services the rest of the session, so they must race against
    // `recv_frame` rather than run before it starts — otherwise nothing would
    // read the BootNotification/StatusNotification responses off the wire.
    let mut boot_fut = Box::pin(boot(&session));
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_fut => {
                info!(station_id = session.station_id.as_str(), "session cancelled during boot");
                session.transport.close().await;
                return;
            }

            result = &mut boot_fut => {
                match result {
                    Ok(()) => break,
                    Err(e) => {
                        warn!(station_id = session.station_id.as_str(), error = %e, "boot sequence failed");
                        return;
                    }
                }
            }

            frame = recv_frame(&mut source) => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = dispatch_inbound(&session, frame).await {
                            warn!(station_id = session.station_id.as_str(), error = %e, "transport error during boot");
                            return;
                        }
                    }
                    None => {
                        warn!(station_id = session.station_id.as_str(), "transport closed by peer during boot");
                        return;
                    }
                }
            }
        }
    }

    let mut heartbeat_tick = tokio::time::interval(Duration::from_secs(session.profile.heartbeat_interval_secs));
    heartbeat_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut tx_future = Box::pin(transaction_cycle(session.clone()));

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_fut => {
                info!(station_id = session.station_id.as_str(), "session cancelled");
                break;
            }

            frame = recv_frame(&mut source) => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = dispatch_inbound(&session, frame).await {
                            warn!(station_id = session.station_id.as_str(), error = %e, "transport error on inbound dispatch");
                            break;
                        }
                    }
                    None => {
                        warn!(station_id = session.station_id.as_str(), "transport closed by peer");
                        break;
                    }
                }
            }

            _ = heartbeat_tick.tick() => {
                if let Err(e) = session.transport.call("Heartbeat", json!({})).await {
                    warn!(station_id = session.station_id.as_str(), error = %e, "heartbeat failed");
                    break;
                }
            }

            result = &mut tx_future, if session.profile.enable_transactions => {
                match result {
                    Ok(()) => {
                        tx_future = Box::pin(transaction_cycle(session.clone()));
                    }
                    Err(e) => {
                        warn!(station_id = session.station_id.as_str(), error = %e, "transaction cycle aborted");
                        break;
                    }
                }
            }
        }
    }

    session.set_phase(SessionPhase::Closing).await;
    session.transport.close().await;
}

async fn boot(session: &StationSession) -> Result<(), TransportError> {
    session.set_phase(SessionPhase::Connecting).await;
    session
        .transport
        .call(
            "BootNotification",
            json!({
                "chargePointVendor": "ocpp-fleet-sim",
                "chargePointModel": "simulated-station",
            }),
        )
        .await?;
    session.set_phase(SessionPhase::Booted).await;

    session
        .transport
        .call(
            "StatusNotification",
            json!({
                "connectorId": 1,
                "status": "Available",
                "errorCode": "NoError",
            }),
        )
        .await?;
    session.set_phase(SessionPhase::Available).await;
    session.log("booted").await;
    Ok(())
}

async fn dispatch_inbound(session: &StationSession, frame: OcppFrame) -> Result<(), TransportError> {
    match frame {
        OcppFrame::Call { unique_id, action, payload } => {
            handle_call(session, &unique_id, &action, payload).await
        }
        OcppFrame::CallResult { unique_id, payload } => {
            session.transport.resolve(&unique_id, Ok(payload));
            Ok(())
        }
        OcppFrame::CallError { unique_id, error_code, error_description, .. } => {
            session.transport.resolve(
                &unique_id,
                Err(TransportError::CallError { code: error_code, description: error_description }),
            );
            Ok(())
        }
    }
}

/// One full Authorize -> StartTransaction -> MeterValues* -> StopTransaction
/// cycle (spec §4.E "Transactions"), including the pre-transaction idle sleep
/// and policy gate. Runs forever by being re-spawned each time it returns `Ok`.
async fn transaction_cycle(session: Arc<StationSession>) -> Result<(), TransportError> {
    loop {
        let idle = rand_range_secs(session.profile.idle_min_secs, session.profile.idle_max_secs);
        tokio::time::sleep(Duration::from_secs(idle)).await;

        let decision = evaluate(&station_state(&session).await, &profile_config(&session), &env_now());
        if decision.action != crate::domain::policy::Action::Charge {
            session.log(format!("idle retry: {}", decision.reason)).await;
            tokio::time::sleep(Duration::from_secs(60)).await;
            continue;
        }

        if rand::thread_rng().gen_bool(session.profile.offline_probability.clamp(0.0, 1.0)) {
            session.log("simulating offline period").await;
            session.set_phase(SessionPhase::Offline).await;
            tokio::time::sleep(Duration::from_secs(session.profile.offline_duration_secs)).await;
            return Err(TransportError::TransportClosed);
        }

        break;
    }

    let id_tag = {
        let tags = &session.profile.id_tags;
        tags[rand::thread_rng().gen_range(0..tags.len())].clone()
    };

    session.transport.call("Authorize", json!({ "idTag": id_tag })).await?;

    let now = chrono::Utc::now();
    let start_response = session
        .transport
        .call(
            "StartTransaction",
            json!({
                "connectorId": 1,
                "idTag": id_tag,
                "meterStart": 0,
                "timestamp": now.to_rfc3339(),
            }),
        )
        .await?;

    let transaction_id = start_response
        .get("transactionId")
        .and_then(serde_json::Value::as_i64)
        // The source fabricates an id when the CSMS omits one; spec §9 item 1
        // records this as a masked protocol violation rather than a session fault.
        .unwrap_or_else(|| rand::thread_rng().gen_range(1000..=9999));

    *session.current_tx.lock().await = Some(ActiveTransaction {
        transaction_id,
        started_at: now,
        connector_id: 1,
    });
    session.set_phase(SessionPhase::InSession).await;

    let mut total_wh: f64 = 0.0;
    let ticks = rand::thread_rng().gen_range(3..=8);
    for _ in 0..ticks {
        let interval = rand_range_secs(session.profile.sample_interval_min_secs, session.profile.sample_interval_max_secs);
        tokio::time::sleep(Duration::from_secs(interval)).await;

        let limit = current_limit(
            &*session.store.lock().await,
            1,
            chrono::Utc::now(),
            Some((transaction_id, now)),
        );

        let base_step = rand_range_f64(
            session.profile.energy_step_min_wh as f64,
            session.profile.energy_step_max_wh as f64,
        );

        let energy_step = match limit {
            Some(limit_w) => {
                let capped = base_step.min(limit_w * (interval as f64) / 3600.0);
                if capped < base_step {
                    session
                        .event_sink
                        .record(crate::application::events::ProfileEvent {
                            timestamp: chrono::Utc::now(),
                            station_id: session.station_id.clone(),
                            kind: "limit_applied".to_string(),
                            description: format!("OCPP limit {limit_w} W capped this tick's energy step"),
                        })
                        .await;
                }
                capped
            }
            None => {
                let state = station_state(&session).await;
                let config = profile_config(&session);
                let decision = evaluate_meter_value_decision(
                    &state,
                    &config,
                    &env_now(),
                    total_wh,
                    session.profile.max_energy_kwh * 1000.0,
                );
                if decision.decision == crate::domain::policy::MeterDecision::Stop {
                    session.log(format!("meter loop stopping: {}", decision.reason)).await;
                    break;
                }

                let current_hour = chrono::Utc::now().format("%H").to_string().parse::<u32>().unwrap_or(0);
                if session.profile.allow_peak && session.profile.peak_hour_set().contains(&current_hour) {
                    (base_step / 2.0).max(10.0)
                } else {
                    base_step
                }
            }
        };

        total_wh = (total_wh + energy_step).min(session.profile.max_energy_kwh * 1000.0);

        session
            .transport
            .call(
                "MeterValues",
                json!({
                    "connectorId": 1,
                    "transactionId": transaction_id,
                    "meterValue": [{
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                        "sampledValue": [{
                            "value": format!("{total_wh:.0}"),
                            "measurand": "Energy.Active.Import.Register",
                        }],
                    }],
                }),
            )
            .await?;

        if total_wh >= session.profile.max_energy_kwh * 1000.0 {
            break;
        }
    }

    session
        .transport
        .call(
            "StopTransaction",
            json!({
                "transactionId": transaction_id,
                "meterStop": total_wh as i64,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "idTag": id_tag,
            }),
        )
        .await?;

    *session.current_tx.lock().await = None;
    session.set_phase(SessionPhase::Available).await;
    Ok(())
}

async fn station_state(session: &StationSession) -> StationState {
    let tx = session.current_tx.lock().await;
    StationState {
        energy_dispensed_kwh: 0.0,
        charging: tx.is_some(),
        session_active: tx.is_some(),
    }
}

fn profile_config(session: &StationSession) -> ProfileConfig {
    ProfileConfig {
        charge_if_price_below: session.profile.charge_if_price_below,
        max_energy_kwh: session.profile.max_energy_kwh,
        allow_peak_hours: session.profile.allow_peak,
        peak_hours: session.profile.peak_hour_set(),
    }
}

fn env_now() -> Env {
    use chrono::Timelike;
    Env {
        // No live price feed in the core (spec §9: global mutable price becomes
        // supervisor-scoped state delivered per-tick); 0.0 keeps the policy gate
        // open by default until a collaborator supplies real tariff data.
        current_price: 0.0,
        hour: chrono::Utc::now().hour(),
    }
}

fn rand_range_secs(min: u64, max: u64) -> u64 {
    if min >= max {
        min
    } else {
        rand::thread_rng().gen_range(min..=max)
    }
}

fn rand_range_f64(min: f64, max: f64) -> f64 {
    if min >= max {
        min
    } else {
        rand::thread_rng().gen_range(min..=max)
    }
}
