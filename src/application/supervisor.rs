//! Fleet supervisor (spec §4.F): start/stop/scale simulated stations, track
//! which owner may touch which station. Grounded in the teacher's
//! `SessionRegistry` — a flat `DashMap` of live handles guarded by cheap
//! membership checks — adapted here to add an ownership map instead of a
//! debounce map, since the supervisor's job is authorization, not reconnect
//! throttling.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::events::{EventSink, NullEventSink};
use crate::application::session::{self, StationSession};
use crate::application::transport;
use crate::config::FleetConfig;
use crate::domain::store::ProfileStore;
use crate::support::errors::SupervisorError;
use crate::support::shutdown::ShutdownSignal;

struct StationHandle {
    owner_id: String,
    shutdown: ShutdownSignal,
    /// `None` while the station is in the degraded keep-alive (spec §4.F/§5):
    /// the CSMS was unreachable at connect time, so no session was ever built.
    session: Option<Arc<StationSession>>,
    task: JoinHandle<()>,
}

/// Owns every running station task for this process. Stations are addressed
/// by `stationId` alone; ownership is tracked separately so two owners can
/// never collide on the same id.
pub struct Supervisor {
    config: FleetConfig,
    stations: DashMap<String, StationHandle>,
    event_sink: Arc<dyn EventSink>,
}

impl Supervisor {
    pub fn new(config: FleetConfig) -> Self {
        Self {
            config,
            stations: DashMap::new(),
            event_sink: Arc::new(NullEventSink),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Start one station under `profile_name`, owned by `owner_id`. Idempotent
    /// for the same owner; fails only if a *different* owner already runs this
    /// station id (spec §4.F).
    pub async fn start(
        &self,
        owner_id: &str,
        station_id: &str,
        profile_name: &str,
    ) -> Result<(), SupervisorError> {
        if let Some(existing) = self.stations.get(station_id) {
            if existing.owner_id == owner_id {
                return Ok(());
            }
            return Err(SupervisorError::NotOwned {
                station_id: station_id.to_string(),
                caller: owner_id.to_string(),
            });
        }

        let profile = self
            .config
            .profile(profile_name)
            .ok_or_else(|| SupervisorError::UnknownProfileName(profile_name.to_string()))?
            .clone();

        let url = format!("{}/{station_id}", self.config.csms_url.trim_end_matches('/'));
        match transport::connect(&url).await {
            Ok((station_transport, source)) => {
                let session = Arc::new(StationSession {
                    station_id: station_id.to_string(),
                    owner_id: owner_id.to_string(),
                    profile,
                    transport: Arc::new(station_transport),
                    store: TokioMutex::new(ProfileStore::new()),
                    log_ring: TokioMutex::new(Default::default()),
                    current_tx: TokioMutex::new(None),
                    phase: TokioMutex::new(session::SessionPhase::Connecting),
                    shutdown: ShutdownSignal::new(),
                    event_sink: self.event_sink.clone(),
                });

                let task = tokio::spawn(session::run(session.clone(), source));

                self.stations.insert(
                    station_id.to_string(),
                    StationHandle {
                        owner_id: owner_id.to_string(),
                        shutdown: session.shutdown.clone(),
                        session: Some(session),
                        task,
                    },
                );
                info!(station_id, owner_id, profile = profile_name, "station started");
            }
            Err(e) => {
                // Spec §4.F/§5: a dead CSMS must not stall or abort the fleet. Register
                // the station anyway and park its task on the shutdown signal so `stop`
                // still works; the caller may retry `start` later to actually connect.
                warn!(station_id, owner_id, error = %e, "connect failed; entering degraded keep-alive");
                let shutdown = ShutdownSignal::new();
                let task_shutdown = shutdown.clone();
                let task_station_id = station_id.to_string();
                let task = tokio::spawn(async move {
                    task_shutdown.notified().wait().await;
                    info!(station_id = task_station_id.as_str(), "degraded station stopped");
                });

                self.stations.insert(
                    station_id.to_string(),
                    StationHandle { owner_id: owner_id.to_string(), shutdown, session: None, task },
                );
            }
        }
        Ok(())
    }

    /// Stop a station, checked against `owner_id`. Idempotent: stopping a
    /// station that is already gone (never started, or exited on its own) is
    /// not an error (spec §4.F).
    pub async fn stop(&self, owner_id: &str, station_id: &str) -> Result<(), SupervisorError> {
        self.check_owner(owner_id, station_id)?;

        let handle = match self.stations.remove(station_id) {
            Some((_, handle)) => handle,
            None => return Ok(()),
        };

        handle.shutdown.trigger();
        let _ = handle.task.await;
        info!(station_id, owner_id, "station stopped");
        Ok(())
    }

    /// Stop every station `owner_id` currently runs, then start exactly
    /// `target_count` fresh stations named `PY-SIM-0001` .. `PY-SIM-<target_count:04}`
    /// (spec §4.F: "stops all of the caller's stations, then starts targetCount").
    pub async fn scale(
        &self,
        owner_id: &str,
        target_count: u32,
        profile_name: &str,
    ) -> Result<(), SupervisorError> {
        for station_id in self.list_for_owner(owner_id) {
            self.stop(owner_id, &station_id).await?;
        }

        for index in 1..=target_count {
            let station_id = format!("PY-SIM-{index:04}");
            self.start(owner_id, &station_id, profile_name).await?;
        }

        Ok(())
    }

    pub fn list_for_owner(&self, owner_id: &str) -> Vec<String> {
        self.stations
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub async fn get_logs(&self, owner_id: &str, station_id: &str) -> Result<Vec<String>, SupervisorError> {
        self.check_owner(owner_id, station_id)?;
        let handle = self
            .stations
            .get(station_id)
            .ok_or_else(|| SupervisorError::NotRunning(station_id.to_string()))?;
        match &handle.session {
            Some(session) => Ok(session.logs().await),
            None => Ok(Vec::new()),
        }
    }

    fn check_owner(&self, owner_id: &str, station_id: &str) -> Result<(), SupervisorError> {
        match self.stations.get(station_id) {
            Some(handle) if handle.owner_id == owner_id => Ok(()),
            Some(_) => Err(SupervisorError::NotOwned {
                station_id: station_id.to_string(),
                caller: owner_id.to_string(),
            }),
            None => {
                warn!(station_id, "operation against unknown station");
                Ok(())
            }
        }
    }
}
