//! Fleet and per-station-profile configuration (ambient — TOML-backed, spec §3 supplement).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Parameters driving the Transactions worker for one simulated station
/// (spec §4.E), named and defaulted after the original simulator's presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationProfileConfig {
    pub name: String,
    pub heartbeat_interval_secs: u64,
    pub idle_min_secs: u64,
    pub idle_max_secs: u64,
    pub energy_step_min_wh: u32,
    pub energy_step_max_wh: u32,
    pub sample_interval_min_secs: u64,
    pub sample_interval_max_secs: u64,
    pub enable_transactions: bool,
    pub offline_probability: f64,
    pub offline_duration_secs: u64,
    pub id_tags: Vec<String>,
    pub charge_if_price_below: f64,
    pub max_energy_kwh: f64,
    pub allow_peak: bool,
    pub peak_hours: (u32, u32),
}

impl Default for StationProfileConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            heartbeat_interval_secs: 60,
            idle_min_secs: 30,
            idle_max_secs: 120,
            energy_step_min_wh: 50,
            energy_step_max_wh: 150,
            sample_interval_min_secs: 10,
            sample_interval_max_secs: 20,
            enable_transactions: true,
            offline_probability: 0.0,
            offline_duration_secs: 0,
            id_tags: vec!["ABC123".to_string(), "TAG001".to_string(), "USER42".to_string()],
            charge_if_price_below: 100.0,
            max_energy_kwh: 30.0,
            allow_peak: true,
            peak_hours: (8, 18),
        }
    }
}

impl StationProfileConfig {
    pub fn peak_hour_set(&self) -> std::collections::HashSet<u32> {
        (self.peak_hours.0..self.peak_hours.1).collect()
    }
}

fn preset(name: &str, f: impl FnOnce(&mut StationProfileConfig)) -> StationProfileConfig {
    let mut p = StationProfileConfig { name: name.to_string(), ..Default::default() };
    f(&mut p);
    p
}

/// The five named presets shipped by the original simulator.
pub fn default_profiles() -> HashMap<String, StationProfileConfig> {
    let mut profiles = HashMap::new();

    profiles.insert(
        "default".to_string(),
        preset("default", |p| {
            p.charge_if_price_below = 25.0;
            p.max_energy_kwh = 30.0;
        }),
    );

    profiles.insert(
        "busy".to_string(),
        preset("busy", |p| {
            p.idle_min_secs = 5;
            p.idle_max_secs = 20;
            p.energy_step_min_wh = 80;
            p.energy_step_max_wh = 220;
            p.charge_if_price_below = 30.0;
            p.max_energy_kwh = 40.0;
        }),
    );

    profiles.insert(
        "idle".to_string(),
        preset("idle", |p| {
            p.idle_min_secs = 180;
            p.idle_max_secs = 600;
            p.charge_if_price_below = 18.0;
            p.max_energy_kwh = 20.0;
            p.allow_peak = false;
        }),
    );

    profiles.insert(
        "no-transactions".to_string(),
        preset("no-transactions", |p| {
            p.enable_transactions = false;
        }),
    );

    profiles.insert(
        "flaky".to_string(),
        preset("flaky", |p| {
            p.idle_min_secs = 20;
            p.idle_max_secs = 60;
            p.offline_probability = 0.1;
            p.offline_duration_secs = 30;
            p.charge_if_price_below = 20.0;
            p.max_energy_kwh = 25.0;
        }),
    );

    profiles
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Top-level configuration: where the fleet connects and what profiles it can use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub csms_url: String,
    pub shutdown_timeout_secs: u64,
    pub logging: LoggingConfig,
    #[serde(skip)]
    profiles: HashMap<String, StationProfileConfig>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            csms_url: "ws://localhost:9000/ocpp".to_string(),
            shutdown_timeout_secs: 30,
            logging: LoggingConfig::default(),
            profiles: default_profiles(),
        }
    }
}

impl FleetConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut cfg: FleetConfig = toml::from_str(&text).map_err(ConfigError::Toml)?;
        if cfg.profiles.is_empty() {
            cfg.profiles = default_profiles();
        }
        Ok(cfg)
    }

    pub fn profile(&self, name: &str) -> Option<&StationProfileConfig> {
        self.profiles.get(name)
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(toml::de::Error),
}

/// `~/.config/ocpp-fleet-sim/config.toml`, mirroring the teacher's config layout.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocpp-fleet-sim")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profiles_cover_the_five_named_presets() {
        let profiles = default_profiles();
        for name in ["default", "busy", "idle", "no-transactions", "flaky"] {
            assert!(profiles.contains_key(name), "missing preset {name}");
        }
    }

    #[test]
    fn no_transactions_preset_disables_the_worker() {
        let profiles = default_profiles();
        assert!(!profiles["no-transactions"].enable_transactions);
    }

    #[test]
    fn flaky_preset_has_nonzero_offline_probability() {
        let profiles = default_profiles();
        assert!(profiles["flaky"].offline_probability > 0.0);
    }
}
