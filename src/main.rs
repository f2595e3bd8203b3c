//!
//! OCPP 1.6-J fleet simulator CLI.
//! Reads configuration from TOML file (~/.config/ocpp-fleet-sim/config.toml).

use clap::Parser;
use tracing::{error, info, warn};

use ocpp_fleet_sim::config::{default_config_path, FleetConfig};
use ocpp_fleet_sim::support::shutdown::ShutdownCoordinator;
use ocpp_fleet_sim::Supervisor;

/// Start a fleet of simulated OCPP 1.6-J stations against a CSMS.
#[derive(Parser, Debug)]
#[command(name = "ocpp-fleet-sim", version)]
struct Cli {
    /// Number of stations to run, named PY-SIM-0001.. in order.
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Station profile preset to apply (see config.toml [profiles]).
    #[arg(long, default_value = "default")]
    profile: String,

    /// Owner id the started stations are registered under.
    #[arg(long, default_value = "local")]
    owner: String,

    /// Override the CSMS URL from the config file.
    #[arg(long)]
    csms_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("OCPP_FLEET_SIM_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let mut fleet_cfg = match FleetConfig::load(&config_path) {
        Ok(cfg) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            warn!("Failed to load config: {}. Using defaults.", e);
            FleetConfig::default()
        }
    };

    if let Some(url) = cli.csms_url {
        fleet_cfg.csms_url = url;
    }

    if fleet_cfg.profile(&cli.profile).is_none() {
        error!(
            profile = cli.profile.as_str(),
            available = ?fleet_cfg.profile_names(),
            "unknown station profile"
        );
        return Err(format!("unknown profile: {}", cli.profile).into());
    }

    info!("Starting ocpp-fleet-sim against {}", fleet_cfg.csms_url);

    let shutdown = ShutdownCoordinator::new(fleet_cfg.shutdown_timeout_secs);
    shutdown.start_signal_listener();

    let supervisor = Supervisor::new(fleet_cfg);
    if let Err(e) = supervisor.scale(&cli.owner, cli.count, &cli.profile).await {
        error!(error = %e, "failed to start fleet");
        return Err(e.into());
    }
    info!(count = cli.count, owner = cli.owner.as_str(), "fleet started");

    shutdown
        .shutdown_with_cleanup(|| async {
            for station_id in supervisor.list_for_owner(&cli.owner) {
                if let Err(e) = supervisor.stop(&cli.owner, &station_id).await {
                    warn!(station_id, error = %e, "error stopping station during shutdown");
                }
            }
        })
        .await;

    info!("ocpp-fleet-sim shutdown complete");
    Ok(())
}
