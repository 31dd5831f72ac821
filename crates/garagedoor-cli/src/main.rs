//! `garagedoord`: garage door access-control daemon.
//!
//! Loads the configuration, wires the board, the door controller and the
//! TLS command server together, then runs until SIGINT or SIGTERM. SIGHUP
//! re-reads the configuration file.

use anyhow::{Context, Result};
use clap::Parser;
use garagedoor_control::{DoorController, EventTranslator, ShellEffects};
use garagedoor_core::Config;
use garagedoor_core::constants::DEFAULT_CONFIG_PATH;
use garagedoor_hardware::mock::{SimulatedBoard, SimulatedMotor};
use garagedoor_network::{GarageServer, TlsAcceptor, TrustedSubnet};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

const LOG_TIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S%.3f";

#[derive(Debug, Parser)]
#[command(name = "garagedoord", version, about = "Garage door access-control daemon")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter, overrides RUST_LOG (e.g. "debug" or "garagedoor_network=trace")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    check_config: bool,

    /// Drive the simulated door with a motor of this travel time in seconds
    #[arg(long, value_name = "SECS")]
    simulate_motor: Option<f64>,
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("Invalid log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .init();
    Ok(())
}

/// Load the file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::default();
    match config.reload(path) {
        Ok(issues) => {
            for issue in issues {
                warn!(path = %path.display(), "{issue}");
            }
        }
        Err(garagedoor_core::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Config file not found, using defaults");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Unable to read {}", path.display()));
        }
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn reload_config(path: &Path, config: &mut Config, controller: &DoorController) {
    let port = config.port;
    let ban_time = config.ban_time;
    match config.reload(path) {
        Ok(issues) => {
            for issue in issues {
                warn!(path = %path.display(), "{issue}");
            }
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Reload failed, keeping current configuration");
            return;
        }
    }

    controller.set_close_time(config.close_time);
    if config.ban_time != ban_time {
        warn!("Ban time change takes effect at next start");
    }
    if config.port != port {
        warn!(
            old = port,
            new = config.port,
            "Port change takes effect at next start"
        );
    }
    info!(close_time_ms = config.close_time.as_millis() as u64, "Configuration reloaded");
}

fn motor_travel(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).context("Invalid motor travel time")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;

    info!(pid = std::process::id(), version = env!("CARGO_PKG_VERSION"), "Starting garagedoord");

    let mut config = load_config(&args.config)?;
    if args.check_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    info!(
        close_time_ms = config.close_time.as_millis() as u64,
        port = config.port,
        "Configuration loaded"
    );

    let (board, handle) = SimulatedBoard::new();
    info!("Using simulated board");
    let _motor = match args.simulate_motor {
        Some(secs) => {
            let travel = motor_travel(secs)?;
            info!(travel_ms = travel.as_millis() as u64, "Simulated motor enabled");
            Some(SimulatedMotor::new(handle.clone(), travel).spawn())
        }
        None => None,
    };

    let effects = Arc::new(ShellEffects::from_config(&config));
    let controller = DoorController::builder(Arc::new(board), effects)
        .with_config(&config)
        .build();
    controller.light_show().await;

    let _translator = EventTranslator::new(Arc::clone(&controller))
        .spawn()
        .context("Unable to watch inputs")?;

    let acceptor = TlsAcceptor::from_files(&config.key_file, &config.cert_file, &config.client_cert_file)
        .context("TLS setup failed")?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let server = GarageServer::bind(
        addr,
        acceptor,
        Arc::clone(&controller),
        TrustedSubnet::from_config(config.subnet),
    )
    .await?
    .with_ban_time(config.ban_time);

    let shutdown = CancellationToken::new();
    let mut server_task = tokio::spawn(server.run(shutdown.clone()));

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("SIGHUP received");
                reload_config(&args.config, &mut config, &controller);
            }
            _ = interrupt.recv() => break,
            _ = terminate.recv() => break,
            joined = &mut server_task => {
                return match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e).context("Server stopped"),
                    Err(e) => Err(e).context("Server task failed"),
                };
            }
        }
    }

    info!("Shutdown");
    controller.stop_close_task();
    controller.cancel_watchdog();
    shutdown.cancel();
    server_task.await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["garagedoord"]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!args.check_config);
        assert!(args.simulate_motor.is_none());
    }

    #[test]
    fn test_all_flags() {
        let args = Args::try_parse_from([
            "garagedoord",
            "--config",
            "/tmp/gd.conf",
            "--log-level",
            "debug",
            "--check-config",
            "--simulate-motor",
            "5.5",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/tmp/gd.conf"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.check_config);
        assert_eq!(args.simulate_motor, Some(5.5));
    }

    #[rstest]
    #[case(5.0, true)]
    #[case(0.25, true)]
    #[case(-1.0, false)]
    #[case(f64::NAN, false)]
    fn test_motor_travel(#[case] secs: f64, #[case] ok: bool) {
        assert_eq!(motor_travel(secs).is_ok(), ok);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/garagedoor.conf")).unwrap();
        assert_eq!(config, Config::default());
    }
}
