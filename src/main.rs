//! Bay Launcher - golf-simulator bay startup sequencer
//!
//! Runs once at bay power-on (scheduled task at logon): waits for the
//! network, powers the TV on through SmartThings, starts the ProTee
//! simulator and arranges its windows. Exit code 0 when the simulator
//! is up, 1 on any fatal error.
//!
//! Keeps the console subsystem on purpose: the run log is mirrored
//! there, and a tech launching it by hand gets to read the error
//! before the window closes.

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use bay_launcher::config::LaunchConfig;
use bay_launcher::logging;
use bay_launcher::net::PingProbe;
use bay_launcher::process::SystemProcesses;
use bay_launcher::sequence::{run_sequence, SequenceDeps};
use bay_launcher::smartthings::SmartThingsTv;
use bay_launcher::window::SystemWindows;

#[derive(Parser, Debug)]
#[command(
    name = "bay_launcher",
    version,
    about = "Startup sequencer for a golf-simulator bay"
)]
struct Args {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Config errors surface on stderr only: the log directory comes
    // out of the very file that failed to load.
    let config_path = args.config.unwrap_or_else(LaunchConfig::default_path);
    let config = match LaunchConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            let report = anyhow::Error::new(e).context("could not load configuration");
            eprintln!("{:#}", report);
            pause_if_interactive();
            return ExitCode::FAILURE;
        }
    };

    let log_path = logging::init_logging(&config.paths.log_dir);
    tracing::info!("Bay launcher {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Using configuration {:?}", config_path);
    if let Some(path) = &log_path {
        tracing::info!("Run log at {:?}", path);
    }

    let mut ping = PingProbe::new(ping_timeout(&config));
    let mut procs = SystemProcesses::new();
    let mut windows = SystemWindows::new();
    let mut tv = SmartThingsTv::new();
    let mut deps = SequenceDeps {
        net: &mut ping,
        procs: &mut procs,
        windows: &mut windows,
        tv: &mut tv,
    };

    match run_sequence(&config, &mut deps) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = anyhow::Error::new(e).context("startup sequence failed");
            tracing::error!("{:#}", report);
            pause_if_interactive();
            ExitCode::FAILURE
        }
    }
}

/// Echo timeout per network probe: the configured retry interval, at
/// least one second.
fn ping_timeout(config: &LaunchConfig) -> Duration {
    config.network.retry_interval().max(Duration::from_secs(1))
}

/// Scheduled runs exit straight away; an operator who double-clicked
/// the exe gets to read the error first.
fn pause_if_interactive() {
    if !std::io::stdin().is_terminal() || !std::io::stderr().is_terminal() {
        return;
    }
    eprintln!("Press Enter to close...");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_config_flag() {
        let args = Args::parse_from(["bay_launcher", "--config", "C:/rig/config.json"]);
        assert_eq!(args.config, Some(PathBuf::from("C:/rig/config.json")));
    }

    #[test]
    fn test_config_flag_optional() {
        let args = Args::parse_from(["bay_launcher"]);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_ping_timeout_floor() {
        let mut config = LaunchConfig::default();
        config.network.retry_interval_seconds = 0;
        assert_eq!(ping_timeout(&config), Duration::from_secs(1));

        config.network.retry_interval_seconds = 5;
        assert_eq!(ping_timeout(&config), Duration::from_secs(5));
    }
}
