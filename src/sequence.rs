//! The startup sequence itself.
//!
//! Strict step order: network wait, TV power-on, simulator launch,
//! process wait, window wait, then minimize and focus. The abort
//! policy lives entirely here: an unreachable network or a failed
//! launch ends the run, everything else logs a warning and carries on.
//! All OS boundaries come in through `SequenceDeps`, so the whole
//! sequence runs against scripted implementations in tests.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LaunchConfig;
use crate::net::{self, Connectivity};
use crate::poll::{PollOutcome, RetryPolicy};
use crate::process::{self, LaunchError, ProcessHandle, ProcessOps};
use crate::smartthings::{TvControl, TvOutcome};
use crate::window::WindowOps;

/// Errors that abort the startup sequence.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("network unreachable after {attempts} attempts")]
    NetworkUnreachable { attempts: u32 },
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Capability bundle for one run. Production wires the real OS
/// implementations, tests substitute scripted ones.
pub struct SequenceDeps<'a> {
    pub net: &'a mut dyn Connectivity,
    pub procs: &'a mut dyn ProcessOps,
    pub windows: &'a mut dyn WindowOps,
    pub tv: &'a mut dyn TvControl,
}

/// Run the whole startup sequence against an already loaded config.
pub fn run_sequence(config: &LaunchConfig, deps: &mut SequenceDeps) -> Result<(), FatalError> {
    let network_policy = RetryPolicy::new(
        config.network.max_retries,
        config.network.retry_interval(),
    );

    info!("Waiting for network connectivity");
    if net::wait_for_network(deps.net, network_policy) == PollOutcome::TimedOut {
        return Err(FatalError::NetworkUnreachable {
            attempts: network_policy.max_attempts,
        });
    }

    run_tv_step(config, deps.tv);

    info!("Launching simulator {:?}", config.paths.protee_labs_exe);
    process::launch(&config.paths.protee_labs_exe)?;

    run_window_phase(config, deps);

    info!("Startup sequence complete");
    Ok(())
}

/// TV power-on, best-effort. A disabled toggle skips quietly, missing
/// credentials downgrade the step to a warning.
fn run_tv_step(config: &LaunchConfig, tv: &mut dyn TvControl) {
    let settings = &config.smart_things;
    if !settings.enabled {
        debug!("SmartThings TV control disabled");
        return;
    }
    if settings.client_id.is_empty()
        || settings.client_secret.is_empty()
        || settings.device_id.is_empty()
        || settings.cli_path.is_empty()
    {
        warn!("SmartThings enabled but credentials are incomplete, skipping TV power-on");
        return;
    }

    match tv.power_on(settings, &config.paths.auth_file) {
        TvOutcome::PoweredOn => info!("TV is on"),
        TvOutcome::NotProvisioned => warn!("No SmartThings token file, skipping TV power-on"),
        TvOutcome::Failed => warn!("TV power-on failed, continuing without it"),
    }
}

/// Wait for the simulator to appear in the process table and grow a
/// window, then arrange its windows. Nothing in here can fail the run;
/// the launch already succeeded.
fn run_window_phase(config: &LaunchConfig, deps: &mut SequenceDeps) {
    let name = match config.paths.protee_labs_exe.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => {
            warn!("Executable path has no file name, skipping window management");
            return;
        }
    };

    let policy = RetryPolicy::new(config.window.max_attempts(), config.window.poll_interval());

    info!("Waiting for process {}", name);
    let process = match process::wait_for_process(deps.procs, &name, policy) {
        PollOutcome::Succeeded(process) => process,
        PollOutcome::TimedOut => {
            warn!(
                "Process {} never showed up, skipping window management",
                name
            );
            return;
        }
    };

    let process = process::wait_for_window(deps.windows, process, policy);
    arrange_windows(deps.windows, process);
}

/// Minimize the launcher window the simulator opens first, then bring
/// whatever window the process considers main now to the foreground.
/// With no handle there is nothing to arrange.
fn arrange_windows(windows: &mut dyn WindowOps, process: ProcessHandle) {
    if process.window.is_null() {
        info!(
            "No window handle for pid {}, leaving windows alone",
            process.pid
        );
        return;
    }

    if windows.minimize(process.window) {
        info!("Minimized window {:#x}", process.window.0);
    } else {
        warn!("Could not minimize window {:#x}", process.window.0);
    }

    let next = windows.main_window(process.pid);
    if next.is_null() {
        info!("No further window to focus for pid {}", process.pid);
        return;
    }

    if windows.focus(next) {
        info!("Focused window {:#x}", next.0);
    } else {
        warn!("Could not focus window {:#x}", next.0);
    }
}
