//! Launching and finding the simulator process.
//!
//! Launch failures abort the run; everything after the spawn is the
//! cosmetic window phase and degrades to warnings. The launched child
//! is never waited on, because the simulator's own launcher respawns
//! itself and the first child exits almost immediately. The process
//! table is the source of truth instead.

use std::path::{Path, PathBuf};
use std::process::Command;

use sysinfo::System;
use thiserror::Error;
use tracing::{info, warn};

use crate::poll::{poll_until, PollOutcome, RetryPolicy};
use crate::window::{WindowHandle, WindowOps};

/// Failures while starting the simulator executable. Both are fatal.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("executable not found: {path:?}")]
    ExecutableNotFound { path: PathBuf },
    #[error("failed to launch {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A launched or discovered simulator process. Transient: the window
/// handle is re-queried per poll because it rarely exists at launch
/// time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub window: WindowHandle,
}

impl ProcessHandle {
    pub fn new(pid: u32) -> Self {
        ProcessHandle {
            pid,
            window: WindowHandle::NULL,
        }
    }

    pub fn with_window(pid: u32, window: WindowHandle) -> Self {
        ProcessHandle { pid, window }
    }
}

/// Process-table lookup, injectable for tests.
pub trait ProcessOps {
    /// Pid of a running process whose executable name matches `name`,
    /// case-insensitive, with or without the `.exe` suffix.
    fn find_pid(&mut self, name: &str) -> Option<u32>;
}

/// The real process table.
pub struct SystemProcesses {
    system: System,
}

impl SystemProcesses {
    pub fn new() -> Self {
        SystemProcesses {
            system: System::new(),
        }
    }
}

impl Default for SystemProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessOps for SystemProcesses {
    fn find_pid(&mut self, name: &str) -> Option<u32> {
        self.system.refresh_processes();
        let want = bare_name(name);
        self.system.processes().iter().find_map(|(pid, process)| {
            bare_name(process.name())
                .eq_ignore_ascii_case(want)
                .then(|| pid.as_u32())
        })
    }
}

/// Executable name without a trailing `.exe`, so config values and
/// process-table entries compare the same on every platform.
fn bare_name(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() > 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b".exe") {
        &name[..name.len() - 4]
    } else {
        name
    }
}

/// Start the simulator executable, detached.
pub fn launch(executable: &Path) -> Result<ProcessHandle, LaunchError> {
    if !executable.exists() {
        return Err(LaunchError::ExecutableNotFound {
            path: executable.to_path_buf(),
        });
    }

    let mut command = Command::new(executable);
    // Sims load assets relative to their install directory
    if let Some(dir) = executable.parent().filter(|p| !p.as_os_str().is_empty()) {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|source| LaunchError::Spawn {
        path: executable.to_path_buf(),
        source,
    })?;

    info!("Launched {:?} (pid {})", executable, child.id());
    Ok(ProcessHandle::new(child.id()))
}

/// Poll the process table until a process named `name` shows up.
pub fn wait_for_process(
    procs: &mut dyn ProcessOps,
    name: &str,
    policy: RetryPolicy,
) -> PollOutcome<ProcessHandle> {
    poll_until(policy, |attempt| match procs.find_pid(name) {
        Some(pid) => {
            info!("Process {} is running (pid {})", name, pid);
            Some(ProcessHandle::new(pid))
        }
        None => {
            info!(
                "Process {} not running yet (attempt {}/{})",
                name, attempt, policy.max_attempts
            );
            None
        }
    })
}

/// Poll for the process's main window.
///
/// This wait never times out to the caller: if the handle never shows
/// up, the process handle goes back unchanged with a `NULL` window and
/// downstream steps skip themselves instead of aborting. The launch
/// already succeeded at this point and the window phase is cosmetic.
pub fn wait_for_window(
    windows: &mut dyn WindowOps,
    process: ProcessHandle,
    policy: RetryPolicy,
) -> ProcessHandle {
    let outcome = poll_until(policy, |attempt| {
        let window = windows.main_window(process.pid);
        if window.is_null() {
            info!(
                "No main window for pid {} yet (attempt {}/{})",
                process.pid, attempt, policy.max_attempts
            );
            None
        } else {
            info!("Main window for pid {} is {:#x}", process.pid, window.0);
            Some(ProcessHandle::with_window(process.pid, window))
        }
    });

    match outcome {
        PollOutcome::Succeeded(found) => found,
        PollOutcome::TimedOut => {
            warn!(
                "No window appeared for pid {} within the timeout, continuing without one",
                process.pid
            );
            process
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedProcs {
        answers: VecDeque<Option<u32>>,
        calls: u32,
    }

    impl ProcessOps for ScriptedProcs {
        fn find_pid(&mut self, _name: &str) -> Option<u32> {
            self.calls += 1;
            self.answers.pop_front().flatten()
        }
    }

    struct ScriptedWindows {
        answers: VecDeque<WindowHandle>,
        calls: u32,
    }

    impl WindowOps for ScriptedWindows {
        fn main_window(&mut self, _pid: u32) -> WindowHandle {
            self.calls += 1;
            self.answers.pop_front().unwrap_or(WindowHandle::NULL)
        }

        fn minimize(&mut self, _window: WindowHandle) -> bool {
            unreachable!("wait_for_window never issues commands")
        }

        fn focus(&mut self, _window: WindowHandle) -> bool {
            unreachable!("wait_for_window never issues commands")
        }
    }

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn test_bare_name() {
        assert_eq!(bare_name("ProteeLabs.exe"), "ProteeLabs");
        assert_eq!(bare_name("ProteeLabs.EXE"), "ProteeLabs");
        assert_eq!(bare_name("ProteeLabs"), "ProteeLabs");
        // a bare extension is a name, not a suffix to strip
        assert_eq!(bare_name(".exe"), ".exe");
    }

    #[test]
    fn test_launch_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ProteeLabs.exe");
        let err = launch(&path).unwrap_err();
        assert!(matches!(err, LaunchError::ExecutableNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_detached() {
        let exe = Path::new("/bin/true");
        if !exe.exists() {
            return;
        }
        let handle = launch(exe).unwrap();
        assert!(handle.pid > 0);
        assert!(handle.window.is_null());
    }

    #[test]
    fn test_wait_for_process_found_later() {
        let mut procs = ScriptedProcs {
            answers: VecDeque::from([None, Some(4242)]),
            calls: 0,
        };
        let outcome = wait_for_process(&mut procs, "ProteeLabs.exe", instant(5));
        assert_eq!(outcome, PollOutcome::Succeeded(ProcessHandle::new(4242)));
        assert_eq!(procs.calls, 2);
    }

    #[test]
    fn test_wait_for_process_times_out() {
        let mut procs = ScriptedProcs {
            answers: VecDeque::new(),
            calls: 0,
        };
        let outcome = wait_for_process(&mut procs, "ProteeLabs.exe", instant(3));
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(procs.calls, 3);
    }

    #[test]
    fn test_wait_for_window_found() {
        let mut windows = ScriptedWindows {
            answers: VecDeque::from([WindowHandle::NULL, WindowHandle(0xbeef)]),
            calls: 0,
        };
        let found = wait_for_window(&mut windows, ProcessHandle::new(7), instant(5));
        assert_eq!(found, ProcessHandle::with_window(7, WindowHandle(0xbeef)));
        assert_eq!(windows.calls, 2);
    }

    #[test]
    fn test_wait_for_window_timeout_keeps_process() {
        let mut windows = ScriptedWindows {
            answers: VecDeque::new(),
            calls: 0,
        };
        let process = ProcessHandle::new(7);
        let found = wait_for_window(&mut windows, process, instant(4));
        // the process survives the timeout, just with no window
        assert_eq!(found, process);
        assert!(found.window.is_null());
        assert_eq!(windows.calls, 4);
    }
}
