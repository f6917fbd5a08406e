//! Run logging.
//!
//! Every run appends to its own timestamped file under the configured
//! log directory and mirrors to the console when one is attached, so a
//! tech watching the bay boot sees the same lines that land on disk.
//! Logging trouble never stops a run: if the file cannot be opened the
//! subscriber falls back to console only.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct TeeMakeWriter {
    file: Arc<Mutex<File>>,
    console: bool,
}

struct TeeWriterGuard {
    file: Arc<Mutex<File>>,
    console: bool,
}

impl Write for TeeWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.console {
            let _ = io::stderr().write_all(buf);
        }
        let mut locked = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        locked.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            let _ = io::stderr().flush();
        }
        let mut locked = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        locked.flush()
    }
}

impl<'a> MakeWriter<'a> for TeeMakeWriter {
    type Writer = TeeWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriterGuard {
            file: Arc::clone(&self.file),
            console: self.console,
        }
    }
}

/// Install the global subscriber for this run.
///
/// Returns the path of the run's log file, `None` when the file could
/// not be created and logging went console-only. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_logging(log_dir: &Path) -> Option<PathBuf> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_path = run_log_path(log_dir);
    let file = match open_log_file(&log_path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to open log file {}: {err}", log_path.display());
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .init();
            return None;
        }
    };

    let make_writer = TeeMakeWriter {
        file: Arc::new(Mutex::new(file)),
        console: io::stderr().is_terminal(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(make_writer)
        .with_ansi(false)
        .init();

    Some(log_path)
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// One file per run: `launch_YYYYMMDD_HHMMSS.log` under the configured
/// directory.
fn run_log_path(log_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("launch_{}.log", stamp))
}
