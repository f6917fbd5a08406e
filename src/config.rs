//! Configuration for the bay launcher.
//!
//! A single `config.json` drives every step of the startup sequence:
//! SmartThings credentials for the TV, filesystem paths, and the retry
//! budgets for the network and window waits. The file is read once at
//! startup and never written back.
//!
//! Keys use camelCase to match the file format the rig was provisioned
//! with, e.g.:
//!
//! ```json
//! {
//!   "smartThings": { "enabled": true, "deviceId": "..." },
//!   "paths": { "proteeLabsExe": "C:/ProteeLabs/ProteeLabs.exe" },
//!   "network": { "maxRetries": 30, "retryIntervalSeconds": 2 },
//!   "window": { "processTimeoutSeconds": 30, "pollIntervalSeconds": 1 }
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while loading the configuration file.
///
/// A missing file and malformed JSON are the usual two; any other read
/// failure keeps its own I/O message. All of them are fatal to the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {path:?}")]
    NotFound { path: PathBuf },
    #[error("could not read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse configuration file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level configuration, one section per concern.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchConfig {
    pub smart_things: SmartThingsConfig,
    pub paths: PathsConfig,
    pub network: NetworkConfig,
    pub window: WindowConfig,
}

/// SmartThings TV control settings.
///
/// The whole section is optional behavior: with `enabled` false the TV
/// step is skipped, and empty credential fields downgrade it to a
/// skip-with-warning at run time rather than a load error.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartThingsConfig {
    /// Whether to attempt TV power-on at all
    pub enabled: bool,
    /// OAuth client id issued for the rig
    pub client_id: String,
    /// OAuth client secret issued for the rig
    pub client_secret: String,
    /// Device id of the bay's television
    pub device_id: String,
    /// Path to the SmartThings CLI executable
    pub cli_path: String,
}

impl Default for SmartThingsConfig {
    fn default() -> Self {
        SmartThingsConfig {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            device_id: String::new(),
            cli_path: String::new(),
        }
    }
}

/// Filesystem locations used by the sequence.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct PathsConfig {
    /// Directory receiving the per-run log files
    pub log_dir: PathBuf,
    /// The simulator executable to launch
    pub protee_labs_exe: PathBuf,
    /// JSON file holding the SmartThings token pair
    pub auth_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            log_dir: PathBuf::from("logs"),
            protee_labs_exe: PathBuf::from("ProteeLabs.exe"),
            auth_file: PathBuf::from("smartthings_tokens.json"),
        }
    }
}

/// Retry budget for the network reachability wait.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    /// Total probe attempts before giving up (fatal)
    pub max_retries: u32,
    /// Fixed sleep between attempts, in seconds
    pub retry_interval_seconds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            max_retries: 30,
            retry_interval_seconds: 2,
        }
    }
}

impl NetworkConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }
}

/// Timeout budget for the process and window waits after launch.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowConfig {
    /// Overall time to wait for the simulator window, in seconds
    pub process_timeout_seconds: u64,
    /// Fixed sleep between window polls, in seconds
    pub poll_interval_seconds: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            process_timeout_seconds: 30,
            poll_interval_seconds: 1,
        }
    }
}

impl WindowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_seconds)
    }

    /// Attempt ceiling for the window-phase polls, derived from the
    /// timeout and the poll interval. Always at least one attempt.
    pub fn max_attempts(&self) -> u32 {
        let interval = self.poll_interval().as_secs().max(1);
        (self.process_timeout().as_secs() / interval).max(1) as u32
    }
}

impl LaunchConfig {
    /// Load the configuration from `path`.
    ///
    /// The file must exist and parse; there is no schema validation
    /// beyond that. Unknown keys are ignored and missing sections fall
    /// back to defaults so a partial file still loads.
    pub fn load(path: &Path) -> Result<LaunchConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default location used when no `--config` flag is given:
    /// the platform config directory (%APPDATA%/BayLauncher/ on
    /// Windows), falling back to the working directory.
    pub fn default_path() -> PathBuf {
        match ProjectDirs::from("", "", "BayLauncher") {
            Some(dirs) => dirs.config_dir().join("config.json"),
            None => PathBuf::from("config.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LaunchConfig::default();
        assert!(!config.smart_things.enabled);
        assert_eq!(config.network.max_retries, 30);
        assert_eq!(config.network.retry_interval_seconds, 2);
        assert_eq!(config.window.process_timeout_seconds, 30);
        assert_eq!(config.window.poll_interval_seconds, 1);
        assert_eq!(config.window.process_timeout(), Duration::from_secs(30));
        assert_eq!(config.window.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_full_document() {
        let json = r#"{
            "smartThings": {
                "enabled": true,
                "clientId": "abc",
                "clientSecret": "shh",
                "deviceId": "tv-1",
                "cliPath": "C:/Tools/smartthings.exe"
            },
            "paths": {
                "logDir": "C:/Rig/logs",
                "proteeLabsExe": "C:/ProteeLabs/ProteeLabs.exe",
                "authFile": "C:/Rig/tokens.json"
            },
            "network": { "maxRetries": 5, "retryIntervalSeconds": 3 },
            "window": { "processTimeoutSeconds": 20, "pollIntervalSeconds": 2 }
        }"#;

        let config: LaunchConfig = serde_json::from_str(json).unwrap();
        assert!(config.smart_things.enabled);
        assert_eq!(config.smart_things.client_id, "abc");
        assert_eq!(config.smart_things.device_id, "tv-1");
        assert_eq!(config.paths.log_dir, PathBuf::from("C:/Rig/logs"));
        assert_eq!(config.network.max_retries, 5);
        assert_eq!(config.window.max_attempts(), 10);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let json = r#"{ "network": { "maxRetries": 2 } }"#;
        let config: LaunchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.network.max_retries, 2);
        // untouched sections keep their defaults
        assert_eq!(config.network.retry_interval_seconds, 2);
        assert_eq!(config.window.process_timeout_seconds, 30);
        assert!(!config.smart_things.enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let err = LaunchConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_unreadable_path_is_not_reported_missing() {
        // a directory opens but cannot be read as a file, and that
        // must not surface as "not found"
        let dir = tempfile::tempdir().unwrap();
        let err = LaunchConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{{ not json").unwrap();

        let err = LaunchConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_max_attempts_never_zero() {
        let window = WindowConfig {
            process_timeout_seconds: 0,
            poll_interval_seconds: 0,
        };
        assert_eq!(window.max_attempts(), 1);

        let window = WindowConfig {
            process_timeout_seconds: 30,
            poll_interval_seconds: 0,
        };
        // zero interval polls as fast as possible, budget counts whole seconds
        assert_eq!(window.max_attempts(), 30);
    }
}
