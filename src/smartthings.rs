//! SmartThings TV control.
//!
//! Before the simulator launches, the bay's TV gets switched on through
//! the SmartThings cloud. Two moving parts: a stored OAuth token pair
//! that must be refreshed before use (access tokens expire within a
//! day), and the SmartThings CLI that issues the actual device command.
//! Everything here degrades instead of aborting: the golfer can always
//! reach the TV remote, the simulator launch is what matters.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SmartThingsConfig;

/// SmartThings OAuth2 token endpoint.
const TOKEN_URL: &str = "https://auth-global.api.smartthings.com/oauth/token";

/// Request timeout for the refresh call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variable the SmartThings CLI reads its token from. The
/// token never goes on the command line where process listings could
/// see it.
const TOKEN_ENV_VAR: &str = "SMARTTHINGS_TOKEN";

/// The persisted token pair, sole contents of the auth file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenRecord {
    /// Read the token pair from `path`. `None` for a missing or
    /// unparsable file; both mean the rig was provisioned without TV
    /// control and the caller skips the step.
    pub fn load(path: &Path) -> Option<TokenRecord> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("No readable token file at {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Token file {:?} is not valid JSON: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

/// Why a refresh attempt produced no new token.
#[derive(Debug, Error)]
enum RefreshError {
    #[error("token endpoint returned HTTP {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("could not parse token response: {0}")]
    Parse(String),
}

/// Fields of the refresh response we care about. `access_token` is
/// checked explicitly rather than required by serde, so "parsed but
/// empty" and "malformed" produce distinct log lines.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Exchange the stored refresh token for a fresh access token.
///
/// Returns the record to use for the TV command: the refreshed pair on
/// success (persisted back to `path`), or the original pair untouched
/// when anything about the exchange fails. `None` only when there is
/// no readable token file at all.
pub fn refresh_access_token(
    path: &Path,
    client_id: &str,
    client_secret: &str,
) -> Option<TokenRecord> {
    refresh_against(TOKEN_URL, path, client_id, client_secret)
}

fn refresh_against(
    endpoint: &str,
    path: &Path,
    client_id: &str,
    client_secret: &str,
) -> Option<TokenRecord> {
    let current = TokenRecord::load(path)?;

    match request_refresh(endpoint, &current, client_id, client_secret) {
        Ok(response) => Some(apply_refresh(path, current, response)),
        Err(e) => {
            warn!("Token refresh failed, keeping previous tokens: {}", e);
            Some(current)
        }
    }
}

fn request_refresh(
    endpoint: &str,
    current: &TokenRecord,
    client_id: &str,
    client_secret: &str,
) -> Result<RefreshResponse, RefreshError> {
    let basic = STANDARD.encode(format!("{}:{}", client_id, client_secret));

    let response = ureq::post(endpoint)
        .timeout(HTTP_TIMEOUT)
        .set("Authorization", &format!("Basic {}", basic))
        .send_form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", &current.refresh_token),
        ]);

    match response {
        Ok(resp) => resp
            .into_json::<RefreshResponse>()
            .map_err(|e| RefreshError::Parse(e.to_string())),
        Err(ureq::Error::Status(code, _)) => Err(RefreshError::Status(code)),
        Err(e) => Err(RefreshError::Transport(e.to_string())),
    }
}

/// Fold a parsed response into the stored record. Only a response that
/// actually carries an access token replaces anything; the endpoint may
/// rotate the refresh token, ours is kept when it does not.
fn apply_refresh(path: &Path, current: TokenRecord, response: RefreshResponse) -> TokenRecord {
    let Some(access_token) = response.access_token else {
        warn!("Token endpoint answered without an access token, keeping previous tokens");
        return current;
    };

    let refreshed = TokenRecord {
        access_token,
        refresh_token: response.refresh_token.unwrap_or(current.refresh_token),
    };

    info!("Access token refreshed");
    if let Err(e) = refreshed.save(path) {
        warn!("Could not persist refreshed tokens to {:?}: {}", path, e);
    }
    refreshed
}

/// Outcome of the TV step, for the sequencer's log lines. None of
/// these abort the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TvOutcome {
    /// switch:on accepted by the CLI
    PoweredOn,
    /// no token file on disk, step skipped
    NotProvisioned,
    /// refresh or CLI trouble, run continues without the TV
    Failed,
}

/// TV control boundary, injectable for tests.
pub trait TvControl {
    fn power_on(&mut self, settings: &SmartThingsConfig, auth_file: &Path) -> TvOutcome;
}

/// The real thing: token refresh followed by a CLI invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmartThingsTv;

impl SmartThingsTv {
    pub fn new() -> Self {
        SmartThingsTv
    }
}

impl TvControl for SmartThingsTv {
    fn power_on(&mut self, settings: &SmartThingsConfig, auth_file: &Path) -> TvOutcome {
        let Some(tokens) =
            refresh_access_token(auth_file, &settings.client_id, &settings.client_secret)
        else {
            return TvOutcome::NotProvisioned;
        };

        run_cli(&settings.cli_path, &settings.device_id, &tokens.access_token)
    }
}

fn run_cli(cli_path: &str, device_id: &str, access_token: &str) -> TvOutcome {
    info!("Powering on TV {} via SmartThings CLI", device_id);

    let output = Command::new(cli_path)
        .env(TOKEN_ENV_VAR, access_token)
        .args(["devices:commands", device_id, "switch:on"])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            info!("TV power-on command accepted");
            TvOutcome::PoweredOn
        }
        Ok(out) => {
            warn!(
                "SmartThings CLI exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
            TvOutcome::Failed
        }
        Err(e) => {
            warn!("Could not run SmartThings CLI {:?}: {}", cli_path, e);
            TvOutcome::Failed
        }
    }
}
