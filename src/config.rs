use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

const DEFAULT_DATA_STORE: &str = "climate_history.csv";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_REQUEST_PACING_MS: u64 = 150;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;
const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WEATHER_API_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_AIR_QUALITY_API_URL: &str =
    "https://air-quality-api.open-meteo.com/v1/air-quality";

/// Application configuration, parsed from environment variables once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Append-only CSV record store.
    pub data_store: PathBuf,
    /// Optional `City,Lat,Lon` file. `None` polls the built-in target list.
    pub targets_file: Option<PathBuf>,
    pub poll_interval: Duration,
    /// Throttle awaited before every remote call.
    pub request_pacing: Duration,
    pub request_timeout: Duration,
    pub weather_api_url: String,
    pub air_quality_api_url: String,
    pub user_agent: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. `from_env` is the production entry point.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let poll_interval_secs = parse_nonzero(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let request_timeout_ms = parse_nonzero(&lookup, "REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;

        Ok(Self {
            data_store: lookup("DATA_STORE")
                .unwrap_or_else(|| DEFAULT_DATA_STORE.to_string())
                .into(),
            targets_file: lookup("TARGETS_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            poll_interval: Duration::from_secs(poll_interval_secs),
            request_pacing: Duration::from_millis(parse_var(
                &lookup,
                "REQUEST_PACING_MS",
                DEFAULT_REQUEST_PACING_MS,
            )?),
            request_timeout: Duration::from_millis(request_timeout_ms),
            weather_api_url: lookup("WEATHER_API_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_API_URL.to_string()),
            air_quality_api_url: lookup("AIR_QUALITY_API_URL")
                .unwrap_or_else(|| DEFAULT_AIR_QUALITY_API_URL.to_string()),
            user_agent: lookup("USER_AGENT").unwrap_or_else(|| {
                format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            }),
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
/// A set-but-unparsable value is an error rather than a silent default.
fn parse_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            value,
        }),
    }
}

/// Like `parse_var`, but 0 is rejected: a zero interval would spin and a
/// zero timeout would fail every request.
fn parse_nonzero<F>(lookup: &F, var: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var(lookup, var, default)? {
        0 => Err(ConfigError::Invalid {
            var: var.to_string(),
            value: "0".to_string(),
        }),
        n => Ok(n),
    }
}
