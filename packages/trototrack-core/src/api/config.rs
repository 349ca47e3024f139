use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the classification service
const DEFAULT_SCAN_URL: &str = "https://scan.trototrack.app";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_WAIT_MS: u64 = 2000;

/// Environment variable name for scan URL override
pub const ENV_SCAN_URL: &str = "TROTOTRACK_SCAN_URL";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    api: Option<ApiSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiSection {
    scan_url: Option<String>,
    timeout_secs: Option<u64>,
    token_wait_ms: Option<u64>,
    authorize_scan: Option<bool>,
}

/// Runtime endpoint configuration
#[derive(Debug, Clone)]
pub struct ApiEndpointConfig {
    /// Base URL the `predict` route is joined to
    pub scan_url: String,
    /// Bound on one full HTTP exchange
    pub timeout: Duration,
    /// Bound on reading the token before a scan
    pub token_wait: Duration,
    /// Whether scan requests carry the bearer header
    pub authorize_scan: bool,
    /// Where the scan URL came from (for display)
    pub source: ConfigSource,
}

impl Default for ApiEndpointConfig {
    fn default() -> Self {
        Self {
            scan_url: DEFAULT_SCAN_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            token_wait: Duration::from_millis(DEFAULT_TOKEN_WAIT_MS),
            authorize_scan: true,
            source: ConfigSource::Default,
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Default,
    Environment,
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    crate::auth::get_config_dir()
        .ok()
        .map(|dir| dir.join("config.toml"))
}

fn load_config_file(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    (!url.is_empty()).then(|| url.to_string())
}

/// Load endpoint configuration with priority:
/// 1. Environment variable (TROTOTRACK_SCAN_URL)
/// 2. Config file (~/.config/trototrack/config.toml)
/// 3. Default values
pub fn load_api_config() -> ApiEndpointConfig {
    let file = get_config_file_path().and_then(|p| load_config_file(&p));
    resolve_api_config(std::env::var(ENV_SCAN_URL).ok(), file)
}

/// Load endpoint configuration from an explicit config file path.
pub fn load_api_config_from(path: &Path) -> ApiEndpointConfig {
    resolve_api_config(std::env::var(ENV_SCAN_URL).ok(), load_config_file(path))
}

fn resolve_api_config(env_scan: Option<String>, file: Option<ConfigFile>) -> ApiEndpointConfig {
    let mut config = ApiEndpointConfig::default();
    let section = file.and_then(|f| f.api).unwrap_or_default();

    // Tuning values only come from the file
    if let Some(secs) = section.timeout_secs.filter(|s| *s > 0) {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = section.token_wait_ms {
        config.token_wait = Duration::from_millis(ms);
    }
    if let Some(authorize) = section.authorize_scan {
        config.authorize_scan = authorize;
    }

    if let Some(scan) = env_scan.as_deref().and_then(normalize_url) {
        tracing::info!("Using scan URL from environment variable: {}", scan);
        config.scan_url = scan;
        config.source = ConfigSource::Environment;
    } else if let Some(scan) = section.scan_url.as_deref().and_then(normalize_url) {
        tracing::info!("Using scan URL from config file: {}", scan);
        config.scan_url = scan;
        config.source = ConfigSource::ConfigFile;
    }

    tracing::debug!("Scan endpoint: {} (from {})", config.scan_url, config.source);
    config
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/trototrack/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# TrotoTrack Configuration
# Place this file at: ~/.config/trototrack/config.toml

[api]
# Base URL of the classification service (requests go to <scan_url>/predict)
# scan_url = "https://scan.trototrack.app"

# Seconds before a request is abandoned
# timeout_secs = 30

# Milliseconds to wait for a session token before scanning without one
# token_wait_ms = 2000

# Send the bearer token with scan requests
# authorize_scan = true
"#
    .to_string()
}
