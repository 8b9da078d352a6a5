//! Bootstrap configuration and root folder resolution
//!
//! Resolution priority for every bootstrap value:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal; the service starts on defaults
//! and says so in the log. A missing Gemini API key *is* fatal.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TUTOR_ROOT_FOLDER";
/// Environment variable carrying the Gemini API key
pub const GEMINI_API_KEY_ENV: &str = "TUTOR_GEMINI_API_KEY";
/// Environment variable naming the administrator identity
pub const ADMIN_EMAIL_ENV: &str = "TUTOR_ADMIN_EMAIL";

/// Value shipped in sample configs; treated as "not configured"
pub const API_KEY_PLACEHOLDER: &str = "PLACEHOLDER_FOR_API_KEY";

pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-09-2025:generateContent";

const APP_DIR: &str = "tutor-gate";
const DATABASE_FILE: &str = "tutor.db";

/// Bootstrap configuration loaded from TOML
///
/// Every field has a compiled default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding `tutor.db`
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Interface the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible URL, used to build referral links
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Identity allowed on the admin dashboard
    #[serde(default)]
    pub admin_email: Option<String>,

    /// Minutes a session token may sit unused before it is dropped
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            admin_email: None,
            session_idle_minutes: default_session_idle_minutes(),
            logging: LoggingConfig::default(),
            quota: QuotaConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (stderr when absent)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Daily allowance policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Free requests per calendar day for every user
    #[serde(default = "default_daily_base_allowance")]
    pub daily_base_allowance: u32,

    /// Permanent daily bonus credited to a referrer per referred signup
    #[serde(default = "default_referral_bonus")]
    pub referral_bonus: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_base_allowance: default_daily_base_allowance(),
            referral_bonus: default_referral_bonus(),
        }
    }
}

/// Gemini provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; `TUTOR_GEMINI_API_KEY` takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    /// `generateContent` endpoint of the model in use
    #[serde(default = "default_gemini_api_url")]
    pub api_url: String,

    /// Total attempts per generation, first one included
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; attempt `n` failing waits `backoff_base_ms * 2^n`
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Per-attempt HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_gemini_api_url(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_public_base_url() -> String {
    format!("http://127.0.0.1:{}", default_port())
}

fn default_session_idle_minutes() -> u64 {
    12 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_daily_base_allowance() -> u32 {
    5
}

fn default_referral_bonus() -> u32 {
    10
}

fn default_gemini_api_url() -> String {
    DEFAULT_GEMINI_API_URL.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Load the TOML config, falling back to defaults when it is missing.
///
/// `explicit` is the `--config` argument; without it the platform config
/// directory is consulted. A file that exists but fails to parse is an error:
/// silently ignoring a broken config would hide the mistake.
pub fn load_config_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };

    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file not found at {}, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("No config directory on this platform, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// `<config_dir>/tutor-gate/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Resolve the root folder (CLI → ENV → TOML → OS default)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./tutor_data"))
}

/// Database file inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Create the root folder if missing
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(())
}

/// Resolve the Gemini API key (ENV → TOML)
///
/// Missing, blank and placeholder keys are all configuration errors;
/// the service cannot do anything useful without one.
pub fn resolve_gemini_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(GEMINI_API_KEY_ENV).ok();
    let toml_key = toml_config.gemini.api_key.clone();

    if let (Some(env), Some(file)) = (&env_key, &toml_key) {
        if is_valid_key(env) && is_valid_key(file) {
            warn!("Gemini API key found in environment and TOML. Using environment.");
        }
    }

    if let Some(key) = env_key.filter(|k| is_valid_key(k)) {
        info!("Gemini API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key.filter(|k| is_valid_key(k)) {
        info!("Gemini API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "Gemini API key not configured. Provide it using one of:\n\
         1. Environment: {GEMINI_API_KEY_ENV}=your-key\n\
         2. TOML config: [gemini] api_key = \"your-key\""
    )))
}

/// Resolve the administrator identity (ENV → TOML), lower-cased
pub fn resolve_admin_email(toml_config: &TomlConfig) -> Option<String> {
    std::env::var(ADMIN_EMAIL_ENV)
        .ok()
        .or_else(|| toml_config.admin_email.clone())
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
}

/// Non-empty, non-whitespace and not the shipped placeholder
pub fn is_valid_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != API_KEY_PLACEHOLDER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("AIza-something"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
        assert!(!is_valid_key(API_KEY_PLACEHOLDER));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 5740);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.quota.daily_base_allowance, 5);
        assert_eq!(config.quota.referral_bonus, 10);
        assert_eq!(config.gemini.max_retries, 3);
        assert_eq!(config.gemini.backoff_base_ms, 1000);
        assert_eq!(config.gemini.api_url, DEFAULT_GEMINI_API_URL);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.session_idle_minutes, 720);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 8080
            session_idle_minutes = 30
            [quota]
            referral_bonus = 3
            [gemini]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_idle_minutes, 30);
        assert_eq!(config.quota.referral_bonus, 3);
        assert_eq!(config.quota.daily_base_allowance, 5);
        assert_eq!(config.gemini.max_retries, 5);
        assert_eq!(config.gemini.request_timeout_secs, 60);
    }

    #[test]
    fn test_database_path_is_inside_root() {
        let root = PathBuf::from("/srv/tutor");
        assert_eq!(database_path(&root), PathBuf::from("/srv/tutor/tutor.db"));
    }
}
