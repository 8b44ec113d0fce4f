//! Configuration loading and TOML persistence
//!
//! Every field carries a default so an empty (or missing) file yields a
//! usable configuration. Secrets may live in the file, so writes are atomic
//! and restricted to the owner on Unix.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// User agent sent to MusicBrainz and the Cover Art Archive unless overridden
pub const DEFAULT_USER_AGENT: &str = concat!(
    "albumscan/",
    env!("CARGO_PKG_VERSION"),
    " ( albumscan@users.noreply.github.com )"
);

/// Root TOML configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// SQLite database file for the album store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Backend used to identify the photographed cover
    #[serde(default = "ProviderConfig::identification_default")]
    pub identification: ProviderConfig,
    /// Backend used to write the review
    #[serde(default = "ProviderConfig::review_default")]
    pub review: ProviderConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub artwork: ArtworkConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            logging: LoggingConfig::default(),
            identification: ProviderConfig::identification_default(),
            review: ProviderConfig::review_default(),
            catalog: CatalogConfig::default(),
            artwork: ArtworkConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include the event target (module path) in each line
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            show_target: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Named identification/review backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Environment variable consulted before the TOML `api_key`
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "ALBUMSCAN_OPENAI_API_KEY",
            ProviderKind::Gemini => "ALBUMSCAN_GEMINI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Gemini => "gemini-1.5-pro",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identification or review backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model name; backend default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// API base URL; backend default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key (environment variable takes precedence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Whole-request timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    fn identification_default() -> Self {
        Self::default()
    }

    fn review_default() -> Self {
        Self {
            timeout_secs: 45,
            ..Self::default()
        }
    }

    pub fn model_or_default(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn base_url_or_default(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_provider_timeout_secs() -> u64 {
    60
}

/// MusicBrainz search and artwork-presence probing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub musicbrainz_url: String,
    pub cover_art_url: String,
    pub user_agent: String,
    /// Maximum candidates requested per search
    pub search_limit: usize,
    pub search_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Number of ranked candidates probed for artwork
    pub probe_depth: usize,
    /// Total search attempts (first try included)
    pub max_attempts: u32,
    /// Wait after HTTP 503 before retrying
    pub unavailable_backoff_ms: u64,
    /// Wait after a transport error before retrying
    pub transport_backoff_ms: u64,
    /// Pause preceding every outbound search call
    pub courtesy_delay_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            musicbrainz_url: "https://musicbrainz.org/ws/2".to_string(),
            cover_art_url: "https://coverartarchive.org".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            search_limit: 10,
            search_timeout_secs: 10,
            probe_timeout_secs: 3,
            probe_depth: 5,
            max_attempts: 2,
            unavailable_backoff_ms: 2000,
            transport_backoff_ms: 1000,
            courtesy_delay_ms: 100,
        }
    }
}

/// Cover image download and thumbnail rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtworkConfig {
    pub cover_art_url: String,
    pub user_agent: String,
    /// Edge length of the square thumbnail in pixels
    pub thumbnail_edge_px: u32,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            cover_art_url: "https://coverartarchive.org".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            thumbnail_edge_px: 300,
        }
    }
}

/// Scan orchestration tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Minimum time a UI-facing state is shown before advancing
    pub min_state_dwell_ms: u64,
    /// Broadcast buffer for scan events
    pub event_capacity: usize,
    /// Upper bound on one identification round
    pub identification_timeout_secs: u64,
    /// Records attempted more recently than this are skipped by the retry pass
    pub retry_cooldown_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_state_dwell_ms: 500,
            event_capacity: 64,
            identification_timeout_secs: 60,
            retry_cooldown_secs: 3600,
        }
    }
}

/// Default configuration file path: `<config_dir>/albumscan/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("albumscan").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Default database path: `<data_local_dir>/albumscan/albums.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("albumscan"))
        .unwrap_or_else(|| PathBuf::from("./albumscan_data"))
        .join("albums.db")
}

impl TomlConfig {
    /// Database path from the file, or the platform default
    pub fn database_path_or_default(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Parse configuration from TOML text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load configuration from `path`
///
/// A missing file is not an error: defaults are returned.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        debug!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    debug!("Wrote configuration to {}", path.display());
    Ok(())
}
