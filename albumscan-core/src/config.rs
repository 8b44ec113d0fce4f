//! Provider credential resolution
//!
//! API keys resolve with ENV → TOML priority. The environment variable is
//! named per backend (`ALBUMSCAN_OPENAI_API_KEY`, `ALBUMSCAN_GEMINI_API_KEY`).

use albumscan_common::config::ProviderConfig;
use albumscan_common::{Error, Result};
use tracing::{info, warn};

/// Resolve the API key for a provider backend
///
/// **Priority:** ENV → TOML
pub fn resolve_api_key(config: &ProviderConfig) -> Result<String> {
    let env_var = config.provider.api_key_env_var();

    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = config.api_key.as_ref().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            provider = %config.provider,
            "API key found in environment and TOML config. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!(provider = %config.provider, "API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!(provider = %config.provider, "API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "{} API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: api_key = \"your-key\" in the [identification] or [review] section",
        config.provider, env_var
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
