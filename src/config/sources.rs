use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "CLIPFETCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/clipfetch.toml";
const ENV_PREFIX: &str = "CLIPFETCH";
const ENV_SEPARATOR: &str = "__";

/// Path of the TOML file, honoring `CLIPFETCH_CONFIG`
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load with priority, lowest first:
/// 1. Struct defaults
/// 2. TOML file (if present)
/// 3. `.env` entries (via dotenvy)
/// 4. Process environment
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();
    load_from_sources(config_path())
}

/// Load from a specific file plus the environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // CLIPFETCH__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
