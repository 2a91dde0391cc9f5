use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Runtime settings for one extraction run.
///
/// Every field has a default; env vars only override.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub output_path: PathBuf,
}

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if an env var holds a value that does not parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if an env var holds a value that does not parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// The parsing logic is decoupled from the actual environment so it can be
/// tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let log_level = or_default("OFFERSCAN_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("OFFERSCAN_REQUEST_TIMEOUT_SECS", "30")?;
    let connect_timeout_secs = parse_u64("OFFERSCAN_CONNECT_TIMEOUT_SECS", "10")?;
    let user_agent = or_default(
        "OFFERSCAN_USER_AGENT",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
    );
    let accept_language = or_default("OFFERSCAN_ACCEPT_LANGUAGE", "en-US,en;q=0.9");
    let output_path = PathBuf::from(or_default("OFFERSCAN_OUTPUT_PATH", "result.json"));

    Ok(AppConfig {
        log_level,
        request_timeout_secs,
        connect_timeout_secs,
        user_agent,
        accept_language,
        output_path,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
