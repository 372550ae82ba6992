//! Runtime configuration.
//!
//! Every setting is read from a `GLYCORISK_*` environment variable. Reading is
//! best-effort: a missing or unparsable value falls back to its default and
//! startup continues.

use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "GLYCORISK_DB_PATH";
pub const MODEL_DIR_ENV: &str = "GLYCORISK_MODEL_DIR";
pub const REQUIRE_SIGNED_MODELS_ENV: &str = "GLYCORISK_REQUIRE_SIGNED_MODELS";
pub const MODEL_PUBKEY_FILE_ENV: &str = "GLYCORISK_MODEL_PUBKEY_B64_FILE";
pub const LOG_MODE_ENV: &str = "GLYCORISK_LOG_MODE";
pub const LOG_FILE_ENV: &str = "GLYCORISK_LOG_FILE";
pub const USER_ENV: &str = "GLYCORISK_USER";
pub const ADVICE_ENDPOINT_ENV: &str = "GLYCORISK_ADVICE_ENDPOINT";
pub const ADVICE_MODEL_ENV: &str = "GLYCORISK_ADVICE_MODEL";
pub const ADVICE_API_KEY_FILE_ENV: &str = "GLYCORISK_ADVICE_API_KEY_FILE";
pub const ADVICE_TIMEOUT_ENV: &str = "GLYCORISK_ADVICE_TIMEOUT_SECS";

const DOCKER_SECRET_PUBKEY: &str = "/run/secrets/glycorisk_model_pubkey_b64";
const DOCKER_SECRET_ADVICE_KEY: &str = "/run/secrets/glycorisk_advice_api_key";

const DEFAULT_ADVICE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_ADVICE_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_ADVICE_TIMEOUT_SECS: u64 = 15;

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    File,
    Stdout,
    /// File when stdout is a terminal (the TUI owns it), stdout otherwise.
    Auto,
}

impl LogMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Self::File,
            "stdout" => Self::Stdout,
            _ => Self::Auto,
        }
    }
}

/// Settings for the external advice service.
#[derive(Debug, Clone)]
pub struct AdviceConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_file: Option<PathBuf>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
    /// Refuse to load any model unless a valid signed manifest is present.
    pub require_signed_models: bool,
    pub model_pubkey_file: Option<PathBuf>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
    /// Identity of the local session. Unset means anonymous.
    pub user_id: Option<String>,
    pub advice: AdviceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("glycorisk.db"),
            model_dir: PathBuf::from("models"),
            require_signed_models: false,
            model_pubkey_file: None,
            log_mode: LogMode::Auto,
            log_file: PathBuf::from("data/glycorisk.log"),
            user_id: None,
            advice: AdviceConfig {
                endpoint: DEFAULT_ADVICE_ENDPOINT.to_string(),
                model: DEFAULT_ADVICE_MODEL.to_string(),
                api_key_file: None,
                timeout: Duration::from_secs(DEFAULT_ADVICE_TIMEOUT_SECS),
            },
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let model_pubkey_file = non_empty(MODEL_PUBKEY_FILE_ENV)
            .map(PathBuf::from)
            .or_else(|| existing(DOCKER_SECRET_PUBKEY));

        let api_key_file = non_empty(ADVICE_API_KEY_FILE_ENV)
            .map(PathBuf::from)
            .or_else(|| existing(DOCKER_SECRET_ADVICE_KEY));

        let timeout = match non_empty(ADVICE_TIMEOUT_ENV) {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!("Ignoring invalid {ADVICE_TIMEOUT_ENV}={v}");
                    defaults.advice.timeout
                }
            },
            None => defaults.advice.timeout,
        };

        Self {
            db_path: non_empty(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            model_dir: non_empty(MODEL_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            require_signed_models: non_empty(REQUIRE_SIGNED_MODELS_ENV)
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.require_signed_models),
            model_pubkey_file,
            log_mode: non_empty(LOG_MODE_ENV)
                .map(|v| LogMode::parse(&v))
                .unwrap_or(defaults.log_mode),
            log_file: non_empty(LOG_FILE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
            user_id: non_empty(USER_ENV),
            advice: AdviceConfig {
                endpoint: non_empty(ADVICE_ENDPOINT_ENV).unwrap_or(defaults.advice.endpoint),
                model: non_empty(ADVICE_MODEL_ENV).unwrap_or(defaults.advice.model),
                api_key_file,
                timeout,
            },
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn existing(path: &str) -> Option<PathBuf> {
    let p = PathBuf::from(path);
    p.exists().then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.model_dir, PathBuf::from("models"));
        assert_eq!(config.log_mode, LogMode::Auto);
        assert!(config.user_id.is_none());
        assert!(!config.require_signed_models);
        assert_eq!(config.advice.model, DEFAULT_ADVICE_MODEL);
    }

    #[test]
    fn test_reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (DB_PATH_ENV, "/tmp/g.db"),
            (USER_ENV, "alice"),
            (LOG_MODE_ENV, "stdout"),
            (REQUIRE_SIGNED_MODELS_ENV, "true"),
            (ADVICE_TIMEOUT_ENV, "3"),
        ]));
        assert_eq!(config.db_path, PathBuf::from("/tmp/g.db"));
        assert_eq!(config.user_id.as_deref(), Some("alice"));
        assert_eq!(config.log_mode, LogMode::Stdout);
        assert!(config.require_signed_models);
        assert_eq!(config.advice.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (ADVICE_TIMEOUT_ENV, "soon"),
            (USER_ENV, "   "),
        ]));
        assert_eq!(
            config.advice.timeout,
            Duration::from_secs(DEFAULT_ADVICE_TIMEOUT_SECS)
        );
        assert!(config.user_id.is_none());
    }
}
