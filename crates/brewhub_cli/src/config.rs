//! Runtime configuration for the CLI.
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file. Command-line flags win over both.

use std::env;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "BREWHUB_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "BREWHUB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "BREWHUB_LOG_DIR";

const DEFAULT_DB_PATH: &str = "brewhub.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging stays off when unset.
    pub log_dir: Option<String>,
}

/// Flag values that override the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
}

impl CliConfig {
    /// Loads `.env` (if present) and resolves the final configuration.
    pub fn load(overrides: Overrides) -> Self {
        dotenvy::dotenv().ok();
        Self::resolve(overrides, |key| env::var(key).ok())
    }

    fn resolve(overrides: Overrides, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let db_path = overrides
            .db_path
            .or_else(|| lookup(ENV_DB_PATH).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let log_level = overrides
            .log_level
            .or_else(|| lookup(ENV_LOG_LEVEL))
            .unwrap_or_else(|| brewhub_core::default_log_level().to_string());
        let log_dir = overrides.log_dir.or_else(|| lookup(ENV_LOG_DIR));

        Self {
            db_path,
            log_level,
            log_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliConfig, Overrides, ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn environment_fills_missing_flags() {
        let env = env_of(&[
            (ENV_DB_PATH, "/var/lib/brewhub/shop.sqlite3"),
            (ENV_LOG_LEVEL, "warn"),
            (ENV_LOG_DIR, "/var/log/brewhub"),
        ]);
        let config = CliConfig::resolve(Overrides::default(), |key| env.get(key).cloned());

        assert_eq!(config.db_path, PathBuf::from("/var/lib/brewhub/shop.sqlite3"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/brewhub"));
    }

    #[test]
    fn flags_win_and_blank_values_are_ignored() {
        let env = env_of(&[(ENV_DB_PATH, "/env.sqlite3"), (ENV_LOG_DIR, "  ")]);
        let overrides = Overrides {
            db_path: Some(PathBuf::from("/flag.sqlite3")),
            ..Overrides::default()
        };
        let config = CliConfig::resolve(overrides, |key| env.get(key).cloned());

        assert_eq!(config.db_path, PathBuf::from("/flag.sqlite3"));
        assert_eq!(config.log_dir, None);
        assert_eq!(config.log_level, brewhub_core::default_log_level());
    }
}
