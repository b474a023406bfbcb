use std::fmt;
use std::time::Duration;

use quill_core::PoolConfig;

/// Blog settings: built-in defaults, overridden from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct BlogConfig {
    pub database: PoolConfig,
    pub bind: String,
    /// Run `create table if not exists` for every model at startup.
    pub create_tables: bool,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            database: PoolConfig::new("sqlite://quill_blog.db?mode=rwc")
                .min_connections(1)
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(30)),
            bind: "127.0.0.1:9000".to_string(),
            create_tables: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

impl BlogConfig {
    /// Loads `.env` (if any) and applies the `QUILL_*` variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::default().merge(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; keys it returns `None` for keep their defaults.
    pub fn merge(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = lookup("QUILL_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(raw) = lookup("QUILL_DB_MIN_CONNECTIONS") {
            self.database.min_connections = parse_u32("QUILL_DB_MIN_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("QUILL_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("QUILL_DB_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("QUILL_DB_AUTOCOMMIT") {
            self.database.autocommit = parse_bool("QUILL_DB_AUTOCOMMIT", &raw)?;
        }
        if let Some(bind) = lookup("QUILL_BIND") {
            self.bind = bind;
        }
        if let Some(raw) = lookup("QUILL_CREATE_TABLES") {
            self.create_tables = parse_bool("QUILL_CREATE_TABLES", &raw)?;
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                key: "QUILL_DB_MIN_CONNECTIONS",
                value: self.database.min_connections.to_string(),
            });
        }
        Ok(self)
    }
}
