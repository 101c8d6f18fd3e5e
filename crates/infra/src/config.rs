//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use campo_observability::LogFormat;
use campo_resolver::{
    DEFAULT_SUGGESTION_LIMIT, EntityResolver, ResolverConfig, StemmerTables, StemmerTablesError,
};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    StemmerTables(#[from] StemmerTablesError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Selects the Postgres store when set; the in-memory store otherwise.
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    pub stemmer_tables: Option<PathBuf>,
    pub suggestion_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("CAMPO_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr
            .trim()
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "CAMPO_BIND_ADDR",
                value: bind_addr.clone(),
                reason: e.to_string(),
            })?;

        let log_format = match get("CAMPO_LOG_FORMAT") {
            Some(value) => value.parse::<LogFormat>().map_err(|e| ConfigError::Invalid {
                key: "CAMPO_LOG_FORMAT",
                value: value.clone(),
                reason: e.to_string(),
            })?,
            None => LogFormat::default(),
        };

        let suggestion_limit = match get("CAMPO_SUGGESTION_LIMIT") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        key: "CAMPO_SUGGESTION_LIMIT",
                        value,
                        reason: "must be at least 1".into(),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        key: "CAMPO_SUGGESTION_LIMIT",
                        value,
                        reason: e.to_string(),
                    });
                }
            },
            None => DEFAULT_SUGGESTION_LIMIT,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            log_format,
            stemmer_tables: get("CAMPO_STEMMER_TABLES").map(PathBuf::from),
            suggestion_limit,
        })
    }

    /// Build the resolver, loading stemmer tables from disk when configured.
    pub fn resolver(&self) -> Result<EntityResolver, ConfigError> {
        let tables = match &self.stemmer_tables {
            Some(path) => StemmerTables::from_path(path)?,
            None => StemmerTables::default(),
        };
        Ok(EntityResolver::new(
            ResolverConfig {
                suggestion_limit: self.suggestion_limit,
            },
            tables,
        ))
    }
}
