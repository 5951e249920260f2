//! Connection-string configuration.
//!
//! The connection string is the only configurable surface. It selects the
//! backing store dialect and the target database/file. SQLAlchemy-style
//! `dialect+driver://…` strings are accepted and the driver suffix dropped.

use crate::error::{StoreError, StoreResult};

/// Primary connection string variable.
pub const DATABASE_URL_VAR: &str = "AUTOTRAQ_DATABASE_URL";
/// Fallback connection string variable.
pub const FALLBACK_DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Pool size variable.
pub const MAX_CONNECTIONS_VAR: &str = "AUTOTRAQ_DB_MAX_CONNECTIONS";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Backing store dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Process-local maps (tests/dev).
    Memory,
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Memory => "memory",
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub dialect: Dialect,
    /// Normalized URL handed to the driver.
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// In-memory backend, no database needed.
    pub fn memory() -> Self {
        Self {
            dialect: Dialect::Memory,
            url: "memory:".to_string(),
            max_connections: 1,
        }
    }

    /// Parse a connection string.
    ///
    /// Recognised schemes: `memory:`, `sqlite:`, `postgres:`/`postgresql:`.
    /// `sqlite://` with nothing after it means an in-memory SQLite database.
    pub fn parse(connection: &str) -> StoreResult<Self> {
        let connection = connection.trim();
        let Some((scheme, rest)) = connection.split_once(':') else {
            return Err(StoreError::Config(format!(
                "connection string '{connection}' has no dialect scheme"
            )));
        };

        // "postgresql+psycopg2" -> "postgresql"
        let dialect = scheme
            .split_once('+')
            .map_or(scheme, |(dialect, _driver)| dialect)
            .to_ascii_lowercase();

        match dialect.as_str() {
            "memory" => Ok(Self::memory()),
            "sqlite" | "sqlite3" => {
                let url = if rest.is_empty() || rest == "//" || rest == ":memory:" {
                    "sqlite::memory:".to_string()
                } else {
                    format!("sqlite:{rest}")
                };
                Ok(Self {
                    dialect: Dialect::Sqlite,
                    url,
                    max_connections: DEFAULT_MAX_CONNECTIONS,
                })
            }
            "postgres" | "postgresql" => Ok(Self {
                dialect: Dialect::Postgres,
                url: format!("postgres:{rest}"),
                max_connections: DEFAULT_MAX_CONNECTIONS,
            }),
            "mysql" | "mariadb" => Err(StoreError::Config(format!(
                "dialect '{dialect}' is recognised but not supported; use sqlite or postgres"
            ))),
            other => Err(StoreError::Config(format!("unknown dialect '{other}'"))),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Whether this points at a private, per-connection SQLite database.
    ///
    /// Each connection to `sqlite::memory:` sees its own empty database, so the
    /// pool must be capped at one connection.
    pub fn is_sqlite_memory(&self) -> bool {
        self.dialect == Dialect::Sqlite && self.url.contains(":memory:")
    }

    /// Load from the process environment.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    ///
    /// Falls back to the in-memory backend when no connection string is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let url = lookup(DATABASE_URL_VAR).or_else(|| lookup(FALLBACK_DATABASE_URL_VAR));
        let config = match url {
            Some(url) => Self::parse(&url)?,
            None => {
                tracing::warn!(
                    "{DATABASE_URL_VAR} / {FALLBACK_DATABASE_URL_VAR} not set; \
                     using in-memory store"
                );
                return Ok(Self::memory());
            }
        };

        match lookup(MAX_CONNECTIONS_VAR) {
            Some(raw) => {
                let n: u32 = raw.trim().parse().map_err(|e| {
                    StoreError::Config(format!("{MAX_CONNECTIONS_VAR}='{raw}': {e}"))
                })?;
                Ok(config.with_max_connections(n))
            }
            None => Ok(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_postgres_and_drops_driver() {
        let cfg = DatabaseConfig::parse("postgresql+pg8000://dbuser:pw@pghost10/appdb").unwrap();
        assert_eq!(cfg.dialect, Dialect::Postgres);
        assert_eq!(cfg.url, "postgres://dbuser:pw@pghost10/appdb");
    }

    #[test]
    fn bare_sqlite_scheme_is_in_memory() {
        let cfg = DatabaseConfig::parse("sqlite://").unwrap();
        assert_eq!(cfg.url, "sqlite::memory:");
        assert!(cfg.is_sqlite_memory());
        assert!(DatabaseConfig::parse("sqlite::memory:").unwrap().is_sqlite_memory());
    }

    #[test]
    fn sqlite_file_path_is_kept() {
        let cfg = DatabaseConfig::parse("sqlite://AutoTraQ_DB.db").unwrap();
        assert_eq!(cfg.dialect, Dialect::Sqlite);
        assert_eq!(cfg.url, "sqlite://AutoTraQ_DB.db");
        assert!(!cfg.is_sqlite_memory());
    }

    #[test]
    fn mysql_is_recognised_but_unsupported() {
        let err = DatabaseConfig::parse("mysql:///AutoTraQ_DB.db").unwrap_err();
        assert!(matches!(err, StoreError::Config(msg) if msg.contains("not supported")));
    }

    #[test]
    fn missing_scheme_is_rejected() {
        assert!(DatabaseConfig::parse("AutoTraQ_DB.db").is_err());
        assert!(DatabaseConfig::parse("oracle://x").is_err());
    }

    #[test]
    fn env_prefers_primary_variable() {
        let cfg = DatabaseConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "sqlite://primary.db"),
            (FALLBACK_DATABASE_URL_VAR, "postgres://other/db"),
            (MAX_CONNECTIONS_VAR, "9"),
        ]))
        .unwrap();
        assert_eq!(cfg.dialect, Dialect::Sqlite);
        assert_eq!(cfg.max_connections, 9);
    }

    #[test]
    fn env_falls_back_to_database_url_then_memory() {
        let cfg =
            DatabaseConfig::from_lookup(lookup(&[(FALLBACK_DATABASE_URL_VAR, "postgres://h/db")]))
                .unwrap();
        assert_eq!(cfg.dialect, Dialect::Postgres);
        assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);

        let cfg = DatabaseConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, DatabaseConfig::memory());
    }

    #[test]
    fn bad_pool_size_is_a_config_error() {
        let err = DatabaseConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "sqlite://x.db"),
            (MAX_CONNECTIONS_VAR, "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
