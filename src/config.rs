use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

// ============================================================================
// Configuration
// ============================================================================
//
// Plain structs with sensible defaults. `AppConfig::from_env` overlays
// values from the environment:
//
//   RECORD_STORE_DATABASE_URL        PostgreSQL URL (unset = in-memory store)
//   RECORD_STORE_MAX_CONNECTIONS     pool size
//   RECORD_STORE_DEFAULT_PAGE_SIZE   page size when a request has none
//   RECORD_STORE_MAX_PAGE_SIZE       upper bound for any page size
//
// ============================================================================

pub const DATABASE_URL_VAR: &str = "RECORD_STORE_DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "RECORD_STORE_MAX_CONNECTIONS";
pub const DEFAULT_PAGE_SIZE_VAR: &str = "RECORD_STORE_DEFAULT_PAGE_SIZE";
pub const MAX_PAGE_SIZE_VAR: &str = "RECORD_STORE_MAX_PAGE_SIZE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PagingConfig {
    /// Page size used when a request does not specify one
    pub default_page_size: u64,
    /// Larger requested page sizes are clamped to this
    pub max_page_size: u64,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 50,
        }
    }
}

impl PagingConfig {
    /// Larger pages for export-style callers
    pub fn bulk() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 1000,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_page_size == 0 {
            bail!("default page size must be at least 1");
        }
        if self.default_page_size > self.max_page_size {
            bail!(
                "default page size {} exceeds max page size {}",
                self.default_page_size,
                self.max_page_size
            );
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// PostgreSQL connection URL; `None` selects the in-memory store
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub paging: PagingConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (the environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(DATABASE_URL_VAR).filter(|url| !url.trim().is_empty()) {
            config.store.database_url = Some(url.trim().to_string());
        }
        if let Some(raw) = lookup(MAX_CONNECTIONS_VAR) {
            config.store.max_connections = parse(MAX_CONNECTIONS_VAR, &raw)?;
        }
        if let Some(raw) = lookup(DEFAULT_PAGE_SIZE_VAR) {
            config.paging.default_page_size = parse(DEFAULT_PAGE_SIZE_VAR, &raw)?;
        }
        if let Some(raw) = lookup(MAX_PAGE_SIZE_VAR) {
            config.paging.max_page_size = parse(MAX_PAGE_SIZE_VAR, &raw)?;
        }

        if config.store.max_connections == 0 {
            bail!("{} must be at least 1", MAX_CONNECTIONS_VAR);
        }
        config.paging.validate().context("invalid paging configuration")?;

        Ok(config)
    }
}

fn parse<N>(key: &str, raw: &str) -> Result<N>
where
    N: FromStr,
    N::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.paging.default_page_size, 10);
        assert!(config.store.database_url.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "postgres://localhost/records"),
            (MAX_CONNECTIONS_VAR, "12"),
            (DEFAULT_PAGE_SIZE_VAR, "25"),
            (MAX_PAGE_SIZE_VAR, " 200 "),
        ]))
        .unwrap();

        assert_eq!(config.store.database_url.as_deref(), Some("postgres://localhost/records"));
        assert_eq!(config.store.max_connections, 12);
        assert_eq!(config.paging.default_page_size, 25);
        assert_eq!(config.paging.max_page_size, 200);
    }

    #[test]
    fn test_blank_url_means_in_memory() {
        let config = AppConfig::from_lookup(lookup(&[(DATABASE_URL_VAR, "  ")])).unwrap();
        assert!(config.store.database_url.is_none());
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let error = AppConfig::from_lookup(lookup(&[(MAX_PAGE_SIZE_VAR, "lots")])).unwrap_err();
        assert!(error.to_string().contains(MAX_PAGE_SIZE_VAR));

        assert!(AppConfig::from_lookup(lookup(&[(DEFAULT_PAGE_SIZE_VAR, "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(DEFAULT_PAGE_SIZE_VAR, "80")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(MAX_CONNECTIONS_VAR, "0")])).is_err());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(PagingConfig::default().validate().is_ok());
        assert!(PagingConfig::bulk().validate().is_ok());
    }
}
