use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::errors::{EpgError, EpgResult};
use crate::models::Rating;

/// Where cached events live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    #[default]
    Ram,
    Persistent,
}

/// Upstream EPG data sources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    /// Home gateway push/fetch source, serves gateway-delivered services
    Gateway,
    /// Remote metadata server, serves IP-delivered services
    Sdp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgConfig {
    #[serde(default)]
    pub cache_type: CacheType,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_data_sources")]
    pub data_sources: Vec<DataSourceKind>,
    /// Age at which a cached event stops being trusted and is re-fetched
    #[serde(default = "default_cache_expiry_time", with = "duration_serde::duration")]
    pub cache_expiry_time: Duration,
    #[serde(default = "default_cache_events")]
    pub cache_events: bool,
    /// Age at which a cached event is deleted by the sweeper
    #[serde(default = "default_expired_events_time", with = "duration_serde::duration")]
    pub expired_events_time: Duration,
    #[serde(
        default = "default_check_for_expired_events_time",
        with = "duration_serde::duration"
    )]
    pub check_for_expired_events_time: Duration,
    #[serde(default = "default_neighbour_window", with = "duration_serde::duration")]
    pub neighbour_window: Duration,
    pub gateway: Option<SourceClientConfig>,
    pub metadata: Option<SourceClientConfig>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceClientConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_data_sources() -> Vec<DataSourceKind> {
    vec![DataSourceKind::Gateway, DataSourceKind::Sdp]
}

fn default_cache_expiry_time() -> Duration {
    Duration::from_millis(DEFAULT_CACHE_EXPIRY_TIME_MS)
}

fn default_cache_events() -> bool {
    DEFAULT_CACHE_EVENTS
}

fn default_expired_events_time() -> Duration {
    Duration::from_millis(DEFAULT_EXPIRED_EVENTS_TIME_MS)
}

fn default_check_for_expired_events_time() -> Duration {
    Duration::from_millis(DEFAULT_CHECK_FOR_EXPIRED_EVENTS_TIME_MS)
}

fn default_neighbour_window() -> Duration {
    Duration::from_millis(DEFAULT_NEIGHBOUR_WINDOW_MS)
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::default(),
            database_url: default_database_url(),
            data_sources: default_data_sources(),
            cache_expiry_time: default_cache_expiry_time(),
            cache_events: default_cache_events(),
            expired_events_time: default_expired_events_time(),
            check_for_expired_events_time: default_check_for_expired_events_time(),
            neighbour_window: default_neighbour_window(),
            gateway: None,
            metadata: None,
            ratings: Vec::new(),
        }
    }
}

impl EpgConfig {
    /// Load from a TOML file when it exists, otherwise use defaults, then
    /// apply `EPG_SYNC_*` environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            info!("Configuration loaded from: {}", path.display());
            config
        } else {
            info!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> EpgResult<()> {
        if let Ok(value) = std::env::var("EPG_SYNC_CACHE_TYPE") {
            self.cache_type = match value.to_lowercase().as_str() {
                "ram" => CacheType::Ram,
                "persistent" => CacheType::Persistent,
                other => {
                    return Err(EpgError::configuration(format!(
                        "EPG_SYNC_CACHE_TYPE must be 'ram' or 'persistent', got '{other}'"
                    )))
                }
            };
        }
        if let Ok(value) = std::env::var("EPG_SYNC_DATABASE_URL") {
            self.database_url = value;
        }
        if let Ok(value) = std::env::var("EPG_SYNC_DATA_SOURCES") {
            self.data_sources = parse_data_sources(&value)?;
        }
        if let Ok(value) = std::env::var("EPG_SYNC_CACHE_EVENTS") {
            self.cache_events = value.parse().map_err(|_| {
                EpgError::configuration(format!(
                    "EPG_SYNC_CACHE_EVENTS must be 'true' or 'false', got '{value}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> EpgResult<()> {
        if self.cache_expiry_time.is_zero() {
            return Err(EpgError::configuration("cache_expiry_time must be non-zero"));
        }
        if self.check_for_expired_events_time.is_zero() {
            return Err(EpgError::configuration(
                "check_for_expired_events_time must be non-zero",
            ));
        }
        for (name, client) in [("gateway", &self.gateway), ("metadata", &self.metadata)] {
            if let Some(client) = client {
                url::Url::parse(&client.base_url).map_err(|e| {
                    EpgError::configuration(format!(
                        "{name}.base_url '{}' is not a valid URL: {e}",
                        client.base_url
                    ))
                })?;
            }
        }
        if self.data_sources.contains(&DataSourceKind::Gateway) && self.gateway.is_none() {
            warn!("Gateway data source enabled without a [gateway] client section");
        }
        if self.data_sources.contains(&DataSourceKind::Sdp) && self.metadata.is_none() {
            warn!("SDP data source enabled without a [metadata] client section");
        }
        Ok(())
    }

    pub fn has_data_source(&self, kind: DataSourceKind) -> bool {
        self.data_sources.contains(&kind)
    }
}

fn parse_data_sources(value: &str) -> EpgResult<Vec<DataSourceKind>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.to_lowercase().as_str() {
            "gateway" => Ok(DataSourceKind::Gateway),
            "sdp" => Ok(DataSourceKind::Sdp),
            other => Err(EpgError::configuration(format!(
                "Unknown data source '{other}'"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EpgConfig::default();
        assert_eq!(config.cache_type, CacheType::Ram);
        assert_eq!(config.cache_expiry_time, Duration::from_millis(3_600_000));
        assert_eq!(config.expired_events_time, Duration::from_millis(604_800_000));
        assert_eq!(
            config.check_for_expired_events_time,
            Duration::from_millis(86_400_000)
        );
        assert!(config.cache_events);
        assert!(config.has_data_source(DataSourceKind::Gateway));
        assert!(config.has_data_source(DataSourceKind::Sdp));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EpgConfig = toml::from_str(
            r#"
            cache_type = "persistent"
            data_sources = ["gateway"]
            cache_expiry_time = "30m"
            cache_events = false

            [gateway]
            base_url = "http://192.168.1.10:8080"

            [[ratings]]
            code = "PG"
            precedence_value = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_type, CacheType::Persistent);
        assert_eq!(config.data_sources, vec![DataSourceKind::Gateway]);
        assert_eq!(config.cache_expiry_time, Duration::from_secs(1800));
        assert!(!config.cache_events);
        assert_eq!(config.expired_events_time, Duration::from_millis(604_800_000));
        let gateway = config.gateway.as_ref().unwrap();
        assert_eq!(gateway.request_timeout, Duration::from_millis(10_000));
        assert_eq!(config.ratings.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_fails_validation() {
        let config = EpgConfig {
            metadata: Some(SourceClientConfig {
                base_url: "not a url".to_string(),
                request_timeout: Duration::from_secs(1),
            }),
            ..EpgConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_data_sources() {
        assert_eq!(
            parse_data_sources("gateway, sdp").unwrap(),
            vec![DataSourceKind::Gateway, DataSourceKind::Sdp]
        );
        assert!(parse_data_sources("gateway,satellite").is_err());
        assert!(parse_data_sources("").unwrap().is_empty());
    }
}
