//! Home gateway data source
//!
//! The gateway answers EIT window requests per service and pushes channel
//! and event list changes. The wire protocol is the gateway's business; this
//! module only needs the JSON fetch contract and a notification stream.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::{defaults::DEFAULT_NOTIFICATION_CAPACITY, SourceClientConfig};
use crate::errors::{SourceError, SourceResult};
use crate::models::{EpgEvent, Millis, Service};

/// Raw EIT record as delivered by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawEitRecord {
    pub sid: String,
    #[serde(default)]
    pub event_id: Option<String>,
    pub start_time: Millis,
    pub end_time: Millis,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,
}

impl RawEitRecord {
    /// Convert to a cacheable event. Records without an event id are keyed
    /// by service and start time, which is unique within a schedule.
    pub fn into_event(self, cache_timestamp: Millis) -> EpgEvent {
        let event_id = self
            .event_id
            .unwrap_or_else(|| format!("{}:{}", self.sid, self.start_time));
        EpgEvent {
            event_id,
            service_id: self.sid,
            start_time: self.start_time,
            end_time: self.end_time,
            title: self.title.unwrap_or_default(),
            description: self.description,
            genre: self.genre,
            rating_code: self.rating,
            parental_rating: None,
            cache_timestamp,
        }
    }
}

/// Unsolicited gateway notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayNotification {
    ChannelListUpdated { services: Vec<Service> },
    EventListUpdated { events: Vec<RawEitRecord> },
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// EIT records for `service_id` intersecting `[start, end)`
    async fn fetch_eit_data(
        &self,
        service_id: &str,
        start: Millis,
        end: Millis,
    ) -> SourceResult<Vec<RawEitRecord>>;

    /// Channel list as known to the gateway
    async fn fetch_services(&self) -> SourceResult<Vec<Service>>;

    /// Push notification stream, if the gateway supports pushes
    fn subscribe(&self) -> Option<broadcast::Receiver<GatewayNotification>>;
}

/// JSON-over-HTTP gateway client
pub struct HttpGatewayClient {
    client: Client,
    base_url: String,
    notifications: broadcast::Sender<GatewayNotification>,
}

impl HttpGatewayClient {
    pub fn new(config: &SourceClientConfig) -> SourceResult<Self> {
        let base_url = url::Url::parse(&config.base_url)
            .map_err(|e| SourceError::invalid_config("gateway.base_url", e.to_string()))?
            .to_string()
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let (notifications, _) = broadcast::channel(DEFAULT_NOTIFICATION_CAPACITY);

        Ok(Self {
            client,
            base_url,
            notifications,
        })
    }

    /// Sender for the transport that receives gateway pushes
    pub fn notifier(&self) -> broadcast::Sender<GatewayNotification> {
        self.notifications.clone()
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> SourceResult<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::timeout(url)
                } else {
                    SourceError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::parse_error("gateway", e.to_string()))
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn fetch_eit_data(
        &self,
        service_id: &str,
        start: Millis,
        end: Millis,
    ) -> SourceResult<Vec<RawEitRecord>> {
        let url = format!("{}/eit", self.base_url);
        debug!(
            "Gateway EIT request for service {} [{}, {})",
            service_id, start, end
        );
        self.get_json(
            &url,
            &[
                ("sid", service_id.to_string()),
                ("startTime", start.to_string()),
                ("endTime", end.to_string()),
            ],
        )
        .await
    }

    async fn fetch_services(&self) -> SourceResult<Vec<Service>> {
        let url = format!("{}/services", self.base_url);
        self.get_json(&url, &[]).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<GatewayNotification>> {
        Some(self.notifications.subscribe())
    }
}

impl std::fmt::Debug for HttpGatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_raw_record_deserializes_camel_case() {
        let record: RawEitRecord = serde_json::from_str(
            r#"{"sid":"s1","eventId":"e9","startTime":1000,"endTime":2000,"title":"News","rating":"PG"}"#,
        )
        .unwrap();
        assert_eq!(record.event_id.as_deref(), Some("e9"));
        assert_eq!(record.rating.as_deref(), Some("PG"));
        assert!(record.genre.is_none());
    }

    #[test]
    fn test_record_without_id_gets_positional_id() {
        let record = RawEitRecord {
            sid: "s1".to_string(),
            event_id: None,
            start_time: 1000,
            end_time: 2000,
            title: None,
            description: None,
            genre: None,
            rating: Some("PG".to_string()),
        };
        let event = record.into_event(77);
        assert_eq!(event.event_id, "s1:1000");
        assert_eq!(event.title, "");
        assert_eq!(event.rating_code.as_deref(), Some("PG"));
        assert_eq!(event.cache_timestamp, 77);
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let config = SourceClientConfig {
            base_url: "::not-a-url".to_string(),
            request_timeout: Duration::from_secs(1),
        };
        assert!(HttpGatewayClient::new(&config).is_err());
    }
}
