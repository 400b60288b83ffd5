//! Remote metadata service (SDP) data source
//!
//! Query-style HTTP API: a request type plus filter, sort order, field list
//! and paging. Responses carry their items under `nodes` (EPG) or
//! `editorials` (catalogue), with paging metadata under `z`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::SourceClientConfig;
use crate::errors::{SourceError, SourceResult};
use crate::models::{EpgEvent, Millis, Service};

pub const EPG_REQUEST_TYPE: &str = "btv/programmes";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataQuery {
    pub request_type: String,
    pub filter: Value,
    pub sort_order: Option<Value>,
    #[serde(default)]
    pub field_list: Vec<String>,
    pub count: Option<u32>,
    pub offset: Option<u32>,
}

impl MetadataQuery {
    /// Programmes on `service_id` intersecting `[start, end)`, oldest first
    pub fn events_for_window(service_id: &str, start: Millis, end: Millis) -> Self {
        Self {
            request_type: EPG_REQUEST_TYPE.to_string(),
            filter: json!({
                "serviceRef": service_id,
                "startTime": { "$lt": end },
                "endTime": { "$gt": start },
            }),
            sort_order: Some(json!({ "startTime": 1 })),
            field_list: Vec::new(),
            count: None,
            offset: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEvent {
    pub id: String,
    pub service_ref: String,
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

impl MetadataEvent {
    pub fn into_event(self, cache_timestamp: Millis) -> EpgEvent {
        EpgEvent {
            event_id: self.id,
            service_id: self.service_ref,
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

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataResponse {
    #[serde(default, alias = "editorials")]
    pub nodes: Vec<MetadataEvent>,
    #[serde(default)]
    pub z: Option<Value>,
}

#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn get_epg_data(&self, query: MetadataQuery) -> SourceResult<MetadataResponse>;

    /// IP channel line-up; services without one return an empty list
    async fn fetch_services(&self) -> SourceResult<Vec<Service>> {
        Ok(Vec::new())
    }
}

/// JSON-over-HTTP metadata service client
pub struct HttpMetadataClient {
    client: Client,
    base_url: String,
}

impl HttpMetadataClient {
    pub fn new(config: &SourceClientConfig) -> SourceResult<Self> {
        let base_url = url::Url::parse(&config.base_url)
            .map_err(|e| SourceError::invalid_config("metadata.base_url", e.to_string()))?
            .to_string()
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, base_url })
    }

    async fn check_status(response: reqwest::Response) -> SourceResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(SourceError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
            ))
        }
    }
}

#[async_trait]
impl MetadataClient for HttpMetadataClient {
    async fn get_epg_data(&self, query: MetadataQuery) -> SourceResult<MetadataResponse> {
        let url = format!("{}/query", self.base_url);
        debug!("Metadata query {} against {}", query.request_type, url);

        let response = self
            .client
            .post(&url)
            .json(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::timeout(&url)
                } else {
                    SourceError::Request(e)
                }
            })?;

        Self::check_status(response)
            .await?
            .json::<MetadataResponse>()
            .await
            .map_err(|e| SourceError::parse_error("metadata", e.to_string()))
    }

    async fn fetch_services(&self) -> SourceResult<Vec<Service>> {
        let url = format!("{}/services", self.base_url);
        let response = self.client.get(&url).send().await?;
        Self::check_status(response)
            .await?
            .json::<Vec<Service>>()
            .await
            .map_err(|e| SourceError::parse_error("metadata", e.to_string()))
    }
}
