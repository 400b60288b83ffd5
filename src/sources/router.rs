//! Per-service choice between the gateway and the metadata service
//!
//! The router owns the write-back half of a fetch: results are cached (unless
//! `cache_events` is off), gateway results are re-published to event
//! subscribers and metadata results are annotated with parental ratings.
//! Every failure ends here as a log line and an empty result.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info_span, trace, warn, Instrument};
use uuid::Uuid;

use super::gateway::{GatewayClient, RawEitRecord};
use super::metadata::{MetadataClient, MetadataQuery};
use super::ratings::{Ratings, RatingsTable};
use crate::cache::EventStore;
use crate::clock::Clock;
use crate::config::{DataSourceKind, EpgConfig};
use crate::models::{DeliveryMethod, EpgEvent, EventUpdate, Millis, Service};

/// What the caller is fetching for; carried into logs only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOperation {
    Current,
    Next,
    Previous,
    Window,
    AtTime,
}

impl fmt::Display for FetchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchOperation::Current => "current",
            FetchOperation::Next => "next",
            FetchOperation::Previous => "previous",
            FetchOperation::Window => "window",
            FetchOperation::AtTime => "at_time",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePath {
    Gateway,
    Metadata,
}

pub struct DataSourceRouter {
    data_sources: Vec<DataSourceKind>,
    gateway: Option<Arc<dyn GatewayClient>>,
    metadata: Option<Arc<dyn MetadataClient>>,
    ratings: Arc<dyn Ratings>,
    store: Arc<dyn EventStore>,
    cache_events: bool,
    clock: Arc<dyn Clock>,
    updates: broadcast::Sender<EventUpdate>,
}

impl DataSourceRouter {
    pub fn new(
        config: &EpgConfig,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        updates: broadcast::Sender<EventUpdate>,
    ) -> Self {
        Self {
            data_sources: config.data_sources.clone(),
            gateway: None,
            metadata: None,
            ratings: Arc::new(RatingsTable::new(config.ratings.clone())),
            store,
            cache_events: config.cache_events,
            clock,
            updates,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn GatewayClient>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataClient>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_ratings(mut self, ratings: Arc<dyn Ratings>) -> Self {
        self.ratings = ratings;
        self
    }

    pub fn gateway(&self) -> Option<&Arc<dyn GatewayClient>> {
        self.gateway.as_ref()
    }

    fn enabled(&self, kind: DataSourceKind) -> bool {
        self.data_sources.contains(&kind)
    }

    /// Source serving `service`, or `None` when nothing configured applies
    pub fn route(&self, service: &Service) -> Option<SourcePath> {
        match service.delivery_method {
            DeliveryMethod::Gateway
                if self.enabled(DataSourceKind::Gateway) && self.gateway.is_some() =>
            {
                Some(SourcePath::Gateway)
            }
            DeliveryMethod::Ip if self.enabled(DataSourceKind::Sdp) && self.metadata.is_some() => {
                Some(SourcePath::Metadata)
            }
            _ => None,
        }
    }

    /// Fetch `[start, end)` for one service from its source and write the
    /// result back. Never fails: unavailable sources and errors yield an
    /// empty list.
    pub async fn fetch_window(
        &self,
        service: &Service,
        start: Millis,
        end: Millis,
        operation: FetchOperation,
    ) -> Vec<EpgEvent> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "epg_fetch",
            %request_id,
            service_id = %service.service_id,
            %operation
        );

        async move {
            let Some(path) = self.route(service) else {
                debug!(
                    "No configured data source for {:?}-delivered service {}",
                    service.delivery_method, service.service_id
                );
                return Vec::new();
            };

            let mut events = match path {
                SourcePath::Gateway => self.fetch_from_gateway(service, start, end).await,
                SourcePath::Metadata => self.fetch_from_metadata(service, start, end).await,
            };
            events.sort_by_key(|e| e.start_time);
            trace!("{:?} returned {} events", path, events.len());

            self.write_back(&events).await;
            if path == SourcePath::Gateway {
                self.publish(EventUpdate::Fetched {
                    service_id: service.service_id.clone(),
                    events: events.clone(),
                });
            }
            events
        }
        .instrument(span)
        .await
    }

    async fn fetch_from_gateway(&self, service: &Service, start: Millis, end: Millis) -> Vec<EpgEvent> {
        let Some(gateway) = &self.gateway else {
            return Vec::new();
        };

        match gateway.fetch_eit_data(&service.service_id, start, end).await {
            Ok(records) => {
                let now = self.clock.now_millis();
                records
                    .into_iter()
                    .filter(|r| r.sid == service.service_id)
                    .map(|r| r.into_event(now))
                    .collect()
            }
            Err(e) => {
                warn!("Gateway fetch failed for {}: {}", service.service_id, e);
                Vec::new()
            }
        }
    }

    async fn fetch_from_metadata(
        &self,
        service: &Service,
        start: Millis,
        end: Millis,
    ) -> Vec<EpgEvent> {
        let Some(metadata) = &self.metadata else {
            return Vec::new();
        };

        let query = MetadataQuery::events_for_window(&service.service_id, start, end);
        match metadata.get_epg_data(query).await {
            Ok(response) => {
                let now = self.clock.now_millis();
                response
                    .nodes
                    .into_iter()
                    .map(|node| self.ratings.annotate(node.into_event(now)))
                    .collect()
            }
            Err(e) => {
                warn!("Metadata fetch failed for {}: {}", service.service_id, e);
                Vec::new()
            }
        }
    }

    /// Fold an unsolicited gateway event push into the cache and re-publish it
    pub async fn ingest_pushed_events(&self, records: Vec<RawEitRecord>) -> Vec<EpgEvent> {
        let now = self.clock.now_millis();
        let events: Vec<EpgEvent> = records.into_iter().map(|r| r.into_event(now)).collect();
        debug!("Gateway pushed {} events", events.len());

        self.write_back(&events).await;
        self.publish(EventUpdate::Pushed {
            events: events.clone(),
        });
        events
    }

    /// Channel list from every configured source that can list services.
    /// `None` when no source answered, so a failed sync never wipes the cache.
    pub async fn fetch_services(&self) -> Option<Vec<Service>> {
        let mut services = Vec::new();
        let mut answered = false;

        if let (true, Some(gateway)) = (self.enabled(DataSourceKind::Gateway), &self.gateway) {
            match gateway.fetch_services().await {
                Ok(list) => {
                    debug!("Gateway listed {} services", list.len());
                    services.extend(list);
                    answered = true;
                }
                Err(e) => warn!("Gateway service list unavailable: {}", e),
            }
        }

        if let (true, Some(metadata)) = (self.enabled(DataSourceKind::Sdp), &self.metadata) {
            match metadata.fetch_services().await {
                Ok(list) => {
                    debug!("Metadata service listed {} services", list.len());
                    services.extend(list);
                    answered = true;
                }
                Err(e) => warn!("Metadata service list unavailable: {}", e),
            }
        }

        answered.then_some(services)
    }

    async fn write_back(&self, events: &[EpgEvent]) {
        if !self.cache_events || events.is_empty() {
            return;
        }
        if let Err(e) = self.store.cache_events(events.to_vec()).await {
            warn!("Failed to cache {} fetched events: {}", events.len(), e);
        }
    }

    fn publish(&self, update: EventUpdate) {
        // No receivers is fine
        let _ = self.updates.send(update);
    }
}
