#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use epg_sync::cache::{EventStore, InMemoryEventStore};
use epg_sync::clock::ManualClock;
use epg_sync::errors::{SourceError, SourceResult};
use epg_sync::models::{ChannelOrigin, DeliveryMethod, EpgEvent, Millis, Service, ServiceType};
use epg_sync::sources::{
    GatewayClient, GatewayNotification, MetadataClient, MetadataEvent, MetadataQuery,
    MetadataResponse, RawEitRecord,
};
use epg_sync::{Epg, EpgConfig};

pub const NOW: Millis = 1_700_000_000_000;
pub const MINUTE: Millis = 60_000;
pub const HOUR: Millis = 60 * MINUTE;

pub fn service(id: &str, lcn: u32, delivery_method: DeliveryMethod) -> Service {
    Service {
        service_id: id.to_string(),
        logical_channel_num: lcn,
        name: format!("Channel {lcn}"),
        service_type: ServiceType::Tv,
        delivery_method,
        is_subscribed: true,
        uri: Some(format!("svc://{id}")),
        origin: ChannelOrigin::HeadEnd,
    }
}

pub fn event(id: &str, service_id: &str, start: Millis, end: Millis, cached_at: Millis) -> EpgEvent {
    EpgEvent {
        event_id: id.to_string(),
        service_id: service_id.to_string(),
        start_time: start,
        end_time: end,
        title: id.to_string(),
        description: None,
        genre: None,
        rating_code: None,
        parental_rating: None,
        cache_timestamp: cached_at,
    }
}

pub fn record(id: &str, sid: &str, start: Millis, end: Millis, title: &str) -> RawEitRecord {
    RawEitRecord {
        sid: sid.to_string(),
        event_id: Some(id.to_string()),
        start_time: start,
        end_time: end,
        title: Some(title.to_string()),
        description: None,
        genre: None,
        rating: None,
    }
}

/// Gateway double recording every EIT request
pub struct FakeGateway {
    services: Vec<Service>,
    schedules: Mutex<HashMap<String, Vec<RawEitRecord>>>,
    eit_calls: Mutex<Vec<String>>,
    service_calls: AtomicUsize,
    services_down: AtomicBool,
    notifications: broadcast::Sender<GatewayNotification>,
}

impl FakeGateway {
    pub fn new(services: Vec<Service>) -> Self {
        let (notifications, _) = broadcast::channel(16);
        Self {
            services,
            schedules: Mutex::new(HashMap::new()),
            eit_calls: Mutex::new(Vec::new()),
            service_calls: AtomicUsize::new(0),
            services_down: AtomicBool::new(false),
            notifications,
        }
    }

    pub fn set_schedule(&self, sid: &str, records: Vec<RawEitRecord>) {
        self.schedules
            .lock()
            .unwrap()
            .insert(sid.to_string(), records);
    }

    pub fn eit_calls(&self) -> Vec<String> {
        self.eit_calls.lock().unwrap().clone()
    }

    pub fn service_calls(&self) -> usize {
        self.service_calls.load(Ordering::SeqCst)
    }

    /// Make `fetch_services` fail until switched back
    pub fn set_services_down(&self, down: bool) {
        self.services_down.store(down, Ordering::SeqCst);
    }

    pub fn push(&self, notification: GatewayNotification) {
        self.notifications.send(notification).unwrap();
    }
}

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn fetch_eit_data(
        &self,
        service_id: &str,
        start: Millis,
        end: Millis,
    ) -> SourceResult<Vec<RawEitRecord>> {
        self.eit_calls.lock().unwrap().push(service_id.to_string());
        // Suspend so concurrent fetches of one service overlap
        tokio::task::yield_now().await;
        let schedules = self.schedules.lock().unwrap();
        Ok(schedules
            .get(service_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.start_time < end && r.end_time > start)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_services(&self) -> SourceResult<Vec<Service>> {
        self.service_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent readiness waiters pile up on the first refresh
        tokio::task::yield_now().await;
        if self.services_down.load(Ordering::SeqCst) {
            return Err(SourceError::http(503, "service list unavailable"));
        }
        Ok(self.services.clone())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<GatewayNotification>> {
        Some(self.notifications.subscribe())
    }
}

/// Metadata service double serving a fixed programme list
pub struct FakeMetadata {
    services: Vec<Service>,
    nodes: Vec<MetadataEvent>,
    calls: AtomicUsize,
}

impl FakeMetadata {
    pub fn new(services: Vec<Service>, nodes: Vec<MetadataEvent>) -> Self {
        Self {
            services,
            nodes,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataClient for FakeMetadata {
    async fn get_epg_data(&self, query: MetadataQuery) -> SourceResult<MetadataResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let service_ref = query.filter["serviceRef"].as_str().unwrap_or_default();
        Ok(MetadataResponse {
            nodes: self
                .nodes
                .iter()
                .filter(|n| n.service_ref == service_ref)
                .cloned()
                .collect(),
            z: None,
        })
    }

    async fn fetch_services(&self) -> SourceResult<Vec<Service>> {
        Ok(self.services.clone())
    }
}

pub struct Fixture {
    pub epg: Arc<Epg>,
    pub store: Arc<InMemoryEventStore>,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<FakeGateway>,
    pub metadata: Arc<FakeMetadata>,
}

/// Gateway services `a` (LCN 1) and `b` (LCN 2), IP service `ip` (LCN 100)
pub async fn fixture(config: EpgConfig) -> Fixture {
    fixture_with_nodes(config, Vec::new()).await
}

pub async fn fixture_with_nodes(config: EpgConfig, nodes: Vec<MetadataEvent>) -> Fixture {
    let store = Arc::new(InMemoryEventStore::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let gateway = Arc::new(FakeGateway::new(vec![
        service("a", 1, DeliveryMethod::Gateway),
        service("b", 2, DeliveryMethod::Gateway),
    ]));
    let metadata = Arc::new(FakeMetadata::new(
        vec![service("ip", 100, DeliveryMethod::Ip)],
        nodes,
    ));

    let epg = Epg::builder(config)
        .store(store.clone())
        .clock(clock.clone())
        .gateway(gateway.clone())
        .metadata(metadata.clone())
        .build()
        .await
        .unwrap();

    Fixture {
        epg: Arc::new(epg),
        store,
        clock,
        gateway,
        metadata,
    }
}

pub async fn cache(store: &InMemoryEventStore, events: Vec<EpgEvent>) {
    store.cache_events(events).await.unwrap();
}
