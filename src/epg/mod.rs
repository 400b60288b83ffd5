//! EPG facade
//!
//! [`Epg`] composes the event store, the channel registry and the data
//! source router. Two families of event operations exist:
//!
//! - `get_*` read the cache only. They never reach a data source and return
//!   cached events even when stale.
//! - `fetch_*` read the cache and fall back to the service's data source when
//!   the cached answer is missing, incomplete or stale. Stale events are not
//!   returned by these; the fresh fetch is awaited instead.
//!
//! Neither family surfaces errors. Store failures and unavailable sources are
//! logged and come back as `None` or an empty list.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod subscriptions;
pub mod sweeper;

use crate::cache::{check_window, open_store, EventStore};
use crate::clock::{Clock, SystemClock};
use crate::config::{defaults::DEFAULT_NOTIFICATION_CAPACITY, DataSourceKind, EpgConfig};
use crate::errors::EpgResult;
use crate::gap_filler::pad_grid_row;
use crate::models::event::duration_millis;
use crate::models::{
    EpgEvent, EventUpdate, GridEvent, Millis, PlaceholderEvent, Service, ServiceId,
};
use crate::registry::{
    ChannelRegistry, ChannelSnapshot, MergeSpec, RefreshCallback, RefreshSubscription,
};
use crate::sources::{
    DataSourceRouter, FetchOperation, GatewayClient, HttpGatewayClient, HttpMetadataClient,
    MetadataClient, Ratings,
};

pub struct Epg {
    config: EpgConfig,
    store: Arc<dyn EventStore>,
    registry: ChannelRegistry,
    router: DataSourceRouter,
    clock: Arc<dyn Clock>,
    updates: broadcast::Sender<EventUpdate>,
    ready_gate: Mutex<()>,
}

/// Assembles an [`Epg`] from configuration plus optional injected collaborators
pub struct EpgBuilder {
    config: EpgConfig,
    store: Option<Arc<dyn EventStore>>,
    clock: Option<Arc<dyn Clock>>,
    gateway: Option<Arc<dyn GatewayClient>>,
    metadata: Option<Arc<dyn MetadataClient>>,
    ratings: Option<Arc<dyn Ratings>>,
}

impl EpgBuilder {
    pub fn new(config: EpgConfig) -> Self {
        Self {
            config,
            store: None,
            clock: None,
            gateway: None,
            metadata: None,
            ratings: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn GatewayClient>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataClient>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn ratings(mut self, ratings: Arc<dyn Ratings>) -> Self {
        self.ratings = Some(ratings);
        self
    }

    /// Open the configured store unless one was injected and wire the router
    pub async fn build(self) -> EpgResult<Epg> {
        self.config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => open_store(&self.config).await?,
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let (updates, _) = broadcast::channel(DEFAULT_NOTIFICATION_CAPACITY);

        let mut router =
            DataSourceRouter::new(&self.config, store.clone(), clock.clone(), updates.clone());
        if let Some(gateway) = self.gateway {
            router = router.with_gateway(gateway);
        }
        if let Some(metadata) = self.metadata {
            router = router.with_metadata(metadata);
        }
        if let Some(ratings) = self.ratings {
            router = router.with_ratings(ratings);
        }

        info!(
            "EPG initialised: {:?} cache, sources {:?}, cache_events={}",
            self.config.cache_type, self.config.data_sources, self.config.cache_events
        );

        Ok(Epg {
            config: self.config,
            store,
            registry: ChannelRegistry::new(),
            router,
            clock,
            updates,
            ready_gate: Mutex::new(()),
        })
    }
}

impl Epg {
    pub fn builder(config: EpgConfig) -> EpgBuilder {
        EpgBuilder::new(config)
    }

    /// Build with HTTP clients for every enabled source that has a client section
    pub async fn init(config: EpgConfig) -> EpgResult<Self> {
        let mut builder = EpgBuilder::new(config.clone());

        if config.has_data_source(DataSourceKind::Gateway) {
            if let Some(section) = &config.gateway {
                builder = builder.gateway(Arc::new(HttpGatewayClient::new(section)?));
            }
        }
        if config.has_data_source(DataSourceKind::Sdp) {
            if let Some(section) = &config.metadata {
                builder = builder.metadata(Arc::new(HttpMetadataClient::new(section)?));
            }
        }

        builder.build().await
    }

    pub fn config(&self) -> &EpgConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    fn now(&self) -> Millis {
        self.clock.now_millis()
    }

    // Channel list

    /// Sync the service list from the configured sources into the store,
    /// then rebuild the registry from the store.
    pub async fn refresh(&self, fire_callbacks: bool) -> EpgResult<Arc<ChannelSnapshot>> {
        if let Some(services) = self.router.fetch_services().await {
            if let Err(e) = self.store.replace_services(services).await {
                warn!("Failed to cache synced service list: {}", e);
            }
        }
        self.rebuild_from_store(fire_callbacks).await
    }

    pub(crate) async fn rebuild_from_store(
        &self,
        fire_callbacks: bool,
    ) -> EpgResult<Arc<ChannelSnapshot>> {
        let services = self.store.fetch_services().await?;
        Ok(self.registry.rebuild(services, fire_callbacks))
    }

    /// Refresh first while the registry is empty. Concurrent callers queue
    /// on the gate and share one refresh; an empty result is retried by the
    /// next caller. Returns whether channels are available.
    pub async fn ensure_ready(&self) -> bool {
        if self.registry.is_populated() {
            return true;
        }
        let _gate = self.ready_gate.lock().await;
        if self.registry.is_populated() {
            return true;
        }
        debug!("Channel registry empty, refreshing before fetch");
        if let Err(e) = self.refresh(true).await {
            warn!("Channel refresh before fetch failed: {}", e);
        }
        self.registry.is_populated()
    }

    pub fn merge_channels(&self, spec: MergeSpec) -> Arc<ChannelSnapshot> {
        self.registry.merge_channels(spec)
    }

    pub fn un_merge_channels(&self) -> Arc<ChannelSnapshot> {
        self.registry.un_merge_channels()
    }

    pub fn channels(&self) -> Arc<ChannelSnapshot> {
        self.registry.snapshot()
    }

    pub fn get_channel_by_service_id(&self, service_id: &str) -> Option<Arc<Service>> {
        self.registry.snapshot().get_by_service_id(service_id)
    }

    pub fn get_channel_by_lcn(&self, lcn: u32) -> Option<Arc<Service>> {
        self.registry.snapshot().get_by_lcn(lcn)
    }

    pub fn get_channel_by_service_uri(&self, uri: &str) -> Option<Arc<Service>> {
        self.registry.snapshot().get_by_uri(uri)
    }

    /// Channel carrying a cached event
    pub async fn get_channel_by_event_id(&self, event_id: &str) -> Option<Arc<Service>> {
        let event = self.get_event_by_id(event_id).await?;
        self.get_channel_by_service_id(&event.service_id)
    }

    pub fn get_all_channels(&self) -> Vec<Arc<Service>> {
        self.registry.snapshot().all_channels().to_vec()
    }

    pub fn get_subscribed_channels(&self) -> Vec<Arc<Service>> {
        self.registry.snapshot().subscribed_channels().to_vec()
    }

    pub fn get_radio_channels(&self) -> Vec<Arc<Service>> {
        self.registry.snapshot().radio_channels().to_vec()
    }

    pub fn get_video_channels(&self) -> Vec<Arc<Service>> {
        self.registry.snapshot().video_channels().to_vec()
    }

    pub fn get_ip_channels(&self) -> Vec<Arc<Service>> {
        self.registry.snapshot().ip_channels().to_vec()
    }

    pub fn get_service_id_array(&self) -> Vec<ServiceId> {
        self.registry.snapshot().service_id_array().to_vec()
    }

    pub fn get_next_channel(&self, lcn: u32) -> Option<Arc<Service>> {
        self.registry.snapshot().next_channel(lcn)
    }

    pub fn get_previous_channel(&self, lcn: u32) -> Option<Arc<Service>> {
        self.registry.snapshot().previous_channel(lcn)
    }

    pub fn is_channel_subscribed(&self, service_id: &str) -> bool {
        self.get_channel_by_service_id(service_id)
            .map(|s| s.is_subscribed)
            .unwrap_or(false)
    }

    pub fn register_refresh_callback<F>(&self, callback: F) -> RefreshSubscription
    where
        F: Fn(&ChannelSnapshot) + Send + Sync + 'static,
    {
        let callback: RefreshCallback = Arc::new(callback);
        self.registry.register_refresh_callback(callback)
    }

    pub fn unregister_refresh_callback(&self, subscription: RefreshSubscription) {
        debug!("Unregistering refresh callback {}", subscription.id());
        drop(subscription);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EventUpdate> {
        self.updates.subscribe()
    }

    // Cache-only event reads

    pub async fn get_event_by_id(&self, event_id: &str) -> Option<EpgEvent> {
        self.store
            .get_event(event_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Event lookup {} failed: {}", event_id, e);
                None
            })
    }

    pub async fn get_event_at_time(&self, service_id: &str, time: Millis) -> Option<EpgEvent> {
        self.store
            .get_event_at_time(service_id, time)
            .await
            .unwrap_or_else(|e| {
                warn!("Cached event lookup for {} failed: {}", service_id, e);
                None
            })
    }

    pub async fn get_current_event_for_service(&self, service_id: &str) -> Option<EpgEvent> {
        self.get_event_at_time(service_id, self.now()).await
    }

    pub async fn get_next_event_for_service(&self, service_id: &str) -> Option<EpgEvent> {
        let now = self.now();
        let cached = self.cached_neighbourhood(service_id, now).await;
        pick_next(&cached, now).cloned()
    }

    pub async fn get_previous_event_for_service(&self, service_id: &str) -> Option<EpgEvent> {
        let now = self.now();
        let cached = self.cached_neighbourhood(service_id, now).await;
        pick_previous(&cached, now).cloned()
    }

    pub async fn get_events_by_window(
        &self,
        service_ids: &[ServiceId],
        start: Millis,
        end: Millis,
    ) -> Vec<EpgEvent> {
        self.store
            .get_events_by_window(service_ids, start, end)
            .await
            .unwrap_or_else(|e| {
                warn!("Cached window lookup failed: {}", e);
                Vec::new()
            })
    }

    async fn cached_neighbourhood(&self, service_id: &str, now: Millis) -> Vec<EpgEvent> {
        let span = duration_millis(self.config.neighbour_window);
        self.get_events_by_window(
            &[service_id.to_string()],
            now.saturating_sub(span),
            now.saturating_add(span),
        )
        .await
    }

    // Cache-or-source event reads

    pub async fn fetch_current_event_for_service(&self, service_id: &str) -> Option<EpgEvent> {
        self.fetch_at(service_id, self.now(), FetchOperation::Current)
            .await
    }

    pub async fn fetch_event_at_time(&self, service_id: &str, time: Millis) -> Option<EpgEvent> {
        self.fetch_at(service_id, time, FetchOperation::AtTime).await
    }

    async fn fetch_at(
        &self,
        service_id: &str,
        time: Millis,
        operation: FetchOperation,
    ) -> Option<EpgEvent> {
        if let Some(cached) = self.get_event_at_time(service_id, time).await {
            if !cached.is_stale(self.now(), self.config.cache_expiry_time) {
                return Some(cached);
            }
            debug!("Cached event {} is stale, re-fetching", cached.event_id);
        }

        let service = self.service_for_fetch(service_id).await?;
        self.router
            .fetch_window(&service, time, time.saturating_add(1), operation)
            .await
            .into_iter()
            .find(|e| e.contains(time))
    }

    pub async fn fetch_next_event_for_service(&self, service_id: &str) -> Option<EpgEvent> {
        let now = self.now();
        let cached = self.cached_neighbourhood(service_id, now).await;
        if let Some(event) = self.fresh_neighbour(&cached, now, true) {
            return Some(event);
        }

        let service = self.service_for_fetch(service_id).await?;
        let span = duration_millis(self.config.neighbour_window);
        let fetched = self
            .router
            .fetch_window(&service, now, now.saturating_add(span), FetchOperation::Next)
            .await;
        pick_next(&fetched, now).cloned()
    }

    pub async fn fetch_previous_event_for_service(&self, service_id: &str) -> Option<EpgEvent> {
        let now = self.now();
        let cached = self.cached_neighbourhood(service_id, now).await;
        if let Some(event) = self.fresh_neighbour(&cached, now, false) {
            return Some(event);
        }

        let service = self.service_for_fetch(service_id).await?;
        let span = duration_millis(self.config.neighbour_window);
        let fetched = self
            .router
            .fetch_window(
                &service,
                now.saturating_sub(span),
                now.saturating_add(1),
                FetchOperation::Previous,
            )
            .await;
        pick_previous(&fetched, now).cloned()
    }

    /// A cached neighbour is trusted only when it directly abuts a cached
    /// current event and both are fresh.
    fn fresh_neighbour(&self, cached: &[EpgEvent], now: Millis, next: bool) -> Option<EpgEvent> {
        let expiry = self.config.cache_expiry_time;
        let current = cached.iter().find(|e| e.contains(now))?;
        let neighbour = if next {
            cached.iter().find(|e| e.start_time == current.end_time)?
        } else {
            cached.iter().rev().find(|e| e.end_time == current.start_time)?
        };
        if current.is_stale(now, expiry) || neighbour.is_stale(now, expiry) {
            return None;
        }
        Some(neighbour.clone())
    }

    /// Events for every service in `service_ids`, grouped in input order.
    /// Each service is answered from cache when its cached window is valid
    /// and fetched otherwise; all services are awaited before returning.
    pub async fn fetch_events_by_window(
        &self,
        service_ids: &[ServiceId],
        start: Millis,
        end: Millis,
    ) -> Vec<EpgEvent> {
        self.fetch_rows(service_ids, start, end)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// One padded grid row per service, in input order
    pub async fn fetch_events_by_window_padded<F>(
        &self,
        service_ids: &[ServiceId],
        start: Millis,
        end: Millis,
        get_dummy_event: F,
    ) -> Vec<Vec<GridEvent>>
    where
        F: Fn(&str, Millis, Millis) -> PlaceholderEvent,
    {
        self.fetch_rows(service_ids, start, end)
            .await
            .into_iter()
            .zip(service_ids)
            .map(|(events, service_id)| {
                pad_grid_row(service_id, start, end, &get_dummy_event, &events)
            })
            .collect()
    }

    async fn fetch_rows(
        &self,
        service_ids: &[ServiceId],
        start: Millis,
        end: Millis,
    ) -> Vec<Vec<EpgEvent>> {
        if start >= end {
            return vec![Vec::new(); service_ids.len()];
        }
        self.ensure_ready().await;
        join_all(
            service_ids
                .iter()
                .map(|service_id| self.fetch_service_window(service_id, start, end)),
        )
        .await
    }

    async fn fetch_service_window(
        &self,
        service_id: &str,
        start: Millis,
        end: Millis,
    ) -> Vec<EpgEvent> {
        let cached = self
            .get_events_by_window(&[service_id.to_string()], start, end)
            .await;
        let validity = check_window(
            &cached,
            start,
            end,
            self.now(),
            self.config.cache_expiry_time,
        );
        if validity.is_valid() {
            return cached;
        }
        debug!("Cached window for {} not usable: {:?}", service_id, validity);

        let Some(service) = self.get_channel_by_service_id(service_id) else {
            debug!("Unknown service {}, nothing to fetch", service_id);
            return Vec::new();
        };
        self.router
            .fetch_window(&service, start, end, FetchOperation::Window)
            .await
            .into_iter()
            .filter(|e| e.overlaps(start, end))
            .collect()
    }

    async fn service_for_fetch(&self, service_id: &str) -> Option<Arc<Service>> {
        if !self.ensure_ready().await {
            debug!("No channels available, cannot fetch for {}", service_id);
            return None;
        }
        let service = self.get_channel_by_service_id(service_id);
        if service.is_none() {
            debug!("Unknown service {}, nothing to fetch", service_id);
        }
        service
    }

    // Maintenance

    /// Delete every event cached longer ago than `expired_events_time`
    pub async fn sweep_expired(&self) -> EpgResult<usize> {
        let cutoff = self
            .now()
            .saturating_sub(duration_millis(self.config.expired_events_time));
        let removed = self.store.remove_events_older_than(cutoff).await?;
        if removed > 0 {
            info!("Expiry sweep removed {} events cached before {}", removed, cutoff);
        } else {
            debug!("Expiry sweep found nothing cached before {}", cutoff);
        }
        Ok(removed)
    }

    pub(crate) fn router(&self) -> &DataSourceRouter {
        &self.router
    }
}

impl std::fmt::Debug for Epg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Epg")
            .field("config", &self.config)
            .field("channels", &self.registry.snapshot().len())
            .finish()
    }
}

/// Event after the one airing at `now`, or the first starting after `now`
fn pick_next(events: &[EpgEvent], now: Millis) -> Option<&EpgEvent> {
    let anchor = events
        .iter()
        .find(|e| e.contains(now))
        .map(|e| e.end_time)
        .unwrap_or(now);
    events.iter().find(|e| e.start_time >= anchor)
}

/// Event before the one airing at `now`, or the last ending by `now`
fn pick_previous(events: &[EpgEvent], now: Millis) -> Option<&EpgEvent> {
    let anchor = events
        .iter()
        .find(|e| e.contains(now))
        .map(|e| e.start_time)
        .unwrap_or(now);
    events.iter().rev().find(|e| e.end_time <= anchor)
}
