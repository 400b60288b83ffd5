//! Event store: the cache of services and EPG events
//!
//! Two backends share the [`EventStore`] contract: a RAM store for boxes
//! without flash budget and a SQLite store that survives restarts. Reads
//! never reach a data source; fetching on a miss is the facade's job.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub mod memory;
pub mod sqlite;
pub mod validity;

pub use memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;
pub use validity::{check_window, WindowValidity};

use crate::config::{CacheType, EpgConfig};
use crate::errors::CacheResult;
use crate::models::{EpgEvent, Millis, Service, ServiceId};

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Full cached head-end service list
    async fn fetch_services(&self) -> CacheResult<Vec<Service>>;

    /// Upsert one service by id
    async fn cache_service(&self, service: Service) -> CacheResult<()>;

    /// Replace the whole cached service list
    async fn replace_services(&self, services: Vec<Service>) -> CacheResult<()>;

    /// Upsert one event by id. An event of the same service starting at the
    /// same instant under another id is superseded.
    async fn cache_event(&self, event: EpgEvent) -> CacheResult<()>;

    async fn cache_events(&self, events: Vec<EpgEvent>) -> CacheResult<()> {
        for event in events {
            self.cache_event(event).await?;
        }
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> CacheResult<Option<EpgEvent>>;

    /// Cached events intersecting `[start, end)`, grouped in `service_ids`
    /// order and sorted by start time within a service. May be partial.
    async fn get_events_by_window(
        &self,
        service_ids: &[ServiceId],
        start: Millis,
        end: Millis,
    ) -> CacheResult<Vec<EpgEvent>>;

    async fn get_event_at_time(
        &self,
        service_id: &str,
        time: Millis,
    ) -> CacheResult<Option<EpgEvent>> {
        let events = self
            .get_events_by_window(&[service_id.to_string()], time, time.saturating_add(1))
            .await?;
        Ok(events.into_iter().find(|e| e.contains(time)))
    }

    /// Delete every event cached before `timestamp`; returns how many went
    async fn remove_events_older_than(&self, timestamp: Millis) -> CacheResult<usize>;

    async fn event_count(&self) -> CacheResult<usize>;
}

/// Open the store selected by `cache_type`
pub async fn open_store(config: &EpgConfig) -> CacheResult<Arc<dyn EventStore>> {
    match config.cache_type {
        CacheType::Ram => {
            info!("Using RAM event cache");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
        CacheType::Persistent => {
            info!("Using persistent event cache at {}", config.database_url);
            let store = SqliteEventStore::connect(&config.database_url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}
