use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::EventStore;
use crate::errors::CacheResult;
use crate::models::{EpgEvent, Millis, Service, ServiceId};

#[derive(Default)]
struct EventTables {
    by_id: HashMap<String, EpgEvent>,
    /// service id -> start time -> event id
    by_service: HashMap<ServiceId, BTreeMap<Millis, String>>,
}

impl EventTables {
    fn remove(&mut self, event_id: &str) -> Option<EpgEvent> {
        let event = self.by_id.remove(event_id)?;
        if let Some(index) = self.by_service.get_mut(&event.service_id) {
            if index.get(&event.start_time).map(String::as_str) == Some(event_id) {
                index.remove(&event.start_time);
            }
            if index.is_empty() {
                self.by_service.remove(&event.service_id);
            }
        }
        Some(event)
    }

    fn upsert(&mut self, event: EpgEvent) {
        self.remove(&event.event_id);

        let superseded = self
            .by_service
            .get(&event.service_id)
            .and_then(|index| index.get(&event.start_time))
            .cloned();
        if let Some(old_id) = superseded {
            debug!(
                "Event {} supersedes {} on service {} at {}",
                event.event_id, old_id, event.service_id, event.start_time
            );
            self.remove(&old_id);
        }

        self.by_service
            .entry(event.service_id.clone())
            .or_default()
            .insert(event.start_time, event.event_id.clone());
        self.by_id.insert(event.event_id.clone(), event);
    }
}

/// RAM-only event store
#[derive(Default)]
pub struct InMemoryEventStore {
    services: RwLock<Vec<Service>>,
    events: RwLock<EventTables>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn fetch_services(&self) -> CacheResult<Vec<Service>> {
        Ok(self.services.read().await.clone())
    }

    async fn cache_service(&self, service: Service) -> CacheResult<()> {
        let mut services = self.services.write().await;
        match services
            .iter_mut()
            .find(|s| s.service_id == service.service_id)
        {
            Some(existing) => *existing = service,
            None => services.push(service),
        }
        Ok(())
    }

    async fn replace_services(&self, services: Vec<Service>) -> CacheResult<()> {
        *self.services.write().await = services;
        Ok(())
    }

    async fn cache_event(&self, event: EpgEvent) -> CacheResult<()> {
        self.events.write().await.upsert(event);
        Ok(())
    }

    async fn cache_events(&self, events: Vec<EpgEvent>) -> CacheResult<()> {
        let mut tables = self.events.write().await;
        for event in events {
            tables.upsert(event);
        }
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> CacheResult<Option<EpgEvent>> {
        Ok(self.events.read().await.by_id.get(event_id).cloned())
    }

    async fn get_events_by_window(
        &self,
        service_ids: &[ServiceId],
        start: Millis,
        end: Millis,
    ) -> CacheResult<Vec<EpgEvent>> {
        let tables = self.events.read().await;
        let mut result = Vec::new();
        for service_id in service_ids {
            let Some(index) = tables.by_service.get(service_id) else {
                continue;
            };
            result.extend(
                index
                    .range(..end)
                    .filter_map(|(_, id)| tables.by_id.get(id))
                    .filter(|e| e.overlaps(start, end))
                    .cloned(),
            );
        }
        Ok(result)
    }

    async fn remove_events_older_than(&self, timestamp: Millis) -> CacheResult<usize> {
        let mut tables = self.events.write().await;
        let expired: Vec<String> = tables
            .by_id
            .values()
            .filter(|e| e.cache_timestamp < timestamp)
            .map(|e| e.event_id.clone())
            .collect();
        for event_id in &expired {
            tables.remove(event_id);
        }
        Ok(expired.len())
    }

    async fn event_count(&self) -> CacheResult<usize> {
        Ok(self.events.read().await.by_id.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelOrigin, DeliveryMethod, ServiceType};

    const DAY: Millis = 86_400_000;

    fn event(id: &str, service: &str, start: Millis, end: Millis, cached_at: Millis) -> EpgEvent {
        EpgEvent {
            event_id: id.to_string(),
            service_id: service.to_string(),
            start_time: start,
            end_time: end,
            title: format!("Programme {id}"),
            description: Some("Description".to_string()),
            genre: Some("news".to_string()),
            rating_code: Some("PG".to_string()),
            parental_rating: Some(2),
            cache_timestamp: cached_at,
        }
    }

    #[tokio::test]
    async fn test_cache_then_read_back_by_id() {
        let store = InMemoryEventStore::new();
        let original = event("e1", "s1", 0, 100, 5);
        store.cache_event(original.clone()).await.unwrap();
        store.cache_event(original.clone()).await.unwrap();

        assert_eq!(store.get_event("e1").await.unwrap(), Some(original));
        assert_eq!(store.event_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_window_query_groups_by_requested_service_order() {
        let store = InMemoryEventStore::new();
        store
            .cache_events(vec![
                event("a2", "a", 100, 200, 0),
                event("a1", "a", 0, 100, 0),
                event("b1", "b", 0, 200, 0),
                event("a3", "a", 200, 300, 0),
            ])
            .await
            .unwrap();

        let events = store
            .get_events_by_window(&["b".to_string(), "a".to_string()], 50, 200)
            .await
            .unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "a1", "a2"]);
    }

    #[tokio::test]
    async fn test_same_start_supersedes_previous_event() {
        let store = InMemoryEventStore::new();
        store.cache_event(event("old", "s1", 0, 100, 0)).await.unwrap();
        store.cache_event(event("new", "s1", 0, 120, 0)).await.unwrap();

        assert!(store.get_event("old").await.unwrap().is_none());
        let at = store.get_event_at_time("s1", 110).await.unwrap().unwrap();
        assert_eq!(at.event_id, "new");
    }

    #[tokio::test]
    async fn test_moving_an_event_reindexes_it() {
        let store = InMemoryEventStore::new();
        store.cache_event(event("e1", "s1", 0, 100, 0)).await.unwrap();
        store.cache_event(event("e1", "s1", 500, 600, 0)).await.unwrap();

        assert!(store.get_event_at_time("s1", 50).await.unwrap().is_none());
        assert!(store.get_event_at_time("s1", 550).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_event_at_end_of_time_range() {
        let store = InMemoryEventStore::new();
        store
            .cache_event(event("last", "s1", Millis::MAX - 10, Millis::MAX, 0))
            .await
            .unwrap();

        let at = store.get_event_at_time("s1", Millis::MAX - 1).await.unwrap();
        assert_eq!(at.unwrap().event_id, "last");
        assert!(store
            .get_event_at_time("s1", Millis::MAX)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_remove_events_older_than() {
        let now = 30 * DAY;
        let store = InMemoryEventStore::new();
        store
            .cache_events(vec![
                event("old", "s1", 0, 100, now - 8 * DAY),
                event("recent", "s1", 100, 200, now - 6 * DAY),
            ])
            .await
            .unwrap();

        let removed = store.remove_events_older_than(now - 7 * DAY).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_event("old").await.unwrap().is_none());
        assert!(store.get_event("recent").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cache_service_upserts() {
        let store = InMemoryEventStore::new();
        let mut service = Service {
            service_id: "s1".to_string(),
            logical_channel_num: 1,
            name: "One".to_string(),
            service_type: ServiceType::Tv,
            delivery_method: DeliveryMethod::Gateway,
            is_subscribed: true,
            uri: None,
            origin: ChannelOrigin::HeadEnd,
        };
        store.cache_service(service.clone()).await.unwrap();
        service.name = "One HD".to_string();
        store.cache_service(service).await.unwrap();

        let services = store.fetch_services().await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "One HD");
    }
}
