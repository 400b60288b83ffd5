use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

use super::EventStore;
use crate::errors::{CacheError, CacheResult};
use crate::models::{EpgEvent, Millis, Service, ServiceId};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS epg_services (
        service_id TEXT PRIMARY KEY,
        position INTEGER NOT NULL,
        payload TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS epg_events (
        event_id TEXT PRIMARY KEY,
        service_id TEXT NOT NULL,
        start_time INTEGER NOT NULL,
        end_time INTEGER NOT NULL,
        cache_timestamp INTEGER NOT NULL,
        payload TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_epg_events_window ON epg_events (service_id, start_time)",
    "CREATE INDEX IF NOT EXISTS idx_epg_events_cached ON epg_events (cache_timestamp)",
];

/// Event store persisted in SQLite
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: Pool<Sqlite>,
}

impl SqliteEventStore {
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30));

        // An in-memory database lives and dies with its single connection
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await?
        };

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> CacheResult<()> {
        let mut transaction = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&mut *transaction)
                .await
                .map_err(|e| CacheError::migration_failed(e.to_string()))?;
        }
        transaction.commit().await?;
        info!("Event cache schema ready");
        Ok(())
    }

    async fn upsert_event(
        transaction: &mut sqlx::Transaction<'_, Sqlite>,
        event: &EpgEvent,
    ) -> CacheResult<()> {
        let payload = serde_json::to_string(event)?;

        let superseded = sqlx::query(
            "DELETE FROM epg_events WHERE service_id = ? AND start_time = ? AND event_id != ?",
        )
        .bind(&event.service_id)
        .bind(event.start_time)
        .bind(&event.event_id)
        .execute(&mut **transaction)
        .await?;
        if superseded.rows_affected() > 0 {
            debug!(
                "Event {} superseded {} cached event(s) on service {}",
                event.event_id,
                superseded.rows_affected(),
                event.service_id
            );
        }

        sqlx::query(
            r#"
            INSERT INTO epg_events (event_id, service_id, start_time, end_time, cache_timestamp, payload)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id) DO UPDATE SET
                service_id = excluded.service_id,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                cache_timestamp = excluded.cache_timestamp,
                payload = excluded.payload
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.service_id)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.cache_timestamp)
        .bind(payload)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    fn decode_event(payload: &str) -> CacheResult<EpgEvent> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn fetch_services(&self) -> CacheResult<Vec<Service>> {
        let rows = sqlx::query("SELECT payload FROM epg_services ORDER BY position")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> CacheResult<Service> {
                Ok(serde_json::from_str(&row.get::<String, _>("payload"))?)
            })
            .collect()
    }

    async fn cache_service(&self, service: Service) -> CacheResult<()> {
        let payload = serde_json::to_string(&service)?;
        sqlx::query(
            r#"
            INSERT INTO epg_services (service_id, position, payload, updated_at)
            VALUES (?, (SELECT COALESCE(MAX(position) + 1, 0) FROM epg_services), ?, ?)
            ON CONFLICT(service_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&service.service_id)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_services(&self, services: Vec<Service>) -> CacheResult<()> {
        let mut transaction = self.pool.begin().await?;
        sqlx::query("DELETE FROM epg_services")
            .execute(&mut *transaction)
            .await?;

        let now = Utc::now().to_rfc3339();
        for (position, service) in services.iter().enumerate() {
            sqlx::query(
                "INSERT OR REPLACE INTO epg_services (service_id, position, payload, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&service.service_id)
            .bind(position as i64)
            .bind(serde_json::to_string(service)?)
            .bind(&now)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        debug!("Replaced cached service list with {} services", services.len());
        Ok(())
    }

    async fn cache_event(&self, event: EpgEvent) -> CacheResult<()> {
        let mut transaction = self.pool.begin().await?;
        Self::upsert_event(&mut transaction, &event).await?;
        transaction.commit().await?;
        Ok(())
    }

    async fn cache_events(&self, events: Vec<EpgEvent>) -> CacheResult<()> {
        let mut transaction = self.pool.begin().await?;
        for event in &events {
            Self::upsert_event(&mut transaction, event).await?;
        }
        transaction.commit().await?;
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> CacheResult<Option<EpgEvent>> {
        let row = sqlx::query("SELECT payload FROM epg_events WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::decode_event(&row.get::<String, _>("payload")))
            .transpose()
    }

    async fn get_events_by_window(
        &self,
        service_ids: &[ServiceId],
        start: Millis,
        end: Millis,
    ) -> CacheResult<Vec<EpgEvent>> {
        let mut result = Vec::new();
        for service_id in service_ids {
            let rows = sqlx::query(
                "SELECT payload FROM epg_events
                 WHERE service_id = ? AND start_time < ? AND end_time > ?
                 ORDER BY start_time",
            )
            .bind(service_id)
            .bind(end)
            .bind(start)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CacheError::query_failed("events by window", e.to_string()))?;

            for row in rows {
                result.push(Self::decode_event(&row.get::<String, _>("payload"))?);
            }
        }
        Ok(result)
    }

    async fn remove_events_older_than(&self, timestamp: Millis) -> CacheResult<usize> {
        let result = sqlx::query("DELETE FROM epg_events WHERE cache_timestamp < ?")
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn event_count(&self) -> CacheResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM epg_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
