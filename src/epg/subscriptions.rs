//! Gateway push folding
//!
//! Channel list pushes replace the cached service list and rebuild the
//! registry with callbacks fired. Event list pushes are cached and published
//! to [`Epg::subscribe_events`] receivers.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Epg;
use crate::config::DataSourceKind;
use crate::sources::GatewayNotification;

impl Epg {
    /// Spawn a task folding gateway pushes into the cache. `None` when the
    /// gateway is not an enabled source or cannot push.
    pub fn start_push_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config().has_data_source(DataSourceKind::Gateway) {
            return None;
        }
        let mut notifications = self.router().gateway()?.subscribe()?;
        let epg = Arc::clone(self);

        info!("Listening for gateway pushes");
        Some(tokio::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(notification) => epg.handle_notification(notification).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Push listener lagged, {} gateway notifications lost", skipped);
                    }
                    Err(RecvError::Closed) => {
                        info!("Gateway notification stream closed");
                        break;
                    }
                }
            }
        }))
    }

    pub async fn handle_notification(&self, notification: GatewayNotification) {
        match notification {
            GatewayNotification::ChannelListUpdated { services } => {
                info!("Gateway pushed a channel list of {} services", services.len());
                if let Err(e) = self.store().replace_services(services).await {
                    warn!("Failed to cache pushed channel list: {}", e);
                    return;
                }
                if let Err(e) = self.rebuild_from_store(true).await {
                    warn!("Failed to rebuild channels after push: {}", e);
                }
            }
            GatewayNotification::EventListUpdated { events } => {
                let folded = self.router().ingest_pushed_events(events).await;
                debug!("Folded {} pushed events", folded.len());
            }
        }
    }
}
