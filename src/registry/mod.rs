//! Channel registry
//!
//! Holds the current channel list as an immutable [`ChannelSnapshot`]. A
//! rebuild produces a new snapshot and swaps it in whole, so readers always
//! see one consistent list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

pub mod merge;
pub mod subscriptions;

pub use merge::{merge_channels, ChannelPredicate, MergeSpec};
pub use subscriptions::{RefreshCallback, RefreshCallbacks, RefreshSubscription};

use crate::models::{Service, ServiceId};

/// One consistent view of the channel list and its derived categories.
/// All lists are ordered by logical channel number.
#[derive(Debug, Default)]
pub struct ChannelSnapshot {
    all: Vec<Arc<Service>>,
    by_id: HashMap<ServiceId, Arc<Service>>,
    subscribed: Vec<Arc<Service>>,
    radio: Vec<Arc<Service>>,
    video: Vec<Arc<Service>>,
    ip: Vec<Arc<Service>>,
    service_id_array: Vec<ServiceId>,
}

impl ChannelSnapshot {
    pub fn build(mut services: Vec<Service>) -> Self {
        services.sort_by_key(|s| s.logical_channel_num);

        let mut snapshot = Self::default();
        for service in services {
            let service = Arc::new(service);
            if snapshot.by_id.contains_key(&service.service_id) {
                debug!(
                    "Duplicate service id {} in channel list, keeping first",
                    service.service_id
                );
                continue;
            }
            snapshot
                .by_id
                .insert(service.service_id.clone(), service.clone());
            snapshot.service_id_array.push(service.service_id.clone());
            if service.is_subscribed {
                snapshot.subscribed.push(service.clone());
            }
            if service.is_radio() {
                snapshot.radio.push(service.clone());
            }
            if service.is_video() {
                snapshot.video.push(service.clone());
            }
            if service.is_ip_delivered() {
                snapshot.ip.push(service.clone());
            }
            snapshot.all.push(service);
        }
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn all_channels(&self) -> &[Arc<Service>] {
        &self.all
    }

    pub fn subscribed_channels(&self) -> &[Arc<Service>] {
        &self.subscribed
    }

    pub fn radio_channels(&self) -> &[Arc<Service>] {
        &self.radio
    }

    pub fn video_channels(&self) -> &[Arc<Service>] {
        &self.video
    }

    pub fn ip_channels(&self) -> &[Arc<Service>] {
        &self.ip
    }

    pub fn service_id_array(&self) -> &[ServiceId] {
        &self.service_id_array
    }

    pub fn get_by_service_id(&self, service_id: &str) -> Option<Arc<Service>> {
        self.by_id.get(service_id).cloned()
    }

    pub fn get_by_lcn(&self, lcn: u32) -> Option<Arc<Service>> {
        self.all
            .iter()
            .find(|s| s.logical_channel_num == lcn)
            .cloned()
    }

    pub fn get_by_uri(&self, uri: &str) -> Option<Arc<Service>> {
        self.all
            .iter()
            .find(|s| s.uri.as_deref() == Some(uri))
            .cloned()
    }

    /// Channel after `lcn` in LCN order, wrapping to the first
    pub fn next_channel(&self, lcn: u32) -> Option<Arc<Service>> {
        self.all
            .iter()
            .find(|s| s.logical_channel_num > lcn)
            .or_else(|| self.all.first())
            .cloned()
    }

    /// Channel before `lcn` in LCN order, wrapping to the last
    pub fn previous_channel(&self, lcn: u32) -> Option<Arc<Service>> {
        self.all
            .iter()
            .rev()
            .find(|s| s.logical_channel_num < lcn)
            .or_else(|| self.all.last())
            .cloned()
    }
}

pub struct ChannelRegistry {
    snapshot: RwLock<Arc<ChannelSnapshot>>,
    /// Last head-end list, kept so a merge change can rebuild without a fetch
    primary: Mutex<Vec<Service>>,
    merge_spec: Mutex<Option<MergeSpec>>,
    callbacks: RefreshCallbacks,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(ChannelSnapshot::default())),
            primary: Mutex::new(Vec::new()),
            merge_spec: Mutex::new(None),
            callbacks: RefreshCallbacks::new(),
        }
    }

    pub fn snapshot(&self) -> Arc<ChannelSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_populated(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Replace the head-end list and rebuild every derived list
    pub fn rebuild(&self, primary: Vec<Service>, fire_callbacks: bool) -> Arc<ChannelSnapshot> {
        *self
            .primary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = primary;
        self.rebuild_from_primary(fire_callbacks)
    }

    fn rebuild_from_primary(&self, fire_callbacks: bool) -> Arc<ChannelSnapshot> {
        let services = {
            let primary = self
                .primary
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let merge_spec = self
                .merge_spec
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match merge_spec.as_ref() {
                Some(spec) => merge_channels(&primary, spec),
                None => primary.clone(),
            }
        };

        let snapshot = Arc::new(ChannelSnapshot::build(services));
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot.clone();

        info!(
            "Channel registry rebuilt: {} channels ({} subscribed, {} radio, {} video, {} IP)",
            snapshot.len(),
            snapshot.subscribed.len(),
            snapshot.radio.len(),
            snapshot.video.len(),
            snapshot.ip.len()
        );

        if fire_callbacks {
            self.callbacks.fire(&snapshot);
        }
        snapshot
    }

    /// Merge `spec` into this and every later rebuild
    pub fn merge_channels(&self, spec: MergeSpec) -> Arc<ChannelSnapshot> {
        debug!("Installing channel merge: {:?}", spec);
        *self
            .merge_spec
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(spec);
        self.rebuild_from_primary(true)
    }

    pub fn un_merge_channels(&self) -> Arc<ChannelSnapshot> {
        debug!("Clearing channel merge");
        *self
            .merge_spec
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        self.rebuild_from_primary(true)
    }

    pub fn register_refresh_callback(&self, callback: RefreshCallback) -> RefreshSubscription {
        self.callbacks.register(callback)
    }

    pub fn refresh_callback_count(&self) -> usize {
        self.callbacks.len()
    }
}
