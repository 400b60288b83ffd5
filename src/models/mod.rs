use serde::{Deserialize, Serialize};

pub mod event;
pub mod service;

/// Epoch milliseconds
pub type Millis = i64;

pub type ServiceId = String;

// Channel Models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub service_id: ServiceId,
    pub logical_channel_num: u32,
    pub name: String,
    pub service_type: ServiceType,
    pub delivery_method: DeliveryMethod,
    pub is_subscribed: bool,
    pub uri: Option<String>,
    /// Which list a registry entry came from after a merge pass
    #[serde(default)]
    pub origin: ChannelOrigin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceType {
    Tv,
    Radio,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryMethod {
    Gateway,
    Ip,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrigin {
    #[default]
    HeadEnd,
    Secondary,
    Merged,
}

/// Service attributes a secondary channel source may override during a merge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ServiceField {
    LogicalChannelNum,
    Name,
    ServiceType,
    DeliveryMethod,
    IsSubscribed,
    Uri,
}

// EPG Event Models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpgEvent {
    pub event_id: String,
    pub service_id: ServiceId,
    pub start_time: Millis,
    pub end_time: Millis,
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub rating_code: Option<String>,
    /// Precedence value resolved from the ratings table, if any
    pub parental_rating: Option<u32>,
    /// When this copy entered the cache
    pub cache_timestamp: Millis,
}

/// Synthesized filler covering a span with no programme data.
/// Has no identity and is never recordable or playable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderEvent {
    pub service_id: ServiceId,
    pub start_time: Millis,
    pub end_time: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    Real(EpgEvent),
    Placeholder(PlaceholderEvent),
}

/// A grid cell: an event plus boundaries clamped to the displayed window.
/// The wrapped event keeps its real start/end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GridEvent {
    pub event: Event,
    pub display_start_time: Millis,
    pub display_end_time: Millis,
}

/// Parental rating table entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rating {
    pub code: String,
    pub precedence_value: u32,
    #[serde(default)]
    pub description: Option<String>,
}

/// Change notifications published to event subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventUpdate {
    /// Events fetched from the gateway on behalf of a caller
    Fetched {
        service_id: ServiceId,
        events: Vec<EpgEvent>,
    },
    /// Events pushed unsolicited by the gateway
    Pushed { events: Vec<EpgEvent> },
}
