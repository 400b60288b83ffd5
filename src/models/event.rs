//! Event model behaviour: time containment, staleness and the tagged event accessors

use std::time::Duration;

use crate::models::{EpgEvent, Event, GridEvent, Millis, PlaceholderEvent};

impl EpgEvent {
    /// True when `time` falls in `[start_time, end_time)`
    pub fn contains(&self, time: Millis) -> bool {
        self.start_time <= time && time < self.end_time
    }

    /// True when the event intersects `[start, end)`
    pub fn overlaps(&self, start: Millis, end: Millis) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// A stale event is still served by the cache-only getters but is
    /// re-fetched by the async paths.
    pub fn is_stale(&self, now: Millis, cache_expiry_time: Duration) -> bool {
        now - self.cache_timestamp >= duration_millis(cache_expiry_time)
    }

    pub fn duration_millis(&self) -> Millis {
        self.end_time - self.start_time
    }
}

impl PlaceholderEvent {
    pub fn new<S: Into<String>>(service_id: S, start_time: Millis, end_time: Millis) -> Self {
        Self {
            service_id: service_id.into(),
            start_time,
            end_time,
        }
    }
}

/// Default placeholder generator, usable wherever a dummy-event factory is expected
pub fn default_placeholder(service_id: &str, start_time: Millis, end_time: Millis) -> PlaceholderEvent {
    PlaceholderEvent::new(service_id, start_time, end_time)
}

impl Event {
    pub fn service_id(&self) -> &str {
        match self {
            Event::Real(e) => &e.service_id,
            Event::Placeholder(p) => &p.service_id,
        }
    }

    pub fn start_time(&self) -> Millis {
        match self {
            Event::Real(e) => e.start_time,
            Event::Placeholder(p) => p.start_time,
        }
    }

    pub fn end_time(&self) -> Millis {
        match self {
            Event::Real(e) => e.end_time,
            Event::Placeholder(p) => p.end_time,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Event::Placeholder(_))
    }

    /// Only real programme data can be recorded or played
    pub fn is_recordable(&self) -> bool {
        matches!(self, Event::Real(_))
    }

    pub fn as_real(&self) -> Option<&EpgEvent> {
        match self {
            Event::Real(e) => Some(e),
            Event::Placeholder(_) => None,
        }
    }
}

impl From<EpgEvent> for Event {
    fn from(event: EpgEvent) -> Self {
        Event::Real(event)
    }
}

impl From<PlaceholderEvent> for Event {
    fn from(event: PlaceholderEvent) -> Self {
        Event::Placeholder(event)
    }
}

impl GridEvent {
    /// Wrap an event, clamping the displayed span to `[window_start, window_end)`
    pub fn clamped(event: Event, window_start: Millis, window_end: Millis) -> Self {
        let display_start_time = event.start_time().max(window_start);
        let display_end_time = event.end_time().min(window_end);
        Self {
            event,
            display_start_time,
            display_end_time,
        }
    }
}

pub(crate) fn duration_millis(duration: Duration) -> Millis {
    Millis::try_from(duration.as_millis()).unwrap_or(Millis::MAX)
}
