//! Cached window validity
//!
//! A service's cached events can answer a window query only when they cover
//! the whole window contiguously and every one of them is still fresh.

use std::time::Duration;

use crate::models::{EpgEvent, Millis};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowValidity {
    Valid,
    Empty,
    StartsLate { first_start: Millis },
    Gap { after_event: String, gap_start: Millis, gap_end: Millis },
    EndsEarly { last_end: Millis },
    Stale { event_id: String },
}

impl WindowValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, WindowValidity::Valid)
    }
}

/// Check a service's cached events (sorted by start time) against `[start, end)`
pub fn check_window(
    events: &[EpgEvent],
    start: Millis,
    end: Millis,
    now: Millis,
    cache_expiry_time: Duration,
) -> WindowValidity {
    let (first, last) = match (events.first(), events.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return WindowValidity::Empty,
    };

    if first.start_time > start {
        return WindowValidity::StartsLate {
            first_start: first.start_time,
        };
    }

    for pair in events.windows(2) {
        if pair[0].end_time != pair[1].start_time {
            return WindowValidity::Gap {
                after_event: pair[0].event_id.clone(),
                gap_start: pair[0].end_time,
                gap_end: pair[1].start_time,
            };
        }
    }

    if last.end_time < end {
        return WindowValidity::EndsEarly {
            last_end: last.end_time,
        };
    }

    if let Some(stale) = events.iter().find(|e| e.is_stale(now, cache_expiry_time)) {
        return WindowValidity::Stale {
            event_id: stale.event_id.clone(),
        };
    }

    WindowValidity::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const HOUR: Duration = Duration::from_secs(3600);

    fn event(id: &str, start: Millis, end: Millis, cached_at: Millis) -> EpgEvent {
        EpgEvent {
            event_id: id.to_string(),
            service_id: "s1".to_string(),
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

    #[test]
    fn test_contiguous_fresh_cover_is_valid() {
        let events = vec![event("a", 900, 1500, 0), event("b", 1500, 2100, 0)];
        assert_eq!(check_window(&events, 1000, 2000, 10, HOUR), WindowValidity::Valid);
    }

    #[test]
    fn test_empty_is_invalid() {
        assert_eq!(check_window(&[], 1000, 2000, 0, HOUR), WindowValidity::Empty);
    }

    #[rstest]
    #[case::starts_late(vec![event("a", 1100, 2000, 0)], WindowValidity::StartsLate { first_start: 1100 })]
    #[case::ends_early(vec![event("a", 1000, 1900, 0)], WindowValidity::EndsEarly { last_end: 1900 })]
    #[case::gap(
        vec![event("a", 1000, 1400, 0), event("b", 1500, 2000, 0)],
        WindowValidity::Gap { after_event: "a".to_string(), gap_start: 1400, gap_end: 1500 }
    )]
    fn test_incomplete_cover(#[case] events: Vec<EpgEvent>, #[case] expected: WindowValidity) {
        assert_eq!(check_window(&events, 1000, 2000, 0, HOUR), expected);
    }

    #[test]
    fn test_single_stale_event_invalidates_window() {
        let now = 10 * 3_600_000;
        let events = vec![
            event("a", 1000, 1500, now),
            event("b", 1500, 2000, now - 2 * 3_600_000),
        ];
        assert_eq!(
            check_window(&events, 1000, 2000, now, HOUR),
            WindowValidity::Stale {
                event_id: "b".to_string()
            }
        );
    }
}
