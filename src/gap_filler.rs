//! Placeholder padding for window queries
//!
//! Turns whatever real events a source returned for `[start, end)` into a
//! contiguous sequence covering the whole window, inserting placeholders
//! before, between and after real events.
//!
//! Input is sorted by start time first. An event starting before the end of
//! the previously accepted one is dropped, as is anything entirely outside
//! the window, so the output never overlaps.

use tracing::debug;

use crate::models::{EpgEvent, Event, GridEvent, Millis, PlaceholderEvent};

/// Pad `events` to exactly cover `[start, end)`.
///
/// `get_dummy_event(service_id, gap_start, gap_end)` builds each placeholder.
/// Real events keep their own times, so the first and last may extend past
/// the window; use [`pad_grid_row`] for display-clamped cells.
pub fn pad<F>(
    service_id: &str,
    start: Millis,
    end: Millis,
    get_dummy_event: F,
    events: &[EpgEvent],
) -> Vec<Event>
where
    F: Fn(&str, Millis, Millis) -> PlaceholderEvent,
{
    if start >= end {
        return Vec::new();
    }

    let mut sorted: Vec<&EpgEvent> = events
        .iter()
        .filter(|e| e.overlaps(start, end))
        .collect();
    sorted.sort_by_key(|e| (e.start_time, e.end_time));

    let mut padded = Vec::with_capacity(sorted.len() * 2 + 1);
    let mut cursor = start;
    let mut accepted_end: Option<Millis> = None;

    for event in sorted {
        if let Some(previous_end) = accepted_end {
            if event.start_time < previous_end {
                debug!(
                    "Dropping overlapping event {} on {} ({} < {})",
                    event.event_id, service_id, event.start_time, previous_end
                );
                continue;
            }
        }

        if event.start_time > cursor {
            padded.push(Event::Placeholder(get_dummy_event(
                service_id,
                cursor,
                event.start_time,
            )));
        }
        padded.push(Event::Real(event.clone()));
        accepted_end = Some(event.end_time);
        cursor = event.end_time;
    }

    if cursor < end {
        padded.push(Event::Placeholder(get_dummy_event(service_id, cursor, end)));
    }

    padded
}

/// [`pad`], with every cell's displayed span clamped to `[start, end)`
pub fn pad_grid_row<F>(
    service_id: &str,
    start: Millis,
    end: Millis,
    get_dummy_event: F,
    events: &[EpgEvent],
) -> Vec<GridEvent>
where
    F: Fn(&str, Millis, Millis) -> PlaceholderEvent,
{
    pad(service_id, start, end, get_dummy_event, events)
        .into_iter()
        .map(|event| GridEvent::clamped(event, start, end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::default_placeholder;
    use rstest::rstest;

    fn real(id: &str, start: Millis, end: Millis) -> EpgEvent {
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
            cache_timestamp: 0,
        }
    }

    fn spans(events: &[Event]) -> Vec<(Millis, Millis, bool)> {
        events
            .iter()
            .map(|e| (e.start_time(), e.end_time(), e.is_placeholder()))
            .collect()
    }

    fn assert_covers(events: &[Event], start: Millis, end: Millis) {
        let mut cursor = start;
        for event in events {
            assert_eq!(event.start_time().max(start), cursor);
            cursor = event.end_time();
        }
        assert!(cursor >= end);
    }

    #[test]
    fn test_empty_input_is_one_placeholder() {
        let padded = pad("s1", 1000, 2000, default_placeholder, &[]);
        assert_eq!(spans(&padded), vec![(1000, 2000, true)]);
        assert_eq!(padded[0].service_id(), "s1");
    }

    #[test]
    fn test_gaps_before_and_after() {
        let padded = pad("s1", 1000, 2000, default_placeholder, &[real("a", 1200, 1500)]);
        assert_eq!(
            spans(&padded),
            vec![(1000, 1200, true), (1200, 1500, false), (1500, 2000, true)]
        );
    }

    #[rstest]
    #[case::contiguous(vec![real("a", 0, 50), real("b", 50, 100)], 2)]
    #[case::middle_gap(vec![real("a", 0, 40), real("b", 60, 100)], 3)]
    #[case::unsorted(vec![real("b", 50, 100), real("a", 0, 50)], 2)]
    #[case::overhanging(vec![real("a", -30, 30), real("b", 30, 130)], 2)]
    fn test_result_covers_window(#[case] events: Vec<EpgEvent>, #[case] expected_len: usize) {
        let padded = pad("s1", 0, 100, default_placeholder, &events);
        assert_eq!(padded.len(), expected_len);
        assert_covers(&padded, 0, 100);
    }

    #[test]
    fn test_overlapping_event_is_dropped() {
        let events = vec![real("a", 0, 60), real("b", 40, 80), real("c", 80, 100)];
        let padded = pad("s1", 0, 100, default_placeholder, &events);
        let ids: Vec<&str> = padded
            .iter()
            .filter_map(|e| e.as_real())
            .map(|e| e.event_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(
            spans(&padded),
            vec![(0, 60, false), (60, 80, true), (80, 100, false)]
        );
    }

    #[test]
    fn test_events_outside_window_are_ignored() {
        let events = vec![real("before", 0, 100), real("after", 300, 400)];
        let padded = pad("s1", 100, 300, default_placeholder, &events);
        assert_eq!(spans(&padded), vec![(100, 300, true)]);
    }

    #[test]
    fn test_custom_generator_is_used() {
        let padded = pad(
            "s1",
            0,
            10,
            |service_id, start, end| PlaceholderEvent::new(format!("{service_id}-filler"), start, end),
            &[],
        );
        assert_eq!(padded[0].service_id(), "s1-filler");
    }

    #[test]
    fn test_grid_row_clamps_display_only() {
        let row = pad_grid_row("s1", 100, 200, default_placeholder, &[real("a", 50, 150)]);
        assert_eq!(row.len(), 2);
        assert_eq!(row[0].display_start_time, 100);
        assert_eq!(row[0].event.start_time(), 50);
        assert_eq!(row[1].display_start_time, 150);
        assert_eq!(row[1].display_end_time, 200);
        assert!(row[1].event.is_placeholder());
    }

    #[test]
    fn test_empty_window_yields_nothing() {
        assert!(pad("s1", 10, 10, default_placeholder, &[real("a", 0, 20)]).is_empty());
    }
}
