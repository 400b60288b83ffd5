//! Parental rating lookup used to annotate metadata-service events

use std::collections::HashMap;

use crate::models::{EpgEvent, Rating};

pub trait Ratings: Send + Sync {
    fn lookup(&self, code: &str) -> Option<&Rating>;

    /// Resolve the event's rating code to a precedence value
    fn annotate(&self, mut event: EpgEvent) -> EpgEvent {
        event.parental_rating = event
            .rating_code
            .as_deref()
            .and_then(|code| self.lookup(code))
            .map(|rating| rating.precedence_value);
        event
    }
}

#[derive(Debug, Clone, Default)]
pub struct RatingsTable {
    by_code: HashMap<String, Rating>,
}

impl RatingsTable {
    pub fn new(ratings: Vec<Rating>) -> Self {
        Self {
            by_code: ratings.into_iter().map(|r| (r.code.clone(), r)).collect(),
        }
    }
}

impl Ratings for RatingsTable {
    fn lookup(&self, code: &str) -> Option<&Rating> {
        self.by_code.get(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(code: Option<&str>) -> EpgEvent {
        EpgEvent {
            event_id: "e".to_string(),
            service_id: "s".to_string(),
            start_time: 0,
            end_time: 1,
            title: String::new(),
            description: None,
            genre: None,
            rating_code: code.map(str::to_string),
            parental_rating: Some(99),
            cache_timestamp: 0,
        }
    }

    #[test]
    fn test_annotate_resolves_known_code() {
        let table = RatingsTable::new(vec![Rating {
            code: "15".to_string(),
            precedence_value: 4,
            description: None,
        }]);
        assert_eq!(table.annotate(event(Some("15"))).parental_rating, Some(4));
    }

    #[test]
    fn test_annotate_clears_unknown_or_missing_code() {
        let table = RatingsTable::default();
        assert_eq!(table.annotate(event(Some("X"))).parental_rating, None);
        assert_eq!(table.annotate(event(None)).parental_rating, None);
    }
}
