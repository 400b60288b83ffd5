//! Configuration default values
//!
//! All default values for configuration options live here.

// Cache defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./epg-cache.db";
pub const DEFAULT_CACHE_EVENTS: bool = true;
pub const DEFAULT_CACHE_EXPIRY_TIME_MS: u64 = 3_600_000; // 1 hour
pub const DEFAULT_EXPIRED_EVENTS_TIME_MS: u64 = 604_800_000; // 7 days
pub const DEFAULT_CHECK_FOR_EXPIRED_EVENTS_TIME_MS: u64 = 86_400_000; // 24 hours

// Next/previous event look-around
pub const DEFAULT_NEIGHBOUR_WINDOW_MS: u64 = 43_200_000; // 12 hours

// Source client defaults
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

// Push notification buffer
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;
