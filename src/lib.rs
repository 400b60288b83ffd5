//! EPG event cache and channel-list synchronisation engine
//!
//! Keeps a cache of programme events fresh against a home gateway and a
//! remote metadata service, maintains the categorised channel list, and pads
//! window queries into gap-free guide rows. [`epg::Epg`] is the entry point.

pub mod cache;
pub mod clock;
pub mod config;
pub mod epg;
pub mod errors;
pub mod gap_filler;
pub mod logging;
pub mod models;
pub mod registry;
pub mod sources;

pub use config::EpgConfig;
pub use epg::{Epg, EpgBuilder};
pub use errors::{EpgError, EpgResult};
