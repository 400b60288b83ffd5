//! Centralized error handling for the EPG sync engine
//!
//! Errors exist at the collaborator seams only. The facade's asynchronous
//! fetch paths never hand an error back to a caller: a failed or unavailable
//! source resolves to an empty result and is logged.
//!
//! # Error Categories
//!
//! - **Cache Errors**: event store reads/writes (RAM or SQLite)
//! - **Source Errors**: gateway and metadata service requests
//! - **Configuration Errors**: invalid option values at start-up
//!
//! # Usage
//!
//! ```rust
//! use epg_sync::errors::{EpgError, EpgResult};
//!
//! fn example_function() -> EpgResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using EpgError
pub type EpgResult<T> = Result<T, EpgError>;

/// Convenience type alias for event store Results
pub type CacheResult<T> = Result<T, CacheError>;

/// Convenience type alias for data source Results
pub type SourceResult<T> = Result<T, SourceError>;
