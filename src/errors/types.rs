//! Error type definitions for the EPG sync engine

use thiserror::Error;

/// Top-level error type
#[derive(Error, Debug)]
pub enum EpgError {
    /// Event store errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Data source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Event store specific errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Database-level failures of the persistent cache
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Row payload serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Schema creation failures
    #[error("Migration failed: {message}")]
    MigrationFailed { message: String },
}

/// Data source specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Non-success HTTP status from a source
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Transport failures from the HTTP client
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Malformed payloads from a source
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },

    /// Invalid client configuration
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfig { field: String, message: String },
}

impl EpgError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl CacheError {
    /// Create a query failed error
    pub fn query_failed<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        Self::QueryFailed {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create a migration error
    pub fn migration_failed<M: Into<String>>(message: M) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create an HTTP status error
    pub fn http<M: Into<String>>(status: u16, message: M) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}
