//! EPG data sources and the router choosing between them

pub mod gateway;
pub mod metadata;
pub mod ratings;
pub mod router;

pub use gateway::{GatewayClient, GatewayNotification, HttpGatewayClient, RawEitRecord};
pub use metadata::{HttpMetadataClient, MetadataClient, MetadataEvent, MetadataQuery, MetadataResponse};
pub use ratings::{Ratings, RatingsTable};
pub use router::{DataSourceRouter, FetchOperation, SourcePath};
