//! Source definitions, HTTP access and adapters.

pub mod adapters;
pub mod http;
pub mod registry;
mod repository;
mod types;

pub use adapters::{AdapterFactory, DefaultAdapterFactory, EnrichmentSettings, SourceAdapter};
pub use http::{validate_url, HttpFetcher};
pub use registry::static_sources;
pub use repository::{SourceRecord, SourceRepository};
pub use types::{
    Category, CustomSourceConfig, FetchMethod, FetchOptions, ResolvedSource, SourceConfig,
    DEFAULT_PRIORITY, PRIORITY_RANGE,
};
