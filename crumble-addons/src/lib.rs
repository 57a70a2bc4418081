// Crumble addon clients
//
// Pure HTTP client for the Stremio-compatible addon protocol plus its wire
// types. Aggregation, caching and retries live in crumble-core.
//
// Architecture:
// - crumble-addons: AddonClient + protocol types + client errors
// - crumble-core/source: AddonSource trait implementations (adapters calling this client)
// - crumble-core/service: MetadataManager aggregating every source

// Shared error types
pub mod error;

// Protocol types
pub mod types;

// HTTP client
pub mod client;

pub use client::{base_url_from_manifest_url, build_http_client, fetch_text, AddonClient};
pub use error::AddonClientError;
pub use types::{
    AddonManifest, Catalog, CatalogExtra, ContentType, Link, MetaItem, ResourceDescriptor, Stream,
    Subtitle, Video,
};
