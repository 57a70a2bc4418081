pub mod key_builder;
pub mod metadata_cache;

pub use key_builder::{catalog_key, meta_key};
pub use metadata_cache::{CacheEntry, CachedData, MetadataCache};
