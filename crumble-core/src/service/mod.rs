pub mod metadata;
pub mod normalize;

pub use metadata::MetadataManager;
pub use normalize::normalize_meta;
