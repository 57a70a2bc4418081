//! Cache key construction
//!
//! - `catalog:{type}:{catalog_id}` or `catalog:{type}:{catalog_id}:{genre}`
//! - `meta:{type}:{id}`

/// Key prefix shared by every catalog entry
pub const CATALOG_PREFIX: &str = "catalog:";

/// Key prefix shared by every meta entry
const META_PREFIX: &str = "meta:";

/// Key for a catalog listing, optionally filtered by genre
#[must_use]
pub fn catalog_key(content_type: &str, catalog_id: &str, genre: Option<&str>) -> String {
    match genre.filter(|g| !g.is_empty()) {
        Some(genre) => format!("{CATALOG_PREFIX}{content_type}:{catalog_id}:{genre}"),
        None => format!("{CATALOG_PREFIX}{content_type}:{catalog_id}"),
    }
}

/// Key for a single meta item
#[must_use]
pub fn meta_key(content_type: &str, id: &str) -> String {
    format!("{META_PREFIX}{content_type}:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_key() {
        assert_eq!(catalog_key("movie", "top", None), "catalog:movie:top");
        assert_eq!(
            catalog_key("movie", "top", Some("Action")),
            "catalog:movie:top:Action"
        );
        assert_eq!(catalog_key("series", "top", Some("")), "catalog:series:top");
    }

    #[test]
    fn test_meta_key() {
        assert_eq!(meta_key("series", "tt0903747"), "meta:series:tt0903747");
        assert_eq!(meta_key("movie", "tmdb:603"), "meta:movie:tmdb:603");
    }
}
