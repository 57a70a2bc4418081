// Addon Source Trait
//
// Core interface the aggregator talks to. One source is one installed addon.

use async_trait::async_trait;
use crumble_addons::{AddonClientError, AddonManifest, MetaItem, Stream, Subtitle};

/// A metadata/stream source
///
/// Implemented over HTTP by [`super::HttpAddonSource`]; tests use in-memory fakes.
#[async_trait]
pub trait AddonSource: Send + Sync {
    /// Manifest the source was loaded from
    fn manifest(&self) -> &AddonManifest;

    /// Addon id (e.g. "org.crumble.tmdb")
    fn id(&self) -> &str {
        &self.manifest().id
    }

    /// Display name
    fn name(&self) -> &str {
        &self.manifest().name
    }

    /// Whether the addon lists `content_type` among its types
    fn has_type(&self, content_type: &str) -> bool {
        self.manifest().has_type(content_type)
    }

    /// Whether the addon serves `resource` for `content_type`
    fn supports(&self, resource: &str, content_type: &str) -> bool {
        self.manifest().supports(resource, content_type)
    }

    async fn catalog(
        &self,
        content_type: &str,
        catalog_id: &str,
        genre: Option<&str>,
    ) -> Result<Vec<MetaItem>, AddonClientError>;

    async fn meta(
        &self,
        content_type: &str,
        id: &str,
    ) -> Result<Option<MetaItem>, AddonClientError>;

    async fn streams(&self, content_type: &str, id: &str)
        -> Result<Vec<Stream>, AddonClientError>;

    /// Subtitle tracks. `video_id` replaces `id` for episodes.
    async fn subtitles(
        &self,
        _content_type: &str,
        _id: &str,
        _video_id: Option<&str>,
    ) -> Result<Vec<Subtitle>, AddonClientError> {
        Ok(Vec::new()) // Default: no subtitles
    }
}

/// Whether `addon_id` designates the primary metadata source for `prefix`.
///
/// Matches when the whole id or any dot-separated segment starts with the
/// prefix, so both `tmdb-addon` and `org.crumble.tmdb` qualify.
#[must_use]
pub fn is_primary_id(addon_id: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    addon_id.starts_with(prefix) || addon_id.split('.').any(|seg| seg.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_primary_id() {
        assert!(is_primary_id("tmdb-addon", "tmdb"));
        assert!(is_primary_id("org.crumble.tmdb", "tmdb"));
        assert!(is_primary_id("tmdb", "tmdb"));
        assert!(!is_primary_id("com.linvo.cinemeta", "tmdb"));
        assert!(!is_primary_id("org.mytmdb", "tmdb"));
        assert!(!is_primary_id("tmdb-addon", ""));
    }
}

impl std::fmt::Debug for dyn AddonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonSource").field("id", &self.id()).finish()
    }
}
