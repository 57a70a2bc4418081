//! Built-in sample content served when no addon returns anything

use std::sync::LazyLock;

use crumble_addons::{MetaItem, Stream};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct FallbackData {
    movies: Vec<MetaItem>,
    series: Vec<MetaItem>,
}

static DATA: LazyLock<FallbackData> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../../data/fallback.json")).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Embedded fallback data is invalid");
        FallbackData::default()
    })
});

const SAMPLE_STREAM_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

#[must_use]
pub fn movies() -> Vec<MetaItem> {
    DATA.movies.clone()
}

#[must_use]
pub fn series() -> Vec<MetaItem> {
    DATA.series.clone()
}

/// Movies followed by series
#[must_use]
pub fn all() -> Vec<MetaItem> {
    DATA.movies.iter().chain(&DATA.series).cloned().collect()
}

/// Fallback catalog for a content type: movies, series, or everything
#[must_use]
pub fn catalog(content_type: &str) -> Vec<MetaItem> {
    match content_type {
        "movie" => movies(),
        "series" => series(),
        _ => all(),
    }
}

/// Fallback meta lookup by id, regardless of type
#[must_use]
pub fn find(id: &str) -> Option<MetaItem> {
    DATA.movies
        .iter()
        .chain(&DATA.series)
        .find(|m| m.id == id)
        .cloned()
}

/// The stream returned when no addon offers one
#[must_use]
pub fn sample_stream() -> Stream {
    Stream {
        url: Some(SAMPLE_STREAM_URL.to_string()),
        title: Some("Sample Stream".to_string()),
        name: Some("Big Buck Bunny (Sample)".to_string()),
        description: Some("Sample video for testing".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crumble_addons::ContentType;

    #[test]
    fn test_embedded_data_parses() {
        assert_eq!(movies().len(), 3);
        assert_eq!(series().len(), 2);
        assert_eq!(all().len(), 5);
        assert!(movies()
            .iter()
            .all(|m| m.content_type == Some(ContentType::Movie)));
    }

    #[test]
    fn test_catalog_by_type() {
        assert_eq!(catalog("movie")[0].name, "The Matrix");
        assert_eq!(catalog("series")[0].name, "Breaking Bad");
        assert_eq!(catalog("channel").len(), 5);
    }

    #[test]
    fn test_find() {
        let bb = find("tt0903747").unwrap();
        assert_eq!(bb.videos.as_ref().map(Vec::len), Some(2));
        assert!(find("tt0000000").is_none());
    }

    #[test]
    fn test_sample_stream() {
        let s = sample_stream();
        assert_eq!(s.playable_url().as_deref(), Some(SAMPLE_STREAM_URL));
        assert_eq!(s.label(), "Big Buck Bunny (Sample)");
    }
}
