//! Addon protocol types
//!
//! Wire types for the Stremio-compatible addon protocol. Deserialization is
//! deliberately lenient: addons in the wild send `null` for lists, numbers as
//! strings and vice versa.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Content type of a catalog or meta item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Movie,
    Series,
    #[serde(other)]
    Other,
}

impl ContentType {
    /// Parse a protocol type string. Unknown strings map to [`ContentType::Other`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "movie" => Self::Movie,
            "series" => Self::Series,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== Manifest ==========

/// Addon manifest (`GET /manifest.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonManifest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// URL the manifest was fetched from. Not part of the wire format; filled in by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub types: Vec<String>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub catalogs: Vec<Catalog>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_prefixes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<AddonBehaviorHints>,
}

/// A resource entry: either `"stream"` or `{"name": "stream", "types": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceDescriptor {
    Short(String),
    Full {
        name: String,
        #[serde(default)]
        types: Vec<String>,
        #[serde(default, rename = "idPrefixes", skip_serializing_if = "Option::is_none")]
        id_prefixes: Option<Vec<String>>,
    },
}

impl ResourceDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Short(name) | Self::Full { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddonBehaviorHints {
    #[serde(default)]
    pub adult: Option<bool>,
    #[serde(default)]
    pub p2p: Option<bool>,
    #[serde(default)]
    pub configurable: Option<bool>,
}

/// Catalog descriptor inside a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "type")]
    pub content_type: String,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub extra: Vec<CatalogExtra>,
}

/// Extra filter a catalog accepts (genre, search, skip, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogExtra {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
}

impl AddonManifest {
    /// Whether this addon serves `resource` for content of `content_type`.
    ///
    /// A full resource descriptor with its own `types` list overrides the
    /// manifest-level `types`.
    #[must_use]
    pub fn supports(&self, resource: &str, content_type: &str) -> bool {
        self.resources.iter().any(|r| match r {
            ResourceDescriptor::Short(name) => {
                name == resource && self.types.iter().any(|t| t == content_type)
            }
            ResourceDescriptor::Full { name, types, .. } => {
                name == resource
                    && if types.is_empty() {
                        self.types.iter().any(|t| t == content_type)
                    } else {
                        types.iter().any(|t| t == content_type)
                    }
            }
        })
    }

    /// Whether the addon lists `content_type` among its types at all.
    #[must_use]
    pub fn has_type(&self, content_type: &str) -> bool {
        self.types.iter().any(|t| t == content_type)
    }

    /// Union of the extra filters declared by every catalog of `content_type`.
    #[must_use]
    pub fn catalog_filters(&self, content_type: &str) -> Vec<CatalogExtra> {
        let mut filters: Vec<CatalogExtra> = Vec::new();
        for catalog in self.catalogs.iter().filter(|c| c.content_type == content_type) {
            for extra in &catalog.extra {
                if !filters.iter().any(|f| f.name == extra.name) {
                    filters.push(extra.clone());
                }
            }
        }
        filters
    }

    /// Genres offered by the catalogs of `content_type`, in declaration order.
    ///
    /// Reads both the legacy `genres` list and the `genre` extra's options.
    #[must_use]
    pub fn genres(&self, content_type: &str) -> Vec<String> {
        let mut genres: Vec<String> = Vec::new();
        for catalog in self.catalogs.iter().filter(|c| c.content_type == content_type) {
            let legacy = catalog.genres.iter().flatten();
            let extra = catalog
                .extra
                .iter()
                .filter(|e| e.name == "genre")
                .flat_map(|e| e.options.iter().flatten());
            for genre in legacy.chain(extra) {
                if !genres.contains(genre) {
                    genres.push(genre.clone());
                }
            }
        }
        genres
    }
}

// ========== Meta ==========

/// Metadata record for a movie or series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaItem {
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub poster: String,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub background: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub release_info: String,
    #[serde(default, deserialize_with = "de::lenient_u32", skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, deserialize_with = "de::lenient_f32", skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<f32>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub cast: Vec<String>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub director: Vec<String>,
    #[serde(default, alias = "writers", deserialize_with = "de::vec_or_empty")]
    pub writer: Vec<String>,
    #[serde(default, deserialize_with = "de::lenient_string", skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awards: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<Video>>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<MetaBehaviorHints>,
}

/// Episode (or single video) of a meta item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub id: String,
    #[serde(default, alias = "name", deserialize_with = "de::string_or_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub released: String,
    #[serde(default, deserialize_with = "de::lenient_u32")]
    pub season: Option<u32>,
    #[serde(default, deserialize_with = "de::lenient_u32")]
    pub episode: Option<u32>,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub overview: String,
    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub thumbnail: String,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub category: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaBehaviorHints {
    #[serde(default)]
    pub default_video_id: Option<String>,
    #[serde(default)]
    pub has_scheduled_videos: Option<bool>,
}

// ========== Streams & Subtitles ==========

/// A playable source for a meta item or one of its videos
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_idx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub subtitles: Vec<Subtitle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<StreamBehaviorHints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamBehaviorHints {
    #[serde(default)]
    pub not_web_ready: Option<bool>,
    #[serde(default)]
    pub binge_group: Option<String>,
    #[serde(default)]
    pub country_whitelist: Option<Vec<String>>,
    #[serde(default)]
    pub proxy_headers: Option<HashMap<String, String>>,
}

impl Stream {
    /// A URL a video player can open directly.
    ///
    /// Torrent streams (`infoHash` only) have none.
    #[must_use]
    pub fn playable_url(&self) -> Option<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        if let Some(yt) = self.yt_id.as_deref().filter(|id| !id.is_empty()) {
            return Some(format!("https://www.youtube.com/watch?v={yt}"));
        }
        self.external_url.clone().filter(|u| !u.is_empty())
    }

    /// Label shown to the user: `name`, then `title`, then the URL.
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .or(self.url.as_deref())
            .unwrap_or("Unknown stream")
            .to_string()
    }

    /// Explicit quality, else a resolution tag found in the name/title/description.
    #[must_use]
    pub fn detected_quality(&self) -> Option<String> {
        if let Some(q) = self.quality.as_deref().filter(|q| !q.is_empty()) {
            return Some(q.to_string());
        }
        let haystack = [&self.name, &self.title, &self.description]
            .into_iter()
            .flatten()
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        const TAGS: &[(&[&str], &str)] = &[
            (&["2160p", "4k", "uhd"], "4K"),
            (&["1080p", "fhd"], "1080p"),
            (&["720p"], "720p"),
            (&["480p", "sd"], "480p"),
        ];
        TAGS.iter()
            .find(|(needles, _)| {
                needles.iter().any(|n| {
                    haystack
                        .split(|c: char| !c.is_ascii_alphanumeric())
                        .any(|word| word == *n)
                })
            })
            .map(|(_, label)| (*label).to_string())
    }
}

/// Subtitle track offered by an addon or attached to a stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// ========== Responses ==========

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub metas: Vec<MetaItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaResponse {
    #[serde(default)]
    pub meta: Option<MetaItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamResponse {
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleResponse {
    #[serde(default, deserialize_with = "de::vec_or_empty")]
    pub subtitles: Vec<Subtitle>,
}

/// `GET /validate-key` response of TMDB-backed addons
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateKeyResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Lenient field deserializers
mod de {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// `null`, a missing field or a non-array value all become an empty list.
    /// Elements that fail to parse are dropped.
    pub fn vec_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(lenient_string(deserializer)?.unwrap_or_default())
    }

    /// Strings pass through, numbers and booleans are stringified, anything else is `None`.
    pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => {
                let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            }
            _ => None,
        })
    }

    pub fn lenient_f32<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n.as_f64().map(|f| f as f32),
            Value::String(s) => s.trim().parse::<f32>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> AddonManifest {
        serde_json::from_value(json!({
            "id": "org.crumble.tmdb",
            "version": "1.0.0",
            "name": "Crumble TMDB Addon",
            "description": "Fetches movies and TV shows from TMDB",
            "resources": ["catalog", "meta", {"name": "stream", "types": ["movie"]}],
            "types": ["movie", "series"],
            "catalogs": [
                {"type": "movie", "id": "tmdb_popular", "name": "Popular Movies",
                 "extra": [{"name": "genre", "options": ["Action", "Drama"]}, {"name": "skip"}]},
                {"type": "movie", "id": "tmdb_trending", "genres": ["Comedy", "Action"],
                 "extra": [{"name": "genre"}]},
                {"type": "series", "id": "tmdb_popular", "name": "Popular TV Shows"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_manifest_supports_resources() {
        let m = manifest();
        assert!(m.supports("catalog", "movie"));
        assert!(m.supports("meta", "series"));
        assert!(m.supports("stream", "movie"));
        assert!(!m.supports("stream", "series"));
        assert!(!m.supports("subtitles", "movie"));
    }

    #[test]
    fn test_manifest_catalog_filters_are_unioned() {
        let m = manifest();
        let filters = m.catalog_filters("movie");
        let names: Vec<_> = filters.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["genre", "skip"]);
        assert!(m.catalog_filters("series").is_empty());
    }

    #[test]
    fn test_manifest_genres() {
        let m = manifest();
        assert_eq!(m.genres("movie"), vec!["Action", "Drama", "Comedy"]);
    }

    #[test]
    fn test_meta_item_lenient_fields() {
        let meta: MetaItem = serde_json::from_value(json!({
            "id": "tmdb:movie/603",
            "type": "movie",
            "name": "The Matrix",
            "poster": null,
            "year": "1999",
            "imdbRating": "8.7",
            "runtime": 136,
            "genres": null,
            "cast": "Keanu Reeves",
            "writers": ["Lilly Wachowski"]
        }))
        .unwrap();

        assert_eq!(meta.poster, "");
        assert_eq!(meta.year, Some(1999));
        assert_eq!(meta.imdb_rating, Some(8.7));
        assert_eq!(meta.runtime.as_deref(), Some("136"));
        assert!(meta.genres.is_empty());
        assert!(meta.cast.is_empty());
        assert_eq!(meta.writer, vec!["Lilly Wachowski"]);
    }

    #[test]
    fn test_meta_item_invalid_year_is_dropped() {
        let meta: MetaItem =
            serde_json::from_value(json!({"id": "x", "name": "X", "year": "unknown"})).unwrap();
        assert_eq!(meta.year, None);
        assert_eq!(meta.content_type, None);
    }

    #[test]
    fn test_unknown_content_type() {
        let meta: MetaItem =
            serde_json::from_value(json!({"id": "x", "type": "channel", "name": "X"})).unwrap();
        assert_eq!(meta.content_type, Some(ContentType::Other));
    }

    #[test]
    fn test_stream_playable_url() {
        let direct = Stream {
            url: Some("https://example.com/a.m3u8".into()),
            ..Default::default()
        };
        assert_eq!(direct.playable_url().as_deref(), Some("https://example.com/a.m3u8"));

        let yt = Stream {
            yt_id: Some("abc123".into()),
            ..Default::default()
        };
        assert_eq!(
            yt.playable_url().as_deref(),
            Some("https://www.youtube.com/watch?v=abc123")
        );

        let torrent = Stream {
            info_hash: Some("deadbeef".into()),
            ..Default::default()
        };
        assert_eq!(torrent.playable_url(), None);
    }

    #[test]
    fn test_stream_detected_quality() {
        let s = Stream {
            name: Some("Torrentio\n1080p".into()),
            ..Default::default()
        };
        assert_eq!(s.detected_quality().as_deref(), Some("1080p"));

        let s = Stream {
            title: Some("Movie.2019.2160p.WEB".into()),
            ..Default::default()
        };
        assert_eq!(s.detected_quality().as_deref(), Some("4K"));

        let s = Stream {
            quality: Some("HD".into()),
            title: Some("720p".into()),
            ..Default::default()
        };
        assert_eq!(s.detected_quality().as_deref(), Some("HD"));

        let s = Stream {
            title: Some("Demo HLS Stream".into()),
            ..Default::default()
        };
        assert_eq!(s.detected_quality(), None);
    }

    #[test]
    fn test_catalog_response_drops_bad_entries() {
        let resp: CatalogResponse = serde_json::from_value(json!({
            "metas": [{"id": "a", "name": "A"}, 42, {"id": "b", "name": "B"}]
        }))
        .unwrap();
        assert_eq!(resp.metas.len(), 2);
    }
}
