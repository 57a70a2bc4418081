//! Addon protocol HTTP client
//!
//! # Example
//!
//! ```no_run
//! use crumble_addons::AddonClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AddonClient::new("https://v3-cinemeta.strem.io/manifest.json")?;
//! let manifest = client.manifest().await?;
//! let top = client.catalog("movie", "top", None).await?;
//! println!("{}: {} items", manifest.name, top.len());
//! # Ok(())
//! # }
//! ```

use std::sync::LazyLock;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, StatusCode};

use crate::error::{check_response, json_with_limit, text_with_limit, AddonClientError};
use crate::types::{
    AddonManifest, CatalogResponse, MetaItem, MetaResponse, Stream, StreamResponse, Subtitle,
    SubtitleResponse, ValidateKeyResponse,
};

const MANIFEST_PATH: &str = "/manifest.json";

/// Characters escaped inside a single path segment (ids such as `tmdb:movie/603`).
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Shared HTTP client for addon requests (connection pooling)
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    build_http_client(Duration::from_secs(30)).unwrap_or_default()
});

/// Build an HTTP client suitable for addon requests.
pub fn build_http_client(timeout: Duration) -> Result<Client, AddonClientError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| AddonClientError::InvalidConfig(format!("Failed to build HTTP client: {e}")))
}

/// Derive an addon's base URL from its manifest URL.
///
/// `https://host/path/manifest.json` becomes `https://host/path`; trailing
/// slashes are dropped.
pub fn base_url_from_manifest_url(manifest_url: &str) -> Result<String, AddonClientError> {
    let mut parsed = url::Url::parse(manifest_url.trim())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AddonClientError::InvalidConfig(format!(
            "Unsupported addon URL scheme: {}",
            parsed.scheme()
        )));
    }
    parsed.set_query(None);
    parsed.set_fragment(None);

    let mut base = parsed.as_str().trim_end_matches('/').to_string();
    if let Some(stripped) = base.strip_suffix(MANIFEST_PATH) {
        base = stripped.to_string();
    }
    while base.ends_with('/') {
        base.pop();
    }
    Ok(base)
}

/// Download a text resource (e.g. a subtitle file) from an absolute URL.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, AddonClientError> {
    let response = client.get(url).send().await?;
    let response = check_response(response)?;
    text_with_limit(response).await
}

fn segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}

/// HTTP client for one addon
#[derive(Debug, Clone)]
pub struct AddonClient {
    base_url: String,
    manifest_url: String,
    query: Vec<(String, String)>,
    client: Client,
}

impl AddonClient {
    /// Create a client for the addon whose manifest lives at `manifest_url`
    /// (reuses the shared connection pool)
    pub fn new(manifest_url: &str) -> Result<Self, AddonClientError> {
        Self::with_http_client(manifest_url, SHARED_CLIENT.clone())
    }

    /// Create a client that uses the given `reqwest::Client`
    pub fn with_http_client(manifest_url: &str, client: Client) -> Result<Self, AddonClientError> {
        let base_url = base_url_from_manifest_url(manifest_url)?;
        Ok(Self {
            manifest_url: format!("{base_url}{MANIFEST_PATH}"),
            base_url,
            query: Vec::new(),
            client,
        })
    }

    /// Append a query parameter to every request (e.g. `apikey`).
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn manifest_url(&self) -> &str {
        &self.manifest_url
    }

    async fn get(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<reqwest::Response, AddonClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Addon request");

        let response = self
            .client
            .get(&url)
            .query(&self.query)
            .query(extra)
            .send()
            .await?;
        Ok(response)
    }

    /// Fetch the addon manifest. `manifest_url` is filled in on the result.
    pub async fn manifest(&self) -> Result<AddonManifest, AddonClientError> {
        let response = check_response(self.get(MANIFEST_PATH, &[]).await?)?;
        let mut manifest: AddonManifest = json_with_limit(response).await?;
        manifest.manifest_url = Some(self.manifest_url.clone());
        Ok(manifest)
    }

    /// `GET /catalog/{type}/{catalog_id}.json[?genre=..]`
    pub async fn catalog(
        &self,
        content_type: &str,
        catalog_id: &str,
        genre: Option<&str>,
    ) -> Result<Vec<MetaItem>, AddonClientError> {
        let path = format!("/catalog/{}/{}.json", segment(content_type), segment(catalog_id));
        let extra: Vec<(&str, &str)> = genre.map(|g| ("genre", g)).into_iter().collect();

        let response = check_response(self.get(&path, &extra).await?)?;
        let catalog: CatalogResponse = json_with_limit(response).await?;
        Ok(catalog.metas)
    }

    /// `GET /meta/{type}/{id}.json`
    ///
    /// A 404 or an empty `meta` is `Ok(None)`.
    pub async fn meta(
        &self,
        content_type: &str,
        id: &str,
    ) -> Result<Option<MetaItem>, AddonClientError> {
        let path = format!("/meta/{}/{}.json", segment(content_type), segment(id));
        let response = self.get(&path, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_response(response)?;
        let meta: MetaResponse = json_with_limit(response).await?;
        Ok(meta.meta)
    }

    /// `GET /stream/{type}/{id}.json`
    pub async fn streams(
        &self,
        content_type: &str,
        id: &str,
    ) -> Result<Vec<Stream>, AddonClientError> {
        let path = format!("/stream/{}/{}.json", segment(content_type), segment(id));
        let response = self.get(&path, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let response = check_response(response)?;
        let streams: StreamResponse = json_with_limit(response).await?;
        Ok(streams.streams)
    }

    /// `GET /subtitles/{type}/{id}.json`. For episodes `video_id` replaces `id`.
    pub async fn subtitles(
        &self,
        content_type: &str,
        id: &str,
        video_id: Option<&str>,
    ) -> Result<Vec<Subtitle>, AddonClientError> {
        let id = video_id.unwrap_or(id);
        let path = format!("/subtitles/{}/{}.json", segment(content_type), segment(id));
        let response = self.get(&path, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let response = check_response(response)?;
        let subtitles: SubtitleResponse = json_with_limit(response).await?;
        Ok(subtitles.subtitles)
    }

    /// Ask a TMDB-backed addon whether `api_key` is valid (`GET /validate-key`).
    pub async fn validate_api_key(&self, api_key: &str) -> Result<bool, AddonClientError> {
        let response = self.get("/validate-key", &[("apikey", api_key)]).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(false),
            status if status.is_success() => {
                let body: ValidateKeyResponse = json_with_limit(response).await?;
                Ok(body.valid)
            }
            _ => check_response(response).map(|_| false),
        }
    }
}
