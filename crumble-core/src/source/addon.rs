// HTTP Addon Source
//
// Adapter implementing AddonSource over crumble-addons::AddonClient

use async_trait::async_trait;
use crumble_addons::{AddonClient, AddonClientError, AddonManifest, MetaItem, Stream, Subtitle};

use super::AddonSource;

/// An installed addon reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpAddonSource {
    client: AddonClient,
    manifest: AddonManifest,
}

impl HttpAddonSource {
    #[must_use]
    pub const fn new(client: AddonClient, manifest: AddonManifest) -> Self {
        Self { client, manifest }
    }

    /// Fetch the manifest and build the source
    pub async fn load(client: AddonClient) -> Result<Self, AddonClientError> {
        let manifest = client.manifest().await?;
        Ok(Self::new(client, manifest))
    }

    #[must_use]
    pub const fn client(&self) -> &AddonClient {
        &self.client
    }
}

#[async_trait]
impl AddonSource for HttpAddonSource {
    fn manifest(&self) -> &AddonManifest {
        &self.manifest
    }

    async fn catalog(
        &self,
        content_type: &str,
        catalog_id: &str,
        genre: Option<&str>,
    ) -> Result<Vec<MetaItem>, AddonClientError> {
        self.client.catalog(content_type, catalog_id, genre).await
    }

    async fn meta(
        &self,
        content_type: &str,
        id: &str,
    ) -> Result<Option<MetaItem>, AddonClientError> {
        self.client.meta(content_type, id).await
    }

    async fn streams(
        &self,
        content_type: &str,
        id: &str,
    ) -> Result<Vec<Stream>, AddonClientError> {
        self.client.streams(content_type, id).await
    }

    async fn subtitles(
        &self,
        content_type: &str,
        id: &str,
        video_id: Option<&str>,
    ) -> Result<Vec<Subtitle>, AddonClientError> {
        self.client.subtitles(content_type, id, video_id).await
    }
}
