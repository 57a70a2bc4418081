// Addon Registry
//
// Loads addon entries from addons.json, fetches each manifest and keeps the
// resulting sources. Install/remove rewrite the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crumble_addons::{base_url_from_manifest_url, AddonClient, AddonClientError};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{is_primary_id, AddonSource, HttpAddonSource};
use crate::{Config, Error, Result};

/// One line of `addons.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonEntry {
    #[serde(default)]
    pub name: String,
    /// `url` in the legacy array form
    #[serde(alias = "url")]
    pub manifest_url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddonsFile {
    addons: Vec<AddonEntry>,
}

/// Both accepted layouts of `addons.json`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddonsFileRepr {
    Wrapped(AddonsFile),
    Legacy(Vec<AddonEntry>),
}

/// Parse `addons.json` content (`{"addons": [...]}` or a bare array)
pub fn parse_addons_file(content: &str) -> Result<Vec<AddonEntry>> {
    let repr: AddonsFileRepr = serde_json::from_str(content)?;
    Ok(match repr {
        AddonsFileRepr::Wrapped(file) => file.addons,
        AddonsFileRepr::Legacy(entries) => entries,
    })
}

/// Registry of installed addons
pub struct AddonRegistry {
    config_path: PathBuf,
    http: reqwest::Client,
    primary_prefix: String,
    api_key: Option<String>,
    entries: RwLock<Vec<AddonEntry>>,
    sources: RwLock<Vec<Arc<dyn AddonSource>>>,
}

impl std::fmt::Debug for AddonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonRegistry")
            .field("config_path", &self.config_path)
            .field("primary_prefix", &self.primary_prefix)
            .field("entries", &self.entries.read().len())
            .field("sources", &self.sources.read().len())
            .finish_non_exhaustive()
    }
}

impl AddonRegistry {
    /// Create an empty registry. Call [`AddonRegistry::load`] to read the file.
    pub fn new(
        config_path: impl Into<PathBuf>,
        http: reqwest::Client,
        primary_prefix: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            http,
            primary_prefix: primary_prefix.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            entries: RwLock::new(Vec::new()),
            sources: RwLock::new(Vec::new()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let http = crumble_addons::build_http_client(config.request_timeout())?;
        Ok(Self::new(
            &config.addons.config_path,
            http,
            &config.addons.primary_prefix,
            config.tmdb_api_key().map(str::to_string),
        ))
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub fn primary_prefix(&self) -> &str {
        &self.primary_prefix
    }

    /// Snapshot of the loaded sources, in file order
    #[must_use]
    pub fn sources(&self) -> Vec<Arc<dyn AddonSource>> {
        self.sources.read().clone()
    }

    /// Snapshot of the configured entries
    #[must_use]
    pub fn entries(&self) -> Vec<AddonEntry> {
        self.entries.read().clone()
    }

    /// The primary source, if one is loaded
    #[must_use]
    pub fn primary(&self) -> Option<Arc<dyn AddonSource>> {
        self.sources
            .read()
            .iter()
            .find(|s| is_primary_id(s.id(), &self.primary_prefix))
            .cloned()
    }

    /// Read `addons.json` and fetch every manifest.
    ///
    /// A missing or unreadable file empties the registry. Addons whose
    /// manifest cannot be fetched are skipped. Returns the number of sources loaded.
    pub async fn load(&self) -> usize {
        let entries = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(content) => parse_addons_file(&content).unwrap_or_else(|e| {
                tracing::error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Invalid addon configuration"
                );
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to read addon configuration"
                );
                Vec::new()
            }
        };

        let loaded = join_all(entries.iter().map(|entry| self.fetch_source(entry))).await;
        let sources: Vec<Arc<dyn AddonSource>> = entries
            .iter()
            .zip(loaded)
            .filter_map(|(entry, result)| match result {
                Ok(source) => Some(source),
                Err(e) => {
                    tracing::warn!(
                        addon = %entry.name,
                        url = %entry.manifest_url,
                        error = %e,
                        "Failed to load addon"
                    );
                    None
                }
            })
            .collect();

        let count = sources.len();
        tracing::info!(configured = entries.len(), loaded = count, "Addons loaded");
        *self.entries.write() = entries;
        *self.sources.write() = sources;
        count
    }

    async fn fetch_source(
        &self,
        entry: &AddonEntry,
    ) -> std::result::Result<Arc<dyn AddonSource>, AddonClientError> {
        let client = AddonClient::with_http_client(&entry.manifest_url, self.http.clone())?;
        let manifest = client.manifest().await?;

        let client = match &self.api_key {
            Some(key) if is_primary_id(&manifest.id, &self.primary_prefix) => {
                client.with_query("apikey", key.as_str())
            }
            _ => client,
        };
        Ok(Arc::new(HttpAddonSource::new(client, manifest)))
    }

    /// Install an addon by manifest URL and persist the configuration.
    ///
    /// Installing a URL that is already configured replaces its source.
    pub async fn install(&self, manifest_url: &str) -> Result<Arc<dyn AddonSource>> {
        if manifest_url.trim().is_empty() {
            return Err(Error::InvalidInput("empty manifest URL".to_string()));
        }
        let candidate = AddonEntry {
            name: String::new(),
            manifest_url: manifest_url.trim().to_string(),
            description: String::new(),
        };
        let source = self.fetch_source(&candidate).await?;
        let entry = AddonEntry {
            name: source.name().to_string(),
            manifest_url: source
                .manifest()
                .manifest_url
                .clone()
                .unwrap_or(candidate.manifest_url),
            description: source.manifest().description.clone(),
        };

        // Entries of a previous install of the same addon id, possibly from another URL
        let replaced: Vec<String> = self
            .sources
            .read()
            .iter()
            .filter(|s| s.id() == source.id())
            .filter_map(|s| s.manifest().manifest_url.clone())
            .collect();
        {
            let mut entries = self.entries.write();
            entries.retain(|e| {
                !same_addon_url(&e.manifest_url, &entry.manifest_url)
                    && !replaced.iter().any(|u| same_addon_url(u, &e.manifest_url))
            });
            entries.push(entry);
        }
        {
            let mut sources = self.sources.write();
            sources.retain(|s| s.id() != source.id());
            sources.push(Arc::clone(&source));
        }
        self.persist().await?;

        tracing::info!(addon = %source.id(), name = %source.name(), "Addon installed");
        Ok(source)
    }

    /// Remove an addon by id and persist the configuration. Returns whether it existed.
    pub async fn remove(&self, addon_id: &str) -> Result<bool> {
        let removed: Vec<Arc<dyn AddonSource>> = {
            let mut sources = self.sources.write();
            let (removed, kept): (Vec<_>, Vec<_>) =
                sources.drain(..).partition(|s| s.id() == addon_id);
            *sources = kept;
            removed
        };
        if removed.is_empty() {
            return Ok(false);
        }

        let urls: Vec<String> = removed
            .iter()
            .filter_map(|s| s.manifest().manifest_url.clone())
            .collect();
        self.entries
            .write()
            .retain(|e| !urls.iter().any(|u| same_addon_url(u, &e.manifest_url)));
        self.persist().await?;

        tracing::info!(addon = %addon_id, "Addon removed");
        Ok(true)
    }

    /// Reload addons. With `ids`, only those sources have their manifest
    /// re-fetched (a failed fetch keeps the previous one); otherwise the whole
    /// file is reloaded.
    pub async fn refresh(&self, ids: Option<&[String]>) -> usize {
        let Some(ids) = ids else {
            return self.load().await;
        };

        let targets: Vec<(usize, AddonEntry)> = {
            let sources = self.sources.read();
            sources
                .iter()
                .enumerate()
                .filter(|(_, s)| ids.iter().any(|id| id == s.id()))
                .filter_map(|(i, s)| {
                    let url = s.manifest().manifest_url.clone()?;
                    Some((
                        i,
                        AddonEntry {
                            name: s.name().to_string(),
                            manifest_url: url,
                            description: String::new(),
                        },
                    ))
                })
                .collect()
        };

        let results = join_all(targets.iter().map(|(_, entry)| self.fetch_source(entry))).await;
        let mut refreshed = 0;
        let mut sources = self.sources.write();
        for ((index, entry), result) in targets.into_iter().zip(results) {
            match result {
                Ok(source) => {
                    if let Some(slot) = sources.get_mut(index) {
                        *slot = source;
                        refreshed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(addon = %entry.name, error = %e, "Failed to refresh addon");
                }
            }
        }
        refreshed
    }

    /// Write the current entries back as `{"addons": [...]}`
    pub async fn persist(&self) -> Result<()> {
        let file = AddonsFile {
            addons: self.entries(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.config_path, json)
            .await
            .map_err(Error::from)
    }
}

/// Whether two manifest URLs reach the same addon once normalised
/// (`/manifest.json` suffix, trailing slashes, host case)
fn same_addon_url(a: &str, b: &str) -> bool {
    match (base_url_from_manifest_url(a), base_url_from_manifest_url(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim_end_matches('/') == b.trim_end_matches('/'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_form() {
        let entries = parse_addons_file(
            r#"{"addons": [{"name": "Cinemeta", "manifestUrl": "https://v3-cinemeta.strem.io/manifest.json", "description": "Official metadata"}]}"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].manifest_url, "https://v3-cinemeta.strem.io/manifest.json");
    }

    #[test]
    fn test_parse_legacy_form() {
        let entries = parse_addons_file(
            r#"[{"name": "TMDB", "url": "http://localhost:7001/manifest.json", "description": "TMDB"}]"#,
        )
        .unwrap();
        assert_eq!(entries[0].name, "TMDB");
        assert_eq!(entries[0].manifest_url, "http://localhost:7001/manifest.json");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_addons_file("{\"nope\": 1}").is_err());
        assert!(parse_addons_file("not json").is_err());
    }

    #[test]
    fn test_same_addon_url_normalises() {
        assert!(same_addon_url("http://a/manifest.json", "http://a/manifest.json/"));
        assert!(same_addon_url("http://a/manifest.json", "http://a/"));
        assert!(same_addon_url("http://HOST:7001/manifest.json", "http://host:7001"));
        assert!(!same_addon_url("http://a/manifest.json", "http://b/manifest.json"));
    }

    #[tokio::test]
    async fn test_missing_file_empties_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AddonRegistry::new(
            dir.path().join("missing.json"),
            reqwest::Client::new(),
            "tmdb",
            None,
        );
        assert_eq!(registry.load().await, 0);
        assert!(registry.sources().is_empty());
        assert!(registry.primary().is_none());
    }
}
