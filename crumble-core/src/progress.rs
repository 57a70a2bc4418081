//! Watch progress persistence
//!
//! Progress entries live in a JSON array on disk (`progress.json`), keyed by
//! content id, or `{id}:{video_id}` for episodes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use crumble_addons::ContentType;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ProgressConfig;
use crate::{Error, Result};

/// How far into an item the viewer got
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchProgress {
    pub id: String,
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Seconds
    #[serde(default)]
    pub current_time: f64,
    /// Seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_watched: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
}

impl WatchProgress {
    /// Storage key, see [`progress_key`]
    #[must_use]
    pub fn key(&self) -> String {
        progress_key(&self.id, self.video_id.as_deref())
    }

    /// Fraction watched in `[0, 1]`, zero when the duration is unknown
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.duration > 0.0 && self.duration.is_finite() {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Partial progress update; unset fields keep their stored value.
///
/// `id` and `video_id` together select the entry.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub id: String,
    pub content_type: Option<ContentType>,
    pub title: Option<String>,
    pub poster: Option<String>,
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    pub video_id: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ProgressUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Playback position update
    #[must_use]
    pub const fn position(mut self, current_time: f64, duration: f64) -> Self {
        self.current_time = Some(current_time);
        self.duration = Some(duration);
        self
    }
}

/// Storage key for a content item or one of its episodes
#[must_use]
pub fn progress_key(id: &str, video_id: Option<&str>) -> String {
    match video_id.filter(|v| !v.is_empty()) {
        Some(video_id) => format!("{id}:{video_id}"),
        None => id.to_string(),
    }
}

/// Whether `current_time / duration` is past `threshold`
#[must_use]
pub fn is_completed(current_time: f64, duration: f64, threshold: f64) -> bool {
    duration > 0.0 && current_time / duration > threshold
}

/// File-backed progress store
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    completion_threshold: f64,
    entries: Mutex<Vec<WatchProgress>>,
    /// Serializes writers of the progress file
    save_lock: tokio::sync::Mutex<()>,
}

impl ProgressStore {
    /// Open the store at `path`. A missing or corrupt file starts empty.
    pub async fn open(path: impl Into<PathBuf>, completion_threshold: f64) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse watch progress");
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read watch progress");
                Vec::new()
            }
        };

        Self {
            path,
            completion_threshold,
            entries: Mutex::new(entries),
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn from_config(config: &ProgressConfig) -> Self {
        Self::open(&config.path, config.completion_threshold).await
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge `update` into the stored entry (creating it if needed) and save.
    ///
    /// `last_watched` is set to now and `completed` is recomputed from the
    /// merged position.
    pub async fn update(&self, update: ProgressUpdate) -> Result<WatchProgress> {
        if update.id.trim().is_empty() {
            return Err(Error::InvalidInput("progress id must not be empty".to_string()));
        }
        let entry = self.apply(update, Utc::now());
        self.save().await?;
        Ok(entry)
    }

    fn apply(&self, update: ProgressUpdate, now: DateTime<Utc>) -> WatchProgress {
        let key = progress_key(&update.id, update.video_id.as_deref());
        let mut entries = self.entries.lock();
        let index = match entries.iter().position(|p| p.key() == key) {
            Some(index) => index,
            None => {
                entries.push(WatchProgress {
                    id: update.id.clone(),
                    content_type: ContentType::Movie,
                    title: String::new(),
                    poster: None,
                    current_time: 0.0,
                    duration: 0.0,
                    video_id: update.video_id.clone().filter(|v| !v.is_empty()),
                    season: None,
                    episode: None,
                    last_watched: now,
                    completed: false,
                });
                entries.len() - 1
            }
        };

        let entry = &mut entries[index];
        if let Some(content_type) = update.content_type {
            entry.content_type = content_type;
        }
        if let Some(title) = update.title {
            entry.title = title;
        }
        if update.poster.is_some() {
            entry.poster = update.poster;
        }
        if let Some(current_time) = update.current_time {
            entry.current_time = current_time;
        }
        if let Some(duration) = update.duration {
            entry.duration = duration;
        }
        if update.season.is_some() {
            entry.season = update.season;
        }
        if update.episode.is_some() {
            entry.episode = update.episode;
        }
        entry.completed = is_completed(entry.current_time, entry.duration, self.completion_threshold);
        entry.last_watched = now;
        entry.clone()
    }

    /// Entry by storage key (`id` or `{id}:{video_id}`)
    #[must_use]
    pub fn get(&self, key: &str) -> Option<WatchProgress> {
        self.entries.lock().iter().find(|p| p.key() == key).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<WatchProgress> {
        self.entries.lock().clone()
    }

    /// Unfinished items with some progress, most recently watched first
    #[must_use]
    pub fn continue_watching(&self, limit: usize) -> Vec<WatchProgress> {
        let mut items: Vec<WatchProgress> = self
            .entries
            .lock()
            .iter()
            .filter(|p| !p.completed && p.current_time > 0.0)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.last_watched.cmp(&a.last_watched));
        items.truncate(limit);
        items
    }

    #[must_use]
    pub fn completed(&self) -> Vec<WatchProgress> {
        self.entries
            .lock()
            .iter()
            .filter(|p| p.completed)
            .cloned()
            .collect()
    }

    /// Remove one entry by storage key and save. Returns whether it existed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let removed = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|p| p.key() != key);
            entries.len() != before
        };
        if removed {
            self.save().await?;
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        // Snapshot under the save lock so the last writer stores the latest state
        let json = serde_json::to_string_pretty(&*self.entries.lock())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Atomic replace
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
