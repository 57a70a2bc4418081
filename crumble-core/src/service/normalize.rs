//! Meta item normalization
//!
//! Fills the fields every consumer relies on. Lenient deserialization has
//! already turned nulls into empty values; this supplies display defaults.

use crumble_addons::{ContentType, MetaItem, Video};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_VIDEO_TITLE: &str = "Unknown";

/// Normalize a meta item in place and return it
#[must_use]
pub fn normalize_meta(mut item: MetaItem) -> MetaItem {
    if item.name.trim().is_empty() {
        item.name = UNKNOWN_TITLE.to_string();
    }
    if item.content_type.is_none() {
        item.content_type = Some(ContentType::Movie);
    }
    if let Some(videos) = item.videos.take() {
        item.videos = Some(videos.into_iter().map(normalize_video).collect());
    }
    item
}

fn normalize_video(mut video: Video) -> Video {
    if video.title.trim().is_empty() {
        video.title = UNKNOWN_VIDEO_TITLE.to_string();
    }
    video
}
