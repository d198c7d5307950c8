//! Core types for Reel: stories, items, and the product they promote

use serde::{Deserialize, Serialize};

/// Media kind of a single slide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// How the avatar preview collaborator renders a story's circle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Video,
    Slider,
    #[default]
    None,
}

/// A single image or video slide
///
/// Every source field is optional. A usable item carries `optimal`, `src`,
/// or both tier fields (`mobile` and `desktop`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Generic fallback source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Pre-optimized source, wins over every tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<String>,
    /// Chunked streaming master manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls: Option<String>,
    /// Chunked streaming master manifest encoded for small screens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_hls: Option<String>,
    /// Ultra-light variant for the avatar circle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl StoryItem {
    /// Image item with only a fallback source
    pub fn image(src: impl Into<String>) -> Self {
        Self::bare(MediaKind::Image, Some(src.into()))
    }

    /// Video item with only a fallback source
    pub fn video(src: impl Into<String>) -> Self {
        Self::bare(MediaKind::Video, Some(src.into()))
    }

    /// Item of `kind` with no source fields set
    pub fn bare(kind: MediaKind, src: Option<String>) -> Self {
        Self {
            kind,
            src,
            optimal: None,
            mobile: None,
            desktop: None,
            hls: None,
            mobile_hls: None,
            circle: None,
            poster: None,
            thumbnail: None,
        }
    }

    /// True when every media tier resolves to a non-empty URL
    pub fn has_source_for_every_tier(&self) -> bool {
        let set = |f: &Option<String>| f.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.optimal) || set(&self.src) || (set(&self.mobile) && set(&self.desktop))
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Poster frame shown before the first video frame decodes
    pub fn poster_frame(&self) -> Option<&str> {
        self.poster.as_deref().or(self.thumbnail.as_deref())
    }
}

/// A labeled group of timed items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(default)]
    pub label: String,
    pub items: Vec<StoryItem>,
    #[serde(default)]
    pub preview_type: PreviewKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Story {
    pub fn new(label: impl Into<String>, items: Vec<StoryItem>) -> Self {
        Self {
            label: label.into(),
            items,
            preview_type: PreviewKind::None,
            thumbnail: None,
        }
    }

    /// First item carrying a chunked streaming manifest
    pub fn first_streaming_video(&self) -> Option<&StoryItem> {
        self.items
            .iter()
            .find(|it| it.is_video() && (it.mobile_hls.is_some() || it.hls.is_some()))
    }
}

/// Position of an item inside the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ItemPosition {
    pub story: usize,
    pub item: usize,
}

impl ItemPosition {
    pub fn new(story: usize, item: usize) -> Self {
        Self { story, item }
    }
}

impl std::fmt::Display for ItemPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.story, self.item)
    }
}

/// Ordered, immutable sequence of stories
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryCollection(Vec<Story>);

impl StoryCollection {
    pub fn new(stories: Vec<Story>) -> Self {
        Self(stories)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn stories(&self) -> &[Story] {
        &self.0
    }

    pub fn story(&self, index: usize) -> Option<&Story> {
        self.0.get(index)
    }

    pub fn item(&self, pos: ItemPosition) -> Option<&StoryItem> {
        self.0.get(pos.story).and_then(|s| s.items.get(pos.item))
    }

    pub fn item_count(&self, story: usize) -> usize {
        self.0.get(story).map(|s| s.items.len()).unwrap_or(0)
    }

    /// Clamp both indices into the valid range
    pub fn clamp(&self, story: usize, item: usize) -> ItemPosition {
        let story = story.min(self.len().saturating_sub(1));
        let item = item.min(self.item_count(story).saturating_sub(1));
        ItemPosition { story, item }
    }

    /// Position that plays after `pos`, crossing into the next story
    pub fn next_position(&self, pos: ItemPosition) -> Option<ItemPosition> {
        if pos.item + 1 < self.item_count(pos.story) {
            Some(ItemPosition::new(pos.story, pos.item + 1))
        } else if pos.story + 1 < self.len() {
            Some(ItemPosition::new(pos.story + 1, 0))
        } else {
            None
        }
    }
}

/// Product promoted by the call-to-action card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub title: String,
    pub thumb: String,
    pub price_now: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_old: Option<String>,
}

impl Default for Product {
    fn default() -> Self {
        Self {
            title: "Lash Growth Serum".to_string(),
            thumb: "./images/product.jpg".to_string(),
            price_now: "$29.90".to_string(),
            price_old: None,
        }
    }
}
