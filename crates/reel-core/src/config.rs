//! Widget configuration
//!
//! Every recognized option is enumerated here with its default. Hosts pass a
//! partial JSON object; missing fields fall back to [`Default`] and the
//! result is checked with [`StoriesConfig::validate`] before any engine is
//! built from it.

use crate::{
    types::{MediaKind, PreviewKind, Product, Story, StoryCollection, StoryItem},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoriesConfig {
    /// CSS selector for avatar trigger elements
    pub avatars_selector: String,
    /// Page elements (trust badges, star ratings) that open the first story
    pub open_triggers: Vec<String>,
    /// Purchase link used by the call-to-action and share links
    pub cta_href: String,
    /// Product card contents; `None` lets the host scrape the page
    pub product: Option<Product>,
    /// Story collection; defaults to the built-in demo set
    pub stories: StoryCollection,
    pub playback: PlaybackConfig,
    pub cache: CacheConfig,
    pub streaming: StreamingConfig,
    pub engagement: EngagementConfig,
}

impl Default for StoriesConfig {
    fn default() -> Self {
        Self {
            avatars_selector: ".story-avatar".to_string(),
            open_triggers: default_open_triggers(),
            cta_href: "https://shop.example.com/checkout".to_string(),
            product: None,
            stories: demo_stories(),
            playback: PlaybackConfig::default(),
            cache: CacheConfig::default(),
            streaming: StreamingConfig::default(),
            engagement: EngagementConfig::default(),
        }
    }
}

fn default_open_triggers() -> Vec<String> {
    [
        ".trust-primary",
        ".reviews-mini",
        r#"img[alt="5 estrelas"]"#,
        r#"img[src*="stars-rating"]"#,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl StoriesConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StoriesConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every invariant the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.avatars_selector.trim().is_empty() {
            return Err(Error::InvalidConfig("avatarsSelector must not be empty".into()));
        }
        if self.stories.is_empty() {
            return Err(Error::EmptyCollection);
        }
        for (index, story) in self.stories.stories().iter().enumerate() {
            if story.items.is_empty() {
                return Err(Error::EmptyStory { index });
            }
            for (item, it) in story.items.iter().enumerate() {
                if !it.has_source_for_every_tier() {
                    return Err(Error::MissingSource { story: index, item });
                }
            }
        }
        self.playback.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    /// Product card contents, falling back to the generic product
    pub fn product_or_default(&self) -> Product {
        self.product.clone().unwrap_or_default()
    }
}

/// Timing constants of the playback engine and gesture layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    /// Display duration of image items
    pub image_duration_ms: u64,
    /// Pause requests this soon after opening are ignored
    pub open_pause_guard_ms: u64,
    /// Delay before the loading indicator appears
    pub loading_grace_ms: u64,
    /// Press duration that turns into a hold-pause
    pub hold_delay_ms: u64,
    /// Minimum horizontal travel for a swipe
    pub swipe_threshold_px: f64,
    /// Animation frames waited by the navigation buttons
    pub nav_resume_frames: u8,
    /// Overlay fade-out duration
    pub close_fade_ms: u64,
    /// Delay before focus moves to the close control
    pub focus_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            image_duration_ms: 3000,
            open_pause_guard_ms: 600,
            loading_grace_ms: 300,
            hold_delay_ms: 120,
            swipe_threshold_px: 40.0,
            nav_resume_frames: 2,
            close_fade_ms: 160,
            focus_delay_ms: 50,
        }
    }
}

impl PlaybackConfig {
    pub fn image_duration(&self) -> Duration {
        Duration::from_millis(self.image_duration_ms)
    }

    pub fn open_pause_guard(&self) -> Duration {
        Duration::from_millis(self.open_pause_guard_ms)
    }

    pub fn loading_grace(&self) -> Duration {
        Duration::from_millis(self.loading_grace_ms)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.image_duration_ms == 0 {
            return Err(Error::InvalidConfig("imageDurationMs must be positive".into()));
        }
        if !(self.swipe_threshold_px.is_finite() && self.swipe_threshold_px > 0.0) {
            return Err(Error::InvalidConfig("swipeThresholdPx must be positive".into()));
        }
        Ok(())
    }
}

/// Media cache bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub capacity: usize,
    /// Share of entries dropped per eviction batch
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            eviction_fraction: 0.25,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("cache capacity must be positive".into()));
        }
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(Error::InvalidConfig("evictionFraction must be in (0, 1]".into()));
        }
        Ok(())
    }
}

/// Options for the third-party adaptive-streaming client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamingConfig {
    /// Script loaded when the runtime has no native streaming support
    pub library_url: String,
    /// Allow loading the library at all
    pub library_enabled: bool,
    /// Progressive `.mp4` sources win over streaming manifests
    pub prefer_progressive_mp4: bool,
    /// Options handed to the library constructor
    pub library_options: StreamingLibraryOptions,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            library_url: "https://cdn.jsdelivr.net/npm/hls.js@1.5.15/dist/hls.min.js".to_string(),
            library_enabled: true,
            prefer_progressive_mp4: false,
            library_options: StreamingLibraryOptions::default(),
        }
    }
}

/// Constructor options of the streaming library, serialized verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamingLibraryOptions {
    pub auto_start_load: bool,
    pub start_level: u32,
    pub cap_level_on_fps_drop: bool,
    pub cap_level_to_player_size: bool,
    pub max_initial_bitrate: u64,
    pub start_frag_prefetch: bool,
}

impl Default for StreamingLibraryOptions {
    fn default() -> Self {
        Self {
            auto_start_load: true,
            start_level: 0,
            cap_level_on_fps_drop: true,
            cap_level_to_player_size: true,
            max_initial_bitrate: 300_000,
            start_frag_prefetch: true,
        }
    }
}

/// Mocked social-engagement settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementConfig {
    /// Messaging deep-link base, e.g. `https://wa.me/<number>`
    pub whatsapp_base: String,
    /// Like count every story starts with after seeding
    pub seed_like_count: u64,
    /// Number of stories that receive seeded comments
    pub seed_story_count: usize,
    /// Maximum characters kept from a visitor comment
    pub comment_max_chars: usize,
    /// Number of most recent comments rendered
    pub visible_comments: usize,
    /// Author name used when no profile is stored
    pub anonymous_name: String,
    /// Text attached to the share sheet
    pub share_text: String,
    /// Quick-insert glyphs shown above the comment input
    pub quick_emojis: Vec<String>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            whatsapp_base: "https://wa.me/".to_string(),
            seed_like_count: 86,
            seed_story_count: 7,
            comment_max_chars: 140,
            visible_comments: 80,
            anonymous_name: "Customer".to_string(),
            share_text: "Take a look at this product!".to_string(),
            quick_emojis: ["😂", "😍", "🥰", "😮", "😊", "😢"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

fn video_variants(label: &str, base: &str, slot: &str) -> Story {
    let item = StoryItem {
        kind: MediaKind::Video,
        src: Some(format!("./media/videos/{base}.mp4")),
        optimal: Some(format!("./stories/story-{slot}.mp4")),
        mobile: Some(format!("./videos/mobile/{base}_optimized.mp4")),
        desktop: Some(format!("./videos/desktop/{base}_optimized.mp4")),
        hls: None,
        mobile_hls: Some(format!("./videos/hls/mobile/{base}_master.m3u8")),
        circle: Some(format!("./videos/thumbnails/{base}_circle.mp4")),
        poster: Some(format!("./stories/story-{slot}-poster.jpg")),
        thumbnail: Some(format!("./videos/thumbnails/video-{slot}.jpg")),
    };
    Story {
        label: label.to_string(),
        thumbnail: item.thumbnail.clone(),
        items: vec![item],
        preview_type: PreviewKind::Video,
    }
}

fn image_variants(name: &str) -> StoryItem {
    StoryItem {
        kind: MediaKind::Image,
        src: Some(format!("./images/{name}")),
        optimal: None,
        mobile: Some(format!("./images/mobile/{name}")),
        desktop: Some(format!("./images/desktop/{name}")),
        hls: None,
        mobile_hls: None,
        circle: None,
        poster: None,
        thumbnail: Some(format!("./images/thumbnails/{name}")),
    }
}

/// Built-in demo collection following the asset naming conventions
pub fn demo_stories() -> StoryCollection {
    let before_after: Vec<StoryItem> = (1..=11)
        .map(|i| image_variants(&format!("before-after/{i}.jpg")))
        .collect();

    let mut customers = video_variants("Real customers", "1", "1");
    customers.items.push(video_variants("", "2", "2").items.remove(0));

    StoryCollection::new(vec![
        video_variants("Highlights", "highlights", "highlights"),
        Story {
            label: "Before/After".to_string(),
            thumbnail: Some("./images/thumbnails/before-after-1.jpg".to_string()),
            items: before_after,
            preview_type: PreviewKind::Slider,
        },
        customers,
        video_variants("How to apply", "3", "3"),
        Story {
            label: "Dermatologist".to_string(),
            thumbnail: Some("./images/thumbnails/story-3.jpg".to_string()),
            items: vec![image_variants("4.jpg"), image_variants("78.jpg")],
            preview_type: PreviewKind::Slider,
        },
        video_variants("30 days later", "6", "6"),
        video_variants("UGC", "2", "2"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoriesConfig::default();
        assert_eq!(config.avatars_selector, ".story-avatar");
        assert_eq!(config.playback.image_duration_ms, 3000);
        assert_eq!(config.playback.open_pause_guard_ms, 600);
        assert_eq!(config.cache.capacity, 50);
        assert_eq!(config.stories.len(), 7);
        assert_eq!(config.open_triggers.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StoriesConfig::from_json_str(
            r#"{"ctaHref":"https://buy.example.com","playback":{"imageDurationMs":5000}}"#,
        )
        .unwrap();
        assert_eq!(config.cta_href, "https://buy.example.com");
        assert_eq!(config.playback.image_duration_ms, 5000);
        assert_eq!(config.playback.hold_delay_ms, 120);
        assert_eq!(config.stories.len(), 7);

        let config = StoriesConfig::from_json_str(r#"{"openTriggers":[".badge"]}"#).unwrap();
        assert_eq!(config.open_triggers, vec![".badge"]);
    }

    #[test]
    fn test_rejects_empty_story() {
        let err = StoriesConfig::from_json_str(r#"{"stories":[{"label":"x","items":[]}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyStory { index: 0 }));
    }

    #[test]
    fn test_rejects_item_missing_a_tier() {
        let err = StoriesConfig::from_json_str(
            r#"{"stories":[{"items":[{"type":"image","src":"  ","mobile":"m.jpg"}]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_SOURCE");
    }

    #[test]
    fn test_accepts_items_without_src() {
        let config = StoriesConfig::from_json_str(
            r#"{"stories":[{"items":[
                {"type":"image","optimal":"x.jpg","mobile":"m.jpg","desktop":"d.jpg"},
                {"type":"video","mobile":"m.mp4","desktop":"d.mp4"}
            ]}]}"#,
        )
        .unwrap();
        let item = config.stories.item(crate::types::ItemPosition::new(0, 1)).unwrap();
        assert!(item.src.is_none());
    }

    #[test]
    fn test_rejects_bad_cache_bounds() {
        let mut config = StoriesConfig::default();
        config.cache.eviction_fraction = 0.0;
        assert!(config.validate().is_err());
    }
}
