//! Adaptive source selection
//!
//! Picks the best URL for an item on a given media tier and decides
//! between chunked streaming and progressive download for videos. The
//! resolver never fails: validated items resolve on every tier, and a
//! progressive URL is always part of a streaming plan.

use crate::{
    config::StreamingConfig,
    profile::MediaTier,
    types::StoryItem,
};
use serde::{Deserialize, Serialize};

const MASTER_SUFFIX: &str = "_master.m3u8";

/// How a streaming manifest is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingDelivery {
    /// The media element plays the manifest itself
    Native,
    /// The streaming client library must be loaded and attached
    Library,
}

/// Chunked streaming source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingSource {
    pub url: String,
    pub delivery: StreamingDelivery,
}

/// Playback plan for a video item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingPlan {
    pub streaming: Option<StreamingSource>,
    /// Always usable; the fallback when streaming setup fails
    pub progressive: String,
}

impl StreamingPlan {
    /// URL the media element should load first
    pub fn initial_url(&self) -> &str {
        self.streaming
            .as_ref()
            .map(|s| s.url.as_str())
            .unwrap_or(&self.progressive)
    }
}

/// Runtime streaming capabilities reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamingSupport {
    /// Media elements play streaming manifests without a library
    pub native: bool,
    /// The streaming library may be loaded
    pub library: bool,
}

/// Source resolver bound to the host's streaming capabilities
#[derive(Debug, Clone)]
pub struct SourceResolver {
    support: StreamingSupport,
    prefer_progressive_mp4: bool,
}

impl SourceResolver {
    pub fn new(support: StreamingSupport, config: &StreamingConfig) -> Self {
        Self {
            support: StreamingSupport {
                native: support.native,
                library: support.library && config.library_enabled,
            },
            prefer_progressive_mp4: config.prefer_progressive_mp4,
        }
    }

    pub fn support(&self) -> StreamingSupport {
        self.support
    }

    /// Best URL: `optimal`, then the tier-specific field, then `src`
    ///
    /// An item that skipped validation falls through to the other tier's
    /// field and finally to an empty string.
    pub fn resolve<'a>(&self, item: &'a StoryItem, tier: MediaTier) -> &'a str {
        let (own, other) = match tier {
            MediaTier::Mobile => (&item.mobile, &item.desktop),
            MediaTier::Desktop => (&item.desktop, &item.mobile),
        };
        [&item.optimal, own, &item.src, other]
            .into_iter()
            .find_map(non_empty)
            .unwrap_or_default()
    }

    /// Streaming manifest for the tier, if the item has one
    pub fn streaming_url<'a>(&self, item: &'a StoryItem, tier: MediaTier) -> Option<&'a str> {
        match tier {
            MediaTier::Mobile => item.mobile_hls.as_deref().or(item.hls.as_deref()),
            MediaTier::Desktop => item.hls.as_deref().or(item.mobile_hls.as_deref()),
        }
    }

    /// Decide between streaming and progressive delivery for a video
    pub fn streaming_plan(&self, item: &StoryItem, tier: MediaTier) -> StreamingPlan {
        let progressive = self.resolve(item, tier).to_string();

        let mp4_wins = self.prefer_progressive_mp4
            && progressive.to_ascii_lowercase().ends_with(".mp4");

        let delivery = if self.support.native {
            Some(StreamingDelivery::Native)
        } else if self.support.library {
            Some(StreamingDelivery::Library)
        } else {
            None
        };

        let streaming = match (self.streaming_url(item, tier), delivery) {
            (Some(url), Some(delivery)) if item.is_video() && !mp4_wins => Some(StreamingSource {
                url: url.to_string(),
                delivery,
            }),
            _ => None,
        };

        StreamingPlan {
            streaming,
            progressive,
        }
    }

    /// Source for the avatar-circle preview
    pub fn preview_source<'a>(&self, item: &'a StoryItem, tier: MediaTier) -> &'a str {
        if let Some(circle) = non_empty(&item.circle) {
            return circle;
        }
        let preferred = match tier {
            MediaTier::Mobile => non_empty(&item.mobile).or(non_empty(&item.src)),
            MediaTier::Desktop => non_empty(&item.src),
        };
        preferred.unwrap_or_else(|| self.resolve(item, tier))
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

/// URLs to pre-fetch so a stream starts instantly
///
/// `foo_master.m3u8` expands to the master, the lowest variant playlist
/// `foo_0.m3u8` and its first two segments `foo_0_000.ts` and
/// `foo_0_001.ts`. Other names only warm the manifest itself.
pub fn warmup_urls(master: &str) -> Vec<String> {
    let master = master.trim();
    if master.is_empty() {
        return Vec::new();
    }
    match master.strip_suffix(MASTER_SUFFIX) {
        Some(stem) => vec![
            master.to_string(),
            format!("{stem}_0.m3u8"),
            format!("{stem}_0_000.ts"),
            format!("{stem}_0_001.ts"),
        ],
        None => vec![master.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaKind, StoryItem};

    fn full_item() -> StoryItem {
        let mut item = StoryItem::video("v.mov");
        item.optimal = Some("story-v.mp4".into());
        item.mobile = Some("mobile/v_optimized.mp4".into());
        item.desktop = Some("desktop/v_optimized.mp4".into());
        item.mobile_hls = Some("hls/mobile/v_master.m3u8".into());
        item
    }

    fn resolver(native: bool, library: bool) -> SourceResolver {
        SourceResolver::new(StreamingSupport { native, library }, &StreamingConfig::default())
    }

    #[test]
    fn test_optimal_wins_regardless_of_tier() {
        let r = resolver(false, false);
        let item = full_item();
        assert_eq!(r.resolve(&item, MediaTier::Mobile), "story-v.mp4");
        assert_eq!(r.resolve(&item, MediaTier::Desktop), "story-v.mp4");
    }

    #[test]
    fn test_tier_field_then_fallback() {
        let r = resolver(false, false);
        let mut item = full_item();
        item.optimal = None;
        assert_eq!(r.resolve(&item, MediaTier::Mobile), "mobile/v_optimized.mp4");
        item.desktop = None;
        assert_eq!(r.resolve(&item, MediaTier::Desktop), "v.mov");
    }

    #[test]
    fn test_items_without_src_resolve_on_every_tier() {
        let r = resolver(false, false);
        let json = r#"{"type":"image","optimal":"x.jpg","mobile":"m.jpg","desktop":"d.jpg"}"#;
        let item: StoryItem = serde_json::from_str(json).unwrap();
        assert_eq!(r.resolve(&item, MediaTier::Mobile), "x.jpg");
        assert_eq!(r.resolve(&item, MediaTier::Desktop), "x.jpg");

        let tiers: StoryItem =
            serde_json::from_str(r#"{"type":"video","mobile":"m.mp4","desktop":"d.mp4"}"#).unwrap();
        assert_eq!(r.resolve(&tiers, MediaTier::Mobile), "m.mp4");
        assert_eq!(r.resolve(&tiers, MediaTier::Desktop), "d.mp4");
        assert_eq!(r.streaming_plan(&tiers, MediaTier::Desktop).progressive, "d.mp4");
        assert_eq!(r.preview_source(&tiers, MediaTier::Desktop), "d.mp4");

        let bare = StoryItem::bare(MediaKind::Video, None);
        assert_eq!(r.resolve(&bare, MediaTier::Mobile), "");
    }

    #[test]
    fn test_streaming_plan_native_and_library() {
        let item = full_item();

        let native = resolver(true, true).streaming_plan(&item, MediaTier::Mobile);
        let source = native.streaming.clone().unwrap();
        assert_eq!(source.delivery, StreamingDelivery::Native);
        assert_eq!(source.url, "hls/mobile/v_master.m3u8");
        assert_eq!(native.initial_url(), "hls/mobile/v_master.m3u8");

        let library = resolver(false, true).streaming_plan(&item, MediaTier::Desktop);
        assert_eq!(library.streaming.unwrap().delivery, StreamingDelivery::Library);
        assert_eq!(library.progressive, "story-v.mp4");
    }

    #[test]
    fn test_streaming_degrades_to_progressive() {
        let item = full_item();
        let plan = resolver(false, false).streaming_plan(&item, MediaTier::Mobile);
        assert!(plan.streaming.is_none());
        assert_eq!(plan.initial_url(), "story-v.mp4");

        let mut config = StreamingConfig::default();
        config.library_enabled = false;
        let r = SourceResolver::new(StreamingSupport { native: false, library: true }, &config);
        assert!(r.streaming_plan(&item, MediaTier::Mobile).streaming.is_none());
    }

    #[test]
    fn test_progressive_mp4_preference() {
        let mut config = StreamingConfig::default();
        config.prefer_progressive_mp4 = true;
        let r = SourceResolver::new(StreamingSupport { native: true, library: true }, &config);
        assert!(r.streaming_plan(&full_item(), MediaTier::Mobile).streaming.is_none());
    }

    #[test]
    fn test_images_never_stream() {
        let mut item = StoryItem::image("a.jpg");
        item.hls = Some("a_master.m3u8".into());
        assert!(resolver(true, true).streaming_plan(&item, MediaTier::Mobile).streaming.is_none());
    }

    #[test]
    fn test_warmup_urls() {
        assert_eq!(
            warmup_urls("./hls/clip_master.m3u8"),
            vec![
                "./hls/clip_master.m3u8",
                "./hls/clip_0.m3u8",
                "./hls/clip_0_000.ts",
                "./hls/clip_0_001.ts",
            ]
        );
        assert_eq!(warmup_urls("plain.m3u8"), vec!["plain.m3u8"]);
        assert!(warmup_urls("  ").is_empty());
    }

    #[test]
    fn test_preview_source() {
        let r = resolver(false, false);
        let mut item = full_item();
        assert_eq!(r.preview_source(&item, MediaTier::Mobile), "mobile/v_optimized.mp4");
        item.circle = Some("circle.mp4".into());
        assert_eq!(r.preview_source(&item, MediaTier::Desktop), "circle.mp4");
    }
}
