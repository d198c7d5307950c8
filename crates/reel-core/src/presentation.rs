//! Modal presentation
//!
//! The engine describes what the overlay should look like through
//! [`ViewEvent`]s. A [`Presenter`] turns them into pixels; [`ViewModel`] is
//! the headless presenter used by tests, the CLI and the session host.

use crate::{
    engagement::{relative_age, Comment},
    playback::LoadToken,
    resolver::StreamingSource,
    types::{MediaKind, Product},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Media element to construct for the current item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMount {
    /// Readiness and error reports must carry this token
    pub token: LoadToken,
    pub kind: MediaKind,
    /// URL the element loads first
    pub url: String,
    /// Present when the element should play a streaming manifest
    pub streaming: Option<StreamingSource>,
    /// Fallback when streaming setup fails
    pub progressive: String,
    pub poster: Option<String>,
    pub muted: bool,
    /// Alt text
    pub label: String,
    /// The handle came from the media cache and is already decoded
    pub cached: bool,
}

/// Like and comment counters shown on the action rail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementView {
    pub story: usize,
    pub likes: u64,
    pub liked: bool,
    pub comments: usize,
    pub muted: bool,
}

/// A comment as rendered in the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    /// Avatar letter
    pub initial: char,
    pub author: String,
    pub text: String,
    /// `5m`, `2h`, ...
    pub age: String,
}

impl CommentView {
    pub fn from_comment(comment: &Comment, now: DateTime<Utc>) -> Self {
        let initial = comment
            .author
            .chars()
            .next()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('?');
        Self {
            initial,
            author: comment.author.clone(),
            text: comment.text.clone(),
            age: relative_age(comment.ts, now),
        }
    }
}

/// Call-to-action card for the promoted product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCard {
    pub title: String,
    pub thumb: String,
    pub price_now: String,
    pub price_old: Option<String>,
    pub href: String,
}

impl ProductCard {
    pub fn new(product: &Product, href: impl Into<String>) -> Self {
        Self {
            title: product.title.clone(),
            thumb: product.thumb.clone(),
            price_now: product.price_now.clone(),
            price_old: product.price_old.clone().filter(|p| !p.is_empty()),
            href: href.into(),
        }
    }

    /// Card markup with every product field escaped
    pub fn to_html(&self) -> String {
        let title = escape_html(&self.title);
        let old = self
            .price_old
            .as_deref()
            .map(|p| format!(r#"<span class="ig-price-old">{}</span>"#, escape_html(p)))
            .unwrap_or_default();
        format!(
            concat!(
                r#"<div class="ig-card" role="group" aria-label="Offer">"#,
                r#"<div class="ig-card-left">"#,
                r#"<div class="ig-thumb-wrap"><img class="ig-thumb" src="{thumb}" alt="{title}"></div>"#,
                r#"<div class="ig-info"><div class="ig-title">{title}</div>"#,
                r#"<div class="ig-price-row"><span class="ig-price-now">{now}</span>{old}</div>"#,
                r#"</div></div>"#,
                r#"<div class="ig-card-actions">"#,
                r#"<button type="button" class="ig-saiba">Learn more <span aria-hidden="true">&rsaquo;</span></button>"#,
                r#"</div></div>"#,
            ),
            thumb = escape_html(&self.thumb),
            title = title,
            now = escape_html(&self.price_now),
            old = old,
        )
    }
}

/// Escape the five HTML-significant characters
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Rendering instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Pause and mute every other media element on the page
    SilenceHostMedia,
    /// Lock page scroll and fade the overlay in
    ShowOverlay,
    /// Fade out, hide, and restore page scroll
    HideOverlay { fade: Duration },
    FocusClose { delay: Duration },
    /// Move focus to the page's own purchase button
    FocusCta,
    /// One bar per item; bars before `active` full, the rest empty
    LayoutBars { count: usize, active: usize },
    /// Fill bar `index` linearly from `from` to 1.0 over `duration`
    AnimateBar { index: usize, from: f64, duration: Duration },
    /// Stop bar `index` at `progress`
    FreezeBar { index: usize, progress: f64 },
    /// Stop, unload and remove the current media element
    TeardownMedia,
    MountMedia(MediaMount),
    /// Point the current element at another URL if `token` is still current
    SwapSource { token: LoadToken, url: String },
    LoadingIndicator { visible: bool },
    PlayMedia,
    PauseMedia,
    SetMuted { muted: bool },
    /// Flag the avatar of `story` as viewed
    MarkSeen { story: usize },
    Product(ProductCard),
    Engagement(EngagementView),
    CommentsPanel { open: bool, comments: Vec<CommentView> },
    ProfilePrompt { visible: bool },
    Toast { message: String },
}

/// Consumer of view events
pub trait Presenter {
    fn present(&mut self, event: &ViewEvent);

    fn present_all<'a>(&mut self, events: impl IntoIterator<Item = &'a ViewEvent>)
    where
        Self: Sized,
    {
        for event in events {
            self.present(event);
        }
    }
}

/// State of one progress bar
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BarView {
    /// Fill at the last instruction, 0.0 to 1.0
    pub progress: f64,
    /// Running animation length, if the bar is filling
    pub animating: Option<Duration>,
}

/// Headless presenter holding the rendered state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewModel {
    pub overlay_visible: bool,
    pub scroll_locked: bool,
    pub bars: Vec<BarView>,
    pub media: Option<MediaMount>,
    pub media_playing: bool,
    pub loading_visible: bool,
    pub muted: bool,
    pub seen: BTreeSet<usize>,
    pub product: Option<ProductCard>,
    pub engagement: Option<EngagementView>,
    pub comments_open: bool,
    pub comments: Vec<CommentView>,
    pub profile_prompt: bool,
    pub toast: Option<String>,
    pub host_media_silenced: u32,
    pub focus_on_close: bool,
    pub focus_on_cta: bool,
    /// Elements constructed so far; teardown never decrements
    pub mounts: u32,
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of the mounted element, if any
    pub fn media_url(&self) -> Option<&str> {
        self.media.as_ref().map(|m| m.url.as_str())
    }
}

impl Presenter for ViewModel {
    fn present(&mut self, event: &ViewEvent) {
        match event {
            ViewEvent::SilenceHostMedia => self.host_media_silenced += 1,
            ViewEvent::ShowOverlay => {
                self.overlay_visible = true;
                self.scroll_locked = true;
                self.focus_on_cta = false;
            }
            ViewEvent::HideOverlay { .. } => {
                self.overlay_visible = false;
                self.scroll_locked = false;
                self.loading_visible = false;
                self.focus_on_close = false;
            }
            ViewEvent::FocusClose { .. } => self.focus_on_close = true,
            ViewEvent::FocusCta => self.focus_on_cta = true,
            ViewEvent::LayoutBars { count, active } => {
                self.bars = (0..*count)
                    .map(|i| BarView {
                        progress: if i < *active { 1.0 } else { 0.0 },
                        animating: None,
                    })
                    .collect();
            }
            ViewEvent::AnimateBar { index, from, duration } => {
                if let Some(bar) = self.bars.get_mut(*index) {
                    bar.progress = *from;
                    bar.animating = Some(*duration);
                }
            }
            ViewEvent::FreezeBar { index, progress } => {
                if let Some(bar) = self.bars.get_mut(*index) {
                    bar.progress = *progress;
                    bar.animating = None;
                }
            }
            ViewEvent::TeardownMedia => {
                self.media = None;
                self.media_playing = false;
            }
            ViewEvent::MountMedia(mount) => {
                self.media = Some(mount.clone());
                self.muted = mount.muted;
                self.mounts += 1;
            }
            ViewEvent::SwapSource { token, url } => {
                if let Some(media) = self.media.as_mut().filter(|m| m.token == *token) {
                    media.url = url.clone();
                }
            }
            ViewEvent::LoadingIndicator { visible } => self.loading_visible = *visible,
            ViewEvent::PlayMedia => self.media_playing = self.media.is_some(),
            ViewEvent::PauseMedia => self.media_playing = false,
            ViewEvent::SetMuted { muted } => self.muted = *muted,
            ViewEvent::MarkSeen { story } => {
                self.seen.insert(*story);
            }
            ViewEvent::Product(card) => self.product = Some(card.clone()),
            ViewEvent::Engagement(view) => {
                self.muted = view.muted;
                self.engagement = Some(view.clone());
            }
            ViewEvent::CommentsPanel { open, comments } => {
                self.comments_open = *open;
                self.comments = comments.clone();
            }
            ViewEvent::ProfilePrompt { visible } => self.profile_prompt = *visible,
            ViewEvent::Toast { message } => self.toast = Some(message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_product_card_escapes_fields() {
        let product = Product {
            title: "Serum <new>".into(),
            thumb: "t.jpg".into(),
            price_now: "$10".into(),
            price_old: Some(String::new()),
        };
        let card = ProductCard::new(&product, "https://buy");
        let html = card.to_html();
        assert!(html.contains("Serum &lt;new&gt;"));
        assert!(!html.contains("<new>"));
        assert!(!html.contains("ig-price-old"));
    }

    #[test]
    fn test_view_model_bars() {
        let mut vm = ViewModel::new();
        vm.present(&ViewEvent::LayoutBars { count: 3, active: 1 });
        vm.present(&ViewEvent::AnimateBar {
            index: 1,
            from: 0.0,
            duration: Duration::from_secs(3),
        });
        assert_eq!(vm.bars[0].progress, 1.0);
        assert_eq!(vm.bars[1].animating, Some(Duration::from_secs(3)));

        vm.present(&ViewEvent::FreezeBar { index: 1, progress: 0.5 });
        assert_eq!(vm.bars[1], BarView { progress: 0.5, animating: None });
        assert_eq!(vm.bars[2].progress, 0.0);
    }

    #[test]
    fn test_swap_source_ignores_stale_token() {
        let mut vm = ViewModel::new();
        vm.present(&ViewEvent::MountMedia(MediaMount {
            token: LoadToken(2),
            kind: MediaKind::Image,
            url: "low.jpg".into(),
            streaming: None,
            progressive: "low.jpg".into(),
            poster: None,
            muted: false,
            label: String::new(),
            cached: false,
        }));
        vm.present(&ViewEvent::SwapSource { token: LoadToken(1), url: "hq.jpg".into() });
        assert_eq!(vm.media_url(), Some("low.jpg"));
        vm.present(&ViewEvent::SwapSource { token: LoadToken(2), url: "hq.jpg".into() });
        assert_eq!(vm.media_url(), Some("hq.jpg"));
    }

    #[test]
    fn test_comment_view() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let comment = Comment {
            author: "beatriz".into(),
            text: "ok".into(),
            ts: now - chrono::Duration::minutes(5),
        };
        let view = CommentView::from_comment(&comment, now);
        assert_eq!(view.initial, 'B');
        assert_eq!(view.age, "5m");
    }
}
