//! The stories control handle
//!
//! [`StoriesController`] is what a host embeds: it owns one playback engine
//! plus the gesture recognizer, engagement store and thumbnail preloader,
//! and routes commands between them. Hosts drive it with a monotonic clock
//! reading (`now`) measured from `epoch`, the wall-clock instant at which
//! that clock read zero.

use crate::{
    cache::CachedMedia,
    config::StoriesConfig,
    effects::{Effect, PreloadPurpose},
    engagement::{CommentOutcome, EngagementStore, LikeOutcome, VisitorProfile},
    gesture::{Command, GestureInterpreter, InputEvent, Step},
    playback::{LoadToken, MediaReport, PlaybackState, StoryPlayer, TimerToken},
    preload::{PreloadPriority, ThumbnailPreloader},
    presentation::{CommentView, EngagementView, ProductCard, ViewEvent},
    profile::DeviceProfile,
    resolver::{warmup_urls, StreamingSupport},
    share::{whatsapp_link, SharePayload},
    storage::KeyValueStore,
    types::MediaKind,
    Result,
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const TOAST_COMMENT_POSTED: &str = "Comment posted!";
const TOAST_PROFILE_SAVED: &str = "All set! You can interact now.";
const TOAST_LINK_COPIED: &str = "Link copied!";

/// Control handle for one stories widget
#[derive(Debug)]
pub struct StoriesController<S> {
    player: StoryPlayer<S>,
    gestures: GestureInterpreter,
    engagement: EngagementStore<S>,
    preloader: ThumbnailPreloader,
    product: ProductCard,
    share_text: String,
    whatsapp_base: String,
    open_triggers: Vec<String>,
    epoch: DateTime<Utc>,
    comments_open: bool,
}

impl<S: KeyValueStore + Clone> StoriesController<S> {
    /// Build a controller; `store` handles are shared by every component
    pub fn new(
        config: StoriesConfig,
        profile: DeviceProfile,
        support: StreamingSupport,
        store: S,
        epoch: DateTime<Utc>,
    ) -> Result<Self> {
        let preloader = ThumbnailPreloader::new(profile.max_concurrent_preloads());
        let mut player = StoryPlayer::new(&config, profile, support, store.clone())?;

        let seen: Vec<usize> = player.seen().indices().collect();
        for story in seen {
            player.push(ViewEvent::MarkSeen { story });
        }

        info!(
            stories = config.stories.len(),
            tier = %player.profile().preferred_tier(),
            "Stories controller ready"
        );
        Ok(Self {
            gestures: GestureInterpreter::new(&config.playback),
            engagement: EngagementStore::new(store, config.engagement.clone()),
            preloader,
            product: ProductCard::new(&config.product_or_default(), config.cta_href.clone()),
            share_text: config.engagement.share_text.clone(),
            whatsapp_base: config.engagement.whatsapp_base.clone(),
            open_triggers: config.open_triggers.clone(),
            epoch,
            comments_open: false,
            player,
        })
    }

    pub fn state(&self) -> &PlaybackState {
        self.player.state()
    }

    pub fn player(&self) -> &StoryPlayer<S> {
        &self.player
    }

    pub fn engagement(&self) -> &EngagementStore<S> {
        &self.engagement
    }

    pub fn comments_open(&self) -> bool {
        self.comments_open
    }

    /// Indices of stories the device has already viewed
    pub fn seen_stories(&self) -> Vec<usize> {
        self.player.seen().indices().collect()
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.player.drain_effects()
    }

    fn wall(&self, now: Duration) -> DateTime<Utc> {
        self.epoch + chrono::Duration::from_std(now).unwrap_or_else(|_| chrono::Duration::zero())
    }

    fn engagement_view(&self) -> EngagementView {
        let story = self.player.state().story;
        EngagementView {
            story,
            likes: self.engagement.likes(story),
            liked: self.engagement.has_liked(story),
            comments: self.engagement.comments(story).len(),
            muted: self.player.state().muted,
        }
    }

    fn comment_views(&self, now: Duration) -> Vec<CommentView> {
        let wall = self.wall(now);
        self.engagement
            .visible_comments(self.player.state().story)
            .iter()
            .map(|c| CommentView::from_comment(c, wall))
            .collect()
    }

    fn refresh_engagement(&mut self) {
        let view = self.engagement_view();
        self.player.push(ViewEvent::Engagement(view));
    }

    fn render_comments(&mut self, now: Duration) {
        let comments = self.comment_views(now);
        self.player.push(ViewEvent::CommentsPanel { open: true, comments });
    }

    /// Run `op` on the player and refresh story-scoped views if the story changed
    fn navigate(
        &mut self,
        now: Duration,
        op: impl FnOnce(&mut StoryPlayer<S>, Duration) -> Result<()>,
    ) -> Result<()> {
        let before = (self.player.state().is_open(), self.player.state().story);
        op(&mut self.player, now)?;
        let (open, story) = (self.player.state().is_open(), self.player.state().story);

        if !open {
            if before.0 {
                self.on_closed();
            }
            return Ok(());
        }
        if !before.0 {
            self.engagement.seed_if_needed(self.wall(now));
            let card = self.product.clone();
            self.player.push(ViewEvent::Product(card));
        }
        if !before.0 || before.1 != story {
            self.refresh_engagement();
            if self.comments_open {
                self.render_comments(now);
            }
        }
        Ok(())
    }

    fn on_closed(&mut self) {
        self.gestures.reset();
        self.player.push(Effect::CancelHoldTimer);
        if std::mem::take(&mut self.comments_open) {
            self.player.push(ViewEvent::CommentsPanel {
                open: false,
                comments: Vec::new(),
            });
        }
        self.player.push(ViewEvent::ProfilePrompt { visible: false });
    }

    /// Open `(story, item)`, clamped into range
    pub fn open_story(&mut self, story: usize, item: usize, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.open(story, item, now))
    }

    /// Open again where the viewer left off
    pub fn reopen(&mut self, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.reopen(now))
    }

    pub fn next_item(&mut self, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.next_item(now))
    }

    pub fn prev_item(&mut self, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.prev_item(now))
    }

    pub fn next_story(&mut self, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.next_story(now))
    }

    pub fn prev_story(&mut self, jump_to_last: bool, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.prev_story(jump_to_last, now))
    }

    pub fn close(&mut self, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.close(now))
    }

    pub fn pause(&mut self, now: Duration) -> Result<bool> {
        self.player.pause(now)
    }

    pub fn resume(&mut self, now: Duration) -> Result<bool> {
        self.player.resume(now)
    }

    /// Close and move focus to the page's own purchase button
    pub fn learn_more(&mut self, now: Duration) -> Result<()> {
        self.close(now)?;
        self.player.push(ViewEvent::FocusCta);
        Ok(())
    }

    /// Feed one raw input event through the gesture layer
    pub fn handle_input(&mut self, event: InputEvent, now: Duration) -> Result<()> {
        let opened_at = self.player.state().opened_at;
        for step in self.gestures.interpret(event, now, opened_at) {
            match step {
                Step::Dispatch(command) => self.run_command(command, now)?,
                Step::ArmHold { token, delay } => self.player.push(Effect::ArmHoldTimer { token, delay }),
                Step::CancelHold => self.player.push(Effect::CancelHoldTimer),
                Step::AfterFrames { frames, commands } => {
                    self.player.push(Effect::AfterFrames { frames, commands })
                }
                Step::TrapFocus { backwards } => self.player.push(Effect::TrapFocus { backwards }),
            }
        }
        Ok(())
    }

    /// Run deferred commands, e.g. from an [`Effect::AfterFrames`]
    pub fn run_commands(&mut self, commands: &[Command], now: Duration) -> Result<()> {
        for command in commands {
            self.run_command(*command, now)?;
        }
        Ok(())
    }

    pub fn run_command(&mut self, command: Command, now: Duration) -> Result<()> {
        debug!(?command, "Command");
        match command {
            Command::OpenStory { story, item } => self.open_story(story, item, now),
            Command::NextItem => self.next_item(now),
            Command::PrevItem => self.prev_item(now),
            Command::NextStory => self.next_story(now),
            Command::PrevStory { jump_to_last } => self.prev_story(jump_to_last, now),
            Command::Pause => self.pause(now).map(|_| ()),
            Command::Resume => self.resume(now).map(|_| ()),
            Command::Close => self.close(now),
            Command::ToggleMute => {
                self.toggle_mute();
                Ok(())
            }
            Command::ToggleComments => self.toggle_comments(now).map(|_| ()),
            Command::LearnMore => self.learn_more(now),
        }
    }

    /// Click on an avatar carrying `index_attr` as its story index
    ///
    /// Returns false when the attribute is not a valid index.
    pub fn avatar_clicked(&mut self, index_attr: &str, now: Duration) -> Result<bool> {
        let Ok(story) = index_attr.trim().parse::<usize>() else {
            debug!(index_attr, "Ignoring avatar without a numeric index");
            return Ok(false);
        };
        self.open_story(story, 0, now)?;
        Ok(true)
    }

    /// Selector matching every configured page trigger, if any
    pub fn open_trigger_selector(&self) -> Option<String> {
        let selectors: Vec<&str> = self
            .open_triggers
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        (!selectors.is_empty()).then(|| selectors.join(", "))
    }

    /// Click on a page trigger outside the avatar strip: first story, first item
    pub fn trigger_clicked(&mut self, now: Duration) -> Result<()> {
        debug!("Opening from page trigger");
        self.open_story(0, 0, now)
    }

    /// Pointer went down on an avatar: warm up its first streaming video
    pub fn avatar_pressed(&mut self, story: usize) {
        let tier = self.player.profile().preferred_tier();
        let urls = self
            .player
            .stories()
            .story(story)
            .and_then(|s| s.first_streaming_video())
            .and_then(|item| self.player.resolver().streaming_url(item, tier))
            .map(warmup_urls)
            .unwrap_or_default();
        if !urls.is_empty() {
            self.player.push(Effect::Warmup { urls });
        }
    }

    /// An avatar scrolled into view: queue its thumbnails and warm its stream
    pub fn avatar_visible(&mut self, story: usize) {
        let Some(s) = self.player.stories().story(story).cloned() else {
            return;
        };
        if let Some(thumb) = s.thumbnail.as_deref() {
            self.preloader.add(thumb, PreloadPriority::High);
        }
        for thumb in s.items.iter().filter_map(|it| it.thumbnail.as_deref()) {
            self.preloader.add(thumb, PreloadPriority::Normal);
        }
        self.avatar_pressed(story);
        self.start_preloads();
    }

    fn start_preloads(&mut self) {
        for url in self.preloader.next_batch() {
            self.player.push(Effect::Preload {
                url,
                kind: MediaKind::Image,
                purpose: PreloadPurpose::Thumbnail,
            });
        }
    }

    /// A thumbnail preload finished; `report` is `None` on failure
    pub fn preload_finished(&mut self, url: &str, report: Option<MediaReport>) {
        self.preloader.complete(url, report.is_some());
        if let Some(report) = report {
            self.player.remember(
                url,
                CachedMedia {
                    kind: MediaKind::Image,
                    url: url.to_string(),
                    width: report.width,
                    height: report.height,
                },
            );
        }
        self.start_preloads();
    }

    pub fn toggle_like(&mut self) -> LikeOutcome {
        let outcome = self.engagement.toggle_like(self.player.state().story);
        match outcome {
            LikeOutcome::ProfileRequired => {
                self.player.push(ViewEvent::ProfilePrompt { visible: true })
            }
            _ => self.refresh_engagement(),
        }
        outcome
    }

    /// Open or close the comments panel; returns whether it is now open
    ///
    /// Opening pauses playback, even right after the modal opened, and
    /// closing resumes it.
    pub fn toggle_comments(&mut self, now: Duration) -> Result<bool> {
        if !self.player.state().is_open() {
            return Ok(false);
        }
        if self.comments_open {
            self.comments_open = false;
            self.player.push(ViewEvent::CommentsPanel {
                open: false,
                comments: Vec::new(),
            });
            self.player.resume(now)?;
        } else {
            self.player.hold(now)?;
            self.comments_open = true;
            self.render_comments(now);
        }
        Ok(self.comments_open)
    }

    pub fn add_comment(&mut self, text: &str, now: Duration) -> CommentOutcome {
        let story = self.player.state().story;
        let outcome = self.engagement.add_comment(story, text, self.wall(now));
        match &outcome {
            CommentOutcome::Posted(_) => {
                if self.comments_open {
                    self.render_comments(now);
                }
                self.refresh_engagement();
                self.player.push(ViewEvent::Toast {
                    message: TOAST_COMMENT_POSTED.to_string(),
                });
            }
            CommentOutcome::ProfileRequired => {
                self.player.push(ViewEvent::ProfilePrompt { visible: true })
            }
            CommentOutcome::Empty => {}
        }
        outcome
    }

    /// Glyphs offered by the comment panel's quick-insert row
    pub fn quick_emojis(&self) -> &[String] {
        &self.engagement.config().quick_emojis
    }

    /// Comment draft after tapping a quick-insert glyph
    pub fn insert_emoji(&self, draft: &str, glyph: &str) -> String {
        self.engagement.append_emoji(draft, glyph)
    }

    pub fn save_profile(&mut self, name: &str, contact: &str) -> Result<VisitorProfile> {
        let profile = self.engagement.save_profile(name, contact)?;
        self.player.push(ViewEvent::ProfilePrompt { visible: false });
        self.player.push(ViewEvent::Toast {
            message: TOAST_PROFILE_SAVED.to_string(),
        });
        self.refresh_engagement();
        Ok(profile)
    }

    pub fn dismiss_profile_prompt(&mut self) {
        self.player.push(ViewEvent::ProfilePrompt { visible: false });
    }

    /// Share-sheet payload for the promoted product
    pub fn share_payload(&self) -> SharePayload {
        SharePayload::new(&self.product.title, &self.share_text, &self.product.href)
    }

    /// Share through the platform sheet, or report a clipboard copy
    pub fn share(&mut self, native_sheet: bool) -> SharePayload {
        if !native_sheet {
            self.player.push(ViewEvent::Toast {
                message: TOAST_LINK_COPIED.to_string(),
            });
        }
        self.share_payload()
    }

    pub fn whatsapp_link(&self) -> Result<Url> {
        whatsapp_link(&self.whatsapp_base, &self.product.title, &self.product.href)
    }

    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.player.toggle_mute();
        if self.player.state().is_open() {
            self.refresh_engagement();
        }
        muted
    }

    pub fn timer_fired(&mut self, token: TimerToken, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.timer_fired(token, now))
    }

    pub fn media_ready(&mut self, token: LoadToken, report: MediaReport, now: Duration) -> Result<()> {
        self.player.media_ready(token, report, now)?;
        self.hold_behind_panel(now)
    }

    pub fn media_failed(&mut self, token: LoadToken, now: Duration) -> Result<()> {
        self.player.media_failed(token, now)?;
        self.hold_behind_panel(now)
    }

    /// Media that became ready under the comments panel starts frozen
    fn hold_behind_panel(&mut self, now: Duration) -> Result<()> {
        if self.comments_open {
            self.player.hold(now)?;
        }
        Ok(())
    }

    pub fn media_ended(&mut self, token: LoadToken, now: Duration) -> Result<()> {
        self.navigate(now, |p, now| p.media_ended(token, now))
    }

    pub fn loading_grace_elapsed(&mut self, token: LoadToken) {
        self.player.loading_grace_elapsed(token);
    }

    pub fn streaming_failed(&mut self, token: LoadToken) {
        self.player.streaming_failed(token);
    }

    pub fn upgrade_ready(&mut self, token: LoadToken, url: &str, report: MediaReport) {
        let media = CachedMedia {
            kind: MediaKind::Image,
            url: url.to_string(),
            width: report.width,
            height: report.height,
        };
        self.player.upgrade_ready(token, url, media);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{Key, NavDirection};
    use crate::playback::Phase;
    use crate::storage::MemoryStore;
    use crate::types::{Story, StoryCollection, StoryItem};
    use chrono::TimeZone;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn controller() -> StoriesController<MemoryStore> {
        let config = StoriesConfig {
            stories: StoryCollection::new(vec![
                Story::new("a", vec![StoryItem::image("a0.jpg"), StoryItem::image("a1.jpg")]),
                Story::new("b", vec![StoryItem::image("b0.jpg")]),
            ]),
            ..Default::default()
        };
        StoriesController::new(
            config,
            DeviceProfile::mobile(),
            StreamingSupport::default(),
            MemoryStore::new(),
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn views(effects: &[Effect]) -> Vec<&ViewEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::View(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    fn ready(c: &mut StoriesController<MemoryStore>, now: Duration) {
        let token = c.state().load_token;
        c.media_ready(token, MediaReport::image(4, 4), now).unwrap();
    }

    #[test]
    fn test_open_renders_product_and_engagement() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        let effects = c.drain_effects();
        let v = views(&effects);
        assert!(v.iter().any(|e| matches!(e, ViewEvent::Product(_))));
        assert!(v.iter().any(|e| matches!(
            e,
            ViewEvent::Engagement(EngagementView { story: 0, likes: 86, .. })
        )));
    }

    #[test]
    fn test_avatar_click_parses_index() {
        let mut c = controller();
        assert!(!c.avatar_clicked("abc", ms(0)).unwrap());
        assert_eq!(c.state().phase, Phase::Closed);
        assert!(c.avatar_clicked(" 1 ", ms(0)).unwrap());
        assert_eq!(c.state().story, 1);
    }

    #[test]
    fn test_page_trigger_opens_first_story() {
        let mut c = controller();
        assert_eq!(
            c.open_trigger_selector().as_deref(),
            Some(".trust-primary, .reviews-mini, img[alt=\"5 estrelas\"], img[src*=\"stars-rating\"]")
        );

        c.open_story(1, 0, ms(0)).unwrap();
        c.close(ms(100)).unwrap();
        c.trigger_clicked(ms(200)).unwrap();
        assert_eq!(c.state().position(), crate::types::ItemPosition::new(0, 0));
        assert_eq!(c.state().phase, Phase::Loading);

        let config = StoriesConfig {
            open_triggers: vec!["  ".into()],
            ..Default::default()
        };
        let c = StoriesController::new(
            config,
            DeviceProfile::desktop(),
            StreamingSupport::default(),
            MemoryStore::new(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(c.open_trigger_selector(), None);
    }

    #[test]
    fn test_comments_panel_pauses_inside_open_guard() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        ready(&mut c, ms(0));

        assert!(c.toggle_comments(ms(200)).unwrap());
        assert_eq!(c.state().phase, Phase::Paused);
        assert_eq!(c.state().remaining, ms(2800));

        assert!(!c.toggle_comments(ms(5000)).unwrap());
        assert_eq!(c.state().phase, Phase::Playing);
        assert_eq!(c.state().remaining, ms(2800));
    }

    #[test]
    fn test_media_ready_under_comments_panel_stays_paused() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        assert!(c.toggle_comments(ms(50)).unwrap());
        assert_eq!(c.state().phase, Phase::Loading);

        ready(&mut c, ms(400));
        assert_eq!(c.state().phase, Phase::Paused);
        assert_eq!(c.state().remaining, ms(3000));
    }

    #[test]
    fn test_comments_panel_pauses_and_resumes() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        ready(&mut c, ms(0));

        assert!(c.toggle_comments(ms(1000)).unwrap());
        assert_eq!(c.state().phase, Phase::Paused);
        let effects = c.drain_effects();
        assert!(views(&effects).iter().any(|e| matches!(
            e,
            ViewEvent::CommentsPanel { open: true, comments } if comments.len() == 15
        )));

        assert!(!c.toggle_comments(ms(4000)).unwrap());
        assert_eq!(c.state().phase, Phase::Playing);
        assert_eq!(c.state().remaining, ms(2000));
    }

    #[test]
    fn test_quick_emoji_insert_posts_within_cap() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        c.save_profile("Lu", "5519").unwrap();
        assert_eq!(c.quick_emojis().len(), 6);

        let glyph = c.quick_emojis()[1].clone();
        let draft = c.insert_emoji("so good", &glyph);
        assert_eq!(draft, "so good 😍");
        let CommentOutcome::Posted(comment) = c.add_comment(&draft, ms(1000)) else {
            panic!("comment should post");
        };
        assert_eq!(comment.text, "so good 😍");

        let long = "y".repeat(140);
        assert_eq!(c.insert_emoji(&long, &glyph), long);
    }

    #[test]
    fn test_like_requires_profile() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        c.drain_effects();
        assert_eq!(c.toggle_like(), LikeOutcome::ProfileRequired);
        assert!(c
            .drain_effects()
            .contains(&Effect::View(ViewEvent::ProfilePrompt { visible: true })));

        c.save_profile("Lu", "5519").unwrap();
        assert_eq!(c.toggle_like(), LikeOutcome::Liked { count: 87 });
    }

    #[test]
    fn test_comment_timestamp_follows_epoch() {
        let mut c = controller();
        c.open_story(1, 0, ms(0)).unwrap();
        c.save_profile("Lu", "5519").unwrap();
        let CommentOutcome::Posted(comment) = c.add_comment("lovely", ms(90_000)) else {
            panic!("comment should post");
        };
        assert_eq!(comment.ts, Utc.with_ymd_and_hms(2025, 6, 1, 9, 1, 30).unwrap());
    }

    #[test]
    fn test_escape_closes_and_hides_panels() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        ready(&mut c, ms(0));
        c.toggle_comments(ms(700)).unwrap();
        c.handle_input(InputEvent::Key { key: Key::Escape }, ms(800)).unwrap();

        assert_eq!(c.state().phase, Phase::Closed);
        assert!(!c.comments_open());
        assert_eq!(c.seen_stories(), vec![0]);
    }

    #[test]
    fn test_nav_button_defers_navigation() {
        let mut c = controller();
        c.open_story(0, 0, ms(0)).unwrap();
        ready(&mut c, ms(0));
        c.drain_effects();

        c.handle_input(InputEvent::NavButton { direction: NavDirection::Next }, ms(1000)).unwrap();
        assert_eq!(c.state().phase, Phase::Paused);
        let effects = c.drain_effects();
        let commands = effects
            .iter()
            .find_map(|e| match e {
                Effect::AfterFrames { commands, .. } => Some(commands.clone()),
                _ => None,
            })
            .unwrap();

        c.run_commands(&commands, ms(1033)).unwrap();
        assert_eq!(c.state().item, 1);
        assert_eq!(c.state().phase, Phase::Loading);
    }

    #[test]
    fn test_thumbnail_preloads_respect_mobile_limit() {
        let config_stories = vec![Story {
            thumbnail: Some("cover.jpg".into()),
            ..Story::new(
                "t",
                vec![
                    StoryItem {
                        thumbnail: Some("t1.jpg".into()),
                        ..StoryItem::image("1.jpg")
                    },
                    StoryItem {
                        thumbnail: Some("t2.jpg".into()),
                        ..StoryItem::image("2.jpg")
                    },
                ],
            )
        }];
        let config = StoriesConfig {
            stories: StoryCollection::new(config_stories),
            ..Default::default()
        };
        let mut c = StoriesController::new(
            config,
            DeviceProfile::mobile(),
            StreamingSupport::default(),
            MemoryStore::new(),
            Utc::now(),
        )
        .unwrap();

        c.avatar_visible(0);
        let started: Vec<String> = c
            .drain_effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Preload { url, purpose: PreloadPurpose::Thumbnail, .. } => Some(url),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["cover.jpg", "t1.jpg"]);

        c.preload_finished("cover.jpg", Some(MediaReport::image(64, 64)));
        assert!(c.player().cache().has("cover.jpg"));
        assert!(c.drain_effects().contains(&Effect::Preload {
            url: "t2.jpg".into(),
            kind: MediaKind::Image,
            purpose: PreloadPurpose::Thumbnail,
        }));
    }

    #[test]
    fn test_share_and_whatsapp() {
        let mut c = controller();
        let payload = c.share(false);
        assert_eq!(payload.url, StoriesConfig::default().cta_href);
        assert!(c
            .drain_effects()
            .contains(&Effect::View(ViewEvent::Toast { message: TOAST_LINK_COPIED.into() })));
        let link = c.whatsapp_link().unwrap();
        assert!(link.as_str().starts_with("https://wa.me/?text="));
    }
}
