//! Playback state machine
//!
//! Owns which story and item are showing, the item timer, and the gating
//! between "media is loading" and "progress is running". The machine is
//! synchronous: every operation takes the host's monotonic clock reading
//! and queues [`Effect`]s instead of performing them.
//!
//! Asynchronous reports from the host (media readiness, timer expiry) carry
//! the token that was current when they were requested. A report whose
//! token no longer matches belongs to an item the viewer already left and
//! is dropped.

use crate::{
    cache::{CachedMedia, CacheStats, MediaCache},
    config::{PlaybackConfig, StoriesConfig},
    effects::{Effect, Outbox, PreloadPurpose},
    presentation::{MediaMount, ViewEvent},
    profile::DeviceProfile,
    resolver::{warmup_urls, SourceResolver, StreamingSupport},
    storage::{KeyValueStore, SeenSet},
    types::{ItemPosition, MediaKind, StoryCollection, StoryItem},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Generation of the item timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerToken(pub u64);

/// Generation of the loading cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadToken(pub u64);

impl std::fmt::Display for TimerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl std::fmt::Display for LoadToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// Playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Modal hidden
    #[default]
    Closed,
    /// Waiting for the current media to become ready
    Loading,
    /// Progress running
    Playing,
    /// Progress frozen with time remaining
    Paused,
    /// Tearing down one item before loading the next
    Transitioning,
}

impl Phase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            // From Closed
            (Closed, Transitioning) |
            // From Transitioning
            (Transitioning, Loading) | (Transitioning, Closed) |
            // From Loading
            (Loading, Playing) | (Loading, Transitioning) | (Loading, Closed) |
            // From Playing
            (Playing, Paused) | (Playing, Transitioning) | (Playing, Closed) |
            // From Paused
            (Paused, Playing) | (Paused, Transitioning) | (Paused, Closed)
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Closed => write!(f, "closed"),
            Phase::Loading => write!(f, "loading"),
            Phase::Playing => write!(f, "playing"),
            Phase::Paused => write!(f, "paused"),
            Phase::Transitioning => write!(f, "transitioning"),
        }
    }
}

/// Snapshot of the playback state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    pub phase: Phase,
    pub story: usize,
    pub item: usize,
    pub playing: bool,
    /// Clock reading when progress last (re)started
    pub started_at: Option<Duration>,
    /// Time left on the item as of `started_at`
    pub remaining: Duration,
    /// Nominal duration of the current item
    pub duration: Duration,
    pub muted: bool,
    pub load_token: LoadToken,
    pub timer_token: TimerToken,
    /// Clock reading of the last `open`
    pub opened_at: Option<Duration>,
    /// Clock reading of the last `close`; cleared on open
    pub closed_at: Option<Duration>,
}

impl PlaybackState {
    pub fn position(&self) -> ItemPosition {
        ItemPosition::new(self.story, self.item)
    }

    pub fn is_open(&self) -> bool {
        self.phase != Phase::Closed
    }

    /// Time left on the item at `now`
    pub fn remaining_at(&self, now: Duration) -> Duration {
        match (self.phase, self.started_at) {
            (Phase::Playing, Some(at)) => self.remaining.saturating_sub(now.saturating_sub(at)),
            _ => self.remaining,
        }
    }

    /// Fraction of the current item shown at `now`
    pub fn progress(&self, now: Duration) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        let left = self.remaining_at(now).as_secs_f64() / self.duration.as_secs_f64();
        (1.0 - left).clamp(0.0, 1.0)
    }
}

/// What the host observed when the current media became ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaReport {
    pub width: u32,
    pub height: u32,
    /// Playback length for videos; `None` when unknown
    pub duration: Option<Duration>,
}

impl MediaReport {
    pub fn image(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            duration: None,
        }
    }

    /// `seconds` as reported by the media element, rounded up to whole
    /// milliseconds; non-finite or non-positive means unknown
    pub fn video(width: u32, height: u32, seconds: f64) -> Self {
        let duration = (seconds.is_finite() && seconds > 0.0)
            .then(|| Duration::from_millis((seconds * 1000.0).ceil() as u64));
        Self {
            width,
            height,
            duration,
        }
    }
}

#[derive(Debug, Clone)]
struct CurrentMedia {
    kind: MediaKind,
    url: String,
    progressive: String,
}

/// The playback engine
#[derive(Debug)]
pub struct StoryPlayer<S> {
    stories: StoryCollection,
    timing: PlaybackConfig,
    profile: DeviceProfile,
    resolver: SourceResolver,
    cache: MediaCache<CachedMedia>,
    seen: SeenSet<S>,
    state: PlaybackState,
    current: Option<CurrentMedia>,
    outbox: Outbox,
}

impl<S: KeyValueStore> StoryPlayer<S> {
    /// Build an engine from a validated configuration
    pub fn new(
        config: &StoriesConfig,
        profile: DeviceProfile,
        support: StreamingSupport,
        store: S,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            stories: config.stories.clone(),
            timing: config.playback.clone(),
            resolver: SourceResolver::new(support, &config.streaming),
            cache: MediaCache::new(&config.cache),
            seen: SeenSet::load(store),
            profile,
            state: PlaybackState::default(),
            current: None,
            outbox: Outbox::default(),
        })
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn stories(&self) -> &StoryCollection {
        &self.stories
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn seen(&self) -> &SeenSet<S> {
        &self.seen
    }

    pub fn cache(&self) -> &MediaCache<CachedMedia> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Record a decoded media element loaded outside the playback path
    pub fn remember(&mut self, url: impl Into<String>, media: CachedMedia) {
        self.cache.set(url, media);
    }

    /// Take every effect queued since the last drain
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.outbox.drain()
    }

    pub(crate) fn push(&mut self, effect: impl Into<Effect>) {
        self.outbox.push(effect);
    }

    fn current_item(&self) -> Result<StoryItem> {
        self.stories
            .item(self.state.position())
            .cloned()
            .ok_or_else(|| Error::Internal(format!("no item at {}", self.state.position())))
    }

    fn set_phase(&mut self, to: Phase) -> Result<()> {
        let from = self.state.phase;
        if from == to {
            return Ok(());
        }
        if !from.can_transition_to(to) {
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.state.phase = to;
        self.state.playing = to == Phase::Playing;
        debug!(from = %from, to = %to, story = self.state.story, item = self.state.item, "Phase transition");
        Ok(())
    }

    fn arm_timer(&mut self, delay: Duration) {
        self.state.timer_token = TimerToken(self.state.timer_token.0 + 1);
        let token = self.state.timer_token;
        self.push(Effect::ArmTimer { token, delay });
    }

    fn cancel_timer(&mut self) {
        // Bumping the generation makes any in-flight expiry stale
        self.state.timer_token = TimerToken(self.state.timer_token.0 + 1);
        self.push(Effect::CancelTimer);
    }

    fn layout_bars(&mut self) {
        let count = self.stories.item_count(self.state.story);
        let active = self.state.item;
        self.push(ViewEvent::LayoutBars { count, active });
    }

    fn mark_seen(&mut self, story: usize) {
        if self.seen.mark(story) {
            info!(story, "Story seen");
            self.push(ViewEvent::MarkSeen { story });
        }
    }

    /// Open the modal at `(story, item)`, clamping both indices
    #[instrument(skip(self))]
    pub fn open(&mut self, story: usize, item: usize, now: Duration) -> Result<()> {
        let pos = self.stories.clamp(story, item);
        let was_closed = !self.state.is_open();
        self.set_phase(Phase::Transitioning)?;

        self.push(ViewEvent::SilenceHostMedia);
        self.state.story = pos.story;
        self.state.item = pos.item;
        self.state.opened_at = Some(now);
        self.state.closed_at = None;
        info!(story = pos.story, item = pos.item, "Opening story");

        self.layout_bars();
        self.load_current(now)?;

        if was_closed {
            self.push(ViewEvent::ShowOverlay);
            self.push(ViewEvent::FocusClose {
                delay: Duration::from_millis(self.timing.focus_delay_ms),
            });
        }
        Ok(())
    }

    /// Open again at the retained indices
    pub fn reopen(&mut self, now: Duration) -> Result<()> {
        self.open(self.state.story, self.state.item, now)
    }

    /// Start a loading cycle for the item at the current indices
    fn load_current(&mut self, now: Duration) -> Result<()> {
        self.cancel_timer();
        self.state.load_token = LoadToken(self.state.load_token.0 + 1);
        self.state.started_at = None;
        self.state.remaining = Duration::ZERO;
        self.state.duration = Duration::ZERO;
        self.push(ViewEvent::LoadingIndicator { visible: false });
        self.push(ViewEvent::TeardownMedia);
        self.set_phase(Phase::Loading)?;

        let token = self.state.load_token;
        let item = self.current_item()?;
        let tier = self.profile.preferred_tier();
        let label = self
            .stories
            .story(self.state.story)
            .map(|s| s.label.clone())
            .unwrap_or_default();

        let mount = match item.kind {
            MediaKind::Image => {
                let url = self.resolver.resolve(&item, tier).to_string();
                let cached = self.cache.get(&url).is_some();
                MediaMount {
                    token,
                    kind: MediaKind::Image,
                    progressive: url.clone(),
                    url,
                    streaming: None,
                    poster: None,
                    muted: self.state.muted,
                    label,
                    cached,
                }
            }
            MediaKind::Video => {
                let plan = self.resolver.streaming_plan(&item, tier);
                let url = plan.initial_url().to_string();
                MediaMount {
                    token,
                    kind: MediaKind::Video,
                    cached: self.cache.has(&url),
                    url,
                    streaming: plan.streaming,
                    progressive: plan.progressive,
                    poster: item.poster_frame().map(String::from),
                    muted: self.state.muted,
                    label,
                }
            }
        };

        debug!(token = %token, url = %mount.url, kind = %mount.kind, cached = mount.cached, "Mounting media");
        self.current = Some(CurrentMedia {
            kind: mount.kind,
            url: mount.url.clone(),
            progressive: mount.progressive.clone(),
        });
        let fast_path = mount.cached && mount.kind == MediaKind::Image;
        let resolved = mount.url.clone();
        self.push(ViewEvent::MountMedia(mount));
        self.request_upgrade(&item, &resolved, token);

        if fast_path {
            // Decoded image from the cache is ready immediately
            return self.start_item(now, self.timing.image_duration());
        }
        self.push(Effect::ScheduleLoadingIndicator {
            token,
            delay: self.timing.loading_grace(),
        });
        Ok(())
    }

    /// Background-load the desktop variant on capable connections
    fn request_upgrade(&mut self, item: &StoryItem, resolved: &str, token: LoadToken) {
        if item.is_video() || !self.profile.should_prefer_high_quality() {
            return;
        }
        let Some(desktop) = item.desktop.as_deref().filter(|d| *d != resolved) else {
            return;
        };
        if self.cache.get(desktop).is_some() {
            let url = desktop.to_string();
            if let Some(current) = self.current.as_mut() {
                current.url = url.clone();
            }
            self.push(ViewEvent::SwapSource { token, url });
            return;
        }
        debug!(url = desktop, "Requesting high-quality upgrade");
        self.push(Effect::Preload {
            url: desktop.to_string(),
            kind: MediaKind::Image,
            purpose: PreloadPurpose::Upgrade { token },
        });
    }

    /// Enter `Playing` and arm the item timer
    fn start_item(&mut self, now: Duration, duration: Duration) -> Result<()> {
        self.set_phase(Phase::Playing)?;
        self.state.duration = duration;
        self.state.remaining = duration;
        self.state.started_at = Some(now);
        self.arm_timer(duration);

        self.push(ViewEvent::LoadingIndicator { visible: false });
        self.push(ViewEvent::AnimateBar {
            index: self.state.item,
            from: 0.0,
            duration,
        });
        if self.current.as_ref().is_some_and(|c| c.kind == MediaKind::Video) {
            self.push(ViewEvent::PlayMedia);
        }
        info!(
            story = self.state.story,
            item = self.state.item,
            duration_ms = duration.as_millis() as u64,
            "Item playing"
        );
        self.prefetch_next();
        Ok(())
    }

    /// Warm up whatever plays after the current item
    fn prefetch_next(&mut self) {
        let Some(next) = self
            .stories
            .next_position(self.state.position())
            .and_then(|pos| self.stories.item(pos))
            .cloned()
        else {
            return;
        };
        if !next.is_video() {
            return;
        }
        let tier = self.profile.preferred_tier();
        match self.resolver.streaming_url(&next, tier) {
            Some(manifest) => {
                let urls = warmup_urls(manifest);
                if !urls.is_empty() {
                    self.push(Effect::Warmup { urls });
                }
            }
            None => {
                let url = self.resolver.resolve(&next, tier).to_string();
                self.push(Effect::Preload {
                    url,
                    kind: MediaKind::Video,
                    purpose: PreloadPurpose::NextItem,
                });
            }
        }
        if let Some(thumb) = next.thumbnail {
            self.push(Effect::Preload {
                url: thumb,
                kind: MediaKind::Image,
                purpose: PreloadPurpose::NextItem,
            });
        }
    }

    fn is_current_load(&self, token: LoadToken) -> bool {
        token == self.state.load_token && self.state.phase == Phase::Loading
    }

    /// The mounted media is ready to play
    pub fn media_ready(&mut self, token: LoadToken, report: MediaReport, now: Duration) -> Result<()> {
        if !self.is_current_load(token) {
            debug!(token = %token, current = %self.state.load_token, "Dropping stale readiness");
            return Ok(());
        }
        let Some(current) = self.current.clone() else {
            return Ok(());
        };

        if current.kind == MediaKind::Video || (report.width > 0 && report.height > 0) {
            self.cache.set(
                current.url.clone(),
                CachedMedia {
                    kind: current.kind,
                    url: current.url,
                    width: report.width,
                    height: report.height,
                },
            );
        }

        let duration = match current.kind {
            MediaKind::Image => self.timing.image_duration(),
            MediaKind::Video => report
                .duration
                .filter(|d| !d.is_zero())
                .unwrap_or_else(|| self.timing.image_duration()),
        };
        self.start_item(now, duration)
    }

    /// The mounted media failed to load; the slide proceeds anyway
    pub fn media_failed(&mut self, token: LoadToken, now: Duration) -> Result<()> {
        if !self.is_current_load(token) {
            debug!(token = %token, "Dropping stale load failure");
            return Ok(());
        }
        warn!(
            story = self.state.story,
            item = self.state.item,
            url = self.current.as_ref().map(|c| c.url.as_str()).unwrap_or_default(),
            "Media failed to load, continuing with default duration"
        );
        self.start_item(now, self.timing.image_duration())
    }

    /// Video playback reached its end
    pub fn media_ended(&mut self, token: LoadToken, now: Duration) -> Result<()> {
        if token != self.state.load_token || self.state.phase != Phase::Playing {
            return Ok(());
        }
        self.next_item(now)
    }

    /// The streaming library failed; swap to the progressive source
    pub fn streaming_failed(&mut self, token: LoadToken) {
        if token != self.state.load_token {
            return;
        }
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.url == current.progressive {
            return;
        }
        warn!(from = %current.url, to = %current.progressive, "Streaming failed, falling back to progressive");
        current.url = current.progressive.clone();
        let url = current.url.clone();
        self.push(ViewEvent::SwapSource { token, url });
    }

    /// A high-quality variant finished loading in the background
    pub fn upgrade_ready(&mut self, token: LoadToken, url: &str, media: CachedMedia) {
        self.cache.set(url, media);
        if token != self.state.load_token || !self.state.is_open() {
            return;
        }
        if let Some(current) = self.current.as_mut() {
            current.url = url.to_string();
        }
        debug!(url, "Swapping to high-quality source");
        self.push(ViewEvent::SwapSource {
            token,
            url: url.to_string(),
        });
    }

    /// The loading grace period for `token` is over
    pub fn loading_grace_elapsed(&mut self, token: LoadToken) {
        if self.is_current_load(token) {
            self.push(ViewEvent::LoadingIndicator { visible: true });
        }
    }

    /// The item timer for `token` expired
    pub fn timer_fired(&mut self, token: TimerToken, now: Duration) -> Result<()> {
        if token != self.state.timer_token || self.state.phase != Phase::Playing {
            debug!(token = %token, current = %self.state.timer_token, "Dropping stale timer");
            return Ok(());
        }
        self.next_item(now)
    }

    /// Advance one item, crossing into the next story at the end
    #[instrument(skip(self), fields(story = self.state.story, item = self.state.item))]
    pub fn next_item(&mut self, now: Duration) -> Result<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        if self.state.item + 1 < self.stories.item_count(self.state.story) {
            self.set_phase(Phase::Transitioning)?;
            self.state.item += 1;
            self.layout_bars();
            self.load_current(now)
        } else {
            self.next_story(now)
        }
    }

    /// Go back one item, crossing into the previous story's last item
    #[instrument(skip(self), fields(story = self.state.story, item = self.state.item))]
    pub fn prev_item(&mut self, now: Duration) -> Result<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        if self.state.item > 0 {
            self.set_phase(Phase::Transitioning)?;
            self.state.item -= 1;
            self.layout_bars();
            self.load_current(now)
        } else {
            self.prev_story(true, now)
        }
    }

    /// Mark the current story seen and move to the next, closing at the end
    pub fn next_story(&mut self, now: Duration) -> Result<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        self.mark_seen(self.state.story);
        if self.state.story + 1 < self.stories.len() {
            self.set_phase(Phase::Transitioning)?;
            self.state.story += 1;
            self.state.item = 0;
            self.layout_bars();
            self.load_current(now)
        } else {
            self.close(now)
        }
    }

    /// Move to the previous story, closing before the first
    pub fn prev_story(&mut self, jump_to_last: bool, now: Duration) -> Result<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        if self.state.story > 0 {
            self.set_phase(Phase::Transitioning)?;
            self.state.story -= 1;
            self.state.item = if jump_to_last {
                self.stories.item_count(self.state.story).saturating_sub(1)
            } else {
                0
            };
            self.layout_bars();
            self.load_current(now)
        } else {
            self.close(now)
        }
    }

    /// Freeze progress; returns whether the pause took effect
    ///
    /// Ignored within the open-pause guard so the tap that opened the modal
    /// cannot pause it.
    pub fn pause(&mut self, now: Duration) -> Result<bool> {
        if let Some(opened_at) = self.state.opened_at {
            if now.saturating_sub(opened_at) < self.timing.open_pause_guard() {
                debug!("Pause suppressed right after opening");
                return Ok(false);
            }
        }
        self.hold(now)
    }

    /// Freeze progress regardless of the open-pause guard
    ///
    /// For panels that cover the media.
    pub fn hold(&mut self, now: Duration) -> Result<bool> {
        if self.state.phase != Phase::Playing {
            return Ok(false);
        }
        let remaining = self.state.remaining_at(now);
        if remaining.is_zero() {
            // The pending timer is about to fire
            return Ok(false);
        }

        self.set_phase(Phase::Paused)?;
        self.state.remaining = remaining;
        self.state.started_at = None;
        self.cancel_timer();

        let progress = self.state.progress(now);
        self.push(ViewEvent::FreezeBar {
            index: self.state.item,
            progress,
        });
        if self.current.as_ref().is_some_and(|c| c.kind == MediaKind::Video) {
            self.push(ViewEvent::PauseMedia);
        }
        debug!(remaining_ms = remaining.as_millis() as u64, "Paused");
        Ok(true)
    }

    /// Continue from the frozen remaining time; returns whether it took effect
    pub fn resume(&mut self, now: Duration) -> Result<bool> {
        if self.state.phase != Phase::Paused || self.state.remaining.is_zero() {
            return Ok(false);
        }
        let from = self.state.progress(now);
        let remaining = self.state.remaining;

        self.set_phase(Phase::Playing)?;
        self.state.started_at = Some(now);
        self.arm_timer(remaining);

        self.push(ViewEvent::AnimateBar {
            index: self.state.item,
            from,
            duration: remaining,
        });
        if self.current.as_ref().is_some_and(|c| c.kind == MediaKind::Video) {
            self.push(ViewEvent::PlayMedia);
        }
        debug!(remaining_ms = remaining.as_millis() as u64, "Resumed");
        Ok(true)
    }

    /// Stop everything, mark the current story seen and hide the modal
    ///
    /// Story and item indices are kept for [`StoryPlayer::reopen`].
    #[instrument(skip(self), fields(story = self.state.story, item = self.state.item))]
    pub fn close(&mut self, now: Duration) -> Result<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        self.cancel_timer();
        self.state.load_token = LoadToken(self.state.load_token.0 + 1);
        self.push(ViewEvent::PauseMedia);
        self.push(ViewEvent::LoadingIndicator { visible: false });
        self.push(ViewEvent::TeardownMedia);
        self.mark_seen(self.state.story);

        self.set_phase(Phase::Closed)?;
        self.state.started_at = None;
        self.state.remaining = Duration::ZERO;
        self.state.duration = Duration::ZERO;
        self.state.opened_at = None;
        self.state.closed_at = Some(now);
        self.current = None;

        self.push(ViewEvent::HideOverlay {
            fade: Duration::from_millis(self.timing.close_fade_ms),
        });
        info!("Stories closed");
        Ok(())
    }

    /// Flip the mute flag; returns the new value
    pub fn toggle_mute(&mut self) -> bool {
        self.state.muted = !self.state.muted;
        let muted = self.state.muted;
        self.push(ViewEvent::SetMuted { muted });
        muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::Story;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn player_with(stories: Vec<Story>, profile: DeviceProfile) -> StoryPlayer<MemoryStore> {
        let config = StoriesConfig {
            stories: StoryCollection::new(stories),
            ..Default::default()
        };
        StoryPlayer::new(&config, profile, StreamingSupport::default(), MemoryStore::new()).unwrap()
    }

    fn two_images() -> Vec<Story> {
        vec![
            Story::new("a", vec![StoryItem::image("a0.jpg"), StoryItem::image("a1.jpg")]),
            Story::new("b", vec![StoryItem::image("b0.jpg")]),
        ]
    }

    fn armed_timer(effects: &[Effect]) -> Option<(TimerToken, Duration)> {
        effects.iter().rev().find_map(|e| match e {
            Effect::ArmTimer { token, delay } => Some((*token, *delay)),
            _ => None,
        })
    }

    fn mounted(effects: &[Effect]) -> Option<MediaMount> {
        effects.iter().rev().find_map(|e| match e {
            Effect::View(ViewEvent::MountMedia(m)) => Some(m.clone()),
            _ => None,
        })
    }

    /// Open and report the first image ready at `at`
    fn open_ready(p: &mut StoryPlayer<MemoryStore>, story: usize, at: Duration) {
        p.open(story, 0, at).unwrap();
        let token = p.state().load_token;
        p.media_ready(token, MediaReport::image(10, 10), at).unwrap();
        p.drain_effects();
    }

    #[test]
    fn test_phase_transitions() {
        assert!(Phase::Closed.can_transition_to(Phase::Transitioning));
        assert!(Phase::Loading.can_transition_to(Phase::Playing));
        assert!(Phase::Paused.can_transition_to(Phase::Playing));
        assert!(!Phase::Closed.can_transition_to(Phase::Playing));
        assert!(!Phase::Loading.can_transition_to(Phase::Paused));
    }

    #[test]
    fn test_open_waits_for_readiness() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        p.open(0, 1, ms(0)).unwrap();
        assert_eq!(p.state().phase, Phase::Loading);

        let effects = p.drain_effects();
        assert!(effects.contains(&Effect::View(ViewEvent::LayoutBars { count: 2, active: 1 })));
        assert!(effects.contains(&Effect::View(ViewEvent::ShowOverlay)));
        assert!(armed_timer(&effects).is_none());
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::ScheduleLoadingIndicator { delay, .. } if *delay == ms(300)
        )));

        let token = p.state().load_token;
        p.media_ready(token, MediaReport::image(10, 10), ms(50)).unwrap();
        assert_eq!(p.state().phase, Phase::Playing);
        assert_eq!(armed_timer(&p.drain_effects()).map(|t| t.1), Some(ms(3000)));
    }

    #[test]
    fn test_video_duration_from_report() {
        let stories = vec![Story::new("v", vec![StoryItem::video("v.mp4")])];
        let mut p = player_with(stories, DeviceProfile::mobile());
        p.open(0, 0, ms(0)).unwrap();
        let token = p.state().load_token;
        p.media_ready(token, MediaReport::video(720, 1280, 7.2501), ms(10)).unwrap();
        assert_eq!(p.state().duration, ms(7251));
        assert!(p.drain_effects().contains(&Effect::View(ViewEvent::PlayMedia)));
    }

    #[test]
    fn test_failed_media_still_advances() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        p.open(0, 0, ms(0)).unwrap();
        let token = p.state().load_token;
        p.media_failed(token, ms(100)).unwrap();
        assert_eq!(p.state().phase, Phase::Playing);
        assert_eq!(p.state().duration, ms(3000));
        assert_eq!(p.cache().len(), 0);
    }

    #[test]
    fn test_pause_resume_keeps_nominal_duration() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        open_ready(&mut p, 0, ms(0));

        assert!(p.pause(ms(1000)).unwrap());
        assert_eq!(p.state().remaining, ms(2000));
        assert!(!p.pause(ms(1200)).unwrap());

        assert!(p.resume(ms(5000)).unwrap());
        let effects = p.drain_effects();
        assert_eq!(armed_timer(&effects).map(|t| t.1), Some(ms(2000)));

        // Second pause subtracts from the remaining time, not the full duration
        assert!(p.pause(ms(5500)).unwrap());
        assert_eq!(p.state().remaining, ms(1500));
        assert!((p.state().progress(ms(5500)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pause_guard_after_open() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        open_ready(&mut p, 0, ms(0));
        assert!(!p.pause(ms(599)).unwrap());
        assert_eq!(p.state().phase, Phase::Playing);
        assert!(p.pause(ms(600)).unwrap());
    }

    #[test]
    fn test_hold_ignores_open_guard() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        open_ready(&mut p, 0, ms(0));
        let token = p.state().timer_token;
        assert!(p.hold(ms(200)).unwrap());
        assert_eq!(p.state().phase, Phase::Paused);
        assert_eq!(p.state().remaining, ms(2800));
        p.timer_fired(token, ms(3000)).unwrap();
        assert_eq!(p.state().position(), ItemPosition::new(0, 0));
        assert!(!p.hold(ms(300)).unwrap());
    }

    #[test]
    fn test_stale_timer_and_readiness_ignored() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        open_ready(&mut p, 0, ms(0));
        let old_timer = p.state().timer_token;
        let old_load = p.state().load_token;

        p.next_item(ms(1000)).unwrap();
        assert_eq!(p.state().item, 1);

        p.timer_fired(old_timer, ms(3000)).unwrap();
        p.media_ready(old_load, MediaReport::image(1, 1), ms(3000)).unwrap();
        p.loading_grace_elapsed(old_load);
        assert_eq!(p.state().position(), ItemPosition::new(0, 1));
        assert_eq!(p.state().phase, Phase::Loading);
        assert!(!p
            .drain_effects()
            .contains(&Effect::View(ViewEvent::LoadingIndicator { visible: true })));
    }

    #[test]
    fn test_paused_timer_never_fires() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        open_ready(&mut p, 0, ms(0));
        let token = p.state().timer_token;
        p.pause(ms(1000)).unwrap();
        p.timer_fired(token, ms(60_000)).unwrap();
        assert_eq!(p.state().position(), ItemPosition::new(0, 0));
        assert_eq!(p.state().phase, Phase::Paused);
    }

    #[test]
    fn test_navigation_edges_close() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        p.open(0, 0, ms(0)).unwrap();
        p.prev_item(ms(10)).unwrap();
        assert_eq!(p.state().phase, Phase::Closed);

        p.open(1, 0, ms(100)).unwrap();
        p.next_item(ms(200)).unwrap();
        assert_eq!(p.state().phase, Phase::Closed);
        assert!(p.seen().contains(1));
    }

    #[test]
    fn test_prev_item_jumps_to_last_of_previous_story() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        p.open(1, 0, ms(0)).unwrap();
        p.prev_item(ms(10)).unwrap();
        assert_eq!(p.state().position(), ItemPosition::new(0, 1));

        p.open(1, 0, ms(20)).unwrap();
        p.prev_story(false, ms(30)).unwrap();
        assert_eq!(p.state().position(), ItemPosition::new(0, 0));
    }

    #[test]
    fn test_close_retains_indices() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        p.open(0, 1, ms(0)).unwrap();
        p.close(ms(10)).unwrap();
        assert_eq!(p.state().position(), ItemPosition::new(0, 1));
        assert_eq!(p.state().closed_at, Some(ms(10)));
        assert!(p.seen().contains(0));
        assert!(p.drain_effects().contains(&Effect::View(ViewEvent::HideOverlay { fade: ms(160) })));

        p.reopen(ms(20)).unwrap();
        assert_eq!(p.state().position(), ItemPosition::new(0, 1));
        assert_eq!(p.state().closed_at, None);
    }

    #[test]
    fn test_cached_image_starts_immediately() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        open_ready(&mut p, 0, ms(0));
        p.next_item(ms(100)).unwrap();
        p.prev_item(ms(200)).unwrap();

        assert_eq!(p.state().phase, Phase::Playing);
        let effects = p.drain_effects();
        assert!(mounted(&effects).unwrap().cached);
        assert_eq!(armed_timer(&effects).map(|t| t.1), Some(ms(3000)));
    }

    #[test]
    fn test_high_quality_upgrade_on_desktop() {
        let mut item = StoryItem::image("a.jpg");
        item.optimal = Some("a-opt.jpg".into());
        item.desktop = Some("a-hq.jpg".into());
        let mut p = player_with(vec![Story::new("a", vec![item])], DeviceProfile::desktop());

        p.open(0, 0, ms(0)).unwrap();
        let token = p.state().load_token;
        let effects = p.drain_effects();
        assert!(effects.contains(&Effect::Preload {
            url: "a-hq.jpg".into(),
            kind: MediaKind::Image,
            purpose: PreloadPurpose::Upgrade { token },
        }));

        let hq = CachedMedia {
            kind: MediaKind::Image,
            url: "a-hq.jpg".into(),
            width: 1080,
            height: 1920,
        };
        p.upgrade_ready(token, "a-hq.jpg", hq);
        assert!(p.cache().has("a-hq.jpg"));
        assert!(p.drain_effects().contains(&Effect::View(ViewEvent::SwapSource {
            token,
            url: "a-hq.jpg".into(),
        })));
    }

    #[test]
    fn test_streaming_failure_swaps_to_progressive() {
        let mut item = StoryItem::video("v.mp4");
        item.mobile_hls = Some("v_master.m3u8".into());
        let config = StoriesConfig {
            stories: StoryCollection::new(vec![Story::new("v", vec![item])]),
            ..Default::default()
        };
        let support = StreamingSupport { native: false, library: true };
        let mut p =
            StoryPlayer::new(&config, DeviceProfile::mobile(), support, MemoryStore::new()).unwrap();

        p.open(0, 0, ms(0)).unwrap();
        let mount = mounted(&p.drain_effects()).unwrap();
        assert_eq!(mount.url, "v_master.m3u8");

        p.streaming_failed(mount.token);
        assert!(p.drain_effects().contains(&Effect::View(ViewEvent::SwapSource {
            token: mount.token,
            url: "v.mp4".into(),
        })));
        // A second failure report has nothing left to fall back to
        p.streaming_failed(mount.token);
        assert!(p.drain_effects().is_empty());
    }

    #[test]
    fn test_prefetch_next_video() {
        let mut video = StoryItem::video("b.mp4");
        video.mobile_hls = Some("hls/b_master.m3u8".into());
        video.thumbnail = Some("b.jpg".into());
        let stories = vec![
            Story::new("a", vec![StoryItem::image("a.jpg")]),
            Story::new("b", vec![video]),
        ];
        let mut p = player_with(stories, DeviceProfile::mobile());
        p.open(0, 0, ms(0)).unwrap();
        let token = p.state().load_token;
        p.media_ready(token, MediaReport::image(1, 1), ms(0)).unwrap();

        let effects = p.drain_effects();
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Warmup { urls } if urls.len() == 4 && urls[1] == "hls/b_0.m3u8"
        )));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Preload { url, purpose: PreloadPurpose::NextItem, .. } if url == "b.jpg"
        )));
    }

    #[test]
    fn test_mute_applies_to_next_mount() {
        let mut p = player_with(two_images(), DeviceProfile::mobile());
        p.open(0, 0, ms(0)).unwrap();
        assert!(p.toggle_mute());
        p.next_item(ms(10)).unwrap();
        assert!(mounted(&p.drain_effects()).unwrap().muted);
    }

    #[test]
    fn test_media_report_video_unknown_duration() {
        assert_eq!(MediaReport::video(1, 1, f64::NAN).duration, None);
        assert_eq!(MediaReport::video(1, 1, 0.0).duration, None);
    }
}
