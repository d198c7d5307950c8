//! Story Session - tokio host for the stories engine
//!
//! Runs a [`StoriesController`] against the tokio clock:
//! - timers and deferred frames become sleeping tasks
//! - media mounts and preloads go through a [`MediaLoader`]
//! - warm-up URLs go through a [`Fetcher`]
//! - view events are folded into a [`ViewModel`]
//!
//! Every callback re-enters the engine through one event channel, so a
//! single driver task owns all state changes that originate from timers.

use crate::{
    controller::StoriesController,
    effects::{Effect, PreloadPurpose},
    gesture::{Command, InputEvent},
    loader::MediaLoader,
    playback::{LoadToken, MediaReport, Phase, PlaybackState, TimerToken},
    prefetch::{warm_all, Fetcher},
    presentation::{Presenter, ViewEvent, ViewModel},
    storage::KeyValueStore,
    types::MediaKind,
    Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Approximate length of one animation frame
pub const FRAME: Duration = Duration::from_millis(16);

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callbacks fed back into the engine
#[derive(Debug)]
enum SessionEvent {
    Timer(TimerToken),
    LoadingGrace(LoadToken),
    Hold(u64),
    Frames(Vec<Command>),
    Loaded { token: LoadToken, report: MediaReport },
    LoadFailed(LoadToken),
    Upgraded { token: LoadToken, url: String, report: MediaReport },
    Thumbnail { url: String, report: Option<MediaReport> },
}

#[derive(Clone)]
struct Host {
    tx: mpsc::UnboundedSender<SessionEvent>,
    loader: Arc<dyn MediaLoader>,
    fetcher: Arc<dyn Fetcher>,
}

impl Host {
    fn after(&self, delay: Duration, event: SessionEvent) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        })
    }

    /// Load in the background and feed `done(report)` back, if it yields an event
    fn load<F>(&self, url: String, kind: MediaKind, done: F)
    where
        F: FnOnce(Option<MediaReport>) -> Option<SessionEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        let loader = Arc::clone(&self.loader);
        tokio::spawn(async move {
            let report = match loader.load(&url, kind).await {
                Ok(report) => Some(report),
                Err(e) => {
                    debug!(%url, error = %e, "Media load failed");
                    None
                }
            };
            if let Some(event) = done(report) {
                let _ = tx.send(event);
            }
        });
    }

    fn warm(&self, urls: Vec<String>) {
        let fetcher = Arc::clone(&self.fetcher);
        tokio::spawn(async move {
            let ok = warm_all(fetcher.as_ref(), &urls).await;
            debug!(requested = urls.len(), ok, "Warm-up finished");
        });
    }
}

struct Inner<S> {
    controller: StoriesController<S>,
    view: ViewModel,
    timer: Option<JoinHandle<()>>,
    hold: Option<JoinHandle<()>>,
}

impl<S: KeyValueStore + Clone> Inner<S> {
    fn handle(&mut self, event: SessionEvent, now: Duration) -> Result<()> {
        let c = &mut self.controller;
        match event {
            SessionEvent::Timer(token) => c.timer_fired(token, now),
            SessionEvent::LoadingGrace(token) => {
                c.loading_grace_elapsed(token);
                Ok(())
            }
            SessionEvent::Hold(token) => c.handle_input(InputEvent::HoldElapsed { token }, now),
            SessionEvent::Frames(commands) => c.run_commands(&commands, now),
            SessionEvent::Loaded { token, report } => c.media_ready(token, report, now),
            SessionEvent::LoadFailed(token) => c.media_failed(token, now),
            SessionEvent::Upgraded { token, url, report } => {
                c.upgrade_ready(token, &url, report);
                Ok(())
            }
            SessionEvent::Thumbnail { url, report } => {
                c.preload_finished(&url, report);
                Ok(())
            }
        }
    }

    /// Execute queued effects until the engine stops producing them
    fn flush(&mut self, host: &Host) {
        loop {
            let effects = self.controller.drain_effects();
            if effects.is_empty() {
                return;
            }
            for effect in effects {
                self.execute(effect, host);
            }
        }
    }

    fn execute(&mut self, effect: Effect, host: &Host) {
        match effect {
            Effect::ArmTimer { token, delay } => {
                if let Some(old) = self.timer.replace(host.after(delay, SessionEvent::Timer(token))) {
                    old.abort();
                }
            }
            Effect::CancelTimer => {
                if let Some(old) = self.timer.take() {
                    old.abort();
                }
            }
            Effect::ScheduleLoadingIndicator { token, delay } => {
                host.after(delay, SessionEvent::LoadingGrace(token));
            }
            Effect::ArmHoldTimer { token, delay } => {
                if let Some(old) = self.hold.replace(host.after(delay, SessionEvent::Hold(token))) {
                    old.abort();
                }
            }
            Effect::CancelHoldTimer => {
                if let Some(old) = self.hold.take() {
                    old.abort();
                }
            }
            Effect::AfterFrames { frames, commands } => {
                host.after(FRAME * u32::from(frames), SessionEvent::Frames(commands));
            }
            Effect::Warmup { urls } => host.warm(urls),
            Effect::Preload { url, kind, purpose } => match purpose {
                PreloadPurpose::Upgrade { token } => {
                    let hq = url.clone();
                    host.load(url, kind, move |report| {
                        report.map(|report| SessionEvent::Upgraded { token, url: hq, report })
                    });
                }
                PreloadPurpose::NextItem => host.warm(vec![url]),
                PreloadPurpose::Thumbnail => {
                    let src = url.clone();
                    host.load(url, kind, move |report| Some(SessionEvent::Thumbnail { url: src, report }));
                }
            },
            Effect::TrapFocus { backwards } => debug!(backwards, "Focus trap ignored by headless host"),
            Effect::View(event) => {
                if let ViewEvent::MountMedia(mount) = &event {
                    let token = mount.token;
                    host.load(mount.url.clone(), mount.kind, move |report| {
                        Some(match report {
                            Some(report) => SessionEvent::Loaded { token, report },
                            None => SessionEvent::LoadFailed(token),
                        })
                    });
                }
                self.view.present(&event);
            }
        }
    }
}

/// A running stories session on the tokio runtime
pub struct StorySession<S> {
    id: SessionId,
    inner: Arc<Mutex<Inner<S>>>,
    state_tx: watch::Sender<PlaybackState>,
    host: Host,
    started: Instant,
    driver: JoinHandle<()>,
}

impl<S> StorySession<S>
where
    S: KeyValueStore + Clone + Send + 'static,
{
    /// Start a session; must be called inside a tokio runtime
    ///
    /// The controller's clock epoch should be the wall time at this call.
    pub fn start(
        controller: StoriesController<S>,
        loader: Arc<dyn MediaLoader>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let id = SessionId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(controller.state().clone());
        let host = Host { tx, loader, fetcher };
        let inner = Arc::new(Mutex::new(Inner {
            controller,
            view: ViewModel::new(),
            timer: None,
            hold: None,
        }));
        let started = Instant::now();

        let driver = {
            let inner = Arc::clone(&inner);
            let host = host.clone();
            let state_tx = state_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let mut guard = inner.lock().await;
                    if let Err(e) = guard.handle(event, started.elapsed()) {
                        warn!(error = %e, code = e.error_code(), "Engine callback failed");
                    }
                    guard.flush(&host);
                    state_tx.send_replace(guard.controller.state().clone());
                }
            })
        };

        info!(session_id = %id, "Story session started");
        Self {
            id,
            inner,
            state_tx,
            host,
            started,
            driver,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Clock reading handed to the engine
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.controller.state().clone()
    }

    /// Snapshot of everything rendered so far
    pub async fn view(&self) -> ViewModel {
        self.inner.lock().await.view.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Run `f` against the controller and execute whatever it queued
    pub async fn with<R>(
        &self,
        f: impl FnOnce(&mut StoriesController<S>, Duration) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.inner.lock().await;
        let now = self.started.elapsed();
        let result = f(&mut guard.controller, now);
        guard.flush(&self.host);
        self.state_tx.send_replace(guard.controller.state().clone());
        result
    }

    pub async fn open(&self, story: usize, item: usize) -> Result<()> {
        self.with(|c, now| c.open_story(story, item, now)).await
    }

    pub async fn close(&self) -> Result<()> {
        self.with(|c, now| c.close(now)).await
    }

    pub async fn input(&self, event: InputEvent) -> Result<()> {
        self.with(|c, now| c.handle_input(event, now)).await
    }

    pub async fn command(&self, command: Command) -> Result<()> {
        self.with(|c, now| c.run_command(command, now)).await
    }

    /// Wait until the overlay is closed
    pub async fn closed(&self) {
        let mut rx = self.subscribe_state();
        // Sender lives in self, so the channel cannot close while we wait
        let _ = rx.wait_for(|s| s.phase == Phase::Closed).await;
    }
}

impl<S> Drop for StorySession<S> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoriesConfig;
    use crate::loader::SimulatedMedia;
    use crate::prefetch::NoopFetcher;
    use crate::profile::DeviceProfile;
    use crate::resolver::StreamingSupport;
    use crate::storage::MemoryStore;
    use crate::types::{Story, StoryCollection, StoryItem};
    use chrono::Utc;

    fn session(stories: Vec<Story>, media: SimulatedMedia) -> StorySession<MemoryStore> {
        let config = StoriesConfig {
            stories: StoryCollection::new(stories),
            ..Default::default()
        };
        let controller = StoriesController::new(
            config,
            DeviceProfile::mobile(),
            StreamingSupport::default(),
            MemoryStore::new(),
            Utc::now(),
        )
        .unwrap();
        StorySession::start(controller, Arc::new(media), Arc::new(NoopFetcher))
    }

    #[tokio::test(start_paused = true)]
    async fn test_images_advance_on_timer() {
        let s = session(
            vec![Story::new("a", vec![StoryItem::image("1.jpg"), StoryItem::image("2.jpg")])],
            SimulatedMedia::new(Duration::from_millis(100)),
        );
        s.open(0, 0).await.unwrap();
        assert_eq!(s.state().await.phase, Phase::Loading);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(s.state().await.phase, Phase::Playing);

        tokio::time::sleep(Duration::from_millis(3100)).await;
        let state = s.state().await;
        assert_eq!((state.item, state.phase), (1, Phase::Playing));

        s.closed().await;
        assert_eq!(s.view().await.seen.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_media_still_advances() {
        let s = session(
            vec![Story::new("a", vec![StoryItem::image("bad.jpg"), StoryItem::image("ok.jpg")])],
            SimulatedMedia::new(Duration::from_millis(10)).failing("bad.jpg"),
        );
        s.open(0, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(s.state().await.item, 1);
    }
}
