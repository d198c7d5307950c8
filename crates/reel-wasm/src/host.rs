//! Browser host for the stories engine
//!
//! Owns the controller and the presenter behind one `Rc<RefCell<..>>`,
//! turns engine effects into timers, frames, fetches and media listeners,
//! and binds page and overlay input back into the controller.

use crate::dom::{log_error, millis, set_timeout, DomPresenter, MountedMedia, Overlay};
use crate::storage::LocalStore;
use js_sys::{Array, Function, Object, Reflect};
use reel_core::{
    config::StreamingConfig,
    effects::{Effect, PreloadPurpose},
    gesture::{focus_trap, Key, NavDirection},
    playback::LoadToken,
    presentation::{Presenter, ViewEvent},
    engagement::CommentOutcome,
    InputEvent, MediaKind, MediaReport, StoriesController,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    Document, Element, Event, EventTarget, HtmlElement, HtmlImageElement, HtmlInputElement,
    HtmlLinkElement, HtmlScriptElement, HtmlVideoElement, IntersectionObserver,
    IntersectionObserverEntry, KeyboardEvent, MouseEvent, Performance, Window,
};

type Controller = StoriesController<LocalStore>;
type Listener = Closure<dyn FnMut(Event)>;

const STORY_INDEX_ATTR: &str = "data-story-index";
const LIBRARY_GLOBAL: &str = "Hls";
const LIBRARY_ERROR_EVENT: &str = "hlsError";

/// Streaming library script state
enum Library {
    Absent,
    /// Script requested; attachments waiting for it
    Loading(Vec<(LoadToken, String)>),
    Ready,
    Failed,
}

/// Attached streaming client instance
struct StreamingClient {
    instance: JsValue,
    _on_error: Closure<dyn FnMut(JsValue, JsValue)>,
}

impl StreamingClient {
    fn destroy(self) {
        if let Err(e) = call_method(&self.instance, "destroy", &[]) {
            log_error("streaming client destroy failed", e);
        }
    }
}

pub(crate) struct Inner {
    controller: Controller,
    presenter: DomPresenter,
    window: Window,
    document: Document,
    performance: Option<Performance>,
    streaming: StreamingConfig,
    library: Library,
    client: Option<StreamingClient>,
    media_listeners: Vec<Listener>,
    timer: Option<i32>,
    hold: Option<i32>,
    /// Set when a Tab press moved focus itself
    focus_forced: bool,
}

/// Shared handle every callback goes through
#[derive(Clone)]
pub(crate) struct Shared(Rc<RefCell<Inner>>);

fn clear_timeout(window: &Window, handle: Option<i32>) {
    if let Some(handle) = handle {
        window.clear_timeout_with_handle(handle);
    }
}

fn call_method(target: &JsValue, name: &str, args: &[&JsValue]) -> Result<JsValue, JsValue> {
    let method: Function = Reflect::get(target, &JsValue::from_str(name))?.dyn_into()?;
    let args: Array = args.iter().copied().collect();
    method.apply(target, &args)
}

fn listen(target: &EventTarget, event: &str, f: impl FnMut(Event) + 'static) {
    let closure: Listener = Closure::new(f);
    if let Err(e) = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()) {
        log_error("addEventListener failed", e);
    }
    closure.forget();
}

fn story_index(el: &Element) -> Option<usize> {
    el.get_attribute(STORY_INDEX_ATTR)?.trim().parse().ok()
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

impl Shared {
    pub(crate) fn new(
        controller: Controller,
        presenter: DomPresenter,
        window: Window,
        document: Document,
        streaming: StreamingConfig,
    ) -> Self {
        let performance = window.performance();
        Self(Rc::new(RefCell::new(Inner {
            controller,
            presenter,
            window,
            document,
            performance,
            streaming,
            library: Library::Absent,
            client: None,
            media_listeners: Vec::new(),
            timer: None,
            hold: None,
            focus_forced: false,
        })))
    }

    /// Run `f` against the controller, then execute whatever it queued
    ///
    /// Re-entrant calls are pushed to the next task instead of panicking.
    pub(crate) fn run(&self, f: impl FnOnce(&mut Inner, Duration) -> reel_core::Result<()> + 'static) {
        let Ok(mut inner) = self.0.try_borrow_mut() else {
            let window = web_sys::window();
            let this = self.clone();
            if let Some(window) = window {
                set_timeout(&window, 0, move || this.run(f));
            }
            return;
        };
        let now = inner.now();
        if let Err(e) = f(&mut inner, now) {
            web_sys::console::warn_1(&JsValue::from_str(&format!("[Reel] {e}")));
        }
        inner.flush(self);
    }

    /// Read-only access; `None` while a callback holds the state
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> Option<T> {
        self.0.try_borrow().ok().map(|inner| f(&inner))
    }

    fn overlay(&self) -> Option<Overlay> {
        self.read(|i| i.presenter.overlay().clone())
    }

    /// Wire overlay controls, keyboard and page avatars
    pub(crate) fn bind(&self, avatars_selector: &str) -> Result<(), JsValue> {
        let overlay = self
            .overlay()
            .ok_or_else(|| JsValue::from_str("widget state is busy"))?;
        let document = self.read(|i| i.document.clone()).ok_or_else(|| JsValue::from_str("widget state is busy"))?;
        self.bind_keyboard(&document);
        self.bind_surface(&overlay);
        self.bind_controls(&overlay);
        self.bind_forms(&overlay);
        self.bind_avatars(&document, avatars_selector)?;
        Ok(())
    }

    fn bind_keyboard(&self, document: &Document) {
        let this = self.clone();
        listen(document.as_ref(), "keydown", move |event| {
            let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            let open = this.read(|i| i.controller.state().is_open()).unwrap_or(false);
            if !open {
                return;
            }
            let key = match event.key().as_str() {
                "Escape" => Key::Escape,
                "Tab" => Key::Tab { shift: event.shift_key() },
                _ => return,
            };
            this.run(move |i, now| {
                i.focus_forced = false;
                i.controller.handle_input(InputEvent::Key { key }, now)
            });
            let forced = this.read(|i| i.focus_forced).unwrap_or(false);
            if key == Key::Escape || forced {
                event.prevent_default();
            }
        });
    }

    fn bind_surface(&self, overlay: &Overlay) {
        let surface = overlay.media.clone();
        let point = move |event: &Event| {
            let event = event.dyn_ref::<MouseEvent>()?;
            let rect = surface.get_bounding_client_rect();
            Some((
                f64::from(event.client_x()) - rect.left(),
                f64::from(event.client_y()) - rect.top(),
                rect.width(),
            ))
        };
        let target: &EventTarget = overlay.media.as_ref();

        let this = self.clone();
        let down = point.clone();
        listen(target, "pointerdown", move |event| {
            if let Some((x, y, _)) = down(&event) {
                this.run(move |i, now| i.controller.handle_input(InputEvent::PointerDown { x, y }, now));
            }
        });
        let this = self.clone();
        listen(target, "pointerup", move |event| {
            if let Some((x, y, width)) = point(&event) {
                this.run(move |i, now| {
                    i.controller.handle_input(InputEvent::PointerUp { x, y, width }, now)
                });
            }
        });
        for name in ["pointercancel", "pointerleave"] {
            let this = self.clone();
            listen(target, name, move |_| {
                this.run(|i, now| i.controller.handle_input(InputEvent::PointerCancel, now));
            });
        }
    }

    fn on_click(&self, el: &Element, f: impl Fn(&mut Inner, Duration) -> reel_core::Result<()> + Clone + 'static) {
        let this = self.clone();
        listen(el.as_ref(), "click", move |event| {
            event.stop_propagation();
            this.run(f.clone());
        });
    }

    fn bind_controls(&self, overlay: &Overlay) {
        self.on_click(&overlay.prev, |i, now| {
            i.controller
                .handle_input(InputEvent::NavButton { direction: NavDirection::Prev }, now)
        });
        self.on_click(&overlay.next, |i, now| {
            i.controller
                .handle_input(InputEvent::NavButton { direction: NavDirection::Next }, now)
        });
        self.on_click(overlay.close.as_ref(), |i, now| {
            i.controller.handle_input(InputEvent::CloseButton, now)
        });
        self.on_click(&overlay.sound, |i, _| {
            i.controller.toggle_mute();
            Ok(())
        });
        self.on_click(&overlay.like, |i, _| {
            i.controller.toggle_like();
            Ok(())
        });
        self.on_click(&overlay.comment, |i, now| i.controller.toggle_comments(now).map(|_| ()));
        self.on_click(&overlay.comments_close, |i, now| {
            i.controller.toggle_comments(now).map(|_| ())
        });
        self.on_click(&overlay.profile_cancel, |i, _| {
            i.controller.dismiss_profile_prompt();
            Ok(())
        });
        self.on_click(&overlay.share, |i, _| {
            i.share();
            Ok(())
        });
        self.on_click(&overlay.whatsapp, |i, _| {
            let link = i.controller.whatsapp_link()?;
            if let Err(e) = i.window.open_with_url_and_target(link.as_str(), "_blank") {
                log_error("window.open failed", e);
            }
            Ok(())
        });

        // Backdrop: the dimmed root itself, not anything inside the modal
        let this = self.clone();
        let root = overlay.root.clone();
        listen(overlay.root.as_ref(), "click", move |event| {
            let on_root = event_element(&event).is_some_and(|el| root.is_same_node(Some(el.as_ref())));
            if on_root {
                this.run(|i, now| i.controller.handle_input(InputEvent::Backdrop, now));
            }
        });

        // Product card is re-rendered per open, so delegate
        let this = self.clone();
        listen(overlay.product.as_ref(), "click", move |event| {
            let on_cta = event_element(&event)
                .and_then(|el| el.closest(".ig-saiba").ok().flatten())
                .is_some();
            if on_cta {
                event.prevent_default();
                this.run(|i, now| i.controller.learn_more(now));
            }
        });
    }

    fn bind_forms(&self, overlay: &Overlay) {
        let this = self.clone();
        let form = overlay.comments_form.clone();
        listen(overlay.comments_form.as_ref(), "submit", move |event| {
            event.prevent_default();
            let Some(input) = input(&form, "text") else {
                return;
            };
            let text = input.value();
            this.run(move |i, now| {
                if let CommentOutcome::Posted(_) = i.controller.add_comment(&text, now) {
                    input.set_value("");
                }
                Ok(())
            });
        });

        // Quick-insert glyphs append to the draft
        let this = self.clone();
        let form = overlay.comments_form.clone();
        listen(overlay.comments_emoji.as_ref(), "click", move |event| {
            let Some(button) = event_element(&event).and_then(|el| el.closest(".ig-emo").ok().flatten()) else {
                return;
            };
            let (Some(input), Some(glyph)) = (input(&form, "text"), button.text_content()) else {
                return;
            };
            let Some(draft) = this.read(|i| i.controller.insert_emoji(&input.value(), &glyph)) else {
                return;
            };
            input.set_value(&draft);
            if let Err(e) = input.focus() {
                log_error("focus failed", e);
            }
        });

        let this = self.clone();
        let form = overlay.profile_form.clone();
        listen(overlay.profile_form.as_ref(), "submit", move |event| {
            event.prevent_default();
            let (Some(name), Some(contact)) = (input(&form, "name"), input(&form, "whats")) else {
                return;
            };
            let (name, contact) = (name.value(), contact.value());
            this.run(move |i, _| i.controller.save_profile(&name, &contact).map(|_| ()));
        });
    }

    fn bind_avatars(&self, document: &Document, selector: &str) -> Result<(), JsValue> {
        let avatar = {
            let selector = selector.to_string();
            move |event: &Event| -> Option<Element> {
                event_element(event)?.closest(&selector).ok().flatten()
            }
        };

        let triggers = self.read(|i| i.controller.open_trigger_selector()).flatten();
        let this = self.clone();
        let clicked = avatar.clone();
        listen(document.as_ref(), "click", move |event| {
            if let Some(el) = clicked(&event) {
                event.prevent_default();
                let attr = el.get_attribute(STORY_INDEX_ATTR).unwrap_or_default();
                this.run(move |i, now| i.controller.avatar_clicked(&attr, now).map(|_| ()));
                return;
            }
            let on_trigger = triggers.as_deref().is_some_and(|selector| {
                event_element(&event).is_some_and(|el| matches!(el.closest(selector), Ok(Some(_))))
            });
            if on_trigger {
                // Trust badges often sit inside links
                event.prevent_default();
                this.run(|i, now| i.controller.trigger_clicked(now));
            }
        });

        let this = self.clone();
        listen(document.as_ref(), "pointerdown", move |event| {
            if let Some(story) = avatar(&event).as_ref().and_then(story_index) {
                this.run(move |i, _| {
                    i.controller.avatar_pressed(story);
                    Ok(())
                });
            }
        });

        let this = self.clone();
        let on_visible = Closure::<dyn FnMut(Array, IntersectionObserver)>::new(
            move |entries: Array, observer: IntersectionObserver| {
                for entry in entries.iter().filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok()) {
                    if !entry.is_intersecting() {
                        continue;
                    }
                    let target = entry.target();
                    observer.unobserve(&target);
                    if let Some(story) = story_index(&target) {
                        this.run(move |i, _| {
                            i.controller.avatar_visible(story);
                            Ok(())
                        });
                    }
                }
            },
        );
        let observer = IntersectionObserver::new(on_visible.as_ref().unchecked_ref())?;
        on_visible.forget();
        let avatars = document.query_selector_all(selector)?;
        for el in (0..avatars.length())
            .filter_map(|i| avatars.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
        {
            observer.observe(&el);
        }
        Ok(())
    }
}

fn input(form: &Element, name: &str) -> Option<HtmlInputElement> {
    form.query_selector(&format!("input[name=\"{name}\"]"))
        .ok()
        .flatten()
        .and_then(|el| el.dyn_into().ok())
}

impl Inner {
    pub(crate) fn controller(&self) -> &Controller {
        &self.controller
    }

    pub(crate) fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    fn now(&self) -> Duration {
        let ms = self.performance.as_ref().map(|p| p.now()).unwrap_or_default();
        Duration::from_secs_f64(ms.max(0.0) / 1000.0)
    }

    fn flush(&mut self, shared: &Shared) {
        loop {
            let effects = self.controller.drain_effects();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                self.execute(effect, shared);
            }
        }
    }

    fn execute(&mut self, effect: Effect, shared: &Shared) {
        match effect {
            Effect::ArmTimer { token, delay } => {
                clear_timeout(&self.window, self.timer.take());
                let this = shared.clone();
                self.timer = set_timeout(&self.window, millis(delay), move || {
                    this.run(move |i, now| i.controller.timer_fired(token, now));
                });
            }
            Effect::CancelTimer => clear_timeout(&self.window, self.timer.take()),
            Effect::ScheduleLoadingIndicator { token, delay } => {
                let this = shared.clone();
                set_timeout(&self.window, millis(delay), move || {
                    this.run(move |i, _| {
                        i.controller.loading_grace_elapsed(token);
                        Ok(())
                    });
                });
            }
            Effect::ArmHoldTimer { token, delay } => {
                clear_timeout(&self.window, self.hold.take());
                let this = shared.clone();
                self.hold = set_timeout(&self.window, millis(delay), move || {
                    this.run(move |i, now| i.controller.handle_input(InputEvent::HoldElapsed { token }, now));
                });
            }
            Effect::CancelHoldTimer => clear_timeout(&self.window, self.hold.take()),
            Effect::AfterFrames { frames, commands } => {
                let this = shared.clone();
                after_frames(self.window.clone(), frames, move || {
                    this.run(move |i, now| i.controller.run_commands(&commands, now));
                });
            }
            Effect::Warmup { urls } => self.warm(urls),
            Effect::Preload { url, kind, purpose } => self.preload(url, kind, purpose, shared),
            Effect::TrapFocus { backwards } => self.trap_focus(backwards),
            Effect::View(event) => self.present(event, shared),
        }
    }

    fn warm(&self, urls: Vec<String>) {
        let window = self.window.clone();
        spawn_local(async move {
            for url in urls {
                // Warm-up is best effort
                let _ = JsFuture::from(window.fetch_with_str(&url)).await;
            }
        });
    }

    fn preload(&mut self, url: String, kind: MediaKind, purpose: PreloadPurpose, shared: &Shared) {
        if kind == MediaKind::Video {
            if let Err(e) = self.preload_link(&url) {
                log_error("video preload failed", e);
            }
            return;
        }
        let img = match self.document.create_element("img").and_then(|el| el.dyn_into::<HtmlImageElement>().map_err(JsValue::from)) {
            Ok(img) => img,
            Err(e) => return log_error("image preload failed", e),
        };

        let finish = {
            let this = shared.clone();
            let url = url.clone();
            move |report: Option<MediaReport>| match purpose {
                PreloadPurpose::Upgrade { token } => {
                    if let Some(report) = report {
                        this.run(move |i, _| {
                            i.controller.upgrade_ready(token, &url, report);
                            Ok(())
                        });
                    }
                }
                PreloadPurpose::Thumbnail => this.run(move |i, _| {
                    i.controller.preload_finished(&url, report);
                    Ok(())
                }),
                PreloadPurpose::NextItem => {}
            }
        };
        let done = Rc::new(RefCell::new(Some(finish)));

        let on_load = {
            let done = Rc::clone(&done);
            let img = img.clone();
            Closure::once_into_js(move || {
                if let Some(finish) = done.borrow_mut().take() {
                    finish(Some(MediaReport::image(img.natural_width(), img.natural_height())));
                }
            })
        };
        let on_error = Closure::once_into_js(move || {
            if let Some(finish) = done.borrow_mut().take() {
                finish(None);
            }
        });
        img.set_onload(Some(on_load.unchecked_ref()));
        img.set_onerror(Some(on_error.unchecked_ref()));
        img.set_decoding("async");
        img.set_src(&url);
    }

    fn preload_link(&self, url: &str) -> Result<(), JsValue> {
        let link: HtmlLinkElement = self.document.create_element("link")?.dyn_into()?;
        link.set_rel("preload");
        link.set_as("video");
        link.set_href(url);
        self.document
            .head()
            .ok_or_else(|| JsValue::from_str("document has no head"))?
            .append_child(&link)?;
        Ok(())
    }

    fn trap_focus(&mut self, backwards: bool) {
        let focusables = self.presenter.overlay().focusables();
        let active = self.document.active_element();
        let position = active.as_ref().and_then(|active| {
            focusables
                .iter()
                .position(|el| el.is_same_node(Some(active.as_ref())))
        });
        if let Some(target) = focus_trap(position, focusables.len(), backwards).and_then(|i| focusables.get(i)) {
            let _ = target.focus();
            self.focus_forced = true;
        }
    }

    fn share(&mut self) {
        let navigator = self.window.navigator();
        let share_fn = Reflect::get(navigator.as_ref(), &JsValue::from_str("share"))
            .ok()
            .filter(|f| f.is_function());
        let native = share_fn.is_some();
        let payload = self.controller.share(native);

        if let Some(share_fn) = share_fn {
            let data = Object::new();
            for (key, value) in [("title", &payload.title), ("text", &payload.text), ("url", &payload.url)] {
                let _ = Reflect::set(&data, &JsValue::from_str(key), &JsValue::from_str(value));
            }
            let promise = share_fn
                .unchecked_ref::<Function>()
                .call1(navigator.as_ref(), &data)
                .ok()
                .and_then(|p| p.dyn_into::<js_sys::Promise>().ok());
            if let Some(promise) = promise {
                // Dismissing the sheet rejects; nothing to report
                spawn_local(async move {
                    let _ = JsFuture::from(promise).await;
                });
            }
            return;
        }

        let text = format!("{} {}", payload.text, payload.url);
        let written = Reflect::get(navigator.as_ref(), &JsValue::from_str("clipboard"))
            .ok()
            .filter(|c| c.is_object())
            .map(|clipboard| call_method(&clipboard, "writeText", &[&JsValue::from_str(&text)]));
        if let Some(Err(e)) = written {
            log_error("clipboard write failed", e);
        }
    }

    fn present(&mut self, event: ViewEvent, shared: &Shared) {
        if matches!(
            event,
            ViewEvent::TeardownMedia | ViewEvent::MountMedia(_) | ViewEvent::SwapSource { .. }
        ) {
            if let Some(client) = self.client.take() {
                client.destroy();
            }
        }
        if matches!(event, ViewEvent::TeardownMedia) {
            self.media_listeners.clear();
        }

        self.presenter.present(&event);

        if let ViewEvent::MountMedia(_) = event {
            if let Some(media) = self.presenter.media().cloned() {
                self.watch_media(&media, shared);
                if let Some(url) = media.library_source {
                    self.attach_library(media.token, url, shared);
                }
            }
        }
    }

    /// Report readiness, failure and end of the mounted element
    fn watch_media(&mut self, media: &MountedMedia, shared: &Shared) {
        let token = media.token;
        let target: &EventTarget = media.element.as_ref();
        let mut listeners: Vec<(&str, Listener)> = Vec::new();

        match media.kind {
            MediaKind::Image => {
                let img = media.element.clone().unchecked_into::<HtmlImageElement>();
                let this = shared.clone();
                listeners.push((
                    "load",
                    Closure::new(move |_: Event| {
                        let report = MediaReport::image(img.natural_width(), img.natural_height());
                        this.run(move |i, now| i.controller.media_ready(token, report, now));
                    }),
                ));
            }
            MediaKind::Video => {
                let video = media.element.clone().unchecked_into::<HtmlVideoElement>();
                let this = shared.clone();
                listeners.push((
                    "loadeddata",
                    Closure::new(move |_: Event| {
                        let duration = video.duration();
                        let report = MediaReport::video(video.video_width(), video.video_height(), duration);
                        this.run(move |i, now| i.controller.media_ready(token, report, now));
                    }),
                ));
                let this = shared.clone();
                listeners.push((
                    "ended",
                    Closure::new(move |_: Event| {
                        this.run(move |i, now| i.controller.media_ended(token, now));
                    }),
                ));
            }
        }
        let this = shared.clone();
        listeners.push((
            "error",
            Closure::new(move |_: Event| {
                this.run(move |i, now| i.controller.media_failed(token, now));
            }),
        ));

        self.media_listeners.clear();
        for (name, listener) in listeners {
            if let Err(e) = target.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref()) {
                log_error("media listener failed", e);
            }
            self.media_listeners.push(listener);
        }
    }

    fn attach_library(&mut self, token: LoadToken, url: String, shared: &Shared) {
        if let Library::Absent = self.library {
            if Reflect::has(self.window.as_ref(), &JsValue::from_str(LIBRARY_GLOBAL)).unwrap_or(false) {
                self.library = Library::Ready;
            }
        }
        match &mut self.library {
            Library::Loading(pending) => pending.push((token, url)),
            Library::Ready => self.create_client(token, &url, shared),
            Library::Failed => self.controller.streaming_failed(token),
            Library::Absent => match self.load_library(shared) {
                Ok(()) => self.library = Library::Loading(vec![(token, url)]),
                Err(e) => {
                    log_error("streaming library insert failed", e);
                    self.library = Library::Failed;
                    self.controller.streaming_failed(token);
                }
            },
        }
    }

    fn load_library(&self, shared: &Shared) -> Result<(), JsValue> {
        let script: HtmlScriptElement = self.document.create_element("script")?.dyn_into()?;
        script.set_src(&self.streaming.library_url);
        script.set_async(true);

        let loaded = shared.clone();
        let on_load = Closure::once_into_js(move || {
            let handle = loaded.clone();
            loaded.run(move |i, _| {
                i.library_settled(true, &handle);
                Ok(())
            });
        });
        let failed = shared.clone();
        let on_error = Closure::once_into_js(move || {
            let handle = failed.clone();
            failed.run(move |i, _| {
                i.library_settled(false, &handle);
                Ok(())
            });
        });
        script.set_onload(Some(on_load.unchecked_ref()));
        script.set_onerror(Some(on_error.unchecked_ref()));
        self.document
            .head()
            .ok_or_else(|| JsValue::from_str("document has no head"))?
            .append_child(&script)?;
        Ok(())
    }

    fn library_settled(&mut self, loaded: bool, shared: &Shared) {
        let pending = match std::mem::replace(
            &mut self.library,
            if loaded { Library::Ready } else { Library::Failed },
        ) {
            Library::Loading(pending) => pending,
            _ => Vec::new(),
        };
        let current = self.presenter.media().map(|m| m.token);
        for (token, url) in pending {
            if current != Some(token) {
                continue;
            }
            if loaded {
                self.create_client(token, &url, shared);
            } else {
                self.controller.streaming_failed(token);
            }
        }
    }

    fn create_client(&mut self, token: LoadToken, url: &str, shared: &Shared) {
        let Some(video) = self.presenter.media().filter(|m| m.token == token).map(|m| m.element.clone()) else {
            return;
        };
        match self.construct_client(token, url, &video, shared) {
            Ok(client) => self.client = Some(client),
            Err(e) => {
                log_error("streaming client setup failed", e);
                self.controller.streaming_failed(token);
            }
        }
    }

    fn construct_client(
        &self,
        token: LoadToken,
        url: &str,
        video: &HtmlElement,
        shared: &Shared,
    ) -> Result<StreamingClient, JsValue> {
        let ctor: Function = Reflect::get(self.window.as_ref(), &JsValue::from_str(LIBRARY_GLOBAL))?.dyn_into()?;
        let supported = call_method(ctor.as_ref(), "isSupported", &[])
            .map(|v| v.is_truthy())
            .unwrap_or(true);
        if !supported {
            return Err(JsValue::from_str("streaming library reports no support"));
        }

        let options = serde_wasm_bindgen::to_value(&self.streaming.library_options)?;
        let instance = Reflect::construct(&ctor, &Array::of1(&options))?;

        let error_event = Reflect::get(ctor.as_ref(), &JsValue::from_str("Events"))
            .and_then(|events| Reflect::get(&events, &JsValue::from_str("ERROR")))
            .ok()
            .filter(|v| v.is_string())
            .unwrap_or_else(|| JsValue::from_str(LIBRARY_ERROR_EVENT));
        let this = shared.clone();
        let on_error = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_event: JsValue, data: JsValue| {
            let fatal = Reflect::get(&data, &JsValue::from_str("fatal"))
                .map(|v| v.is_truthy())
                .unwrap_or(false);
            if fatal {
                this.run(move |i, _| {
                    i.controller.streaming_failed(token);
                    Ok(())
                });
            }
        });
        call_method(&instance, "on", &[&error_event, on_error.as_ref()])?;
        call_method(&instance, "loadSource", &[&JsValue::from_str(url)])?;
        call_method(&instance, "attachMedia", &[video.as_ref()])?;

        Ok(StreamingClient {
            instance,
            _on_error: on_error,
        })
    }
}

/// Run `f` after `frames` animation frames
fn after_frames(window: Window, frames: u8, f: impl FnOnce() + 'static) {
    if frames == 0 {
        return f();
    }
    let next = window.clone();
    let callback = Closure::once_into_js(move || after_frames(next, frames - 1, f));
    if let Err(e) = window.request_animation_frame(callback.unchecked_ref()) {
        log_error("requestAnimationFrame failed", e);
    }
}
