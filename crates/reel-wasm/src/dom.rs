//! DOM presenter
//!
//! Builds the overlay once and applies [`ViewEvent`]s to it. Event wiring
//! lives in the host; this module only reads and writes the tree.

use js_sys::Function;
use reel_core::{
    presentation::{CommentView, EngagementView, MediaMount, Presenter, ViewEvent},
    resolver::StreamingDelivery,
    types::MediaKind,
    playback::LoadToken,
};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, HtmlImageElement, HtmlMediaElement, HtmlVideoElement, Window};

const ROOT_ID: &str = "ig-stories-modal";
const TOAST_MS: i32 = 1600;
const CTA_FALLBACK: &str = "#cta, #buy, .buy-now, .cta-buy";
const CTA_TEXT: &str = "buy now";
const FOCUSABLE: &str = "a[href], button, input, [tabindex]:not([tabindex=\"-1\"])";

const MARKUP: &str = r#"
<div class="ig-modal" role="dialog" aria-modal="true" aria-label="Stories">
  <div class="ig-progress"></div>
  <div class="ig-loading" hidden aria-live="polite" aria-busy="true">
    <div class="ig-spinner" aria-hidden="true"></div>
    <div class="ig-loading-text">Loading…</div>
  </div>
  <button type="button" class="ig-sound-top" aria-label="Sound" aria-pressed="false">🔇</button>
  <button type="button" class="ig-close" aria-label="Close">×</button>
  <button type="button" class="ig-nav ig-left" aria-label="Previous">‹</button>
  <button type="button" class="ig-nav ig-right" aria-label="Next">›</button>
  <div class="ig-media" role="group" aria-label="Stories"></div>
  <div class="ig-actions">
    <button type="button" class="ig-act ig-like" aria-label="Like">♥ <span class="ig-like-count">0</span></button>
    <button type="button" class="ig-act ig-comment" aria-label="Comments">💬 <span class="ig-cmt-count">0</span></button>
    <button type="button" class="ig-act ig-share" aria-label="Share">↗</button>
    <button type="button" class="ig-act ig-wa" aria-label="WhatsApp">✆</button>
  </div>
  <div class="ig-product"></div>
  <div class="ig-comments" hidden>
    <div class="ig-comments-head">Comments <span class="ig-cnt">0</span>
      <button type="button" class="ig-comments-close" aria-label="Close comments">×</button>
    </div>
    <div class="ig-comments-list"></div>
    <div class="ig-comments-emoji"></div>
    <form class="ig-comments-form">
      <input name="text" maxlength="140" autocomplete="off" placeholder="Add a comment…">
      <button type="submit">Post</button>
    </form>
  </div>
  <div class="ig-profile" hidden>
    <form class="ig-profile-form">
      <div class="ig-profile-title">Tell us who you are</div>
      <input name="name" placeholder="Your name" required>
      <input name="whats" placeholder="WhatsApp" required>
      <button type="submit">Save</button>
      <button type="button" class="ig-cancel">Cancel</button>
    </form>
  </div>
  <div class="ig-toast" hidden></div>
</div>
"#;

const STYLES: &str = r#"
#ig-stories-modal{position:fixed;inset:0;z-index:9999;background:rgba(0,0,0,.92);display:grid;place-items:center;opacity:0;transition:opacity .16s ease}
#ig-stories-modal.ig-open{opacity:1}
.ig-modal{position:relative;width:min(100vw,420px);height:min(100vh,760px);background:#000;overflow:hidden;border-radius:12px}
.ig-progress{position:absolute;top:8px;left:8px;right:8px;display:flex;gap:4px;z-index:6}
.ig-bar{flex:1;height:3px;background:rgba(255,255,255,.35);border-radius:2px;overflow:hidden}
.ig-bar-fill{height:100%;width:0;background:#fff}
.ig-media{position:absolute;inset:0;touch-action:none}
.ig-media img,.ig-media video{width:100%;height:100%;object-fit:cover}
.ig-loading{position:absolute;inset:0;display:grid;place-items:center;color:#fff;z-index:5}
.ig-spinner{width:36px;height:36px;border:3px solid rgba(255,255,255,.3);border-top-color:#fff;border-radius:50%;animation:ig-spin 1s linear infinite}
@keyframes ig-spin{to{transform:rotate(360deg)}}
.ig-close{position:absolute;top:18px;right:12px;z-index:8;background:none;border:0;color:#fff;font-size:28px}
.ig-sound-top{position:absolute;top:18px;left:12px;z-index:8;background:rgba(255,255,255,.18);border:0;color:#fff;border-radius:50%;width:40px;height:40px}
.ig-nav{position:absolute;top:50%;z-index:7;background:none;border:0;color:#fff;font-size:32px}
.ig-left{left:4px}.ig-right{right:4px}
.ig-actions{position:absolute;right:10px;bottom:120px;display:flex;flex-direction:column;gap:10px;z-index:7}
.ig-act{background:rgba(255,255,255,.18);border:0;color:#fff;border-radius:24px;min-width:44px;height:44px}
.ig-like.liked{color:#ff3b5c}
.ig-product{position:absolute;left:10px;right:10px;bottom:12px;z-index:7}
.ig-card{display:flex;justify-content:space-between;align-items:center;background:#fff;border-radius:12px;padding:8px}
.ig-card-left{display:flex;gap:8px;align-items:center}.ig-thumb{width:48px;height:48px;object-fit:cover;border-radius:8px}
.ig-price-old{margin-left:6px;text-decoration:line-through;opacity:.6}
.ig-comments{position:absolute;left:0;right:0;bottom:0;max-height:70%;background:#fff;z-index:9;display:flex;flex-direction:column;border-radius:12px 12px 0 0}
.ig-comments-list{overflow:auto;flex:1;padding:8px}
.ig-comments-emoji{display:flex;gap:6px;padding:4px 8px}.ig-emo{background:none;border:0;font-size:20px;cursor:pointer}
.ig-comment-item{display:flex;gap:8px;margin-bottom:8px}
.ig-avatar-chip{width:28px;height:28px;border-radius:50%;background:#eee;display:grid;place-items:center;font-weight:700}
.ig-comment-meta{font-size:12px;opacity:.6}
.ig-profile{position:absolute;inset:20% 10% auto;background:#fff;border-radius:12px;padding:16px;z-index:10}
.ig-toast{position:absolute;left:50%;bottom:90px;transform:translateX(-50%);background:rgba(0,0,0,.8);color:#fff;padding:8px 14px;border-radius:20px;z-index:11}
"#;

/// Handles to the overlay's fixed elements
#[derive(Clone)]
pub struct Overlay {
    pub root: HtmlElement,
    pub modal: Element,
    pub progress: Element,
    pub loading: HtmlElement,
    pub media: Element,
    pub product: Element,
    pub close: HtmlElement,
    pub prev: Element,
    pub next: Element,
    pub sound: Element,
    pub like: Element,
    pub comment: Element,
    pub share: Element,
    pub whatsapp: Element,
    pub comments: HtmlElement,
    pub comments_list: Element,
    pub comments_emoji: Element,
    pub comments_form: Element,
    pub comments_close: Element,
    pub profile: HtmlElement,
    pub profile_form: Element,
    pub profile_cancel: Element,
    pub toast: HtmlElement,
}

fn find(root: &Element, selector: &str) -> Result<Element, JsValue> {
    root.query_selector(selector)?
        .ok_or_else(|| JsValue::from_str(&format!("overlay is missing {selector}")))
}

fn find_html(root: &Element, selector: &str) -> Result<HtmlElement, JsValue> {
    find(root, selector)?.dyn_into::<HtmlElement>().map_err(JsValue::from)
}

impl Overlay {
    /// Build the overlay markup and attach it, hidden, to `<body>`
    ///
    /// `quick_emojis` become the comment panel's quick-insert buttons.
    pub fn build(document: &Document, quick_emojis: &[String]) -> Result<Self, JsValue> {
        if let Some(old) = document.get_element_by_id(ROOT_ID) {
            old.remove();
        }
        let root: HtmlElement = document.create_element("div")?.dyn_into()?;
        root.set_id(ROOT_ID);
        root.set_hidden(true);
        root.set_inner_html(&format!("{MARKUP}<style>{STYLES}</style>"));
        document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?
            .append_child(&root)?;

        let el: &Element = root.as_ref();
        let comments_emoji = find(el, ".ig-comments-emoji")?;
        for glyph in quick_emojis {
            let button = document.create_element("button")?;
            button.set_attribute("type", "button")?;
            button.set_class_name("ig-emo");
            button.set_text_content(Some(glyph));
            comments_emoji.append_child(&button)?;
        }
        Ok(Self {
            modal: find(el, ".ig-modal")?,
            progress: find(el, ".ig-progress")?,
            loading: find_html(el, ".ig-loading")?,
            media: find(el, ".ig-media")?,
            product: find(el, ".ig-product")?,
            close: find_html(el, ".ig-close")?,
            prev: find(el, ".ig-left")?,
            next: find(el, ".ig-right")?,
            sound: find(el, ".ig-sound-top")?,
            like: find(el, ".ig-like")?,
            comment: find(el, ".ig-comment")?,
            share: find(el, ".ig-share")?,
            whatsapp: find(el, ".ig-wa")?,
            comments: find_html(el, ".ig-comments")?,
            comments_list: find(el, ".ig-comments-list")?,
            comments_emoji,
            comments_form: find(el, ".ig-comments-form")?,
            comments_close: find(el, ".ig-comments-close")?,
            profile: find_html(el, ".ig-profile")?,
            profile_form: find(el, ".ig-profile-form")?,
            profile_cancel: find(el, ".ig-cancel")?,
            toast: find_html(el, ".ig-toast")?,
            root,
        })
    }

    /// Focusable elements inside the modal, in document order
    pub fn focusables(&self) -> Vec<HtmlElement> {
        let Ok(list) = self.modal.query_selector_all(FOCUSABLE) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
            .filter(|el| !el.hidden() && el.offset_parent().is_some())
            .collect()
    }
}

/// Currently mounted media element
#[derive(Clone)]
pub struct MountedMedia {
    pub token: LoadToken,
    pub kind: MediaKind,
    pub element: HtmlElement,
    /// Set when the host must attach the streaming library
    pub library_source: Option<String>,
}

pub fn log_error(context: &str, err: JsValue) {
    web_sys::console::warn_2(&JsValue::from_str(&format!("[Reel] {context}")), &err);
}

pub(crate) fn set_timeout(window: &Window, delay_ms: i32, f: impl FnOnce() + 'static) -> Option<i32> {
    let callback = Closure::once_into_js(f);
    window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref::<Function>(), delay_ms)
        .map_err(|e| log_error("setTimeout failed", e))
        .ok()
}

fn set_style(el: &Element, property: &str, value: &str) {
    if let Some(html) = el.dyn_ref::<HtmlElement>() {
        if let Err(e) = html.style().set_property(property, value) {
            log_error("style update failed", e);
        }
    }
}

pub(crate) fn millis(d: std::time::Duration) -> i32 {
    i32::try_from(d.as_millis()).unwrap_or(i32::MAX)
}

/// Applies view events to the overlay
pub struct DomPresenter {
    window: Window,
    document: Document,
    overlay: Overlay,
    avatars_selector: String,
    media: Option<MountedMedia>,
    toast_timer: Option<i32>,
}

impl DomPresenter {
    pub fn new(window: Window, document: Document, overlay: Overlay, avatars_selector: String) -> Self {
        Self {
            window,
            document,
            overlay,
            avatars_selector,
            media: None,
            toast_timer: None,
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn media(&self) -> Option<&MountedMedia> {
        self.media.as_ref()
    }

    fn video(&self) -> Option<HtmlMediaElement> {
        self.media
            .as_ref()
            .filter(|m| m.kind == MediaKind::Video)
            .and_then(|m| m.element.clone().dyn_into::<HtmlMediaElement>().ok())
    }

    fn bar_fill(&self, index: usize) -> Option<Element> {
        self.overlay
            .progress
            .query_selector_all(".ig-bar-fill")
            .ok()
            .and_then(|list| list.item(index as u32))
            .and_then(|node| node.dyn_into::<Element>().ok())
    }

    fn silence_host_media(&self) {
        let Ok(videos) = self.document.query_selector_all("video") else {
            return;
        };
        for video in (0..videos.length())
            .filter_map(|i| videos.item(i))
            .filter_map(|n| n.dyn_into::<HtmlMediaElement>().ok())
        {
            if self.overlay.root.contains(Some(video.as_ref())) {
                continue;
            }
            let _ = video.pause();
            video.set_muted(true);
        }
    }

    fn show(&self) {
        self.overlay.root.set_hidden(false);
        if let Some(body) = self.document.body() {
            let _ = body.style().set_property("overflow", "hidden");
        }
        // Next frame, so the opacity transition runs
        let root = self.overlay.root.clone();
        set_timeout(&self.window, 0, move || {
            let _ = root.class_list().add_1("ig-open");
        });
    }

    fn hide(&self, fade: std::time::Duration) {
        let _ = self.overlay.root.class_list().remove_1("ig-open");
        if let Some(body) = self.document.body() {
            let _ = body.style().remove_property("overflow");
        }
        let root = self.overlay.root.clone();
        set_timeout(&self.window, millis(fade), move || {
            if !root.class_list().contains("ig-open") {
                root.set_hidden(true);
            }
        });
    }

    fn focus_cta(&self) {
        let document = self.document.clone();
        set_timeout(&self.window, 50, move || {
            let by_text = document.query_selector_all("button, a").ok().and_then(|list| {
                (0..list.length())
                    .filter_map(|i| list.item(i))
                    .filter_map(|n| n.dyn_into::<HtmlElement>().ok())
                    .find(|el| {
                        el.text_content()
                            .is_some_and(|t| t.to_lowercase().contains(CTA_TEXT))
                    })
            });
            let target = by_text.or_else(|| {
                document
                    .query_selector(CTA_FALLBACK)
                    .ok()
                    .flatten()
                    .and_then(|el| el.dyn_into::<HtmlElement>().ok())
            });
            if let Some(el) = target {
                let _ = el.focus();
            }
        });
    }

    fn layout_bars(&self, count: usize, active: usize) {
        let html: String = (0..count)
            .map(|i| {
                let width = if i < active { 100 } else { 0 };
                format!(r#"<div class="ig-bar"><div class="ig-bar-fill" style="width:{width}%"></div></div>"#)
            })
            .collect();
        self.overlay.progress.set_inner_html(&html);
    }

    fn animate_bar(&self, index: usize, from: f64, duration: std::time::Duration) {
        let Some(fill) = self.bar_fill(index) else {
            return;
        };
        set_style(&fill, "transition", "none");
        set_style(&fill, "width", &format!("{:.2}%", from * 100.0));
        if let Some(html) = fill.dyn_ref::<HtmlElement>() {
            // Force a reflow so the transition starts from `from`
            let _ = html.offset_width();
        }
        set_style(&fill, "transition", &format!("width {}ms linear", duration.as_millis()));
        set_style(&fill, "width", "100%");
    }

    fn freeze_bar(&self, index: usize, progress: f64) {
        if let Some(fill) = self.bar_fill(index) {
            set_style(&fill, "transition", "none");
            set_style(&fill, "width", &format!("{:.2}%", progress * 100.0));
        }
    }

    fn teardown_media(&mut self) {
        if let Some(video) = self.video() {
            let _ = video.pause();
            let _ = video.remove_attribute("src");
            video.load();
        }
        self.media = None;
        self.overlay.media.set_inner_html("");
    }

    fn mount(&mut self, mount: &MediaMount) -> Result<(), JsValue> {
        self.teardown_media();
        let (element, library_source): (HtmlElement, Option<String>) = match mount.kind {
            MediaKind::Image => {
                let img: HtmlImageElement = self.document.create_element("img")?.dyn_into()?;
                img.set_alt(&mount.label);
                img.set_decoding("async");
                img.set_src(&mount.url);
                (img.into(), None)
            }
            MediaKind::Video => {
                let video: HtmlVideoElement = self.document.create_element("video")?.dyn_into()?;
                video.set_attribute("playsinline", "")?;
                video.set_attribute("webkit-playsinline", "")?;
                video.set_preload("auto");
                video.set_muted(mount.muted);
                video.set_volume(if mount.muted { 0.0 } else { 1.0 });
                if let Some(poster) = &mount.poster {
                    video.set_poster(poster);
                }
                let library_source = match &mount.streaming {
                    Some(s) if s.delivery == StreamingDelivery::Library => Some(s.url.clone()),
                    _ => {
                        video.set_src(&mount.url);
                        None
                    }
                };
                (video.into(), library_source)
            }
        };
        self.overlay.media.append_child(&element)?;
        self.media = Some(MountedMedia {
            token: mount.token,
            kind: mount.kind,
            element,
            library_source,
        });
        Ok(())
    }

    fn swap_source(&mut self, token: LoadToken, url: &str) {
        let Some(media) = self.media.as_mut().filter(|m| m.token == token) else {
            return;
        };
        media.library_source = None;
        if let Some(img) = media.element.dyn_ref::<HtmlImageElement>() {
            img.set_src(url);
        } else if let Some(video) = media.element.dyn_ref::<HtmlMediaElement>() {
            video.set_src(url);
            video.load();
            let _ = video.play();
        }
    }

    fn set_muted(&self, muted: bool) {
        if let Some(video) = self.video() {
            video.set_muted(muted);
            video.set_volume(if muted { 0.0 } else { 1.0 });
        }
        let sound = &self.overlay.sound;
        let _ = sound.set_attribute("aria-pressed", if muted { "false" } else { "true" });
        sound.set_text_content(Some(if muted { "🔇" } else { "🔊" }));
    }

    fn mark_seen(&self, story: usize) {
        let Ok(avatars) = self.document.query_selector_all(&self.avatars_selector) else {
            return;
        };
        let index = story.to_string();
        for el in (0..avatars.length())
            .filter_map(|i| avatars.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
        {
            if el.get_attribute("data-story-index").as_deref() == Some(index.as_str()) {
                let _ = el.class_list().add_1("seen");
            }
        }
    }

    fn render_engagement(&self, view: &EngagementView) {
        let root: &Element = self.overlay.root.as_ref();
        if let Ok(Some(count)) = root.query_selector(".ig-like-count") {
            count.set_text_content(Some(&view.likes.to_string()));
        }
        let _ = self.overlay.like.class_list().toggle_with_force("liked", view.liked);
        let _ = self
            .overlay
            .like
            .set_attribute("aria-pressed", if view.liked { "true" } else { "false" });
        if let Ok(Some(count)) = root.query_selector(".ig-cmt-count") {
            count.set_text_content(Some(&view.comments.to_string()));
        }
        if let Ok(Some(count)) = root.query_selector(".ig-comments .ig-cnt") {
            count.set_text_content(Some(&view.comments.to_string()));
        }
        self.set_muted(view.muted);
    }

    fn comment_item(&self, comment: &CommentView) -> Result<Element, JsValue> {
        let item = self.document.create_element("div")?;
        item.set_class_name("ig-comment-item");

        let chip = self.document.create_element("div")?;
        chip.set_class_name("ig-avatar-chip");
        chip.set_text_content(Some(&comment.initial.to_string()));

        let body = self.document.create_element("div")?;
        body.set_class_name("ig-comment-body");
        let author = self.document.create_element("div")?;
        author.set_class_name("ig-comment-author");
        author.set_text_content(Some(&comment.author));
        let text = self.document.create_element("div")?;
        text.set_text_content(Some(&comment.text));
        let meta = self.document.create_element("div")?;
        meta.set_class_name("ig-comment-meta");
        meta.set_text_content(Some(&comment.age));
        body.append_child(&author)?;
        body.append_child(&text)?;
        body.append_child(&meta)?;

        item.append_child(&chip)?;
        item.append_child(&body)?;
        Ok(item)
    }

    fn render_comments(&self, open: bool, comments: &[CommentView]) -> Result<(), JsValue> {
        let panel = &self.overlay.comments;
        if !open {
            panel.set_hidden(true);
            panel.class_list().remove_1("ig-open")?;
            return Ok(());
        }
        let list = &self.overlay.comments_list;
        list.set_inner_html("");
        for comment in comments {
            let item = self.comment_item(comment)?;
            list.append_child(&item)?;
        }
        list.set_scroll_top(list.scroll_height());
        panel.set_hidden(false);
        panel.class_list().add_1("ig-open")?;
        Ok(())
    }

    fn toast(&mut self, message: &str) {
        let toast = self.overlay.toast.clone();
        toast.set_text_content(Some(message));
        toast.set_hidden(false);
        if let Some(handle) = self.toast_timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        self.toast_timer = set_timeout(&self.window, TOAST_MS, move || toast.set_hidden(true));
    }
}

impl Presenter for DomPresenter {
    fn present(&mut self, event: &ViewEvent) {
        match event {
            ViewEvent::SilenceHostMedia => self.silence_host_media(),
            ViewEvent::ShowOverlay => self.show(),
            ViewEvent::HideOverlay { fade } => self.hide(*fade),
            ViewEvent::FocusClose { delay } => {
                let close = self.overlay.close.clone();
                set_timeout(&self.window, millis(*delay), move || {
                    let _ = close.focus();
                });
            }
            ViewEvent::FocusCta => self.focus_cta(),
            ViewEvent::LayoutBars { count, active } => self.layout_bars(*count, *active),
            ViewEvent::AnimateBar { index, from, duration } => self.animate_bar(*index, *from, *duration),
            ViewEvent::FreezeBar { index, progress } => self.freeze_bar(*index, *progress),
            ViewEvent::TeardownMedia => self.teardown_media(),
            ViewEvent::MountMedia(mount) => {
                if let Err(e) = self.mount(mount) {
                    log_error("media mount failed", e);
                }
            }
            ViewEvent::SwapSource { token, url } => self.swap_source(*token, url),
            ViewEvent::LoadingIndicator { visible } => self.overlay.loading.set_hidden(!visible),
            ViewEvent::PlayMedia => {
                if let Some(video) = self.video() {
                    // Autoplay rejections are expected on muted-off mobile
                    let _ = video.play();
                }
            }
            ViewEvent::PauseMedia => {
                if let Some(video) = self.video() {
                    let _ = video.pause();
                }
            }
            ViewEvent::SetMuted { muted } => self.set_muted(*muted),
            ViewEvent::MarkSeen { story } => self.mark_seen(*story),
            ViewEvent::Product(card) => self.overlay.product.set_inner_html(&card.to_html()),
            ViewEvent::Engagement(view) => self.render_engagement(view),
            ViewEvent::CommentsPanel { open, comments } => {
                if let Err(e) = self.render_comments(*open, comments) {
                    log_error("comments render failed", e);
                }
            }
            ViewEvent::ProfilePrompt { visible } => self.overlay.profile.set_hidden(!visible),
            ViewEvent::Toast { message } => self.toast(message),
        }
    }
}
