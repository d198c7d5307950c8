//! Reel WASM - Stories widget for the browser
//!
//! Runs the reel-core engine against the live page:
//! - DOM overlay with progress bars, product card and engagement panels
//! - `localStorage` persistence for seen stories, likes and comments
//! - Browser timers, animation frames and media events as the engine clock
//! - Lazy streaming-library attachment when native playback is missing
//!
//! ## Usage
//!
//! ```javascript
//! import init, { init_stories } from '@reel/wasm';
//!
//! await init();
//! const widget = init_stories({ avatarsSelector: '.story-avatar', stories: [...] });
//! ```

use wasm_bindgen::prelude::*;

mod device;
mod dom;
mod host;
mod product;
mod storage;

use chrono::{TimeZone, Utc};
use host::Shared;
use reel_core::{DeviceProfile, StoriesConfig, StoriesController};
use storage::LocalStore;

pub use product::extract_price;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"[Reel WASM] Initialized".into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    reel_core::VERSION.to_string()
}

fn js_err(err: reel_core::Error) -> JsValue {
    JsValue::from_str(&format!("[{}] {err}", err.error_code()))
}

/// Wall-clock time at `performance.now() == 0`
fn clock_epoch(window: &web_sys::Window) -> chrono::DateTime<Utc> {
    let since_origin = window.performance().map(|p| p.now()).unwrap_or_default();
    let epoch_ms = (js_sys::Date::now() - since_origin) as i64;
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .unwrap_or(chrono::DateTime::UNIX_EPOCH)
}

/// Mount the widget on the current page
///
/// `options` uses the same camelCase keys as the JSON configuration.
/// When no product is given it is read from the page.
#[wasm_bindgen]
pub fn init_stories(options: JsValue) -> Result<StoriesWidget, JsValue> {
    let mut config: StoriesConfig = if options.is_undefined() || options.is_null() {
        StoriesConfig::default()
    } else {
        serde_wasm_bindgen::from_value(options)?
    };
    config.validate().map_err(js_err)?;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;

    if config.product.is_none() {
        config.product = Some(product::scrape(&document));
    }

    let store = LocalStore::open();
    if !store.is_available() {
        web_sys::console::warn_1(&"[Reel WASM] localStorage unavailable, nothing will persist".into());
    }
    let profile = DeviceProfile::from_signals(device::read_signals(&window));
    let support = device::streaming_support(&window, &document, &config.streaming);
    let avatars_selector = config.avatars_selector.clone();
    let streaming = config.streaming.clone();
    let epoch = clock_epoch(&window);

    let overlay = dom::Overlay::build(&document, &config.engagement.quick_emojis)?;
    let presenter = dom::DomPresenter::new(window.clone(), document.clone(), overlay, avatars_selector.clone());
    let controller = StoriesController::new(config, profile, support, store, epoch).map_err(js_err)?;

    let shared = Shared::new(controller, presenter, window, document, streaming);
    // Seen markers queued at construction
    shared.run(|_, _| Ok(()));
    shared.bind(&avatars_selector)?;
    Ok(StoriesWidget { shared })
}

/// Handle to a mounted widget
#[wasm_bindgen]
pub struct StoriesWidget {
    shared: Shared,
}

#[wasm_bindgen]
impl StoriesWidget {
    /// Open `story` at `item`; out-of-range indices are clamped
    pub fn open_story(&self, story: usize, item: usize) {
        self.shared
            .run(move |i, now| i.controller_mut().open_story(story, item, now));
    }

    /// Open at the position kept from the last session
    pub fn reopen(&self) {
        self.shared.run(|i, now| i.controller_mut().reopen(now));
    }

    pub fn next_item(&self) {
        self.shared.run(|i, now| i.controller_mut().next_item(now));
    }

    pub fn prev_item(&self) {
        self.shared.run(|i, now| i.controller_mut().prev_item(now));
    }

    pub fn close(&self) {
        self.shared.run(|i, now| i.controller_mut().close(now));
    }

    pub fn toggle_mute(&self) {
        self.shared.run(|i, _| {
            i.controller_mut().toggle_mute();
            Ok(())
        });
    }

    /// Current playback state as a plain object
    pub fn state(&self) -> Result<JsValue, JsValue> {
        let state = self
            .shared
            .read(|i| i.controller().state().clone())
            .ok_or_else(|| JsValue::from_str("widget state is busy"))?;
        Ok(serde_wasm_bindgen::to_value(&state)?)
    }

    /// Indices of stories viewed on this device
    pub fn seen_stories(&self) -> Vec<usize> {
        self.shared
            .read(|i| i.controller().seen_stories())
            .unwrap_or_default()
    }
}
