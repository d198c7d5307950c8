//! Browser capability probing

use js_sys::Reflect;
use reel_core::{config::StreamingConfig, profile::DeviceSignals, resolver::StreamingSupport};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, HtmlVideoElement, Window};

const HLS_MIME: &str = "application/vnd.apple.mpegurl";

fn property(target: &JsValue, name: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

/// Read viewport, touch, user agent and connection hints
pub fn read_signals(window: &Window) -> DeviceSignals {
    let navigator = window.navigator();
    let viewport_width = window
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .map(|w| w.max(0.0) as u32);
    let touch_capable = Some(
        Reflect::has(window.as_ref(), &JsValue::from_str("ontouchstart")).unwrap_or(false)
            || navigator.max_touch_points() > 0,
    );
    let effective_connection = property(navigator.as_ref(), "connection")
        .and_then(|c| property(&c, "effectiveType"))
        .and_then(|t| t.as_string());

    DeviceSignals {
        viewport_width,
        touch_capable,
        user_agent: navigator.user_agent().ok(),
        effective_connection,
    }
}

/// Whether streaming manifests play natively, and whether the library may load
pub fn streaming_support(window: &Window, document: &Document, config: &StreamingConfig) -> StreamingSupport {
    let native = document
        .create_element("video")
        .ok()
        .and_then(|el| el.dyn_into::<HtmlVideoElement>().ok())
        .map(|video| !video.can_play_type(HLS_MIME).is_empty())
        .unwrap_or(false);
    let library = config.library_enabled && property(window.as_ref(), "MediaSource").is_some();
    StreamingSupport { native, library }
}
