//! Share-sheet payloads and messaging deep links

use crate::Result;
use serde::{Deserialize, Serialize};
use url::Url;

const UTM_PARAMS: [(&str, &str); 3] = [
    ("utm_source", "stories"),
    ("utm_medium", "whatsapp"),
    ("utm_campaign", "ig_stories"),
];

/// Payload for the platform share sheet
///
/// Hosts without a share sheet copy `url` to the clipboard instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl SharePayload {
    pub fn new(title: impl Into<String>, text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Messaging deep link with a prefilled purchase-interest message
///
/// The campaign parameters are appended to the link itself so the
/// messaging landing page gets attributed.
pub fn whatsapp_link(base: &str, title: &str, product_url: &str) -> Result<Url> {
    let message = format!("Hi, I'm interested in this product: {title} - {product_url}");
    let mut params = vec![("text", message.as_str())];
    params.extend(UTM_PARAMS);
    Ok(Url::parse_with_params(base, &params)?)
}
