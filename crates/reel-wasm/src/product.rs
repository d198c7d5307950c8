//! Product details scraped from the host page

use reel_core::types::Product;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlImageElement};

const CURRENCIES: [&str; 5] = ["R$", "US$", "$", "€", "£"];

/// First currency amount in `text`, e.g. `R$ 157,90`
pub fn extract_price(text: &str) -> Option<String> {
    let (start, symbol) = CURRENCIES
        .iter()
        .filter_map(|symbol| text.find(symbol).map(|i| (i, *symbol)))
        .min_by_key(|(i, _)| *i)?;
    let rest = &text[start + symbol.len()..];
    let gap = &rest[..rest.len() - rest.trim_start().len()];
    let amount: String = rest[gap.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let amount = amount.trim_end_matches(['.', ',']);
    if amount.is_empty() {
        return None;
    }
    Some(format!("{symbol}{gap}{amount}"))
}

fn text_of(document: &Document, selector: &str) -> Option<String> {
    document
        .query_selector(selector)
        .ok()
        .flatten()
        .and_then(|el| el.text_content())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn image_src(document: &Document, selector: &str) -> Option<String> {
    document
        .query_selector(selector)
        .ok()
        .flatten()
        .and_then(|el| el.dyn_into::<HtmlImageElement>().ok())
        .map(|img| img.src())
        .filter(|src| !src.is_empty())
}

/// Cash price from the highlight block: the line mentioning a cash payment
fn cash_price(document: &Document) -> Option<String> {
    let block = document.query_selector("#price-highlight-block").ok().flatten()?;
    let lines = block.query_selector_all("div").ok()?;
    (0..lines.length())
        .filter_map(|i| lines.item(i))
        .filter_map(|node| node.text_content())
        .find(|text| {
            let lower = text.to_lowercase();
            lower.contains("à vista") || lower.contains("in cash")
        })
        .and_then(|text| extract_price(&text))
}

/// Read the product card contents from the page, falling back per field
pub fn scrape(document: &Document) -> Product {
    let fallback = Product::default();
    Product {
        title: text_of(document, "h1").unwrap_or(fallback.title),
        thumb: image_src(document, "#mainImage")
            .or_else(|| image_src(document, ".product-image-gallery img"))
            .unwrap_or(fallback.thumb),
        price_now: cash_price(document).unwrap_or(fallback.price_now),
        price_old: text_of(document, ".compare-price").and_then(|t| extract_price(&t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price() {
        assert_eq!(extract_price("só R$ 157,90 à vista").as_deref(), Some("R$ 157,90"));
        assert_eq!(extract_price("R$1.299,00.").as_deref(), Some("R$1.299,00"));
        assert_eq!(extract_price("now $29.90 only").as_deref(), Some("$29.90"));
        assert_eq!(extract_price("free shipping"), None);
        assert_eq!(extract_price("R$ soon"), None);
    }
}
