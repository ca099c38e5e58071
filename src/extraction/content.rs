//! Extraction record data model and the main-content extractor boundary.
//!
//! `MainContentExtractor` is the black-box collaborator named in spec §1 and
//! §6 ("HTML main-content extraction... returns a text+metadata record") —
//! explicitly out of scope to implement; this crate only defines the trait
//! boundary an adapter would satisfy, grounded on the call shape in
//! `original_source/.../extraction.py::extract_with_trafilatura`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredMetadata {
    pub author: Option<String>,
    pub date: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub availability: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRef {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub url: String,
    pub title: String,
    pub main_text: String,
    pub metadata: StructuredMetadata,
    pub links: Vec<LinkRef>,
    pub content_length: usize,
    pub extraction_method: String,
}

impl ExtractionRecord {
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>, main_text: impl Into<String>, method: impl Into<String>) -> Self {
        let main_text = main_text.into();
        Self {
            url: url.into(),
            title: title.into(),
            content_length: main_text.len(),
            main_text,
            metadata: StructuredMetadata::default(),
            links: Vec::new(),
            extraction_method: method.into(),
        }
    }
}

/// The black-box main-content extractor: given HTML and the page URL,
/// produce a text+metadata record, or `None` if it judges the content too
/// trivial to extract. A concrete adapter (e.g. wrapping a trafilatura-style
/// service) satisfies this trait; this crate ships no implementation.
pub trait MainContentExtractor: Send + Sync {
    fn extract(&self, html: &str, url: &str) -> Option<ExtractionRecord>;
}

/// Scan `<script type="application/ld+json">` blocks for a `Product` shape
/// or an embedded offer, merging price/currency/availability into the given
/// metadata. Grounded on `original_source/.../extraction.py`'s JSON-LD scan.
pub fn mine_structured_product_data(ld_json_blocks: &[String], metadata: &mut StructuredMetadata) {
    for block in ld_json_blocks {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(block) else {
            continue;
        };
        if let Some(found) = extract_product_fields(&value) {
            if metadata.price.is_none() {
                metadata.price = found.price;
            }
            if metadata.currency.is_none() {
                metadata.currency = found.currency;
            }
            if metadata.availability.is_none() {
                metadata.availability = found.availability;
            }
        }
    }
}

fn extract_product_fields(value: &serde_json::Value) -> Option<StructuredMetadata> {
    let type_field = value.get("@type").and_then(|v| v.as_str());
    let is_product = type_field == Some("Product");
    let offer = value.get("offers");
    let direct_price = value.get("price");

    if !is_product && offer.is_none() && direct_price.is_none() {
        return None;
    }

    let offer_obj = offer.and_then(|o| if o.is_array() { o.get(0) } else { Some(o) });

    let price = direct_price
        .or_else(|| offer_obj.and_then(|o| o.get("price")))
        .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_f64().map(|f| f.to_string())));
    let currency = offer_obj
        .and_then(|o| o.get("priceCurrency"))
        .and_then(|v| v.as_str().map(str::to_string));
    let availability = offer_obj
        .and_then(|o| o.get("availability"))
        .and_then(|v| v.as_str().map(str::to_string));

    Some(StructuredMetadata {
        author: None,
        date: None,
        price,
        currency,
        availability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mines_product_price_from_ld_json() {
        let block = r#"{"@type": "Product", "name": "Widget", "offers": {"price": "19.99", "priceCurrency": "USD", "availability": "InStock"}}"#.to_string();
        let mut meta = StructuredMetadata::default();
        mine_structured_product_data(&[block], &mut meta);
        assert_eq!(meta.price.as_deref(), Some("19.99"));
        assert_eq!(meta.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn ignores_non_product_ld_json() {
        let block = r#"{"@type": "Article", "headline": "Hi"}"#.to_string();
        let mut meta = StructuredMetadata::default();
        mine_structured_product_data(&[block], &mut meta);
        assert!(meta.price.is_none());
    }
}
