//! Page list extraction from the episode viewer page.
//!
//! The viewer embeds the whole episode as JSON in the `data-value` attribute
//! of `<script id="episode-json">`. The page list lives at
//! `readableProduct.pageStructure.pages`; entries without an image (spreads,
//! ads, the trailing "other" page) are skipped.

use crate::error::DownloadError;
use crate::model::PageDescriptor;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Return the raw episode JSON embedded in `html`.
///
/// Entities in the attribute (`&quot;` etc.) are decoded by the HTML parser.
pub fn extract_episode_json(html: &str) -> Result<String, DownloadError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#episode-json")
        .map_err(|e| DownloadError::Internal(format!("invalid selector: {e:?}")))?;

    let value = document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("data-value"))
        .ok_or(DownloadError::EpisodeDataMissing)?;

    if value.trim().is_empty() {
        return Err(DownloadError::EpisodeDataEmpty);
    }
    Ok(value.to_string())
}

/// Parse the episode JSON into page descriptors sorted by source URL.
///
/// The platform encodes reading order in the URL, so lexicographic order is
/// reading order.
pub fn parse_pages(json: &str) -> Result<Vec<PageDescriptor>, DownloadError> {
    let data: Value =
        serde_json::from_str(json).map_err(|e| DownloadError::InvalidEpisodeJson(e.to_string()))?;

    let pages = data
        .get("readableProduct")
        .filter(|v| v.is_object())
        .ok_or_else(|| missing("readableProduct"))?
        .get("pageStructure")
        .filter(|v| v.is_object())
        .ok_or_else(|| missing("pageStructure"))?
        .get("pages")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("pages"))?;

    let mut descriptors: Vec<PageDescriptor> = pages.iter().filter_map(page_descriptor).collect();
    descriptors.sort_by(|a, b| a.source_url.cmp(&b.source_url));

    debug!(
        "Episode JSON lists {} entries, {} with images",
        pages.len(),
        descriptors.len()
    );
    Ok(descriptors)
}

fn page_descriptor(entry: &Value) -> Option<PageDescriptor> {
    let src = entry.get("src")?.as_str()?;
    if src.is_empty() {
        return None;
    }
    let width = entry.get("width")?.as_f64()?;
    let height = entry.get("height")?.as_f64()?;
    Some(PageDescriptor::new(src, width as u32, height as u32))
}

fn missing(field: &str) -> DownloadError {
    DownloadError::InvalidEpisodeJson(format!("missing {field}"))
}
