//! Image-URL extraction from a finished task.
//!
//! Completed tasks have carried their image URLs in at least five different
//! shapes over the service's lifetime. Extraction runs an ordered list of
//! shape probes, newest first, and falls back to a whole-tree scan only when
//! every known shape comes up empty. The fallback winning is worth knowing
//! about (it means the schema drifted again), so it logs at WARN.

use serde_json::Value;

use crate::envelope::TaskView;

/// File extensions accepted by the whole-tree URL scan.
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"];

/// Image URLs pulled out of a terminal SUCCEEDED view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedImages {
    /// URLs in the order the service reported them.
    pub urls: Vec<String>,
    /// Final prompt echoed by the service, when present alongside the images.
    pub prompt: Option<String>,
}

impl ExtractedImages {
    fn urls_only(urls: Vec<String>) -> Self {
        Self { urls, prompt: None }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Extract image URLs from a terminal view.
///
/// Probes, in order:
/// 1. `predictResult.images[].imageUrl` (current; also captures the echoed
///    `prompt` from the first image).
/// 2. `predictResult[].url` (legacy list form).
/// 3. `predictResult.results[].url`.
/// 4. `predictResult.image_list[]` of plain strings.
/// 5. Recursive scan of the whole response body for string values under
///    `url`/`imageUrl`/`image_url` keys, filtered to image extensions.
///
/// The first probe yielding at least one URL wins. Returns an empty result
/// only when every probe comes up empty.
pub fn extract_images(view: &TaskView) -> ExtractedImages {
    if let Some(result) = view.predict_result.as_ref() {
        if let Some(images) = probe_images_field(result) {
            return images;
        }
        if let Some(urls) = probe_url_list(result) {
            return ExtractedImages::urls_only(urls);
        }
        if let Some(urls) = result.get("results").and_then(probe_url_list) {
            return ExtractedImages::urls_only(urls);
        }
        if let Some(urls) = probe_image_list(result) {
            return ExtractedImages::urls_only(urls);
        }
    }

    let mut urls = Vec::new();
    scan_for_urls(&view.raw, &mut urls);
    urls.retain(|url| has_image_extension(url));
    if !urls.is_empty() {
        tracing::warn!(
            count = urls.len(),
            "No known result shape matched; image URLs recovered by whole-tree scan",
        );
    }
    ExtractedImages::urls_only(urls)
}

/// Probe 1: `predictResult.images[]` objects with an `imageUrl` field.
fn probe_images_field(result: &Value) -> Option<ExtractedImages> {
    let items = result.get("images")?.as_array()?;
    let urls: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("imageUrl"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        return None;
    }
    let prompt = items
        .first()
        .and_then(|item| item.get("prompt"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(ExtractedImages { urls, prompt })
}

/// Probes 2 and 3: a list of objects each carrying a `url` field.
fn probe_url_list(node: &Value) -> Option<Vec<String>> {
    let items = node.as_array()?;
    let urls: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("url"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        None
    } else {
        Some(urls)
    }
}

/// Probe 4: `predictResult.image_list[]` of plain URL strings.
fn probe_image_list(result: &Value) -> Option<Vec<String>> {
    let items = result.get("image_list")?.as_array()?;
    let urls: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        None
    } else {
        Some(urls)
    }
}

/// Probe 5: collect every string under a url-ish key, document order.
fn scan_for_urls(node: &Value, urls: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let lowered = key.to_ascii_lowercase();
                match value {
                    Value::String(s)
                        if matches!(lowered.as_str(), "url" | "imageurl" | "image_url") =>
                    {
                        urls.push(s.clone());
                    }
                    Value::Object(_) | Value::Array(_) => scan_for_urls(value, urls),
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                scan_for_urls(item, urls);
            }
        }
        _ => {}
    }
}

fn has_image_extension(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}
