//! Concurrent download of result images.
//!
//! Result URLs are pure reads with no ordering dependency between fetches,
//! so they run with bounded parallelism. The returned list still matches
//! the input order, and each entry carries its own outcome so callers can
//! skip a single failed download instead of losing the batch.

use std::time::Duration;

use futures::stream::{self, StreamExt};

/// How many image downloads run at once.
const DOWNLOAD_CONCURRENCY: usize = 4;

/// Per-image download timeout.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Download request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Download of {url} returned HTTP {status}")]
    Http { url: String, status: u16 },
}

/// One downloaded image: its source URL and raw bytes.
#[derive(Debug)]
pub struct DownloadedImage {
    pub url: String,
    pub bytes: Vec<u8>,
}

/// Fetch every URL, preserving input order in the output.
///
/// Failures are per-entry; a broken CDN link costs one image, not the
/// batch. The caller decides whether any-failed or all-failed is fatal.
pub async fn download_images(
    client: &reqwest::Client,
    urls: &[String],
) -> Vec<Result<DownloadedImage, DownloadError>> {
    stream::iter(urls.iter().cloned())
        .map(|url| async move { download_one(client, url).await })
        .buffered(DOWNLOAD_CONCURRENCY)
        .collect()
        .await
}

async fn download_one(
    client: &reqwest::Client,
    url: String,
) -> Result<DownloadedImage, DownloadError> {
    let response = client
        .get(&url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url = %url, status = status.as_u16(), "Image download failed");
        return Err(DownloadError::Http {
            url,
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await?.to_vec();
    tracing::debug!(url = %url, size = bytes.len(), "Image downloaded");
    Ok(DownloadedImage { url, bytes })
}

/// Derive a file name from a URL: the basename of the path, query string
/// stripped. Returns `None` when the URL has no usable basename (the caller
/// falls back to a positional name).
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split('?').next().unwrap_or(url);
    let name = without_query.rsplit('/').next()?;
    if name.is_empty() || !name.contains('.') {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_query_string() {
        let name = file_name_from_url("https://cdn.example.com/img/abc123.png?Expires=99");
        assert_eq!(name.as_deref(), Some("abc123.png"));
    }

    #[test]
    fn url_without_extension_yields_none() {
        assert!(file_name_from_url("https://cdn.example.com/img/abc123").is_none());
        assert!(file_name_from_url("https://cdn.example.com/").is_none());
    }

    #[tokio::test]
    async fn results_keep_input_order_with_failures_in_place() {
        // Both downloads fail (nothing listens on port 1), but the output
        // must still be positional.
        let client = reqwest::Client::new();
        let urls = vec![
            "http://127.0.0.1:1/a.png".to_string(),
            "http://127.0.0.1:1/b.png".to_string(),
        ];
        let results = download_images(&client, &urls).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_err));
    }
}
