//! Persistence of generation outputs.
//!
//! A finished task gets its own directory under the configured output root:
//! every image is downloaded into `<output_dir>/<task_id>/`, and a
//! `<task_id>.json` manifest records the prompt, source URLs, and saved
//! files. A single failed download skips that file; persistence fails only
//! when nothing could be saved at all.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use musegen_modelscope::download::{download_images, file_name_from_url};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Failed to write output files: {0}")]
    Io(#[from] std::io::Error),

    #[error("All {0} image downloads failed")]
    AllDownloadsFailed(usize),
}

/// One saved image file.
#[derive(Debug, Serialize)]
pub struct SavedImage {
    /// File name inside the task directory.
    pub file_name: String,
    /// Source URL the bytes came from.
    pub url: String,
    /// Pixel dimensions, when the image header could be parsed.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Result of persisting one task's outputs.
#[derive(Debug, Serialize)]
pub struct SavedOutputs {
    /// Directory the files were written into.
    pub dir: PathBuf,
    pub images: Vec<SavedImage>,
}

/// Download every URL and write images plus a JSON manifest under
/// `<output_dir>/<task_id>/`.
pub async fn save_task_outputs(
    http: &reqwest::Client,
    output_dir: &Path,
    task_id: &str,
    prompt: Option<&str>,
    urls: &[String],
) -> Result<SavedOutputs, PersistError> {
    let task_dir = output_dir.join(task_id);
    tokio::fs::create_dir_all(&task_dir).await?;

    let mut images = Vec::new();
    for (index, result) in download_images(http, urls).await.into_iter().enumerate() {
        let downloaded = match result {
            Ok(d) => d,
            Err(e) => {
                // Logged at the download layer; one broken link costs one
                // file, not the batch.
                tracing::warn!(index, error = %e, "Skipping failed image download");
                continue;
            }
        };

        let file_name = file_name_from_url(&downloaded.url)
            .unwrap_or_else(|| format!("image_{}.jpg", index + 1));
        let (width, height) = probe_dimensions(&downloaded.bytes);

        tokio::fs::write(task_dir.join(&file_name), &downloaded.bytes).await?;
        tracing::info!(task_id = %task_id, file = %file_name, "Image saved");

        images.push(SavedImage {
            file_name,
            url: downloaded.url,
            width,
            height,
        });
    }

    if images.is_empty() && !urls.is_empty() {
        return Err(PersistError::AllDownloadsFailed(urls.len()));
    }

    let manifest = json!({
        "id": task_id,
        "prompt": prompt.unwrap_or_default(),
        "urls": urls,
        "files": images,
        "saved_at": chrono::Utc::now().to_rfc3339(),
    });
    tokio::fs::write(
        task_dir.join(format!("{task_id}.json")),
        serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::other)?,
    )
    .await?;

    tracing::info!(
        task_id = %task_id,
        saved = images.len(),
        dir = %task_dir.display(),
        "Task outputs persisted",
    );

    Ok(SavedOutputs {
        dir: task_dir,
        images,
    })
}

/// Read width/height from the image header without decoding pixel data.
fn probe_dimensions(bytes: &[u8]) -> (Option<u32>, Option<u32>) {
    let reader = match image::ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(reader) => reader,
        Err(_) => return (None, None),
    };
    match reader.into_dimensions() {
        Ok((w, h)) => (Some(w), Some(h)),
        Err(_) => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest valid 1x1 PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn png_header_dimensions_probed() {
        let (width, height) = probe_dimensions(TINY_PNG);
        assert_eq!(width, Some(1));
        assert_eq!(height, Some(1));
    }

    #[test]
    fn garbage_bytes_yield_no_dimensions() {
        let (width, height) = probe_dimensions(b"not an image at all");
        assert_eq!(width, None);
        assert_eq!(height, None);
    }

    #[tokio::test]
    async fn all_downloads_failed_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let http = reqwest::Client::new();
        let urls = vec!["http://127.0.0.1:1/a.png".to_string()];

        let err = save_task_outputs(&http, temp.path(), "778899", None, &urls)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::AllDownloadsFailed(1)));
    }

    #[tokio::test]
    async fn empty_url_list_still_writes_a_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let http = reqwest::Client::new();

        let saved = save_task_outputs(&http, temp.path(), "778899", Some("a fox"), &[])
            .await
            .unwrap();
        assert!(saved.images.is_empty());
        assert!(saved.dir.join("778899.json").exists());
    }
}
