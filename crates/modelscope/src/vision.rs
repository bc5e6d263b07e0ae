//! Image captioning via an OpenAI-compatible chat-completions endpoint.
//!
//! Turns an image into a prompt suitable for resubmission to the generation
//! service: the model is asked for a dense, factual scene description, and
//! the reply is whitespace-collapsed and truncated at a sentence boundary.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Default inference endpoint base URL.
pub const DEFAULT_VISION_BASE_URL: &str = "https://api-inference.modelscope.cn";

/// Default captioning model.
pub const DEFAULT_VISION_MODEL: &str = "Qwen/Qwen3-VL-30B-A3B-Instruct";

/// Hard cap on the caption length in characters.
pub const MAX_CAPTION_CHARS: usize = 500;

/// Minimum characters to keep when truncating at a sentence boundary; a
/// boundary earlier than this truncates mid-text instead.
const MIN_TRUNCATED_CHARS: usize = 400;

/// Per-request timeout; vision inference is slow.
const VISION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default instruction asking for a factual, prompt-shaped description.
const DEFAULT_INSTRUCTION: &str =
    "Describe this image as a detailed text-to-image prompt. State only what \
     is visible: subject, scene, art style or photographic genre, lighting, \
     camera angle, and composition. Use objective, factual language with no \
     metaphors, no symbolism, and no evaluation of the work. Answer in one \
     paragraph of at most 300 words.";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Vision API error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Vision API returned no caption")]
    EmptyResponse,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for one captioning deployment.
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    instruction: String,
}

impl VisionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_VISION_BASE_URL, api_key)
    }

    /// Build a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_VISION_MODEL.to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }

    /// Override the captioning model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the instruction sent alongside the image.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Caption raw image bytes.
    ///
    /// `mime` is the image content type (e.g. `image/png`), used in the
    /// data URL the API expects.
    pub async fn describe(&self, image: &[u8], mime: &str) -> Result<String, VisionError> {
        let data_url = format!("data:{mime};base64,{}", BASE64.encode(image));

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": self.instruction },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }],
            "stream": false,
        });

        tracing::info!(model = %self.model, image_bytes = image.len(), "Requesting image caption");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(VISION_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VisionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(VisionError::EmptyResponse)?;

        Ok(clean_caption(&content))
    }
}

/// Collapse whitespace and cap the caption at [`MAX_CAPTION_CHARS`],
/// preferring to cut at the last sentence or clause boundary past
/// [`MIN_TRUNCATED_CHARS`].
pub fn clean_caption(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw.trim(), " ").into_owned();
    if collapsed.chars().count() <= MAX_CAPTION_CHARS {
        return collapsed;
    }

    let truncated: String = collapsed.chars().take(MAX_CAPTION_CHARS).collect();
    for boundary in ['。', '，', '.', ','] {
        if let Some(pos) = truncated.rfind(boundary) {
            let kept = truncated[..pos].chars().count();
            if kept >= MIN_TRUNCATED_CHARS {
                return truncated[..pos + boundary.len_utf8()].to_string();
            }
        }
    }
    truncated
}
