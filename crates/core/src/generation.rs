//! Text-to-image generation requests: named defaults, bounds, and validation.
//!
//! A [`GenerationRequest`] captures everything the remote service needs to
//! render a batch of images. Defaults match the portrait-oriented preset the
//! service ships with; callers override individual fields and then call
//! [`GenerationRequest::validate`] before submission.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Generation defaults and bounds
// ---------------------------------------------------------------------------

/// Default output width in pixels (portrait preset).
pub const DEFAULT_WIDTH: u32 = 928;
/// Default output height in pixels (portrait preset).
pub const DEFAULT_HEIGHT: u32 = 1664;
/// Hard ceiling on either output dimension.
pub const MAX_DIMENSION: u32 = 2048;

/// Minimum number of images per submission.
pub const MIN_IMAGES_PER_TASK: u32 = 1;
/// Maximum number of images per submission.
pub const MAX_IMAGES_PER_TASK: u32 = 4;
/// Default number of images per submission.
pub const DEFAULT_IMAGES_PER_TASK: u32 = 4;

/// Maximum number of LoRA adapters a single request may reference.
pub const MAX_LORAS: usize = 4;
/// Upper bound on a LoRA blend scale.
pub const MAX_LORA_SCALE: f64 = 2.0;

/// Default diffusion sampler name.
pub const DEFAULT_SAMPLER: &str = "Euler";
/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 4.0;
/// Default number of denoising steps.
pub const DEFAULT_INFERENCE_STEPS: u32 = 50;
/// Seed value that asks the service to pick a random seed.
pub const RANDOM_SEED: i64 = -1;

/// Default checkpoint file name shown in the service UI.
pub const DEFAULT_CHECKPOINT_NAME: &str = "Qwen_Image_v1.safetensors";
/// Model version id of the default checkpoint.
pub const DEFAULT_CHECKPOINT_VERSION_ID: i64 = 275_167;
/// Model version id of the default LoRA adapter.
pub const DEFAULT_LORA_VERSION_ID: i64 = 313_167;

/// Upscaler model used when hires-fix is enabled.
pub const HIRES_UPSCALER_MODEL: &str = "Nomos 8k SCHATL 4x";
/// Upscale factor used when hires-fix is enabled.
pub const HIRES_SCALE: u32 = 4;

// ---------------------------------------------------------------------------
// Model references
// ---------------------------------------------------------------------------

/// Reference to a diffusion checkpoint by its service-side version id.
///
/// `display_name` is the human-readable file name the service echoes back in
/// its UI; the wire protocol requires both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRef {
    pub model_version_id: i64,
    pub display_name: String,
}

impl Default for CheckpointRef {
    fn default() -> Self {
        Self {
            model_version_id: DEFAULT_CHECKPOINT_VERSION_ID,
            display_name: DEFAULT_CHECKPOINT_NAME.to_string(),
        }
    }
}

/// Reference to a LoRA adapter with its blend scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraRef {
    pub model_version_id: i64,
    /// Blend weight in `[0, MAX_LORA_SCALE]`.
    pub scale: f64,
    /// Optional display name; the wire protocol accepts an empty string.
    pub display_name: Option<String>,
}

impl Default for LoraRef {
    fn default() -> Self {
        Self {
            model_version_id: DEFAULT_LORA_VERSION_ID,
            scale: 1.0,
            display_name: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation request
// ---------------------------------------------------------------------------

/// A complete text-to-image request, ready to be turned into a wire payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Positive prompt text. Must be non-empty after trimming.
    pub prompt: String,
    /// Negative prompt text. May be empty.
    pub negative_prompt: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Number of images to render in this task.
    pub num_images: u32,
    /// Diffusion sampler name.
    pub sampler: String,
    /// Classifier-free guidance scale.
    pub guidance_scale: f64,
    /// Number of denoising steps.
    pub num_inference_steps: u32,
    /// Seed, or [`RANDOM_SEED`] to let the service choose.
    pub seed: i64,
    /// Checkpoint to render with.
    pub checkpoint: CheckpointRef,
    /// LoRA adapters to blend in, in application order.
    pub loras: Vec<LoraRef>,
    /// Whether to run the hires-fix upscale pass.
    pub hires_fix: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            num_images: DEFAULT_IMAGES_PER_TASK,
            sampler: DEFAULT_SAMPLER.to_string(),
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            seed: RANDOM_SEED,
            checkpoint: CheckpointRef::default(),
            loras: vec![LoraRef::default()],
            hires_fix: true,
        }
    }
}

impl GenerationRequest {
    /// Build a request with the given prompt and all other fields defaulted.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Validate all bounds before submission.
    ///
    /// - Prompt must be non-empty after trimming.
    /// - Width and height must be positive and at most [`MAX_DIMENSION`].
    /// - `num_images` must be within `[MIN_IMAGES_PER_TASK, MAX_IMAGES_PER_TASK]`.
    /// - At most [`MAX_LORAS`] LoRA adapters, each with a scale in
    ///   `[0, MAX_LORA_SCALE]`.
    /// - Guidance scale and step count must be positive.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation(
                "Prompt must not be empty".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::Validation(
                "Width and height must be greater than 0".to_string(),
            ));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(CoreError::Validation(format!(
                "Dimensions must not exceed {MAX_DIMENSION}px (got {}x{})",
                self.width, self.height
            )));
        }
        if self.num_images < MIN_IMAGES_PER_TASK || self.num_images > MAX_IMAGES_PER_TASK {
            return Err(CoreError::Validation(format!(
                "num_images must be between {MIN_IMAGES_PER_TASK} and {MAX_IMAGES_PER_TASK} (got {})",
                self.num_images
            )));
        }
        if self.loras.len() > MAX_LORAS {
            return Err(CoreError::Validation(format!(
                "At most {MAX_LORAS} LoRA adapters are allowed (got {})",
                self.loras.len()
            )));
        }
        for lora in &self.loras {
            if !(0.0..=MAX_LORA_SCALE).contains(&lora.scale) {
                return Err(CoreError::Validation(format!(
                    "LoRA scale must be between 0 and {MAX_LORA_SCALE} (got {} for version {})",
                    lora.scale, lora.model_version_id
                )));
            }
        }
        if self.guidance_scale <= 0.0 {
            return Err(CoreError::Validation(
                "Guidance scale must be greater than 0".to_string(),
            ));
        }
        if self.num_inference_steps == 0 {
            return Err(CoreError::Validation(
                "num_inference_steps must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Generation result
// ---------------------------------------------------------------------------

/// Outcome of a successfully completed generation task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    /// Download URLs for the rendered images, in the order the service
    /// reported them.
    pub image_urls: Vec<String>,
    /// Final prompt as echoed back by the service, when it reports one.
    pub prompt: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
