//! Submit-payload construction for the text-to-image endpoint.
//!
//! The endpoint has shipped with several payload readers over time and they
//! disagree about where the task type lives, so the marker is sent under
//! every key any of them has been seen to read (`taskType`, `type`,
//! `task_type`, and `modelArgs.predictType`).

use musegen_core::generation::{GenerationRequest, HIRES_SCALE, HIRES_UPSCALER_MODEL};
use serde_json::{json, Value};

/// Task type marker for text-to-image submissions.
pub const TASK_TYPE_TXT2IMG: &str = "TXT_2_IMG";

/// Build the submit payload for `request`.
///
/// `prompt_prefix` is prepended verbatim to the positive prompt (include any
/// trailing separator in the prefix itself); pass an empty string to submit
/// the prompt untouched.
pub fn build_submit_payload(request: &GenerationRequest, prompt_prefix: &str) -> Value {
    let lora_args: Vec<Value> = request
        .loras
        .iter()
        .map(|lora| {
            json!({
                "loraName": lora.display_name.clone().unwrap_or_default(),
                "modelVersionId": lora.model_version_id,
                "scale": lora.scale,
            })
        })
        .collect();

    // The endpoint expects an empty object, not null, when hires-fix is off.
    let hires_args = if request.hires_fix {
        json!({
            "modelName": HIRES_UPSCALER_MODEL,
            "scale": HIRES_SCALE,
        })
    } else {
        json!({})
    };

    json!({
        "taskType": TASK_TYPE_TXT2IMG,
        "type": TASK_TYPE_TXT2IMG,
        "task_type": TASK_TYPE_TXT2IMG,
        "modelArgs": {
            "checkpointModelVersionId": request.checkpoint.model_version_id,
            "checkpointShowInfo": request.checkpoint.display_name,
            "loraArgs": lora_args,
            "predictType": TASK_TYPE_TXT2IMG,
        },
        "promptArgs": {
            "prompt": format!("{prompt_prefix}{}", request.prompt),
            "negativePrompt": request.negative_prompt,
        },
        "basicDiffusionArgs": {
            "sampler": request.sampler,
            "guidanceScale": request.guidance_scale,
            "seed": request.seed,
            "numInferenceSteps": request.num_inference_steps,
            "numImagesPerPrompt": request.num_images,
            "width": request.width,
            "height": request.height,
        },
        "advanced": false,
        "addWaterMark": false,
        "adetailerArgsMap": {},
        "hiresFixFrontArgs": hires_args,
        "controlNetFullArgs": [],
    })
}
