//! Wire types for the `/sdapi/v1` endpoints.

use sdturbo_core::GenerationRequest;
use serde::{Deserialize, Serialize};

/// SDXL-Turbo is distilled for 1-4 denoising steps.
pub const MAX_STEPS: usize = 4;

pub const DEFAULT_PROMPT: &str = "a beautiful landscape";
pub const DEFAULT_WIDTH: usize = 512;
pub const DEFAULT_HEIGHT: usize = 288;

/// Body of `POST /sdapi/v1/txt2img`. Unknown fields are ignored.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Txt2ImgRequest {
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub cfg_scale: f64,
    /// -1 (or any negative value) means unseeded. Seeds only take effect on
    /// accelerators; candle cannot seed the CPU generator.
    #[serde(default = "default_seed")]
    pub seed: i64,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_width() -> usize {
    DEFAULT_WIDTH
}

fn default_height() -> usize {
    DEFAULT_HEIGHT
}

fn default_steps() -> usize {
    MAX_STEPS
}

fn default_seed() -> i64 {
    -1
}

impl From<Txt2ImgRequest> for GenerationRequest {
    fn from(req: Txt2ImgRequest) -> Self {
        GenerationRequest {
            prompt: req.prompt,
            negative_prompt: req.negative_prompt,
            width: req.width,
            height: req.height,
            steps: req.steps.clamp(1, MAX_STEPS),
            guidance_scale: req.cfg_scale,
            seed: u64::try_from(req.seed).ok(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Txt2ImgResponse {
    pub images: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct OptionsResponse {
    pub status: String,
}

impl OptionsResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
