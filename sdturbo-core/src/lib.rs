pub mod device_map;
pub mod loader;
mod loader_factory;
mod sdxl_turbo;
mod util;

pub use device_map::*;
use image::DynamicImage;
pub use loader::*;
pub use loader_factory::*;
pub use sdxl_turbo::{SdxlTurboLoader, SdxlTurboModel};
use serde::{Deserialize, Serialize};
pub use util::*;

/// Largest accepted width or height. Bigger latents exhaust memory, and a
/// failed allocation aborts the process instead of returning an error.
pub const MAX_SIDE: usize = 2048;

/// Fully resolved generation parameters handed to a pipeline.
///
/// Defaults and clamping happen at the protocol edge; by the time a request
/// gets here every field is concrete.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, PartialOrd)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: usize,
    pub height: usize,
    pub steps: usize,
    /// Classifier-free guidance is only applied above 1.0.
    pub guidance_scale: f64,
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn uses_guidance(&self) -> bool {
        self.guidance_scale > 1.0
    }

    /// Checks the request before any tensor is allocated.
    pub fn validate(&self) -> anyhow::Result<()> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 || width % 8 != 0 || height % 8 != 0 {
            anyhow::bail!("width and height must be non-zero multiples of 8, got {width}x{height}");
        }
        if width > MAX_SIDE || height > MAX_SIDE {
            anyhow::bail!("width and height must be at most {MAX_SIDE}, got {width}x{height}");
        }
        if self.steps == 0 {
            anyhow::bail!("steps must be at least 1");
        }
        Ok(())
    }
}

pub trait ModelLike: Send + Sync {
    fn run(&self, request: GenerationRequest) -> anyhow::Result<DynamicImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(width: usize, height: usize) -> GenerationRequest {
        GenerationRequest {
            width,
            height,
            ..request(0.0)
        }
    }

    fn request(guidance_scale: f64) -> GenerationRequest {
        GenerationRequest {
            prompt: "a lighthouse".to_string(),
            negative_prompt: String::new(),
            width: 512,
            height: 288,
            steps: 4,
            guidance_scale,
            seed: None,
        }
    }

    #[test]
    fn guidance_disabled_at_or_below_one() {
        assert!(!request(0.0).uses_guidance());
        assert!(!request(1.0).uses_guidance());
        assert!(request(1.5).uses_guidance());
    }

    #[test]
    fn validate_accepts_multiples_of_eight_up_to_max_side() {
        assert!(sized(8, 8).validate().is_ok());
        assert!(sized(512, 288).validate().is_ok());
        assert!(sized(MAX_SIDE, MAX_SIDE).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_and_unaligned_sizes() {
        assert!(sized(0, 288).validate().is_err());
        assert!(sized(512, 0).validate().is_err());
        let err = sized(513, 288).validate().unwrap_err();
        assert!(err.to_string().contains("multiples of 8"));
    }

    #[test]
    fn validate_rejects_oversized_requests() {
        assert!(sized(MAX_SIDE + 8, 288).validate().is_err());
        let err = sized(1 << 31, 1 << 31).validate().unwrap_err();
        assert!(err.to_string().contains("at most 2048"));
    }

    #[test]
    fn validate_rejects_zero_steps() {
        let req = GenerationRequest {
            steps: 0,
            ..request(0.0)
        };
        assert!(req.validate().is_err());
    }
}
