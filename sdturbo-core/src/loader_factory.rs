use anyhow::{anyhow, Result};
use hf_hub::api::tokio::Api;
use tracing::info;

use crate::{DeviceMap, LoadOptions, Loader, ModelLike, SdxlTurboLoader};
use std::sync::Arc;

/// Supported pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    SdxlTurbo,
}

impl ModelVariant {
    /// Detect model variant from a hub model id such as `stabilityai/sdxl-turbo`
    pub fn from_name(model_name: &str) -> Option<Self> {
        let name_upper = model_name.to_uppercase().replace('_', "-");

        if name_upper.contains("SDXL-TURBO") {
            Some(ModelVariant::SdxlTurbo)
        } else {
            None
        }
    }
}

/// Load a model based on its name, automatically detecting the appropriate loader
pub async fn load_model(
    model_name: &str,
    api: Api,
    device_map: DeviceMap,
    options: LoadOptions,
) -> Result<Arc<dyn ModelLike>> {
    let variant = ModelVariant::from_name(model_name)
        .ok_or_else(|| anyhow!("Unsupported model: {}", model_name))?;

    info!(model = model_name, ?variant, ?device_map, "loading model");

    match variant {
        ModelVariant::SdxlTurbo => {
            let model = SdxlTurboLoader::load(model_name, api, device_map, options).await?;
            Ok(Arc::new(model))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sdxl_turbo_ids() {
        assert_eq!(
            ModelVariant::from_name("stabilityai/sdxl-turbo"),
            Some(ModelVariant::SdxlTurbo)
        );
        assert_eq!(
            ModelVariant::from_name("local/SDXL_Turbo-finetune"),
            Some(ModelVariant::SdxlTurbo)
        );
    }

    #[test]
    fn rejects_other_models() {
        assert_eq!(ModelVariant::from_name("black-forest-labs/FLUX.1-schnell"), None);
        assert_eq!(ModelVariant::from_name("stabilityai/stable-diffusion-xl-base-1.0"), None);
    }

    #[tokio::test]
    async fn load_model_fails_fast_on_unknown_name() {
        let api = hf_hub::api::tokio::ApiBuilder::new().build().unwrap();
        let err = load_model("openai/dall-e", api, DeviceMap::ForceCpu, LoadOptions::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unsupported model"));
    }
}
