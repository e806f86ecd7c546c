use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_transformers::models::stable_diffusion::{
    schedulers::Scheduler, unet_2d::UNet2DConditionModel, vae::AutoEncoderKL,
    StableDiffusionConfig,
};
use hf_hub::api::tokio::{Api, ApiRepo};
use image::DynamicImage;
use text_encoder::TextEncoder;
use tracing::{debug, info, warn};

mod text_encoder;

use crate::{
    select_best_device, select_dtype, tensor_to_image, DeviceMap, GenerationRequest, LoadOptions,
    Loader, ModelLike,
};

const CLIP_TOKENIZER_REPO: &str = "openai/clip-vit-large-patch14";
const CLIP2_TOKENIZER_REPO: &str = "laion/CLIP-ViT-bigG-14-laion2B-39B-b160k";
// The stock SDXL VAE overflows in f16.
const FP16_VAE_REPO: &str = "madebyollin/sdxl-vae-fp16-fix";
const VAE_SCALE: f64 = 0.13025;
const LATENT_CHANNELS: usize = 4;

pub struct SdxlTurboModel {
    device: Device,
    dtype: DType,
    clip: TextEncoder,
    clip2: TextEncoder,
    unet: UNet2DConditionModel,
    vae: AutoEncoderKL,
}

impl SdxlTurboModel {
    /// Both CLIP towers concatenated on the hidden dim.
    fn encode_prompt(&self, prompt: &str) -> Result<Tensor> {
        let first = self.clip.encode(prompt, &self.device)?;
        let second = self.clip2.encode(prompt, &self.device)?;
        Ok(Tensor::cat(&[first, second], D::Minus1)?)
    }

    fn text_embeddings(&self, request: &GenerationRequest) -> Result<Tensor> {
        let cond = self.encode_prompt(&request.prompt)?;
        let embeddings = if request.uses_guidance() {
            let uncond = self.encode_prompt(&request.negative_prompt)?;
            Tensor::cat(&[uncond, cond], 0)?
        } else {
            if !request.negative_prompt.is_empty() {
                debug!("negative prompt ignored without guidance");
            }
            cond
        };
        Ok(embeddings.to_dtype(self.dtype)?)
    }
}

impl ModelLike for SdxlTurboModel {
    fn run(&self, request: GenerationRequest) -> Result<DynamicImage> {
        request.validate()?;
        let (width, height, steps) = (request.width, request.height, request.steps);
        let guided = request.uses_guidance();

        // candle can only seed accelerator RNGs; CPU runs stay unseeded.
        if let Some(seed) = request.seed {
            if let Err(e) = self.device.set_seed(seed) {
                warn!(seed, "failed to seed device rng: {e}");
            }
        }

        let text_embeddings = self.text_embeddings(&request)?;

        // Only the scheduler is taken from this config; weights were built at load time.
        let sd_config = StableDiffusionConfig::sdxl_turbo(None, Some(height), Some(width));
        let mut scheduler: Box<dyn Scheduler> = sd_config.build_scheduler(steps)?;
        let timesteps = scheduler.timesteps().to_vec();

        let latents = Tensor::randn(
            0f32,
            1f32,
            (1, LATENT_CHANNELS, height / 8, width / 8),
            &self.device,
        )?;
        let mut latents = (latents * scheduler.init_noise_sigma())?.to_dtype(self.dtype)?;

        for (index, &timestep) in timesteps.iter().enumerate() {
            let model_input = if guided {
                Tensor::cat(&[&latents, &latents], 0)?
            } else {
                latents.clone()
            };
            let model_input = scheduler.scale_model_input(model_input, timestep)?;
            let noise_pred = self
                .unet
                .forward(&model_input, timestep as f64, &text_embeddings)?;
            let noise_pred = if guided {
                let chunks = noise_pred.chunk(2, 0)?;
                let (uncond, cond) = (&chunks[0], &chunks[1]);
                (uncond + ((cond - uncond)? * request.guidance_scale)?)?
            } else {
                noise_pred
            };
            latents = scheduler.step(&noise_pred, timestep, &latents)?;
            debug!(step = index + 1, total = timesteps.len(), timestep, "denoised");
        }

        let decoded = self.vae.decode(&(&latents / VAE_SCALE)?)?;
        let image = ((decoded / 2.)? + 0.5)?.to_device(&Device::Cpu)?;
        let image = (image.clamp(0f32, 1f32)? * 255.)?.to_dtype(DType::U8)?;
        tensor_to_image(&image.i(0)?)
    }
}

async fn fetch(repo: &ApiRepo, file: &str) -> Result<PathBuf> {
    repo.get(file)
        .await
        .with_context(|| format!("failed to get {file}"))
}

pub struct SdxlTurboLoader;

impl Loader for SdxlTurboLoader {
    type Model = SdxlTurboModel;

    async fn load(
        model_id: &str,
        api: Api,
        device_map: DeviceMap,
        options: LoadOptions,
    ) -> Result<Self::Model> {
        let device = select_best_device(device_map).context("failed to set up device")?;
        let dtype = select_dtype(&device);
        let sd_config = StableDiffusionConfig::sdxl_turbo(options.sliced_attention_size, None, None);
        let variant = if dtype == DType::F16 { ".fp16" } else { "" };
        info!(?device, ?dtype, "loading SDXL-Turbo weights");

        let repo = api.model(model_id.to_string());

        // --- Text encoders ---
        let clip_weights = fetch(&repo, &format!("text_encoder/model{variant}.safetensors")).await?;
        let clip_tokenizer = fetch(&api.model(CLIP_TOKENIZER_REPO.to_string()), "tokenizer.json").await?;
        let clip = TextEncoder::load(&sd_config.clip, clip_weights, clip_tokenizer, &device)
            .context("failed to load first text encoder")?;

        let clip2_config = sd_config
            .clip2
            .as_ref()
            .ok_or_else(|| anyhow!("SDXL config is missing the second text encoder"))?;
        let clip2_weights =
            fetch(&repo, &format!("text_encoder_2/model{variant}.safetensors")).await?;
        let clip2_tokenizer =
            fetch(&api.model(CLIP2_TOKENIZER_REPO.to_string()), "tokenizer.json").await?;
        let clip2 = TextEncoder::load(clip2_config, clip2_weights, clip2_tokenizer, &device)
            .context("failed to load second text encoder")?;
        info!("text encoders loaded");

        // --- UNet ---
        let unet_weights = fetch(
            &repo,
            &format!("unet/diffusion_pytorch_model{variant}.safetensors"),
        )
        .await?;
        let unet = sd_config
            .build_unet(unet_weights, &device, LATENT_CHANNELS, options.use_flash_attn, dtype)
            .context("failed to load unet")?;
        info!("unet loaded");

        // --- Autoencoder ---
        let vae_weights = if dtype == DType::F16 {
            fetch(
                &api.model(FP16_VAE_REPO.to_string()),
                "diffusion_pytorch_model.safetensors",
            )
            .await?
        } else {
            fetch(&repo, "vae/diffusion_pytorch_model.safetensors").await?
        };
        let vae = sd_config
            .build_vae(vae_weights, &device, dtype)
            .context("failed to load autoencoder")?;
        info!("autoencoder loaded");

        Ok(SdxlTurboModel {
            device,
            dtype,
            clip,
            clip2,
            unet,
            vae,
        })
    }
}
