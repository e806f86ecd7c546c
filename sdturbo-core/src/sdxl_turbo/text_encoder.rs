use std::path::Path;

use anyhow::{anyhow, Context, Error, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::Module;
use candle_transformers::models::stable_diffusion::{self, clip};
use tokenizers::Tokenizer;
use tracing::warn;

/// One CLIP tower and its tokenizer. SDXL conditions on two of these.
pub struct TextEncoder {
    tokenizer: Tokenizer,
    model: clip::ClipTextTransformer,
    pad_id: u32,
    max_len: usize,
}

impl TextEncoder {
    pub fn load(
        config: &clip::Config,
        weights: impl AsRef<Path>,
        tokenizer: impl AsRef<Path>,
        device: &Device,
    ) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer)
            .map_err(Error::msg)
            .context("failed to load CLIP tokenizer")?;
        let pad_token = config.pad_with.as_deref().unwrap_or("<|endoftext|>");
        let pad_id = tokenizer
            .get_vocab(true)
            .get(pad_token)
            .copied()
            .ok_or_else(|| anyhow!("pad token {pad_token:?} missing from tokenizer vocab"))?;
        // The text towers stay in f32; embeddings are cast to the pipeline dtype after.
        let model = stable_diffusion::build_clip_transformer(config, weights, device, DType::F32)
            .context("failed to load CLIP model")?;
        Ok(Self {
            tokenizer,
            model,
            pad_id,
            max_len: config.max_position_embeddings,
        })
    }

    /// Returns hidden states of shape (1, max_len, hidden).
    pub fn encode(&self, prompt: &str, device: &Device) -> Result<Tensor> {
        let mut tokens = self
            .tokenizer
            .encode(prompt, true)
            .map_err(Error::msg)?
            .get_ids()
            .to_vec();
        if tokens.len() > self.max_len {
            warn!(
                tokens = tokens.len(),
                max = self.max_len,
                "prompt is too long, truncating"
            );
            tokens.truncate(self.max_len);
        }
        tokens.resize(self.max_len, self.pad_id);
        let input_ids = Tensor::new(tokens.as_slice(), device)?.unsqueeze(0)?;
        Ok(self.model.forward(&input_ids)?)
    }
}
