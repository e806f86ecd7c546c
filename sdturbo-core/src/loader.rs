use std::future::Future;

use anyhow::Result;
use hf_hub::api::tokio::Api;

use crate::{DeviceMap, ModelLike};

/// Knobs that affect how weights are placed and executed, not what is generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub sliced_attention_size: Option<usize>,
    pub use_flash_attn: bool,
}

pub trait Loader {
    type Model: ModelLike;

    fn load(
        model_id: &str,
        api: Api,
        device_map: DeviceMap,
        options: LoadOptions,
    ) -> impl Future<Output = Result<Self::Model>>
    where
        Self: Sized;
}
