use std::sync::Arc;

use anyhow::{Context, Result};
use image::DynamicImage;
use sdturbo_core::{GenerationRequest, ModelLike};
use tokio::sync::Mutex;

/// Application state containing the preloaded pipeline.
///
/// Generations are serialized through `gate`: overlapping requests queue up
/// and the pipeline never runs twice at once.
#[derive(Clone)]
pub struct AppState {
    model: Arc<dyn ModelLike>,
    gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(model: Arc<dyn ModelLike>) -> Self {
        Self {
            model,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Runs the pipeline on a blocking worker so the reactor keeps serving
    /// health checks while a generation is in flight. Invalid requests fail
    /// before taking a turn.
    pub async fn generate(&self, request: GenerationRequest) -> Result<DynamicImage> {
        request.validate()?;
        let _turn = self.gate.lock().await;
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.run(request))
            .await
            .context("generation worker panicked")?
    }
}
