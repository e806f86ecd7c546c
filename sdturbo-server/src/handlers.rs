use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
};
use sdturbo_core::GenerationRequest;
use tracing::info;

use crate::{
    api::{OptionsResponse, Txt2ImgRequest, Txt2ImgResponse},
    codec::image_to_base64_png,
    error::ApiError,
    state::AppState,
};

/// Health check. Answers regardless of what the pipeline is doing.
pub async fn options() -> Json<OptionsResponse> {
    Json(OptionsResponse::ok())
}

pub async fn txt2img(
    State(state): State<AppState>,
    payload: Result<Json<Txt2ImgRequest>, JsonRejection>,
) -> Result<Json<Txt2ImgResponse>, ApiError> {
    let Json(req) = payload?;
    let request = GenerationRequest::from(req);
    info!(
        prompt = %request.prompt,
        width = request.width,
        height = request.height,
        steps = request.steps,
        "generating image"
    );

    let started = Instant::now();
    let image = state.generate(request).await?;
    let encoded = image_to_base64_png(&image)?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "image generated");

    Ok(Json(Txt2ImgResponse {
        images: vec![encoded],
    }))
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
