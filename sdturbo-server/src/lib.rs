//! HTTP front-end exposing a single text2image pipeline through the
//! Stable Diffusion WebUI `/sdapi/v1` routes.

pub mod api;
pub mod codec;
pub mod error;
pub mod handlers;
pub mod state;

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;

pub use state::AppState;

pub const OPTIONS_PATH: &str = "/sdapi/v1/options";
pub const TXT2IMG_PATH: &str = "/sdapi/v1/txt2img";

/// Build the router with the CORS and tracing layers applied.
///
/// Unknown paths and unsupported methods on known paths both answer 404.
/// Every `OPTIONS` request is treated as a preflight and answered by the
/// CORS layer with 200 and an empty body.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Browsers only read these on preflights; sdapi clients expect them on
    // every response.
    let cors_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET,POST,OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type"),
        ))
        .layer(cors);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency_ms = latency.as_millis() as u64,
                status = res.status().as_u16(),
                "finished processing request"
            );
        });

    Router::new()
        .route(
            OPTIONS_PATH,
            get(handlers::options).fallback(handlers::not_found),
        )
        .route(
            TXT2IMG_PATH,
            post(handlers::txt2img).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors_headers)
        .layer(trace_layer)
}
