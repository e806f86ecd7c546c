use anyhow::{Context, Result};
use clap::Parser;
use hf_hub::api::tokio::Api;
use sdturbo_core::{load_model, DeviceMap, LoadOptions};
use sdturbo_server::{build_router, AppState, OPTIONS_PATH, TXT2IMG_PATH};
use tokio::net::TcpListener;
use tracing::{error, info};

// Define command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "SDXL-Turbo image generation server (sdapi/v1)")]
struct Args {
    /// Use CPU instead of GPU
    #[arg(long, env = "SDTURBO_CPU")]
    cpu: bool,

    /// Accelerator ordinal to place the model on
    #[arg(long, env = "SDTURBO_DEVICE_ORDINAL", default_value_t = 0)]
    device_ordinal: usize,

    /// Hugging Face model id to serve
    #[arg(long, env = "SDTURBO_MODEL", default_value = "stabilityai/sdxl-turbo")]
    model: String,

    /// Host address to bind the server to
    #[arg(long, env = "SDTURBO_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the server to
    #[arg(long, env = "SDTURBO_PORT", default_value_t = 7860)]
    port: u16,

    /// Compute attention in slices of this size to lower peak memory
    #[arg(long, env = "SDTURBO_SLICED_ATTENTION_SIZE")]
    sliced_attention_size: Option<usize>,

    /// Use flash attention in the UNet (requires the `flash-attn` feature)
    #[arg(long, env = "SDTURBO_USE_FLASH_ATTN")]
    use_flash_attn: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
        return;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,sdturbo_server=debug,sdturbo_core=debug")
            }),
        )
        .compact()
        .init();

    let args = Args::parse();

    // The model is loaded before binding so no request ever sees a cold pipeline.
    let model = load_model(
        &args.model,
        Api::new().context("failed to create hf hub API")?,
        DeviceMap::new(args.cpu, args.device_ordinal),
        LoadOptions {
            sliced_attention_size: args.sliced_attention_size,
            use_flash_attn: args.use_flash_attn,
        },
    )
    .await
    .with_context(|| format!("failed to load model {}", args.model))?;
    info!(model = %args.model, "Model loaded");

    let app = build_router(AppState::new(model));

    let bind_address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    let local_addr = listener.local_addr()?;
    info!("Started server on http://{local_addr}");
    info!("  GET  {OPTIONS_PATH} - health check");
    info!("  POST {TXT2IMG_PATH} - generate image");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
