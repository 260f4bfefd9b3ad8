//! Prevalence raster API service.
//!
//! Loads the layer catalog, optionally preloads visible layers, and serves
//! the registry over HTTP.

use anyhow::Result;
use clap::Parser;
use std::{env, net::SocketAddr, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use raster_api::build_router;
use raster_api::config::ServiceConfig;
use raster_api::layer_catalog::LayerCatalog;
use raster_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "raster-api")]
#[command(about = "Prevalence raster layer service")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "RASTER_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Log level
    #[arg(long, env = "RASTER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Layer catalog file
    #[arg(long, env = "RASTER_CATALOG", default_value = "config/layers.yaml")]
    catalog: String,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    } else if let Ok(threads_str) = env::var("TOKIO_WORKER_THREADS") {
        if let Ok(threads) = threads_str.parse::<usize>() {
            runtime_builder.worker_threads(threads);
        }
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))?;
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    info!("Prometheus metrics exporter initialized");

    let config = ServiceConfig::from_env();
    info!(
        bounds_service = ?config.bounds_service_url,
        se_cache_capacity = config.se_cache_capacity,
        preload = config.preload,
        "Starting raster API server"
    );

    let state = Arc::new(AppState::new(config)?);

    let catalog = LayerCatalog::load_from_file(&args.catalog);
    let visible = state.declare_catalog(&catalog);
    if state.config.preload {
        info!(layers = visible.len(), "Preloading visible layers");
        state.spawn_loads(visible);
    }

    let app = build_router(state, Some(prometheus_handle));

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
