use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod analytics;
mod camera;
mod config;
mod event;
mod handlers;
mod runner;

use analytics::MotionPipeline;
use config::Config;
use runner::{spawn_runner, Runner};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("argus=debug".parse()?))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run());

    // Handler tasks still in flight are abandoned, not drained.
    runtime.shutdown_background();

    result
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing::info!(
        device = %config.device_id,
        fps = config.fps,
        handlers = ?config.handlers,
        "starting"
    );

    let pipeline = MotionPipeline::new().annotate_snapshots(config.annotate_snapshots);
    let runner = Runner::init(config, pipeline, tokio::runtime::Handle::current())?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut handle = spawn_runner(runner, Arc::clone(&shutdown));

    tokio::select! {
        result = &mut handle => {
            if let Err(e) = result {
                tracing::error!("runner task failed: {}", e);
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    if let Err(e) = handle.await {
        tracing::error!("runner task failed: {}", e);
    }

    tracing::info!("shutdown complete");
    Ok(())
}
