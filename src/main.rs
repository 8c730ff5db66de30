mod config;
mod device;
mod dispatch;
mod engine;
mod error;
mod images;
mod locale;
mod presenter;
mod simulated;

use std::path::Path;
use std::process::ExitCode;

use device::DeviceManager;
use engine::{AcquisitionEngine, AcquisitionState};
use presenter::LogPresenter;
use simulated::SimulatedTransport;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scanner=debug".parse().unwrap()),
        )
        .init();

    tracing::info!("Starting scanner");

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{e}, using defaults");
            config::ScanConfig::default()
        }
    };

    let locale = locale::country_and_language(&config.locale_tag);
    let manager = DeviceManager::new(SimulatedTransport::demo(config.demo_pages), locale);
    let mut engine = AcquisitionEngine::new(manager, Box::new(LogPresenter));

    if engine.acquire(&config.request).is_err() {
        // already reported through the presenter
        engine.shutdown();
        return ExitCode::FAILURE;
    }

    if let Some(device) = engine.current_device() {
        tracing::info!(
            "Scanning with {} ({}, {}) via {:?}",
            device.product_name,
            device.manufacturer,
            device.product_family,
            engine.manager().version()
        );
    }

    tokio::select! {
        _ = engine.run_until_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            if engine.state() == AcquisitionState::Transferring {
                if let Err(e) = engine.cancel() {
                    tracing::warn!("{e}");
                }
            } else {
                engine.request_cancel();
            }
            engine.run_until_idle().await;
        }
    }
    engine.process_pending();
    if engine.cancel_requested() {
        tracing::info!("Acquisition cancelled, keeping {} page(s)", engine.images().len());
    }

    let status = save_pages(&mut engine, &config.output_dir);
    engine.shutdown();
    status
}

fn save_pages(engine: &mut AcquisitionEngine<SimulatedTransport>, output_dir: &Path) -> ExitCode {
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        tracing::error!("Cannot create {}: {e}", output_dir.display());
        return ExitCode::FAILURE;
    }

    let mut status = ExitCode::SUCCESS;
    for idx in 0..engine.images().len() {
        let Some(image) = engine.select_image(idx) else {
            break;
        };
        let path = output_dir.join(format!("page-{:03}.png", idx + 1));
        match image.save_png(&path) {
            Ok(()) => tracing::info!("Saved {}", path.display()),
            Err(e) => {
                tracing::error!("{e}");
                status = ExitCode::FAILURE;
            }
        }
    }
    if let Some(last) = engine.images().current() {
        tracing::debug!(
            "Last saved page acquired at {}",
            last.acquired_at.format("%H:%M:%S")
        );
    }

    if engine.clear_images() {
        tracing::debug!("Released page buffers");
    }
    status
}
