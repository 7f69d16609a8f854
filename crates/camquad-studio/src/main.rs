mod app;

use std::process::ExitCode;

use anyhow::{Context, Result};
use winit::dpi::LogicalSize;

use camquad_engine::device::GpuInit;
use camquad_engine::logging::{init_logging, LoggingConfig};
use camquad_engine::window::{Runtime, RuntimeConfig};
use camquad_video::{CameraSource, FrameSource, SourceKind, StudioConfig, TestPatternSource};

use app::StudioApp;

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = StudioConfig::from_env();

    // Dropping the source on any early return releases the device.
    let source = open_source(&config)?;

    log::info!("controls:");
    log::info!("  drag          move the video");
    log::info!("  R + drag      rotate");
    log::info!("  wheel         zoom");
    log::info!("  1 / 2 / 3     filter: none / pixelate / grayscale");
    log::info!("  C             toggle CPU / GPU processing");
    log::info!("  Space         reset transform");
    log::info!("  P             print stats");
    log::info!("  Esc           quit");

    let (width, height) = config.window_size;
    let runtime = RuntimeConfig {
        title: config.window_title.clone(),
        initial_size: LogicalSize::new(f64::from(width), f64::from(height)),
    };

    Runtime::run(runtime, GpuInit::default(), StudioApp::new(&config, source))
}

fn open_source(config: &StudioConfig) -> Result<Box<dyn FrameSource>> {
    let mut source: Box<dyn FrameSource> = match config.source {
        SourceKind::Camera => Box::new(CameraSource::new(config.camera.clone())),
        SourceKind::TestPattern => {
            Box::new(TestPatternSource::new(config.camera.width, config.camera.height))
        }
    };

    source
        .open()
        .with_context(|| format!("failed to open {}", source.describe()))?;
    Ok(source)
}
