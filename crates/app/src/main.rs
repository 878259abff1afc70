//! Trigon: a Vulkan triangle with a resilient frame loop.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use trigon_core::{EngineConfig, Timer};
use trigon_platform::{WindowEvents, WindowHost};
use trigon_renderer::{
    FrameBackend, FrameLoop, MAX_FRAMES_IN_FLIGHT, Renderer, RendererResult,
};

fn run() -> Result<()> {
    let startup = Timer::new();

    let config = EngineConfig::from_env().context("Invalid configuration")?;
    debug!("Configuration: {:?}", config);

    let mut host = WindowHost::new(&config).context("Failed to create window")?;
    let mut renderer =
        Renderer::new(host.window(), &config).context("Failed to initialize renderer")?;

    info!(
        "Initialization complete in {:.1} ms on '{}', entering main loop",
        startup.elapsed_millis(),
        renderer.adapter_name()
    );

    let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);
    let outcome = run_frames(&mut frame_loop, &mut renderer, &mut host);

    info!(
        "Presented {} frames, {} presentation rebuilds",
        frame_loop.frames_presented(),
        frame_loop.rebuilds()
    );

    // GPU resources are released even when the loop failed.
    if let Err(e) = renderer.wait_idle() {
        error!("Failed to wait for device idle: {}", e);
    }
    drop(renderer);
    drop(host);

    outcome.context("Rendering failed")
}

/// Draws until the window asks to close. The first fatal frame error ends the
/// loop and is returned unlogged; `main` reports it.
fn run_frames(
    frame_loop: &mut FrameLoop,
    backend: &mut impl FrameBackend,
    window: &mut impl WindowEvents,
) -> RendererResult<()> {
    while !window.close_requested() {
        window.poll_events();

        if let Err(e) = frame_loop.draw_frame(backend, window) {
            debug!("Frame loop stopped after {} frames", frame_loop.frames_presented());
            return Err(e);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    trigon_core::init_logging();
    info!("Starting Trigon");

    let result = run();
    info!("Shutting down Trigon");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("trigon: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
