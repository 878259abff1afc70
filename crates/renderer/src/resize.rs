//! In-place rebuild of the presentation bundle.
//!
//! Runs when acquire or present reports a stale surface, or when the window
//! reports a new size. Only the bundle (swapchain, views, framebuffers) is
//! rebuilt: viewport and scissor are dynamic and command buffers are
//! re-recorded every frame anyway.

use tracing::{debug, info};

use trigon_platform::WindowEvents;

use crate::error::RendererResult;
use crate::frame_loop::FrameBackend;

/// Result of a rebuild attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// The bundle was rebuilt for a window of this size.
    Rebuilt { width: u32, height: u32 },
    /// The window was closed while minimized. Nothing was rebuilt.
    Abandoned,
}

#[derive(Debug, Default)]
pub struct ResizeHandler {
    rebuilds: u64,
}

impl ResizeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed rebuilds.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Waits out a zero-sized (minimized) window, drains the GPU, then
    /// rebuilds presentation for the current framebuffer size.
    pub fn handle(
        &mut self,
        backend: &mut impl FrameBackend,
        window: &mut impl WindowEvents,
    ) -> RendererResult<ResizeOutcome> {
        let (mut width, mut height) = window.framebuffer_size();

        while width == 0 || height == 0 {
            if window.close_requested() {
                debug!("Close requested while minimized, skipping rebuild");
                return Ok(ResizeOutcome::Abandoned);
            }
            window.wait_events();
            (width, height) = window.framebuffer_size();
        }

        // Nothing in flight may still reference the old bundle.
        backend.wait_idle()?;
        backend.rebuild_presentation(width, height)?;

        self.rebuilds += 1;
        info!("Presentation rebuilt for {}x{}", width, height);

        Ok(ResizeOutcome::Rebuilt { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, MockBackend, MockWindow};

    #[test]
    fn test_zero_size_blocks_until_restored() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(0, 0);
        // Three events later the window is restored.
        window.sizes_after_wait = vec![(0, 0), (0, 600), (640, 480)];

        let mut handler = ResizeHandler::new();
        let outcome = handler.handle(&mut backend, &mut window).unwrap();

        assert_eq!(
            outcome,
            ResizeOutcome::Rebuilt {
                width: 640,
                height: 480
            }
        );
        assert_eq!(window.waits, 3);
        assert_eq!(
            backend.calls,
            vec![Call::WaitIdle, Call::Rebuild(640, 480)]
        );
        assert_eq!(handler.rebuilds(), 1);
    }

    #[test]
    fn test_close_while_minimized_abandons() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(0, 0);
        window.close_after_waits = Some(2);
        window.sizes_after_wait = vec![(0, 0); 8];

        let mut handler = ResizeHandler::new();
        let outcome = handler.handle(&mut backend, &mut window).unwrap();

        assert_eq!(outcome, ResizeOutcome::Abandoned);
        assert_eq!(window.waits, 2);
        assert!(backend.calls.is_empty());
        assert_eq!(handler.rebuilds(), 0);
    }

    #[test]
    fn test_nonzero_size_rebuilds_immediately() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(1024, 768);

        let outcome = ResizeHandler::new()
            .handle(&mut backend, &mut window)
            .unwrap();

        assert_eq!(
            outcome,
            ResizeOutcome::Rebuilt {
                width: 1024,
                height: 768
            }
        );
        assert_eq!(window.waits, 0);
    }
}
