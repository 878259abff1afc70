//! Overlay hook and the built-in frame-time bar.
//!
//! An [`Overlay`] gets the frame's encoder after the triangle draw, while the
//! render pass is still open. It may add commands but must not begin or end
//! render passes of its own.

use trigon_core::Timer;
use trigon_rhi::command::CommandEncoder;
use trigon_rhi::vk;

use crate::error::RendererResult;

/// Contributes extra commands to a frame.
pub trait Overlay {
    fn record(&mut self, encoder: &mut dyn CommandEncoder, extent: vk::Extent2D)
    -> RendererResult<()>;
}

/// Frame time that fills a quarter of the window width.
const REFERENCE_FRAME_MS: f32 = 16.7;
const REFERENCE_FRACTION: f32 = 0.25;
/// Weight of the newest sample in the moving average.
const SMOOTHING: f32 = 0.1;
const BAR_HEIGHT: u32 = 6;
const BAR_COLOR: [f32; 4] = [0.9, 0.8, 0.1, 1.0];

/// Draws a bar in the top-left corner proportional to the smoothed frame
/// time. Uses attachment clears, so it needs no pipeline of its own.
pub struct FrameTimeOverlay {
    timer: Timer,
    smoothed_ms: Option<f32>,
}

impl Default for FrameTimeOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimeOverlay {
    pub fn new() -> Self {
        Self {
            timer: Timer::new(),
            smoothed_ms: None,
        }
    }

    /// Current smoothed frame time in milliseconds.
    pub fn frame_time_ms(&self) -> Option<f32> {
        self.smoothed_ms
    }

    fn sample(&mut self, frame_ms: f32) -> f32 {
        let smoothed = match self.smoothed_ms {
            Some(previous) => previous + (frame_ms - previous) * SMOOTHING,
            None => frame_ms,
        };
        self.smoothed_ms = Some(smoothed);
        smoothed
    }
}

/// Bar width in pixels for a frame time, capped at the full width.
pub fn bar_width(frame_ms: f32, width: u32) -> u32 {
    let fraction = (frame_ms / REFERENCE_FRAME_MS * REFERENCE_FRACTION).clamp(0.0, 1.0);
    (width as f32 * fraction).round() as u32
}

impl Overlay for FrameTimeOverlay {
    fn record(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        extent: vk::Extent2D,
    ) -> RendererResult<()> {
        let frame_ms = self.timer.tick().as_secs_f32() * 1000.0;
        let smoothed = self.sample(frame_ms);

        let width = bar_width(smoothed, extent.width);
        if width == 0 || extent.height == 0 {
            return Ok(());
        }

        let rect = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width,
                height: BAR_HEIGHT.min(extent.height),
            },
        };
        encoder.clear_rect(rect, BAR_COLOR);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Cmd, MockEncoder};

    #[test]
    fn test_bar_width_scale() {
        assert_eq!(bar_width(16.7, 800), 200);
        assert_eq!(bar_width(33.4, 800), 400);
        assert_eq!(bar_width(0.0, 800), 0);
    }

    #[test]
    fn test_bar_width_capped() {
        assert_eq!(bar_width(1000.0, 800), 800);
    }

    #[test]
    fn test_smoothing_moves_towards_samples() {
        let mut overlay = FrameTimeOverlay::new();
        assert_eq!(overlay.sample(20.0), 20.0);
        let next = overlay.sample(10.0);
        assert!(next < 20.0 && next > 10.0);
        assert_eq!(overlay.frame_time_ms(), Some(next));
    }

    #[test]
    fn test_records_only_clears() {
        let mut overlay = FrameTimeOverlay::new();
        overlay.smoothed_ms = Some(16.7);
        let mut encoder = MockEncoder::default();

        overlay
            .record(
                &mut encoder,
                vk::Extent2D {
                    width: 800,
                    height: 600,
                },
            )
            .unwrap();

        assert!(encoder.cmds.len() <= 1);
        assert!(encoder.cmds.iter().all(|c| matches!(c, Cmd::ClearRect(_))));
    }
}
