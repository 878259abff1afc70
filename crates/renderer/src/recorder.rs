//! Per-frame command recording.

use trigon_rhi::command::CommandEncoder;
use trigon_rhi::vk;

use crate::error::{RendererError, RendererResult};
use crate::overlay::Overlay;

/// Vertices in the triangle.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// Everything one recording pass targets.
#[derive(Clone, Copy, Debug)]
pub struct RecordTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    /// Bound at binding 0 when present.
    pub vertex_buffer: Option<vk::Buffer>,
}

/// Records the triangle draw.
#[derive(Clone, Copy, Debug)]
pub struct CommandRecorder {
    clear_color: [f32; 4],
}

impl CommandRecorder {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self { clear_color }
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Records one full frame into `encoder`.
    ///
    /// The overlay, if any, records inside the render pass after the draw.
    pub fn record(
        &self,
        encoder: &mut impl CommandEncoder,
        target: &RecordTarget,
        overlay: Option<&mut dyn Overlay>,
    ) -> RendererResult<()> {
        encoder.begin().map_err(RendererError::Submission)?;

        encoder.begin_render_pass(
            target.render_pass,
            target.framebuffer,
            target.extent,
            self.clear_color,
        );
        encoder.bind_graphics_pipeline(target.pipeline);

        // Full-frame viewport and scissor, no letterboxing.
        encoder.set_viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: target.extent.width as f32,
            height: target.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        encoder.set_scissor(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        });

        if let Some(buffer) = target.vertex_buffer {
            encoder.bind_vertex_buffer(buffer);
        }

        encoder.draw(TRIANGLE_VERTEX_COUNT, 1, 0, 0);

        if let Some(overlay) = overlay {
            overlay.record(&mut *encoder, target.extent)?;
        }

        encoder.end_render_pass();
        encoder.end().map_err(RendererError::Submission)
    }
}
