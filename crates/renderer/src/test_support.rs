//! Scripted stand-ins for the GPU backend and the window.

use std::collections::VecDeque;

use trigon_platform::WindowEvents;
use trigon_rhi::RhiResult;
use trigon_rhi::command::CommandEncoder;
use trigon_rhi::swapchain::{PresentationPlan, SwapchainSupportDetails};
use trigon_rhi::vk;

use crate::error::{RendererError, RendererResult};
use crate::frame_loop::{AcquireOutcome, FrameBackend, PresentOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Wait(usize),
    Acquire(usize),
    Reset(usize),
    Record(usize, u32),
    Submit(usize),
    Present(usize, u32),
    WaitIdle,
    Rebuild(u32, u32),
}

pub struct MockBackend {
    pub calls: Vec<Call>,
    /// Outcomes returned by successive acquires. Falls back to `Ready`.
    pub acquire_script: VecDeque<AcquireOutcome>,
    /// Outcomes returned by successive presents. Falls back to `Presented`.
    pub present_script: VecDeque<PresentOutcome>,
    pub support: SwapchainSupportDetails,
    pub extent: vk::Extent2D,
    /// Extent in effect at each `record`.
    pub recorded_extents: Vec<vk::Extent2D>,
    /// Fail the given call on its nth occurrence (1-based) with `ERROR_DEVICE_LOST`.
    pub fail_on: Option<(Call, usize)>,
    /// Per-slot fence, `true` when signaled.
    pub fences: Vec<bool>,
    /// Most fences ever unsignaled at once.
    pub max_unsignaled: usize,
    /// Resets issued while the slot's fence was still unsignaled.
    pub early_resets: usize,
    next_image: u32,
    image_count: u32,
}

impl MockBackend {
    pub fn new() -> Self {
        let support = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 16,
                    height: 16,
                },
                max_image_extent: vk::Extent2D {
                    width: 1920,
                    height: 1080,
                },
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        Self {
            calls: Vec::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            support,
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            recorded_extents: Vec::new(),
            fail_on: None,
            fences: Vec::new(),
            max_unsignaled: 0,
            early_resets: 0,
            next_image: 0,
            image_count: 3,
        }
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|&&c| c == call).count()
    }

    fn log(&mut self, call: Call) -> RendererResult<()> {
        self.calls.push(call);
        match self.fail_on {
            Some((target, nth)) if target == call && self.count(call) == nth => {
                Err(RendererError::submission(vk::Result::ERROR_DEVICE_LOST))
            }
            _ => Ok(()),
        }
    }

    fn fence(&mut self, slot: usize) -> &mut bool {
        if self.fences.len() <= slot {
            self.fences.resize(slot + 1, true);
        }
        &mut self.fences[slot]
    }
}

impl FrameBackend for MockBackend {
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.log(Call::Wait(slot))?;
        // Waiting lets the GPU finish the slot's last submission.
        *self.fence(slot) = true;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
        self.log(Call::Acquire(slot))?;
        Ok(self.acquire_script.pop_front().unwrap_or_else(|| {
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            }
        }))
    }

    fn reset_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.log(Call::Reset(slot))?;
        if !std::mem::replace(self.fence(slot), false) {
            self.early_resets += 1;
        }
        let unsignaled = self.fences.iter().filter(|&&signaled| !signaled).count();
        self.max_unsignaled = self.max_unsignaled.max(unsignaled);
        Ok(())
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
        self.log(Call::Record(slot, image_index))?;
        self.recorded_extents.push(self.extent);
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> RendererResult<()> {
        self.log(Call::Submit(slot))
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
        self.log(Call::Present(slot, image_index))?;
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&mut self) -> RendererResult<()> {
        self.log(Call::WaitIdle)?;
        self.fences.iter_mut().for_each(|signaled| *signaled = true);
        Ok(())
    }

    fn rebuild_presentation(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.log(Call::Rebuild(width, height))?;
        let plan = PresentationPlan::new(&self.support, 0, 0, width, height)?;
        self.extent = plan.extent;
        Ok(())
    }
}

pub struct MockWindow {
    pub size: (u32, u32),
    /// Sizes observed after successive `wait_events` calls.
    pub sizes_after_wait: Vec<(u32, u32)>,
    pub waits: usize,
    pub polls: usize,
    pub pending_resize: Option<(u32, u32)>,
    pub close: bool,
    /// Report a close request once this many waits have happened.
    pub close_after_waits: Option<usize>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            sizes_after_wait: Vec::new(),
            waits: 0,
            polls: 0,
            pending_resize: None,
            close: false,
            close_after_waits: None,
        }
    }

    /// Simulates the user resizing the window.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.pending_resize = Some((width, height));
    }
}

impl WindowEvents for MockWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        if !self.sizes_after_wait.is_empty() {
            self.size = self.sizes_after_wait.remove(0);
        }
    }

    fn take_resize(&mut self) -> Option<(u32, u32)> {
        self.pending_resize.take()
    }

    fn close_requested(&self) -> bool {
        self.close || self.close_after_waits.is_some_and(|n| self.waits >= n)
    }
}

/// Command observed by [`MockEncoder`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cmd {
    Begin,
    BeginRenderPass {
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear: [f32; 4],
    },
    BindPipeline(vk::Pipeline),
    Viewport {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    Scissor(vk::Rect2D),
    BindVertexBuffer(vk::Buffer),
    Draw(u32, u32, u32, u32),
    ClearRect(vk::Rect2D),
    EndRenderPass,
    End,
}

#[derive(Default)]
pub struct MockEncoder {
    pub cmds: Vec<Cmd>,
}

impl CommandEncoder for MockEncoder {
    fn begin(&mut self) -> RhiResult<()> {
        self.cmds.push(Cmd::Begin);
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        self.cmds.push(Cmd::BeginRenderPass {
            framebuffer,
            extent,
            clear: clear_color,
        });
    }

    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.cmds.push(Cmd::BindPipeline(pipeline));
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        // vk::Viewport has no PartialEq.
        self.cmds.push(Cmd::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        });
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        self.cmds.push(Cmd::Scissor(scissor));
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        self.cmds.push(Cmd::BindVertexBuffer(buffer));
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.cmds
            .push(Cmd::Draw(vertex_count, instance_count, first_vertex, first_instance));
    }

    fn clear_rect(&mut self, rect: vk::Rect2D, _color: [f32; 4]) {
        self.cmds.push(Cmd::ClearRect(rect));
    }

    fn end_render_pass(&mut self) {
        self.cmds.push(Cmd::EndRenderPass);
    }

    fn end(&mut self) -> RhiResult<()> {
        self.cmds.push(Cmd::End);
        Ok(())
    }

    fn handle(&self) -> vk::CommandBuffer {
        vk::CommandBuffer::null()
    }
}
