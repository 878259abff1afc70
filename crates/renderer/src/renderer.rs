//! The Vulkan-backed renderer.
//!
//! [`Renderer`] owns every GPU object the triangle needs and implements
//! [`FrameBackend`] so [`FrameLoop`](crate::frame_loop::FrameLoop) can drive
//! it.
//!
//! # Resource Destruction Order
//!
//! 1. Wait for the device to go idle
//! 2. Frame slots (command buffers, semaphores, fences)
//! 3. Command pool
//! 4. Vertex buffer
//! 5. Pipeline, then its layout
//! 6. Presentation bundle (framebuffers, views, swapchain)
//! 7. Render pass
//! 8. Device context (device, surface, instance)

use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::{debug, error, info};

use trigon_core::EngineConfig;
use trigon_platform::Window;
use trigon_rhi::buffer::Buffer;
use trigon_rhi::command::CommandPool;
use trigon_rhi::device::Device;
use trigon_rhi::pipeline::{CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use trigon_rhi::presentation::PresentationBundle;
use trigon_rhi::render_pass::RenderPass;
use trigon_rhi::shader::{Shader, ShaderStage};
use trigon_rhi::swapchain::PresentationPlan;
use trigon_rhi::vertex::{TRIANGLE_VERTICES, Vertex};
use trigon_rhi::{RhiError, RhiResult, vk};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::context::DeviceContext;
use crate::error::{RendererError, RendererResult};
use crate::frame_loop::{AcquireOutcome, FrameBackend, PresentOutcome};
use crate::frame_manager::{FrameManager, FrameSlot};
use crate::overlay::{FrameTimeOverlay, Overlay};
use crate::recorder::{CommandRecorder, RecordTarget};
use crate::shader_library::ShaderLibrary;

/// Vertex shader used when positions come from the shader itself.
pub const FIXED_VERTEX_SHADER: &str = "triangle_fixed.vert";

/// Main renderer that owns all Vulkan resources.
pub struct Renderer {
    frames: ManuallyDrop<FrameManager>,
    command_pool: ManuallyDrop<CommandPool>,
    vertex_buffer: ManuallyDrop<Option<Buffer>>,
    pipeline: ManuallyDrop<Pipeline>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    bundle: ManuallyDrop<PresentationBundle>,
    render_pass: ManuallyDrop<RenderPass>,
    context: ManuallyDrop<DeviceContext>,

    recorder: CommandRecorder,
    overlay: Option<FrameTimeOverlay>,
    /// Kept for pipeline rebuilds after a surface format change.
    vertex_spirv: Vec<u8>,
    fragment_spirv: Vec<u8>,
}

impl Renderer {
    /// Creates the renderer for `window`.
    ///
    /// Shaders are loaded before any GPU object is created, so a missing
    /// blob fails fast.
    ///
    /// # Errors
    ///
    /// [`RendererError::ShaderLoad`] for bad shader blobs,
    /// [`RendererError::Setup`] or [`RendererError::Platform`] if any part of
    /// the Vulkan setup fails.
    pub fn new(window: &Window, config: &EngineConfig) -> RendererResult<Self> {
        let (width, height) = window.size();
        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let library = ShaderLibrary::new(&config.shader_dir);
        let vertex_name = if config.use_vertex_buffer {
            config.vertex_shader.as_str()
        } else {
            FIXED_VERTEX_SHADER
        };
        let vertex_spirv = library.load(vertex_name)?;
        let fragment_spirv = library.load(&config.fragment_shader)?;

        let context = DeviceContext::create(window, config.enable_validation)?;
        let device = context.device().clone();

        let support = context.query_surface_support()?;
        let plan = PresentationPlan::new(
            &support,
            context.adapter().graphics_family(),
            context.adapter().present_family(),
            width,
            height,
        )?;

        let render_pass = RenderPass::new_color(device.clone(), plan.surface_format.format)?;
        let bundle = PresentationBundle::create(
            context.instance(),
            device.clone(),
            context.surface().handle(),
            &plan,
            &render_pass,
            None,
        )?;

        let pipeline_layout = PipelineLayout::empty(device.clone())?;
        let pipeline = Self::create_pipeline(
            device.clone(),
            &render_pass,
            &pipeline_layout,
            &vertex_spirv,
            &fragment_spirv,
            config.use_vertex_buffer,
        )?;

        let vertex_buffer = if config.use_vertex_buffer {
            Some(Buffer::with_data(
                device.clone(),
                vk::BufferUsageFlags::VERTEX_BUFFER,
                bytemuck::cast_slice(&TRIANGLE_VERTICES),
                "triangle vertices",
            )?)
        } else {
            None
        };

        let command_pool = CommandPool::new(device.clone(), context.adapter().graphics_family())?;
        let frames = FrameManager::new(device, &command_pool, MAX_FRAMES_IN_FLIGHT)?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, vertex buffer {}, overlay {}",
            bundle.image_count(),
            MAX_FRAMES_IN_FLIGHT,
            if vertex_buffer.is_some() { "on" } else { "off" },
            if config.overlay { "on" } else { "off" }
        );

        Ok(Self {
            frames: ManuallyDrop::new(frames),
            command_pool: ManuallyDrop::new(command_pool),
            vertex_buffer: ManuallyDrop::new(vertex_buffer),
            pipeline: ManuallyDrop::new(pipeline),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            bundle: ManuallyDrop::new(bundle),
            render_pass: ManuallyDrop::new(render_pass),
            context: ManuallyDrop::new(context),
            recorder: CommandRecorder::new(config.clear_color),
            overlay: config.overlay.then(FrameTimeOverlay::new),
            vertex_spirv,
            fragment_spirv,
        })
    }

    /// Builds the triangle pipeline. The shader modules are dropped on
    /// return whether or not creation succeeded.
    fn create_pipeline(
        device: Arc<Device>,
        render_pass: &RenderPass,
        layout: &PipelineLayout,
        vertex_spirv: &[u8],
        fragment_spirv: &[u8],
        with_vertex_input: bool,
    ) -> RhiResult<Pipeline> {
        let vertex_shader = Shader::from_spirv_bytes(device.clone(), vertex_spirv, ShaderStage::Vertex)?;
        let fragment_shader =
            Shader::from_spirv_bytes(device.clone(), fragment_spirv, ShaderStage::Fragment)?;

        let mut builder = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .cull_mode(CullMode::Back)
            .front_face(FrontFace::Clockwise)
            .render_pass(render_pass.handle(), 0);

        if with_vertex_input {
            builder = builder
                .vertex_binding(Vertex::binding_description())
                .vertex_attributes(&Vertex::attribute_descriptions());
        }

        builder.build(device, layout)
    }

    fn device(&self) -> &Arc<Device> {
        self.context.device()
    }

    fn slot(&self, index: usize) -> RendererResult<&FrameSlot> {
        self.frames.slot(index).ok_or_else(|| missing_slot(index))
    }

    /// Name of the adapter in use.
    pub fn adapter_name(&self) -> &str {
        self.context.adapter().device_name()
    }

    /// Current presentation extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.bundle.extent()
    }

    /// Current presentation format.
    pub fn format(&self) -> vk::Format {
        self.bundle.format()
    }

    /// Blocks until the GPU is idle. Call before tearing down.
    pub fn wait_idle(&self) -> RendererResult<()> {
        self.device().wait_idle().map_err(RendererError::Submission)
    }
}

fn missing_slot(index: usize) -> RendererError {
    RendererError::Submission(RhiError::InvalidHandle(format!(
        "Frame slot {} does not exist",
        index
    )))
}

impl FrameBackend for Renderer {
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.slot(slot)?
            .sync
            .in_flight()
            .wait(u64::MAX)
            .map_err(RendererError::Submission)
    }

    fn acquire_image(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.sync.image_available().handle();

        match self.bundle.acquire_next_image(semaphore) {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(RendererError::submission(e)),
        }
    }

    fn reset_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.slot(slot)?
            .sync
            .in_flight()
            .reset()
            .map_err(RendererError::Submission)
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
        let framebuffer = self.bundle.framebuffer(image_index).ok_or_else(|| {
            RendererError::Submission(RhiError::InvalidHandle(format!(
                "No framebuffer for swapchain image {}",
                image_index
            )))
        })?;

        let target = RecordTarget {
            render_pass: self.render_pass.handle(),
            framebuffer,
            extent: self.bundle.extent(),
            pipeline: self.pipeline.handle(),
            vertex_buffer: self.vertex_buffer.as_ref().map(Buffer::handle),
        };

        let frame = self.frames.slot_mut(slot).ok_or_else(|| missing_slot(slot))?;
        frame
            .command_buffer
            .reset()
            .map_err(RendererError::Submission)?;

        let overlay = self.overlay.as_mut().map(|o| o as &mut dyn Overlay);
        self.recorder
            .record(&mut frame.command_buffer, &target, overlay)
    }

    fn submit(&mut self, slot: usize) -> RendererResult<()> {
        let frame = self.slot(slot)?;

        let wait_semaphores = [frame.sync.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.sync.render_finished().handle()];
        let command_buffers = [frame.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer was just recorded and the slot's fence was reset
        // after its previous submission completed.
        unsafe {
            self.device()
                .submit_graphics(&[submit_info], frame.sync.in_flight().handle())
                .map_err(RendererError::Submission)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
        let wait = self.slot(slot)?.sync.render_finished().handle();

        match self
            .bundle
            .present(self.device().present_queue(), image_index, wait)
        {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(RendererError::submission(e)),
        }
    }

    fn wait_idle(&mut self) -> RendererResult<()> {
        Renderer::wait_idle(self)
    }

    fn rebuild_presentation(&mut self, width: u32, height: u32) -> RendererResult<()> {
        let support = self.context.query_surface_support()?;
        let adapter = self.context.adapter();
        let plan = PresentationPlan::new(
            &support,
            adapter.graphics_family(),
            adapter.present_family(),
            width,
            height,
        )?;

        let device = self.device().clone();

        // A new format invalidates the render pass and everything built
        // against it.
        let replacement = if plan.surface_format.format != self.render_pass.format() {
            info!(
                "Surface format changed {:?} -> {:?}, rebuilding render pass and pipeline",
                self.render_pass.format(),
                plan.surface_format.format
            );
            let render_pass = RenderPass::new_color(device.clone(), plan.surface_format.format)?;
            let pipeline = Self::create_pipeline(
                device.clone(),
                &render_pass,
                &self.pipeline_layout,
                &self.vertex_spirv,
                &self.fragment_spirv,
                self.vertex_buffer.is_some(),
            )?;
            Some((render_pass, pipeline))
        } else {
            None
        };

        let bundle = PresentationBundle::create(
            self.context.instance(),
            device,
            self.context.surface().handle(),
            &plan,
            replacement
                .as_ref()
                .map_or(&*self.render_pass, |(render_pass, _)| render_pass),
            Some(&*self.bundle),
        )?;

        // The old bundle goes first: its framebuffers reference the old
        // render pass.
        drop(std::mem::replace(&mut *self.bundle, bundle));

        if let Some((render_pass, pipeline)) = replacement {
            drop(std::mem::replace(&mut *self.pipeline, pipeline));
            drop(std::mem::replace(&mut *self.render_pass, render_pass));
        }

        debug!(
            "Presentation bundle now {}x{} with {} images",
            self.bundle.extent().width,
            self.bundle.extent().height,
            self.bundle.image_count()
        );

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device().wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }

        // SAFETY: each field is dropped exactly once, children before the
        // objects they were created from.
        unsafe {
            ManuallyDrop::drop(&mut self.frames);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.vertex_buffer);
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.bundle);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.context);
        }

        info!("Renderer destroyed");
    }
}
