//! Triangle renderer.
//!
//! This crate ties the RHI wrappers into a running frame loop:
//! - [`DeviceContext`]: instance, surface, adapter and device
//! - [`FrameLoop`] over a [`FrameBackend`]: the per-frame state machine
//! - [`ResizeHandler`]: in-place presentation rebuilds
//! - [`CommandRecorder`] and the [`Overlay`] hook
//! - [`Renderer`]: the Vulkan implementation of [`FrameBackend`]

pub mod context;
pub mod error;
pub mod frame_loop;
pub mod frame_manager;
pub mod overlay;
pub mod recorder;
pub mod renderer;
pub mod resize;
pub mod shader_library;

#[cfg(test)]
mod test_support;

pub use context::DeviceContext;
pub use error::{RendererError, RendererResult};
pub use frame_loop::{FrameBackend, FrameLoop, FrameStatus};
pub use overlay::{FrameTimeOverlay, Overlay};
pub use recorder::CommandRecorder;
pub use renderer::Renderer;
pub use resize::{ResizeHandler, ResizeOutcome};
pub use shader_library::ShaderLibrary;

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
