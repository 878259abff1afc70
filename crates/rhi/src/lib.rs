//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin RAII wrappers over `ash` for everything the triangle renderer
//! touches:
//! - Instance, adapter selection and logical device
//! - Surface queries, presentation planning and swapchain bundles
//! - Render pass, framebuffers and the graphics pipeline
//! - Command pools, command buffers and synchronization primitives
//! - Vertex layout and host-visible buffers

mod error;

pub mod buffer;
pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod presentation;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
