//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// The allocator mutex was poisoned by a panicking thread
    #[error("Allocator lock poisoned")]
    AllocatorPoisoned,

    /// No adapter passed the suitability checks
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A required instance or device extension is not supported
    #[error("Required extension not supported: {0}")]
    MissingExtension(String),

    /// A requested instance layer is not available
    #[error("Requested layer not available: {0}")]
    MissingLayer(String),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Pipeline configuration error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Invalid handle or argument
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
