//! Renderer error taxonomy.
//!
//! Stale presentation (out-of-date or suboptimal surfaces) is not an error
//! here: it is reported through [`AcquireOutcome`](crate::frame_loop::AcquireOutcome)
//! and [`PresentOutcome`](crate::frame_loop::PresentOutcome) and recovered by
//! the resize handler.

use thiserror::Error;
use trigon_rhi::RhiError;

/// Errors that reach the application.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Instance, device or resource creation failed. Fatal at startup.
    #[error("Renderer setup failed: {0}")]
    Setup(#[from] RhiError),

    /// Shader bytecode is missing or malformed. Fatal at startup.
    #[error("Failed to load shader '{name}': {reason}")]
    ShaderLoad { name: String, reason: String },

    /// Recording, submission or presentation failed for a reason other than
    /// staleness. Ends the frame loop.
    #[error("Frame submission failed: {0}")]
    Submission(#[source] RhiError),

    /// Window or surface error from the platform layer.
    #[error("Platform error: {0}")]
    Platform(#[from] trigon_core::Error),
}

impl RendererError {
    /// Wraps a per-frame Vulkan failure.
    pub fn submission(error: impl Into<RhiError>) -> Self {
        Self::Submission(error.into())
    }
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = Result<T, RendererError>;
