//! Engine configuration.
//!
//! [`EngineConfig`] carries window, validation, shader and clear-color
//! settings. Every field has a default; a subset can be overridden through
//! `TRIGON_*` environment variables.
//!
//! # Example
//!
//! ```no_run
//! use trigon_core::EngineConfig;
//!
//! # fn main() -> trigon_core::Result<()> {
//! let config = EngineConfig::from_env()?;
//! println!("{}x{} '{}'", config.width, config.height, config.title);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Window title override.
pub const ENV_TITLE: &str = "TRIGON_TITLE";
/// Initial window width override.
pub const ENV_WIDTH: &str = "TRIGON_WIDTH";
/// Initial window height override.
pub const ENV_HEIGHT: &str = "TRIGON_HEIGHT";
/// Validation layer toggle.
pub const ENV_VALIDATION: &str = "TRIGON_VALIDATION";
/// Background color, four comma-separated floats.
pub const ENV_CLEAR_COLOR: &str = "TRIGON_CLEAR_COLOR";
/// Directory holding compiled SPIR-V blobs.
pub const ENV_SHADER_DIR: &str = "TRIGON_SHADER_DIR";
/// Vertex buffer toggle.
pub const ENV_VERTEX_BUFFER: &str = "TRIGON_VERTEX_BUFFER";
/// Frame-time overlay toggle.
pub const ENV_OVERLAY: &str = "TRIGON_OVERLAY";

/// Runtime configuration for the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Window title.
    pub title: String,
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Enable the Khronos validation layer and debug messenger.
    pub enable_validation: bool,
    /// RGBA color the render pass clears to.
    pub clear_color: [f32; 4],
    /// Directory the shader library loads `<name>.spv` files from.
    pub shader_dir: PathBuf,
    /// Logical name of the vertex shader blob.
    pub vertex_shader: String,
    /// Logical name of the fragment shader blob.
    pub fragment_shader: String,
    /// Feed the triangle through a vertex buffer instead of hardcoded
    /// shader positions.
    pub use_vertex_buffer: bool,
    /// Draw the frame-time overlay.
    pub overlay: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Trigon".to_string(),
            width: 800,
            height: 600,
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shader_dir: PathBuf::from("shaders/spirv"),
            vertex_shader: "triangle.vert".to_string(),
            fragment_shader: "triangle.frag".to_string(),
            use_vertex_buffer: true,
            overlay: true,
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from defaults plus process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set to a malformed value or
    /// the resulting configuration fails [`EngineConfig::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults plus overrides supplied by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(title) = lookup(ENV_TITLE) {
            config.title = title;
        }
        if let Some(width) = parse_var(&lookup, ENV_WIDTH)? {
            config.width = width;
        }
        if let Some(height) = parse_var(&lookup, ENV_HEIGHT)? {
            config.height = height;
        }
        if let Some(raw) = lookup(ENV_VALIDATION) {
            config.enable_validation = parse_bool(ENV_VALIDATION, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CLEAR_COLOR) {
            config.clear_color = parse_color(ENV_CLEAR_COLOR, &raw)?;
        }
        if let Some(dir) = lookup(ENV_SHADER_DIR) {
            config.shader_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_VERTEX_BUFFER) {
            config.use_vertex_buffer = parse_bool(ENV_VERTEX_BUFFER, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OVERLAY) {
            config.overlay = parse_bool(ENV_OVERLAY, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can drive a renderer.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(Error::Config(format!(
                "clear color must be finite, got {:?}",
                self.clear_color
            )));
        }
        if self.vertex_shader.is_empty() || self.fragment_shader.is_empty() {
            return Err(Error::Config("shader names must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}"))),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(Error::Config(format!("{key}={raw:?}: expected a boolean"))),
    }
}

fn parse_color(key: &str, raw: &str) -> Result<[f32; 4]> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))?;

    <[f32; 4]>::try_from(parts.as_slice()).map_err(|_| {
        Error::Config(format!(
            "{key}={raw:?}: expected 4 components, got {}",
            parts.len()
        ))
    })
}
