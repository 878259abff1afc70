//! SPIR-V loading by logical shader name.
//!
//! The blobs are build artifacts: `shaders/compile.sh` compiles the GLSL
//! sources into `shaders/spirv/`, the default `shader_dir`. Until it has run,
//! startup fails with [`RendererError::ShaderLoad`].

use std::path::{Path, PathBuf};

use tracing::debug;

use trigon_rhi::shader::decode_spirv;

use crate::error::{RendererError, RendererResult};

/// Resolves `<root>/<name>.spv` and checks it looks like SPIR-V.
#[derive(Clone, Debug)]
pub struct ShaderLibrary {
    root: PathBuf,
}

impl ShaderLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.spv", name))
    }

    /// Reads the blob for `name`.
    ///
    /// # Errors
    ///
    /// [`RendererError::ShaderLoad`] if the file cannot be read, is empty, is
    /// not a whole number of words or lacks the SPIR-V magic number.
    pub fn load(&self, name: &str) -> RendererResult<Vec<u8>> {
        let path = self.path_for(name);

        let bytes = std::fs::read(&path).map_err(|e| {
            let hint = if e.kind() == std::io::ErrorKind::NotFound {
                " (run shaders/compile.sh to build the SPIR-V)"
            } else {
                ""
            };
            RendererError::ShaderLoad {
                name: name.to_string(),
                reason: format!("{}: {}{}", path.display(), e, hint),
            }
        })?;

        decode_spirv(&bytes).map_err(|e| RendererError::ShaderLoad {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        debug!("Loaded shader '{}' ({} bytes)", name, bytes.len());

        Ok(bytes)
    }
}
