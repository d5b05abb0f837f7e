/// Shader - compiled shader binary loaded into code memory

use std::path::Path;

use crate::device::device::Device;
use crate::device::mem_pool::{MemHandle, MemPool};
use crate::device::types::{ShaderKey, ShaderStage, SHADER_CODE_ALIGNMENT};
use crate::error::{Error, Result};

/// Shader whose code lives in a code memory pool
#[derive(Debug)]
pub struct Shader {
    device: Device,
    key: ShaderKey,
    stage: ShaderStage,
    code: Option<MemHandle>,
}

impl Shader {
    /// Load a compiled shader from the asset store
    ///
    /// A missing or unreadable file is reported to the device error sink
    /// as `AssetLoadFailed`.
    ///
    /// # Arguments
    ///
    /// * `device` - Device the shader is created on
    /// * `code_pool` - Code memory pool receiving the binary
    /// * `stage` - Pipeline stage of the shader
    /// * `path` - Path of the compiled binary
    pub fn load(device: &Device, code_pool: &MemPool, stage: ShaderStage, path: &Path) -> Result<Self> {
        let code = std::fs::read(path).map_err(|e| {
            Error::AssetLoadFailed(format!("shader '{}': {}", path.display(), e))
        });
        let code = device.check("Shader::load", code)?;
        crate::engine_debug!(
            "vgdemo::Shader",
            "Loaded {:?} shader '{}' ({} bytes)",
            stage,
            path.display(),
            code.len()
        );
        Self::from_code(device, code_pool, stage, &code)
    }

    /// Copy `code` into code memory and create the backend shader
    pub fn from_code(device: &Device, code_pool: &MemPool, stage: ShaderStage, code: &[u8]) -> Result<Self> {
        if code.is_empty() {
            return device.check(
                "Shader::load",
                Err(Error::AssetLoadFailed("shader binary is empty".to_string())),
            );
        }
        let memory = code_pool.allocate(code.len() as u64, SHADER_CODE_ALIGNMENT)?;
        memory.write(0, code)?;

        let (block, offset, size) = (memory.block(), memory.offset(), memory.size());
        let key = device.call("Shader::create", |backend| {
            backend.create_shader(stage, block, offset, size)
        })?;
        Ok(Self {
            device: device.clone(),
            key,
            stage,
            code: Some(memory),
        })
    }

    pub fn key(&self) -> ShaderKey {
        self.key
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        let key = self.key;
        let _ = self.device.call("Shader::destroy", |backend| backend.destroy_shader(key));
        if let Some(code) = self.code.take() {
            code.destroy();
        }
    }
}
