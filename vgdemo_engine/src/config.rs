/// Sample configuration
///
/// Every hardcoded knob of the sample lives here: resolutions per operation
/// mode, pool and command memory sizes, clear color and asset locations.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::vg::CreateFlags;

/// Environment variable overriding `SampleConfig::asset_dir`
pub const ASSET_DIR_ENV_VAR: &str = "VGDEMO_ASSET_DIR";

/// Environment variable overriding `SampleConfig::shader_dir`
pub const SHADER_DIR_ENV_VAR: &str = "VGDEMO_SHADER_DIR";

/// Configuration of the sample harness
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    /// Number of framebuffers (swapchain slots)
    pub framebuffer_count: usize,
    /// Framebuffer size in handheld mode
    pub handheld_size: (u32, u32),
    /// Framebuffer size in docked (console) mode
    pub docked_size: (u32, u32),
    /// Size the demo content is laid out for; scaled to the framebuffer width
    pub design_size: (u32, u32),
    /// Image memory pool block size
    pub image_pool_size: u64,
    /// Shader code memory pool block size
    pub code_pool_size: u64,
    /// Generic data memory pool block size
    pub data_pool_size: u64,
    /// Command memory backing the static command buffer
    pub static_cmd_size: u64,
    /// Command memory backing the vector-graphics command ring
    pub dynamic_cmd_size: u64,
    /// Framebuffer clear color (RGBA)
    pub clear_color: [f32; 4],
    /// Directory holding the compiled shaders
    pub shader_dir: PathBuf,
    /// Directory holding demo assets (images)
    pub asset_dir: PathBuf,
    /// Vector-graphics context flags
    pub vg_flags: CreateFlags,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            framebuffer_count: 2,
            handheld_size: (1280, 720),
            docked_size: (1920, 1080),
            design_size: (1280, 720),
            image_pool_size: 16 * 1024 * 1024,
            code_pool_size: 128 * 1024,
            data_pool_size: 1024 * 1024,
            static_cmd_size: 0x1000,
            dynamic_cmd_size: 0x20000,
            clear_color: [0.2, 0.3, 0.3, 1.0],
            shader_dir: PathBuf::from("assets/shaders"),
            asset_dir: PathBuf::from("assets"),
            vg_flags: CreateFlags::ANTIALIAS | CreateFlags::STENCIL_STROKES,
        }
    }
}

impl SampleConfig {
    /// Default configuration with asset and shader directories taken from
    /// `VGDEMO_ASSET_DIR` / `VGDEMO_SHADER_DIR` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(ASSET_DIR_ENV_VAR) {
            config.asset_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(SHADER_DIR_ENV_VAR) {
            config.shader_dir = PathBuf::from(dir);
        }
        config
    }

    /// Check the configuration for values the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.framebuffer_count == 0 {
            return Err(Error::InitializationFailed(
                "framebuffer_count must be at least 1".to_string(),
            ));
        }
        for (name, (width, height)) in [
            ("handheld_size", self.handheld_size),
            ("docked_size", self.docked_size),
            ("design_size", self.design_size),
        ] {
            if width == 0 || height == 0 {
                return Err(Error::InitializationFailed(format!(
                    "{} must be non-zero, got {}x{}",
                    name, width, height
                )));
            }
        }
        for (name, size) in [
            ("image_pool_size", self.image_pool_size),
            ("code_pool_size", self.code_pool_size),
            ("data_pool_size", self.data_pool_size),
            ("static_cmd_size", self.static_cmd_size),
            ("dynamic_cmd_size", self.dynamic_cmd_size),
        ] {
            if size == 0 {
                return Err(Error::InitializationFailed(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
