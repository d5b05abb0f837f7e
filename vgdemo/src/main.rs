//! vgdemo - vector-graphics sample on the Vulkan backend
//!
//! Keys: `+` or Escape quits, `-` held exaggerates the drawing, `D` toggles
//! between handheld and docked resolution.
//!
//! `VGDEMO_LOG` sets the log level, `VGDEMO_ASSET_DIR` and
//! `VGDEMO_SHADER_DIR` override the asset locations.
//!
//! The SPIR-V shaders are not checked in: run `assets/shaders/compile.sh`
//! (needs `glslc` on the PATH) once to produce `fill_vsh.spv`,
//! `fill_fsh.spv` and `fill_aa_fsh.spv` next to their GLSL sources.
//! Without them startup fails with an asset load error.

mod demo;
mod host;

use std::process::ExitCode;

use vgdemo_engine::engine_error;
use vgdemo_engine::sample::OperationMode;
use vgdemo_engine::vgdemo::log::{set_logger, DefaultLogger};
use vgdemo_engine::vgdemo::SampleConfig;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::host::WinitHost;

fn main() -> ExitCode {
    set_logger(DefaultLogger::from_env());

    let config = SampleConfig::from_env();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            engine_error!("vgdemo", "Failed to create event loop: {}", err);
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut host = WinitHost::new(config, OperationMode::Handheld);
    if let Err(err) = event_loop.run_app(&mut host) {
        engine_error!("vgdemo", "Event loop failed: {}", err);
        return ExitCode::FAILURE;
    }

    if host.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
