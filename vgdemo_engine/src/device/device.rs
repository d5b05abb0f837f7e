/// Device - process-wide handle to the graphics backend

use std::sync::{Arc, Mutex};

use crate::device::backend::GraphicsBackend;
use crate::device::debug::{DebugReport, DeviceResult, ErrorSink, LogErrorSink};
use crate::error::{Error, Result};

struct DeviceShared {
    backend: Mutex<Box<dyn GraphicsBackend>>,
    sink: Box<dyn ErrorSink>,
    backend_name: String,
}

/// Cloneable handle to the graphics backend
///
/// Every backend call goes through `Device::call`, which reports the outcome
/// (success or failure) to the error sink registered at creation.
#[derive(Clone)]
pub struct Device {
    shared: Arc<DeviceShared>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.shared.backend_name)
            .finish()
    }
}

impl Device {
    /// Name of the backend driving this device
    pub fn backend_name(&self) -> &str {
        &self.shared.backend_name
    }

    /// Run a backend call and report its outcome to the error sink
    ///
    /// The backend lock is released before the sink runs, so a sink that
    /// terminates the process never does so while holding it.
    ///
    /// # Arguments
    ///
    /// * `context` - Call name reported to the sink (e.g. "Image::create")
    /// * `f` - Closure performing the backend call
    pub fn call<T>(
        &self,
        context: &str,
        f: impl FnOnce(&mut dyn GraphicsBackend) -> Result<T>,
    ) -> Result<T> {
        let result = match self.shared.backend.lock() {
            Ok(mut backend) => f(backend.as_mut()),
            Err(_) => Err(Error::BackendError("backend lock poisoned".to_string())),
        };
        self.check(context, result)
    }

    /// Report an outcome produced outside the backend (command memory
    /// exhaustion, stale command lists, missing shader files)
    pub fn check<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.shared.sink.report(&DebugReport {
                context,
                result: DeviceResult::Success,
                message: "",
            }),
            Err(error) => {
                let message = error.to_string();
                self.shared.sink.report(&DebugReport {
                    context,
                    result: DeviceResult::from(error),
                    message: &message,
                });
            }
        }
        result
    }
}

/// Builder for `Device`
pub struct DeviceMaker {
    backend: Box<dyn GraphicsBackend>,
    sink: Box<dyn ErrorSink>,
}

impl DeviceMaker {
    /// Start building a device over `backend`, reporting to a `LogErrorSink`
    pub fn new(backend: impl GraphicsBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            sink: Box::new(LogErrorSink),
        }
    }

    /// Register the error sink every call reports to
    pub fn set_error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn create(self) -> Device {
        let backend_name = self.backend.name().to_string();
        crate::engine_info!("vgdemo::Device", "Device created on {} backend", backend_name);
        Device {
            shared: Arc::new(DeviceShared {
                backend: Mutex::new(self.backend),
                sink: self.sink,
                backend_name,
            }),
        }
    }
}
