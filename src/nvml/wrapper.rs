//! NVML manager implementation
//!
//! Provides the main interface for NVML initialization and device access.

use crate::error::NvmlError;
use crate::nvml::device::NvmlDevice;
use crate::nvml::traits::GpuManager;

use nvml_wrapper::Nvml;

/// NVML manager for GPU access
///
/// The NVML handle is leaked so devices can borrow it for `'static`: the
/// manager lives for the whole process and the driver releases NVML at exit.
pub struct NvmlManager {
    nvml: &'static Nvml,
}

impl NvmlManager {
    /// Initialize NVML and create a new manager
    pub fn new() -> Result<Self, NvmlError> {
        let nvml = Nvml::init().map_err(|e| match e {
            nvml_wrapper::error::NvmlError::LibloadingError(_) => NvmlError::LibraryNotFound,
            nvml_wrapper::error::NvmlError::DriverNotLoaded => {
                NvmlError::InitializationFailed("NVIDIA driver not loaded".to_string())
            }
            nvml_wrapper::error::NvmlError::NoPermission => {
                NvmlError::InsufficientPermissions("NVML initialization".to_string())
            }
            other => NvmlError::InitializationFailed(other.to_string()),
        })?;

        Ok(Self {
            nvml: Box::leak(Box::new(nvml)),
        })
    }
}

impl GpuManager for NvmlManager {
    type Device = NvmlDevice<'static>;

    fn device_count(&self) -> Result<u32, NvmlError> {
        self.nvml
            .device_count()
            .map_err(|e| NvmlError::Unknown(e.to_string()))
    }

    fn device_by_index(&self, index: u32) -> Result<Self::Device, NvmlError> {
        let device = self.nvml.device_by_index(index).map_err(|e| match e {
            nvml_wrapper::error::NvmlError::NotFound
            | nvml_wrapper::error::NvmlError::InvalidArg => NvmlError::DeviceNotFound(index),
            other => NvmlError::Unknown(other.to_string()),
        })?;

        Ok(NvmlDevice::new(device, index))
    }
}
