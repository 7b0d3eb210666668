//! GPU information domain type
//!
//! Provides the GpuInfo struct for GPU identification and the PCI
//! location used to find the GPU's register space.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PCI location and identity of a GPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciLocation {
    /// Bus id as reported by NVML (e.g., "00000000:01:00.0")
    pub bus_id: String,
    /// PCI device id (e.g., 0x2204 for an RTX 3090)
    pub device_id: u16,
    /// PCI vendor id (0x10de for NVIDIA)
    pub vendor_id: u16,
}

impl PciLocation {
    /// Build from NVML's bus id and combined `device << 16 | vendor` id
    pub fn from_nvml(bus_id: impl Into<String>, pci_device_id: u32) -> Self {
        Self {
            bus_id: bus_id.into(),
            device_id: (pci_device_id >> 16) as u16,
            vendor_id: (pci_device_id & 0xffff) as u16,
        }
    }

    /// Bus id in the form used under `/sys/bus/pci/devices`
    ///
    /// NVML pads the PCI domain to 8 hex digits; sysfs uses 4 and lowercase.
    pub fn sysfs_address(&self) -> String {
        let lower = self.bus_id.trim().to_lowercase();
        match lower.split_once(':') {
            Some((domain, rest)) => match u32::from_str_radix(domain, 16) {
                Ok(domain) => format!("{:04x}:{}", domain, rest),
                Err(_) => lower,
            },
            None => lower,
        }
    }
}

impl fmt::Display for PciLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:04x}:{:04x}]",
            self.sysfs_address(),
            self.vendor_id,
            self.device_id
        )
    }
}

/// GPU information and identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    /// GPU index (0-based)
    pub index: u32,
    /// GPU name (e.g., "NVIDIA GeForce RTX 3090")
    pub name: String,
    /// Unique GPU UUID
    pub uuid: String,
    /// PCI location, when NVML reports it
    pub pci: Option<PciLocation>,
    /// Number of fan controllers
    pub fan_count: u32,
}

impl GpuInfo {
    /// Create new GPU info
    pub fn new(index: u32, name: String, uuid: String) -> Self {
        Self {
            index,
            name,
            uuid,
            pci: None,
            fan_count: 0,
        }
    }

    /// Set the PCI location
    pub fn with_pci(mut self, pci: PciLocation) -> Self {
        self.pci = Some(pci);
        self
    }

    /// Set the fan count
    pub fn with_fan_count(mut self, count: u32) -> Self {
        self.fan_count = count;
        self
    }

    /// Get a short display name
    pub fn short_name(&self) -> &str {
        // Remove "NVIDIA " prefix if present
        self.name.strip_prefix("NVIDIA ").unwrap_or(&self.name)
    }
}

impl fmt::Display for GpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)
    }
}
