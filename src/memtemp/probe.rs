//! Memory-junction temperature probe
//!
//! Ties a register source to the layout of one architecture.

use crate::domain::{PciLocation, Temperature};
use crate::error::MemoryError;
use crate::memtemp::{pci, ArchitectureId, MemoryWindow, RegisterSource};

use serde::Serialize;
use std::path::Path;

/// Where the sensor lives: BAR0 of the GPU and its architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeTarget {
    /// Physical address of BAR0
    pub bar0: u64,
    /// Architecture selecting the register layout
    pub arch: ArchitectureId,
}

impl ProbeTarget {
    /// Resolve the target, preferring explicit values over detection
    ///
    /// Without an explicit architecture the PCI device id must be in the
    /// known-device table; without an explicit BAR0 it is read from sysfs.
    pub fn resolve(
        pci_location: Option<&PciLocation>,
        bar0: Option<u64>,
        arch: Option<ArchitectureId>,
    ) -> Result<Self, MemoryError> {
        let missing_pci =
            || MemoryError::ProbeUnavailable("GPU did not report a PCI location".to_string());

        let arch = match arch {
            Some(arch) => arch,
            None => {
                let location = pci_location.ok_or_else(missing_pci)?;
                let known = pci::known_device(location.device_id).ok_or_else(|| {
                    MemoryError::ProbeUnavailable(format!(
                        "no known memory-junction register for PCI device {:04x}",
                        location.device_id
                    ))
                })?;
                log::debug!("Detected {} ({}, {})", known.name, known.arch, known.memory);
                known.arch
            }
        };

        let bar0 = match bar0 {
            Some(bar0) => bar0,
            None => {
                let location = pci_location.ok_or_else(missing_pci)?;
                pci::read_bar0(&location.sysfs_address())?
            }
        };

        let target = Self { bar0, arch };
        target.register_address()?;
        Ok(target)
    }

    /// Physical address of the sensor register
    ///
    /// Fails when the register window would run past the end of the
    /// address space.
    pub fn register_address(&self) -> Result<u64, MemoryError> {
        let layout = self.arch.layout();
        let out_of_range = || {
            MemoryError::ProbeUnavailable(format!(
                "BAR0 {:#x} leaves no room for the {} register window",
                self.bar0, self.arch
            ))
        };
        self.bar0
            .checked_add(layout.window_len() as u64)
            .ok_or_else(out_of_range)?;
        self.bar0
            .checked_add(layout.offset as u64)
            .ok_or_else(out_of_range)
    }
}

/// Reads and decodes the memory-junction register
pub struct MemTempProbe {
    source: Box<dyn RegisterSource>,
    target: ProbeTarget,
}

impl MemTempProbe {
    /// Probe over an already-open register source based at BAR0
    pub fn new(source: Box<dyn RegisterSource>, target: ProbeTarget) -> Self {
        Self { source, target }
    }

    /// Map the register window from `device` (normally `/dev/mem`)
    pub fn open(device: &Path, target: ProbeTarget) -> Result<Self, MemoryError> {
        let address = target.register_address()?;
        let window =
            MemoryWindow::open_device(device, target.bar0, target.arch.layout().window_len())?;
        log::info!(
            "GDDR6 temperature probe ready: {} register at {:#x}",
            target.arch,
            address
        );
        Ok(Self::new(Box::new(window), target))
    }

    /// Raw register value
    pub fn read_raw(&self) -> Result<u32, MemoryError> {
        self.source.read_u32(self.target.arch.layout().offset)
    }

    /// Decoded memory-junction temperature
    pub fn read(&self) -> Result<Temperature, MemoryError> {
        let raw = self.read_raw()?;
        Ok(self.target.arch.layout().decode(raw))
    }

    /// The resolved target
    pub fn target(&self) -> ProbeTarget {
        self.target
    }

    /// Release the register source
    pub fn close(&mut self) {
        self.source.close();
    }
}

impl std::fmt::Debug for MemTempProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTempProbe")
            .field("target", &self.target)
            .finish()
    }
}
