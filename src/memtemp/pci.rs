//! PCI identification of supported GPUs
//!
//! Maps PCI device ids to architectures and reads BAR0 from sysfs.

use crate::error::MemoryError;
use crate::memtemp::ArchitectureId;

use std::path::{Path, PathBuf};

/// Root of the PCI device tree in sysfs
pub const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

/// A board known to expose the memory-junction register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDevice {
    /// PCI device id
    pub device_id: u16,
    /// Chip architecture
    pub arch: ArchitectureId,
    /// Marketing name
    pub name: &'static str,
    /// Memory type
    pub memory: &'static str,
}

const fn known(
    device_id: u16,
    arch: ArchitectureId,
    name: &'static str,
    memory: &'static str,
) -> KnownDevice {
    KnownDevice {
        device_id,
        arch,
        name,
        memory,
    }
}

/// Boards with a known memory-junction register
pub const KNOWN_DEVICES: &[KnownDevice] = &[
    known(0x2684, ArchitectureId::Ad102, "RTX 4090", "GDDR6X"),
    known(0x26b1, ArchitectureId::Ad102, "RTX 6000 Ada", "GDDR6"),
    known(0x26b9, ArchitectureId::Ad102, "L40S", "GDDR6"),
    known(0x2704, ArchitectureId::Ad103, "RTX 4080", "GDDR6X"),
    known(0x2782, ArchitectureId::Ad104, "RTX 4070 Ti", "GDDR6X"),
    known(0x2786, ArchitectureId::Ad104, "RTX 4070", "GDDR6X"),
    known(0x27b8, ArchitectureId::Ad104, "L4", "GDDR6"),
    known(0x2203, ArchitectureId::Ga102, "RTX 3090 Ti", "GDDR6X"),
    known(0x2204, ArchitectureId::Ga102, "RTX 3090", "GDDR6X"),
    known(0x2206, ArchitectureId::Ga102, "RTX 3080", "GDDR6X"),
    known(0x2208, ArchitectureId::Ga102, "RTX 3080 Ti", "GDDR6X"),
    known(0x2216, ArchitectureId::Ga102, "RTX 3080 LHR", "GDDR6X"),
    known(0x2231, ArchitectureId::Ga102, "RTX A5000", "GDDR6"),
    known(0x2232, ArchitectureId::Ga102, "RTX A4500", "GDDR6"),
    known(0x2236, ArchitectureId::Ga102, "A10", "GDDR6"),
    known(0x2484, ArchitectureId::Ga104, "RTX 3070", "GDDR6"),
    known(0x2488, ArchitectureId::Ga104, "RTX 3070 LHR", "GDDR6"),
    known(0x2531, ArchitectureId::Ga106, "RTX A2000", "GDDR6"),
    known(0x2571, ArchitectureId::Ga106, "RTX A2000 12GB", "GDDR6"),
];

/// Look up a board by PCI device id
pub fn known_device(device_id: u16) -> Option<&'static KnownDevice> {
    KNOWN_DEVICES.iter().find(|d| d.device_id == device_id)
}

/// Read BAR0 of the device at `address` (e.g., "0000:01:00.0")
pub fn read_bar0(address: &str) -> Result<u64, MemoryError> {
    read_bar0_from(Path::new(SYSFS_PCI_DEVICES), address)
}

/// Read BAR0 from a sysfs-like tree rooted at `root`
pub fn read_bar0_from(root: &Path, address: &str) -> Result<u64, MemoryError> {
    let path: PathBuf = root.join(address).join("resource");
    let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MemoryError::UnsupportedPlatform(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => {
            MemoryError::PermissionDenied(path.display().to_string())
        }
        _ => MemoryError::ProbeUnavailable(format!("{}: {}", path.display(), e)),
    })?;

    parse_bar0(&content).ok_or_else(|| {
        MemoryError::ProbeUnavailable(format!("no memory BAR0 in {}", path.display()))
    })
}

/// Parse the first line of a sysfs `resource` file
///
/// Each line is `start end flags` in hex; an unassigned BAR has start 0.
fn parse_bar0(content: &str) -> Option<u64> {
    let line = content.lines().next()?;
    let start = line.split_whitespace().next()?;
    let start = start.strip_prefix("0x").unwrap_or(start);
    match u64::from_str_radix(start, 16) {
        Ok(0) | Err(_) => None,
        Ok(addr) => Some(addr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RESOURCE: &str = "0x00000000fb000000 0x00000000fbffffff 0x0000000000040200\n\
0x000000f000000000 0x000000f7ffffffff 0x000000000014220c\n";

    #[test]
    fn test_known_device_lookup() {
        let dev = known_device(0x2204).unwrap();
        assert_eq!(dev.arch, ArchitectureId::Ga102);
        assert_eq!(dev.name, "RTX 3090");

        assert_eq!(known_device(0x2484).unwrap().arch, ArchitectureId::Ga104);
        assert!(known_device(0x1e04).is_none());
    }

    #[test]
    fn test_known_devices_unique() {
        for (i, a) in KNOWN_DEVICES.iter().enumerate() {
            for b in &KNOWN_DEVICES[i + 1..] {
                assert_ne!(a.device_id, b.device_id);
            }
        }
    }

    #[test]
    fn test_parse_bar0() {
        assert_eq!(parse_bar0(RESOURCE), Some(0xfb00_0000));
        assert_eq!(parse_bar0("0x0000000000000000 0x0 0x0\n"), None);
        assert_eq!(parse_bar0(""), None);
        assert_eq!(parse_bar0("garbage"), None);
    }

    #[test]
    fn test_read_bar0_from_sysfs_tree() {
        let root = TempDir::new().unwrap();
        let dev = root.path().join("0000:01:00.0");
        std::fs::create_dir(&dev).unwrap();
        std::fs::write(dev.join("resource"), RESOURCE).unwrap();

        assert_eq!(read_bar0_from(root.path(), "0000:01:00.0").unwrap(), 0xfb00_0000);
    }

    #[test]
    fn test_read_bar0_missing_device() {
        let root = TempDir::new().unwrap();
        let result = read_bar0_from(root.path(), "0000:02:00.0");
        assert!(matches!(result, Err(MemoryError::UnsupportedPlatform(_))));
    }

    #[test]
    fn test_read_bar0_unassigned() {
        let root = TempDir::new().unwrap();
        let dev = root.path().join("0000:01:00.0");
        std::fs::create_dir(&dev).unwrap();
        std::fs::write(dev.join("resource"), "0x0 0x0 0x0\n").unwrap();

        let result = read_bar0_from(root.path(), "0000:01:00.0");
        assert!(matches!(result, Err(MemoryError::ProbeUnavailable(_))));
    }
}
