//! GDDR6 memory-junction temperature
//!
//! Reads the junction sensor straight from the GPU's BAR0 through a
//! read-only `/dev/mem` mapping, bypassing NVML.

pub mod arch;
pub mod pci;
pub mod probe;
pub mod window;

pub use arch::{decode_mem_temp, ArchitectureId, RegisterLayout};
pub use probe::{MemTempProbe, ProbeTarget};
pub use window::{MemoryWindow, RegisterSource, DEV_MEM};
