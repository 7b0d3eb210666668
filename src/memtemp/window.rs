//! Read-only window onto physical memory
//!
//! All unsafe code touching the mapping lives in this file. Everything else
//! reads registers through [`RegisterSource`].

use crate::error::MemoryError;

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Physical memory device node
pub const DEV_MEM: &str = "/dev/mem";

const REGISTER_SIZE: usize = std::mem::size_of::<u32>();

/// Anything that can serve 32-bit register reads at byte offsets
pub trait RegisterSource {
    /// Read the register at `offset`, in host byte order
    fn read_u32(&self, offset: usize) -> Result<u32, MemoryError>;

    /// Release the underlying resource; reads afterwards must fail
    fn close(&mut self) {}
}

/// System page size
pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

struct Mapping {
    base: NonNull<u8>,
    map_len: usize,
    /// Distance from the page-aligned mapping start to `physical_base`
    page_delta: usize,
    _file: File,
}

/// A mapped range `[physical_base, physical_base + length)`
///
/// The mapping is released by [`MemoryWindow::close`] or on drop, whichever
/// comes first. Reads after close fail with [`MemoryError::Closed`].
pub struct MemoryWindow {
    device: PathBuf,
    physical_base: u64,
    length: usize,
    mapping: Option<Mapping>,
}

impl MemoryWindow {
    /// Map `length` bytes of physical memory starting at `physical_base`
    pub fn open(physical_base: u64, length: usize) -> Result<Self, MemoryError> {
        Self::open_device(DEV_MEM, physical_base, length)
    }

    /// Map a range of an arbitrary device node or file
    pub fn open_device<P: AsRef<Path>>(
        device: P,
        physical_base: u64,
        length: usize,
    ) -> Result<Self, MemoryError> {
        let device = device.as_ref();
        let name = device.display().to_string();
        let map_failed = |reason: String| MemoryError::MapFailed {
            base: physical_base,
            length,
            reason,
        };

        if length == 0 {
            return Err(map_failed("empty window".to_string()));
        }
        if physical_base.checked_add(length as u64).is_none() {
            return Err(map_failed("window wraps the address space".to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_SYNC)
            .open(device)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => MemoryError::UnsupportedPlatform(name.clone()),
                io::ErrorKind::PermissionDenied => MemoryError::PermissionDenied(name.clone()),
                _ => map_failed(e.to_string()),
            })?;

        let page = page_size() as u64;
        let aligned = physical_base & !(page - 1);
        let page_delta = (physical_base - aligned) as usize;
        let map_len = page_delta + length;
        let offset = libc::off_t::try_from(aligned)
            .map_err(|_| map_failed("address beyond off_t range".to_string()))?;

        // SAFETY: a fresh read-only shared mapping of an open descriptor;
        // the kernel picks the address and validates the range.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };

        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EPERM) | Some(libc::EACCES) => MemoryError::PermissionDenied(name),
                _ => map_failed(err.to_string()),
            });
        }

        let base = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| map_failed("mmap returned null".to_string()))?;

        log::debug!(
            "Mapped {} bytes of {} at {:#x}",
            length,
            device.display(),
            physical_base
        );

        Ok(Self {
            device: device.to_path_buf(),
            physical_base,
            length,
            mapping: Some(Mapping {
                base,
                map_len,
                page_delta,
                _file: file,
            }),
        })
    }

    /// Physical address of offset 0
    pub fn physical_base(&self) -> u64 {
        self.physical_base
    }

    /// Window length in bytes
    pub fn length(&self) -> usize {
        self.length
    }

    /// Whether the mapping is still held
    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Read a 32-bit little-endian register at `offset`
    ///
    /// An all-ones value is what a PCIe read returns once the device has
    /// dropped off the bus; it is reported as [`MemoryError::ReadFailed`].
    pub fn read_u32(&self, offset: usize) -> Result<u32, MemoryError> {
        let mapping = self.mapping.as_ref().ok_or(MemoryError::Closed)?;

        match offset.checked_add(REGISTER_SIZE) {
            Some(end) if end <= self.length => {}
            _ => {
                return Err(MemoryError::OutOfRange {
                    offset,
                    length: self.length,
                })
            }
        }

        let position = mapping.page_delta + offset;
        if position % REGISTER_SIZE != 0 {
            return Err(MemoryError::Misaligned(offset));
        }

        // SAFETY: `position + 4 <= map_len` by the bounds check above, the
        // mapping is live while `self.mapping` is Some, and the address is
        // 4-byte aligned because the mapping start is page aligned.
        let raw = unsafe {
            std::ptr::read_volatile(mapping.base.as_ptr().add(position).cast::<u32>())
        };
        let value = u32::from_le(raw);

        if value == u32::MAX {
            return Err(MemoryError::ReadFailed(
                self.physical_base.saturating_add(offset as u64),
            ));
        }

        Ok(value)
    }

    /// Release the mapping; later calls are no-ops
    pub fn close(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            // SAFETY: base/map_len are exactly what mmap returned and the
            // mapping has not been unmapped yet (it was still in the Option).
            let rc = unsafe { libc::munmap(mapping.base.as_ptr().cast(), mapping.map_len) };
            if rc != 0 {
                log::warn!(
                    "munmap of {} at {:#x} failed: {}",
                    self.device.display(),
                    self.physical_base,
                    io::Error::last_os_error()
                );
            } else {
                log::debug!(
                    "Unmapped {} at {:#x}",
                    self.device.display(),
                    self.physical_base
                );
            }
        }
    }
}

impl RegisterSource for MemoryWindow {
    fn read_u32(&self, offset: usize) -> Result<u32, MemoryError> {
        MemoryWindow::read_u32(self, offset)
    }

    fn close(&mut self) {
        MemoryWindow::close(self)
    }
}

impl Drop for MemoryWindow {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MemoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWindow")
            .field("device", &self.device)
            .field("physical_base", &format_args!("{:#x}", self.physical_base))
            .field("length", &self.length)
            .field("open", &self.is_open())
            .finish()
    }
}
