//! Memory-mapped register access.

use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{Ordering, fence};

/// 32-bit access to a device register file.
///
/// Offsets are trusted: implementations do not validate them.
pub trait RegisterIo: Send + Sync {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);

    /// Writes a 64-bit value as a lo/hi register pair.
    fn write64_split(&self, lo_offset: usize, hi_offset: usize, value: u64) {
        self.write32(lo_offset, value as u32);
        self.write32(hi_offset, (value >> 32) as u32);
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for alloc::sync::Arc<T> {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }
}

/// Register file mapped at a fixed virtual address.
#[derive(Debug, Clone, Copy)]
pub struct MmioRegisters {
    base: usize,
}

impl MmioRegisters {
    /// Wrap a mapped register window.
    ///
    /// # Safety
    ///
    /// `base` must be the virtual address of a mapped device register window
    /// that stays mapped for as long as this value (or a copy) is used.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

impl RegisterIo for MmioRegisters {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: Constructor guarantees base is a valid MMIO address.
        let value = unsafe { read_volatile((self.base + offset) as *const u32) };
        fence(Ordering::Acquire);
        value
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        fence(Ordering::Release);
        // SAFETY: Constructor guarantees base is a valid MMIO address.
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }
}
