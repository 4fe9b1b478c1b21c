//! Data cache maintenance for DMA buffers.

use core::sync::atomic::{Ordering, fence};

pub const CACHE_LINE_SIZE: usize = 64;

/// Cache maintenance capability.
///
/// Only `flush_line` is hardware specific. On coherent platforms
/// [`NoCacheMaintenance`] makes every flush a no-op.
pub trait CacheMaintenance: Send + Sync {
    /// Write back and invalidate the line containing `addr`.
    fn flush_line(&self, addr: u64);

    /// Flush every line touching `[addr, addr + len)`, bracketed by full fences.
    fn flush_range(&self, addr: u64, len: usize) {
        flush_lines(self, addr, len);
    }
}

/// Line walk shared by every `flush_range`: start rounds down to the line
/// boundary, each line up to `addr + len` is flushed once.
pub fn flush_lines<C: CacheMaintenance + ?Sized>(cache: &C, addr: u64, len: usize) {
    fence(Ordering::SeqCst);
    if len > 0 {
        let line_size = CACHE_LINE_SIZE as u64;
        let end = addr.saturating_add(len as u64);
        let mut line = addr & !(line_size - 1);
        while line < end {
            cache.flush_line(line);
            line += line_size;
        }
    }
    fence(Ordering::SeqCst);
}

/// Coherent platform: nothing to flush.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCacheMaintenance;

impl CacheMaintenance for NoCacheMaintenance {
    fn flush_line(&self, _addr: u64) {}
}

/// Vendor `CFLUSH.D.L1` instruction (flush and invalidate one D-cache line by
/// virtual address in `a0`).
#[cfg(target_arch = "riscv64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RiscvCflush;

#[cfg(target_arch = "riscv64")]
impl CacheMaintenance for RiscvCflush {
    fn flush_line(&self, addr: u64) {
        // SAFETY: cache maintenance by VA; faults only on unmapped addresses,
        // which callers never pass.
        unsafe {
            core::arch::asm!(".word 0xfc050073", in("a0") addr, options(nostack));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::vec::Vec;

    #[derive(Default)]
    struct LineLog(Mutex<Vec<u64>>);

    impl CacheMaintenance for LineLog {
        fn flush_line(&self, addr: u64) {
            self.0.lock().unwrap().push(addr);
        }
    }

    /// Tests: start rounds down to 64 bytes, every touched line is flushed once
    #[test]
    fn test_flush_range_rounds_to_lines() {
        let log = LineLog::default();
        log.flush_range(0x1010, 0x80);
        assert_eq!(*log.0.lock().unwrap(), [0x1000, 0x1040, 0x1080]);
    }

    #[test]
    fn test_flush_range_aligned() {
        let log = LineLog::default();
        log.flush_range(0x2_0000_0000, 128);
        assert_eq!(*log.0.lock().unwrap(), [0x2_0000_0000, 0x2_0000_0040]);
    }

    #[test]
    fn test_flush_range_empty() {
        let log = LineLog::default();
        log.flush_range(0x1010, 0);
        assert!(log.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_cache_maintenance_is_noop() {
        NoCacheMaintenance.flush_range(0x1000, 1 << 20);
    }
}
