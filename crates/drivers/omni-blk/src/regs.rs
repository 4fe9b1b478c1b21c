//! DMA controller register file.
//!
//! Eight 32-bit registers: 64-bit source, destination and length split into
//! lo/hi halves, a control register and a status register.

use bitflags::bitflags;
use omni_hal::RegisterIo;

pub const DMA_SRC_ADDR_LO: usize = 0x00;
pub const DMA_SRC_ADDR_HI: usize = 0x04;
pub const DMA_DST_ADDR_LO: usize = 0x08;
pub const DMA_DST_ADDR_HI: usize = 0x0C;
pub const DMA_LENGTH_LO: usize = 0x10;
pub const DMA_LENGTH_HI: usize = 0x14;
pub const DMA_CONTROL: usize = 0x18;
pub const DMA_STATUS: usize = 0x1C;

/// Size of the register window in bytes.
pub const DMA_REGION_SIZE: usize = 0x20;

bitflags! {
    /// DMA_CONTROL bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u32 {
        /// Start the programmed transfer.
        const START = 1 << 0;
    }
}

bitflags! {
    /// DMA_STATUS bits.
    ///
    /// The block driver and the bring-up scenario tool observe different
    /// "done" encodings for the same register, so the mask is configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// Done bit seen by the scenario tool.
        const SCENARIO_DONE = 1 << 0;
        /// Done bit seen by the block driver.
        const BLKDEV_DONE = 1 << 2;
    }
}

/// Typed access to the register file.
#[derive(Debug, Clone)]
pub struct DmaRegs<R: RegisterIo> {
    io: R,
}

impl<R: RegisterIo> DmaRegs<R> {
    pub fn new(io: R) -> Self {
        Self { io }
    }

    /// Program source, destination and length. Does not start the engine.
    pub fn program(&self, src: u64, dst: u64, len: usize) {
        self.io.write64_split(DMA_SRC_ADDR_LO, DMA_SRC_ADDR_HI, src);
        self.io.write64_split(DMA_DST_ADDR_LO, DMA_DST_ADDR_HI, dst);
        self.io.write64_split(DMA_LENGTH_LO, DMA_LENGTH_HI, len as u64);
    }

    pub fn start(&self) {
        self.io.write32(DMA_CONTROL, ControlFlags::START.bits());
    }

    /// Raw status, unknown bits retained.
    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.io.read32(DMA_STATUS))
    }

    pub fn io(&self) -> &R {
        &self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::vec::Vec;

    #[derive(Default)]
    struct WriteLog {
        writes: Mutex<Vec<(usize, u32)>>,
        status: u32,
    }

    impl RegisterIo for WriteLog {
        fn read32(&self, offset: usize) -> u32 {
            if offset == DMA_STATUS { self.status } else { 0 }
        }

        fn write32(&self, offset: usize, value: u32) {
            self.writes.lock().unwrap().push((offset, value));
        }
    }

    /// Tests: addresses split lo/hi in register order, start is written last
    #[test]
    fn test_program_and_start_sequence() {
        let regs = DmaRegs::new(WriteLog::default());
        regs.program(0x8001_0000, 0x2_0000_1000, 256);
        regs.start();

        assert_eq!(
            *regs.io().writes.lock().unwrap(),
            [
                (DMA_SRC_ADDR_LO, 0x8001_0000),
                (DMA_SRC_ADDR_HI, 0),
                (DMA_DST_ADDR_LO, 0x0000_1000),
                (DMA_DST_ADDR_HI, 0x2),
                (DMA_LENGTH_LO, 256),
                (DMA_LENGTH_HI, 0),
                (DMA_CONTROL, 1),
            ]
        );
    }

    #[test]
    fn test_status_retains_unknown_bits() {
        let regs = DmaRegs::new(WriteLog {
            status: 0x8000_0004,
            ..WriteLog::default()
        });
        let status = regs.status();
        assert!(status.contains(StatusFlags::BLKDEV_DONE));
        assert!(!status.intersects(StatusFlags::SCENARIO_DONE));
        assert_eq!(status.bits(), 0x8000_0004);
    }
}
