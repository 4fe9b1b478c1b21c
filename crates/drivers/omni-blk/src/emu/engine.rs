//! In-memory model of the DMA controller and the remote memory window.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use std::vec;
use std::vec::Vec;

use core::ops::Range;
use core::sync::atomic::{AtomicBool, Ordering};

use omni_hal::{InterruptHandler, IrqReturn, RegisterIo};
use omni_utils::Mutex;

use crate::regs::{
    ControlFlags, DMA_CONTROL, DMA_DST_ADDR_HI, DMA_DST_ADDR_LO, DMA_LENGTH_HI, DMA_LENGTH_LO,
    DMA_REGION_SIZE, DMA_SRC_ADDR_HI, DMA_SRC_ADDR_LO, DMA_STATUS, StatusFlags,
};

/// Status bit the model sets when a transfer touches an address outside both
/// local memory and the remote window.
pub const EMU_STATUS_BUS_ERROR: u32 = 1 << 31;

/// What the engine does when the start bit is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBehavior {
    /// Copy and complete before the start write returns.
    Immediate,
    /// Copy and complete on another thread after the delay.
    Deferred(Duration),
    /// Drop the transfer: no copy, no status, no interrupt.
    Hang,
    /// Complete without copying, with these extra status bits set.
    Fault(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    pub src: u64,
    pub dst: u64,
    pub len: usize,
}

struct IrqBinding {
    line: u32,
    handler: Weak<dyn InterruptHandler>,
}

enum Target {
    Remote(Range<usize>),
    Local(usize),
    Invalid,
}

pub struct EmulatedDma {
    regs: Mutex<[u32; DMA_REGION_SIZE / 4]>,
    remote: Mutex<Vec<u8>>,
    remote_base: u64,
    done_bits: StatusFlags,
    behavior: Mutex<EngineBehavior>,
    log: Mutex<Vec<TransferRecord>>,
    irq: Mutex<Option<IrqBinding>>,
    busy: AtomicBool,
    overlapped: AtomicBool,
}

impl EmulatedDma {
    /// A controller whose remote window is `remote_len` zeroed bytes at
    /// `remote_base`, reporting completion with `done_bits`.
    pub fn new(remote_base: u64, remote_len: usize, done_bits: StatusFlags) -> Arc<Self> {
        Arc::new(Self {
            regs: Mutex::new([0; DMA_REGION_SIZE / 4]),
            remote: Mutex::new(vec![0; remote_len]),
            remote_base,
            done_bits,
            behavior: Mutex::new(EngineBehavior::Immediate),
            log: Mutex::new(Vec::new()),
            irq: Mutex::new(None),
            busy: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
        })
    }

    pub fn remote_base(&self) -> u64 {
        self.remote_base
    }

    pub fn remote_len(&self) -> usize {
        self.remote.lock().len()
    }

    pub fn set_behavior(&self, behavior: EngineBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Route completion interrupts to `handler` as line `line`.
    pub fn attach_irq(&self, line: u32, handler: Weak<dyn InterruptHandler>) {
        if let Some(h) = handler.upgrade() {
            h.on_register(line);
        }
        *self.irq.lock() = Some(IrqBinding { line, handler });
    }

    /// Deliver an interrupt on the attached line without starting a transfer.
    pub fn raise_irq(&self) -> IrqReturn {
        let target = self
            .irq
            .lock()
            .as_ref()
            .map(|b| (b.line, b.handler.clone()));
        match target.and_then(|(line, h)| h.upgrade().map(|h| (line, h))) {
            Some((line, handler)) => handler.handle(line),
            None => IrqReturn::None,
        }
    }

    pub fn read(&self, offset: usize) -> u32 {
        self.regs.lock().get(offset / 4).copied().unwrap_or(0)
    }

    /// Register write; the start bit launches the programmed transfer.
    pub fn write(self: &Arc<Self>, offset: usize, value: u32) {
        let launched = {
            let mut regs = self.regs.lock();
            let Some(slot) = regs.get_mut(offset / 4) else {
                return;
            };
            *slot = value;
            if offset != DMA_CONTROL || value & ControlFlags::START.bits() == 0 {
                return;
            }
            regs[DMA_STATUS / 4] = 0;
            let pair = |lo: usize, hi: usize| u64::from(regs[lo / 4]) | (u64::from(regs[hi / 4]) << 32);
            TransferRecord {
                src: pair(DMA_SRC_ADDR_LO, DMA_SRC_ADDR_HI),
                dst: pair(DMA_DST_ADDR_LO, DMA_DST_ADDR_HI),
                len: pair(DMA_LENGTH_LO, DMA_LENGTH_HI) as usize,
            }
        };
        self.launch(launched);
    }

    fn launch(self: &Arc<Self>, rec: TransferRecord) {
        if self.busy.swap(true, Ordering::AcqRel) {
            self.overlapped.store(true, Ordering::Release);
        }
        self.log.lock().push(rec);
        log::trace!("[EMU] start src={:#x} dst={:#x} len={}", rec.src, rec.dst, rec.len);

        let behavior = *self.behavior.lock();
        match behavior {
            EngineBehavior::Immediate => self.complete(rec, 0),
            EngineBehavior::Deferred(delay) => {
                let engine = Arc::clone(self);
                thread::spawn(move || {
                    thread::sleep(delay);
                    engine.complete(rec, 0);
                });
            }
            EngineBehavior::Hang => self.busy.store(false, Ordering::Release),
            EngineBehavior::Fault(bits) => self.finish(bits),
        }
    }

    fn complete(&self, rec: TransferRecord, extra: u32) {
        let extra = if self.copy(rec) { extra } else { extra | EMU_STATUS_BUS_ERROR };
        self.finish(extra);
    }

    /// Publish status, then raise the interrupt with no lock held.
    fn finish(&self, extra: u32) {
        self.regs.lock()[DMA_STATUS / 4] = self.done_bits.bits() | extra;
        self.busy.store(false, Ordering::Release);
        self.raise_irq();
    }

    fn classify(&self, addr: u64, len: usize) -> Target {
        let window = self.remote_len() as u64;
        if addr >= self.remote_base && addr - self.remote_base < window {
            let start = addr - self.remote_base;
            return match start.checked_add(len as u64) {
                Some(end) if end <= window => Target::Remote(start as usize..end as usize),
                _ => Target::Invalid,
            };
        }
        match usize::try_from(addr) {
            Ok(0) | Err(_) => Target::Invalid,
            Ok(local) => Target::Local(local),
        }
    }

    fn copy(&self, rec: TransferRecord) -> bool {
        let mut data = vec![0u8; rec.len];
        match self.classify(rec.src, rec.len) {
            Target::Remote(range) => data.copy_from_slice(&self.remote.lock()[range]),
            // SAFETY: local addresses given to the engine are identity-mapped
            // DMA allocations that the driver keeps alive and does not touch
            // until the transfer completes.
            Target::Local(addr) => unsafe {
                core::ptr::copy_nonoverlapping(addr as *const u8, data.as_mut_ptr(), rec.len);
            },
            Target::Invalid => return false,
        }
        match self.classify(rec.dst, rec.len) {
            Target::Remote(range) => self.remote.lock()[range].copy_from_slice(&data),
            // SAFETY: as above.
            Target::Local(addr) => unsafe {
                core::ptr::copy_nonoverlapping(data.as_ptr(), addr as *mut u8, rec.len);
            },
            Target::Invalid => return false,
        }
        true
    }

    /// Read remote memory directly, bypassing the engine.
    pub fn remote_read(&self, offset: usize, len: usize) -> Vec<u8> {
        self.remote.lock()[offset..offset + len].to_vec()
    }

    /// Write remote memory directly, bypassing the engine.
    pub fn remote_write(&self, offset: usize, data: &[u8]) {
        self.remote.lock()[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn status(&self) -> u32 {
        self.read(DMA_STATUS)
    }

    pub fn set_status(&self, status: u32) {
        self.regs.lock()[DMA_STATUS / 4] = status;
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.log.lock().clone()
    }

    pub fn clear_transfers(&self) {
        self.log.lock().clear();
    }

    /// True if a start was ever written while a transfer was still running.
    pub fn overlap_detected(&self) -> bool {
        self.overlapped.load(Ordering::Acquire)
    }
}

/// Register interface onto an [`EmulatedDma`].
#[derive(Clone)]
pub struct EmuRegs(pub Arc<EmulatedDma>);

impl RegisterIo for EmuRegs {
    fn read32(&self, offset: usize) -> u32 {
        self.0.read(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.0.write(offset, value);
    }
}
