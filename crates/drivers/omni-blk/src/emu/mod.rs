//! Host emulation of the OmniXtend DMA controller.
//!
//! Everything here runs on the host: the engine copies between identity-mapped
//! heap memory and an in-memory remote window, the cache capability records
//! what was flushed, and the clock is either a deterministic step counter or
//! the wall clock.

mod engine;

use std::sync::{Arc, Weak};
use std::vec::Vec;

use core::sync::atomic::{AtomicU64, Ordering};

use omni_hal::clock::us_to_ticks;
use omni_hal::{CacheMaintenance, Clock, DmaRegion, IdentityDma, InterruptHandler, StdClock};
use omni_utils::Mutex;

use crate::config::DeviceConfig;
use crate::device::{OmniBlkDevice, Platform, PlatformResources};
use crate::error::ResourceError;
use crate::scenario::MemoryWindow;
use crate::stats::StatsSnapshot;

pub use engine::{EMU_STATUS_BUS_ERROR, EmuRegs, EmulatedDma, EngineBehavior, TransferRecord};

/// Interrupt line the emulated controller is wired to.
pub const EMU_IRQ_LINE: u32 = 33;

/// Cache capability that records every flushed range.
#[derive(Clone, Default)]
pub struct RecordingCache {
    flushes: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flushed `(address, length)` ranges in call order.
    pub fn flushes(&self) -> Vec<(u64, usize)> {
        self.flushes.lock().clone()
    }

    pub fn clear(&self) {
        self.flushes.lock().clear();
    }
}

impl CacheMaintenance for RecordingCache {
    fn flush_line(&self, _addr: u64) {}

    fn flush_range(&self, addr: u64, len: usize) {
        self.flushes.lock().push((addr, len));
        omni_hal::cache::flush_lines(self, addr, len);
    }
}

/// Clock for emulated runs.
pub enum EmuClock {
    /// 1 kHz counter advancing one tick per read; timeouts expire after a
    /// fixed number of polls instead of wall time.
    Step(AtomicU64),
    Real(StdClock),
}

impl EmuClock {
    pub const STEP_HZ: u64 = 1000;

    pub fn step() -> Self {
        Self::Step(AtomicU64::new(0))
    }

    pub fn real() -> Self {
        Self::Real(StdClock::new())
    }
}

impl Clock for EmuClock {
    fn read_counter(&self) -> u64 {
        match self {
            Self::Step(counter) => counter.fetch_add(1, Ordering::Relaxed),
            Self::Real(clock) => clock.read_counter(),
        }
    }

    fn read_frequency(&self) -> u64 {
        match self {
            Self::Step(_) => Self::STEP_HZ,
            Self::Real(clock) => clock.read_frequency(),
        }
    }

    fn delay_us(&self, us: u64) {
        match self {
            Self::Step(counter) => {
                counter.fetch_add(us_to_ticks(us, Self::STEP_HZ).max(1), Ordering::Relaxed);
            }
            Self::Real(clock) => clock.delay_us(us),
        }
    }
}

/// Emulated platform: [`EmulatedDma`] registers, recording cache, heap DMA memory.
pub struct EmuPlatform;

impl Platform for EmuPlatform {
    type Regs = EmuRegs;
    type Cache = RecordingCache;
    type Clock = EmuClock;
    type Dma = IdentityDma;
}

impl EmulatedDma {
    /// Platform resources backed by this controller.
    pub fn resources(
        self: &Arc<Self>,
        irq: Option<u32>,
        cache: RecordingCache,
        clock: EmuClock,
    ) -> PlatformResources<EmuPlatform> {
        PlatformResources {
            regs: Some(EmuRegs(Arc::clone(self))),
            irq,
            cache,
            clock,
        }
    }
}

/// A probed device wired to an emulated controller.
pub struct EmuBench {
    pub dma: Arc<EmulatedDma>,
    pub cache: RecordingCache,
    pub device: Arc<OmniBlkDevice<EmuPlatform>>,
}

impl EmuBench {
    /// Probe a device on a fresh controller whose remote window matches the
    /// configured size and whose done bits match the configured mask.
    pub fn new(config: DeviceConfig, clock: EmuClock) -> Result<Self, ResourceError> {
        let window = usize::try_from(config.size_bytes).map_err(|_| ResourceError::InvalidSize)?;
        let dma = EmulatedDma::new(config.remote_base, window, config.done_mask);
        let cache = RecordingCache::new();
        let device = Arc::new(OmniBlkDevice::probe(
            dma.resources(Some(EMU_IRQ_LINE), cache.clone(), clock),
            config,
        )?);
        let handler: Weak<dyn InterruptHandler> = Arc::downgrade(&device) as Weak<dyn InterruptHandler>;
        dma.attach_irq(EMU_IRQ_LINE, handler);
        Ok(Self { dma, cache, device })
    }

    /// Remove the device. Falls back to a stats snapshot while other handles
    /// to the device are still alive.
    pub fn remove(self) -> StatsSnapshot {
        match Arc::try_unwrap(self.device) {
            Ok(device) => device.remove(),
            Err(shared) => {
                log::warn!("[EMU] device still shared at removal");
                shared.stats()
            }
        }
    }
}

/// CPU view of emulated memory: the remote window plus a set of local
/// DMA-able buffers. Addresses outside both read as zero and ignore writes.
pub struct EmuWindow {
    dma: Arc<EmulatedDma>,
    locals: Vec<DmaRegion<IdentityDma>>,
}

impl EmuWindow {
    /// Allocate `count` local buffers of `len` bytes each.
    pub fn new(dma: Arc<EmulatedDma>, count: usize, len: usize) -> Option<Self> {
        let locals = (0..count)
            .map(|_| DmaRegion::alloc(len))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { dma, locals })
    }

    /// Bus address of local buffer `index`.
    pub fn local_addr(&self, index: usize) -> Option<u64> {
        self.locals.get(index).map(DmaRegion::paddr)
    }

    fn remote_offset(&self, addr: u64) -> Option<usize> {
        let offset = usize::try_from(addr.checked_sub(self.dma.remote_base())?).ok()?;
        (offset + 4 <= self.dma.remote_len()).then_some(offset)
    }

    fn local_slot(&self, addr: u64) -> Option<(usize, usize)> {
        self.locals.iter().enumerate().find_map(|(i, r)| {
            let offset = usize::try_from(addr.checked_sub(r.paddr())?).ok()?;
            (offset + 4 <= r.len()).then_some((i, offset))
        })
    }
}

impl MemoryWindow for EmuWindow {
    fn read_u32(&self, addr: u64) -> u32 {
        if let Some(offset) = self.remote_offset(addr) {
            let bytes = self.dma.remote_read(offset, 4);
            return u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        match self.local_slot(addr) {
            Some((i, offset)) => {
                let s = &self.locals[i].as_slice()[offset..offset + 4];
                u32::from_ne_bytes([s[0], s[1], s[2], s[3]])
            }
            None => 0,
        }
    }

    fn write_u32(&mut self, addr: u64, value: u32) {
        if let Some(offset) = self.remote_offset(addr) {
            self.dma.remote_write(offset, &value.to_ne_bytes());
            return;
        }
        if let Some((i, offset)) = self.local_slot(addr) {
            self.locals[i].as_mut_slice()[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }
}
