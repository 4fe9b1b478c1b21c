//! Device context: bring-up, request entry point, interrupt handler, teardown.

use omni_hal::{CacheMaintenance, Clock, DmaHal, InterruptHandler, IrqReturn, RegisterIo};
use omni_utils::Mutex;

use crate::bounce::BounceBuffer;
use crate::channel::DmaChannel;
use crate::chunker::Chunker;
use crate::completion::{Completion, CompletionSignal};
use crate::config::{CompletionMode, DeviceConfig, QueueLimits};
use crate::error::{BlockError, ResourceError};
use crate::executor::Executor;
use crate::regs::{DmaRegs, StatusFlags};
use crate::request::{BlockRequest, BlockStatus, RequestState};
use crate::stats::{DmaStats, StatsSnapshot};
use crate::{DMA_TIMEOUT_MS, DRIVER_NAME, DRIVER_VERSION, SECTOR_SIZE};

/// The platform capabilities a device instance is built from.
pub trait Platform: 'static {
    type Regs: RegisterIo + Clone;
    type Cache: CacheMaintenance;
    type Clock: Clock;
    type Dma: DmaHal;
}

/// Resources handed over by the platform bus at probe time.
pub struct PlatformResources<P: Platform> {
    /// Mapped DMA controller register window.
    pub regs: Option<P::Regs>,
    /// Interrupt line of the DMA controller.
    pub irq: Option<u32>,
    pub cache: P::Cache,
    pub clock: P::Clock,
}

type Channel<P> = DmaChannel<<P as Platform>::Regs, Completion<<P as Platform>::Regs, <P as Platform>::Clock>>;

pub struct OmniBlkDevice<P: Platform> {
    config: DeviceConfig,
    capacity_sectors: u64,
    irq: Option<u32>,
    channel: Channel<P>,
    cache: P::Cache,
    bounce: Mutex<BounceBuffer<P::Dma>>,
    stats: DmaStats,
}

impl<P: Platform> OmniBlkDevice<P> {
    /// Bring the device up.
    ///
    /// Resources are taken in order (register window, bounce buffer, interrupt
    /// line); on failure everything already taken is released on return.
    pub fn probe(res: PlatformResources<P>, config: DeviceConfig) -> Result<Self, ResourceError> {
        log::info!("{DRIVER_NAME}: Probing OmniXtend Block Device Driver v{DRIVER_VERSION}");

        let capacity_sectors = config.capacity_sectors()?;

        let Some(io) = res.regs else {
            log::error!("{DRIVER_NAME}: Failed to get memory resource");
            return Err(ResourceError::MissingRegisterWindow);
        };
        log::info!("{DRIVER_NAME}: Mapped DMA controller registers");

        let bounce = BounceBuffer::<P::Dma>::alloc().inspect_err(|_| {
            log::error!("{DRIVER_NAME}: Failed to allocate DMA buffer");
        })?;
        log::info!(
            "{DRIVER_NAME}: Allocated DMA buffer: {} KB @ phys {:#x}",
            bounce.capacity() / 1024,
            bounce.paddr()
        );

        let irq = match (config.completion, res.irq) {
            (CompletionMode::Interrupt, None) => {
                log::error!("{DRIVER_NAME}: Failed to get IRQ");
                return Err(ResourceError::MissingIrq);
            }
            (CompletionMode::Interrupt, Some(line)) => {
                log::info!("{DRIVER_NAME}: Registered IRQ {line}");
                Some(line)
            }
            (CompletionMode::Polling { interval_us }, line) => {
                log::info!("{DRIVER_NAME}: Polling for completion every {interval_us} us");
                line
            }
        };

        let regs = DmaRegs::new(io);
        let completion = Completion::new(config.completion, regs.clone(), config.done_mask, res.clock);
        let channel = DmaChannel::new(regs, completion, config.error_mask);

        log::info!(
            "{DRIVER_NAME}: Device registered: /dev/{DRIVER_NAME}, {} MB ({} sectors)",
            config.size_bytes / (1024 * 1024),
            capacity_sectors
        );

        Ok(Self {
            config,
            capacity_sectors,
            irq,
            channel,
            cache: res.cache,
            bounce: Mutex::new(bounce),
            stats: DmaStats::new(),
        })
    }

    /// Tear the device down and report the final counters.
    pub fn remove(self) -> StatsSnapshot {
        log::info!("{DRIVER_NAME}: Removing driver");
        let snapshot = self.stats.snapshot();
        log::info!("{DRIVER_NAME}: Stats - {snapshot}");
        log::info!("{DRIVER_NAME}: Driver removed");
        snapshot
    }

    /// Block layer entry point.
    pub fn queue_rq(&self, rq: &mut BlockRequest<'_, '_>) -> BlockStatus {
        match self.submit(rq) {
            Ok(()) => BlockStatus::Ok,
            Err(_) => BlockStatus::IoError,
        }
    }

    /// Validate, mark started and run the request.
    ///
    /// Operations other than read and write, and requests reaching past the
    /// last sector, fail before the engine is touched.
    pub fn submit(&self, rq: &mut BlockRequest<'_, '_>) -> Result<(), BlockError> {
        if rq.op().direction().is_none() {
            log::debug!("{DRIVER_NAME}: rejecting {:?} request", rq.op());
            rq.state = RequestState::Failed;
            return Err(BlockError::Unsupported);
        }
        if !self.in_range(rq) {
            log::error!(
                "{DRIVER_NAME}: request at sector {} ({} bytes) beyond {} sectors",
                rq.sector(),
                rq.segments().total_bytes(),
                self.capacity_sectors
            );
            rq.state = RequestState::Failed;
            return Err(BlockError::OutOfRange);
        }
        rq.state = RequestState::Started;

        let executor = Executor::new(&self.channel, &self.cache, &self.stats, DMA_TIMEOUT_MS);
        Chunker::new(executor, &self.bounce, self.config.remote_base)
            .handle_request(rq)
            .map_err(BlockError::from)
    }

    fn in_range(&self, rq: &BlockRequest<'_, '_>) -> bool {
        let sectors = rq.segments().total_bytes().div_ceil(SECTOR_SIZE) as u64;
        rq.sector()
            .checked_add(sectors)
            .is_some_and(|end| end <= self.capacity_sectors)
    }

    /// Interrupt handler body: claim the event only if the engine reports done.
    ///
    /// Runs in interrupt context. Never blocks, logs or flushes caches.
    pub fn handle_irq(&self) -> IrqReturn {
        if !self.channel.regs().status().intersects(self.config.done_mask) {
            return IrqReturn::None;
        }
        self.channel.completion().signal();
        self.stats.record_irq();
        IrqReturn::Handled
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn capacity_sectors(&self) -> u64 {
        self.capacity_sectors
    }

    pub fn size_bytes(&self) -> u64 {
        self.capacity_sectors * SECTOR_SIZE as u64
    }

    pub fn irq(&self) -> Option<u32> {
        self.irq
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn queue_limits(&self) -> QueueLimits {
        QueueLimits::new()
    }

    pub fn completion_mode(&self) -> CompletionMode {
        self.channel.completion().mode()
    }

    pub fn done_mask(&self) -> StatusFlags {
        self.config.done_mask
    }
}

impl<P: Platform> InterruptHandler for OmniBlkDevice<P>
where
    Self: Send + Sync,
{
    fn handle(&self, irq: u32) -> IrqReturn {
        if self.irq != Some(irq) {
            return IrqReturn::None;
        }
        self.handle_irq()
    }
}
