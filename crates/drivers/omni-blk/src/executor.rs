//! DMA transfer executor: one bounded transfer with cache maintenance and
//! statistics.

use omni_hal::{CacheMaintenance, RegisterIo};

use crate::channel::DmaChannel;
use crate::completion::CompletionSignal;
use crate::error::TransferError;
use crate::stats::DmaStats;

/// Direction as seen by the block layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Remote memory to the bounce buffer.
    Read,
    /// Bounce buffer to remote memory.
    Write,
}

/// One chunk's transfer, built and discarded per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub direction: Direction,
    /// Bus address of the bounce buffer side.
    pub local: u64,
    /// Bus address of the remote memory side.
    pub remote: u64,
    pub len: usize,
}

impl TransferDescriptor {
    pub fn source(&self) -> u64 {
        match self.direction {
            Direction::Read => self.remote,
            Direction::Write => self.local,
        }
    }

    pub fn destination(&self) -> u64 {
        match self.direction {
            Direction::Read => self.local,
            Direction::Write => self.remote,
        }
    }
}

pub struct Executor<'a, R: RegisterIo, S: CompletionSignal, C: CacheMaintenance + ?Sized> {
    channel: &'a DmaChannel<R, S>,
    cache: &'a C,
    stats: &'a DmaStats,
    timeout_ms: u64,
}

impl<'a, R: RegisterIo, S: CompletionSignal, C: CacheMaintenance + ?Sized> Executor<'a, R, S, C> {
    pub fn new(
        channel: &'a DmaChannel<R, S>,
        cache: &'a C,
        stats: &'a DmaStats,
        timeout_ms: u64,
    ) -> Self {
        Self {
            channel,
            cache,
            stats,
            timeout_ms,
        }
    }

    /// Flush the source side and start the engine.
    ///
    /// The source is flushed for both directions: the bounce buffer before a
    /// write, the remote range before a read.
    pub fn begin(&self, desc: &TransferDescriptor) {
        self.cache.flush_range(desc.source(), desc.len);
        self.channel
            .launch(desc.source(), desc.destination(), desc.len);
    }

    /// Wait for the started transfer and account for it.
    pub fn finish(&self, desc: &TransferDescriptor) -> Result<(), TransferError> {
        match self.channel.wait(self.timeout_ms) {
            Ok(()) => {
                self.cache.flush_range(desc.destination(), desc.len);
                match desc.direction {
                    Direction::Read => self.stats.record_read(),
                    Direction::Write => self.stats.record_write(),
                }
                Ok(())
            }
            Err(TransferError::Timeout) => {
                self.stats.record_timeout();
                self.stats.record_error();
                log::error!(
                    "omniblk: DMA timeout after {} ms ({:?} {} bytes @ {:#x})",
                    self.timeout_ms,
                    desc.direction,
                    desc.len,
                    desc.remote
                );
                // TODO: decide on an engine reset once the controller documents one.
                log::warn!("omniblk: engine not reset after timeout; next transfer reuses it as-is");
                Err(TransferError::Timeout)
            }
            Err(err @ TransferError::Engine(status)) => {
                self.stats.record_error();
                log::error!("omniblk: DMA error ({status})");
                Err(err)
            }
        }
    }

    /// `begin` followed by `finish`.
    pub fn execute(&self, desc: &TransferDescriptor) -> Result<(), TransferError> {
        self.begin(desc);
        self.finish(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::WaitOutcome;
    use crate::regs::{DmaRegs, StatusFlags};
    use crate::stats::StatsSnapshot;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::vec::Vec;

    struct NullRegs;

    impl RegisterIo for NullRegs {
        fn read32(&self, _offset: usize) -> u32 {
            0x8
        }

        fn write32(&self, _offset: usize, _value: u32) {}
    }

    struct FixedSignal(AtomicBool);

    impl CompletionSignal for FixedSignal {
        fn reset(&self) {}

        fn wait(&self, _timeout_ms: u64) -> WaitOutcome {
            if self.0.load(Ordering::Relaxed) {
                WaitOutcome::Ready
            } else {
                WaitOutcome::TimedOut
            }
        }

        fn signal(&self) {
            self.0.store(true, Ordering::Relaxed);
        }
    }

    #[derive(Default)]
    struct RangeLog(Mutex<Vec<(u64, usize)>>);

    impl CacheMaintenance for RangeLog {
        fn flush_line(&self, _addr: u64) {}

        fn flush_range(&self, addr: u64, len: usize) {
            self.0.lock().unwrap().push((addr, len));
        }
    }

    fn channel(ready: bool, error_mask: StatusFlags) -> DmaChannel<NullRegs, FixedSignal> {
        DmaChannel::new(
            DmaRegs::new(NullRegs),
            FixedSignal(AtomicBool::new(ready)),
            error_mask,
        )
    }

    const LOCAL: u64 = 0x8010_0000;
    const REMOTE: u64 = 0x2_0000_0200;

    fn desc(direction: Direction) -> TransferDescriptor {
        TransferDescriptor {
            direction,
            local: LOCAL,
            remote: REMOTE,
            len: 4096,
        }
    }

    /// Tests: write flushes bounce buffer before and remote after, counts a write
    #[test]
    fn test_write_flush_order() {
        let ch = channel(true, StatusFlags::empty());
        let cache = RangeLog::default();
        let stats = DmaStats::new();
        let exec = Executor::new(&ch, &cache, &stats, 5000);

        assert_eq!(exec.execute(&desc(Direction::Write)), Ok(()));
        assert_eq!(*cache.0.lock().unwrap(), [(LOCAL, 4096), (REMOTE, 4096)]);
        assert_eq!(stats.snapshot().writes, 1);
        assert_eq!(stats.snapshot().reads, 0);
    }

    /// Tests: read flushes its source (remote) before and bounce buffer after
    #[test]
    fn test_read_flush_order() {
        let ch = channel(true, StatusFlags::empty());
        let cache = RangeLog::default();
        let stats = DmaStats::new();
        let exec = Executor::new(&ch, &cache, &stats, 5000);

        assert_eq!(exec.execute(&desc(Direction::Read)), Ok(()));
        assert_eq!(*cache.0.lock().unwrap(), [(REMOTE, 4096), (LOCAL, 4096)]);
        assert_eq!(stats.snapshot().reads, 1);
    }

    /// Tests: timeout bumps timeouts and errors by one, no destination flush
    #[test]
    fn test_timeout_accounting() {
        let ch = channel(false, StatusFlags::empty());
        let cache = RangeLog::default();
        let stats = DmaStats::new();
        let exec = Executor::new(&ch, &cache, &stats, 5000);

        assert_eq!(exec.execute(&desc(Direction::Write)), Err(TransferError::Timeout));
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                errors: 1,
                timeouts: 1,
                ..StatsSnapshot::default()
            }
        );
        assert_eq!(*cache.0.lock().unwrap(), [(LOCAL, 4096)]);
    }

    #[test]
    fn test_engine_error_accounting() {
        let ch = channel(true, StatusFlags::from_bits_retain(0x8));
        let cache = RangeLog::default();
        let stats = DmaStats::new();
        let exec = Executor::new(&ch, &cache, &stats, 5000);

        assert_eq!(
            exec.execute(&desc(Direction::Read)),
            Err(TransferError::Engine(crate::error::EngineStatus(0x8)))
        );
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                errors: 1,
                ..StatsSnapshot::default()
            }
        );
    }
}
