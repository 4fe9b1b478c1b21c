//! Completion synchronizer.
//!
//! A single-slot handoff between the worker that started a transfer and
//! whatever notices that it finished. The worker calls `reset()` before
//! starting the engine, so a completion raised right after the start bit is
//! written is never lost.

use core::sync::atomic::{AtomicBool, Ordering};

use omni_hal::{Clock, Deadline, RegisterIo};

use crate::config::CompletionMode;
use crate::regs::{DmaRegs, StatusFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
}

/// Single-waiter completion signal.
pub trait CompletionSignal: Send + Sync {
    /// Clear any pending completion. Called before every transfer start.
    fn reset(&self);

    /// Wait until signaled or until `timeout_ms` elapses.
    fn wait(&self, timeout_ms: u64) -> WaitOutcome;

    /// Mark the current transfer complete. Safe from interrupt context and a
    /// no-op beyond setting the flag when nobody waits.
    fn signal(&self);
}

/// Completion driven by the interrupt handler.
pub struct IrqCompletion<K: Clock> {
    done: AtomicBool,
    clock: K,
}

impl<K: Clock> IrqCompletion<K> {
    pub fn new(clock: K) -> Self {
        Self {
            done: AtomicBool::new(false),
            clock,
        }
    }

    fn take(&self) -> bool {
        self.done.swap(false, Ordering::AcqRel)
    }
}

impl<K: Clock> CompletionSignal for IrqCompletion<K> {
    fn reset(&self) {
        self.done.store(false, Ordering::Release);
    }

    fn wait(&self, timeout_ms: u64) -> WaitOutcome {
        let deadline = Deadline::after_ms(&self.clock, timeout_ms);
        loop {
            if self.take() {
                return WaitOutcome::Ready;
            }
            if deadline.expired() {
                // The interrupt may have landed between the check and the expiry.
                return if self.take() {
                    WaitOutcome::Ready
                } else {
                    WaitOutcome::TimedOut
                };
            }
            core::hint::spin_loop();
        }
    }

    fn signal(&self) {
        self.done.store(true, Ordering::Release);
    }
}

/// Completion detected by reading the status register.
///
/// `signal()` is honoured too, so an interrupt on a bound line ends the wait
/// before the next poll.
pub struct PollingCompletion<R: RegisterIo, K: Clock> {
    regs: DmaRegs<R>,
    done_mask: StatusFlags,
    interval_us: u64,
    signaled: AtomicBool,
    clock: K,
}

impl<R: RegisterIo, K: Clock> PollingCompletion<R, K> {
    pub fn new(regs: DmaRegs<R>, done_mask: StatusFlags, interval_us: u64, clock: K) -> Self {
        Self {
            regs,
            done_mask,
            interval_us,
            signaled: AtomicBool::new(false),
            clock,
        }
    }

    fn ready(&self) -> bool {
        self.signaled.swap(false, Ordering::AcqRel) || self.regs.status().intersects(self.done_mask)
    }
}

impl<R: RegisterIo, K: Clock> CompletionSignal for PollingCompletion<R, K> {
    fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    fn wait(&self, timeout_ms: u64) -> WaitOutcome {
        let deadline = Deadline::after_ms(&self.clock, timeout_ms);
        loop {
            if self.ready() {
                return WaitOutcome::Ready;
            }
            if deadline.expired() {
                return if self.ready() {
                    WaitOutcome::Ready
                } else {
                    WaitOutcome::TimedOut
                };
            }
            self.clock.delay_us(self.interval_us);
        }
    }

    fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

/// The strategy picked at construction from [`CompletionMode`].
pub enum Completion<R: RegisterIo, K: Clock> {
    Interrupt(IrqCompletion<K>),
    Polling(PollingCompletion<R, K>),
}

impl<R: RegisterIo, K: Clock> Completion<R, K> {
    pub fn new(mode: CompletionMode, regs: DmaRegs<R>, done_mask: StatusFlags, clock: K) -> Self {
        match mode {
            CompletionMode::Interrupt => Self::Interrupt(IrqCompletion::new(clock)),
            CompletionMode::Polling { interval_us } => {
                Self::Polling(PollingCompletion::new(regs, done_mask, interval_us, clock))
            }
        }
    }

    pub fn mode(&self) -> CompletionMode {
        match self {
            Self::Interrupt(_) => CompletionMode::Interrupt,
            Self::Polling(p) => CompletionMode::Polling {
                interval_us: p.interval_us,
            },
        }
    }
}

impl<R: RegisterIo, K: Clock> CompletionSignal for Completion<R, K> {
    fn reset(&self) {
        match self {
            Self::Interrupt(c) => c.reset(),
            Self::Polling(c) => c.reset(),
        }
    }

    fn wait(&self, timeout_ms: u64) -> WaitOutcome {
        match self {
            Self::Interrupt(c) => c.wait(timeout_ms),
            Self::Polling(c) => c.wait(timeout_ms),
        }
    }

    fn signal(&self) {
        match self {
            Self::Interrupt(c) => c.signal(),
            Self::Polling(c) => c.signal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::DMA_STATUS;
    use core::sync::atomic::{AtomicU32, AtomicU64};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// 1 kHz counter advancing one tick per read.
    #[derive(Default)]
    struct TickClock(AtomicU64);

    impl Clock for TickClock {
        fn read_counter(&self) -> u64 {
            self.0.fetch_add(1, Ordering::Relaxed)
        }

        fn read_frequency(&self) -> u64 {
            1000
        }
    }

    #[derive(Default)]
    struct StatusReg(AtomicU32);

    impl RegisterIo for StatusReg {
        fn read32(&self, offset: usize) -> u32 {
            if offset == DMA_STATUS {
                self.0.load(Ordering::Acquire)
            } else {
                0
            }
        }

        fn write32(&self, _offset: usize, _value: u32) {}
    }

    #[test]
    fn test_irq_signal_before_wait() {
        let c = IrqCompletion::new(TickClock::default());
        c.reset();
        c.signal();
        assert_eq!(c.wait(5000), WaitOutcome::Ready);
    }

    /// Tests: wait consumes the completion, reset discards a stale one
    #[test]
    fn test_irq_single_slot() {
        let c = IrqCompletion::new(TickClock::default());
        c.signal();
        assert_eq!(c.wait(10), WaitOutcome::Ready);
        assert_eq!(c.wait(10), WaitOutcome::TimedOut);

        c.signal();
        c.reset();
        assert_eq!(c.wait(10), WaitOutcome::TimedOut);
    }

    #[test]
    fn test_irq_timeout() {
        let c = IrqCompletion::new(TickClock::default());
        c.reset();
        assert_eq!(c.wait(5000), WaitOutcome::TimedOut);
    }

    #[test]
    fn test_irq_signal_from_other_thread() {
        let c = Arc::new(IrqCompletion::new(omni_hal::StdClock::new()));
        c.reset();
        let signaller = Arc::clone(&c);
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_micros(200));
            signaller.signal();
        });
        assert_eq!(c.wait(5000), WaitOutcome::Ready);
        h.join().unwrap();
    }

    #[test]
    fn test_polling_sees_done_bit() {
        let reg = Arc::new(StatusReg::default());
        let c = PollingCompletion::new(
            DmaRegs::new(Arc::clone(&reg)),
            StatusFlags::BLKDEV_DONE,
            10,
            TickClock::default(),
        );
        c.reset();
        assert_eq!(c.wait(50), WaitOutcome::TimedOut);

        reg.0.store(StatusFlags::BLKDEV_DONE.bits(), Ordering::Release);
        assert_eq!(c.wait(50), WaitOutcome::Ready);
    }

    /// Tests: the mask decides which encoding counts as done
    #[test]
    fn test_polling_ignores_other_done_encoding() {
        let reg = Arc::new(StatusReg::default());
        reg.0.store(StatusFlags::SCENARIO_DONE.bits(), Ordering::Release);
        let c = PollingCompletion::new(
            DmaRegs::new(Arc::clone(&reg)),
            StatusFlags::BLKDEV_DONE,
            10,
            TickClock::default(),
        );
        assert_eq!(c.wait(50), WaitOutcome::TimedOut);
    }

    /// Tests: an interrupt ends a polling wait even with the status bit clear
    #[test]
    fn test_polling_honours_signal() {
        let reg = Arc::new(StatusReg::default());
        let c = PollingCompletion::new(
            DmaRegs::new(reg),
            StatusFlags::SCENARIO_DONE,
            10,
            TickClock::default(),
        );
        c.reset();
        c.signal();
        assert_eq!(c.wait(50), WaitOutcome::Ready);
    }

    #[test]
    fn test_completion_mode_selection() {
        let regs = DmaRegs::new(Arc::new(StatusReg::default()));
        let irq = Completion::new(
            CompletionMode::Interrupt,
            regs.clone(),
            StatusFlags::BLKDEV_DONE,
            TickClock::default(),
        );
        assert_eq!(irq.mode(), CompletionMode::Interrupt);

        let poll = Completion::new(
            CompletionMode::polling(),
            regs,
            StatusFlags::BLKDEV_DONE,
            TickClock::default(),
        );
        assert_eq!(poll.mode(), CompletionMode::Polling { interval_us: 10 });
        poll.signal();
        assert_eq!(poll.wait(10), WaitOutcome::Ready);
    }
}
