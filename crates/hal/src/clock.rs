//! Monotonic counters, busy-wait delays and deadlines.

/// A free-running monotonic counter.
pub trait Clock: Send + Sync {
    /// Read the current counter value.
    fn read_counter(&self) -> u64;

    /// Counter ticks per second.
    fn read_frequency(&self) -> u64;

    /// Busy-wait for at least `us` microseconds.
    fn delay_us(&self, us: u64) {
        let ticks = us_to_ticks(us, self.read_frequency()).max(1);
        let start = self.read_counter();
        while self.read_counter().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}

/// Converts a microsecond interval to counter ticks, saturating.
pub fn us_to_ticks(us: u64, frequency: u64) -> u64 {
    let ticks = u128::from(us) * u128::from(frequency) / 1_000_000;
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

/// A point in the future measured on a [`Clock`].
///
/// A clock reporting a zero frequency makes every deadline expire at once.
pub struct Deadline<'c, C: Clock + ?Sized> {
    clock: &'c C,
    start: u64,
    ticks: u64,
}

impl<'c, C: Clock + ?Sized> Deadline<'c, C> {
    pub fn after_ms(clock: &'c C, ms: u64) -> Self {
        Self::after_us(clock, ms.saturating_mul(1000))
    }

    pub fn after_us(clock: &'c C, us: u64) -> Self {
        let ticks = us_to_ticks(us, clock.read_frequency());
        Self {
            clock,
            start: clock.read_counter(),
            ticks,
        }
    }

    pub fn expired(&self) -> bool {
        self.clock.read_counter().wrapping_sub(self.start) >= self.ticks
    }

    pub fn clock(&self) -> &'c C {
        self.clock
    }
}

/// RISC-V `time` CSR, ticking at the platform timebase frequency.
#[cfg(target_arch = "riscv64")]
#[derive(Debug, Clone, Copy)]
pub struct RiscvTimeClock {
    timebase_hz: u64,
}

#[cfg(target_arch = "riscv64")]
impl RiscvTimeClock {
    /// `timebase_hz` is the `timebase-frequency` of the `/cpus` node.
    pub const fn new(timebase_hz: u64) -> Self {
        Self { timebase_hz }
    }
}

#[cfg(target_arch = "riscv64")]
impl Clock for RiscvTimeClock {
    fn read_counter(&self) -> u64 {
        let val: u64;
        // SAFETY: rdtime only reads the time CSR.
        unsafe {
            core::arch::asm!("rdtime {}", out(reg) val, options(nomem, nostack));
        }
        val
    }

    fn read_frequency(&self) -> u64 {
        self.timebase_hz
    }
}

/// Host wall clock with nanosecond ticks; delays sleep the thread.
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for StdClock {
    fn read_counter(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn read_frequency(&self) -> u64 {
        1_000_000_000
    }

    fn delay_us(&self, us: u64) {
        std::thread::sleep(std::time::Duration::from_micros(us));
    }
}
