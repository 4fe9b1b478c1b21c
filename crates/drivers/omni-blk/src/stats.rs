//! Lock-free transfer statistics.
//!
//! Counters are bumped from worker context and from the interrupt handler, and
//! read by the diagnostic channel without taking any lock.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};

#[derive(Debug, Default)]
pub struct DmaStats {
    reads: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    irqs: AtomicU64,
}

/// Point-in-time copy of the counters.
///
/// Layout is the diagnostic channel's wire format: five native-endian `u64`
/// in this order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct StatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub irqs: u64,
}

impl DmaStats {
    pub const fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            irqs: AtomicU64::new(0),
        }
    }

    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_irq(&self) {
        self.irqs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            irqs: self.irqs.load(Ordering::Relaxed),
        }
    }

    /// Zero all five counters.
    pub fn reset(&self) {
        for counter in [
            &self.reads,
            &self.writes,
            &self.errors,
            &self.timeouts,
            &self.irqs,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reads: {}, writes: {}, errors: {}, timeouts: {}, irqs: {}",
            self.reads, self.writes, self.errors, self.timeouts, self.irqs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_counters_are_independent() {
        let stats = DmaStats::new();
        stats.record_read();
        stats.record_read();
        stats.record_write();
        stats.record_timeout();
        stats.record_error();
        stats.record_irq();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                reads: 2,
                writes: 1,
                errors: 1,
                timeouts: 1,
                irqs: 1,
            }
        );
    }

    /// Tests: reset zeroes everything, repeated snapshots are idempotent
    #[test]
    fn test_reset_then_snapshot() {
        let stats = DmaStats::new();
        stats.record_write();
        stats.record_irq();
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert_eq!(stats.snapshot(), stats.snapshot());
    }

    #[test]
    fn test_snapshot_wire_layout() {
        let snap = StatsSnapshot {
            reads: 1,
            writes: 2,
            errors: 3,
            timeouts: 4,
            irqs: 5,
        };
        let bytes = bytemuck::bytes_of(&snap);
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[8..16], &2u64.to_ne_bytes());
        assert_eq!(&bytes[32..40], &5u64.to_ne_bytes());
    }

    #[test]
    fn test_snapshot_display() {
        let snap = StatsSnapshot {
            reads: 3,
            writes: 4,
            ..StatsSnapshot::default()
        };
        assert_eq!(
            snap.to_string(),
            "reads: 3, writes: 4, errors: 0, timeouts: 0, irqs: 0"
        );
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(DmaStats::new());
        let handles: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_irq();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().irqs, 4000);
    }
}
