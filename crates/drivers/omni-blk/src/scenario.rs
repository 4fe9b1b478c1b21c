//! Bring-up scenario: the seven-step DMA self test.
//!
//! Exercises CPU access to remote memory and the three DMA directions
//! (local to local, local to remote, remote to local) on a raw channel,
//! outside the block request path.

use core::fmt;
use core::ptr::{read_volatile, write_volatile};

use omni_hal::{CacheMaintenance, RegisterIo};
use omni_utils::hex::format_hex32;

use crate::DMA_TIMEOUT_MS;
use crate::channel::DmaChannel;
use crate::completion::CompletionSignal;
use crate::error::TransferError;

/// Bytes moved by every step (64 words).
pub const TEST_SIZE: usize = 256;
/// Remote offset targeted by the DMA steps, clear of the CPU-written pattern.
pub const REMOTE_DMA_OFFSET: u64 = 0x1000;
/// Mismatches kept per step for reporting.
pub const MAX_REPORTED_MISMATCHES: usize = 10;

pub const PATTERN_REMOTE: u32 = 0xAA00_0000;
pub const PATTERN_LOCAL_1: u32 = 0xBB00_0000;
pub const PATTERN_LOCAL_2: u32 = 0xCC00_0000;

const WORDS: usize = TEST_SIZE / 4;

/// CPU load/store access to bus addresses.
pub trait MemoryWindow {
    fn read_u32(&self, addr: u64) -> u32;
    fn write_u32(&mut self, addr: u64, value: u32);
}

/// Identity-mapped physical memory accessed with volatile loads and stores.
pub struct MappedWindow(());

impl MappedWindow {
    /// # Safety
    ///
    /// Every address later passed to this window must be mapped at the same
    /// virtual address, 4-byte aligned, and safe to access from the CPU.
    pub unsafe fn new() -> Self {
        Self(())
    }
}

impl MemoryWindow for MappedWindow {
    fn read_u32(&self, addr: u64) -> u32 {
        // SAFETY: constructor contract.
        unsafe { read_volatile(addr as usize as *const u32) }
    }

    fn write_u32(&mut self, addr: u64, value: u32) {
        // SAFETY: constructor contract.
        unsafe { write_volatile(addr as usize as *mut u32, value) }
    }
}

/// Addresses the scenario runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioLayout {
    pub remote_base: u64,
    /// Three local buffers of at least [`TEST_SIZE`] bytes each.
    pub local: [u64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CpuWriteRemote,
    CpuReadRemote,
    PrepareLocal,
    DmaLocalToLocal,
    DmaLocalToRemote,
    DmaRemoteToLocal,
    FinalVerify,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::CpuWriteRemote,
        Step::CpuReadRemote,
        Step::PrepareLocal,
        Step::DmaLocalToLocal,
        Step::DmaLocalToRemote,
        Step::DmaRemoteToLocal,
        Step::FinalVerify,
    ];

    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::CpuWriteRemote => "CPU write to OmniXtend",
            Step::CpuReadRemote => "CPU read from OmniXtend",
            Step::PrepareLocal => "Prepare local buffers",
            Step::DmaLocalToLocal => "DMA local to local",
            Step::DmaLocalToRemote => "DMA local to OmniXtend",
            Step::DmaRemoteToLocal => "DMA OmniXtend to local",
            Step::FinalVerify => "Final CPU verification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub index: usize,
    pub expected: u32,
    pub actual: u32,
}

/// Word comparison result: total count plus the first few mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatches {
    pub count: usize,
    first: [Option<Mismatch>; MAX_REPORTED_MISMATCHES],
}

impl Mismatches {
    fn new() -> Self {
        Self {
            count: 0,
            first: [None; MAX_REPORTED_MISMATCHES],
        }
    }

    fn push(&mut self, m: Mismatch) {
        if let Some(slot) = self.first.get_mut(self.count) {
            *slot = Some(m);
        }
        self.count += 1;
    }

    pub fn reported(&self) -> impl Iterator<Item = &Mismatch> {
        self.first.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    Mismatch(Mismatches),
    Dma(TransferError),
    /// Not run because an earlier step failed.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioReport {
    pub outcomes: [StepOutcome; 7],
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| *o == StepOutcome::Passed)
    }

    pub fn outcome(&self, step: Step) -> StepOutcome {
        self.outcomes[step as usize]
    }

    /// First step that did not pass, if any.
    pub fn first_failure(&self) -> Option<(Step, StepOutcome)> {
        Step::ALL
            .iter()
            .zip(self.outcomes.iter())
            .find(|(_, o)| !matches!(o, StepOutcome::Passed))
            .map(|(s, o)| (*s, *o))
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut expected = [0u8; 10];
        let mut actual = [0u8; 10];
        for (step, outcome) in Step::ALL.iter().zip(self.outcomes.iter()) {
            let verdict = match outcome {
                StepOutcome::Passed => "PASSED",
                StepOutcome::Mismatch(_) | StepOutcome::Dma(_) => "FAILED",
                StepOutcome::Skipped => "SKIPPED",
            };
            writeln!(f, "Step {}: {:<28} {verdict}", step.number(), step.title())?;
            match outcome {
                StepOutcome::Mismatch(m) => {
                    for mm in m.reported() {
                        writeln!(
                            f,
                            "  [{:02}] MISMATCH: expected {}, got {}",
                            mm.index,
                            format_hex32(mm.expected, &mut expected),
                            format_hex32(mm.actual, &mut actual)
                        )?;
                    }
                    writeln!(f, "  {} out of {WORDS} words mismatched", m.count)?;
                }
                StepOutcome::Dma(err) => writeln!(f, "  {err}")?,
                StepOutcome::Passed | StepOutcome::Skipped => {}
            }
        }
        Ok(())
    }
}

fn pattern(base: u32, i: usize) -> u32 {
    base.wrapping_add(i as u32)
}

fn fill<W: MemoryWindow + ?Sized>(window: &mut W, addr: u64, f: impl Fn(usize) -> u32) {
    for i in 0..WORDS {
        window.write_u32(addr + 4 * i as u64, f(i));
    }
}

fn verify<W: MemoryWindow + ?Sized>(window: &W, addr: u64, base: u32) -> StepOutcome {
    let mut mismatches = Mismatches::new();
    for i in 0..WORDS {
        let expected = pattern(base, i);
        let actual = window.read_u32(addr + 4 * i as u64);
        if actual != expected {
            mismatches.push(Mismatch {
                index: i,
                expected,
                actual,
            });
        }
    }
    if mismatches.count == 0 {
        StepOutcome::Passed
    } else {
        StepOutcome::Mismatch(mismatches)
    }
}

/// Source flush, transfer, destination flush.
fn dma_step<R, S, C>(
    channel: &DmaChannel<R, S>,
    cache: &C,
    src: u64,
    dst: u64,
) -> StepOutcome
where
    R: RegisterIo,
    S: CompletionSignal,
    C: CacheMaintenance + ?Sized,
{
    log::info!("[DMA] {src:#018x} -> {dst:#018x} ({TEST_SIZE} bytes)");
    cache.flush_range(src, TEST_SIZE);
    match channel.transfer(src, dst, TEST_SIZE, DMA_TIMEOUT_MS) {
        Ok(()) => {
            cache.flush_range(dst, TEST_SIZE);
            StepOutcome::Passed
        }
        Err(err) => {
            log::error!("[DMA] {err}");
            StepOutcome::Dma(err)
        }
    }
}

/// Run all seven steps in order, stopping at the first failure.
pub fn run<R, S, C, W>(
    channel: &DmaChannel<R, S>,
    cache: &C,
    window: &mut W,
    layout: &ScenarioLayout,
) -> ScenarioReport
where
    R: RegisterIo,
    S: CompletionSignal,
    C: CacheMaintenance + ?Sized,
    W: MemoryWindow + ?Sized,
{
    let remote = layout.remote_base;
    let remote_dma = remote + REMOTE_DMA_OFFSET;
    let [buf1, buf2, buf3] = layout.local;

    let mut outcomes = [StepOutcome::Skipped; 7];
    for (slot, step) in outcomes.iter_mut().zip(Step::ALL) {
        log::info!("STEP {}: {}", step.number(), step.title());
        let outcome = match step {
            Step::CpuWriteRemote => {
                fill(window, remote, |i| pattern(PATTERN_REMOTE, i));
                cache.flush_range(remote, TEST_SIZE);
                StepOutcome::Passed
            }
            Step::CpuReadRemote => verify(window, remote, PATTERN_REMOTE),
            Step::PrepareLocal => {
                fill(window, buf1, |i| pattern(PATTERN_LOCAL_1, i));
                fill(window, buf2, |i| pattern(PATTERN_LOCAL_2, i));
                fill(window, buf3, |_| 0);
                for buf in layout.local {
                    cache.flush_range(buf, TEST_SIZE);
                }
                StepOutcome::Passed
            }
            Step::DmaLocalToLocal => match dma_step(channel, cache, buf1, buf3) {
                StepOutcome::Passed => verify(window, buf3, PATTERN_LOCAL_1),
                other => other,
            },
            Step::DmaLocalToRemote => {
                fill(window, buf3, |_| 0);
                cache.flush_range(buf3, TEST_SIZE);
                dma_step(channel, cache, buf2, remote_dma)
            }
            Step::DmaRemoteToLocal => match dma_step(channel, cache, remote_dma, buf3) {
                StepOutcome::Passed => verify(window, buf3, PATTERN_LOCAL_2),
                other => other,
            },
            Step::FinalVerify => verify(window, remote_dma, PATTERN_LOCAL_2),
        };
        *slot = outcome;
        if outcome == StepOutcome::Passed {
            log::info!("[SUCCESS] step {} passed", step.number());
        } else {
            log::error!("[FAIL] step {} failed", step.number());
            break;
        }
    }
    ScenarioReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_report_caps_entries() {
        let mut m = Mismatches::new();
        for i in 0..15 {
            m.push(Mismatch {
                index: i,
                expected: pattern(PATTERN_LOCAL_1, i),
                actual: 0,
            });
        }
        assert_eq!(m.count, 15);
        assert_eq!(m.reported().count(), MAX_REPORTED_MISMATCHES);
        assert_eq!(m.reported().last().map(|x| x.index), Some(9));
    }

    #[test]
    fn test_step_numbering() {
        assert_eq!(Step::CpuWriteRemote.number(), 1);
        assert_eq!(Step::FinalVerify.number(), 7);
    }

    /// Tests: volatile window over plain memory
    #[test]
    fn test_mapped_window() {
        let mut words = [0u32; 4];
        let base = words.as_mut_ptr() as u64;
        // SAFETY: every address used below lies inside `words`.
        let mut window = unsafe { MappedWindow::new() };
        window.write_u32(base + 4, 0xCC00_0001);
        assert_eq!(window.read_u32(base + 4), 0xCC00_0001);
        assert_eq!(words[1], 0xCC00_0001);
    }

    #[test]
    fn test_report_display() {
        let mut mismatches = Mismatches::new();
        mismatches.push(Mismatch {
            index: 3,
            expected: 0xBB00_0003,
            actual: 0,
        });
        let mut outcomes = [StepOutcome::Passed; 7];
        outcomes[3] = StepOutcome::Mismatch(mismatches);
        outcomes[4] = StepOutcome::Skipped;
        outcomes[5] = StepOutcome::Skipped;
        outcomes[6] = StepOutcome::Skipped;
        let report = ScenarioReport { outcomes };

        assert!(!report.passed());
        assert_eq!(report.first_failure().map(|(s, _)| s), Some(Step::DmaLocalToLocal));
        let text = std::format!("{report}");
        assert!(text.contains("Step 4: DMA local to local"));
        assert!(text.contains("[03] MISMATCH: expected 0xbb000003, got 0x00000000"));
        assert!(text.contains("1 out of 64 words mismatched"));
        assert!(text.contains("SKIPPED"));
    }
}
