use std::sync::Arc;

use crate::channel::DmaChannel;
use crate::completion::Completion;
use crate::config::CompletionMode;
use crate::emu::{EmuClock, EmuRegs, EmuWindow, EmulatedDma, EngineBehavior, RecordingCache};
use crate::error::TransferError;
use crate::regs::{DmaRegs, StatusFlags};
use crate::scenario::{
    MemoryWindow, PATTERN_LOCAL_2, REMOTE_DMA_OFFSET, ScenarioLayout, Step, StepOutcome, TEST_SIZE,
    run,
};
use crate::OMNI_REMOTE_MEM_BASE;

type ScenarioChannel = DmaChannel<EmuRegs, Completion<EmuRegs, EmuClock>>;

struct Rig {
    dma: Arc<EmulatedDma>,
    window: EmuWindow,
    layout: ScenarioLayout,
    channel: ScenarioChannel,
    cache: RecordingCache,
}

fn rig(clock: EmuClock) -> Rig {
    let dma = EmulatedDma::new(OMNI_REMOTE_MEM_BASE, 0x2000, StatusFlags::SCENARIO_DONE);
    let window = EmuWindow::new(Arc::clone(&dma), 3, TEST_SIZE).unwrap();
    let local = [0, 1, 2].map(|i| window.local_addr(i).unwrap());
    let regs = DmaRegs::new(EmuRegs(Arc::clone(&dma)));
    let completion = Completion::new(
        CompletionMode::polling(),
        regs.clone(),
        StatusFlags::SCENARIO_DONE,
        clock,
    );
    Rig {
        dma,
        window,
        layout: ScenarioLayout {
            remote_base: OMNI_REMOTE_MEM_BASE,
            local,
        },
        channel: DmaChannel::new(regs, completion, StatusFlags::empty()),
        cache: RecordingCache::new(),
    }
}

/// Tests: all seven steps pass on a healthy engine
#[test]
fn test_scenario_passes() {
    let mut r = rig(EmuClock::real());
    let report = run(&r.channel, &r.cache, &mut r.window, &r.layout);
    assert!(report.passed(), "{report}");

    let remote_dma = OMNI_REMOTE_MEM_BASE + REMOTE_DMA_OFFSET;
    let [buf1, buf2, buf3] = r.layout.local;
    let pairs: std::vec::Vec<_> = r.dma.transfers().iter().map(|t| (t.src, t.dst, t.len)).collect();
    assert_eq!(
        pairs,
        [
            (buf1, buf3, TEST_SIZE),
            (buf2, remote_dma, TEST_SIZE),
            (remote_dma, buf3, TEST_SIZE),
        ]
    );
    assert_eq!(r.window.read_u32(remote_dma + 4 * 63), PATTERN_LOCAL_2 + 63);
    assert_eq!(r.window.read_u32(OMNI_REMOTE_MEM_BASE), 0xAA00_0000);
}

/// Tests: a hung engine fails step 4 and skips the rest
#[test]
fn test_scenario_stops_at_first_failure() {
    let mut r = rig(EmuClock::step());
    r.dma.set_behavior(EngineBehavior::Hang);
    let report = run(&r.channel, &r.cache, &mut r.window, &r.layout);

    assert!(!report.passed());
    assert_eq!(report.outcome(Step::PrepareLocal), StepOutcome::Passed);
    assert_eq!(
        report.outcome(Step::DmaLocalToLocal),
        StepOutcome::Dma(TransferError::Timeout)
    );
    for step in [Step::DmaLocalToRemote, Step::DmaRemoteToLocal, Step::FinalVerify] {
        assert_eq!(report.outcome(step), StepOutcome::Skipped);
    }
    assert_eq!(r.dma.transfers().len(), 1);
}

/// Tests: a transfer that completes without moving data is caught by verification
#[test]
fn test_scenario_reports_mismatches() {
    let mut r = rig(EmuClock::real());
    r.dma.set_behavior(EngineBehavior::Fault(0));
    let report = run(&r.channel, &r.cache, &mut r.window, &r.layout);

    match report.first_failure() {
        Some((Step::DmaLocalToLocal, StepOutcome::Mismatch(m))) => {
            assert_eq!(m.count, TEST_SIZE / 4);
            assert_eq!(m.reported().count(), crate::scenario::MAX_REPORTED_MISMATCHES);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(std::format!("{report}").contains("64 out of 64 words mismatched"));
}

/// Tests: every CPU write is flushed, and every transfer flushes source then destination
#[test]
fn test_scenario_flush_sequence() {
    let mut r = rig(EmuClock::real());
    let report = run(&r.channel, &r.cache, &mut r.window, &r.layout);
    assert!(report.passed(), "{report}");

    let remote = OMNI_REMOTE_MEM_BASE;
    let remote_dma = remote + REMOTE_DMA_OFFSET;
    let [buf1, buf2, buf3] = r.layout.local;
    let ranges: std::vec::Vec<u64> = r
        .cache
        .flushes()
        .iter()
        .map(|&(addr, len)| {
            assert_eq!(len, TEST_SIZE);
            addr
        })
        .collect();
    assert_eq!(
        ranges,
        [
            remote,
            buf1,
            buf2,
            buf3,
            buf1,
            buf3,
            buf3,
            buf2,
            remote_dma,
            remote_dma,
            buf3,
        ]
    );
}
