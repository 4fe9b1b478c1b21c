//! `xtask scenario`: the bring-up self test on the emulated controller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use omni_blk::OMNI_REMOTE_MEM_BASE;
use omni_blk::channel::DmaChannel;
use omni_blk::completion::Completion;
use omni_blk::config::CompletionMode;
use omni_blk::emu::{EmuClock, EmuRegs, EmuWindow, EmulatedDma, EngineBehavior, RecordingCache};
use omni_blk::regs::{DmaRegs, StatusFlags};
use omni_blk::scenario::{
    self, MemoryWindow, REMOTE_DMA_OFFSET, ScenarioLayout, ScenarioReport, Step, StepOutcome, TEST_SIZE,
};
use omni_utils::hex::WordDump;
use serde::Serialize;

pub struct ScenarioOptions {
    pub deferred_us: u64,
    pub hang: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct StepJson {
    step: usize,
    title: &'static str,
    outcome: String,
    mismatches: usize,
}

fn to_json(report: &ScenarioReport) -> Vec<StepJson> {
    Step::ALL
        .iter()
        .map(|&step| {
            let outcome = report.outcome(step);
            let (label, mismatches) = match outcome {
                StepOutcome::Passed => ("passed".to_string(), 0),
                StepOutcome::Mismatch(m) => ("mismatch".to_string(), m.count),
                StepOutcome::Dma(err) => (err.to_string(), 0),
                StepOutcome::Skipped => ("skipped".to_string(), 0),
            };
            StepJson {
                step: step.number(),
                title: step.title(),
                outcome: label,
                mismatches,
            }
        })
        .collect()
}

fn behavior(opts: &ScenarioOptions) -> EngineBehavior {
    if opts.hang {
        EngineBehavior::Hang
    } else if opts.deferred_us > 0 {
        EngineBehavior::Deferred(Duration::from_micros(opts.deferred_us))
    } else {
        EngineBehavior::Immediate
    }
}

pub fn run(opts: &ScenarioOptions) -> Result<()> {
    let window_len = REMOTE_DMA_OFFSET as usize + TEST_SIZE;
    let dma = EmulatedDma::new(OMNI_REMOTE_MEM_BASE, window_len, StatusFlags::SCENARIO_DONE);
    dma.set_behavior(behavior(opts));

    let mut window =
        EmuWindow::new(Arc::clone(&dma), 3, TEST_SIZE).context("failed to allocate local buffers")?;
    let mut local = [0u64; 3];
    for (i, slot) in local.iter_mut().enumerate() {
        *slot = window.local_addr(i).context("missing local buffer")?;
    }
    let layout = ScenarioLayout {
        remote_base: OMNI_REMOTE_MEM_BASE,
        local,
    };

    let regs = DmaRegs::new(EmuRegs(Arc::clone(&dma)));
    let completion = Completion::new(
        CompletionMode::polling(),
        regs.clone(),
        StatusFlags::SCENARIO_DONE,
        EmuClock::real(),
    );
    let channel = DmaChannel::new(regs, completion, StatusFlags::empty());
    let cache = RecordingCache::new();

    eprintln!("[info] OmniXtend window @ {OMNI_REMOTE_MEM_BASE:#x}");
    for (i, addr) in local.iter().enumerate() {
        eprintln!("[info] local buffer {} @ {addr:#x}", i + 1);
    }

    let report = scenario::run(&channel, &cache, &mut window, &layout);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&to_json(&report))?);
    } else {
        print!("{report}");
        let remote_dma = OMNI_REMOTE_MEM_BASE + REMOTE_DMA_OFFSET;
        let words: Vec<u32> = (0..TEST_SIZE as u64 / 4)
            .map(|i| window.read_u32(remote_dma + 4 * i))
            .collect();
        println!("OmniXtend @ {remote_dma:#x}:\n{}", WordDump::new(&words));
    }
    eprintln!("[info] {} cache flushes, {} transfers", cache.flushes().len(), dma.transfers().len());

    if let Some((step, _)) = report.first_failure() {
        bail!("scenario failed at step {} ({})", step.number(), step.title());
    }
    eprintln!("[OK] all steps passed");
    Ok(())
}
