//! `xtask exercise`: concurrent round trips through the block request path.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail, ensure};
use omni_blk::emu::{EmuBench, EmuClock, EngineBehavior};
use omni_blk::{BlockRequest, BlockStatus, CompletionMode, DeviceConfig, OmniBlkDevice, SECTOR_SIZE};

use crate::cli::CompletionArg;

pub struct ExerciseOptions {
    pub size_mb: u64,
    pub threads: usize,
    pub requests: usize,
    pub request_kb: usize,
    pub completion: CompletionArg,
    pub deferred_us: u64,
    pub json: bool,
}

fn pattern(seed: u32, len: usize) -> Vec<u8> {
    (0..len / 4)
        .flat_map(|i| seed.wrapping_add(i as u32).to_ne_bytes())
        .collect()
}

fn worker<P: omni_blk::Platform>(
    device: &OmniBlkDevice<P>,
    id: usize,
    sector: u64,
    requests: usize,
    len: usize,
) -> Result<()> {
    for round in 0..requests {
        let data = pattern(((id as u32) << 24) | ((round as u32) << 16), len);
        let segs = [&data[..]];
        let mut rq = BlockRequest::write(sector, &segs);
        if device.queue_rq(&mut rq) != BlockStatus::Ok {
            bail!("thread {id} round {round}: write at sector {sector} failed");
        }

        let mut back = vec![0u8; len];
        let mut segs = [&mut back[..]];
        let mut rq = BlockRequest::read(sector, &mut segs);
        if device.queue_rq(&mut rq) != BlockStatus::Ok {
            bail!("thread {id} round {round}: read at sector {sector} failed");
        }
        if back != data {
            bail!("thread {id} round {round}: data mismatch at sector {sector}");
        }
    }
    Ok(())
}

pub fn run(opts: &ExerciseOptions) -> Result<()> {
    let len = opts.request_kb * 1024;
    ensure!(len > 0 && len % SECTOR_SIZE == 0, "request size must be a positive multiple of {SECTOR_SIZE} bytes");
    ensure!(opts.threads > 0, "need at least one thread");

    let completion = match opts.completion {
        CompletionArg::Irq => CompletionMode::Interrupt,
        CompletionArg::Poll => CompletionMode::polling(),
    };
    let config = DeviceConfig::default()
        .with_size_mb(opts.size_mb)
        .with_completion(completion);
    ensure!(
        (opts.threads * len) as u64 <= config.size_bytes,
        "{} threads x {} KiB do not fit in {} MiB",
        opts.threads,
        opts.request_kb,
        opts.size_mb
    );

    let bench = EmuBench::new(config, EmuClock::real()).context("probe failed")?;
    if opts.deferred_us > 0 {
        bench
            .dma
            .set_behavior(EngineBehavior::Deferred(Duration::from_micros(opts.deferred_us)));
    }

    let sectors_per_thread = (len / SECTOR_SIZE) as u64;
    let device = &*bench.device;
    let start = Instant::now();
    thread::scope(|s| -> Result<()> {
        let handles: Vec<_> = (0..opts.threads)
            .map(|id| {
                let sector = id as u64 * sectors_per_thread;
                s.spawn(move || worker(device, id, sector, opts.requests, len))
            })
            .collect();
        for h in handles {
            h.join().map_err(|_| anyhow!("worker thread panicked"))??;
        }
        Ok(())
    })?;
    let elapsed = start.elapsed();

    let total = opts.threads * opts.requests * 2;
    eprintln!(
        "[info] {total} requests ({} KiB each) in {:.3}s, {} engine transfers",
        opts.request_kb,
        elapsed.as_secs_f64(),
        bench.dma.transfers().len()
    );
    if bench.dma.overlap_detected() {
        bail!("engine saw overlapping transfers");
    }

    let json = opts.json;
    let stats = bench.remove();
    super::report::print_stats(stats, json)
}
