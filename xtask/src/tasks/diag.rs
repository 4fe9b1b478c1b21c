//! `xtask ioctl`: diagnostic commands against a freshly probed device.

use anyhow::{Context, Result, bail};
use omni_blk::diag::DiagCommand;
use omni_blk::emu::{EmuBench, EmuClock};
use omni_blk::{DeviceConfig, SECTOR_SIZE, StatsSnapshot};

use crate::cli::IoctlCmd;

pub fn run(cmd: IoctlCmd, size_mb: u64, warmup: usize, json: bool) -> Result<()> {
    let config = DeviceConfig::default().with_size_mb(size_mb);
    let bench = EmuBench::new(config, EmuClock::real()).context("probe failed")?;

    let mut sector = [0u8; SECTOR_SIZE];
    for i in 0..warmup {
        sector.fill(i as u8);
        bench.device.write_sectors(i, &sector).context("warmup write failed")?;
        bench.device.read_sectors(i, &mut sector).context("warmup read failed")?;
    }

    let command = match cmd {
        IoctlCmd::GetSize => DiagCommand::GetSize,
        IoctlCmd::GetStats => DiagCommand::GetStats,
        IoctlCmd::ResetStats => DiagCommand::ResetStats,
    };
    let number = command.ioctl_number();
    let mut out = [0u8; 64];
    let n = bench
        .device
        .ioctl(number, &mut out)
        .with_context(|| format!("ioctl {number:#010x} failed"))?;
    eprintln!("[info] ioctl {number:#010x} returned {n} bytes");

    match command {
        DiagCommand::GetSize => {
            let Ok(bytes) = <[u8; 8]>::try_from(&out[..n]) else {
                bail!("short size response ({n} bytes)");
            };
            let size = u64::from_ne_bytes(bytes);
            if json {
                println!("{}", serde_json::json!({ "size_bytes": size }));
            } else {
                println!("{size} bytes ({} MiB)", size >> 20);
            }
            Ok(())
        }
        DiagCommand::GetStats => {
            let stats: StatsSnapshot = bytemuck::try_pod_read_unaligned(&out[..n])
                .map_err(|e| anyhow::anyhow!("bad stats response: {e:?}"))?;
            super::report::print_stats(stats, json)
        }
        DiagCommand::ResetStats => super::report::print_stats(bench.device.stats(), json),
    }
}
