//! Request-path tests against the emulated controller.

mod scenario;

use std::sync::Arc;
use std::vec::Vec;

use crate::config::{CompletionMode, DeviceConfig};
use crate::device::OmniBlkDevice;
use crate::emu::{EmuBench, EmuClock, EmuPlatform, EmulatedDma, RecordingCache};

/// Small disk so the in-memory remote window stays cheap.
pub(crate) const TEST_DISK_MB: u64 = 8;

pub(crate) fn test_config() -> DeviceConfig {
    DeviceConfig::default().with_size_mb(TEST_DISK_MB)
}

pub(crate) fn bench(config: DeviceConfig) -> EmuBench {
    EmuBench::new(config, EmuClock::real()).unwrap()
}

/// Interrupt-mode bench whose timeouts expire after a few thousand polls.
pub(crate) fn stepped_bench(config: DeviceConfig) -> EmuBench {
    EmuBench::new(config, EmuClock::step()).unwrap()
}

/// A polling device with no interrupt line, owned outright.
pub(crate) fn polled_device() -> (Arc<EmulatedDma>, OmniBlkDevice<EmuPlatform>) {
    let config = test_config().with_completion(CompletionMode::polling());
    let dma = EmulatedDma::new(config.remote_base, config.size_bytes as usize, config.done_mask);
    let res = dma.resources(None, RecordingCache::new(), EmuClock::real());
    match OmniBlkDevice::probe(res, config) {
        Ok(device) => (dma, device),
        Err(err) => panic!("probe failed: {err}"),
    }
}

/// `len` bytes of consecutive words starting at `base`.
pub(crate) fn pattern(base: u32, len: usize) -> Vec<u8> {
    (0..len / 4)
        .flat_map(|i| base.wrapping_add(i as u32).to_ne_bytes())
        .collect()
}
