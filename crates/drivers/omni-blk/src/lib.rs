//! OmniBlk: OmniXtend remote memory exposed as a block device.
//!
//! The remote region is only reachable through one DMA engine. Every block
//! request is cut into chunks no larger than the 1 MiB bounce buffer, and each
//! chunk is staged, transferred, waited for and unstaged while the request
//! holds the device's exclusion guard.
//!
//! Leaf to root:
//! - [`regs`]: register file layout and typed access
//! - [`completion`]: interrupt-driven and polling completion strategies
//! - [`channel`]: one programmed transfer on the engine
//! - [`executor`]: a transfer with cache maintenance and statistics
//! - [`chunker`]: segments to bounded chunks through the bounce buffer
//! - [`device`]: bring-up, entry point, interrupt handler, teardown
//! - [`diag`]: size and statistics queries
//!
//! Under the `emulator` feature, [`emu`] provides an in-memory engine model.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod bounce;
pub mod channel;
pub mod chunker;
pub mod completion;
pub mod config;
pub mod device;
pub mod diag;
pub mod error;
pub mod executor;
pub mod regs;
pub mod request;
pub mod scenario;
pub mod stats;
pub mod storage;

#[cfg(any(test, feature = "emulator"))]
pub mod emu;

#[cfg(test)]
mod tests;

pub use config::{CompletionMode, DeviceConfig, QueueLimits};
pub use device::{OmniBlkDevice, Platform, PlatformResources};
pub use error::{BlockError, DiagError, EngineStatus, ResourceError, TransferError};
pub use regs::StatusFlags;
pub use request::{BlockOp, BlockRequest, BlockStatus, RequestState};
pub use stats::StatsSnapshot;

/// Block device name.
pub const DRIVER_NAME: &str = "omniblk";
/// Platform driver name.
pub const PLATFORM_DRIVER_NAME: &str = "omni-blkdev";
pub const DRIVER_VERSION: &str = "1.0.0";
/// Device tree `compatible` string of the DMA controller node.
pub const COMPATIBLE: &str = "etri,omni-dma";

pub const SECTOR_SIZE: usize = 512;
pub const BOUNCE_BUFFER_SIZE: usize = 1024 * 1024;
pub const DMA_TIMEOUT_MS: u64 = 5000;
pub const CACHE_LINE_SIZE: usize = omni_hal::CACHE_LINE_SIZE;
pub const QUEUE_DEPTH: u32 = 64;
pub const NR_HW_QUEUES: u32 = 1;
pub const DEFAULT_SIZE_MB: u64 = 512;

/// Physical address of the DMA controller register window on the reference board.
pub const DMA_BASE_ADDR: u64 = 0x900_0000;
/// Bus address where the OmniXtend remote memory window starts.
pub const OMNI_REMOTE_MEM_BASE: u64 = 0x2_0000_0000;
