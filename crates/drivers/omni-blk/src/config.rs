//! Device configuration.

use crate::error::ResourceError;
use crate::regs::StatusFlags;
use crate::{
    BOUNCE_BUFFER_SIZE, DEFAULT_SIZE_MB, NR_HW_QUEUES, OMNI_REMOTE_MEM_BASE, QUEUE_DEPTH,
    SECTOR_SIZE,
};

/// How the driver learns that a transfer finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// The interrupt handler signals the waiting worker.
    #[default]
    Interrupt,
    /// The worker reads the status register every `interval_us` microseconds.
    /// An interrupt, if one is bound, still completes the wait early.
    Polling { interval_us: u64 },
}

impl CompletionMode {
    pub const DEFAULT_POLL_INTERVAL_US: u64 = 10;

    pub const fn polling() -> Self {
        Self::Polling {
            interval_us: Self::DEFAULT_POLL_INTERVAL_US,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Size of the remote memory window exposed as the disk.
    pub size_bytes: u64,
    /// Bus address of sector 0.
    pub remote_base: u64,
    /// Status bits meaning "transfer done".
    pub done_mask: StatusFlags,
    /// Status bits meaning "transfer failed". Empty disables the check.
    pub error_mask: StatusFlags,
    pub completion: CompletionMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            size_bytes: DEFAULT_SIZE_MB * 1024 * 1024,
            remote_base: OMNI_REMOTE_MEM_BASE,
            done_mask: StatusFlags::BLKDEV_DONE,
            error_mask: StatusFlags::empty(),
            completion: CompletionMode::Interrupt,
        }
    }
}

impl DeviceConfig {
    /// Settings used by the bring-up scenario tool: scenario done bit, polling.
    pub fn scenario() -> Self {
        Self {
            done_mask: StatusFlags::SCENARIO_DONE,
            completion: CompletionMode::polling(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_size_mb(mut self, size_mb: u64) -> Self {
        self.size_bytes = size_mb.saturating_mul(1024 * 1024);
        self
    }

    #[must_use]
    pub fn with_remote_base(mut self, remote_base: u64) -> Self {
        self.remote_base = remote_base;
        self
    }

    #[must_use]
    pub fn with_done_mask(mut self, done_mask: StatusFlags) -> Self {
        self.done_mask = done_mask;
        self
    }

    #[must_use]
    pub fn with_error_mask(mut self, error_mask: StatusFlags) -> Self {
        self.error_mask = error_mask;
        self
    }

    #[must_use]
    pub fn with_completion(mut self, completion: CompletionMode) -> Self {
        self.completion = completion;
        self
    }

    /// Checks the size and returns the capacity in sectors.
    pub fn capacity_sectors(&self) -> Result<u64, ResourceError> {
        let sector = SECTOR_SIZE as u64;
        if self.size_bytes == 0 || self.size_bytes % sector != 0 {
            return Err(ResourceError::InvalidSize);
        }
        Ok(self.size_bytes / sector)
    }
}

/// Request queue limits advertised to the block layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub logical_block_size: u32,
    pub physical_block_size: u32,
    /// Largest request in sectors; one bounce buffer worth.
    pub max_hw_sectors: u32,
    pub queue_depth: u32,
    pub nr_hw_queues: u32,
    /// `queue_rq` may sleep.
    pub blocking: bool,
}

impl QueueLimits {
    pub const fn new() -> Self {
        Self {
            logical_block_size: SECTOR_SIZE as u32,
            physical_block_size: SECTOR_SIZE as u32,
            max_hw_sectors: (BOUNCE_BUFFER_SIZE / SECTOR_SIZE) as u32,
            queue_depth: QUEUE_DEPTH,
            nr_hw_queues: NR_HW_QUEUES,
            blocking: true,
        }
    }
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self::new()
    }
}
