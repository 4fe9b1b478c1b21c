//! Bounce buffer: the only local memory the engine is pointed at.

use omni_hal::{DmaHal, DmaRegion};

use crate::BOUNCE_BUFFER_SIZE;
use crate::error::ResourceError;

/// Contents are only meaningful for the chunk currently using them.
pub struct BounceBuffer<H: DmaHal> {
    region: DmaRegion<H>,
}

impl<H: DmaHal> BounceBuffer<H> {
    pub fn alloc() -> Result<Self, ResourceError> {
        Self::with_capacity(BOUNCE_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, ResourceError> {
        let region = DmaRegion::alloc(capacity).ok_or(ResourceError::BufferAllocFailed)?;
        Ok(Self { region })
    }

    pub fn paddr(&self) -> u64 {
        self.region.paddr()
    }

    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Copy `src` to the start of the buffer. `src` must fit.
    pub fn stage(&mut self, src: &[u8]) {
        self.region.as_mut_slice()[..src.len()].copy_from_slice(src);
    }

    /// Copy the start of the buffer into `dst`. `dst` must fit.
    pub fn unstage(&self, dst: &mut [u8]) {
        let len = dst.len();
        dst.copy_from_slice(&self.region.as_slice()[..len]);
    }
}
