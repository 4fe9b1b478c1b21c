//! `StorageDevice` adapter: block-addressed access for in-kernel consumers.

use storage_device::{StorageDevice, StorageError};

use crate::SECTOR_SIZE;
use crate::device::{OmniBlkDevice, Platform};
use crate::request::BlockRequest;

impl<P: Platform> OmniBlkDevice<P> {
    /// Rejects empty or unaligned buffers and ranges past the end of the disk.
    fn check_range(&self, block_id: usize, len: usize) -> Result<u64, StorageError> {
        if len == 0 || len % SECTOR_SIZE != 0 {
            return Err(StorageError::InvalidBufferSize);
        }
        let first = block_id as u64;
        let blocks = (len / SECTOR_SIZE) as u64;
        match first.checked_add(blocks) {
            Some(end) if end <= self.capacity_sectors() => Ok(first),
            _ => Err(StorageError::InvalidBlock),
        }
    }

    /// Read whole sectors starting at `sector` into `buf`.
    pub fn read_sectors(&self, sector: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let sector = self.check_range(sector, buf.len())?;
        let mut segments = [buf];
        let mut rq = BlockRequest::read(sector, &mut segments);
        self.submit(&mut rq)?;
        Ok(())
    }

    /// Write whole sectors starting at `sector` from `buf`.
    pub fn write_sectors(&self, sector: usize, buf: &[u8]) -> Result<(), StorageError> {
        let sector = self.check_range(sector, buf.len())?;
        let segments = [buf];
        let mut rq = BlockRequest::write(sector, &segments);
        self.submit(&mut rq)?;
        Ok(())
    }
}

impl<P: Platform> StorageDevice for OmniBlkDevice<P> {
    fn block_size(&self) -> usize {
        SECTOR_SIZE
    }

    fn size_in_blocks(&self) -> usize {
        self.capacity_sectors() as usize
    }

    fn read_blocks(&mut self, block_id: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.read_sectors(block_id, buf)
    }

    fn write_blocks(&mut self, block_id: usize, buf: &[u8]) -> Result<(), StorageError> {
        self.write_sectors(block_id, buf)
    }
}
