//! Block storage device trait.
//!
//! Consumers (filesystems, partition scanners) address a device in fixed-size
//! blocks without knowing how the driver moves the data.

#![no_std]

/// Errors returned by storage devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Device has not been initialized or was removed.
    NotReady,
    /// The transfer failed.
    IoError,
    /// Block index (or the block range of the buffer) is out of range.
    InvalidBlock,
    /// Buffer length is zero or not a multiple of the block size.
    InvalidBufferSize,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::NotReady => "device not ready",
            Self::IoError => "I/O error",
            Self::InvalidBlock => "block out of range",
            Self::InvalidBufferSize => "buffer size is not a multiple of the block size",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for StorageError {}

/// A device addressed in fixed-size blocks.
pub trait StorageDevice {
    /// Size of one block in bytes.
    fn block_size(&self) -> usize;

    /// Total number of blocks.
    fn size_in_blocks(&self) -> usize;

    /// Read `buf.len() / block_size()` blocks starting at `block_id`.
    fn read_blocks(&mut self, block_id: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `buf.len() / block_size()` blocks starting at `block_id`.
    fn write_blocks(&mut self, block_id: usize, buf: &[u8]) -> Result<(), StorageError>;

    /// Total capacity in bytes.
    fn capacity_bytes(&self) -> u64 {
        self.size_in_blocks() as u64 * self.block_size() as u64
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::string::ToString;

    struct NullDevice;

    impl StorageDevice for NullDevice {
        fn block_size(&self) -> usize {
            512
        }

        fn size_in_blocks(&self) -> usize {
            1 << 20
        }

        fn read_blocks(&mut self, _block_id: usize, _buf: &mut [u8]) -> Result<(), StorageError> {
            Err(StorageError::NotReady)
        }

        fn write_blocks(&mut self, _block_id: usize, _buf: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::NotReady)
        }
    }

    #[test]
    fn test_capacity_bytes() {
        assert_eq!(NullDevice.capacity_bytes(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(StorageError::InvalidBlock.to_string(), "block out of range");
    }
}
