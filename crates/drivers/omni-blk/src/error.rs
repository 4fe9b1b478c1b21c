//! Driver error types.

use core::fmt;

use omni_error::define_driver_error;
use storage_device::StorageError;

/// Raw status register value carried by an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus(pub u32);

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {:#010x}", self.0)
    }
}

define_driver_error! {
    /// Bring-up failures. Never produced once the device is running.
    pub enum ResourceError(0x01) {
        /// No register window was provided
        MissingRegisterWindow = 0x01, ENODEV => "Register window not provided",
        /// No interrupt line was provided in interrupt mode
        MissingIrq = 0x02, ENXIO => "Interrupt line not provided",
        /// Bounce buffer could not be allocated
        BufferAllocFailed = 0x03, ENOMEM => "Bounce buffer allocation failed",
        /// Configured size is zero or not sector aligned
        InvalidSize = 0x04, EINVAL => "Device size is zero or not sector aligned",
    }
}

define_driver_error! {
    /// Failure of a single programmed transfer.
    pub enum TransferError(0x02) {
        /// Completion did not arrive within the timeout
        Timeout = 0x01, ETIMEDOUT => "DMA transfer timed out",
        /// Status register reported an error bit
        Engine(EngineStatus) = 0x02, EIO => "DMA engine reported an error",
    }
}

define_driver_error! {
    /// Request failures. The block layer sees both as an I/O error.
    pub enum BlockError(0x03) {
        /// Operation other than read or write
        Unsupported = 0x01, EIO => "Unsupported block operation",
        /// A chunk transfer failed; the rest of the request was abandoned
        Io(TransferError) = 0x02, EIO => "Block I/O failed",
        /// Request reaches past the last sector
        OutOfRange = 0x03, EIO => "Request beyond device capacity",
    }
}

define_driver_error! {
    /// Diagnostic channel failures.
    pub enum DiagError(0x04) {
        /// Command number not recognized
        UnknownCommand = 0x01, ENOTTY => "Unknown diagnostic command",
        /// Output buffer shorter than the response
        BufferTooSmall = 0x02, EINVAL => "Output buffer too small",
    }
}

impl From<TransferError> for BlockError {
    fn from(err: TransferError) -> Self {
        Self::Io(err)
    }
}

impl From<BlockError> for StorageError {
    fn from(_err: BlockError) -> Self {
        StorageError::IoError
    }
}
