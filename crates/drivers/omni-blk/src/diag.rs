//! Diagnostic channel: capacity and statistics queries.
//!
//! Command numbers use the Linux `_IOC` encoding with magic `'O'` so a
//! control-device front end can forward raw ioctl numbers unchanged.

use core::mem::size_of;

use crate::device::{OmniBlkDevice, Platform};
use crate::error::DiagError;
use crate::stats::StatsSnapshot;

pub const OMNI_IOC_MAGIC: u8 = b'O';

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;

const IOC_NONE: u32 = 0;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
}

/// `_IO(ty, nr)`
pub const fn io(ty: u8, nr: u8) -> u32 {
    ioc(IOC_NONE, ty, nr, 0)
}

/// `_IOR(ty, nr, T)` with `size = size_of::<T>()`
pub const fn ior(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(IOC_READ, ty, nr, size)
}

pub const OMNI_IOC_GET_SIZE: u32 = ior(OMNI_IOC_MAGIC, 1, size_of::<u64>());
pub const OMNI_IOC_GET_STATS: u32 = ior(OMNI_IOC_MAGIC, 2, size_of::<StatsSnapshot>());
pub const OMNI_IOC_RESET_STATS: u32 = io(OMNI_IOC_MAGIC, 3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagCommand {
    /// Total addressable bytes.
    GetSize,
    /// The five transfer counters.
    GetStats,
    /// Zero the five counters.
    ResetStats,
}

impl DiagCommand {
    pub const fn ioctl_number(self) -> u32 {
        match self {
            Self::GetSize => OMNI_IOC_GET_SIZE,
            Self::GetStats => OMNI_IOC_GET_STATS,
            Self::ResetStats => OMNI_IOC_RESET_STATS,
        }
    }
}

impl TryFrom<u32> for DiagCommand {
    type Error = DiagError;

    fn try_from(cmd: u32) -> Result<Self, DiagError> {
        match cmd {
            OMNI_IOC_GET_SIZE => Ok(Self::GetSize),
            OMNI_IOC_GET_STATS => Ok(Self::GetStats),
            OMNI_IOC_RESET_STATS => Ok(Self::ResetStats),
            _ => Err(DiagError::UnknownCommand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagResponse {
    Size(u64),
    Stats(StatsSnapshot),
    Reset,
}

impl DiagResponse {
    /// Response payload as the ioctl caller receives it.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Size(size) => bytemuck::bytes_of(size),
            Self::Stats(stats) => bytemuck::bytes_of(stats),
            Self::Reset => &[],
        }
    }
}

impl<P: Platform> OmniBlkDevice<P> {
    pub fn diag(&self, cmd: DiagCommand) -> DiagResponse {
        match cmd {
            DiagCommand::GetSize => DiagResponse::Size(self.size_bytes()),
            DiagCommand::GetStats => DiagResponse::Stats(self.stats()),
            DiagCommand::ResetStats => {
                self.reset_stats();
                log::info!("{}: statistics reset", crate::DRIVER_NAME);
                DiagResponse::Reset
            }
        }
    }

    /// Decode a raw command number, run it and copy the response into `out`.
    /// Returns the number of bytes written.
    ///
    /// A short buffer is rejected before the command runs, so a reset is never
    /// half-reported.
    pub fn ioctl(&self, cmd: u32, out: &mut [u8]) -> Result<usize, DiagError> {
        let cmd = DiagCommand::try_from(cmd)?;
        let needed = match cmd {
            DiagCommand::GetSize => size_of::<u64>(),
            DiagCommand::GetStats => size_of::<StatsSnapshot>(),
            DiagCommand::ResetStats => 0,
        };
        if out.len() < needed {
            return Err(DiagError::BufferTooSmall);
        }
        let response = self.diag(cmd);
        let bytes = response.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }
}
