//! Block I/O requests as handed to the driver's entry point.

use crate::executor::Direction;

/// Operation kinds the block layer may submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOp {
    Read,
    Write,
    Flush,
    Discard,
    WriteZeroes,
}

impl BlockOp {
    /// Transfer direction, or `None` for kinds the driver does not support.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Read => Some(Direction::Read),
            Self::Write => Some(Direction::Write),
            Self::Flush | Self::Discard | Self::WriteZeroes => None,
        }
    }
}

/// Request lifecycle.
///
/// `Staging`, `Transferring` and `WaitingCompletion` repeat per chunk;
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Started,
    Staging,
    Transferring,
    WaitingCompletion,
    Completed,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Status reported back to the block layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Ok,
    IoError,
}

/// Caller buffers, in sector order.
pub enum Segments<'r, 'b> {
    /// Destinations of a read.
    Read(&'r mut [&'b mut [u8]]),
    /// Sources of a write.
    Write(&'r [&'b [u8]]),
    /// Operations that carry no data.
    None,
}

impl Segments<'_, '_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Read(segs) => segs.len(),
            Self::Write(segs) => segs.len(),
            Self::None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all segment lengths.
    pub fn total_bytes(&self) -> usize {
        match self {
            Self::Read(segs) => segs.iter().map(|s| s.len()).sum(),
            Self::Write(segs) => segs.iter().map(|s| s.len()).sum(),
            Self::None => 0,
        }
    }
}

/// One block request: a starting sector and segments that are contiguous in
/// sector space in the order given.
pub struct BlockRequest<'r, 'b> {
    pub(crate) sector: u64,
    pub(crate) op: BlockOp,
    pub(crate) segments: Segments<'r, 'b>,
    pub(crate) state: RequestState,
}

impl<'r, 'b> BlockRequest<'r, 'b> {
    pub fn read(sector: u64, segments: &'r mut [&'b mut [u8]]) -> Self {
        Self::new(sector, BlockOp::Read, Segments::Read(segments))
    }

    pub fn write(sector: u64, segments: &'r [&'b [u8]]) -> Self {
        Self::new(sector, BlockOp::Write, Segments::Write(segments))
    }

    /// A request with no data, such as a flush or discard.
    pub fn without_data(sector: u64, op: BlockOp) -> Self {
        Self::new(sector, op, Segments::None)
    }

    fn new(sector: u64, op: BlockOp, segments: Segments<'r, 'b>) -> Self {
        Self {
            sector,
            op,
            segments,
            state: RequestState::Idle,
        }
    }

    pub fn sector(&self) -> u64 {
        self.sector
    }

    pub fn op(&self) -> BlockOp {
        self.op
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn segments(&self) -> &Segments<'r, 'b> {
        &self.segments
    }
}
