//! Request chunker.
//!
//! Walks a request's segments in order, cutting each into chunks no larger
//! than the bounce buffer and running every chunk through the executor while
//! holding the exclusion guard for the whole request.

use core::ops::Range;

use omni_hal::{CacheMaintenance, DmaHal, RegisterIo};
use omni_utils::Mutex;

use crate::SECTOR_SIZE;
use crate::bounce::BounceBuffer;
use crate::completion::CompletionSignal;
use crate::error::TransferError;
use crate::executor::{Direction, Executor, TransferDescriptor};
use crate::request::{BlockRequest, RequestState, Segments};

/// One bounded piece of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Offset within the segment.
    pub offset: usize,
    pub len: usize,
}

impl Chunk {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Splits `total` bytes into `ceil(total / max)` chunks, all of length `max`
/// except possibly the last. A zero-length segment yields no chunks.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    total: usize,
    max: usize,
    offset: usize,
}

impl ChunkPlan {
    pub fn new(total: usize, max: usize) -> Self {
        Self {
            total,
            max: max.max(1),
            offset: 0,
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.offset >= self.total {
            return None;
        }
        let len = (self.total - self.offset).min(self.max);
        let chunk = Chunk {
            offset: self.offset,
            len,
        };
        self.offset += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.total - self.offset.min(self.total)).div_ceil(self.max);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkPlan {}

pub struct Chunker<'a, R, S, C, H>
where
    R: RegisterIo,
    S: CompletionSignal,
    C: CacheMaintenance + ?Sized,
    H: DmaHal,
{
    executor: Executor<'a, R, S, C>,
    guard: &'a Mutex<BounceBuffer<H>>,
    remote_base: u64,
}

impl<'a, R, S, C, H> Chunker<'a, R, S, C, H>
where
    R: RegisterIo,
    S: CompletionSignal,
    C: CacheMaintenance + ?Sized,
    H: DmaHal,
{
    pub fn new(
        executor: Executor<'a, R, S, C>,
        guard: &'a Mutex<BounceBuffer<H>>,
        remote_base: u64,
    ) -> Self {
        Self {
            executor,
            guard,
            remote_base,
        }
    }

    /// Run every chunk of every segment. The first failing chunk abandons the
    /// rest of the request. The guard is released on every path.
    pub fn handle_request(&self, rq: &mut BlockRequest<'_, '_>) -> Result<(), TransferError> {
        let mut bounce = self.guard.lock();
        let BlockRequest {
            sector,
            segments,
            state,
            ..
        } = rq;
        log::trace!(
            "[OMNI] request sector={} segments={} bytes={}",
            sector,
            segments.len(),
            segments.total_bytes()
        );

        let mut cursor = *sector;
        let result = match segments {
            Segments::Read(segs) => segs.iter_mut().try_for_each(|seg| {
                self.read_segment(&mut bounce, cursor, seg, state)?;
                cursor += (seg.len() / SECTOR_SIZE) as u64;
                Ok(())
            }),
            Segments::Write(segs) => segs.iter().try_for_each(|seg| {
                self.write_segment(&mut bounce, cursor, seg, state)?;
                cursor += (seg.len() / SECTOR_SIZE) as u64;
                Ok(())
            }),
            Segments::None => Ok(()),
        };

        *state = if result.is_ok() {
            RequestState::Completed
        } else {
            RequestState::Failed
        };
        result
    }

    fn remote_addr(&self, cursor: u64) -> u64 {
        self.remote_base + cursor * SECTOR_SIZE as u64
    }

    fn read_segment(
        &self,
        bounce: &mut BounceBuffer<H>,
        cursor: u64,
        seg: &mut [u8],
        state: &mut RequestState,
    ) -> Result<(), TransferError> {
        let remote = self.remote_addr(cursor);
        for chunk in ChunkPlan::new(seg.len(), bounce.capacity()) {
            let desc = TransferDescriptor {
                direction: Direction::Read,
                local: bounce.paddr(),
                remote: remote + chunk.offset as u64,
                len: chunk.len,
            };
            self.run_chunk(&desc, state)?;
            bounce.unstage(&mut seg[chunk.range()]);
        }
        Ok(())
    }

    fn write_segment(
        &self,
        bounce: &mut BounceBuffer<H>,
        cursor: u64,
        seg: &[u8],
        state: &mut RequestState,
    ) -> Result<(), TransferError> {
        let remote = self.remote_addr(cursor);
        for chunk in ChunkPlan::new(seg.len(), bounce.capacity()) {
            *state = RequestState::Staging;
            bounce.stage(&seg[chunk.range()]);
            let desc = TransferDescriptor {
                direction: Direction::Write,
                local: bounce.paddr(),
                remote: remote + chunk.offset as u64,
                len: chunk.len,
            };
            self.run_chunk(&desc, state)?;
        }
        Ok(())
    }

    fn run_chunk(
        &self,
        desc: &TransferDescriptor,
        state: &mut RequestState,
    ) -> Result<(), TransferError> {
        *state = RequestState::Transferring;
        self.executor.begin(desc);
        *state = RequestState::WaitingCompletion;
        self.executor.finish(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    const B: usize = 1024 * 1024;

    /// Tests: ceil(L/B) chunks, each at most B, all but the last exactly B
    #[test]
    fn test_chunk_count_and_sizes() {
        for len in [1, 512, B - 1, B, B + 1, 2 * B + B / 2, 5 * B] {
            let chunks: Vec<Chunk> = ChunkPlan::new(len, B).collect();
            assert_eq!(chunks.len(), len.div_ceil(B), "len={len}");
            assert!(chunks.iter().all(|c| c.len <= B));
            let (last, rest) = chunks.split_last().unwrap();
            assert!(rest.iter().all(|c| c.len == B));
            assert_eq!(last.offset + last.len, len);
        }
    }

    #[test]
    fn test_chunks_are_contiguous() {
        let chunks: Vec<Chunk> = ChunkPlan::new(2 * B + B / 2, B).collect();
        assert_eq!(
            chunks,
            [
                Chunk { offset: 0, len: B },
                Chunk { offset: B, len: B },
                Chunk { offset: 2 * B, len: B / 2 },
            ]
        );
        assert_eq!(chunks[1].range(), B..2 * B);
    }

    #[test]
    fn test_zero_length_segment() {
        assert_eq!(ChunkPlan::new(0, B).count(), 0);
        assert_eq!(ChunkPlan::new(0, B).len(), 0);
    }

    #[test]
    fn test_exact_size_hint() {
        let mut plan = ChunkPlan::new(3 * B, B);
        assert_eq!(plan.len(), 3);
        plan.next();
        assert_eq!(plan.len(), 2);
    }
}
