//! One DMA engine, one transfer at a time.

use omni_hal::RegisterIo;

use crate::completion::{CompletionSignal, WaitOutcome};
use crate::error::{EngineStatus, TransferError};
use crate::regs::{DmaRegs, StatusFlags};

/// The engine's register file paired with its completion strategy.
///
/// Callers serialize access; the channel itself assumes a single transfer in
/// flight.
pub struct DmaChannel<R: RegisterIo, S: CompletionSignal> {
    regs: DmaRegs<R>,
    completion: S,
    error_mask: StatusFlags,
}

impl<R: RegisterIo, S: CompletionSignal> DmaChannel<R, S> {
    pub fn new(regs: DmaRegs<R>, completion: S, error_mask: StatusFlags) -> Self {
        Self {
            regs,
            completion,
            error_mask,
        }
    }

    pub fn regs(&self) -> &DmaRegs<R> {
        &self.regs
    }

    pub fn completion(&self) -> &S {
        &self.completion
    }

    /// Program the descriptor, reset the completion, then set the start bit.
    pub fn launch(&self, src: u64, dst: u64, len: usize) {
        log::trace!("[DMA] src={src:#x} dst={dst:#x} len={len}");
        self.regs.program(src, dst, len);
        self.completion.reset();
        self.regs.start();
    }

    /// Wait for the launched transfer.
    ///
    /// A timeout returns without touching the registers. The status register
    /// is only inspected for error bits when an error mask is configured.
    pub fn wait(&self, timeout_ms: u64) -> Result<(), TransferError> {
        if self.completion.wait(timeout_ms) == WaitOutcome::TimedOut {
            return Err(TransferError::Timeout);
        }
        if !self.error_mask.is_empty() {
            let status = self.regs.status();
            if status.intersects(self.error_mask) {
                return Err(TransferError::Engine(EngineStatus(status.bits())));
            }
        }
        Ok(())
    }

    /// Launch and wait: a raw copy between two bus addresses.
    pub fn transfer(
        &self,
        src: u64,
        dst: u64,
        len: usize,
        timeout_ms: u64,
    ) -> Result<(), TransferError> {
        self.launch(src, dst, len);
        self.wait(timeout_ms)
    }
}
