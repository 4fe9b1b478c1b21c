#![cfg_attr(not(any(test, feature = "std")), no_std)]

// HAL crate for the OmniBlk driver.
// Root contains the capability traits; the RISC-V implementations are
// compiled only for riscv64 targets, host implementations only with `std`.

extern crate alloc;

pub mod cache;
pub mod clock;
pub mod dma;
pub mod mmio;
pub mod traits;

pub use cache::{CACHE_LINE_SIZE, CacheMaintenance, NoCacheMaintenance};
pub use clock::{Clock, Deadline};
pub use dma::{DmaHal, DmaRegion, IdentityDma, PAGE_SIZE, pages_for};
pub use mmio::{MmioRegisters, RegisterIo};
pub use traits::{InterruptHandler, IrqReturn};

#[cfg(target_arch = "riscv64")]
pub use cache::RiscvCflush;
#[cfg(target_arch = "riscv64")]
pub use clock::RiscvTimeClock;
#[cfg(any(test, feature = "std"))]
pub use clock::StdClock;
