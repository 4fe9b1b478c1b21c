//! DMA-capable memory allocation.
//!
//! Mirrors the allocation half of the virtio-drivers `Hal` trait: static
//! functions returning a physical (bus) address together with the CPU mapping.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::ptr::NonNull;

pub const PAGE_SIZE: usize = 4096;

/// Number of pages needed to hold `len` bytes.
pub const fn pages_for(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE)
}

/// Page allocator for memory the DMA engine can address.
///
/// # Safety
///
/// `dma_alloc` must return physically contiguous, page-aligned memory of at
/// least `pages * PAGE_SIZE` bytes whose bus address is the returned `u64`, and
/// the mapping must stay valid until `dma_dealloc` is called for it.
pub unsafe trait DmaHal {
    /// Allocate `pages` zeroed pages. Returns `(paddr, vaddr)`.
    fn dma_alloc(pages: usize) -> Option<(u64, NonNull<u8>)>;

    /// Release memory obtained from `dma_alloc`.
    ///
    /// # Safety
    ///
    /// `paddr`, `vaddr` and `pages` must come from one earlier `dma_alloc`
    /// call, and the memory must not be used afterwards.
    unsafe fn dma_dealloc(paddr: u64, vaddr: NonNull<u8>, pages: usize);
}

/// Heap-backed allocator for identity-mapped memory (physical == virtual).
pub struct IdentityDma;

fn page_layout(pages: usize) -> Option<Layout> {
    Layout::from_size_align(pages.checked_mul(PAGE_SIZE)?, PAGE_SIZE).ok()
}

// SAFETY: alloc_zeroed returns contiguous page-aligned memory, and with an
// identity mapping the virtual address is the bus address.
unsafe impl DmaHal for IdentityDma {
    fn dma_alloc(pages: usize) -> Option<(u64, NonNull<u8>)> {
        if pages == 0 {
            return None;
        }
        let layout = page_layout(pages)?;
        // SAFETY: layout has non-zero size.
        let ptr = NonNull::new(unsafe { alloc::alloc::alloc_zeroed(layout) })?;
        Some((ptr.as_ptr() as u64, ptr))
    }

    unsafe fn dma_dealloc(_paddr: u64, vaddr: NonNull<u8>, pages: usize) {
        if let Some(layout) = page_layout(pages) {
            // SAFETY: vaddr was allocated by dma_alloc with this layout.
            unsafe { alloc::alloc::dealloc(vaddr.as_ptr(), layout) };
        }
    }
}

/// An owned DMA allocation, released on drop.
pub struct DmaRegion<H: DmaHal> {
    paddr: u64,
    vaddr: NonNull<u8>,
    pages: usize,
    len: usize,
    _hal: PhantomData<H>,
}

// SAFETY: the region exclusively owns its memory; access goes through
// &self / &mut self like any owned buffer.
unsafe impl<H: DmaHal> Send for DmaRegion<H> {}
// SAFETY: shared references only hand out shared slices.
unsafe impl<H: DmaHal> Sync for DmaRegion<H> {}

impl<H: DmaHal> DmaRegion<H> {
    /// Allocate a zeroed region of `len` bytes (rounded up to whole pages).
    pub fn alloc(len: usize) -> Option<Self> {
        let pages = pages_for(len);
        let (paddr, vaddr) = H::dma_alloc(pages)?;
        Some(Self {
            paddr,
            vaddr,
            pages,
            len,
            _hal: PhantomData,
        })
    }

    /// Bus address of the first byte.
    pub fn paddr(&self) -> u64 {
        self.paddr
    }

    /// CPU address of the first byte.
    pub fn vaddr(&self) -> usize {
        self.vaddr.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: vaddr points to at least len initialized (zeroed) bytes we own.
        unsafe { core::slice::from_raw_parts(self.vaddr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.vaddr.as_ptr(), self.len) }
    }
}

impl<H: DmaHal> Drop for DmaRegion<H> {
    fn drop(&mut self) {
        // SAFETY: paddr/vaddr/pages came from H::dma_alloc and are released once.
        unsafe { H::dma_dealloc(self.paddr, self.vaddr, self.pages) };
    }
}
