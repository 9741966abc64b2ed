//! # Bitmap Store
//!
//! One bit per physical frame, packed into 64-bit words: bit `b` of word `w`
//! describes frame `w * 64 + b`. A set bit means *free*, a clear bit means
//! *used / reserved*.
//!
//! The words live in a [`BitmapWindow`]: a reserved, page-aligned virtual
//! range whose leading pages are mapped. Only the mapped prefix may be
//! touched, so the window hands out single words through raw pointer reads
//! and writes instead of slices that could span unmapped pages.

use core::ops::Range;
use core::ptr::NonNull;
use kernel_info::memory::{PMM_BITMAP_BASE, PMM_BITMAP_WINDOW_BYTES};
use kernel_memory_addresses::{FRAME_SIZE, VirtualAddress};

/// Frames described by one bitmap word.
pub const FRAMES_PER_WORD: u64 = 64;

/// Bitmap words per 4 KiB page.
#[allow(clippy::cast_possible_truncation)]
pub const WORDS_PER_PAGE: usize = (FRAME_SIZE / size_of::<u64>() as u64) as usize;

/// Frames described by one 4 KiB bitmap page.
pub const FRAMES_PER_PAGE: u64 = FRAME_SIZE * 8;

/// Number of bitmap pages needed to cover `frames` bits, rounding up.
#[inline]
#[must_use]
pub const fn bitmap_pages_for(frames: u64) -> u64 {
    frames.div_ceil(FRAMES_PER_PAGE)
}

/// A reserved virtual range holding the frame bitmap.
pub struct BitmapWindow {
    base: NonNull<u64>,
    capacity_words: usize,
}

// Safety: the window is owned exclusively by one allocator instance.
unsafe impl Send for BitmapWindow {}

impl BitmapWindow {
    /// Creates a window over `capacity_words` words starting at `base`.
    ///
    /// # Safety
    /// - `base` must be page aligned and reserved exclusively for the bitmap.
    /// - Every word the allocator touches (its current `max_index`) must be
    ///   mapped and writable; words past that may be unmapped until a
    ///   [`BitmapMapper`](crate::BitmapMapper) maps them.
    #[must_use]
    pub const unsafe fn from_raw_parts(base: NonNull<u64>, capacity_words: usize) -> Self {
        Self {
            base,
            capacity_words,
        }
    }

    /// The kernel's bitmap window as laid out in `kernel_info::memory`.
    ///
    /// # Safety
    /// The boot-time page tables must map at least the initial bitmap pages
    /// at [`PMM_BITMAP_BASE`], and nothing else may use the window.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn kernel() -> Self {
        let base = VirtualAddress::new(PMM_BITMAP_BASE).as_mut_ptr::<u64>();
        let words = (PMM_BITMAP_WINDOW_BYTES / size_of::<u64>() as u64) as usize;
        // Safety: the layout constant is non-null and page aligned.
        unsafe { Self::from_raw_parts(NonNull::new_unchecked(base), words) }
    }

    /// A window backed by leaked memory; fully mapped by construction.
    #[must_use]
    pub fn from_static(words: &'static mut [u64]) -> Self {
        Self {
            base: NonNull::from(&mut *words).cast(),
            capacity_words: words.len(),
        }
    }

    #[inline]
    #[must_use]
    pub fn base(&self) -> VirtualAddress {
        VirtualAddress::from_ptr(self.base.as_ptr())
    }

    #[inline]
    #[must_use]
    pub const fn capacity_words(&self) -> usize {
        self.capacity_words
    }

    /// Virtual address of the bitmap page with index `page`.
    #[inline]
    #[must_use]
    pub fn page_address(&self, page: u64) -> VirtualAddress {
        self.base() + page * FRAME_SIZE
    }

    #[inline]
    pub(crate) fn word(&self, index: usize) -> u64 {
        debug_assert!(index < self.capacity_words);
        // Safety: in-window and mapped per the construction contract.
        unsafe { self.base.as_ptr().add(index).read() }
    }

    #[inline]
    pub(crate) fn set_word(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.capacity_words);
        // Safety: in-window and mapped per the construction contract.
        unsafe { self.base.as_ptr().add(index).write(value) }
    }

    /// Bulk-fills `range` with zero ("everything used").
    pub(crate) fn clear(&mut self, range: Range<usize>) {
        debug_assert!(range.end <= self.capacity_words);
        if range.is_empty() {
            return;
        }
        // Safety: in-window and mapped per the construction contract.
        unsafe {
            self.base
                .as_ptr()
                .add(range.start)
                .write_bytes(0, range.end - range.start);
        }
    }

    /// Number of set bits in `range`.
    pub(crate) fn count_ones(&self, range: Range<usize>) -> u64 {
        range.map(|i| u64::from(self.word(i).count_ones())).sum()
    }
}
