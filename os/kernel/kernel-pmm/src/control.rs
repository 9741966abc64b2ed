use core::fmt;
use kernel_memory_addresses::{FRAME_SHIFT, PhysicalAddress, VirtualAddress};

/// Allocator metadata, one per [`PhysicalMemoryManager`](crate::PhysicalMemoryManager).
///
/// Outside an in-progress mutation:
///
/// - `free_frames` equals the number of set bits in `bitmap[0..max_index]`,
/// - `cur_frames <= sys_frames` once initialization has run,
/// - `search_idx < max_index`,
/// - no bit at a frame index `>= cur_frames` is set.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct ControlBlock {
    /// Virtual base address of the bitmap.
    pub bitmap: VirtualAddress,
    /// Number of 4 KiB pages the bitmap occupies.
    pub bm_frames: u64,
    /// Total physical frames reported by the memory inventory.
    pub sys_frames: u64,
    /// Frames currently under management (the enforced ceiling).
    pub cur_frames: u64,
    /// Word index where the next unconstrained scan resumes.
    pub search_idx: usize,
    /// Word count of the bitmap; the scan wraps here.
    ///
    /// Whole pages (`bm_frames * 512`) once bootstrapped; an instance from
    /// [`PhysicalMemoryManager::new`](crate::PhysicalMemoryManager::new)
    /// stops at the last word holding a managed frame.
    pub max_index: usize,
    /// Running count of set (free) bits.
    pub free_frames: u64,
}

impl ControlBlock {
    /// First physical address past the managed range (`cur_frames << 12`).
    #[inline]
    #[must_use]
    pub const fn managed_limit(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.cur_frames << FRAME_SHIFT)
    }

    /// Calls `f` with every field's name and raw value, in declaration order.
    pub fn for_each_field(&self, mut f: impl FnMut(&'static str, u64)) {
        f("bitmap", self.bitmap.as_u64());
        f("bm_frames", self.bm_frames);
        f("sys_frames", self.sys_frames);
        f("cur_frames", self.cur_frames);
        f("search_idx", self.search_idx as u64);
        f("max_index", self.max_index as u64);
        f("free_frames", self.free_frames);
    }
}

impl fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("bitmap", &self.bitmap)
            .field("bm_frames", &format_args!("{:#x}", self.bm_frames))
            .field("sys_frames", &format_args!("{:#x}", self.sys_frames))
            .field("cur_frames", &format_args!("{:#x}", self.cur_frames))
            .field("search_idx", &format_args!("{:#x}", self.search_idx))
            .field("max_index", &format_args!("{:#x}", self.max_index))
            .field("free_frames", &format_args!("{:#x}", self.free_frames))
            .finish()
    }
}
