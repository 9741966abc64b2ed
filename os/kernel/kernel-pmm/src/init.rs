//! # Two-Phase Initializer
//!
//! ```text
//!  phase 1: bootstrap                      phase 2: extend
//!  ───────────────────                     ───────────────
//!  sys_frames = limit >> 12                sys == cur == ceiling  → nothing
//!  cur_frames = min(sys, ceiling)          sys == cur <  ceiling  → unmap spare bitmap pages
//!  zero bitmap[0..max_index]               sys >  cur == ceiling  → map more bitmap pages,
//!  free regions ∩ [0, cur << 12)                                    free regions ∩ [ceiling, sys)
//!  reserve [0, boot cursor)
//! ```
//!
//! Phase 1 only touches the bitmap pages the boot-time page tables already
//! map. Phase 2 runs once the virtual-memory layer can map pages, which in
//! turn needs frames from this allocator.

use crate::bitmap::{BitmapWindow, WORDS_PER_PAGE, bitmap_pages_for};
use crate::manager::{Phase, words_for};
use crate::memory_map::{MemoryMap, free_regions};
use crate::{BitmapMapper, ControlBlock, FatalHandler, PhysicalMemoryManager, PmmConfig, PmmFault};
use kernel_memory_addresses::{FRAME_SHIFT, PhysicalAddress};
use kernel_sync::InterruptControl;
use log::{debug, info, trace};

/// How the phase-1 ceiling relates to the installed memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CeilingState {
    /// Installed memory matches the ceiling exactly.
    Exact,
    /// Less memory than the ceiling; the pre-mapped bitmap is too large.
    Oversized,
    /// More memory than the ceiling; the bitmap must grow.
    Undersized,
}

impl CeilingState {
    fn classify(sys_frames: u64, cur_frames: u64, ceiling: u64) -> Option<Self> {
        use core::cmp::Ordering::{Equal, Greater, Less};
        match (sys_frames.cmp(&cur_frames), cur_frames.cmp(&ceiling)) {
            (Equal, Equal) => Some(Self::Exact),
            (Equal, Less) => Some(Self::Oversized),
            (Greater, Equal) => Some(Self::Undersized),
            _ => None,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn page_words(pages: u64) -> usize {
    pages as usize * WORDS_PER_PAGE
}

impl<I: InterruptControl, F: FatalHandler> PhysicalMemoryManager<I, F> {
    /// Phase 1: brings the allocator up to at most the configured ceiling.
    ///
    /// `window` must have the bitmap pages for the whole ceiling mapped.
    /// Everything below `boot_cursor` is reserved as consumed by the boot
    /// stage; the first unconstrained scan starts at the cursor's word.
    #[must_use]
    pub fn bootstrap<M: MemoryMap + ?Sized>(
        config: PmmConfig,
        window: BitmapWindow,
        map: &mut M,
        boot_cursor: PhysicalAddress,
        irq: I,
        fatal: F,
    ) -> Self {
        let sys_frames = map.memory_limit().frame_index();
        let cur_frames = sys_frames.min(config.initial_ceiling_frames);
        let bm_frames = bitmap_pages_for(cur_frames);

        let mut pmm = Self {
            control: ControlBlock {
                bitmap: window.base(),
                bm_frames,
                sys_frames,
                cur_frames,
                search_idx: 0,
                max_index: page_words(bm_frames),
                free_frames: 0,
            },
            bitmap: window,
            config,
            phase: Phase::Bootstrapped,
            irq,
            fatal,
        };

        if sys_frames == 0 {
            pmm.fail(PmmFault::NoMemory);
        }
        pmm.require_window(page_words(bitmap_pages_for(config.initial_ceiling_frames)));

        pmm.control.search_idx = pmm.search_word_of(boot_cursor);
        pmm.bitmap.clear(0..pmm.control.max_index);

        let limit = pmm.control.managed_limit();
        for region in free_regions(map) {
            trace!("PMM free region {}..{}", region.start, region.end());
            if let Some(region) = region.clip(PhysicalAddress::zero(), limit) {
                pmm.mark_block_free_within(region.start, region.size, cur_frames);
            }
        }
        pmm.mark_block_used_within(PhysicalAddress::zero(), boot_cursor.as_u64(), cur_frames);

        info!(
            "PMM phase 1: {} of {} frames managed, {} free, bitmap {} pages at {}",
            pmm.control.cur_frames,
            pmm.control.sys_frames,
            pmm.control.free_frames,
            pmm.control.bm_frames,
            pmm.control.bitmap,
        );
        pmm
    }

    /// Phase 2: widens the ceiling to the installed memory, or hands back
    /// the bitmap pages the ceiling did not need.
    ///
    /// Runs exactly once after [`bootstrap`](Self::bootstrap). The mapper
    /// draws page frames from this allocator while the ceiling is still the
    /// phase-1 one.
    pub fn extend<M, B>(&mut self, map: &mut M, mapper: &mut B)
    where
        M: MemoryMap + ?Sized,
        B: BitmapMapper + ?Sized,
    {
        if self.phase == Phase::Extended {
            self.fail(PmmFault::AlreadyExtended);
        }

        let ceiling = self.config.initial_ceiling_frames;
        let ControlBlock {
            sys_frames,
            cur_frames,
            bm_frames,
            ..
        } = self.control;

        match CeilingState::classify(sys_frames, cur_frames, ceiling) {
            None => self.fail(PmmFault::InconsistentCeiling {
                sys_frames,
                cur_frames,
                ceiling,
            }),
            Some(CeilingState::Exact) => {
                debug!("PMM phase 2: memory matches the initial ceiling");
            }
            Some(CeilingState::Oversized) => {
                let spare = bitmap_pages_for(ceiling) - bm_frames;
                if spare > 0 {
                    let start = self.bitmap.page_address(bm_frames);
                    debug!("PMM phase 2: releasing {spare} spare bitmap pages at {start}");
                    mapper.unmap_pages(self, start, spare);
                }
            }
            Some(CeilingState::Undersized) => self.grow(map, mapper),
        }

        self.phase = Phase::Extended;
        info!(
            "PMM phase 2: {} frames managed, {} free, bitmap {} pages",
            self.control.cur_frames, self.control.free_frames, self.control.bm_frames,
        );
    }

    fn grow<M, B>(&mut self, map: &mut M, mapper: &mut B)
    where
        M: MemoryMap + ?Sized,
        B: BitmapMapper + ?Sized,
    {
        let old = self.control;
        let cur_frames = old.sys_frames;
        let bm_frames = bitmap_pages_for(cur_frames);
        let max_index = page_words(bm_frames);
        debug_assert!(words_for(cur_frames) <= max_index);

        self.require_window(max_index);

        let extra = bm_frames - old.bm_frames;
        let start = self.bitmap.page_address(old.bm_frames);
        debug!("PMM phase 2: mapping {extra} bitmap pages at {start}");
        if let Err(e) = mapper.map_pages(self, start, extra) {
            self.fail(PmmFault::BitmapMapFailed(e));
        }

        self.bitmap.clear(old.max_index..max_index);

        let floor = old.managed_limit();
        let limit = PhysicalAddress::new(cur_frames << FRAME_SHIFT);
        for region in free_regions(map) {
            if let Some(region) = region.clip(floor, limit) {
                trace!("PMM free region {}..{}", region.start, region.end());
                self.mark_block_free_within(region.start, region.size, cur_frames);
            }
        }

        self.control.cur_frames = cur_frames;
        self.control.bm_frames = bm_frames;
        self.control.max_index = max_index;
    }
}
