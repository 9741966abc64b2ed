//! Bit mutators, block mutators and the frame allocator.

use crate::bitmap::{BitmapWindow, FRAMES_PER_WORD, bitmap_pages_for};
use crate::{ControlBlock, FatalHandler, FrameSource, PmmConfig, PmmFault};
use kernel_memory_addresses::{FRAME_SHIFT, FRAME_SIZE, PhysicalAddress, PhysicalFrame};
use kernel_sync::{InterruptControl, IrqGuard};
use log::warn;

/// Where an instance is in its bring-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Phase 1 ran; the ceiling may still be below the installed memory.
    Bootstrapped,
    /// Fully sized; no further extension possible.
    Extended,
}

/// A bitmap physical frame allocator.
///
/// `I` masks interrupts around every bitmap read-modify-write; `F` receives
/// contract violations and never returns.
pub struct PhysicalMemoryManager<I: InterruptControl, F: FatalHandler> {
    pub(crate) control: ControlBlock,
    pub(crate) bitmap: BitmapWindow,
    pub(crate) config: PmmConfig,
    pub(crate) phase: Phase,
    pub(crate) irq: I,
    pub(crate) fatal: F,
}

/// Word index and bit mask of a frame index.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn bit_position(frame: u64) -> (usize, u64) {
    (
        (frame / FRAMES_PER_WORD) as usize,
        1 << (frame % FRAMES_PER_WORD),
    )
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn words_for(frames: u64) -> usize {
    frames.div_ceil(FRAMES_PER_WORD) as usize
}

impl<I: InterruptControl, F: FatalHandler> PhysicalMemoryManager<I, F> {
    /// An allocator managing `managed_frames` frames, all marked used.
    ///
    /// Memory is made available with [`mark_range_free`](Self::mark_range_free).
    /// The instance counts as fully initialized: [`extend`](Self::extend) is
    /// rejected.
    ///
    /// Unlike [`bootstrap`](Self::bootstrap), the bitmap is sized to the
    /// managed frames rather than to whole pages: `max_index` is
    /// `managed_frames / 64` rounded up, so `window` only needs that many
    /// words. `bm_frames` still reports the pages those words touch.
    #[must_use]
    pub fn new(window: BitmapWindow, managed_frames: u64, irq: I, fatal: F) -> Self {
        let max_index = words_for(managed_frames);
        let mut pmm = Self {
            control: ControlBlock {
                bitmap: window.base(),
                bm_frames: bitmap_pages_for(managed_frames),
                sys_frames: managed_frames,
                cur_frames: managed_frames,
                search_idx: 0,
                max_index,
                free_frames: 0,
            },
            bitmap: window,
            config: PmmConfig::new(managed_frames),
            phase: Phase::Extended,
            irq,
            fatal,
        };

        pmm.require_window(max_index);
        pmm.bitmap.clear(0..max_index);
        pmm
    }

    /// Sets where the first unconstrained scan starts, from a physical address.
    ///
    /// A cursor past the end of the bitmap starts the scan at word 0.
    #[must_use]
    pub fn with_search_cursor(mut self, cursor: PhysicalAddress) -> Self {
        self.control.search_idx = self.search_word_of(cursor);
        self
    }

    pub(crate) fn search_word_of(&self, cursor: PhysicalAddress) -> usize {
        let (word, _) = bit_position(cursor.frame_index());
        if word < self.control.max_index {
            word
        } else {
            warn!(
                "PMM search cursor {cursor} lies beyond the bitmap ({} words), starting at word 0",
                self.control.max_index
            );
            0
        }
    }

    pub(crate) fn fail(&self, fault: PmmFault) -> ! {
        self.fatal.fatal(&fault, &self.control)
    }

    pub(crate) fn require_window(&self, words: usize) {
        let capacity = self.bitmap.capacity_words();
        if words > capacity {
            self.fail(PmmFault::WindowTooSmall {
                required: words,
                capacity,
            });
        }
    }

    fn check_frame(&self, address: PhysicalAddress, limit_frames: u64) {
        if !address.is_frame_aligned() {
            self.fail(PmmFault::Misaligned(address));
        }
        if address.frame_index() >= limit_frames {
            self.fail(PmmFault::OutOfBounds {
                address,
                limit: PhysicalAddress::new(limit_frames << FRAME_SHIFT),
            });
        }
    }

    /// Sets the frame's bit. Returns `false` if it was already free.
    pub(crate) fn set_bit_free_within(
        &mut self,
        address: PhysicalAddress,
        limit_frames: u64,
    ) -> bool {
        self.check_frame(address, limit_frames);
        let (word, mask) = bit_position(address.frame_index());

        let _guard = IrqGuard::new(self.irq);
        let value = self.bitmap.word(word);
        if value & mask != 0 {
            return false;
        }
        self.bitmap.set_word(word, value | mask);
        self.control.free_frames += 1;
        true
    }

    /// Clears the frame's bit. Returns `false` if it was already used.
    pub(crate) fn set_bit_used_within(
        &mut self,
        address: PhysicalAddress,
        limit_frames: u64,
    ) -> bool {
        self.check_frame(address, limit_frames);
        let (word, mask) = bit_position(address.frame_index());

        let _guard = IrqGuard::new(self.irq);
        let value = self.bitmap.word(word);
        if value & mask == 0 {
            return false;
        }
        self.bitmap.set_word(word, value & !mask);
        self.control.free_frames -= 1;
        true
    }

    fn check_block(&self, first: PhysicalAddress, end: PhysicalAddress, limit_frames: u64) {
        let limit = PhysicalAddress::new(limit_frames << FRAME_SHIFT);
        if first > limit || end > limit {
            self.fail(PmmFault::BlockOutOfBounds {
                start: first,
                end,
                limit,
            });
        }
    }

    /// Frees every whole frame inside `[start, start + length)`.
    pub(crate) fn mark_block_free_within(
        &mut self,
        start: PhysicalAddress,
        length: u64,
        limit_frames: u64,
    ) {
        let overflow = PmmFault::BlockOverflow { start, length };
        let Some(end) = start.checked_add(length) else {
            self.fail(overflow);
        };
        let Some(first) = start.checked_align_up() else {
            self.fail(overflow);
        };

        self.check_block(first, end, limit_frames);

        let frames = end.as_u64().saturating_sub(first.as_u64()) / FRAME_SIZE;

        for i in 0..frames {
            self.set_bit_free_within(first + i * FRAME_SIZE, limit_frames);
        }
    }

    /// Marks `length` bytes worth of frames used, starting at the frame containing `start`.
    pub(crate) fn mark_block_used_within(
        &mut self,
        start: PhysicalAddress,
        length: u64,
        limit_frames: u64,
    ) {
        let overflow = PmmFault::BlockOverflow { start, length };
        let Some(end) = start.checked_add(length) else {
            self.fail(overflow);
        };
        if length.checked_add(FRAME_SIZE - 1).is_none() {
            self.fail(overflow);
        }

        // The rounded-up end never passes a frame-aligned limit that `end` stays within.
        let first = start.align_down();
        self.check_block(first, end, limit_frames);

        let frames = length.div_ceil(FRAME_SIZE);

        for i in 0..frames {
            self.set_bit_used_within(first + i * FRAME_SIZE, limit_frames);
        }
    }

    /// Makes every whole frame in `[start, start + length)` available.
    ///
    /// The start is rounded up and a partial trailing frame is dropped, so a
    /// frame that is only partly covered stays used. Frames that are already
    /// free stay free.
    pub fn mark_range_free(&mut self, start: PhysicalAddress, length: u64) {
        self.mark_block_free_within(start, length, self.control.cur_frames);
    }

    /// Reserves the frames covering `[start, start + length)`.
    ///
    /// The start is rounded down to its frame and `length` is rounded up to
    /// whole frames. Frames that are already used stay used.
    pub fn mark_range_used(&mut self, start: PhysicalAddress, length: u64) {
        self.mark_block_used_within(start, length, self.control.cur_frames);
    }

    /// Returns a frame to the allocator. Freeing a free frame is fatal.
    pub fn free(&mut self, address: PhysicalAddress) {
        if !self.set_bit_free_within(address, self.control.cur_frames) {
            self.fail(PmmFault::DoubleFree(address));
        }
    }

    /// Allocates a frame anywhere in managed memory.
    pub fn allocate(&mut self) -> Option<PhysicalFrame> {
        self.allocate_in(None)
    }

    /// Allocates a frame whose start address lies strictly below `limit`.
    ///
    /// Used for DMA-capable or otherwise address-restricted memory. Does not
    /// move the search cursor.
    pub fn allocate_below(&mut self, limit: PhysicalAddress) -> Option<PhysicalFrame> {
        self.allocate_in(Some(limit))
    }

    fn allocate_in(&mut self, limit: Option<PhysicalAddress>) -> Option<PhysicalFrame> {
        let _guard = IrqGuard::new(self.irq);

        let (words, tail_mask) = match limit {
            None => (self.control.max_index, u64::MAX),
            Some(limit) => {
                let frames = limit
                    .as_u64()
                    .div_ceil(FRAME_SIZE)
                    .min(self.control.cur_frames);
                let tail = frames % FRAMES_PER_WORD;
                let mask = if tail == 0 { u64::MAX } else { (1 << tail) - 1 };
                (words_for(frames), mask)
            }
        };
        if words == 0 {
            return None;
        }

        let start = self.control.search_idx.min(words - 1);
        let mut index = start;
        loop {
            let mut value = self.bitmap.word(index);
            if index == words - 1 {
                value &= tail_mask;
            }

            if value != 0 {
                let frame = PhysicalFrame::from_index(
                    index as u64 * FRAMES_PER_WORD + u64::from(value.trailing_zeros()),
                );
                self.set_bit_used_within(frame.start_address(), self.control.cur_frames);
                if limit.is_none() {
                    self.control.search_idx = index;
                }
                return Some(frame);
            }

            index += 1;
            if index == words {
                index = 0;
            }
            if index == start {
                return None;
            }
        }
    }

    /// Whether the frame at `address` is free. Frames past the ceiling are never free.
    #[must_use]
    pub fn is_free(&self, address: PhysicalAddress) -> bool {
        if !address.is_frame_aligned() {
            self.fail(PmmFault::Misaligned(address));
        }
        if address.frame_index() >= self.control.cur_frames {
            return false;
        }
        let (word, mask) = bit_position(address.frame_index());
        self.bitmap.word(word) & mask != 0
    }

    /// A snapshot of the allocator metadata.
    #[must_use]
    pub const fn control(&self) -> ControlBlock {
        self.control
    }

    #[must_use]
    pub const fn free_frames(&self) -> u64 {
        self.control.free_frames
    }

    /// Frames under management (the current ceiling).
    #[must_use]
    pub const fn managed_frames(&self) -> u64 {
        self.control.cur_frames
    }

    /// Recounts the bitmap and compares with the running free counter.
    #[must_use]
    pub fn verify_accounting(&self) -> bool {
        let _guard = IrqGuard::new(self.irq);
        self.bitmap.count_ones(0..self.control.max_index) == self.control.free_frames
    }

    #[must_use]
    pub const fn interrupts(&self) -> I {
        self.irq
    }
}

impl<I: InterruptControl, F: FatalHandler> FrameSource for PhysicalMemoryManager<I, F> {
    fn allocate_frame(&mut self) -> Option<PhysicalFrame> {
        self.allocate()
    }

    fn release_frame(&mut self, frame: PhysicalFrame) {
        self.free(frame.start_address());
    }
}
