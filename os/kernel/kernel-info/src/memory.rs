//! # Memory Layout

use kernel_memory_addresses::FRAME_SIZE;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Largest physical address space the HHDM (and the frame bitmap) can describe.
pub const MAX_PHYSICAL_BYTES: u64 = 64 << 40; // 64 TiB

/// Base of the virtual window that holds the physical frame bitmap.
///
/// The first [`PMM_INITIAL_BITMAP_BYTES`] of the window are mapped by the
/// boot-time page-table constructor before the frame allocator runs; the rest
/// is mapped on demand when the allocator extends its ceiling.
pub const PMM_BITMAP_BASE: u64 = 0xffff_e000_0000_0000;

/// Size of the bitmap window: one bit per frame of [`MAX_PHYSICAL_BYTES`].
pub const PMM_BITMAP_WINDOW_BYTES: u64 = MAX_PHYSICAL_BYTES / FRAME_SIZE / 8;

/// Physical memory managed before the second initialization phase.
pub const PMM_INITIAL_CEILING_BYTES: u64 = 32 << 30; // 32 GiB

/// Bitmap bytes covering [`PMM_INITIAL_CEILING_BYTES`]; pre-mapped at boot.
pub const PMM_INITIAL_BITMAP_BYTES: u64 = PMM_INITIAL_CEILING_BYTES / FRAME_SIZE / 8;

const _: () = {
    assert!(HHDM_BASE + MAX_PHYSICAL_BYTES <= PMM_BITMAP_BASE);
    assert!(PMM_BITMAP_BASE.checked_add(PMM_BITMAP_WINDOW_BYTES).is_some());
    assert!(PMM_BITMAP_BASE.is_multiple_of(FRAME_SIZE));
    assert!(PMM_BITMAP_WINDOW_BYTES.is_multiple_of(FRAME_SIZE));
    assert!(PMM_INITIAL_BITMAP_BYTES.is_multiple_of(FRAME_SIZE));
    assert!(PMM_INITIAL_BITMAP_BYTES <= PMM_BITMAP_WINDOW_BYTES);
};
