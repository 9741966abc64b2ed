//! # Physical and Virtual Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses and 4 KiB physical frames
//! used by the physical memory manager and its collaborators.
//!
//! ## Overview
//!
//! This crate defines a minimal set of types that prevent mixing virtual and
//! physical addresses at compile time while remaining zero-cost wrappers around
//! `u64` values.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A raw byte address in physical memory (RAM or MMIO). |
//! | [`VirtualAddress`] | A raw byte address in the current (page-table translated) address space. |
//! | [`PhysicalFrame`] | A 4 KiB-aligned physical frame, identified by its start address or frame index. |
//!
//! ## Frames
//!
//! The frame allocator only deals in 4 KiB units. A frame's *index* is its
//! start address shifted right by [`FRAME_SHIFT`]:
//!
//! ```text
//!   address = 0x0000_0000_0001_2000
//!                             └┬┘└┬┘
//!              frame index 0x12   offset 0x000 (must be zero for a frame)
//! ```
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x1_2345);
//! assert!(!pa.is_frame_aligned());
//! assert_eq!(pa.align_down().as_u64(), 0x1_2000);
//! assert_eq!(PhysicalFrame::containing_address(pa).index(), 0x12);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys or for FFI use.
//! - All alignment calculations are `const fn` and zero-cost in release builds.
//! - A [`PhysicalFrame`] can only be constructed aligned; raw addresses coming
//!   from callers stay [`PhysicalAddress`] until they have been validated.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod physical_frame;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use virtual_address::VirtualAddress;

/// Size of a physical frame in bytes.
pub const FRAME_SIZE: u64 = 4096;

/// log2([`FRAME_SIZE`]), i.e. number of low bits forming the in-frame offset.
pub const FRAME_SHIFT: u32 = 12;

/// Mask of the in-frame offset bits.
pub const FRAME_OFFSET_MASK: u64 = FRAME_SIZE - 1;

const _: () = assert!(1 << FRAME_SHIFT == FRAME_SIZE);

/// Align `x` down to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0,      4096), 0);
/// assert_eq!(align_down(4095,   4096), 0);
/// assert_eq!(align_down(4096,   4096), 4096);
/// assert_eq!(align_down(8191,   4096), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`, or `None` if that overflows.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::checked_align_up;
/// assert_eq!(checked_align_up(0,    4096), Some(0));
/// assert_eq!(checked_align_up(1,    4096), Some(4096));
/// assert_eq!(checked_align_up(4096, 4096), Some(4096));
/// assert_eq!(checked_align_up(u64::MAX, 4096), None);
/// ```
#[inline(always)]
#[must_use]
pub const fn checked_align_up(x: u64, a: u64) -> Option<u64> {
    match x.checked_add(a - 1) {
        Some(v) => Some(v & !(a - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_down(0x12345, FRAME_SIZE), 0x12000);
        assert_eq!(checked_align_up(0x12345, FRAME_SIZE), Some(0x13000));
        assert_eq!(checked_align_up(0x12000, FRAME_SIZE), Some(0x12000));
        assert_eq!(checked_align_up(u64::MAX - 10, FRAME_SIZE), None);
    }

    #[test]
    fn physical_address_rounding() {
        let pa = PhysicalAddress::new(0x1001);
        assert_eq!(pa.align_down(), PhysicalAddress::new(0x1000));
        assert_eq!(pa.checked_align_up(), Some(PhysicalAddress::new(0x2000)));
        assert_eq!(pa.frame_offset(), 1);
        assert_eq!(pa.frame_index(), 1);
    }

    #[test]
    fn frames_are_aligned() {
        assert!(PhysicalFrame::from_start_address(PhysicalAddress::new(0x1001)).is_none());

        let frame = PhysicalFrame::from_start_address(PhysicalAddress::new(0x3000)).unwrap();
        assert_eq!(frame.index(), 3);
        assert_eq!(frame, PhysicalFrame::from_index(3));
        assert_eq!(frame.start_address().as_u64(), 0x3000);
        assert_eq!(
            PhysicalFrame::containing_address(PhysicalAddress::new(0x3FFF)),
            frame
        );
    }

    #[test]
    fn virtual_address_offsets() {
        let va = VirtualAddress::new(0xFFFF_E000_0000_0000);
        assert_eq!((va + 2 * FRAME_SIZE).as_u64(), 0xFFFF_E000_0000_2000);
        assert_eq!(va.frame_offset(), 0);
    }

    #[test]
    fn formatting() {
        assert_eq!(
            format!("{}", PhysicalAddress::new(0x1000)),
            "0x0000000000001000"
        );
        assert_eq!(
            format!("{:?}", PhysicalFrame::from_index(2)),
            "Frame(PA(0x0000000000002000))"
        );
    }
}
