//! # Kernel Memory Layout Configuration
//!
//! This crate is the authoritative source for the compile-time memory layout
//! shared by the boot-time page-table constructor and the physical memory
//! manager. Every constant is checked by `const` assertions, so an invalid
//! layout fails the build instead of corrupting memory at runtime.
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Virtual Address Space Layout (64-bit):
//!
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │   User Space and Guard Region   │
//! HHDM_BASE             ├─────────────────────────────────┤ 0xffff_8880_0000_0000
//!                       │   Higher Half Direct Mapping    │
//!                       │   (up to MAX_PHYSICAL_BYTES)    │
//!                       ├─────────────────────────────────┤
//!                       │        Guard Region             │
//! PMM_BITMAP_BASE       ├─────────────────────────────────┤ 0xffff_e000_0000_0000
//!                       │   Frame bitmap window           │
//!                       │   (first 1 MiB mapped at boot)  │
//!                       ├─────────────────────────────────┤
//!                       │       Kernel Text & Data        │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! ## Frame Allocator Sizing
//!
//! The physical memory manager starts out managing at most
//! [`PMM_INITIAL_CEILING_BYTES`](memory::PMM_INITIAL_CEILING_BYTES) of RAM,
//! whose bitmap is pre-mapped by the bootstrap. Larger machines are picked up
//! by the second initialization phase, which maps more of the
//! [`PMM_BITMAP_WINDOW_BYTES`](memory::PMM_BITMAP_WINDOW_BYTES) window.
//!
//! ```rust
//! use kernel_info::memory::{PMM_INITIAL_BITMAP_BYTES, PMM_INITIAL_CEILING_BYTES};
//!
//! // One bit per 4 KiB frame.
//! assert_eq!(PMM_INITIAL_BITMAP_BYTES * 8 * 4096, PMM_INITIAL_CEILING_BYTES);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
