//! # Physical Memory Manager
//!
//! A bitmap frame allocator: the authority over which 4 KiB frames of
//! physical memory are free, serving the virtual-memory mapper, the heap and
//! the paging bootstrap.
//!
//! ## Layout
//!
//! ```text
//!  bitmap window (kernel_info::memory::PMM_BITMAP_BASE)
//!  ┌──────── word 0 ────────┬──────── word 1 ────────┬─ ... ─┬─ word max_index-1 ─┐
//!  │ b0 b1 ... b63          │ b0 ... b63             │       │                    │
//!  └────────────────────────┴────────────────────────┴───────┴────────────────────┘
//!    frame = word * 64 + bit        1 = free, 0 = used / reserved / absent
//! ```
//!
//! ## Components
//!
//! | Piece | Where |
//! |-------|-------|
//! | Bitmap store | [`BitmapWindow`] |
//! | Allocator metadata | [`ControlBlock`] |
//! | Bit and block mutators, frame allocator | [`PhysicalMemoryManager`] |
//! | Two-phase bring-up | [`PhysicalMemoryManager::bootstrap`], [`PhysicalMemoryManager::extend`] |
//! | Fatal reporter | [`FatalHandler`], [`DiagnosticScreen`] |
//! | Process-wide instance | [`global`] |
//!
//! ## Collaborators
//!
//! The allocator consumes a [`MemoryMap`] (installed RAM), a
//! [`BitmapMapper`] (phase-2 page mapping) and an
//! [`InterruptControl`](kernel_sync::InterruptControl) implementation
//! (critical sections). Every read-modify-write of the bitmap, and every
//! scan-and-claim of the allocator, runs with interrupts masked; the prior
//! interrupt state is restored afterwards.
//!
//! ## Example
//!
//! ```
//! use core::sync::atomic::AtomicBool;
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_pmm::{BitmapWindow, ControlBlock, FatalHandler, PhysicalMemoryManager, PmmFault};
//! use kernel_sync::SimulatedInterrupts;
//!
//! struct Panic;
//! impl FatalHandler for Panic {
//!     fn fatal(&self, fault: &PmmFault, _: &ControlBlock) -> ! {
//!         panic!("{fault}")
//!     }
//! }
//!
//! static IF: AtomicBool = AtomicBool::new(true);
//! let window = BitmapWindow::from_static(Box::leak(vec![0; 2].into_boxed_slice()));
//! let mut pmm = PhysicalMemoryManager::new(window, 128, SimulatedInterrupts::new(&IF), Panic);
//!
//! pmm.mark_range_free(PhysicalAddress::zero(), 10 * 4096);
//! assert_eq!(pmm.free_frames(), 10);
//!
//! let frame = pmm.allocate().unwrap();
//! assert_eq!(frame.start_address(), PhysicalAddress::zero());
//! assert_eq!(pmm.free_frames(), 9);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod bitmap;
mod config;
pub mod console;
mod control;
mod error;
mod fatal;
pub mod global;
mod init;
mod manager;
mod mapper;
pub mod memory_map;

pub use bitmap::{BitmapWindow, FRAMES_PER_PAGE, FRAMES_PER_WORD, WORDS_PER_PAGE, bitmap_pages_for};
pub use config::PmmConfig;
pub use console::{AnsiConsole, Attribute, Color, DiagnosticConsole};
pub use control::ControlBlock;
pub use error::{MapError, PmmFault};
pub use fatal::{DiagnosticScreen, FatalHandler, render_diagnostics};
pub use manager::PhysicalMemoryManager;
pub use mapper::{BitmapMapper, FrameSource};
pub use memory_map::{FreeRegion, MemoryMap, MemoryRegion, MemoryRegionTable, RegionKind};
