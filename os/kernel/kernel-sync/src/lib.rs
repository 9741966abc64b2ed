//! # Kernel synchronization primitives
//!
//! The physical memory manager runs on a single managing core and relies on
//! interrupt masking for mutual exclusion ([`irq`]). The [`SpinLock`] holds
//! process-wide state that must live in a `static`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;

pub use irq::{ArchInterrupts, InterruptControl, IrqGuard, SimulatedInterrupts, X86Interrupts};
pub use spin_lock::{SpinLock, SpinLockGuard};
