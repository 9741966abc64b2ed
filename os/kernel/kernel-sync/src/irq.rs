//! # Interrupt masking as a critical section
//!
//! On a single managing core, disabling hardware interrupts is the only
//! mutual-exclusion primitive the frame allocator relies on. This module
//! models it explicitly:
//!
//! * [`InterruptControl`] abstracts over "read / mask / unmask / halt".
//! * [`X86Interrupts`] implements it with `pushfq`, `cli`, `sti` and `hlt`.
//! * [`SimulatedInterrupts`] keeps a software `IF` flag so hosted tests can
//!   observe the masking discipline without privileged instructions.
//! * [`IrqGuard`] is the RAII critical section: it masks interrupts on
//!   creation and restores the **previous** state on drop.

use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Bit 9 of `RFLAGS`: interrupt enable flag.
#[cfg(target_arch = "x86_64")]
const RFLAGS_IF: u64 = 1 << 9;

/// Hardware (or simulated) interrupt mask control.
///
/// Implementations are cheap handles (`Copy`) so a guard can hold one by value
/// while the owner keeps being mutably borrowed.
pub trait InterruptControl: Copy {
    /// Whether interrupts are currently enabled.
    fn are_enabled(self) -> bool;

    /// Masks interrupts.
    fn disable(self);

    /// Unmasks interrupts.
    fn enable(self);

    /// Stops the current core forever.
    fn wait_forever(self) -> ! {
        self.disable();
        loop {
            spin_loop();
        }
    }
}

/// Interrupt control backed by the x86-64 `IF` flag.
///
/// # Safety & Privilege
///
/// `cli`, `sti` and `hlt` must only run at CPL0. Using this type from user
/// space faults.
#[derive(Debug, Default, Copy, Clone)]
pub struct X86Interrupts;

#[cfg(target_arch = "x86_64")]
impl InterruptControl for X86Interrupts {
    #[inline]
    fn are_enabled(self) -> bool {
        rflags() & RFLAGS_IF != 0
    }

    #[inline]
    fn disable(self) {
        cli_stop_interrupts();
    }

    #[inline]
    fn enable(self) {
        sti_enable_interrupts();
    }

    fn wait_forever(self) -> ! {
        loop {
            cli_stop_interrupts();
            unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) }
        }
    }
}

/// Disables hardware interrupts (`cli`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `cli` is permitted.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn cli_stop_interrupts() {
    unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// Enables hardware interrupts (`sti`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `sti` is permitted. Typically used
/// to restore a previously disabled interrupt state.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn sti_enable_interrupts() {
    unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Returns the current `RFLAGS` value (via `pushfq/pop`).
#[cfg(target_arch = "x86_64")]
#[inline]
#[must_use]
pub fn rflags() -> u64 {
    let r: u64;
    unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nostack, preserves_flags)) }
    r
}

/// Software interrupt flag for hosted builds and tests.
///
/// The flag lives in a `'static` atomic so the handle stays `Copy`. Tests that
/// want an isolated flag leak their own; [`SimulatedInterrupts::default`]
/// shares one process-wide flag that starts out enabled.
#[derive(Debug, Copy, Clone)]
pub struct SimulatedInterrupts {
    flag: &'static AtomicBool,
}

static SHARED_SIMULATED_IF: AtomicBool = AtomicBool::new(true);

impl SimulatedInterrupts {
    #[must_use]
    pub const fn new(flag: &'static AtomicBool) -> Self {
        Self { flag }
    }
}

impl Default for SimulatedInterrupts {
    fn default() -> Self {
        Self::new(&SHARED_SIMULATED_IF)
    }
}

impl InterruptControl for SimulatedInterrupts {
    #[inline]
    fn are_enabled(self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    #[inline]
    fn disable(self) {
        self.flag.store(false, Ordering::Release);
    }

    #[inline]
    fn enable(self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Interrupt control of the target the crate is built for.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub type ArchInterrupts = X86Interrupts;

/// Interrupt control of the target the crate is built for.
#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
pub type ArchInterrupts = SimulatedInterrupts;

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the interrupt flag. If interrupts were
/// enabled, it masks them. On drop, it unmasks them **only** if they were
/// previously enabled, so guards nest: an inner guard leaves interrupts
/// masked for the outer one.
///
/// # Examples
///
/// ```
/// use core::sync::atomic::AtomicBool;
/// use kernel_sync::irq::{InterruptControl, IrqGuard, SimulatedInterrupts};
///
/// static IF: AtomicBool = AtomicBool::new(true);
/// let irq = SimulatedInterrupts::new(&IF);
/// {
///     let _g = IrqGuard::new(irq);
///     assert!(!irq.are_enabled());
/// }
/// assert!(irq.are_enabled());
/// ```
#[must_use = "dropping the guard immediately re-enables interrupts"]
pub struct IrqGuard<I: InterruptControl> {
    irq: I,
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl<I: InterruptControl> IrqGuard<I> {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    pub fn new(irq: I) -> Self {
        let enabled = irq.are_enabled();
        if enabled {
            irq.disable();
        }
        Self {
            irq,
            were_enabled: enabled,
        }
    }

    /// Whether interrupts will be re-enabled when this guard drops.
    #[inline]
    #[must_use]
    pub const fn restores_interrupts(&self) -> bool {
        self.were_enabled
    }
}

impl<I: InterruptControl> Drop for IrqGuard<I> {
    /// Restores interrupts only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            self.irq.enable();
        }
    }
}
