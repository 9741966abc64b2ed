//! The kernel's process-wide allocator instance.
//!
//! ```ignore
//! static SCREEN: DiagnosticScreen<VgaText, X86Interrupts> = DiagnosticScreen::new(VgaText, X86Interrupts);
//!
//! let window = unsafe { BitmapWindow::kernel() };
//! global::init(PmmConfig::default(), window, &mut boot_map, boot_cursor, X86Interrupts, &SCREEN);
//! // ... virtual memory manager comes up ...
//! global::init_extend(&mut boot_map, &mut vmm);
//!
//! let frame = global::allocate().expect("out of physical memory");
//! ```
//!
//! The [`SpinLock`] only makes the `static` shareable: the allocator runs on
//! one managing core and the lock is never contended. Mutual exclusion
//! against interrupt handlers comes from the instance's interrupt masking.

use crate::{
    BitmapMapper, BitmapWindow, ControlBlock, FatalHandler, MemoryMap, PhysicalMemoryManager,
    PmmConfig, PmmFault,
};
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};
use kernel_sync::{ArchInterrupts, SpinLock};

/// The allocator type behind the process-wide instance.
pub type KernelPmm = PhysicalMemoryManager<ArchInterrupts, &'static (dyn FatalHandler + Sync)>;

static PMM: SpinLock<Option<KernelPmm>> = SpinLock::new(None);

fn with_pmm<R>(f: impl FnOnce(&mut KernelPmm) -> R) -> R {
    PMM.with_lock(|pmm| {
        let pmm = pmm
            .as_mut()
            .expect("physical memory manager not initialized");
        f(pmm)
    })
}

/// Runs phase 1 and installs the process-wide instance.
///
/// Calling it a second time reports [`PmmFault::AlreadyInitialized`] to `fatal`.
pub fn init<M: MemoryMap + ?Sized>(
    config: PmmConfig,
    window: BitmapWindow,
    map: &mut M,
    boot_cursor: PhysicalAddress,
    irq: ArchInterrupts,
    fatal: &'static (dyn FatalHandler + Sync),
) {
    PMM.with_lock(|slot| {
        if let Some(existing) = slot {
            fatal.fatal(&PmmFault::AlreadyInitialized, &existing.control());
        }
        *slot = Some(KernelPmm::bootstrap(
            config,
            window,
            map,
            boot_cursor,
            irq,
            fatal,
        ));
    });
}

/// Runs phase 2 on the process-wide instance.
///
/// The mapper must take its frames from the [`FrameSource`](crate::FrameSource)
/// it is handed, not from this module: the instance is locked meanwhile.
///
/// # Panics
/// If [`init`] has not run.
pub fn init_extend<M, B>(map: &mut M, mapper: &mut B)
where
    M: MemoryMap + ?Sized,
    B: BitmapMapper + ?Sized,
{
    with_pmm(|pmm| pmm.extend(map, mapper));
}

/// # Panics
/// If [`init`] has not run.
pub fn allocate() -> Option<PhysicalFrame> {
    with_pmm(PhysicalMemoryManager::allocate)
}

/// # Panics
/// If [`init`] has not run.
pub fn allocate_below(limit: PhysicalAddress) -> Option<PhysicalFrame> {
    with_pmm(|pmm| pmm.allocate_below(limit))
}

/// # Panics
/// If [`init`] has not run.
pub fn free(address: PhysicalAddress) {
    with_pmm(|pmm| pmm.free(address));
}

/// # Panics
/// If [`init`] has not run.
pub fn mark_range_free(start: PhysicalAddress, length: u64) {
    with_pmm(|pmm| pmm.mark_range_free(start, length));
}

/// # Panics
/// If [`init`] has not run.
pub fn mark_range_used(start: PhysicalAddress, length: u64) {
    with_pmm(|pmm| pmm.mark_range_used(start, length));
}

/// A snapshot of the process-wide control block.
///
/// # Panics
/// If [`init`] has not run.
#[must_use]
pub fn control_block() -> ControlBlock {
    with_pmm(|pmm| pmm.control())
}
