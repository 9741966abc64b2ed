//! Collaborators that map bitmap pages during the second initialization phase.
//!
//! Growing (or shrinking) the bitmap window needs page-table updates, and the
//! page-table code in turn needs physical frames. The mapper therefore gets
//! the allocator itself as a [`FrameSource`] for every request: a controlled
//! circular dependency that only the phase-2 code path exercises.

use crate::MapError;
use kernel_memory_addresses::{PhysicalFrame, VirtualAddress};

/// Source of single 4 KiB physical frames.
///
/// Implemented by [`PhysicalMemoryManager`](crate::PhysicalMemoryManager);
/// the virtual-memory layer draws backing and page-table frames from here.
pub trait FrameSource {
    /// Allocates one frame, or `None` when memory is exhausted.
    fn allocate_frame(&mut self) -> Option<PhysicalFrame>;

    /// Hands a frame back. The frame must have been allocated before.
    fn release_frame(&mut self, frame: PhysicalFrame);
}

/// Maps and unmaps pages of the bitmap window.
pub trait BitmapMapper {
    /// Maps `count` fresh, writable 4 KiB pages starting at `start`, backing
    /// them with frames taken from `frames`.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] if a backing or page-table frame could not
    /// be obtained.
    fn map_pages(
        &mut self,
        frames: &mut dyn FrameSource,
        start: VirtualAddress,
        count: u64,
    ) -> Result<(), MapError>;

    /// Unmaps `count` pages starting at `start` and releases their backing
    /// frames into `frames`.
    fn unmap_pages(&mut self, frames: &mut dyn FrameSource, start: VirtualAddress, count: u64);
}
