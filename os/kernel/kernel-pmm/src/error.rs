use kernel_memory_addresses::PhysicalAddress;

/// A contract violation detected by the physical memory manager.
///
/// None of these are recoverable: the allocator cannot know how much of its
/// bookkeeping is already corrupted, so every fault is handed to the
/// instance's [`FatalHandler`](crate::FatalHandler), which never returns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PmmFault {
    #[error("address {0} is not frame aligned")]
    Misaligned(PhysicalAddress),
    #[error("address {address} is beyond the managed limit {limit}")]
    OutOfBounds {
        address: PhysicalAddress,
        limit: PhysicalAddress,
    },
    #[error("block {start}..{end} exceeds the managed limit {limit}")]
    BlockOutOfBounds {
        start: PhysicalAddress,
        end: PhysicalAddress,
        limit: PhysicalAddress,
    },
    #[error("block at {start} with length {length:#x} overflows the address space")]
    BlockOverflow { start: PhysicalAddress, length: u64 },
    #[error("frame {0} freed while already free")]
    DoubleFree(PhysicalAddress),
    #[error("memory map reports no usable physical memory")]
    NoMemory,
    #[error("bitmap window holds {capacity:#x} words, {required:#x} needed")]
    WindowTooSmall { required: usize, capacity: usize },
    #[error(
        "inconsistent ceiling state: sys_frames={sys_frames:#x} cur_frames={cur_frames:#x} ceiling={ceiling:#x}"
    )]
    InconsistentCeiling {
        sys_frames: u64,
        cur_frames: u64,
        ceiling: u64,
    },
    #[error("second initialization phase already ran")]
    AlreadyExtended,
    #[error("physical memory manager already initialized")]
    AlreadyInitialized,
    #[error("failed to map bitmap extension: {0}")]
    BitmapMapFailed(MapError),
}

/// Failure reported by a [`BitmapMapper`](crate::BitmapMapper).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("out of memory")]
    OutOfMemory,
}
