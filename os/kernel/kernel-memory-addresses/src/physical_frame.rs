use crate::{FRAME_SHIFT, PhysicalAddress};
use core::fmt;

/// A 4 KiB physical frame.
///
/// The start address is guaranteed to be frame aligned; the frame covers
/// `[start, start + 4096)`.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(PhysicalAddress);

impl PhysicalFrame {
    /// Returns the frame starting at `address`, or `None` if it is not frame aligned.
    #[inline]
    #[must_use]
    pub const fn from_start_address(address: PhysicalAddress) -> Option<Self> {
        if address.is_frame_aligned() {
            Some(Self(address))
        } else {
            None
        }
    }

    /// Returns the frame that contains `address`.
    #[inline]
    #[must_use]
    pub const fn containing_address(address: PhysicalAddress) -> Self {
        Self(address.align_down())
    }

    /// Returns the frame with the given index (`index << 12`).
    #[inline]
    #[must_use]
    pub const fn from_index(index: u64) -> Self {
        Self(PhysicalAddress::new(index << FRAME_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn start_address(self) -> PhysicalAddress {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0.frame_index()
    }
}

impl fmt::Debug for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:?})", self.0)
    }
}

impl fmt::Display for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<PhysicalFrame> for PhysicalAddress {
    #[inline]
    fn from(value: PhysicalFrame) -> Self {
        value.start_address()
    }
}
