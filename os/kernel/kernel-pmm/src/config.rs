use kernel_info::memory::PMM_INITIAL_CEILING_BYTES;
use kernel_memory_addresses::FRAME_SHIFT;

/// Runtime knobs of the two-phase bring-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PmmConfig {
    /// Most frames managed after phase 1. The bitmap pages covering this
    /// many frames must already be mapped in the window.
    pub initial_ceiling_frames: u64,
}

impl PmmConfig {
    #[must_use]
    pub const fn new(initial_ceiling_frames: u64) -> Self {
        Self {
            initial_ceiling_frames,
        }
    }
}

impl Default for PmmConfig {
    fn default() -> Self {
        Self::new(PMM_INITIAL_CEILING_BYTES >> FRAME_SHIFT)
    }
}
