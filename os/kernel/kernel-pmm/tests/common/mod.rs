#![allow(dead_code)]

use core::sync::atomic::AtomicBool;
use kernel_memory_addresses::{FRAME_SIZE, PhysicalFrame, VirtualAddress};
use kernel_pmm::{
    BitmapMapper, BitmapWindow, ControlBlock, FatalHandler, FrameSource, MapError,
    PhysicalMemoryManager, PmmFault,
};
use kernel_sync::SimulatedInterrupts;
use std::panic::{self, AssertUnwindSafe};

/// Turns every fault into a panic whose message carries the fault's `Debug` form.
#[derive(Debug, Copy, Clone, Default)]
pub struct PanicOnFault;

impl FatalHandler for PanicOnFault {
    fn fatal(&self, fault: &PmmFault, _control: &ControlBlock) -> ! {
        panic!("pmm fault: {fault:?}")
    }
}

pub type TestPmm = PhysicalMemoryManager<SimulatedInterrupts, PanicOnFault>;

/// A private interrupt flag, initially enabled.
pub fn irq() -> SimulatedInterrupts {
    SimulatedInterrupts::new(Box::leak(Box::new(AtomicBool::new(true))))
}

/// A fully mapped bitmap window of `words` words, pre-filled with garbage.
pub fn window(words: usize) -> BitmapWindow {
    BitmapWindow::from_static(Box::leak(vec![0xDEAD_BEEF_u64; words].into_boxed_slice()))
}

/// An allocator over `frames` frames, all used.
pub fn pmm(frames: u64) -> TestPmm {
    let words = usize::try_from(frames.div_ceil(64)).unwrap();
    PhysicalMemoryManager::new(window(words), frames, irq(), PanicOnFault)
}

/// Runs `f` and returns the panic message it produced.
pub fn fault_message(f: impl FnOnce()) -> String {
    let payload = panic::catch_unwind(AssertUnwindSafe(f)).expect_err("expected a fault");
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(ToString::to_string))
        .unwrap_or_default()
}

/// Mapper that hands out backing frames from the allocator and remembers them.
#[derive(Debug, Default)]
pub struct RecordingMapper {
    /// `(start, count)` of every map request.
    pub mapped: Vec<(VirtualAddress, u64)>,
    /// `(start, count)` of every unmap request.
    pub unmapped: Vec<(VirtualAddress, u64)>,
    /// Frames currently backing mapped pages, in mapping order.
    pub backing: Vec<PhysicalFrame>,
    /// Fail the next map request after taking this many frames.
    pub fail_after: Option<usize>,
}

impl RecordingMapper {
    pub fn backed_by(frames: impl IntoIterator<Item = PhysicalFrame>) -> Self {
        Self {
            backing: frames.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl BitmapMapper for RecordingMapper {
    fn map_pages(
        &mut self,
        frames: &mut dyn FrameSource,
        start: VirtualAddress,
        count: u64,
    ) -> Result<(), MapError> {
        assert_eq!(start.frame_offset(), 0);
        self.mapped.push((start, count));

        for taken in 0..count {
            if self.fail_after == Some(usize::try_from(taken).unwrap()) {
                return Err(MapError::OutOfMemory);
            }
            let frame = frames.allocate_frame().ok_or(MapError::OutOfMemory)?;
            self.backing.push(frame);
        }
        Ok(())
    }

    fn unmap_pages(&mut self, frames: &mut dyn FrameSource, start: VirtualAddress, count: u64) {
        assert_eq!(start.frame_offset(), 0);
        self.unmapped.push((start, count));

        for _ in 0..count {
            if let Some(frame) = self.backing.pop() {
                frames.release_frame(frame);
            }
        }
    }
}

/// Bytes covered by `frames` frames.
pub const fn bytes(frames: u64) -> u64 {
    frames * FRAME_SIZE
}
