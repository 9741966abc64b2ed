//! # Fatal Error Reporter
//!
//! Every contract violation inside the allocator ends here. The handler gets
//! the fault and a snapshot of the [`ControlBlock`] and must not return.

use crate::console::{DiagnosticConsole, ERROR_PALETTE};
use crate::{ControlBlock, PmmFault};
use core::fmt;
use kernel_sync::{InterruptControl, SpinLock};
use log::error;

/// Terminal error path of a [`PhysicalMemoryManager`](crate::PhysicalMemoryManager).
pub trait FatalHandler {
    fn fatal(&self, fault: &PmmFault, control: &ControlBlock) -> !;
}

impl<F: FatalHandler + ?Sized> FatalHandler for &F {
    fn fatal(&self, fault: &PmmFault, control: &ControlBlock) -> ! {
        (**self).fatal(fault, control)
    }
}

/// Kernel fatal handler: white-on-red diagnostic screen, then halt.
///
/// The console sits behind a [`SpinLock`] so the handler can live in a
/// `static`. A fault raised while the screen is already being drawn finds
/// the lock taken and halts without drawing.
pub struct DiagnosticScreen<C, I> {
    console: SpinLock<C>,
    irq: I,
}

impl<C, I> DiagnosticScreen<C, I> {
    #[must_use]
    pub const fn new(console: C, irq: I) -> Self {
        Self {
            console: SpinLock::new(console),
            irq,
        }
    }
}

impl<C, I> FatalHandler for DiagnosticScreen<C, I>
where
    C: DiagnosticConsole + Send,
    I: InterruptControl,
{
    fn fatal(&self, fault: &PmmFault, control: &ControlBlock) -> ! {
        self.irq.disable();
        error!("PMM fault: {fault}; {control:?}");

        if let Some(mut console) = self.console.try_lock() {
            let _ = render_diagnostics(&mut *console, fault, control);
        }

        self.irq.wait_forever()
    }
}

/// Draws the fatal screen: title, fault, and every control block field in hex.
///
/// # Errors
/// Propagates write errors of the console.
pub fn render_diagnostics<C: DiagnosticConsole + ?Sized>(
    console: &mut C,
    fault: &PmmFault,
    control: &ControlBlock,
) -> fmt::Result {
    console.set_attribute(ERROR_PALETTE);
    console.clear();

    writeln!(console, "*** PHYSICAL MEMORY MANAGER FAULT ***")?;
    writeln!(console)?;
    writeln!(console, "{fault}")?;
    writeln!(console)?;

    let mut result = Ok(());
    control.for_each_field(|name, value| {
        if result.is_ok() {
            result = write!(console, "  {name:<12} ")
                .and_then(|()| console.put_hex(value))
                .and_then(|()| writeln!(console));
        }
    });
    result?;

    writeln!(console)?;
    write!(console, "System halted.")
}
