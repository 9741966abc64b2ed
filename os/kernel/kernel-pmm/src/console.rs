//! # Diagnostic console
//!
//! The fatal reporter draws onto a text console with VGA-style color
//! attributes. The console is an external collaborator; this module only
//! defines what the reporter needs from it ([`DiagnosticConsole`]) plus an
//! ANSI renderer ([`AnsiConsole`]) for serial lines and hosted tests.

use bitfield_struct::bitfield;
use core::fmt;

/// The sixteen VGA text-mode colors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

/// VGA text attribute byte.
///
/// Bits 0-3 select the foreground color, bits 4-6 the background color, and
/// bit 7 blinks the cell (or selects a bright background, depending on the
/// adapter's mode).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Attribute {
    #[bits(4)]
    pub foreground: u8,
    #[bits(3)]
    pub background: u8,
    pub blink: bool,
}

impl Attribute {
    /// `foreground` on `background`. Only the dark half of the palette is
    /// available as a background.
    #[must_use]
    pub const fn colored(foreground: Color, background: Color) -> Self {
        Self::new()
            .with_foreground(foreground as u8)
            .with_background(background as u8 & 0x7)
    }
}

/// White on red: the fatal screen.
pub const ERROR_PALETTE: Attribute = Attribute::colored(Color::White, Color::Red);

/// Text console the fatal reporter renders onto.
pub trait DiagnosticConsole: fmt::Write {
    /// Clears the screen using the current attribute and homes the cursor.
    fn clear(&mut self);

    /// Selects the attribute for subsequent output.
    ///
    /// Takes effect for the whole screen on the next [`clear`](Self::clear).
    fn set_attribute(&mut self, attribute: Attribute);

    /// Prints `value` as a fixed-width, `0x`-prefixed hexadecimal number.
    fn put_hex(&mut self, value: u64) -> fmt::Result {
        write!(self, "0x{value:016X}")
    }
}

/// Renders console operations as ANSI escape sequences onto any [`fmt::Write`] sink.
pub struct AnsiConsole<W: fmt::Write> {
    sink: W,
}

/// ANSI color index for each VGA color (VGA swaps blue and red bits).
const ANSI_FROM_VGA: [u8; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

impl<W: fmt::Write> AnsiConsole<W> {
    #[must_use]
    pub const fn new(sink: W) -> Self {
        Self { sink }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: fmt::Write> fmt::Write for AnsiConsole<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sink.write_str(s)
    }
}

impl<W: fmt::Write> DiagnosticConsole for AnsiConsole<W> {
    fn clear(&mut self) {
        let _ = self.sink.write_str("\x1b[2J\x1b[H");
    }

    fn set_attribute(&mut self, attribute: Attribute) {
        let fg = attribute.foreground();
        let bright = if fg >= 8 { 90 } else { 30 };
        let fg = bright + ANSI_FROM_VGA[usize::from(fg & 0x7)];
        let bg = 40 + ANSI_FROM_VGA[usize::from(attribute.background())];
        let _ = write!(self.sink, "\x1b[{fg};{bg}m");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_palette_byte() {
        assert_eq!(ERROR_PALETTE.into_bits(), 0x4F);
        assert_eq!(ERROR_PALETTE.foreground(), Color::White as u8);
        assert_eq!(ERROR_PALETTE.background(), Color::Red as u8);
        assert!(!ERROR_PALETTE.blink());
    }

    #[test]
    fn ansi_rendering() {
        use core::fmt::Write;

        let mut console = AnsiConsole::new(String::new());
        console.set_attribute(ERROR_PALETTE);
        console.clear();
        console.write_str("PMM").unwrap();
        console.put_hex(0x1000).unwrap();

        assert_eq!(
            console.into_inner(),
            "\x1b[97;41m\x1b[2J\x1b[HPMM0x0000000000001000"
        );
    }
}
