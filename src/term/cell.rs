//! Cell storage and the pen write-state.
//!
//! The grid is memory-budgeted, so a cell is three bytes: a symbol byte
//! (raw ASCII or a glyph-cache reference), a packed fg/bg nibble pair, and
//! an attribute bitmask.

use bitflags::bitflags;

/// Blank cell symbol.
pub const BLANK: u8 = b' ';

bitflags! {
    /// Per-cell display attributes.
    ///
    /// Inverse and conceal are pen-only states: inverse swaps the colors at
    /// write time and conceal substitutes a blank, so neither needs a bit
    /// in the cell itself.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AttrFlags: u8 {
        const BOLD      = 0b0000_0001;
        const FAINT     = 0b0000_0010;
        const ITALIC    = 0b0000_0100;
        const UNDERLINE = 0b0000_1000;
        const BLINK     = 0b0001_0000;
        const STRIKE    = 0b0010_0000;
    }
}

/// Packed foreground/background pair: fg in the low nibble, bg in the high
/// nibble, each an index into the device's 16-color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPair(u8);

impl ColorPair {
    pub fn new(fg: u8, bg: u8) -> Self {
        Self((fg & 0x0F) | ((bg & 0x0F) << 4))
    }

    pub fn fg(self) -> u8 {
        self.0 & 0x0F
    }

    pub fn bg(self) -> u8 {
        self.0 >> 4
    }

    /// Raw packed byte, as carried on the wire.
    pub fn packed(self) -> u8 {
        self.0
    }

    pub fn from_packed(raw: u8) -> Self {
        Self(raw)
    }
}

/// One character cell.
///
/// `sym` is a raw ASCII byte (`< 0x7F`), the replacement reference `0x7F`,
/// or a glyph-cache reference (`0x80 | slot`). The cell does not own the
/// cache reference; the screen releases it when the cell is overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub sym: u8,
    pub colors: ColorPair,
    pub attrs: AttrFlags,
}

impl Cell {
    /// A blank cell carrying the given colors and no attributes.
    pub fn blank(colors: ColorPair) -> Self {
        Self {
            sym: BLANK,
            colors,
            attrs: AttrFlags::empty(),
        }
    }

    /// True when the symbol is a glyph-cache reference rather than ASCII.
    pub fn is_cached_ref(&self) -> bool {
        self.sym >= 0x80
    }
}

/// The cursor's SGR write-state: what SGR has configured, applied to every
/// cell a graphic byte produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pen {
    pub fg: u8,
    pub bg: u8,
    pub attrs: AttrFlags,
    pub inverse: bool,
    pub conceal: bool,
}

impl Pen {
    pub fn new(fg: u8, bg: u8) -> Self {
        Self {
            fg,
            bg,
            attrs: AttrFlags::empty(),
            inverse: false,
            conceal: false,
        }
    }

    /// Colors as written into a cell, with the inverse swap applied.
    pub fn write_colors(&self) -> ColorPair {
        if self.inverse {
            ColorPair::new(self.bg, self.fg)
        } else {
            ColorPair::new(self.fg, self.bg)
        }
    }

    /// Build the cell a graphic write produces. Conceal stores a blank so
    /// the remote renderer never sees the hidden symbol.
    pub fn cell(&self, sym: u8) -> Cell {
        Cell {
            sym: if self.conceal { BLANK } else { sym },
            colors: self.write_colors(),
            attrs: self.attrs,
        }
    }

    /// The cell erase operations fill with: blank symbol, pen colors
    /// unswapped, no attributes.
    pub fn blank_cell(&self) -> Cell {
        Cell::blank(ColorPair::new(self.fg, self.bg))
    }
}
