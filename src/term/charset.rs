//! Character-set mapping tables.
//!
//! G0/G1 designation (`ESC ( F` / `ESC ) F`) selects one of these tables;
//! SI/SO switch which slot is active. Mapping happens when a single ASCII
//! graphic byte is written: most tables pass it through, the DEC special
//! graphics set rewrites it to a multi-byte glyph that then travels through
//! the glyph cache like any other code point.

/// An implemented character set, designated by its ESC final byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Charset {
    /// US ASCII, the straight code-page mapping (`B`, and the fallback for
    /// recognized-but-unimplemented designators such as `U`).
    #[default]
    Ascii,
    /// DEC special graphics / line drawing (`0`).
    DecGraphics,
    /// UK national (`A`): `#` becomes `£`.
    Uk,
}

impl Charset {
    /// Resolve a designation final byte. Unknown finals return `None`; the
    /// interpreter logs those and falls back to ASCII.
    pub fn from_final(final_byte: u8) -> Option<Self> {
        match final_byte {
            b'B' => Some(Self::Ascii),
            b'0' => Some(Self::DecGraphics),
            b'A' => Some(Self::Uk),
            _ => None,
        }
    }

    /// Remap a graphic ASCII byte. `None` means the byte stands for itself.
    pub fn map(self, byte: u8) -> Option<&'static str> {
        match self {
            Self::Ascii => None,
            Self::Uk => match byte {
                b'#' => Some("\u{00A3}"),
                _ => None,
            },
            Self::DecGraphics => dec_graphics(byte),
        }
    }
}

/// The VT100 special graphics range, `0x5F..=0x7E`.
fn dec_graphics(byte: u8) -> Option<&'static str> {
    let glyph = match byte {
        b'_' => " ",
        b'`' => "\u{25C6}", // diamond
        b'a' => "\u{2592}", // checker board
        b'b' => "\u{2409}", // HT
        b'c' => "\u{240C}", // FF
        b'd' => "\u{240D}", // CR
        b'e' => "\u{240A}", // LF
        b'f' => "\u{00B0}", // degree
        b'g' => "\u{00B1}", // plus/minus
        b'h' => "\u{2424}", // NL
        b'i' => "\u{240B}", // VT
        b'j' => "\u{2518}", // corner lower-right
        b'k' => "\u{2510}", // corner upper-right
        b'l' => "\u{250C}", // corner upper-left
        b'm' => "\u{2514}", // corner lower-left
        b'n' => "\u{253C}", // crossing lines
        b'o' => "\u{23BA}", // scan line 1
        b'p' => "\u{23BB}", // scan line 3
        b'q' => "\u{2500}", // horizontal line
        b'r' => "\u{23BC}", // scan line 7
        b's' => "\u{23BD}", // scan line 9
        b't' => "\u{251C}", // left tee
        b'u' => "\u{2524}", // right tee
        b'v' => "\u{2534}", // bottom tee
        b'w' => "\u{252C}", // top tee
        b'x' => "\u{2502}", // vertical line
        b'y' => "\u{2264}", // less than or equal
        b'z' => "\u{2265}", // greater than or equal
        b'{' => "\u{03C0}", // pi
        b'|' => "\u{2260}", // not equal
        b'}' => "\u{00A3}", // pound sign
        b'~' => "\u{00B7}", // middle dot
        _ => return None,
    };
    Some(glyph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn designation_finals() {
        assert_eq!(Charset::from_final(b'B'), Some(Charset::Ascii));
        assert_eq!(Charset::from_final(b'0'), Some(Charset::DecGraphics));
        assert_eq!(Charset::from_final(b'A'), Some(Charset::Uk));
        assert_eq!(Charset::from_final(b'U'), None);
    }

    #[test]
    fn ascii_passes_everything_through() {
        for b in 0x20..0x7F {
            assert_eq!(Charset::Ascii.map(b), None);
        }
    }

    #[test]
    fn dec_graphics_box_drawing() {
        assert_eq!(Charset::DecGraphics.map(b'q'), Some("\u{2500}"));
        assert_eq!(Charset::DecGraphics.map(b'x'), Some("\u{2502}"));
        assert_eq!(Charset::DecGraphics.map(b'l'), Some("\u{250C}"));
        // Letters outside the graphics range are untouched.
        assert_eq!(Charset::DecGraphics.map(b'A'), None);
    }

    #[test]
    fn uk_remaps_only_the_pound() {
        assert_eq!(Charset::Uk.map(b'#'), Some("\u{00A3}"));
        assert_eq!(Charset::Uk.map(b'$'), None);
    }
}
