//! Resumable screen serializer.
//!
//! The wire stream opens with a header (width, height, cursor x, cursor y
//! as 2-byte varints, then a packed option bitfield as a 3-byte varint)
//! and then streams cells row-major. The stream alphabet keeps the three
//! byte ranges disjoint: opcodes below 0x20, literal ASCII symbols
//! 0x20..=0x7E, and verbatim UTF-8 symbol bytes with leads at 0xC2 and
//! above. Color and attribute state is only sent when it changes, with the
//! smallest covering token; runs of identical cells collapse to a REPEAT
//! token when that is cheaper than repeating the symbol bytes.
//!
//! Continuation state lives in a caller-owned [`EncodeState`] so the host
//! can drive the encoder through bounded buffer fills. Tokens are never
//! split: a call that cannot fit the next whole token reports the partial
//! progress, and a call that cannot make any progress at all fails with
//! [`EncodeError::BufferTooSmall`]. Passing an empty buffer releases the
//! state for reuse.

use thiserror::Error;

use crate::term::cell::{AttrFlags, ColorPair};
use crate::term::mouse::{MouseEncoding, MouseMode};
use crate::term::screen::{Screen, DEFAULT_BG, DEFAULT_FG};

/// Set fg/bg; payload: one packed color byte.
pub const SET_COLORS: u8 = 0x01;
/// Set attributes; payload: one flag byte.
pub const SET_ATTRS: u8 = 0x02;
/// Set both; payload: color byte then flag byte.
pub const SET_BOTH: u8 = 0x03;
/// Repeat the previous cell; payload: a 2-byte varint count.
pub const REPEAT: u8 = 0x04;

const OPT_CURSOR_VISIBLE: u32 = 1 << 0;
const OPT_AUTO_WRAP: u32 = 1 << 1;
const OPT_ORIGIN: u32 = 1 << 2;
const OPT_REVERSE_WRAP: u32 = 1 << 3;
const OPT_INSERT: u32 = 1 << 4;
const OPT_NEWLINE: u32 = 1 << 5;
const OPT_BRACKETED_PASTE: u32 = 1 << 6;
const OPT_ALT_ACTIVE: u32 = 1 << 7;
const OPT_HANGING: u32 = 1 << 8;
const OPT_FOCUS_TRACKING: u32 = 1 << 9;
const OPT_MOUSE_MODE_SHIFT: u32 = 10;
const OPT_MOUSE_ENCODING_SHIFT: u32 = 13;
const OPT_CURSOR_STYLE_SHIFT: u32 = 15;

// Largest single token group: header (4 x varint2 + varint3 = 11) over a
// cell group (SET_BOTH + 4 symbol bytes + REPEAT + varint2 = 10).
const GROUP_MAX: usize = 11;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// The output buffer cannot hold even one whole token. Distinct from
    /// [`Status::More`], which reports partial progress.
    #[error("output buffer too small for the next token")]
    BufferTooSmall,
    /// A value exceeded its capped varint width. Never silently truncated.
    #[error("value {value} exceeds the {bits}-bit varint range")]
    VarintOverflow { value: u32, bits: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// More cells remain; call again.
    More,
    /// The whole grid has been emitted.
    Done,
}

/// Outcome of one [`encode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Bytes written into the output buffer.
    pub written: usize,
    pub status: Status,
}

/// Caller-owned continuation state.
///
/// The initial color/attr state is the device power-on default, a protocol
/// constant the remote renderer shares; a screen configured differently
/// simply emits a state token for its first cell.
#[derive(Debug, Clone, Copy)]
pub struct EncodeState {
    header_sent: bool,
    pos: usize,
    colors: ColorPair,
    attrs: AttrFlags,
}

impl EncodeState {
    pub fn new() -> Self {
        Self {
            header_sent: false,
            pos: 0,
            colors: ColorPair::new(DEFAULT_FG, DEFAULT_BG),
            attrs: AttrFlags::empty(),
        }
    }
}

impl Default for EncodeState {
    fn default() -> Self {
        Self::new()
    }
}

/// One token group, staged so it is written to the output whole or not at
/// all.
struct Group {
    buf: [u8; GROUP_MAX],
    len: usize,
}

impl Group {
    fn new() -> Self {
        Self {
            buf: [0; GROUP_MAX],
            len: 0,
        }
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.len] = byte;
        self.len += 1;
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Little-endian base-128 with a continuation bit, capped at
    /// `max_bytes` (2 bytes carry 14 bits, 3 carry 21).
    fn varint(&mut self, mut value: u32, max_bytes: u32) -> Result<(), EncodeError> {
        let bits = 7 * max_bytes;
        if value >> bits != 0 {
            return Err(EncodeError::VarintOverflow { value, bits });
        }
        loop {
            let low = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.push(low);
                return Ok(());
            }
            self.push(low | 0x80);
        }
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

fn varint_len(value: u32) -> usize {
    if value < 0x80 {
        1
    } else {
        2
    }
}

fn mouse_mode_bits(mode: MouseMode) -> u32 {
    match mode {
        MouseMode::Off => 0,
        MouseMode::X10 => 1,
        MouseMode::Normal => 2,
        MouseMode::ButtonEvent => 3,
        MouseMode::AnyEvent => 4,
    }
}

fn mouse_encoding_bits(encoding: MouseEncoding) -> u32 {
    match encoding {
        MouseEncoding::Classic => 0,
        MouseEncoding::Sgr => 1,
        MouseEncoding::Urxvt => 2,
    }
}

fn option_bits(screen: &Screen) -> u32 {
    let modes = &screen.modes;
    let mut bits = 0;
    for (flag, on) in [
        (OPT_CURSOR_VISIBLE, modes.cursor_visible),
        (OPT_AUTO_WRAP, modes.auto_wrap),
        (OPT_ORIGIN, modes.origin_mode),
        (OPT_REVERSE_WRAP, modes.reverse_wrap),
        (OPT_INSERT, modes.insert_mode),
        (OPT_NEWLINE, modes.newline_mode),
        (OPT_BRACKETED_PASTE, modes.bracketed_paste),
        (OPT_ALT_ACTIVE, modes.alt_active),
        (OPT_HANGING, screen.cursor().hanging),
        (OPT_FOCUS_TRACKING, screen.mouse.focus_tracking),
    ] {
        if on {
            bits |= flag;
        }
    }
    bits |= mouse_mode_bits(screen.mouse.mode) << OPT_MOUSE_MODE_SHIFT;
    bits |= mouse_encoding_bits(screen.mouse.encoding) << OPT_MOUSE_ENCODING_SHIFT;
    bits |= u32::from(screen.cursor_style.as_decscusr()) << OPT_CURSOR_STYLE_SHIFT;
    bits
}

fn header_group(screen: &Screen) -> Result<Group, EncodeError> {
    let mut group = Group::new();
    let (width, height) = screen.size();
    let cursor = screen.cursor();
    group.varint(u32::from(width), 2)?;
    group.varint(u32::from(height), 2)?;
    group.varint(u32::from(cursor.x), 2)?;
    group.varint(u32::from(cursor.y), 2)?;
    group.varint(option_bits(screen), 3)?;
    Ok(group)
}

/// Serialize as much of the grid as fits, resuming from `state`.
///
/// An empty `buf` releases the continuation state and reports `Done`.
pub fn encode(
    screen: &Screen,
    state: &mut EncodeState,
    buf: &mut [u8],
) -> Result<Step, EncodeError> {
    if buf.is_empty() {
        *state = EncodeState::new();
        return Ok(Step {
            written: 0,
            status: Status::Done,
        });
    }

    let cells = screen.cells();
    let mut written = 0;

    if !state.header_sent {
        let group = header_group(screen)?;
        if group.len > buf.len() {
            return Err(EncodeError::BufferTooSmall);
        }
        buf[..group.len].copy_from_slice(group.as_slice());
        written = group.len;
        state.header_sent = true;
    }

    while state.pos < cells.len() {
        let cell = cells[state.pos];
        let mut group = Group::new();

        match (cell.colors != state.colors, cell.attrs != state.attrs) {
            (true, true) => {
                group.push(SET_BOTH);
                group.push(cell.colors.packed());
                group.push(cell.attrs.bits());
            }
            (true, false) => {
                group.push(SET_COLORS);
                group.push(cell.colors.packed());
            }
            (false, true) => {
                group.push(SET_ATTRS);
                group.push(cell.attrs.bits());
            }
            (false, false) => {}
        }

        let symbol = screen.glyphs().bytes_or_replacement(cell.sym);
        group.extend(symbol.as_slice());

        let run = cells[state.pos + 1..]
            .iter()
            .take_while(|c| **c == cell)
            .count();
        let advance = if run > 0 && 1 + varint_len(run as u32) < run * symbol.len() {
            group.push(REPEAT);
            group.varint(run as u32, 2)?;
            1 + run
        } else {
            1
        };

        if written + group.len > buf.len() {
            if written == 0 {
                return Err(EncodeError::BufferTooSmall);
            }
            return Ok(Step {
                written,
                status: Status::More,
            });
        }
        buf[written..written + group.len].copy_from_slice(group.as_slice());
        written += group.len;
        state.pos += advance;
        state.colors = cell.colors;
        state.attrs = cell.attrs;
    }

    Ok(Step {
        written,
        status: Status::Done,
    })
}
