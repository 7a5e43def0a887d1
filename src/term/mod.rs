//! Terminal emulation core.
//!
//! This module contains the byte-stream-to-screen pipeline:
//!
//! - **lexer**: escape-sequence state machine and UTF-8 reassembly
//! - **interp**: decoded sequences applied to the screen, query replies
//! - **screen**: cell grid, cursor, scrolling region, modes, labels
//! - **cell**: packed cell, colors, attributes, the drawing pen
//! - **charset**: G0/G1 translation (DEC graphics, UK)
//! - **glyphs**: reference-counted cache for multi-byte code points
//! - **mouse**: tracking modes and input-event wire encodings
//! - **encode**: resumable differential serializer for remote rendering
//!
//! # Pipeline
//!
//! ```text
//! bytes ──> Lexer ──> Interpreter ──> Screen ──> encode ──> renderer
//!                         │
//!                         └──> replies (echo channel)
//! ```

pub mod cell;
pub mod charset;
pub mod encode;
pub mod glyphs;
pub mod interp;
pub mod lexer;
pub mod mouse;
pub mod screen;

pub use cell::{AttrFlags, Cell, ColorPair, Pen};
pub use encode::{EncodeError, EncodeState, Status, Step};
pub use glyphs::{GlyphCache, GlyphError};
pub use interp::Interpreter;
pub use lexer::{Actions, Lexer, StringKind};
pub use mouse::{
    Modifiers, MouseButton, MouseEncoding, MouseEvent, MouseEventKind, MouseMode, MouseTracking,
};
pub use screen::{ChangeSet, Cursor, CursorStyle, Modes, ResizeError, Screen};
