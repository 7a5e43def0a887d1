//! witerm - an embedded remote-terminal core
//!
//! witerm turns a raw serial byte stream into a compact, renderable screen
//! for a memory-constrained device. The host firmware owns the transport
//! and the scheduler; this crate owns everything between received byte and
//! serialized screen.
//!
//! # Features
//!
//! - **Chunk-independent lexing**: escape sequences and UTF-8 code points
//!   split across reads resume exactly where they left off
//! - **VT100/VT220 interpreters**: cursor motion, scrolling regions, SGR,
//!   DEC private modes, alternate screen, tab stops, charsets
//! - **Bounded memory**: fixed cell budget, packed one-byte-symbol cells,
//!   reference-counted Unicode cache, no allocation on the hot path
//! - **Differential serializer**: resumable run-length wire format driven
//!   through caller-sized buffers
//! - **Mouse reporting**: X10/normal/button/any-motion tracking in classic,
//!   SGR, and URXVT encodings, plus focus reports and bracketed paste
//!
//! # Pipeline
//!
//! ```text
//! serial bytes ──> Lexer ──> Interpreter ──> Screen ──> encode ──> remote
//!                                │              │
//!                                └── replies ───┴── change notifications
//! ```
//!
//! # Quick Start
//!
//! ```
//! use witerm::{Change, TermSink, Terminal};
//!
//! struct Uart;
//!
//! impl TermSink for Uart {
//!     fn respond(&mut self, _bytes: &[u8]) { /* write to the serial link */ }
//!     fn notify(&mut self, _change: Change) { /* schedule a repaint */ }
//! }
//!
//! let mut term = Terminal::new(Uart);
//! term.feed(b"\x1b[1;31mhello\x1b[0m");
//! assert_eq!(term.screen().row_text(0).trim_end(), "hello");
//! ```

pub mod config;
pub mod term;
pub mod terminal;

pub use config::TermConfig;
pub use term::{
    AttrFlags, Cell, ColorPair, EncodeError, EncodeState, Modifiers, MouseButton, MouseEncoding,
    MouseEvent, MouseEventKind, MouseMode, ResizeError, Screen, Status, Step,
};
pub use terminal::{Change, TermSink, Terminal};

#[cfg(test)]
mod tests {
    use crate::terminal::{Change, TermSink, Terminal};

    #[derive(Default)]
    struct Recorder {
        responses: Vec<u8>,
        notifications: Vec<Change>,
    }

    impl TermSink for Recorder {
        fn respond(&mut self, bytes: &[u8]) {
            self.responses.extend_from_slice(bytes);
        }

        fn notify(&mut self, change: Change) {
            self.notifications.push(change);
        }
    }

    fn terminal() -> Terminal<Recorder> {
        Terminal::new(Recorder::default())
    }

    #[test]
    fn deferred_wrap_crosses_rows_only_without_backspace() {
        let mut term = terminal();
        term.feed(&[b'a'; 80]);
        let c = term.screen().cursor();
        assert_eq!((c.x, c.y, c.hanging), (79, 0, true));
        term.feed(b"b");
        let c = term.screen().cursor();
        assert_eq!((c.x, c.y), (1, 1));
        assert!(term.screen().row_text(1).starts_with('b'));

        let mut term = terminal();
        term.feed(&[b'a'; 80]);
        term.feed(b"\x08X");
        assert_eq!(term.screen().cursor().y, 0);
        assert!(term.screen().row_text(0).ends_with('X'));
        assert!(term.screen().row_text(1).trim_end().is_empty());
    }

    #[test]
    fn cache_slots_return_to_free_through_the_pipeline() {
        let mut term = terminal();
        term.feed("ééé".as_bytes());
        assert_eq!(term.screen().glyphs().live_slots(), 1);
        term.feed(b"\x1b[2J");
        assert_eq!(term.screen().glyphs().live_slots(), 0);
    }

    #[test]
    fn bell_notification_reaches_the_host() {
        let mut term = terminal();
        term.feed(b"\x07");
        assert_eq!(term.sink().notifications, vec![Change::Bell]);
    }

    mod prop_tests {
        use super::*;
        use crate::term::encode::{encode, EncodeState, Status};
        use crate::term::screen::Screen;
        use proptest::prelude::*;

        fn rows(term: &Terminal<Recorder>) -> Vec<String> {
            (0..term.screen().height())
                .map(|y| term.screen().row_text(y))
                .collect()
        }

        fn drain(screen: &Screen, chunk: usize) -> Vec<u8> {
            let mut state = EncodeState::new();
            let mut buf = vec![0u8; chunk];
            let mut out = Vec::new();
            loop {
                let step = encode(screen, &mut state, &mut buf).unwrap();
                out.extend_from_slice(&buf[..step.written]);
                if step.status == Status::Done {
                    return out;
                }
            }
        }

        proptest! {
            #[test]
            fn feeding_arbitrary_bytes_never_panics(
                bytes in prop::collection::vec(any::<u8>(), 0..2048),
            ) {
                let mut term = terminal();
                term.feed(&bytes);
                term.reset();
                term.feed(b"still alive");
            }

            #[test]
            fn chunking_never_changes_the_outcome(
                bytes in prop::collection::vec(any::<u8>(), 0..512),
                cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
            ) {
                let mut whole = terminal();
                whole.feed(&bytes);

                let mut positions: Vec<usize> =
                    cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
                positions.sort_unstable();
                let mut split = terminal();
                let mut start = 0;
                for p in positions {
                    split.feed(&bytes[start..p]);
                    start = p;
                }
                split.feed(&bytes[start..]);

                prop_assert_eq!(whole.screen().cursor(), split.screen().cursor());
                prop_assert_eq!(&whole.sink().responses, &split.sink().responses);
                prop_assert_eq!(rows(&whole), rows(&split));
            }

            #[test]
            fn serializer_output_is_buffer_size_independent(
                bytes in prop::collection::vec(any::<u8>(), 0..512),
                chunk in 16usize..96,
            ) {
                let mut term = terminal();
                term.feed(&bytes);
                let one_shot = drain(term.screen(), 1 << 16);
                let chunked = drain(term.screen(), chunk);
                prop_assert_eq!(one_shot, chunked);
            }
        }
    }
}
