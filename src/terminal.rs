//! Terminal facade.
//!
//! Combines the lexer, the sequence interpreters, and the screen behind a
//! single push-style object the host drives:
//!
//! ```text
//! Terminal
//! ├── Lexer (escape sequences + UTF-8 reassembly)
//! ├── Screen (cell grid, cursor, modes, glyph cache)
//! └── TermSink (host transport: echo replies + change notifications)
//! ```
//!
//! [`Terminal::feed`] consumes one received chunk; query replies and
//! encoded input events go back out through the sink's echo channel, and
//! each outer feed fires at most one notification per changed topic.

use crate::config::TermConfig;
use crate::term::encode::{self, EncodeError, EncodeState, Step};
use crate::term::interp::Interpreter;
use crate::term::lexer::Lexer;
use crate::term::mouse::MouseEvent;
use crate::term::screen::{ChangeSet, ResizeError, Screen};

/// Change-notification topics, delivered at most once per feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Grid content, cursor, or a presentation option changed.
    Content,
    /// Title or a soft-button label changed.
    Labels,
    /// BEL was received.
    Bell,
}

/// Host transport hooks.
///
/// `respond` carries echo-channel traffic: query replies and encoded
/// mouse/focus/paste input. Replies are raw bytes, not text; the classic
/// mouse encoding produces bytes above 0x7F.
pub trait TermSink {
    fn respond(&mut self, bytes: &[u8]);
    fn notify(&mut self, change: Change);
}

/// One remote terminal: owned state, explicitly passed, single caller.
pub struct Terminal<S: TermSink> {
    screen: Screen,
    lexer: Lexer,
    replies: Vec<u8>,
    sink: S,
}

impl<S: TermSink> Terminal<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(TermConfig::default(), sink)
    }

    pub fn with_config(config: TermConfig, sink: S) -> Self {
        let mut screen = Screen::new(config.cols, config.rows);
        screen.set_default_colors(config.colors.foreground, config.colors.background);
        screen.set_tab_interval(config.tabs.interval);
        if !config.title.is_empty() {
            screen.set_title(&config.title);
        }
        // Construction is not a mutation batch.
        let _ = screen.take_changes();
        Self {
            screen,
            lexer: Lexer::new(),
            replies: Vec::new(),
            sink,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume one received chunk. Chunk boundaries are irrelevant;
    /// sequences split across calls resume where they left off.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.screen.begin_batch();
        let mut interp = Interpreter {
            screen: &mut self.screen,
            replies: &mut self.replies,
        };
        self.lexer.feed(bytes, &mut interp);
        let changes = self.screen.end_batch();
        if !self.replies.is_empty() {
            self.sink.respond(&self.replies);
            self.replies.clear();
        }
        self.dispatch(changes);
    }

    /// Abandon any in-progress sequence and return the lexer to ground.
    /// The screen is untouched; this is the host's idle-timeout hook.
    pub fn reset(&mut self) {
        self.lexer.reset();
    }

    /// Host-driven resize (transport window change). The grid clears and
    /// the cursor homes; an invalid size is rejected with state unchanged.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), ResizeError> {
        self.screen.begin_batch();
        let result = self.screen.resize(cols, rows);
        let changes = self.screen.end_batch();
        self.dispatch(changes);
        result
    }

    /// Encode a host-side mouse event per the active tracking mode and
    /// write it to the echo channel. Filtered events are dropped.
    pub fn mouse_event(&mut self, event: &MouseEvent) {
        if let Some(bytes) = self.screen.mouse.encode(event) {
            self.sink.respond(&bytes);
        }
    }

    /// Report focus gained/lost, if the application asked for it.
    pub fn focus_event(&mut self, gained: bool) {
        if let Some(bytes) = self.screen.mouse.focus_report(gained) {
            self.sink.respond(bytes);
        }
    }

    /// Forward pasted text, bracketed when the application enabled it.
    pub fn paste(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.screen.modes.bracketed_paste {
            let mut wrapped = Vec::with_capacity(text.len() + 12);
            wrapped.extend_from_slice(b"\x1b[200~");
            wrapped.extend_from_slice(text.as_bytes());
            wrapped.extend_from_slice(b"\x1b[201~");
            self.sink.respond(&wrapped);
        } else {
            self.sink.respond(text.as_bytes());
        }
    }

    /// Serialize the screen for the remote renderer; see
    /// [`encode`](crate::term::encode::encode).
    pub fn encode(
        &self,
        state: &mut EncodeState,
        buf: &mut [u8],
    ) -> Result<Step, EncodeError> {
        encode::encode(&self.screen, state, buf)
    }

    fn dispatch(&mut self, changes: ChangeSet) {
        if changes.contains(ChangeSet::CONTENT) {
            self.sink.notify(Change::Content);
        }
        if changes.contains(ChangeSet::LABELS) {
            self.sink.notify(Change::Labels);
        }
        if changes.contains(ChangeSet::BELL) {
            self.sink.notify(Change::Bell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::mouse::{MouseButton, MouseEventKind, Modifiers};

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
    fn config_shapes_the_screen() {
        let config = TermConfig::from_toml_str(
            "cols = 40\nrows = 12\ntitle = \"uart0\"\n[colors]\nforeground = 2",
        )
        .unwrap();
        let term = Terminal::with_config(config, Recorder::default());
        assert_eq!(term.screen().size(), (40, 12));
        assert_eq!(term.screen().title(), "uart0");
        assert_eq!(term.screen().default_colors(), (2, 0));
        // Construction fires no notifications.
        assert!(term.sink().notifications.is_empty());
    }

    #[test]
    fn one_notification_per_topic_per_feed() {
        let mut term = terminal();
        term.feed(b"hello\x07 world\x07\x1b]0;t\x07");
        assert_eq!(
            term.sink().notifications,
            vec![Change::Content, Change::Labels, Change::Bell]
        );
    }

    #[test]
    fn query_only_feed_notifies_nothing() {
        let mut term = terminal();
        term.feed(b"\x1b[6n\x1b[5n");
        assert_eq!(term.sink().responses, b"\x1b[1;1R\x1b[0n");
        assert!(term.sink().notifications.is_empty());
    }

    #[test]
    fn chunk_boundaries_are_invisible() {
        let mut whole = terminal();
        whole.feed("a\x1b[10;5H\x1b[1;31mé\x1b[6n".as_bytes());

        let mut split = terminal();
        for byte in "a\x1b[10;5H\x1b[1;31mé\x1b[6n".as_bytes() {
            split.feed(&[*byte]);
        }

        assert_eq!(whole.screen().cursor(), split.screen().cursor());
        assert_eq!(whole.sink().responses, split.sink().responses);
        for y in 0..24 {
            assert_eq!(whole.screen().row_text(y), split.screen().row_text(y));
        }
    }

    #[test]
    fn reset_abandons_a_split_sequence() {
        let mut term = terminal();
        term.feed(b"\x1b[31");
        term.reset();
        term.feed(b"4m");
        // The '4' and 'm' print as ordinary text.
        assert!(term.screen().row_text(0).starts_with("4m"));
        assert!(term.screen().pen.attrs.is_empty());
    }

    #[test]
    fn mouse_events_follow_the_negotiated_protocol() {
        let mut term = terminal();
        let press = MouseEvent {
            kind: MouseEventKind::Press(MouseButton::Left),
            x: 2,
            y: 4,
            modifiers: Modifiers::empty(),
        };
        term.mouse_event(&press);
        assert!(term.sink().responses.is_empty());

        term.feed(b"\x1b[?1000h\x1b[?1006h");
        term.mouse_event(&press);
        assert_eq!(term.sink().responses, b"\x1b[<0;3;5M");
    }

    #[test]
    fn focus_reports_when_enabled() {
        let mut term = terminal();
        term.focus_event(true);
        assert!(term.sink().responses.is_empty());
        term.feed(b"\x1b[?1004h");
        term.focus_event(true);
        term.focus_event(false);
        assert_eq!(term.sink().responses, b"\x1b[I\x1b[O");
    }

    #[test]
    fn paste_wraps_only_when_bracketed() {
        let mut term = terminal();
        term.paste("plain");
        assert_eq!(term.sink().responses, b"plain");
        term.sink_mut().responses.clear();
        term.feed(b"\x1b[?2004h");
        term.paste("safe");
        assert_eq!(term.sink().responses, b"\x1b[200~safe\x1b[201~");
    }

    #[test]
    fn host_resize_notifies_once() {
        let mut term = terminal();
        term.resize(100, 30).unwrap();
        assert_eq!(term.screen().size(), (100, 30));
        assert_eq!(term.sink().notifications, vec![Change::Content]);
        // Over budget: rejected, state and notifications unchanged.
        assert!(term.resize(512, 100).is_err());
        assert_eq!(term.screen().size(), (100, 30));
        assert_eq!(term.sink().notifications, vec![Change::Content]);
    }

    #[test]
    fn encode_round_trips_through_the_facade() {
        let mut term = terminal();
        term.feed(b"\x1b[1;33mwarn\x1b[0m ok");
        let mut state = EncodeState::default();
        let mut buf = [0u8; 4096];
        let step = term.encode(&mut state, &mut buf).unwrap();
        assert_eq!(step.status, encode::Status::Done);
        // Header carries the cursor the interpreters left behind.
        assert_eq!(buf[0], 80);
        assert_eq!(buf[2], 7);
    }
}
