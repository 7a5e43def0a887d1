//! Escape-sequence lexer.
//!
//! A persistent-state scanner over the raw serial byte stream. `feed`
//! consumes chunks of any size; every piece of in-progress sequence state
//! lives in the struct, so chunk boundaries are invisible to the grammar.
//! Decoded events are handed to an [`Actions`] sink; the lexer itself never
//! touches the screen.
//!
//! Malformed input in any sub-grammar - bad lead bytes, invalid UTF-8,
//! aborted strings - is logged and dropped, and the lexer returns to
//! ground. No input, however adversarial, may panic or corrupt unrelated
//! state.

use tracing::debug;

/// Maximum numeric parameters a CSI sequence can carry. Further fields are
/// dropped with a diagnostic.
pub const MAX_PARAMS: usize = 3;

/// String-command bodies longer than this are consumed but discarded.
const MAX_STRING: usize = 1024;

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;
const CAN: u8 = 0x18;
const SUB: u8 = 0x1A;

/// Which string-command grammar a body belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StringKind {
    #[default]
    Osc,
    Dcs,
    Pm,
    Apc,
    Sos,
}

/// Sink for decoded events. One implementation per consumer: the sequence
/// interpreter in production, recorders in tests.
pub trait Actions {
    /// Graphic ASCII byte (0x20..=0x7E).
    fn print_ascii(&mut self, byte: u8);
    /// One complete, validated multi-byte UTF-8 code point (2-4 bytes).
    fn print_utf8(&mut self, bytes: &[u8]);
    /// C0 control byte (executed even inside a pending CSI).
    fn control(&mut self, byte: u8);
    /// Short escape sequence: optional intermediate, final byte.
    fn esc_dispatch(&mut self, intermediate: Option<u8>, final_byte: u8);
    /// Control sequence: lead (`?`/`>`/`=`/`<`), numeric parameters,
    /// optional intermediate, final byte.
    fn csi_dispatch(
        &mut self,
        lead: Option<u8>,
        params: &[u16],
        intermediate: Option<u8>,
        final_byte: u8,
    );
    /// Completed string command (OSC/DCS/PM/APC/SOS) body.
    fn string_dispatch(&mut self, kind: StringKind, body: &[u8]);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiParam,
    OscString,
    DcsString,
    /// PM, APC and SOS share one body grammar.
    StringBody,
}

/// The scanner. All state persists across `feed` calls.
pub struct Lexer {
    state: State,
    params: [u16; MAX_PARAMS],
    nparams: usize,
    current: Option<u16>,
    lead: Option<u8>,
    intermediate: Option<u8>,
    string_kind: StringKind,
    body: Vec<u8>,
    string_overflow: bool,
    /// ESC seen inside a string body; the next byte decides ST vs abort.
    string_esc: bool,
    utf8_buf: [u8; 4],
    utf8_len: u8,
    utf8_want: u8,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: [0; MAX_PARAMS],
            nparams: 0,
            current: None,
            lead: None,
            intermediate: None,
            string_kind: StringKind::Osc,
            body: Vec::with_capacity(128),
            string_overflow: false,
            string_esc: false,
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_want: 0,
        }
    }

    /// Feed a chunk of raw bytes. Safe to call with any split of the same
    /// stream; state persists between calls.
    pub fn feed(&mut self, bytes: &[u8], actions: &mut impl Actions) {
        for &byte in bytes {
            self.step(byte, actions);
        }
    }

    /// Force ground state, discarding any in-progress sequence. This is
    /// the end-of-input action: the host calls it on idle timeout or
    /// stream teardown.
    pub fn reset(&mut self) {
        if self.state != State::Ground {
            debug!(state = ?self.state, "lexer reset discarded an unfinished sequence");
        } else if self.utf8_want > 0 {
            debug!("lexer reset discarded a partial UTF-8 sequence");
        }
        self.state = State::Ground;
        self.clear_sequence();
        self.body.clear();
        self.string_overflow = false;
        self.string_esc = false;
        self.utf8_len = 0;
        self.utf8_want = 0;
    }

    /// True when no sequence or UTF-8 code point is in progress.
    pub fn is_ground(&self) -> bool {
        self.state == State::Ground && self.utf8_want == 0
    }

    fn clear_sequence(&mut self) {
        self.params = [0; MAX_PARAMS];
        self.nparams = 0;
        self.current = None;
        self.lead = None;
        self.intermediate = None;
    }

    fn step(&mut self, byte: u8, actions: &mut impl Actions) {
        // A pending ESC inside a string decides between ST and abort before
        // anything else sees the byte.
        if self.string_esc {
            self.string_esc = false;
            if byte == b'\\' {
                self.finish_string(actions);
                return;
            }
            // Not a terminator: the body is dispatched as-is and the byte
            // is reprocessed as a fresh escape.
            self.finish_string(actions);
            self.enter_escape();
            if byte != ESC {
                self.step(byte, actions);
            }
            return;
        }

        // The UTF-8 accumulator is orthogonal to the sequence FSM; it only
        // ever runs in ground.
        if self.utf8_want > 0 {
            if (0x80..=0xBF).contains(&byte) {
                self.utf8_buf[self.utf8_len as usize] = byte;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_want {
                    self.finish_utf8(actions);
                }
                return;
            }
            debug!(
                got = byte,
                have = self.utf8_len,
                want = self.utf8_want,
                "invalid UTF-8 continuation, discarding partial sequence"
            );
            self.utf8_len = 0;
            self.utf8_want = 0;
            // Fall through: the offending byte is reprocessed normally.
        }

        // C0 controls execute immediately in every non-string state so a
        // CR or LF inside a half-received CSI is not lost.
        if byte < 0x20 && !self.in_string() {
            match byte {
                ESC => self.enter_escape(),
                CAN | SUB => {
                    if self.state != State::Ground {
                        debug!(state = ?self.state, "sequence cancelled by CAN/SUB");
                    }
                    self.state = State::Ground;
                    self.clear_sequence();
                }
                _ => actions.control(byte),
            }
            return;
        }

        match self.state {
            State::Ground => self.ground(byte, actions),
            State::Escape => self.escape(byte, actions),
            State::EscapeIntermediate => self.escape_intermediate(byte, actions),
            State::CsiParam => self.csi_param(byte, actions),
            State::OscString | State::DcsString | State::StringBody => {
                self.string_body(byte, actions)
            }
        }
    }

    fn enter_escape(&mut self) {
        self.state = State::Escape;
        self.clear_sequence();
    }

    fn ground(&mut self, byte: u8, actions: &mut impl Actions) {
        match byte {
            0x20..=0x7E => actions.print_ascii(byte),
            0x7F => actions.control(byte),
            0xC2..=0xDF => self.start_utf8(byte, 2),
            0xE0..=0xEF => self.start_utf8(byte, 3),
            0xF0..=0xF4 => self.start_utf8(byte, 4),
            _ => {
                // 0x80..=0xC1 and 0xF5..=0xFF can never start a valid
                // UTF-8 sequence.
                debug!(byte, "forbidden UTF-8 lead byte discarded");
            }
        }
    }

    fn start_utf8(&mut self, byte: u8, want: u8) {
        self.utf8_buf[0] = byte;
        self.utf8_len = 1;
        self.utf8_want = want;
    }

    fn finish_utf8(&mut self, actions: &mut impl Actions) {
        let len = self.utf8_len as usize;
        self.utf8_len = 0;
        self.utf8_want = 0;
        let bytes = &self.utf8_buf[..len];
        // std validation rejects overlong forms, surrogates and code
        // points above U+10FFFF.
        if std::str::from_utf8(bytes).is_ok() {
            actions.print_utf8(bytes);
        } else {
            debug!(?bytes, "rejected UTF-8 sequence (overlong, surrogate or out of range)");
        }
    }

    fn escape(&mut self, byte: u8, actions: &mut impl Actions) {
        match byte {
            b'[' => {
                self.state = State::CsiParam;
                self.clear_sequence();
            }
            b']' => self.enter_string(State::OscString, StringKind::Osc),
            b'P' => self.enter_string(State::DcsString, StringKind::Dcs),
            b'^' => self.enter_string(State::StringBody, StringKind::Pm),
            b'_' => self.enter_string(State::StringBody, StringKind::Apc),
            b'X' => self.enter_string(State::StringBody, StringKind::Sos),
            0x20..=0x2F => {
                self.intermediate = Some(byte);
                self.state = State::EscapeIntermediate;
            }
            0x30..=0x7E => {
                self.state = State::Ground;
                actions.esc_dispatch(None, byte);
            }
            _ => {
                debug!(byte, "malformed escape sequence discarded");
                self.state = State::Ground;
                self.step(byte, actions);
            }
        }
    }

    fn escape_intermediate(&mut self, byte: u8, actions: &mut impl Actions) {
        match byte {
            0x20..=0x2F => {
                // Only single-intermediate sequences are in the implemented
                // subset; the earlier byte wins.
                debug!(byte, "extra escape intermediate ignored");
            }
            0x30..=0x7E => {
                let intermediate = self.intermediate.take();
                self.state = State::Ground;
                actions.esc_dispatch(intermediate, byte);
            }
            _ => {
                debug!(byte, "malformed escape sequence discarded");
                self.state = State::Ground;
                self.step(byte, actions);
            }
        }
    }

    fn csi_param(&mut self, byte: u8, actions: &mut impl Actions) {
        match byte {
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                self.current = Some(
                    self.current
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            b';' | b':' => self.push_param(),
            0x3C..=0x3F => {
                // A lead byte is only valid before any digits.
                if self.lead.is_none() && self.current.is_none() && self.nparams == 0 {
                    self.lead = Some(byte);
                } else {
                    debug!(byte, "lead byte after parameters, sequence discarded");
                    self.state = State::Ground;
                }
            }
            0x20..=0x2F => {
                if self.intermediate.is_some() {
                    debug!(byte, "second CSI intermediate, sequence discarded");
                    self.state = State::Ground;
                } else {
                    if self.current.is_some() {
                        self.push_param();
                    }
                    self.intermediate = Some(byte);
                }
            }
            0x40..=0x7E => {
                if self.current.is_some() {
                    self.push_param();
                }
                let lead = self.lead;
                let intermediate = self.intermediate;
                let nparams = self.nparams;
                let params = self.params;
                self.state = State::Ground;
                actions.csi_dispatch(lead, &params[..nparams], intermediate, byte);
            }
            _ => {
                debug!(byte, "malformed CSI sequence discarded");
                self.state = State::Ground;
                self.step(byte, actions);
            }
        }
    }

    fn push_param(&mut self) {
        let value = self.current.take().unwrap_or(0);
        if self.nparams < MAX_PARAMS {
            self.params[self.nparams] = value;
            self.nparams += 1;
        } else {
            debug!(value, "CSI parameter overflow, field dropped");
        }
    }

    fn enter_string(&mut self, state: State, kind: StringKind) {
        self.state = state;
        self.string_kind = kind;
        self.body.clear();
        self.string_overflow = false;
    }

    fn string_body(&mut self, byte: u8, actions: &mut impl Actions) {
        match byte {
            BEL => self.finish_string(actions),
            ESC => self.string_esc = true,
            CAN | SUB => {
                debug!(kind = ?self.string_kind, "string command cancelled");
                self.body.clear();
                self.string_overflow = false;
                self.state = State::Ground;
            }
            _ => {
                if self.body.len() < MAX_STRING {
                    self.body.push(byte);
                } else if !self.string_overflow {
                    debug!(kind = ?self.string_kind, "string body overflow, discarding");
                    self.string_overflow = true;
                }
            }
        }
    }

    fn finish_string(&mut self, actions: &mut impl Actions) {
        self.state = State::Ground;
        if self.string_overflow {
            self.string_overflow = false;
            self.body.clear();
            return;
        }
        actions.string_dispatch(self.string_kind, &self.body);
        self.body.clear();
    }

    fn in_string(&self) -> bool {
        matches!(
            self.state,
            State::OscString | State::DcsString | State::StringBody
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every decoded event for assertions.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Actions for Recorder {
        fn print_ascii(&mut self, byte: u8) {
            self.events.push(format!("ascii:{}", byte as char));
        }
        fn print_utf8(&mut self, bytes: &[u8]) {
            self.events
                .push(format!("utf8:{}", String::from_utf8_lossy(bytes)));
        }
        fn control(&mut self, byte: u8) {
            self.events.push(format!("ctl:{byte:02x}"));
        }
        fn esc_dispatch(&mut self, intermediate: Option<u8>, final_byte: u8) {
            self.events.push(format!(
                "esc:{}{}",
                intermediate.map(|b| b as char).unwrap_or('-'),
                final_byte as char
            ));
        }
        fn csi_dispatch(
            &mut self,
            lead: Option<u8>,
            params: &[u16],
            intermediate: Option<u8>,
            final_byte: u8,
        ) {
            self.events.push(format!(
                "csi:{}{:?}{}{}",
                lead.map(|b| b as char).unwrap_or('-'),
                params,
                intermediate.map(|b| b as char).unwrap_or('-'),
                final_byte as char
            ));
        }
        fn string_dispatch(&mut self, kind: StringKind, body: &[u8]) {
            self.events.push(format!(
                "str:{:?}:{}",
                kind,
                String::from_utf8_lossy(body)
            ));
        }
    }

    fn run(bytes: &[u8]) -> Vec<String> {
        let mut lexer = Lexer::new();
        let mut rec = Recorder::default();
        lexer.feed(bytes, &mut rec);
        rec.events
    }

    fn run_split(bytes: &[u8]) -> Vec<String> {
        let mut lexer = Lexer::new();
        let mut rec = Recorder::default();
        for b in bytes {
            lexer.feed(std::slice::from_ref(b), &mut rec);
        }
        rec.events
    }

    #[test]
    fn plain_text_prints() {
        assert_eq!(run(b"Hi"), vec!["ascii:H", "ascii:i"]);
    }

    #[test]
    fn csi_with_params() {
        assert_eq!(run(b"\x1b[5;10H"), vec!["csi:-[5, 10]-H"]);
    }

    #[test]
    fn csi_empty_and_omitted_params() {
        assert_eq!(run(b"\x1b[H"), vec!["csi:-[]-H"]);
        assert_eq!(run(b"\x1b[;5H"), vec!["csi:-[0, 5]-H"]);
    }

    #[test]
    fn csi_lead_byte() {
        assert_eq!(run(b"\x1b[?25h"), vec!["csi:?[25]-h"]);
    }

    #[test]
    fn csi_intermediate_byte() {
        assert_eq!(run(b"\x1b[2 q"), vec!["csi:-[2] q"]);
    }

    #[test]
    fn csi_param_overflow_drops_extras() {
        assert_eq!(run(b"\x1b[1;2;3;4m"), vec!["csi:-[1, 2, 3]-m"]);
    }

    #[test]
    fn lead_after_digits_is_discarded() {
        // Structurally invalid: nothing dispatched, trailing final eaten
        // as ground text.
        assert_eq!(run(b"\x1b[1?h"), vec!["ascii:h"]);
    }

    #[test]
    fn chunk_boundaries_are_invisible() {
        let seq = b"\x1b[38;5;1mA\x1b]0;title\x07\xc3\xa9";
        assert_eq!(run(seq), run_split(seq));
    }

    #[test]
    fn control_executes_inside_pending_csi() {
        assert_eq!(run(b"\x1b[5\rA"), vec!["ctl:0d", "csi:-[5]-A"]);
    }

    #[test]
    fn can_aborts_a_sequence() {
        assert_eq!(run(b"\x1b[5\x18HX"), vec!["ascii:H", "ascii:X"]);
    }

    #[test]
    fn esc_restarts_a_sequence() {
        assert_eq!(run(b"\x1b[5\x1b[6n"), vec!["csi:-[6]-n"]);
    }

    #[test]
    fn osc_terminated_by_bel() {
        assert_eq!(run(b"\x1b]0;hello\x07"), vec!["str:Osc:0;hello"]);
    }

    #[test]
    fn osc_terminated_by_st() {
        assert_eq!(run(b"\x1b]0;hello\x1b\\"), vec!["str:Osc:0;hello"]);
    }

    #[test]
    fn osc_aborted_by_new_sequence_still_dispatches() {
        assert_eq!(
            run(b"\x1b]0;partial\x1b[2J"),
            vec!["str:Osc:0;partial", "csi:-[2]-J"]
        );
    }

    #[test]
    fn dcs_and_pm_bodies() {
        assert_eq!(run(b"\x1bP$qm\x1b\\"), vec!["str:Dcs:$qm"]);
        assert_eq!(run(b"\x1b^ignored\x1b\\"), vec!["str:Pm:ignored"]);
    }

    #[test]
    fn string_cancelled_by_can_is_dropped() {
        assert_eq!(run(b"\x1b]0;junk\x18A"), vec!["ascii:A"]);
    }

    #[test]
    fn short_esc_dispatch() {
        assert_eq!(run(b"\x1b7"), vec!["esc:-7"]);
        assert_eq!(run(b"\x1b(0"), vec!["esc:(0"]);
        assert_eq!(run(b"\x1b#8"), vec!["esc:#8"]);
    }

    #[test]
    fn utf8_two_three_four_bytes() {
        assert_eq!(run("é".as_bytes()), vec!["utf8:é"]);
        assert_eq!(run("€".as_bytes()), vec!["utf8:€"]);
        assert_eq!(run("🙂".as_bytes()), vec!["utf8:🙂"]);
    }

    #[test]
    fn orphan_continuation_is_discarded() {
        assert_eq!(run(b"\x80A"), vec!["ascii:A"]);
    }

    #[test]
    fn forbidden_leads_are_discarded() {
        assert_eq!(run(b"\xc0\xafA"), vec!["ascii:A"]);
        assert_eq!(run(b"\xffA"), vec!["ascii:A"]);
    }

    #[test]
    fn overlong_encoding_rejected() {
        // 0xE0 0x80 0xAF would decode to '/' if overlongs were accepted.
        assert_eq!(run(b"\xe0\x80\xafA"), vec!["ascii:A"]);
    }

    #[test]
    fn surrogate_rejected() {
        assert_eq!(run(b"\xed\xa0\x80A"), vec!["ascii:A"]);
    }

    #[test]
    fn interrupted_utf8_reprocesses_the_interrupter() {
        // ESC arrives mid-sequence: partial dropped, CSI still parses.
        assert_eq!(run(b"\xc3\x1b[2J"), vec!["csi:-[2]-J"]);
    }

    #[test]
    fn reset_discards_everything() {
        let mut lexer = Lexer::new();
        let mut rec = Recorder::default();
        lexer.feed(b"\x1b[12", &mut rec);
        lexer.reset();
        assert!(lexer.is_ground());
        lexer.feed(b"A", &mut rec);
        assert_eq!(rec.events, vec!["ascii:A"]);
    }

    #[test]
    fn string_overflow_is_consumed_and_dropped() {
        let mut input = b"\x1b]0;".to_vec();
        input.extend(std::iter::repeat(b'x').take(2000));
        input.push(0x07);
        input.push(b'A');
        assert_eq!(run(&input), vec!["ascii:A"]);
    }
}
