//! Sequence interpreters: decoded lexer events to screen operations and
//! query replies.
//!
//! The interpreter is the [`Actions`] implementation wired between the
//! lexer and the screen. Query responses (cursor position, device
//! attributes, DECRQSS strings) are staged into a reply buffer the owning
//! terminal flushes to its echo sink.
//!
//! Unrecognized-but-well-formed sequences log at debug and do nothing;
//! structurally invalid ones (bad submode, wrong arity) are discarded
//! without touching the screen.

use tracing::debug;

use crate::term::cell::AttrFlags;
use crate::term::charset::Charset;
use crate::term::lexer::{Actions, StringKind};
use crate::term::mouse::{MouseEncoding, MouseMode};
use crate::term::screen::{CursorStyle, Screen};

/// One interpreter borrowing the screen and a reply staging buffer for the
/// duration of a feed call.
pub struct Interpreter<'a> {
    pub screen: &'a mut Screen,
    pub replies: &'a mut Vec<u8>,
}

/// Parameter with an explicit default for omitted/absent fields.
fn param(params: &[u16], index: usize, default: u16) -> u16 {
    params.get(index).copied().unwrap_or(default)
}

/// Motion-family coercion: missing or zero becomes one.
fn one(params: &[u16], index: usize) -> u16 {
    match param(params, index, 1) {
        0 => 1,
        n => n,
    }
}

impl Interpreter<'_> {
    fn reply(&mut self, bytes: &[u8]) {
        self.replies.extend_from_slice(bytes);
    }

    fn csi(&mut self, lead: Option<u8>, params: &[u16], final_byte: u8) {
        match (lead, final_byte) {
            (None, b'A') => self.screen.move_up(one(params, 0)),
            (None, b'B') => self.screen.move_down(one(params, 0)),
            (None, b'C') => self.screen.move_forward(one(params, 0)),
            (None, b'D') => self.screen.move_back(one(params, 0)),
            (None, b'E') => {
                self.screen.move_down(one(params, 0));
                self.screen.carriage_return();
            }
            (None, b'F') => {
                self.screen.move_up(one(params, 0));
                self.screen.carriage_return();
            }
            (None, b'G') => self.screen.goto_col(one(params, 0) - 1),
            (None, b'd') => self.screen.goto_row(one(params, 0) - 1),
            (None, b'H') | (None, b'f') => {
                let row = one(params, 0) - 1;
                let col = one(params, 1) - 1;
                self.screen.goto(col, row);
            }
            (None, b'J') => self.screen.erase_display(param(params, 0, 0)),
            (None, b'K') => self.screen.erase_line(param(params, 0, 0)),
            (None, b'L') => self.screen.insert_lines(one(params, 0)),
            (None, b'M') => self.screen.delete_lines(one(params, 0)),
            (None, b'@') => self.screen.insert_chars(one(params, 0)),
            (None, b'P') => self.screen.delete_chars(one(params, 0)),
            (None, b'X') => self.screen.erase_chars(one(params, 0)),
            (None, b'S') => self.screen.scroll_up(one(params, 0)),
            (None, b'T') => self.screen.scroll_down(one(params, 0)),
            (None, b'I') => self.screen.tab_forward(one(params, 0)),
            (None, b'Z') => self.screen.tab_back(one(params, 0)),
            (None, b'g') => match param(params, 0, 0) {
                0 => self.screen.clear_tab_stop(),
                3 => self.screen.clear_all_tab_stops(),
                other => debug!(other, "discarded tab-clear submode"),
            },
            (None, b'm') => self.sgr(params),
            (None, b'r') => {
                self.screen
                    .set_scroll_region(param(params, 0, 0), param(params, 1, 0));
            }
            (None, b's') => self.screen.save_cursor_position(),
            (None, b'u') => self.screen.restore_cursor_position(),
            (None, b'h') => self.ansi_modes(params, true),
            (None, b'l') => self.ansi_modes(params, false),
            (None, b'n') => self.device_status(params),
            (None, b'c') => self.reply(b"\x1b[?6c"),
            (Some(b'>'), b'c') => self.reply(b"\x1b[>0;10;0c"),
            (None, b't') => self.window_op(params),
            (Some(b'?'), b'h') => self.private_modes(params, true),
            (Some(b'?'), b'l') => self.private_modes(params, false),
            (Some(b'?'), b's') => self.save_private_modes(params),
            (Some(b'?'), b'r') => self.restore_private_modes(params),
            _ => debug!(
                lead = %lead.map(|b| b as char).unwrap_or(' '),
                final_byte = %(final_byte as char),
                ?params,
                "unimplemented CSI sequence"
            ),
        }
    }

    // ---- SGR ------------------------------------------------------------

    fn sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.screen.reset_pen();
            return;
        }
        let (default_fg, default_bg) = self.screen.default_colors();
        let mut it = params.iter().copied().peekable();
        while let Some(code) = it.next() {
            match code {
                0 => {
                    self.screen.reset_pen();
                    if it.peek().is_some() {
                        debug!("SGR reset must stand alone; trailing codes dropped");
                    }
                    return;
                }
                1 => self.screen.pen.attrs |= AttrFlags::BOLD,
                2 => self.screen.pen.attrs |= AttrFlags::FAINT,
                3 => self.screen.pen.attrs |= AttrFlags::ITALIC,
                4 => self.screen.pen.attrs |= AttrFlags::UNDERLINE,
                5 => self.screen.pen.attrs |= AttrFlags::BLINK,
                7 => self.screen.pen.inverse = true,
                8 => self.screen.pen.conceal = true,
                9 => self.screen.pen.attrs |= AttrFlags::STRIKE,
                21 => self.screen.pen.attrs -= AttrFlags::BOLD,
                22 => self.screen.pen.attrs -= AttrFlags::BOLD | AttrFlags::FAINT,
                23 => self.screen.pen.attrs -= AttrFlags::ITALIC,
                24 => self.screen.pen.attrs -= AttrFlags::UNDERLINE,
                25 => self.screen.pen.attrs -= AttrFlags::BLINK,
                27 => self.screen.pen.inverse = false,
                28 => self.screen.pen.conceal = false,
                29 => self.screen.pen.attrs -= AttrFlags::STRIKE,
                30..=37 => self.screen.pen.fg = (code - 30) as u8,
                38 => self.extended_color(&mut it, true),
                39 => self.screen.pen.fg = default_fg,
                40..=47 => self.screen.pen.bg = (code - 40) as u8,
                48 => self.extended_color(&mut it, false),
                49 => self.screen.pen.bg = default_bg,
                90..=97 => self.screen.pen.fg = (code - 90 + 8) as u8,
                100..=107 => self.screen.pen.bg = (code - 100 + 8) as u8,
                _ => debug!(code, "unimplemented SGR code"),
            }
        }
    }

    /// SGR 38/48. Only `5;n` with a device-palette index lands; truecolor
    /// is recognized and dropped.
    fn extended_color(
        &mut self,
        it: &mut std::iter::Peekable<impl Iterator<Item = u16>>,
        foreground: bool,
    ) {
        match it.next() {
            Some(5) => match it.next() {
                Some(index) if index <= 15 => {
                    if foreground {
                        self.screen.pen.fg = index as u8;
                    } else {
                        self.screen.pen.bg = index as u8;
                    }
                }
                Some(index) => debug!(index, "palette index outside the device's 16 colors"),
                None => debug!("truncated extended-color sequence"),
            },
            Some(2) => {
                debug!("truecolor SGR unsupported on a 16-color device");
                while it.next().is_some() {}
            }
            other => debug!(?other, "malformed extended-color selector"),
        }
    }

    // ---- modes ----------------------------------------------------------

    fn ansi_modes(&mut self, params: &[u16], on: bool) {
        for &number in params {
            match number {
                4 => self.screen.modes.insert_mode = on,
                20 => self.screen.modes.newline_mode = on,
                _ => {
                    debug!(number, on, "unimplemented ANSI mode");
                    continue;
                }
            }
            self.screen.touch();
        }
    }

    fn private_modes(&mut self, params: &[u16], on: bool) {
        for &number in params {
            self.set_private_mode(number, on);
        }
    }

    /// Mode flips are content changes: the serializer header carries the
    /// option bits, so the remote renderer must hear about them.
    fn set_private_mode(&mut self, number: u16, on: bool) {
        match number {
            6 => {
                self.screen.modes.origin_mode = on;
                self.screen.goto(0, 0);
            }
            7 => self.screen.modes.auto_wrap = on,
            25 => self.screen.modes.cursor_visible = on,
            45 => self.screen.modes.reverse_wrap = on,
            47 => {
                if on {
                    self.screen.enter_alt(false);
                } else {
                    self.screen.leave_alt();
                }
            }
            1047 => {
                if on {
                    self.screen.enter_alt(true);
                } else {
                    self.screen.leave_alt();
                }
            }
            1048 => {
                if on {
                    self.screen.save_cursor();
                } else {
                    self.screen.restore_cursor();
                }
            }
            1049 => {
                if on {
                    self.screen.save_cursor();
                    self.screen.enter_alt(true);
                } else {
                    self.screen.leave_alt();
                    self.screen.restore_cursor();
                }
            }
            9 | 1000 | 1002 | 1003 => {
                self.screen.mouse.mode = if on {
                    MouseMode::from_dec_private(number).unwrap_or(MouseMode::Off)
                } else {
                    MouseMode::Off
                };
            }
            1005 => {
                debug!("UTF-8 mouse encoding not implemented");
                return;
            }
            1006 | 1015 => {
                self.screen.mouse.encoding = if on {
                    MouseEncoding::from_dec_private(number).unwrap_or(MouseEncoding::Classic)
                } else {
                    MouseEncoding::Classic
                };
            }
            1004 => self.screen.mouse.focus_tracking = on,
            2004 => self.screen.modes.bracketed_paste = on,
            _ => {
                debug!(number, on, "unimplemented DEC private mode");
                return;
            }
        }
        self.screen.touch();
    }

    fn private_mode_value(&self, number: u16) -> Option<bool> {
        let modes = &self.screen.modes;
        let value = match number {
            6 => modes.origin_mode,
            7 => modes.auto_wrap,
            25 => modes.cursor_visible,
            45 => modes.reverse_wrap,
            47 | 1047 | 1049 => modes.alt_active,
            9 | 1000 | 1002 | 1003 => self.screen.mouse.mode.as_dec_private() == Some(number),
            1006 | 1015 => self.screen.mouse.encoding.as_dec_private() == Some(number),
            1004 => self.screen.mouse.focus_tracking,
            2004 => modes.bracketed_paste,
            _ => return None,
        };
        Some(value)
    }

    fn save_private_modes(&mut self, params: &[u16]) {
        for &number in params {
            match self.private_mode_value(number) {
                Some(value) => self.screen.backup_mode(number, value),
                None => debug!(number, "mode not saveable"),
            }
        }
    }

    fn restore_private_modes(&mut self, params: &[u16]) {
        for &number in params {
            match self.screen.saved_mode(number) {
                Some(value) => self.set_private_mode(number, value),
                None => debug!(number, "no saved value for mode"),
            }
        }
    }

    // ---- queries --------------------------------------------------------

    fn device_status(&mut self, params: &[u16]) {
        match param(params, 0, 0) {
            5 => self.reply(b"\x1b[0n"),
            6 => {
                let cursor = self.screen.cursor();
                let row_base = if self.screen.modes.origin_mode {
                    self.screen.scroll_region().0
                } else {
                    0
                };
                let report = format!(
                    "\x1b[{};{}R",
                    cursor.y.saturating_sub(row_base) + 1,
                    cursor.x + 1
                );
                self.reply(report.as_bytes());
            }
            other => debug!(other, "unimplemented device status request"),
        }
    }

    fn window_op(&mut self, params: &[u16]) {
        match param(params, 0, 0) {
            8 => {
                let rows = param(params, 1, 0);
                let cols = param(params, 2, 0);
                if rows == 0 || cols == 0 {
                    debug!(rows, cols, "discarded resize request");
                    return;
                }
                // Budget violations are logged by the screen.
                let _ = self.screen.resize(cols, rows);
            }
            18 => {
                let (cols, rows) = self.screen.size();
                let report = format!("\x1b[8;{rows};{cols}t");
                self.reply(report.as_bytes());
            }
            other => debug!(other, "unimplemented window op"),
        }
    }

    fn set_cursor_style(&mut self, params: &[u16]) {
        let selector = param(params, 0, 0);
        match CursorStyle::from_decscusr(selector) {
            Some(style) => {
                self.screen.cursor_style = style;
                self.screen.touch();
            }
            None => debug!(selector, "discarded cursor-style selector"),
        }
    }

    // ---- string commands ------------------------------------------------

    fn osc(&mut self, body: &[u8]) {
        let text = String::from_utf8_lossy(body);
        let (code, arg) = match text.split_once(';') {
            Some((code, arg)) => (code, arg),
            None => (text.as_ref(), ""),
        };
        match code.parse::<u16>() {
            Ok(0) | Ok(2) => self.screen.set_title(arg),
            Ok(n @ 60..=67) => self.screen.set_button_label((n - 60) as usize, arg),
            Ok(n) => debug!(code = n, "unimplemented OSC command"),
            Err(_) => debug!("discarded OSC with a malformed code"),
        }
    }

    fn dcs(&mut self, body: &[u8]) {
        let Some(selector) = body.strip_prefix(b"$q") else {
            debug!(len = body.len(), "discarded DCS string");
            return;
        };
        match selector {
            b"m" => {
                let report = format!("\x1bP1$r{}m\x1b\\", self.sgr_state());
                self.reply(report.as_bytes());
            }
            b"r" => {
                let (top, bottom) = self.screen.scroll_region();
                let report = format!("\x1bP1$r{};{}r\x1b\\", top + 1, bottom + 1);
                self.reply(report.as_bytes());
            }
            b"s" => {
                let report = format!("\x1bP1$r1;{}s\x1b\\", self.screen.width());
                self.reply(report.as_bytes());
            }
            b" q" => {
                let report =
                    format!("\x1bP1$r{} q\x1b\\", self.screen.cursor_style.as_decscusr());
                self.reply(report.as_bytes());
            }
            _ => {
                debug!("unknown DECRQSS selector");
                self.reply(b"\x1bP0$r\x1b\\");
            }
        }
    }

    /// The pen as an SGR parameter string, for DECRQSS.
    fn sgr_state(&self) -> String {
        let pen = &self.screen.pen;
        let mut out = String::from("0");
        const BITS: [(AttrFlags, u16); 6] = [
            (AttrFlags::BOLD, 1),
            (AttrFlags::FAINT, 2),
            (AttrFlags::ITALIC, 3),
            (AttrFlags::UNDERLINE, 4),
            (AttrFlags::BLINK, 5),
            (AttrFlags::STRIKE, 9),
        ];
        for (flag, code) in BITS {
            if pen.attrs.contains(flag) {
                out.push_str(&format!(";{code}"));
            }
        }
        if pen.inverse {
            out.push_str(";7");
        }
        if pen.conceal {
            out.push_str(";8");
        }
        let (default_fg, default_bg) = self.screen.default_colors();
        if pen.fg != default_fg {
            let code = if pen.fg < 8 { 30 + pen.fg as u16 } else { 82 + pen.fg as u16 };
            out.push_str(&format!(";{code}"));
        }
        if pen.bg != default_bg {
            let code = if pen.bg < 8 { 40 + pen.bg as u16 } else { 92 + pen.bg as u16 };
            out.push_str(&format!(";{code}"));
        }
        out
    }
}

impl Actions for Interpreter<'_> {
    fn print_ascii(&mut self, byte: u8) {
        self.screen.put_byte(byte);
    }

    fn print_utf8(&mut self, bytes: &[u8]) {
        self.screen.put_symbol(bytes);
    }

    fn control(&mut self, byte: u8) {
        self.screen.put_byte(byte);
    }

    fn esc_dispatch(&mut self, intermediate: Option<u8>, final_byte: u8) {
        match (intermediate, final_byte) {
            (None, b'7') => self.screen.save_cursor(),
            (None, b'8') => self.screen.restore_cursor(),
            (None, b'D') => self.screen.line_feed(),
            (None, b'E') => {
                self.screen.line_feed();
                self.screen.carriage_return();
            }
            (None, b'M') => self.screen.reverse_index(),
            (None, b'6') => self.screen.back_index(),
            (None, b'H') => self.screen.set_tab_stop(),
            (None, b'c') => self.screen.reset(),
            (Some(b'('), final_byte) => {
                self.screen.g0 = designated_charset(final_byte);
            }
            (Some(b')'), final_byte) => {
                self.screen.g1 = designated_charset(final_byte);
            }
            (Some(b'#'), b'8') => self.screen.fill_alignment_pattern(),
            (None, b'=') | (None, b'>') => {
                debug!(final_byte = %(final_byte as char), "keypad mode ignored")
            }
            (None, b'\\') => debug!("stray string terminator"),
            _ => debug!(
                intermediate = %intermediate.map(|b| b as char).unwrap_or(' '),
                final_byte = %(final_byte as char),
                "unimplemented escape sequence"
            ),
        }
    }

    fn csi_dispatch(
        &mut self,
        lead: Option<u8>,
        params: &[u16],
        intermediate: Option<u8>,
        final_byte: u8,
    ) {
        match intermediate {
            None => self.csi(lead, params, final_byte),
            Some(b' ') if lead.is_none() && final_byte == b'q' => self.set_cursor_style(params),
            Some(i) => debug!(
                intermediate = %(i as char),
                final_byte = %(final_byte as char),
                "unimplemented CSI intermediate"
            ),
        }
    }

    fn string_dispatch(&mut self, kind: StringKind, body: &[u8]) {
        match kind {
            StringKind::Osc => self.osc(body),
            StringKind::Dcs => self.dcs(body),
            StringKind::Pm | StringKind::Apc | StringKind::Sos => {
                debug!(?kind, len = body.len(), "discarded string command")
            }
        }
    }
}

fn designated_charset(final_byte: u8) -> Charset {
    Charset::from_final(final_byte).unwrap_or_else(|| {
        debug!(
            final_byte = %(final_byte as char),
            "unimplemented charset designator, using ASCII"
        );
        Charset::Ascii
    })
}
