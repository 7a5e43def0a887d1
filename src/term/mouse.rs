//! Mouse and focus report encodings.
//!
//! The host delivers structured [`MouseEvent`]s; when the application has
//! switched on a tracking mode, each event is filtered by that mode and
//! encoded onto the echo channel in whichever wire format the application
//! selected (classic X10 offset bytes, SGR, or URXVT decimal).

use bitflags::bitflags;

/// Tracking modes (DECSET 9/1000/1002/1003). Each mode widens the set of
/// reported events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseMode {
    #[default]
    Off,
    /// Presses only (DECSET 9).
    X10,
    /// Presses and releases (DECSET 1000).
    Normal,
    /// Presses, releases and held-button motion (DECSET 1002).
    ButtonEvent,
    /// Everything, including bare motion (DECSET 1003).
    AnyEvent,
}

impl MouseMode {
    pub fn from_dec_private(number: u16) -> Option<Self> {
        match number {
            9 => Some(Self::X10),
            1000 => Some(Self::Normal),
            1002 => Some(Self::ButtonEvent),
            1003 => Some(Self::AnyEvent),
            _ => None,
        }
    }

    pub fn as_dec_private(self) -> Option<u16> {
        match self {
            Self::Off => None,
            Self::X10 => Some(9),
            Self::Normal => Some(1000),
            Self::ButtonEvent => Some(1002),
            Self::AnyEvent => Some(1003),
        }
    }
}

/// Report encodings (DECSET 1006/1015). `Classic` is the original
/// `ESC [ M` three-offset-byte format and the fallback when no extended
/// encoding is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseEncoding {
    #[default]
    Classic,
    /// `ESC [ < b ; x ; y M|m` (DECSET 1006).
    Sgr,
    /// `ESC [ b ; x ; y M` (DECSET 1015).
    Urxvt,
}

impl MouseEncoding {
    pub fn from_dec_private(number: u16) -> Option<Self> {
        match number {
            1006 => Some(Self::Sgr),
            1015 => Some(Self::Urxvt),
            _ => None,
        }
    }

    pub fn as_dec_private(self) -> Option<u16> {
        match self {
            Self::Classic => None,
            Self::Sgr => Some(1006),
            Self::Urxvt => Some(1015),
        }
    }
}

bitflags! {
    /// Modifier keys held during an event, stored at their wire bit
    /// positions so they or straight into the button code.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Modifiers: u16 {
        const SHIFT = 4;
        const ALT   = 8;
        const CTRL  = 16;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    fn code(self) -> u16 {
        match self {
            Self::Left => 0,
            Self::Middle => 1,
            Self::Right => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Press(MouseButton),
    Release(MouseButton),
    /// Motion while a button is held.
    Drag(MouseButton),
    /// Motion with no button held.
    Move,
    ScrollUp,
    ScrollDown,
}

/// One host-side mouse event, zero-indexed screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    /// Column, 0-indexed.
    pub x: u16,
    /// Row, 0-indexed.
    pub y: u16,
    pub modifiers: Modifiers,
}

/// The active tracking configuration, toggled by DEC private modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseTracking {
    pub mode: MouseMode,
    pub encoding: MouseEncoding,
    /// Focus in/out reports (DECSET 1004).
    pub focus_tracking: bool,
}

/// Classic-encoding coordinates clamp here so the offset byte stays within
/// one byte (33 + 222 = 255).
const CLASSIC_COORD_MAX: u16 = 222;

impl MouseTracking {
    /// Whether the active mode reports this event at all.
    pub fn reports(&self, event: &MouseEvent) -> bool {
        match self.mode {
            MouseMode::Off => false,
            MouseMode::X10 => matches!(
                event.kind,
                MouseEventKind::Press(_) | MouseEventKind::ScrollUp | MouseEventKind::ScrollDown
            ),
            MouseMode::Normal => !matches!(
                event.kind,
                MouseEventKind::Drag(_) | MouseEventKind::Move
            ),
            MouseMode::ButtonEvent => !matches!(event.kind, MouseEventKind::Move),
            MouseMode::AnyEvent => true,
        }
    }

    /// Encode one event for the echo channel, or `None` when the active
    /// mode filters it out.
    pub fn encode(&self, event: &MouseEvent) -> Option<Vec<u8>> {
        if !self.reports(event) {
            return None;
        }

        let base = match event.kind {
            MouseEventKind::Press(b) | MouseEventKind::Release(b) | MouseEventKind::Drag(b) => {
                b.code()
            }
            MouseEventKind::Move => 3,
            MouseEventKind::ScrollUp => 64,
            MouseEventKind::ScrollDown => 65,
        };
        let motion = matches!(
            event.kind,
            MouseEventKind::Drag(_) | MouseEventKind::Move
        );
        let mut code = base;
        if motion {
            code += 32;
        }
        // The X10 protocol predates modifier reporting.
        if self.mode != MouseMode::X10 {
            code |= event.modifiers.bits();
        }
        let release = matches!(event.kind, MouseEventKind::Release(_));

        let out = match self.encoding {
            MouseEncoding::Sgr => {
                let terminator = if release { 'm' } else { 'M' };
                format!(
                    "\x1b[<{};{};{}{}",
                    code,
                    event.x + 1,
                    event.y + 1,
                    terminator
                )
                .into_bytes()
            }
            MouseEncoding::Urxvt => {
                // Release loses button identity, as in the classic format.
                let code = if release { (code & !3) | 3 } else { code };
                format!("\x1b[{};{};{}M", code + 32, event.x + 1, event.y + 1).into_bytes()
            }
            MouseEncoding::Classic => {
                let code = if release { (code & !3) | 3 } else { code };
                let cb = (32 + code).min(255) as u8;
                let cx = (33 + event.x.min(CLASSIC_COORD_MAX)) as u8;
                let cy = (33 + event.y.min(CLASSIC_COORD_MAX)) as u8;
                vec![0x1B, b'[', b'M', cb, cx, cy]
            }
        };
        Some(out)
    }

    /// Focus report (DECSET 1004), or `None` when focus tracking is off.
    pub fn focus_report(&self, gained: bool) -> Option<&'static [u8]> {
        if !self.focus_tracking {
            return None;
        }
        Some(if gained { b"\x1b[I" } else { b"\x1b[O" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(x: u16, y: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Press(MouseButton::Left),
            x,
            y,
            modifiers: Modifiers::empty(),
        }
    }

    #[test]
    fn off_reports_nothing() {
        let tracking = MouseTracking::default();
        assert_eq!(tracking.encode(&press(0, 0)), None);
    }

    #[test]
    fn classic_press_at_origin() {
        let tracking = MouseTracking {
            mode: MouseMode::Normal,
            ..Default::default()
        };
        assert_eq!(
            tracking.encode(&press(0, 0)),
            Some(vec![0x1B, b'[', b'M', 32, 33, 33])
        );
    }

    #[test]
    fn classic_release_drops_button_identity() {
        let tracking = MouseTracking {
            mode: MouseMode::Normal,
            ..Default::default()
        };
        let event = MouseEvent {
            kind: MouseEventKind::Release(MouseButton::Right),
            x: 4,
            y: 2,
            modifiers: Modifiers::empty(),
        };
        assert_eq!(
            tracking.encode(&event),
            Some(vec![0x1B, b'[', b'M', 32 + 3, 33 + 4, 33 + 2])
        );
    }

    #[test]
    fn classic_coordinates_clamp() {
        let tracking = MouseTracking {
            mode: MouseMode::Normal,
            ..Default::default()
        };
        let bytes = tracking.encode(&press(500, 500)).unwrap();
        assert_eq!(&bytes[3..], &[32, 255, 255]);
    }

    #[test]
    fn sgr_press_and_release() {
        let tracking = MouseTracking {
            mode: MouseMode::Normal,
            encoding: MouseEncoding::Sgr,
            ..Default::default()
        };
        assert_eq!(tracking.encode(&press(0, 0)).unwrap(), b"\x1b[<0;1;1M");
        let release = MouseEvent {
            kind: MouseEventKind::Release(MouseButton::Left),
            x: 9,
            y: 4,
            modifiers: Modifiers::empty(),
        };
        assert_eq!(tracking.encode(&release).unwrap(), b"\x1b[<0;10;5m");
    }

    #[test]
    fn sgr_drag_carries_button_and_motion_bit() {
        let tracking = MouseTracking {
            mode: MouseMode::ButtonEvent,
            encoding: MouseEncoding::Sgr,
            ..Default::default()
        };
        let drag = MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Middle),
            x: 2,
            y: 3,
            modifiers: Modifiers::empty(),
        };
        assert_eq!(tracking.encode(&drag).unwrap(), b"\x1b[<33;3;4M");
    }

    #[test]
    fn urxvt_format() {
        let tracking = MouseTracking {
            mode: MouseMode::Normal,
            encoding: MouseEncoding::Urxvt,
            ..Default::default()
        };
        assert_eq!(tracking.encode(&press(0, 0)).unwrap(), b"\x1b[32;1;1M");
    }

    #[test]
    fn wheel_encodes_as_buttons_64_65() {
        let tracking = MouseTracking {
            mode: MouseMode::Normal,
            encoding: MouseEncoding::Sgr,
            ..Default::default()
        };
        let wheel = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            x: 0,
            y: 0,
            modifiers: Modifiers::empty(),
        };
        assert_eq!(tracking.encode(&wheel).unwrap(), b"\x1b[<64;1;1M");
    }

    #[test]
    fn modifiers_or_into_the_code_except_x10() {
        let mut tracking = MouseTracking {
            mode: MouseMode::Normal,
            encoding: MouseEncoding::Sgr,
            ..Default::default()
        };
        let event = MouseEvent {
            kind: MouseEventKind::Press(MouseButton::Left),
            x: 0,
            y: 0,
            modifiers: Modifiers::CTRL,
        };
        assert_eq!(tracking.encode(&event).unwrap(), b"\x1b[<16;1;1M");
        tracking.mode = MouseMode::X10;
        assert_eq!(tracking.encode(&event).unwrap(), b"\x1b[<0;1;1M");
    }

    #[test]
    fn mode_filtering() {
        let motion = MouseEvent {
            kind: MouseEventKind::Move,
            x: 0,
            y: 0,
            modifiers: Modifiers::empty(),
        };
        let drag = MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Left),
            x: 0,
            y: 0,
            modifiers: Modifiers::empty(),
        };
        let release = MouseEvent {
            kind: MouseEventKind::Release(MouseButton::Left),
            x: 0,
            y: 0,
            modifiers: Modifiers::empty(),
        };
        let x10 = MouseTracking {
            mode: MouseMode::X10,
            ..Default::default()
        };
        assert!(!x10.reports(&release));
        let normal = MouseTracking {
            mode: MouseMode::Normal,
            ..Default::default()
        };
        assert!(normal.reports(&release));
        assert!(!normal.reports(&drag));
        let button = MouseTracking {
            mode: MouseMode::ButtonEvent,
            ..Default::default()
        };
        assert!(button.reports(&drag));
        assert!(!button.reports(&motion));
        let any = MouseTracking {
            mode: MouseMode::AnyEvent,
            ..Default::default()
        };
        assert!(any.reports(&motion));
    }

    #[test]
    fn focus_reports_gated_by_tracking() {
        let mut tracking = MouseTracking::default();
        assert_eq!(tracking.focus_report(true), None);
        tracking.focus_tracking = true;
        assert_eq!(tracking.focus_report(true), Some(&b"\x1b[I"[..]));
        assert_eq!(tracking.focus_report(false), Some(&b"\x1b[O"[..]));
    }
}
