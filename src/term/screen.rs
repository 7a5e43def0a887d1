//! Screen model: the cell grid and cursor state machine.
//!
//! One physical grid serves both the primary and the alternate screen; the
//! alternate-buffer swap backs up metadata only (title, button labels, tab
//! stops, region, size), a documented memory limitation. Every mutation
//! keeps the glyph-cache refcounts balanced: overwriting, scrolling out or
//! erasing a cell releases its reference.

use std::ops::Range;

use thiserror::Error;
use tracing::{debug, warn};

use crate::term::cell::{AttrFlags, Cell, ColorPair, Pen};
use crate::term::charset::Charset;
use crate::term::glyphs::GlyphCache;
use crate::term::mouse::MouseTracking;

use bitflags::bitflags;

/// Cell budget: the grid allocation, and the ceiling any resize must stay
/// under.
pub const MAX_CELLS: usize = 3840;

/// Column ceiling, bounded by the tab-stop bitmap.
pub const MAX_COLS: u16 = 512;

/// Labeled soft-buttons on the device face.
pub const BUTTON_COUNT: usize = 8;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_FG: u8 = 7;
pub const DEFAULT_BG: u8 = 0;
pub const DEFAULT_TAB_INTERVAL: u16 = 8;

const TAB_WORDS: usize = MAX_COLS as usize / 32;
const MODE_BACKUP_SLOTS: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResizeError {
    #[error("zero dimension in {cols}x{rows}")]
    ZeroDimension { cols: u16, rows: u16 },
    #[error("width {cols} exceeds the {} column limit", MAX_COLS)]
    TooWide { cols: u16 },
    #[error("{cols}x{rows} exceeds the {} cell budget", MAX_CELLS)]
    BudgetExceeded { cols: u16, rows: u16 },
}

bitflags! {
    /// Pending change-notification topics, latched per notify batch.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ChangeSet: u8 {
        /// Grid content, cursor, or a presentation option changed.
        const CONTENT = 0b001;
        /// Title or a button label changed.
        const LABELS  = 0b010;
        /// BEL was received.
        const BELL    = 0b100;
    }
}

/// Cursor position plus the deferred-wrap flag. `hanging` is only ever set
/// while the cursor sits on the last column with auto-wrap enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub x: u16,
    pub y: u16,
    pub hanging: bool,
}

/// Option flags toggled by ANSI and DEC private modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes {
    pub cursor_visible: bool,
    pub auto_wrap: bool,
    pub origin_mode: bool,
    pub reverse_wrap: bool,
    pub insert_mode: bool,
    pub newline_mode: bool,
    pub bracketed_paste: bool,
    pub alt_active: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            cursor_visible: true,
            auto_wrap: true,
            origin_mode: false,
            reverse_wrap: false,
            insert_mode: false,
            newline_mode: false,
            bracketed_paste: false,
            alt_active: false,
        }
    }
}

/// Cursor style as selected by DECSCUSR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorStyle {
    #[default]
    BlinkingBlock,
    SteadyBlock,
    BlinkingUnderline,
    SteadyUnderline,
    BlinkingBar,
    SteadyBar,
}

impl CursorStyle {
    pub fn from_decscusr(param: u16) -> Option<Self> {
        match param {
            0 | 1 => Some(Self::BlinkingBlock),
            2 => Some(Self::SteadyBlock),
            3 => Some(Self::BlinkingUnderline),
            4 => Some(Self::SteadyUnderline),
            5 => Some(Self::BlinkingBar),
            6 => Some(Self::SteadyBar),
            _ => None,
        }
    }

    pub fn as_decscusr(self) -> u16 {
        match self {
            Self::BlinkingBlock => 1,
            Self::SteadyBlock => 2,
            Self::BlinkingUnderline => 3,
            Self::SteadyUnderline => 4,
            Self::BlinkingBar => 5,
            Self::SteadyBar => 6,
        }
    }
}

/// Packed tab-stop bitmap, one bit per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TabStops {
    bits: [u32; TAB_WORDS],
}

impl TabStops {
    fn new() -> Self {
        Self {
            bits: [0; TAB_WORDS],
        }
    }

    fn reset(&mut self, interval: u16) {
        self.bits = [0; TAB_WORDS];
        if interval == 0 {
            return;
        }
        let mut col = interval;
        while col < MAX_COLS {
            self.set(col);
            col += interval;
        }
    }

    fn set(&mut self, col: u16) {
        if col < MAX_COLS {
            self.bits[col as usize / 32] |= 1 << (col % 32);
        }
    }

    fn clear(&mut self, col: u16) {
        if col < MAX_COLS {
            self.bits[col as usize / 32] &= !(1 << (col % 32));
        }
    }

    fn clear_all(&mut self) {
        self.bits = [0; TAB_WORDS];
    }

    fn is_set(&self, col: u16) -> bool {
        col < MAX_COLS && self.bits[col as usize / 32] & (1 << (col % 32)) != 0
    }

    fn next_after(&self, col: u16, limit: u16) -> Option<u16> {
        (col.saturating_add(1)..limit).find(|&c| self.is_set(c))
    }

    fn prev_before(&self, col: u16) -> Option<u16> {
        (0..col).rev().find(|&c| self.is_set(c))
    }
}

/// Full cursor snapshot for save/restore.
#[derive(Clone, Copy)]
struct SavedCursor {
    cursor: Cursor,
    pen: Pen,
    g0: Charset,
    g1: Charset,
    use_g1: bool,
    origin_mode: bool,
    auto_wrap: bool,
    reverse_wrap: bool,
}

/// Metadata preserved across the alternate-buffer swap.
struct AltBackup {
    title: String,
    buttons: [String; BUTTON_COUNT],
    tabs: TabStops,
    scroll_top: u16,
    scroll_bottom: u16,
    width: u16,
    height: u16,
}

/// The screen: grid, cursor, region, tabs, labels, glyph cache. Owned by
/// one terminal instance; all access is single-caller.
pub struct Screen {
    cells: Box<[Cell]>,
    width: u16,
    height: u16,
    cursor: Cursor,
    pub pen: Pen,
    pub g0: Charset,
    pub g1: Charset,
    pub use_g1: bool,
    pub modes: Modes,
    pub mouse: MouseTracking,
    pub cursor_style: CursorStyle,
    scroll_top: u16,
    scroll_bottom: u16,
    tabs: TabStops,
    tab_interval: u16,
    title: String,
    buttons: [String; BUTTON_COUNT],
    saved: Option<SavedCursor>,
    alt_backup: Option<AltBackup>,
    mode_backup: [Option<(u16, bool)>; MODE_BACKUP_SLOTS],
    cache: GlyphCache,
    default_fg: u8,
    default_bg: u8,
    batch_depth: u16,
    pending: ChangeSet,
}

impl Screen {
    /// A screen of the given size with power-on defaults. An invalid size
    /// falls back to 80x24 with a warning.
    pub fn new(cols: u16, rows: u16) -> Self {
        let (cols, rows) = match validate_size(cols, rows) {
            Ok(()) => (cols, rows),
            Err(err) => {
                warn!(%err, "invalid initial size, using {DEFAULT_COLS}x{DEFAULT_ROWS}");
                (DEFAULT_COLS, DEFAULT_ROWS)
            }
        };
        let blank = Cell::blank(ColorPair::new(DEFAULT_FG, DEFAULT_BG));
        let mut tabs = TabStops::new();
        tabs.reset(DEFAULT_TAB_INTERVAL);
        Self {
            cells: vec![blank; MAX_CELLS].into_boxed_slice(),
            width: cols,
            height: rows,
            cursor: Cursor::default(),
            pen: Pen::new(DEFAULT_FG, DEFAULT_BG),
            g0: Charset::Ascii,
            g1: Charset::Ascii,
            use_g1: false,
            modes: Modes::default(),
            mouse: MouseTracking::default(),
            cursor_style: CursorStyle::default(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tabs,
            tab_interval: DEFAULT_TAB_INTERVAL,
            title: String::new(),
            buttons: std::array::from_fn(|_| String::new()),
            saved: None,
            alt_backup: None,
            mode_backup: [None; MODE_BACKUP_SLOTS],
            cache: GlyphCache::new(),
            default_fg: DEFAULT_FG,
            default_bg: DEFAULT_BG,
            batch_depth: 0,
            pending: ChangeSet::empty(),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn scroll_region(&self) -> (u16, u16) {
        (self.scroll_top, self.scroll_bottom)
    }

    pub fn cell(&self, x: u16, y: u16) -> Cell {
        self.cells[self.index(x.min(self.width - 1), y.min(self.height - 1))]
    }

    /// The live grid in row-major order, for the serializer.
    pub fn cells(&self) -> &[Cell] {
        &self.cells[..self.total_cells()]
    }

    pub fn glyphs(&self) -> &GlyphCache {
        &self.cache
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn button_label(&self, index: usize) -> &str {
        self.buttons.get(index).map(String::as_str).unwrap_or("")
    }

    /// Configure default colors; resets the pen and repaints the (fresh)
    /// grid. Intended for construction time, before any input.
    pub fn set_default_colors(&mut self, fg: u8, bg: u8) {
        self.default_fg = fg & 0x0F;
        self.default_bg = bg & 0x0F;
        self.reset_pen();
        let total = self.total_cells();
        self.clear_cells(0..total);
    }

    pub fn set_tab_interval(&mut self, interval: u16) {
        self.tab_interval = interval;
        self.tabs.reset(interval);
    }

    /// Reset the pen to the configured defaults (SGR 0).
    pub fn reset_pen(&mut self) {
        self.pen = Pen::new(self.default_fg, self.default_bg);
    }

    pub fn default_colors(&self) -> (u8, u8) {
        (self.default_fg, self.default_bg)
    }

    // ---- notify batching ------------------------------------------------

    /// Enter a notify batch. Batches nest; only the outermost exit yields
    /// the latched change set. A reentrancy count, not a lock.
    pub fn begin_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_add(1);
    }

    /// Leave a notify batch, returning the latched changes at the
    /// outermost exit and an empty set otherwise.
    pub fn end_batch(&mut self) -> ChangeSet {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.take_changes()
        } else {
            ChangeSet::empty()
        }
    }

    /// Drain pending changes outside any batch; empty while one is open.
    pub fn take_changes(&mut self) -> ChangeSet {
        if self.batch_depth > 0 {
            return ChangeSet::empty();
        }
        let pending = self.pending;
        self.pending = ChangeSet::empty();
        pending
    }

    fn mark(&mut self, change: ChangeSet) {
        self.pending |= change;
    }

    /// Latch a content notification for a state change made through the
    /// public fields (mode toggles and the like).
    pub fn touch(&mut self) {
        self.mark(ChangeSet::CONTENT);
    }

    // ---- writing --------------------------------------------------------

    /// Execute one control or graphic ASCII byte.
    pub fn put_byte(&mut self, byte: u8) {
        match byte {
            0x07 => self.mark(ChangeSet::BELL),
            0x08 => self.backspace(),
            0x09 => self.tab_forward(1),
            0x0A | 0x0B | 0x0C => {
                self.line_feed();
                if self.modes.newline_mode {
                    self.carriage_return();
                }
            }
            0x0D => self.carriage_return(),
            0x0E => self.use_g1 = true,
            0x0F => self.use_g1 = false,
            0x20..=0x7E => match self.active_charset().map(byte) {
                Some(glyph) => self.put_symbol(glyph.as_bytes()),
                None => self.write_cell(byte),
            },
            _ => debug!(byte, "discarded unhandled control byte"),
        }
    }

    /// Write one validated UTF-8 code point (1-4 bytes) at the cursor.
    pub fn put_symbol(&mut self, bytes: &[u8]) {
        let reference = self.cache.add(bytes);
        self.write_cell(reference);
    }

    fn write_cell(&mut self, sym: u8) {
        if self.cursor.hanging {
            if self.modes.auto_wrap {
                // Deferred wrap: CR + LF (with region scroll) first.
                self.carriage_return();
                self.line_feed();
            } else {
                // Auto-wrap was switched off while hanging.
                self.cursor.hanging = false;
            }
        }
        let x = self.cursor.x;
        let y = self.cursor.y;
        if self.modes.insert_mode {
            self.shift_row_right(y, x);
        }
        let cell = self.pen.cell(sym);
        if cell.sym != sym {
            // Conceal replaced the symbol; drop the reference it held.
            self.cache.remove(sym);
        }
        let i = self.index(x, y);
        self.cache.remove(self.cells[i].sym);
        self.cells[i] = cell;
        if x + 1 < self.width {
            self.cursor.x = x + 1;
        } else if self.modes.auto_wrap {
            self.cursor.hanging = true;
        }
        self.mark(ChangeSet::CONTENT);
    }

    fn shift_row_right(&mut self, y: u16, from: u16) {
        let row = self.index(0, y);
        let start = row + from as usize;
        let end = row + self.width as usize;
        if start + 1 >= end {
            return;
        }
        self.cache.remove(self.cells[end - 1].sym);
        self.cells.copy_within(start..end - 1, start + 1);
        // The moved cells keep their glyph references; the vacated copy
        // must not release one when it is overwritten next.
        self.cells[start] = self.pen.blank_cell();
    }

    fn active_charset(&self) -> Charset {
        if self.use_g1 {
            self.g1
        } else {
            self.g0
        }
    }

    // ---- cursor motion --------------------------------------------------

    pub fn carriage_return(&mut self) {
        self.cursor.x = 0;
        self.cursor.hanging = false;
        self.mark(ChangeSet::CONTENT);
    }

    pub fn line_feed(&mut self) {
        self.move_rows(1);
    }

    pub fn reverse_index(&mut self) {
        self.move_rows(-1);
    }

    pub fn move_up(&mut self, n: u16) {
        self.move_rows(-i32::from(n));
    }

    pub fn move_down(&mut self, n: u16) {
        self.move_rows(i32::from(n));
    }

    /// Vertical motion with the shared scroll policy: a cursor that starts
    /// inside the scrolling region scrolls it by the overflow and clamps
    /// to the region edge; one that starts outside clamps to the screen.
    fn move_rows(&mut self, dy: i32) {
        self.cursor.hanging = false;
        if dy == 0 {
            return;
        }
        let y = i32::from(self.cursor.y);
        let top = i32::from(self.scroll_top);
        let bottom = i32::from(self.scroll_bottom);
        let inside = y >= top && y <= bottom;
        let target = y + dy;
        if inside && target > bottom {
            let overflow = (target - bottom).min(i32::from(u16::MAX)) as u16;
            self.scroll_range_up(self.scroll_top, self.scroll_bottom, overflow);
            self.cursor.y = self.scroll_bottom;
        } else if inside && target < top {
            let overflow = (top - target).min(i32::from(u16::MAX)) as u16;
            self.scroll_range_down(self.scroll_top, self.scroll_bottom, overflow);
            self.cursor.y = self.scroll_top;
        } else {
            self.cursor.y = target.clamp(0, i32::from(self.height) - 1) as u16;
        }
        self.mark(ChangeSet::CONTENT);
    }

    pub fn move_forward(&mut self, n: u16) {
        self.cursor.hanging = false;
        self.cursor.x = self.cursor.x.saturating_add(n).min(self.width - 1);
        self.mark(ChangeSet::CONTENT);
    }

    /// Backward motion. With reverse-wrap enabled it walks across rows,
    /// wrapping from the region top to the region bottom, bounded by one
    /// full screen of steps.
    pub fn move_back(&mut self, n: u16) {
        self.cursor.hanging = false;
        if !self.modes.reverse_wrap {
            self.cursor.x = self.cursor.x.saturating_sub(n);
            self.mark(ChangeSet::CONTENT);
            return;
        }
        let budget = u32::from(self.width) * u32::from(self.height);
        let steps = u32::from(n).min(budget);
        for _ in 0..steps {
            if self.cursor.x > 0 {
                self.cursor.x -= 1;
            } else if self.cursor.y == self.scroll_top {
                self.cursor.x = self.width - 1;
                self.cursor.y = self.scroll_bottom;
            } else if self.cursor.y == 0 {
                break;
            } else {
                self.cursor.x = self.width - 1;
                self.cursor.y -= 1;
            }
        }
        self.mark(ChangeSet::CONTENT);
    }

    /// DECBI: move one column left; at the left margin, the scrolling
    /// region's rows shift right one column instead.
    pub fn back_index(&mut self) {
        self.cursor.hanging = false;
        if self.cursor.x > 0 {
            self.cursor.x -= 1;
            self.mark(ChangeSet::CONTENT);
            return;
        }
        let blank = self.pen.blank_cell();
        for y in self.scroll_top..=self.scroll_bottom {
            let row = self.index(0, y);
            let end = row + self.width as usize;
            self.cache.remove(self.cells[end - 1].sym);
            self.cells.copy_within(row..end - 1, row + 1);
            self.cells[row] = blank;
        }
        self.mark(ChangeSet::CONTENT);
    }

    /// BS: while hanging, cancel the deferred wrap and stay put; otherwise
    /// move back one column.
    pub fn backspace(&mut self) {
        if self.cursor.hanging {
            self.cursor.hanging = false;
        } else {
            self.move_back(1);
        }
    }

    /// Absolute positioning, zero-based. Under origin mode the row is
    /// region-relative and clamped inside it.
    pub fn goto(&mut self, x: u16, y: u16) {
        self.cursor.hanging = false;
        self.cursor.x = x.min(self.width - 1);
        self.cursor.y = if self.modes.origin_mode {
            self.scroll_top.saturating_add(y).min(self.scroll_bottom)
        } else {
            y.min(self.height - 1)
        };
        self.mark(ChangeSet::CONTENT);
    }

    pub fn goto_col(&mut self, x: u16) {
        self.cursor.hanging = false;
        self.cursor.x = x.min(self.width - 1);
        self.mark(ChangeSet::CONTENT);
    }

    pub fn goto_row(&mut self, y: u16) {
        let x = self.cursor.x;
        self.goto(x, y);
    }

    // ---- tab stops ------------------------------------------------------

    pub fn tab_forward(&mut self, n: u16) {
        self.cursor.hanging = false;
        for _ in 0..n {
            self.cursor.x = self
                .tabs
                .next_after(self.cursor.x, self.width)
                .unwrap_or(self.width - 1);
        }
        self.mark(ChangeSet::CONTENT);
    }

    pub fn tab_back(&mut self, n: u16) {
        self.cursor.hanging = false;
        for _ in 0..n {
            self.cursor.x = self.tabs.prev_before(self.cursor.x).unwrap_or(0);
        }
        self.mark(ChangeSet::CONTENT);
    }

    pub fn set_tab_stop(&mut self) {
        self.tabs.set(self.cursor.x);
    }

    pub fn clear_tab_stop(&mut self) {
        self.tabs.clear(self.cursor.x);
    }

    pub fn clear_all_tab_stops(&mut self) {
        self.tabs.clear_all();
    }

    // ---- erase ----------------------------------------------------------

    /// ED: 0 cursor-to-end, 1 start-to-cursor, 2 all.
    pub fn erase_display(&mut self, mode: u16) {
        let at = self.index(self.cursor.x, self.cursor.y);
        let total = self.total_cells();
        match mode {
            0 => self.clear_cells(at..total),
            1 => self.clear_cells(0..at + 1),
            2 => self.clear_cells(0..total),
            _ => debug!(mode, "discarded erase-display submode"),
        }
    }

    /// EL: 0 cursor-to-end, 1 start-to-cursor, 2 whole line.
    pub fn erase_line(&mut self, mode: u16) {
        let row = self.index(0, self.cursor.y);
        let at = row + self.cursor.x as usize;
        let end = row + self.width as usize;
        match mode {
            0 => self.clear_cells(at..end),
            1 => self.clear_cells(row..at + 1),
            2 => self.clear_cells(row..end),
            _ => debug!(mode, "discarded erase-line submode"),
        }
    }

    /// ECH: blank `n` cells from the cursor, no shifting.
    pub fn erase_chars(&mut self, n: u16) {
        let row = self.index(0, self.cursor.y);
        let at = row + self.cursor.x as usize;
        let end = row + (self.cursor.x.saturating_add(n).min(self.width)) as usize;
        self.clear_cells(at..end);
    }

    fn clear_cells(&mut self, range: Range<usize>) {
        let blank = self.pen.blank_cell();
        for i in range {
            self.cache.remove(self.cells[i].sym);
            self.cells[i] = blank;
        }
        self.mark(ChangeSet::CONTENT);
    }

    // ---- scrolling and line/char shifts ---------------------------------

    pub fn scroll_up(&mut self, n: u16) {
        self.scroll_range_up(self.scroll_top, self.scroll_bottom, n);
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.scroll_range_down(self.scroll_top, self.scroll_bottom, n);
    }

    fn scroll_range_up(&mut self, top: u16, bottom: u16, n: u16) {
        if bottom < top || bottom >= self.height {
            return;
        }
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }
        let w = self.width as usize;
        let start = top as usize * w;
        let end = (bottom as usize + 1) * w;
        let cut = start + n as usize * w;
        // Rows scrolled out lose their glyph references; rows moved keep
        // theirs, so the vacated copies are blanked without releasing.
        for i in start..cut {
            self.cache.remove(self.cells[i].sym);
        }
        self.cells.copy_within(cut..end, start);
        let blank = self.pen.blank_cell();
        for cell in &mut self.cells[end - n as usize * w..end] {
            *cell = blank;
        }
        self.mark(ChangeSet::CONTENT);
    }

    fn scroll_range_down(&mut self, top: u16, bottom: u16, n: u16) {
        if bottom < top || bottom >= self.height {
            return;
        }
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }
        let w = self.width as usize;
        let start = top as usize * w;
        let end = (bottom as usize + 1) * w;
        let shift = n as usize * w;
        for i in end - shift..end {
            self.cache.remove(self.cells[i].sym);
        }
        self.cells.copy_within(start..end - shift, start + shift);
        let blank = self.pen.blank_cell();
        for cell in &mut self.cells[start..start + shift] {
            *cell = blank;
        }
        self.mark(ChangeSet::CONTENT);
    }

    /// IL: a no-op when the cursor is outside the scrolling region.
    pub fn insert_lines(&mut self, n: u16) {
        let y = self.cursor.y;
        if y < self.scroll_top || y > self.scroll_bottom {
            return;
        }
        self.scroll_range_down(y, self.scroll_bottom, n);
    }

    /// DL: a no-op when the cursor is outside the scrolling region.
    pub fn delete_lines(&mut self, n: u16) {
        let y = self.cursor.y;
        if y < self.scroll_top || y > self.scroll_bottom {
            return;
        }
        self.scroll_range_up(y, self.scroll_bottom, n);
    }

    /// ICH: shift the row tail right, blanking the opened gap.
    pub fn insert_chars(&mut self, n: u16) {
        let x = self.cursor.x;
        let n = n.min(self.width - x);
        if n == 0 {
            return;
        }
        let row = self.index(0, self.cursor.y);
        let at = row + x as usize;
        let end = row + self.width as usize;
        let shift = n as usize;
        for i in end - shift..end {
            self.cache.remove(self.cells[i].sym);
        }
        self.cells.copy_within(at..end - shift, at + shift);
        let blank = self.pen.blank_cell();
        for cell in &mut self.cells[at..at + shift] {
            *cell = blank;
        }
        self.mark(ChangeSet::CONTENT);
    }

    /// DCH: delete at the cursor, pulling the tail left.
    pub fn delete_chars(&mut self, n: u16) {
        let x = self.cursor.x;
        let n = n.min(self.width - x);
        if n == 0 {
            return;
        }
        let row = self.index(0, self.cursor.y);
        let at = row + x as usize;
        let end = row + self.width as usize;
        let shift = n as usize;
        for i in at..at + shift {
            self.cache.remove(self.cells[i].sym);
        }
        self.cells.copy_within(at + shift..end, at);
        let blank = self.pen.blank_cell();
        for cell in &mut self.cells[end - shift..end] {
            *cell = blank;
        }
        self.mark(ChangeSet::CONTENT);
    }

    // ---- scrolling region -----------------------------------------------

    /// DECSTBM with 1-based parameters; 0 selects the default bound. An
    /// empty or inverted region is rejected. Homes the cursor.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top0 = top.max(1) - 1;
        let bottom0 = if bottom == 0 {
            self.height - 1
        } else {
            (bottom - 1).min(self.height - 1)
        };
        if top0 >= bottom0 {
            debug!(top, bottom, "rejected scroll region");
            return;
        }
        self.scroll_top = top0;
        self.scroll_bottom = bottom0;
        self.goto(0, 0);
    }

    // ---- save/restore ---------------------------------------------------

    /// DECSC: full snapshot of cursor, pen, charsets, and wrap/origin
    /// flags.
    pub fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor {
            cursor: self.cursor,
            pen: self.pen,
            g0: self.g0,
            g1: self.g1,
            use_g1: self.use_g1,
            origin_mode: self.modes.origin_mode,
            auto_wrap: self.modes.auto_wrap,
            reverse_wrap: self.modes.reverse_wrap,
        });
    }

    /// DECRC: restore the snapshot; with none saved, restore power-on
    /// defaults.
    pub fn restore_cursor(&mut self) {
        match self.saved {
            Some(saved) => {
                self.cursor.x = saved.cursor.x.min(self.width - 1);
                self.cursor.y = saved.cursor.y.min(self.height - 1);
                self.cursor.hanging = saved.cursor.hanging && self.cursor.x == self.width - 1;
                self.pen = saved.pen;
                self.g0 = saved.g0;
                self.g1 = saved.g1;
                self.use_g1 = saved.use_g1;
                self.modes.origin_mode = saved.origin_mode;
                self.modes.auto_wrap = saved.auto_wrap;
                self.modes.reverse_wrap = saved.reverse_wrap;
            }
            None => {
                self.cursor = Cursor::default();
                self.reset_pen();
                self.g0 = Charset::Ascii;
                self.g1 = Charset::Ascii;
                self.use_g1 = false;
                self.modes.origin_mode = false;
            }
        }
        self.mark(ChangeSet::CONTENT);
    }

    /// ANSI-style save (CSI s): shares the snapshot slot but restores
    /// position only.
    pub fn save_cursor_position(&mut self) {
        self.save_cursor();
    }

    pub fn restore_cursor_position(&mut self) {
        if let Some(saved) = self.saved {
            self.cursor = Cursor {
                x: saved.cursor.x.min(self.width - 1),
                y: saved.cursor.y.min(self.height - 1),
                hanging: false,
            };
        } else {
            self.cursor = Cursor::default();
        }
        self.mark(ChangeSet::CONTENT);
    }

    // ---- private-mode backup table --------------------------------------

    pub fn backup_mode(&mut self, number: u16, value: bool) {
        for slot in self.mode_backup.iter_mut() {
            if let Some((n, v)) = slot {
                if *n == number {
                    *v = value;
                    return;
                }
            }
        }
        for slot in self.mode_backup.iter_mut() {
            if slot.is_none() {
                *slot = Some((number, value));
                return;
            }
        }
        warn!(number, "private-mode backup table full, save dropped");
    }

    pub fn saved_mode(&self, number: u16) -> Option<bool> {
        self.mode_backup
            .iter()
            .flatten()
            .find(|(n, _)| *n == number)
            .map(|(_, v)| *v)
    }

    // ---- alternate buffer -----------------------------------------------

    /// Swap to the alternate screen. Only metadata is preserved across the
    /// swap; cell content stays in the one physical grid (and is cleared
    /// here when `clear` is set).
    pub fn enter_alt(&mut self, clear: bool) {
        if self.modes.alt_active {
            debug!("already on the alternate screen");
            return;
        }
        self.alt_backup = Some(AltBackup {
            title: self.title.clone(),
            buttons: self.buttons.clone(),
            tabs: self.tabs,
            scroll_top: self.scroll_top,
            scroll_bottom: self.scroll_bottom,
            width: self.width,
            height: self.height,
        });
        self.modes.alt_active = true;
        if clear {
            let total = self.total_cells();
            self.clear_cells(0..total);
        }
        self.mark(ChangeSet::CONTENT);
    }

    /// Swap back, restoring the backed-up metadata. A size restore goes
    /// through `resize`, which clears the grid as a side effect.
    pub fn leave_alt(&mut self) {
        if !self.modes.alt_active {
            debug!("not on the alternate screen");
            return;
        }
        self.modes.alt_active = false;
        if let Some(backup) = self.alt_backup.take() {
            if (backup.width, backup.height) != (self.width, self.height) {
                if let Err(err) = self.resize(backup.width, backup.height) {
                    warn!(%err, "could not restore the pre-swap size");
                }
            }
            self.title = backup.title;
            self.buttons = backup.buttons;
            self.tabs = backup.tabs;
            self.scroll_top = backup.scroll_top.min(self.height - 1);
            self.scroll_bottom = backup.scroll_bottom.min(self.height - 1);
            self.mark(ChangeSet::LABELS);
        }
        self.mark(ChangeSet::CONTENT);
    }

    // ---- labels ---------------------------------------------------------

    pub fn set_title(&mut self, title: &str) {
        self.title.clear();
        self.title.push_str(title);
        self.mark(ChangeSet::LABELS);
    }

    pub fn set_button_label(&mut self, index: usize, label: &str) {
        if index >= BUTTON_COUNT {
            debug!(index, "button label index out of range");
            return;
        }
        self.buttons[index].clear();
        self.buttons[index].push_str(label);
        self.mark(ChangeSet::LABELS);
    }

    // ---- whole-screen operations ----------------------------------------

    /// Change the grid size. Violating the budget leaves the screen
    /// untouched; success clears everything and homes the cursor.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), ResizeError> {
        if (cols, rows) == (self.width, self.height) {
            return Ok(());
        }
        if let Err(err) = validate_size(cols, rows) {
            warn!(%err, "resize rejected");
            return Err(err);
        }
        self.cache.clear();
        let blank = self.pen.blank_cell();
        for cell in self.cells.iter_mut() {
            *cell = blank;
        }
        self.width = cols;
        self.height = rows;
        self.cursor = Cursor::default();
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.tabs.reset(self.tab_interval);
        self.mark(ChangeSet::CONTENT);
        Ok(())
    }

    /// RIS: back to power-on state. Labels survive; everything else
    /// resets.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.reset_pen();
        let blank = self.pen.blank_cell();
        for cell in self.cells.iter_mut() {
            *cell = blank;
        }
        self.cursor = Cursor::default();
        self.g0 = Charset::Ascii;
        self.g1 = Charset::Ascii;
        self.use_g1 = false;
        self.modes = Modes::default();
        self.mouse = MouseTracking::default();
        self.cursor_style = CursorStyle::default();
        self.scroll_top = 0;
        self.scroll_bottom = self.height - 1;
        self.tabs.reset(self.tab_interval);
        self.saved = None;
        self.alt_backup = None;
        self.mode_backup = [None; MODE_BACKUP_SLOTS];
        self.mark(ChangeSet::CONTENT);
    }

    /// DECALN: fill with 'E', home the cursor, reset the region.
    pub fn fill_alignment_pattern(&mut self) {
        self.scroll_top = 0;
        self.scroll_bottom = self.height - 1;
        let colors = ColorPair::new(self.default_fg, self.default_bg);
        let total = self.total_cells();
        for i in 0..total {
            self.cache.remove(self.cells[i].sym);
            self.cells[i] = Cell {
                sym: b'E',
                colors,
                attrs: AttrFlags::empty(),
            };
        }
        self.cursor = Cursor::default();
        self.mark(ChangeSet::CONTENT);
    }

    // ---- helpers --------------------------------------------------------

    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn total_cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// One row resolved to text, for diagnostics and tests.
    pub fn row_text(&self, y: u16) -> String {
        let mut out = String::new();
        for x in 0..self.width {
            let cell = self.cells[self.index(x, y.min(self.height - 1))];
            let glyph = self.cache.bytes_or_replacement(cell.sym);
            out.push_str(std::str::from_utf8(glyph.as_slice()).unwrap_or("\u{FFFD}"));
        }
        out
    }
}

fn validate_size(cols: u16, rows: u16) -> Result<(), ResizeError> {
    if cols == 0 || rows == 0 {
        return Err(ResizeError::ZeroDimension { cols, rows });
    }
    if cols > MAX_COLS {
        return Err(ResizeError::TooWide { cols });
    }
    if cols as usize * rows as usize > MAX_CELLS {
        return Err(ResizeError::BudgetExceeded { cols, rows });
    }
    Ok(())
}
