//! Per-channel scrollback buffer.
//!
//! A fixed ring of lines indexed by monotonically increasing `u32`
//! head/tail counters with power-of-two masking, so the in-range check
//! for an index is a wrapping subtraction rather than modular bookkeeping.
//! The scrollback position is an index, not a reference, and stays valid
//! as the producer advances.

use chrono::Utc;

use crate::util::{truncate_utf8_safe, word_wrap};

/// Ring capacity; must be a power of 2 for masking.
pub const BUFFER_LINES_MAX: u32 = 1 << 10;

/// Maximum stored length of a line's text; longer text is split into
/// continuation lines.
pub const TEXT_LENGTH_MAX: usize = 510;

/// Maximum stored length of a line's origin, including the prefix char.
pub const FROM_LENGTH_MAX: usize = 100;

const MASK: u32 = BUFFER_LINES_MAX - 1;

/// Buffer line types, in order of precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LineType {
    /// Default/all other lines.
    #[default]
    Other,
    /// Server info message.
    ServerInfo,
    /// Server error message.
    ServerError,
    /// Irc JOIN message.
    Join,
    /// Irc NICK message.
    Nick,
    /// Irc PART message.
    Part,
    /// Irc QUIT message.
    Quit,
    /// Line of text from another IRC user.
    Chat,
    /// Line of text from another IRC user containing the current nick.
    Pinged,
}

/// A single stored line with its cached wrap state.
#[derive(Debug, Clone, Default)]
pub struct BufferLine {
    pub line_type: LineType,
    pub from: String,
    pub text: String,
    /// UTC epoch seconds.
    pub time: i64,
    cached: Option<(u16, u16)>,
}

impl BufferLine {
    /// Number of terminal rows this line occupies when wrapped at `cols`,
    /// memoized against `cols`. Empty text occupies one row.
    ///
    /// # Panics
    ///
    /// Panics when `cols` is zero.
    pub fn rows(&mut self, cols: u16) -> u16 {
        assert!(cols > 0, "width is zero");

        if self.text.is_empty() {
            return 1;
        }

        if let Some((w, rows)) = self.cached {
            if w == cols {
                return rows;
            }
        }

        let rows = word_wrap(cols as usize, &self.text).count().max(1) as u16;
        self.cached = Some((cols, rows));

        rows
    }
}

/// Ring of buffer lines with an independent scrollback position.
#[derive(Debug)]
pub struct Buffer {
    head: u32,
    tail: u32,
    /// Index of the current scrollback line, in `[tail, head)`.
    scrollback: u32,
    /// Pad `from` when printing to be at least this wide.
    pad: usize,
    lines: Vec<BufferLine>,
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer {
            head: 0,
            tail: 0,
            scrollback: 0,
            pad: 0,
            lines: vec![BufferLine::default(); BUFFER_LINES_MAX as usize],
        }
    }
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer::default()
    }

    /// Number of retained lines.
    pub fn size(&self) -> u32 {
        self.head.wrapping_sub(self.tail)
    }

    fn full(&self) -> bool {
        self.size() == BUFFER_LINES_MAX
    }

    /// Wrap-aware check that `i` lies in `[tail, head)`.
    fn in_range(&self, i: u32) -> bool {
        i.wrapping_sub(self.tail) < self.size()
    }

    /// The newest retained line.
    pub fn head(&self) -> Option<&BufferLine> {
        if self.size() == 0 {
            return None;
        }
        Some(&self.lines[(self.head.wrapping_sub(1) & MASK) as usize])
    }

    /// The oldest retained line.
    pub fn tail(&self) -> Option<&BufferLine> {
        if self.size() == 0 {
            return None;
        }
        Some(&self.lines[(self.tail & MASK) as usize])
    }

    /// Index of the newest retained line.
    pub fn head_idx(&self) -> u32 {
        self.head.wrapping_sub(1)
    }

    /// Current scrollback index.
    pub fn scrollback(&self) -> u32 {
        self.scrollback
    }

    /// The line indexed by `i`.
    ///
    /// # Panics
    ///
    /// Panics when `i` is outside `[tail, head)`.
    pub fn line(&self, i: u32) -> &BufferLine {
        assert!(self.in_range(i), "invalid index");
        &self.lines[(i & MASK) as usize]
    }

    /// Mutable access for wrap-cache updates.
    pub fn line_mut(&mut self, i: u32) -> &mut BufferLine {
        assert!(self.in_range(i), "invalid index");
        &mut self.lines[(i & MASK) as usize]
    }

    /// Max `from` width seen, for header alignment.
    pub fn pad(&self) -> usize {
        self.pad
    }

    /// Append a line.
    ///
    /// Overlength text is split at exactly [`TEXT_LENGTH_MAX`] into
    /// continuation lines; overlength origins are truncated to
    /// [`FROM_LENGTH_MAX`].
    pub fn push(&mut self, line_type: LineType, from: &str, text: &str, prefix: Option<char>) {
        let mut from_field = String::with_capacity(from.len() + 1);
        if let Some(p) = prefix {
            from_field.push(p);
        }
        from_field.push_str(from);
        let from_field = truncate_utf8_safe(&from_field, FROM_LENGTH_MAX);

        if from_field.len() > self.pad {
            self.pad = from_field.len();
        }

        let time = Utc::now().timestamp();
        let mut rest = text;

        loop {
            let chunk = truncate_utf8_safe(rest, TEXT_LENGTH_MAX);

            *self.push_slot() = BufferLine {
                line_type,
                from: from_field.to_string(),
                text: chunk.to_string(),
                time,
                cached: None,
            };

            rest = &rest[chunk.len()..];

            if rest.is_empty() {
                break;
            }
        }
    }

    /// Advance the ring, maintaining the scrollback invariants:
    /// a reader at the head follows the head; a reader pinned at the
    /// tail sticks to the oldest retained line.
    fn push_slot(&mut self) -> &mut BufferLine {
        if self.size() == 0 || self.scrollback == self.head.wrapping_sub(1) {
            self.scrollback = self.head;
        }

        if self.full() {
            if self.scrollback == self.tail {
                self.scrollback = self.scrollback.wrapping_add(1);
            }
            self.tail = self.tail.wrapping_add(1);
        }

        let slot = (self.head & MASK) as usize;
        self.head = self.head.wrapping_add(1);

        &mut self.lines[slot]
    }

    /// Distance of the scrollback from the head, in `[0, 100]`.
    pub fn scrollback_status(&self) -> f32 {
        if self.size() == 0 || self.scrollback == self.head.wrapping_sub(1) {
            return 0.0;
        }

        (self.head.wrapping_sub(self.scrollback) as f32 / self.size() as f32) * 100.0
    }

    /// Scroll the view back approximately `rows` worth of wrapped lines.
    /// Returns whether the scrollback moved.
    pub fn page_back(&mut self, cols: u16, rows: u16) -> bool {
        if self.size() == 0 || self.scrollback == self.tail {
            return false;
        }

        let mut i = self.scrollback;
        let mut count = 0;

        loop {
            count += self.line_mut(i).rows(cols);

            if count >= rows {
                break;
            }

            if i == self.tail {
                return false;
            }

            i = i.wrapping_sub(1);
        }

        self.scrollback = i;

        /* Top line in view draws in full; scroll back one additional line */
        if count == rows && i != self.tail {
            self.scrollback = self.scrollback.wrapping_sub(1);
        }

        true
    }

    /// Scroll the view forward approximately `rows` worth of wrapped
    /// lines, stopping at the head. Returns whether the scrollback moved.
    pub fn page_forw(&mut self, cols: u16, rows: u16) -> bool {
        if self.size() == 0 || self.scrollback == self.head.wrapping_sub(1) {
            return false;
        }

        let head_idx = self.head.wrapping_sub(1);
        let mut count = 0;

        loop {
            count += self.line_mut(self.scrollback).rows(cols);

            if self.scrollback == head_idx {
                break;
            }

            if count >= rows {
                break;
            }

            self.scrollback = self.scrollback.wrapping_add(1);
        }

        /* Bottom line in view draws in full; scroll forward one additional line */
        if count == rows && self.scrollback != head_idx {
            self.scrollback = self.scrollback.wrapping_add(1);
        }

        true
    }

    /// Discard all retained lines.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.scrollback = 0;
        self.pad = 0;
        for line in &mut self.lines {
            *line = BufferLine::default();
        }
    }
}
