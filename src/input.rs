//! Buffer input.
//!
//! Supports line editing, input history, word completion.
//!
//! The working edit area is implemented as a fixed width gap buffer for
//! O(1) insertions and deletions, with the gap occupying `[head, tail)`.
//! Input history is kept as a ring buffer of strings, copied into the
//! working area when scrolling.

/// Max input length; sufficient given the RFC 2812 maximum of 50
/// characters for channel names plus additional message formatting.
pub const INPUT_LEN_MAX: usize = 410;

/// Number of history lines to keep. For proper ring buffer masking this
/// must be a power of 2.
pub const INPUT_HIST_MAX: usize = 16;

const CAP: u16 = INPUT_LEN_MAX as u16;
const HIST_MASK: u16 = (INPUT_HIST_MAX as u16) - 1;

/// Completion callback: receives the word and its growth room, the
/// current word length, and whether the word starts the input; writes
/// the replacement in place and returns its length, or 0 for no match.
pub type CompletionFn<'a> = &'a mut dyn FnMut(&mut [u8], usize, bool) -> usize;

struct Hist {
    entries: [Option<String>; INPUT_HIST_MAX],
    /// In-progress line, saved when scrolling into history.
    save: Option<String>,
    current: u16,
    head: u16,
    tail: u16,
}

/// Line editor with history and completion.
pub struct Input {
    text: [u8; INPUT_LEN_MAX],
    head: u16,
    tail: u16,
    hist: Hist,
}

impl Default for Input {
    fn default() -> Self {
        Input {
            text: [0; INPUT_LEN_MAX],
            head: 0,
            tail: CAP,
            hist: Hist {
                entries: Default::default(),
                save: None,
                current: 0,
                head: 0,
                tail: 0,
            },
        }
    }
}

impl Input {
    pub fn new() -> Input {
        Input::default()
    }

    /// Content size: `head + (CAP - tail)`.
    pub fn size(&self) -> usize {
        (self.head + (CAP - self.tail)) as usize
    }

    /// Cursor position within the content.
    pub fn cursor(&self) -> usize {
        self.head as usize
    }

    fn is_full(&self) -> bool {
        self.head == self.tail
    }

    /// Move the cursor left.
    pub fn cursor_back(&mut self) -> bool {
        if self.head == 0 {
            return false;
        }

        self.tail -= 1;
        self.head -= 1;
        self.text[self.tail as usize] = self.text[self.head as usize];

        true
    }

    /// Move the cursor right.
    pub fn cursor_forw(&mut self) -> bool {
        if self.tail == CAP {
            return false;
        }

        self.text[self.head as usize] = self.text[self.tail as usize];
        self.head += 1;
        self.tail += 1;

        true
    }

    /// Delete the character left of the cursor.
    pub fn delete_back(&mut self) -> bool {
        if self.head == 0 {
            return false;
        }

        self.head -= 1;

        true
    }

    /// Delete the character right of the cursor.
    pub fn delete_forw(&mut self) -> bool {
        if self.tail == CAP {
            return false;
        }

        self.tail += 1;

        true
    }

    /// Insert bytes at the cursor, up to remaining capacity.
    pub fn insert(&mut self, bytes: &[u8]) -> bool {
        let mut inserted = false;

        for &c in bytes {
            if self.is_full() {
                break;
            }
            self.text[self.head as usize] = c;
            self.head += 1;
            inserted = true;
        }

        inserted
    }

    /// Discard the current content and leave history scrolling.
    pub fn reset(&mut self) -> bool {
        self.hist.current = self.hist.head;
        self.hist.save = None;

        if self.size() == 0 {
            return false;
        }

        self.head = 0;
        self.tail = CAP;

        true
    }

    /// Serialize pre-gap then post-gap content.
    pub fn write(&self) -> String {
        let mut out = Vec::with_capacity(self.size());
        out.extend_from_slice(&self.text[..self.head as usize]);
        out.extend_from_slice(&self.text[self.tail as usize..]);

        String::from_utf8_lossy(&out).into_owned()
    }

    fn load(&mut self, s: &str) {
        self.head = 0;
        self.tail = CAP;
        self.insert(s.as_bytes());
    }

    fn hist_size(&self) -> u16 {
        self.hist.head.wrapping_sub(self.hist.tail)
    }

    /// Detach the current content into the history ring.
    ///
    /// A full ring reclaims its oldest entry first; replaying an entry
    /// scrolled out of history relocates it to the head.
    pub fn hist_push(&mut self) -> bool {
        let line = self.write();

        if line.is_empty() {
            return false;
        }

        /* Replayed entry: remove the original before re-pushing */
        if self.hist.current != self.hist.head {
            let at = self.hist.current & HIST_MASK;
            if self.hist.entries[at as usize].as_deref() == Some(line.as_str()) {
                let mut i = self.hist.current;
                while i.wrapping_add(1) != self.hist.head {
                    let next = i.wrapping_add(1);
                    self.hist.entries[(i & HIST_MASK) as usize] =
                        self.hist.entries[(next & HIST_MASK) as usize].take();
                    i = next;
                }
                self.hist.head = self.hist.head.wrapping_sub(1);
            }
        }

        if self.hist_size() == INPUT_HIST_MAX as u16 {
            self.hist.entries[(self.hist.tail & HIST_MASK) as usize] = None;
            self.hist.tail = self.hist.tail.wrapping_add(1);
        }

        self.hist.entries[(self.hist.head & HIST_MASK) as usize] = Some(line);
        self.hist.head = self.hist.head.wrapping_add(1);
        self.hist.current = self.hist.head;
        self.hist.save = None;

        self.head = 0;
        self.tail = CAP;

        true
    }

    /// Scroll backwards through the input history.
    pub fn hist_back(&mut self) -> bool {
        if self.hist_size() == 0 || self.hist.current == self.hist.tail {
            return false;
        }

        if self.hist.current == self.hist.head {
            self.hist.save = Some(self.write());
        }

        self.hist.current = self.hist.current.wrapping_sub(1);

        let entry = self.hist.entries[(self.hist.current & HIST_MASK) as usize]
            .clone()
            .unwrap_or_default();
        self.load(&entry);

        true
    }

    /// Scroll forwards through the input history, restoring the saved
    /// working line past the newest entry.
    pub fn hist_forw(&mut self) -> bool {
        if self.hist.current == self.hist.head {
            return false;
        }

        self.hist.current = self.hist.current.wrapping_add(1);

        if self.hist.current == self.hist.head {
            let save = self.hist.save.take().unwrap_or_default();
            self.load(&save);
        } else {
            let entry = self.hist.entries[(self.hist.current & HIST_MASK) as usize]
                .clone()
                .unwrap_or_default();
            self.load(&entry);
        }

        true
    }

    /// Complete the word left of the cursor in place.
    ///
    /// No-op at the start of input, directly after a space, or when the
    /// character right of the cursor is not a space. The lookup receives
    /// the word plus its growth room (the gap), the word length, and
    /// whether the word starts the input; a first-word match may append
    /// a delimiter.
    pub fn complete(&mut self, lookup: CompletionFn) -> bool {
        if self.head == 0 || self.text[(self.head - 1) as usize] == b' ' {
            return false;
        }

        if self.tail < CAP && self.text[self.tail as usize] != b' ' {
            return false;
        }

        let mut word = self.head;
        while word > 0 && self.text[(word - 1) as usize] != b' ' {
            word -= 1;
        }

        let len = (self.head - word) as usize;
        let max = (self.tail - word) as usize;

        let ret = lookup(
            &mut self.text[word as usize..word as usize + max],
            len,
            word == 0,
        );

        if ret == 0 || ret > max {
            return false;
        }

        self.head = word + ret as u16;

        true
    }
}
