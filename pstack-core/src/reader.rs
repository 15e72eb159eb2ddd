//! Line reader: assembles physical input lines into logical lines.
//!
//! The scanner wants one complete logical line at a time, but procedure
//! bodies (and strings) may span several physical lines. The reader tracks
//! brace, bracket, and string-paren depth across the lines it is fed and
//! emits a joined logical line once everything opened has closed again.
//!
//! The reader never parses: it only counts delimiters, ignoring those
//! inside strings and comments, so its view of nesting matches the
//! scanner's.

/// Assembles physical lines into complete logical lines.
#[derive(Debug, Default)]
pub struct LineReader {
    pending: String,
    brace_depth: usize,
    bracket_depth: usize,
    string_depth: usize,
}

impl LineReader {
    /// Create an empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a construct opened on an earlier line is still unclosed.
    /// Drivers use this to switch to a continuation prompt.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.brace_depth > 0 || self.bracket_depth > 0 || self.string_depth > 0
    }

    /// Discard any partially-assembled input (after an interrupt).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.brace_depth = 0;
        self.bracket_depth = 0;
        self.string_depth = 0;
    }

    /// Feed one physical line. Returns the completed logical line when
    /// nothing is left open, or `None` while accumulation continues.
    pub fn feed(&mut self, line: &str) -> Option<String> {
        self.track(line);

        if self.pending.is_empty() {
            if self.is_open() {
                self.pending.push_str(line);
                return None;
            }
            return Some(line.to_owned());
        }

        self.pending.push('\n');
        self.pending.push_str(line);
        if self.is_open() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Update nesting depths for one physical line.
    fn track(&mut self, line: &str) {
        for c in line.chars() {
            if self.string_depth > 0 {
                match c {
                    '(' => self.string_depth += 1,
                    ')' => self.string_depth -= 1,
                    _ => {}
                }
                continue;
            }
            match c {
                '%' => break, // comment to end of physical line
                '(' => self.string_depth = 1,
                '{' => self.brace_depth += 1,
                '}' => self.brace_depth = self.brace_depth.saturating_sub(1),
                '[' => self.bracket_depth += 1,
                ']' => self.bracket_depth = self.bracket_depth.saturating_sub(1),
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
