use reserva_core::SequentialFormat;
use std::ops::Range;

/// Formats a counter value as a zero-padded decimal of the format's width.
///
/// Ordinals beyond the value space wrap around.
pub fn format_counter(format: &SequentialFormat, ordinal: u128) -> String {
    let ordinal = ordinal % format.value_space();
    format!("{:0width$}", ordinal, width = format.width())
}

/// Walks a counter space in ascending order, one chunk at a time.
///
/// The cursor is local to a single reservation call; which values are free is
/// decided by the store, not by the cursor.
#[derive(Debug, Clone)]
pub struct SequentialCursor {
    next: u128,
    end: u128,
}

impl SequentialCursor {
    /// Creates a cursor over `[0, end)`.
    pub fn new(end: u128) -> Self {
        Self { next: 0, end }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.end
    }

    /// Returns the next range of at most `chunk` ordinals, or `None` once the
    /// space has been walked.
    pub fn next_range(&mut self, chunk: usize) -> Option<Range<u128>> {
        if self.is_exhausted() || chunk == 0 {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(chunk as u128).min(self.end);
        self.next = end;
        Some(start..end)
    }
}
