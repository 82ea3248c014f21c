//! Editor document: the text store the sync layer reads from and writes to.
//!
//! `DocumentStore` is the narrow interface the collaborative sync session
//! consumes (get the whole text, replace the whole text). `PlainEditor` is
//! the field-backed implementation used by native hosts and tests.

use std::ops::Range;

use smol_str::SmolStr;

use crate::text::{EditorRope, TextBuffer};
use crate::types::Selection;

/// Whole-document access used by the sync layer.
pub trait DocumentStore {
    /// Current document text.
    fn text(&self) -> String;

    /// Replace the document text.
    ///
    /// With `preserve_cursor` the cursor and selection are carried over the
    /// change instead of being reset to the start of the document.
    fn set_text(&mut self, text: &str, preserve_cursor: bool);
}

/// Simple field-based editor over any `TextBuffer`.
#[derive(Clone)]
pub struct PlainEditor<T: TextBuffer = EditorRope> {
    buffer: T,
    cursor: usize,
    selection: Option<Selection>,
}

impl<T: TextBuffer + Default> Default for PlainEditor<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl PlainEditor<EditorRope> {
    /// Create an editor holding `text`, cursor at the start.
    pub fn from_text(text: &str) -> Self {
        Self::new(EditorRope::from_str(text))
    }
}

impl<T: TextBuffer> PlainEditor<T> {
    /// Create a new editor with the given buffer.
    pub fn new(buffer: T) -> Self {
        Self {
            buffer,
            cursor: 0,
            selection: None,
        }
    }

    pub fn len_chars(&self) -> usize {
        self.buffer.len_chars()
    }

    pub fn cursor_offset(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor_offset(&mut self, offset: usize) {
        self.cursor = offset.min(self.buffer.len_chars());
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        let len = self.buffer.len_chars();
        self.selection = selection.map(|s| s.clamped(len));
    }

    /// Get selected text, if any.
    pub fn selected_text(&self) -> Option<SmolStr> {
        self.selection
            .filter(|sel| !sel.is_collapsed())
            .and_then(|sel| self.buffer.slice(sel.to_range()))
    }

    pub fn slice(&self, range: Range<usize>) -> Option<SmolStr> {
        self.buffer.slice(range)
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.buffer.char_at(offset)
    }

    /// Insert text at char offset, moving the cursor after it.
    pub fn insert(&mut self, offset: usize, text: &str) {
        let at = offset.min(self.buffer.len_chars());
        self.buffer.insert(at, text);
        self.cursor = at + text.chars().count();
        self.selection = None;
    }

    /// Delete a char range, leaving the cursor at its start.
    pub fn delete(&mut self, range: Range<usize>) {
        let start = range.start;
        self.buffer.delete(range);
        self.cursor = start.min(self.buffer.len_chars());
        self.selection = None;
    }

    /// Replace a char range, selecting the replacement.
    pub fn replace(&mut self, range: Range<usize>, text: &str) {
        let start = range.start.min(self.buffer.len_chars());
        self.buffer.replace(range, text);
        let end = start + text.chars().count();
        self.selection = Some(Selection::new(start, end).clamped(self.buffer.len_chars()));
        self.cursor = end.min(self.buffer.len_chars());
    }
}

impl<T: TextBuffer> DocumentStore for PlainEditor<T> {
    fn text(&self) -> String {
        self.buffer.to_string()
    }

    fn set_text(&mut self, text: &str, preserve_cursor: bool) {
        let old = self.buffer.to_string();
        if old == text {
            return;
        }

        let len = self.buffer.len_chars();
        self.buffer.replace(0..len, text);

        if preserve_cursor {
            let shift = OffsetShift::between(&old, text);
            self.cursor = shift.map(self.cursor);
            self.selection = self
                .selection
                .map(|sel| Selection::new(shift.map(sel.anchor), shift.map(sel.head)));
        } else {
            self.cursor = 0;
            self.selection = None;
        }
    }
}

/// Maps offsets across a whole-text replacement using the unchanged
/// prefix and suffix of the two texts.
#[derive(Debug, Clone, Copy)]
struct OffsetShift {
    prefix: usize,
    old_len: usize,
    new_len: usize,
    suffix: usize,
}

impl OffsetShift {
    fn between(old: &str, new: &str) -> Self {
        let prefix = old
            .chars()
            .zip(new.chars())
            .take_while(|(a, b)| a == b)
            .count();
        let old_len = old.chars().count();
        let new_len = new.chars().count();
        let max_suffix = old_len.min(new_len) - prefix;
        let suffix = old
            .chars()
            .rev()
            .zip(new.chars().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        Self {
            prefix,
            old_len,
            new_len,
            suffix,
        }
    }

    fn map(&self, offset: usize) -> usize {
        let offset = offset.min(self.old_len);
        if offset <= self.prefix {
            offset
        } else if offset >= self.old_len - self.suffix {
            offset + self.new_len - self.old_len
        } else {
            self.new_len - self.suffix
        }
    }
}
