//! Char-indexed text storage.
//!
//! Every offset here counts Unicode scalar values, the same unit the sync
//! diff codec uses for segment lengths. Out-of-range edits are clamped to
//! the end of the text rather than rejected.

use std::ops::Range;

use smol_str::{SmolStr, ToSmolStr};

/// Storage behind a `PlainEditor`.
pub trait TextBuffer {
    fn len_chars(&self) -> usize;

    fn insert(&mut self, at: usize, text: &str);

    fn delete(&mut self, range: Range<usize>);

    /// Delete `range`, then insert `text` where it started.
    fn replace(&mut self, range: Range<usize>, text: &str) {
        let start = range.start;
        self.delete(range);
        self.insert(start, text);
    }

    /// `None` unless `range` lies inside the text.
    fn slice(&self, range: Range<usize>) -> Option<SmolStr>;

    fn char_at(&self, at: usize) -> Option<char>;

    fn to_string(&self) -> String;
}

/// `TextBuffer` over a `ropey::Rope`.
#[derive(Clone, Default)]
pub struct EditorRope {
    rope: ropey::Rope,
}

impl EditorRope {
    pub fn from_str(s: &str) -> Self {
        Self {
            rope: ropey::Rope::from_str(s),
        }
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let len = self.rope.len_chars();
        let start = range.start.min(len);
        start..range.end.clamp(start, len)
    }
}

impl TextBuffer for EditorRope {
    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn insert(&mut self, at: usize, text: &str) {
        let at = at.min(self.rope.len_chars());
        self.rope.insert(at, text);
    }

    fn delete(&mut self, range: Range<usize>) {
        let range = self.clamp(range);
        if !range.is_empty() {
            self.rope.remove(range);
        }
    }

    fn slice(&self, range: Range<usize>) -> Option<SmolStr> {
        if range.start > range.end || range.end > self.rope.len_chars() {
            return None;
        }
        Some(self.rope.slice(range).to_smolstr())
    }

    fn char_at(&self, at: usize) -> Option<char> {
        (at < self.rope.len_chars()).then(|| self.rope.char(at))
    }

    fn to_string(&self) -> String {
        self.rope.to_string()
    }
}
