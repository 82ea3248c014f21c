//! Selection bounds.

use std::ops::Range;

/// A selection from `anchor` (where it started) to `head` (where the cursor
/// is). `head` may come before `anchor`.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Just a cursor, nothing selected.
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Clamp both ends to a document of `len` chars.
    pub fn clamped(self, len: usize) -> Self {
        Self::new(self.anchor.min(len), self.head.min(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backwards_selection_range() {
        let sel = Selection::new(10, 5);
        assert_eq!(sel.to_range(), 5..10);
        assert!(!sel.is_collapsed());
        assert!(Selection::new(7, 7).is_collapsed());
    }

    #[test]
    fn test_selection_clamped() {
        assert_eq!(Selection::new(2, 40).clamped(10), Selection::new(2, 10));
        assert_eq!(Selection::new(40, 30).clamped(10), Selection::new(10, 10));
    }
}
