// ============================================================
// Layer 4 - Sequence Chunker
// ============================================================
// Some sentences in nineteenth-century prose run to hundreds of
// words, longer than the positional table of the model. Rather
// than truncating them, the encoder cuts long token sequences
// into overlapping windows.
//
// Example with window=5, overlap=2 (stride 3):
//   Tokens:   A B C D E F G H
//   Window 1: A B C D E
//   Window 2: D E F G H
//
// Every token appears in at least one window, and the last window
// always ends on the last token.

use anyhow::{ensure, Result};

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    window:  usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` must be smaller than `window`, otherwise the
    /// stride would be zero.
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        ensure!(window > 0, "chunk window must be positive");
        ensure!(
            overlap < window,
            "overlap ({overlap}) must be less than the window ({window})"
        );
        Ok(Self { window, overlap })
    }

    /// Split `items` into overlapping windows. Sequences that already
    /// fit produce a single window; an empty sequence produces none.
    pub fn chunk<'a, T>(&self, items: &'a [T]) -> Vec<&'a [T]> {
        if items.is_empty() {
            return Vec::new();
        }

        let stride = self.window - self.overlap;
        let mut windows = Vec::new();
        let mut start   = 0usize;

        loop {
            let end = (start + self.window).min(items.len());
            windows.push(&items[start..end]);
            if end == items.len() {
                break;
            }
            start += stride;
        }

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sequence_is_one_window() {
        let c = Chunker::new(10, 2).unwrap();
        let items = [1, 2, 3];
        assert_eq!(c.chunk(&items), vec![&items[..]]);
    }

    #[test]
    fn test_overlap_is_correct() {
        let c = Chunker::new(4, 2).unwrap();
        let items = ["a", "b", "c", "d", "e", "f"];
        let windows = c.chunk(&items);
        assert_eq!(windows[0], &["a", "b", "c", "d"]);
        assert_eq!(windows[1], &["c", "d", "e", "f"]);
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_last_window_ends_on_last_item() {
        let c = Chunker::new(5, 2).unwrap();
        let items: Vec<u32> = (0..8).collect();
        let windows = c.chunk(&items);
        assert_eq!(windows.last().unwrap().last(), Some(&7));
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_empty_gives_no_windows() {
        let c = Chunker::new(5, 2).unwrap();
        let items: [u32; 0] = [];
        assert!(c.chunk(&items).is_empty());
    }

    #[test]
    fn test_overlap_must_be_less_than_window() {
        assert!(Chunker::new(5, 5).is_err());
        assert!(Chunker::new(0, 0).is_err());
    }
}
