// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The logical line under edit: pure data, no I/O.
//!
//! The cursor is a grapheme index, so cursor motion can never land inside a cluster.
//! Byte offsets only appear at the seams (completion splicing), and cell widths are
//! computed on demand through the injected width function, so the buffer itself
//! knows nothing about the terminal.

use crate::CellWidthFn;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    text: String,
    /// Grapheme index in `0..=grapheme_len()`; always a valid insertion point.
    cursor: usize,
}

impl EditBuffer {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn text(&self) -> &str { &self.text }

    #[must_use]
    pub fn cursor(&self) -> usize { self.cursor }

    #[must_use]
    pub fn grapheme_len(&self) -> usize { self.text.graphemes(true).count() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.text.is_empty() }

    /// Byte offset of the grapheme at `index` (or the end of the text).
    #[must_use]
    pub fn byte_offset_of(&self, index: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(index)
            .map_or(self.text.len(), |(offset, _)| offset)
    }

    #[must_use]
    pub fn before_cursor(&self) -> &str { &self.text[..self.byte_offset_of(self.cursor)] }

    #[must_use]
    pub fn after_cursor(&self) -> &str { &self.text[self.byte_offset_of(self.cursor)..] }

    #[must_use]
    pub fn char_at_cursor(&self) -> Option<char> { self.after_cursor().chars().next() }

    pub fn insert(&mut self, ch: char) {
        let offset = self.byte_offset_of(self.cursor);
        self.text.insert(offset, ch);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        let offset = self.byte_offset_of(self.cursor);
        self.text.insert_str(offset, s);
        self.cursor += s.graphemes(true).count();
    }

    /// Delete the grapheme before the cursor.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let start = self.byte_offset_of(self.cursor - 1);
        let end = self.byte_offset_of(self.cursor);
        self.text.replace_range(start..end, "");
        self.cursor -= 1;
        true
    }

    /// Delete the grapheme at the cursor.
    pub fn delete_char(&mut self) -> bool {
        if self.cursor >= self.grapheme_len() {
            return false;
        }
        let start = self.byte_offset_of(self.cursor);
        let end = self.byte_offset_of(self.cursor + 1);
        self.text.replace_range(start..end, "");
        true
    }

    pub fn move_home(&mut self) -> bool {
        let moved = self.cursor != 0;
        self.cursor = 0;
        moved
    }

    pub fn move_end(&mut self) -> bool {
        let len = self.grapheme_len();
        let moved = self.cursor != len;
        self.cursor = len;
        moved
    }

    pub fn move_left(&mut self) -> bool { self.move_left_by(1) }

    pub fn move_left_by(&mut self, count: usize) -> bool {
        if self.cursor == 0 || count == 0 {
            return false;
        }
        self.cursor = self.cursor.saturating_sub(count);
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.grapheme_len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Skip the run of whitespace, then the run of non-whitespace, leftwards.
    pub fn move_word_left(&mut self) -> bool {
        let target = self.word_left_index();
        let moved = target != self.cursor;
        self.cursor = target;
        moved
    }

    /// Skip the run of whitespace, then the run of non-whitespace, rightwards.
    pub fn move_word_right(&mut self) -> bool {
        let graphemes: Vec<&str> = self.text.graphemes(true).collect();
        let mut idx = self.cursor;
        while idx < graphemes.len() && is_blank(graphemes[idx]) {
            idx += 1;
        }
        while idx < graphemes.len() && !is_blank(graphemes[idx]) {
            idx += 1;
        }
        let moved = idx != self.cursor;
        self.cursor = idx;
        moved
    }

    pub fn delete_word_left(&mut self) -> bool {
        let target = self.word_left_index();
        if target == self.cursor {
            return false;
        }
        let start = self.byte_offset_of(target);
        let end = self.byte_offset_of(self.cursor);
        self.text.replace_range(start..end, "");
        self.cursor = target;
        true
    }

    pub fn delete_to_home(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let end = self.byte_offset_of(self.cursor);
        self.text.replace_range(..end, "");
        self.cursor = 0;
        true
    }

    pub fn delete_to_end(&mut self) -> bool {
        let offset = self.byte_offset_of(self.cursor);
        let deleted = offset < self.text.len();
        self.text.truncate(offset);
        deleted
    }

    /// Replace the whole buffer and leave the cursor at the end.
    pub fn replace_all(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.cursor = self.grapheme_len();
    }

    /// Splice `replacement` over the bytes `from_byte..cursor` and park the cursor
    /// after it. Used when a completion replaces the matched pattern.
    pub fn replace_before_cursor(&mut self, from_byte: usize, replacement: &str) {
        let cursor_byte = self.byte_offset_of(self.cursor);
        self.text.replace_range(from_byte..cursor_byte, replacement);
        self.cursor = self.text[..from_byte + replacement.len()].graphemes(true).count();
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Sum of the cell widths of everything left of the cursor.
    #[must_use]
    pub fn width_before_cursor(&self, cell_width: &CellWidthFn) -> usize {
        self.before_cursor().chars().map(|ch| cell_width(ch)).sum()
    }

    /// Sum of the cell widths of the cursor grapheme and everything after it.
    #[must_use]
    pub fn width_after_cursor(&self, cell_width: &CellWidthFn) -> usize {
        self.after_cursor().chars().map(|ch| cell_width(ch)).sum()
    }

    fn word_left_index(&self) -> usize {
        let graphemes: Vec<&str> = self.text.graphemes(true).collect();
        let mut idx = self.cursor;
        while idx > 0 && is_blank(graphemes[idx - 1]) {
            idx -= 1;
        }
        while idx > 0 && !is_blank(graphemes[idx - 1]) {
            idx -= 1;
        }
        idx
    }
}

fn is_blank(grapheme: &str) -> bool { grapheme.chars().all(char::is_whitespace) }
