// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Bounded command history with a browse cursor and a pending-line cache.
//!
//! `index == items.len()` means "not browsing"; the cache exists only while browsing
//! and holds the line that was under edit when browsing began, so a `next` past the
//! newest entry (or a lone `ESC`) brings the user back to exactly what they had typed.
//!
//! Persistence is plain text, one entry per line, written atomically (temp file +
//! rename) so a crash can never truncate the file to garbage.

use crate::{readline_impl::edit_buffer::EditBuffer, HISTORY_SIZE_DEFAULT};
use std::{collections::VecDeque, io, path::Path};

#[derive(Debug)]
pub struct History {
    /// Oldest first.
    items: VecDeque<String>,
    /// Browse cursor in `0..=items.len()`.
    index: usize,
    /// Snapshot of the edit buffer taken when browsing began.
    cache: Option<String>,
    max_size: usize,
}

impl Default for History {
    fn default() -> Self { Self::with_max_size(HISTORY_SIZE_DEFAULT) }
}

impl History {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self { items: VecDeque::new(), index: 0, cache: None, max_size }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.items.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    #[must_use]
    pub fn is_browsing(&self) -> bool { self.index != self.items.len() }

    /// Entries oldest first, for the numbered `history` listing (and newest first,
    /// reversed, for prefix hints).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.items.iter().map(String::as_str)
    }

    /// Record an entered line. Empty lines and repeats of the newest entry are not
    /// recorded; either way browsing state is discarded and `index == len` holds.
    pub fn add(&mut self, line: &str) {
        if !line.is_empty() && self.items.back().map(String::as_str) != Some(line) {
            self.items.push_back(line.to_string());
            while self.items.len() > self.max_size {
                self.items.pop_front();
            }
        }
        self.index = self.items.len();
        self.cache = None;
    }

    /// Browse one entry older. The first call snapshots the buffer into the cache.
    /// Returns `false` when already at the oldest entry (the buffer is still
    /// overwritten with that entry).
    pub fn prev(&mut self, buffer: &mut EditBuffer) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let moved = if !self.is_browsing() {
            self.cache = Some(buffer.text().to_string());
            self.index = self.items.len() - 1;
            true
        } else if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        };
        buffer.replace_all(&self.items[self.index]);
        moved
    }

    /// Browse one entry newer; stepping past the newest restores the cached line and
    /// ends browsing.
    pub fn next(&mut self, buffer: &mut EditBuffer) -> bool {
        if !self.is_browsing() {
            return false;
        }
        if self.index + 1 < self.items.len() {
            self.index += 1;
            buffer.replace_all(&self.items[self.index]);
        } else {
            buffer.replace_all(&self.cache.take().unwrap_or_default());
            self.index = self.items.len();
        }
        true
    }

    /// Drop browsing state without touching the buffer (the line was accepted or
    /// interrupted mid-browse).
    pub fn cancel_browsing(&mut self) {
        self.index = self.items.len();
        self.cache = None;
    }

    /// Abandon browsing and restore the cached line (a lone `ESC`).
    pub fn reset_to_cache(&mut self, buffer: &mut EditBuffer) -> bool {
        if !self.is_browsing() {
            return false;
        }
        buffer.replace_all(&self.cache.take().unwrap_or_default());
        self.index = self.items.len();
        true
    }

    /// Load entries from a plain-text file, keeping only the newest `max_size`.
    /// A missing or unreadable file yields an empty history.
    #[must_use]
    pub fn load(path: &Path, max_size: usize) -> Self {
        let mut history = Self::with_max_size(max_size);
        if let Ok(text) = std::fs::read_to_string(path) {
            for line in text.lines().filter(|line| !line.is_empty()) {
                history.items.push_back(line.to_string());
                while history.items.len() > max_size {
                    history.items.pop_front();
                }
            }
        }
        history.index = history.items.len();
        history
    }

    /// Atomic save: write a sibling temp file, then rename over the target.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the write or the rename.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut text = String::new();
        for item in &self.items {
            text.push_str(item);
            text.push('\n');
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loaded(entries: &[&str]) -> History {
        let mut history = History::new();
        for entry in entries {
            history.add(entry);
        }
        history
    }

    #[test]
    fn browse_back_snapshot_and_restore() {
        let mut history = loaded(&["a", "b", "c"]);
        let mut buffer = EditBuffer::new();
        buffer.replace_all("x");

        assert!(history.prev(&mut buffer));
        assert_eq!(buffer.text(), "c");
        assert!(history.prev(&mut buffer));
        assert_eq!(buffer.text(), "b");
        assert!(history.prev(&mut buffer));
        assert_eq!(buffer.text(), "a");
        // At the oldest entry: no movement, buffer unchanged.
        assert!(!history.prev(&mut buffer));
        assert_eq!(buffer.text(), "a");

        assert!(history.next(&mut buffer));
        assert_eq!(buffer.text(), "b");
        assert!(history.next(&mut buffer));
        assert_eq!(buffer.text(), "c");
        // Past the newest: the pending line comes back and browsing ends.
        assert!(history.next(&mut buffer));
        assert_eq!(buffer.text(), "x");
        assert!(!history.is_browsing());
        assert!(!history.next(&mut buffer));
    }

    #[test]
    fn reset_to_cache_abandons_browsing() {
        let mut history = loaded(&["one", "two"]);
        let mut buffer = EditBuffer::new();
        buffer.replace_all("draft");

        history.prev(&mut buffer);
        history.prev(&mut buffer);
        assert_eq!(buffer.text(), "one");
        assert!(history.reset_to_cache(&mut buffer));
        assert_eq!(buffer.text(), "draft");
        assert!(!history.reset_to_cache(&mut buffer));
    }

    #[test]
    fn add_keeps_the_size_bound_and_parks_the_index() {
        let mut history = History::with_max_size(2);
        for entry in ["a", "b", "c", "d"] {
            history.add(entry);
            assert!(history.len() <= 2);
            assert!(!history.is_browsing());
        }
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["c", "d"]);
    }

    #[test]
    fn add_skips_empty_and_consecutive_duplicates() {
        let mut history = loaded(&["ls", "", "ls", "pwd", "pwd"]);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["ls", "pwd"]);
    }

    #[test]
    fn add_while_browsing_discards_the_cache() {
        let mut history = loaded(&["a"]);
        let mut buffer = EditBuffer::new();
        buffer.replace_all("typed");
        history.prev(&mut buffer);
        history.add("b");
        assert!(!history.is_browsing());
        assert!(!history.next(&mut buffer));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");

        let history = loaded(&["first", "second", "third"]);
        history.save(&path).unwrap();

        let reloaded = History::load(&path, 100);
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), vec!["first", "second", "third"]);
        assert!(!reloaded.is_browsing());
    }

    #[test]
    fn load_trims_to_max_size_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();

        let trimmed = History::load(&path, 2);
        assert_eq!(trimmed.iter().collect::<Vec<_>>(), vec!["c", "d"]);

        let absent = History::load(&dir.path().join("nope"), 2);
        assert!(absent.is_empty());
    }
}
