// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! This struct actually handles the line editing and rendering. It works hand in hand
//! with [`crate::Readline`], which feeds it decoded key input and hands the events it
//! produces up to the shell loop.
//!
//! The redraw contract: before a redraw the terminal cursor sits at a known cell
//! column (`old_cursor_loc`) within the logical line; after it, the cursor sits at the
//! width of the buffer before the logical cursor, with the inline hint and the tail
//! re-painted after it and any subline refreshed beneath. Everything is queued into
//! one batch and flushed once, so the repaint never flickers.

use crate::{
    public_api::config,
    readline_impl::{
        edit_buffer::EditBuffer,
        input_decoder::KeyInput,
        readline::{ReadlineError, ReadlineEvent},
    },
    shell_impl::{
        completer::Completion,
        tokenizer::{self, DelimiterKind},
    },
    CellWidthFn, SafeHistory,
};
use crossterm::{
    cursor,
    style::{Color, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
    QueueableCommand,
};
use std::io::{self, Write};

/// 256-colour indices used for syntax-error highlighting, one per error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintColors {
    pub unfinished_quote: u8,
    pub invalid_pipe: u8,
    pub invalid_separator: u8,
}

pub const HINT_COLOR_DEFAULT: u8 = 178;

impl Default for HintColors {
    fn default() -> Self {
        Self {
            unfinished_quote: HINT_COLOR_DEFAULT,
            invalid_pipe: HINT_COLOR_DEFAULT,
            invalid_separator: HINT_COLOR_DEFAULT,
        }
    }
}

/// Whether the editor feeds the shell prompt or a running command's stdin. The two
/// differ only in what `^D` and Enter mean for a cooked line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorRole {
    AtPrompt,
    CommandInput,
}

/// Collaborators injected by the shell; every one is optional so the editor works
/// bare in tests.
#[derive(Default)]
pub struct EditorCallbacks {
    /// Inline grey suggestion, computed from the text before the cursor.
    pub hint: Option<Box<dyn FnMut(&str) -> Option<String> + Send>>,
    /// Auxiliary line below the prompt (the alias preview), from the whole line.
    pub subline: Option<Box<dyn FnMut(&str) -> Option<String> + Send>>,
    /// Candidate gathering for Tab, from the text before the cursor.
    pub completion: Option<Box<dyn FnMut(&str) -> Completion + Send>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HintItem {
    /// Byte position in the line text.
    position: usize,
    color: u8,
}

pub struct LineState {
    buffer: EditBuffer,
    prompt: String,
    cell_width: CellWidthFn,
    hint_colors: HintColors,
    role: EditorRole,
    /// Cell column the terminal cursor is at (relative to the prompt end), as left by
    /// the previous redraw.
    old_cursor_loc: usize,
    shown_subline_rows: u16,
    /// Rows of scroll room already secured beneath the current prompt line.
    reserved_subline_rows: u16,
    /// Buffer retained across an ambiguous completion, restored on the next read.
    kept_state: Option<EditBuffer>,
}

impl LineState {
    #[must_use]
    pub fn new(
        prompt: String,
        cell_width: CellWidthFn,
        hint_colors: HintColors,
        role: EditorRole,
    ) -> Self {
        Self {
            buffer: EditBuffer::new(),
            prompt,
            cell_width,
            hint_colors,
            role,
            old_cursor_loc: 0,
            shown_subline_rows: 0,
            reserved_subline_rows: 0,
            kept_state: None,
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &EditBuffer { &self.buffer }

    #[must_use]
    pub fn has_kept_state(&self) -> bool { self.kept_state.is_some() }

    #[must_use]
    pub fn old_cursor_loc(&self) -> usize { self.old_cursor_loc }

    pub fn update_prompt(&mut self, prompt: &str) {
        self.prompt.clear();
        self.prompt.push_str(prompt);
    }

    /// Start a fresh read: print the prompt, restore any kept line state, render.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    pub fn begin_read(
        &mut self,
        term: &mut dyn Write,
        callbacks: &mut EditorCallbacks,
    ) -> Result<(), ReadlineError> {
        term.write_all(self.prompt.as_bytes())?;
        match self.kept_state.take() {
            Some(kept) => self.buffer = kept,
            None => self.buffer.reset(),
        }
        self.old_cursor_loc = 0;
        self.shown_subline_rows = 0;
        self.reserved_subline_rows = 0;
        self.render(term, callbacks)?;
        Ok(())
    }

    /// Apply one decoded key, repaint, and surface an event if the key produced one.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    #[allow(clippy::unwrap_in_result)] /* This is for lock.unwrap() */
    pub fn apply_key(
        &mut self,
        key: KeyInput,
        term: &mut dyn Write,
        safe_history: &SafeHistory,
        callbacks: &mut EditorCallbacks,
    ) -> Result<Option<ReadlineEvent>, ReadlineError> {
        match key {
            KeyInput::Char(ch) => {
                self.buffer.insert(ch);
                self.render(term, callbacks)?;
                Ok(None)
            }
            KeyInput::Enter => {
                safe_history.lock().unwrap().cancel_browsing();
                let mut text = self.finish_line(term, true)?;
                if self.role == EditorRole::CommandInput {
                    text.push('\n');
                }
                Ok(Some(ReadlineEvent::Line(text)))
            }
            KeyInput::Tab => self.handle_tab(term, callbacks),
            KeyInput::Interrupt => {
                safe_history.lock().unwrap().cancel_browsing();
                self.update_subline(term, None)?;
                let tail = self.buffer.width_after_cursor(&self.cell_width);
                if tail > 0 {
                    term.queue(cursor::MoveRight(clamp_u16(tail)))?;
                }
                term.write_all(b"^C\r\n")?;
                term.flush()?;
                self.buffer.reset();
                self.old_cursor_loc = 0;
                Ok(Some(ReadlineEvent::Interrupted))
            }
            KeyInput::DeleteOrEof => {
                if self.buffer.is_empty() {
                    self.update_subline(term, None)?;
                    term.write_all(b"\r\n")?;
                    term.flush()?;
                    Ok(Some(ReadlineEvent::Eof))
                } else if self.role == EditorRole::CommandInput {
                    // Cooked-TTY EOF on a non-empty line: flush it, no terminator.
                    let text = self.finish_line(term, false)?;
                    Ok(Some(ReadlineEvent::Line(text)))
                } else {
                    let moved = self.buffer.delete_char();
                    self.edit_op(term, callbacks, moved)
                }
            }
            KeyInput::Backspace => {
                let moved = self.buffer.backspace();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::Delete => {
                let moved = self.buffer.delete_char();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::MoveLeft => {
                let moved = self.buffer.move_left();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::MoveRight => {
                let moved = self.buffer.move_right();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::MoveHome => {
                let moved = self.buffer.move_home();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::MoveEnd => {
                let moved = self.buffer.move_end();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::MoveWordLeft => {
                let moved = self.buffer.move_word_left();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::MoveWordRight => {
                let moved = self.buffer.move_word_right();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::DeleteToHome => {
                let moved = self.buffer.delete_to_home();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::DeleteToEnd => {
                let moved = self.buffer.delete_to_end();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::DeleteWordLeft => {
                let moved = self.buffer.delete_word_left();
                self.edit_op(term, callbacks, moved)
            }
            KeyInput::HistoryPrev => {
                let moved = safe_history.lock().unwrap().prev(&mut self.buffer);
                if !moved {
                    self.bell(term)?;
                }
                self.render(term, callbacks)?;
                Ok(None)
            }
            KeyInput::HistoryNext => {
                let moved = safe_history.lock().unwrap().next(&mut self.buffer);
                if !moved {
                    self.bell(term)?;
                }
                self.render(term, callbacks)?;
                Ok(None)
            }
            KeyInput::ResetToCache => {
                if safe_history.lock().unwrap().reset_to_cache(&mut self.buffer) {
                    self.render(term, callbacks)?;
                }
                Ok(None)
            }
        }
    }

    /// Repaint the buffer in place, per the redraw contract in the module docs.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    pub fn render(
        &mut self,
        term: &mut dyn Write,
        callbacks: &mut EditorCallbacks,
    ) -> io::Result<()> {
        let hints = self.hint_items();
        let text = self.buffer.text().to_string();
        let cursor_byte = self.buffer.byte_offset_of(self.buffer.cursor());

        if self.old_cursor_loc > 0 {
            term.queue(cursor::MoveLeft(clamp_u16(self.old_cursor_loc)))?;
        }
        self.write_colored(term, &text[..cursor_byte], 0, &hints)?;
        term.queue(Clear(ClearType::UntilNewLine))?;
        // The cursor now sits at `width_before_cursor`.

        let mut tail_cells = 0;
        let hintable = self.buffer.char_at_cursor().is_none_or(char::is_whitespace);
        if hintable {
            if let Some(hint_cb) = callbacks.hint.as_mut() {
                if let Some(hint) = hint_cb(self.buffer.before_cursor()) {
                    term.queue(SetForegroundColor(Color::DarkGrey))?;
                    term.write_all(hint.as_bytes())?;
                    term.queue(ResetColor)?;
                    tail_cells += hint.chars().map(|ch| (self.cell_width)(ch)).sum::<usize>();
                }
            }
        }

        self.write_colored(term, &text[cursor_byte..], cursor_byte, &hints)?;
        tail_cells += self.buffer.width_after_cursor(&self.cell_width);
        if tail_cells > 0 {
            term.queue(cursor::MoveLeft(clamp_u16(tail_cells)))?;
        }

        let subline = callbacks.subline.as_mut().and_then(|cb| cb(self.buffer.text()));
        self.update_subline(term, subline.as_deref())?;

        self.old_cursor_loc = self.buffer.width_before_cursor(&self.cell_width);
        term.flush()
    }

    fn edit_op(
        &mut self,
        term: &mut dyn Write,
        callbacks: &mut EditorCallbacks,
        moved: bool,
    ) -> Result<Option<ReadlineEvent>, ReadlineError> {
        if moved {
            self.render(term, callbacks)?;
        } else {
            self.bell(term)?;
        }
        Ok(None)
    }

    fn handle_tab(
        &mut self,
        term: &mut dyn Write,
        callbacks: &mut EditorCallbacks,
    ) -> Result<Option<ReadlineEvent>, ReadlineError> {
        let Some(complete_cb) = callbacks.completion.as_mut() else {
            self.bell(term)?;
            return Ok(None);
        };
        let completion = complete_cb(self.buffer.before_cursor());

        match completion.candidates.len() {
            0 => {
                self.bell(term)?;
                Ok(None)
            }
            1 => {
                let completed = completion.candidates[0].clone();
                let at_end_of_line = self.buffer.after_cursor().is_empty();
                self.buffer
                    .replace_before_cursor(completion.pattern_start, &completed);
                if at_end_of_line && !completed.ends_with('/') {
                    self.buffer.insert(' ');
                }
                self.render(term, callbacks)?;
                Ok(None)
            }
            _ => {
                if let Some(prefix) = completion.common_prefix_extension() {
                    self.buffer
                        .replace_before_cursor(completion.pattern_start, &prefix);
                    self.render(term, callbacks)?;
                }
                self.kept_state = Some(self.buffer.clone());
                Ok(Some(ReadlineEvent::Completion(completion)))
            }
        }
    }

    /// Close out the visible line: clear the subline, step past the tail, optionally
    /// echo a newline, and hand back the buffer text.
    fn finish_line(&mut self, term: &mut dyn Write, echo_newline: bool) -> io::Result<String> {
        self.update_subline(term, None)?;
        let tail = self.buffer.width_after_cursor(&self.cell_width);
        if tail > 0 {
            term.queue(cursor::MoveRight(clamp_u16(tail)))?;
        }
        if echo_newline {
            term.write_all(b"\r\n")?;
        }
        term.flush()?;
        let text = self.buffer.text().to_string();
        self.buffer.reset();
        self.old_cursor_loc = 0;
        Ok(text)
    }

    /// Invalid delimiters and an unfinished quote become per-byte colour annotations.
    fn hint_items(&self) -> Vec<HintItem> {
        let scan = tokenizer::tokenize(self.buffer.text());
        let mut items = vec![];
        for idx in scan.invalid_delimiter_indices() {
            let delim = &scan.delimiters[idx];
            let color = if delim.kind == DelimiterKind::CommandSep {
                self.hint_colors.invalid_separator
            } else {
                self.hint_colors.invalid_pipe
            };
            for offset in 0..delim.kind.literal().len() {
                items.push(HintItem { position: delim.position + offset, color });
            }
        }
        if let Some(escape) = scan.unfinished_escape {
            items.push(HintItem {
                position: escape.start,
                color: self.hint_colors.unfinished_quote,
            });
        }
        items
    }

    fn write_colored(
        &self,
        term: &mut dyn Write,
        slice: &str,
        slice_start: usize,
        hints: &[HintItem],
    ) -> io::Result<()> {
        let mut scratch = [0u8; 4];
        for (offset, ch) in slice.char_indices() {
            let position = slice_start + offset;
            let hint = hints.iter().find(|item| item.position == position);
            if let Some(item) = hint {
                term.queue(SetForegroundColor(Color::AnsiValue(item.color)))?;
                term.write_all(ch.encode_utf8(&mut scratch).as_bytes())?;
                term.queue(ResetColor)?;
            } else {
                term.write_all(ch.encode_utf8(&mut scratch).as_bytes())?;
            }
        }
        Ok(())
    }

    /// Refresh or clear the subline rows beneath the prompt, leaving the cursor where
    /// it was: clear stale rows, scroll room for new ones, write, save/restore.
    fn update_subline(&mut self, term: &mut dyn Write, subline: Option<&str>) -> io::Result<()> {
        let new_lines: Vec<&str> = subline.map(|s| s.lines().collect()).unwrap_or_default();
        let new_rows = clamp_u16(new_lines.len());
        let touch = new_rows.max(self.shown_subline_rows);
        if touch == 0 {
            return Ok(());
        }
        // The save/restore pair below is only valid while writing the subline cannot
        // shift the screen, so rows the subline needs beyond what is already reserved
        // under this prompt are scrolled in first, with the cursor following its row
        // upward. The window height bounds the reservation.
        let (_, window_rows) = config::window_size_from_env();
        let extra = new_rows
            .saturating_sub(self.reserved_subline_rows)
            .min(window_rows.saturating_sub(1));
        if extra > 0 {
            term.queue(terminal::ScrollUp(extra))?;
            term.queue(cursor::MoveUp(extra))?;
            self.reserved_subline_rows += extra;
        }
        term.queue(cursor::SavePosition)?;
        for row in 0..touch {
            term.queue(cursor::MoveToNextLine(1))?;
            term.queue(Clear(ClearType::CurrentLine))?;
            if let Some(line) = new_lines.get(row as usize) {
                term.write_all(line.as_bytes())?;
            }
        }
        term.queue(cursor::RestorePosition)?;
        self.shown_subline_rows = new_rows;
        Ok(())
    }

    fn bell(&self, term: &mut dyn Write) -> io::Result<()> {
        term.write_all(b"\x07")?;
        term.flush()
    }
}

fn clamp_u16(value: usize) -> u16 { u16::try_from(value).unwrap_or(u16::MAX) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        default_cell_width_fn, readline_impl::history::History,
        shell_impl::completer::CompletionSite, test_fixtures::StdoutMock, StdMutex,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn editor() -> (LineState, StdoutMock, SafeHistory, EditorCallbacks) {
        let line_state = LineState::new(
            "$ ".into(),
            default_cell_width_fn(),
            HintColors::default(),
            EditorRole::AtPrompt,
        );
        let safe_history = Arc::new(StdMutex::new(History::new()));
        (line_state, StdoutMock::default(), safe_history, EditorCallbacks::default())
    }

    fn type_str(
        line_state: &mut LineState,
        term: &mut StdoutMock,
        safe_history: &SafeHistory,
        callbacks: &mut EditorCallbacks,
        text: &str,
    ) {
        for ch in text.chars() {
            line_state
                .apply_key(KeyInput::Char(ch), term, safe_history, callbacks)
                .unwrap();
        }
    }

    #[test]
    fn typing_builds_the_buffer_and_renders_it() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "ls");
        assert_eq!(line_state.buffer().text(), "ls");
        let rendered = strip_ansi_escapes::strip_str(term.get_copy_of_buffer_as_string());
        assert!(rendered.contains("ls"));
    }

    #[test]
    fn redraw_is_position_preserving_on_no_op() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "ab");
        let before = line_state.old_cursor_loc();
        // move_right at end of line is a no-op: bell, no render, same column.
        line_state
            .apply_key(KeyInput::MoveRight, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.old_cursor_loc(), before);
        assert_eq!(
            line_state
                .buffer()
                .width_before_cursor(&default_cell_width_fn()),
            before
        );
    }

    #[test]
    fn invalid_pipe_is_painted_with_the_hint_color() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "| ls");
        let rendered = term.get_copy_of_buffer_as_string();
        assert!(
            rendered.contains("\x1b[38;5;178m|"),
            "expected 256-colour highlight in {rendered:?}"
        );
    }

    #[test]
    fn unfinished_quote_is_highlighted_at_its_start() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "echo \"hi");
        let rendered = term.get_copy_of_buffer_as_string();
        assert!(rendered.contains("\x1b[38;5;178m\""));
    }

    #[test]
    fn enter_emits_the_line_and_resets() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "pwd");
        let event = line_state
            .apply_key(KeyInput::Enter, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(event, Some(ReadlineEvent::Line("pwd".into())));
        assert_eq!(line_state.buffer().text(), "");
        assert_eq!(line_state.old_cursor_loc(), 0);
    }

    #[test]
    fn ctrl_d_is_eof_only_on_an_empty_buffer() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        let event = line_state
            .apply_key(KeyInput::DeleteOrEof, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(event, Some(ReadlineEvent::Eof));

        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "ab");
        line_state
            .apply_key(KeyInput::MoveHome, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        let event = line_state
            .apply_key(KeyInput::DeleteOrEof, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(event, None);
        assert_eq!(line_state.buffer().text(), "b");
    }

    #[test]
    fn ctrl_d_flushes_a_cooked_line_in_command_input_role() {
        let mut line_state = LineState::new(
            String::new(),
            default_cell_width_fn(),
            HintColors::default(),
            EditorRole::CommandInput,
        );
        let mut term = StdoutMock::default();
        let safe_history: SafeHistory = Arc::new(StdMutex::new(History::new()));
        let mut callbacks = EditorCallbacks::default();
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "y");

        let event = line_state
            .apply_key(KeyInput::DeleteOrEof, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(event, Some(ReadlineEvent::Line("y".into())));

        // Enter in this role cooks the terminator into the line.
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "n");
        let event = line_state
            .apply_key(KeyInput::Enter, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(event, Some(ReadlineEvent::Line("n\n".into())));
    }

    #[test]
    fn interrupt_clears_the_line() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "half a comm");
        let event = line_state
            .apply_key(KeyInput::Interrupt, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(event, Some(ReadlineEvent::Interrupted));
        assert_eq!(line_state.buffer().text(), "");
        assert!(term.get_copy_of_buffer_as_string().contains("^C"));
    }

    #[test]
    fn single_candidate_completion_appends_a_space() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        callbacks.completion = Some(Box::new(|_before: &str| Completion {
            site: CompletionSite::Command,
            pattern: "gr".into(),
            pattern_start: 0,
            candidates: vec!["grep".into()],
        }));
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "gr");
        line_state
            .apply_key(KeyInput::Tab, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.buffer().text(), "grep ");
    }

    #[test]
    fn directory_completion_skips_the_trailing_space() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        callbacks.completion = Some(Box::new(|_before: &str| Completion {
            site: CompletionSite::Filename,
            pattern: "do".into(),
            pattern_start: 4,
            candidates: vec!["docs/".into()],
        }));
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "cat do");
        line_state
            .apply_key(KeyInput::Tab, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.buffer().text(), "cat docs/");
    }

    #[test]
    fn ambiguous_completion_inserts_prefix_and_keeps_state() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        callbacks.completion = Some(Box::new(|_before: &str| Completion {
            site: CompletionSite::Filename,
            pattern: "do".into(),
            pattern_start: 4,
            candidates: vec!["doc-a".into(), "doc-b".into()],
        }));
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "cat do");
        let event = line_state
            .apply_key(KeyInput::Tab, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.buffer().text(), "cat doc-");
        assert!(line_state.has_kept_state());
        match event {
            Some(ReadlineEvent::Completion(completion)) => {
                assert_eq!(completion.candidates.len(), 2);
            }
            other => panic!("expected a completion event, got {other:?}"),
        }

        // The kept state survives into the next read.
        line_state.begin_read(&mut term, &mut callbacks).unwrap();
        assert_eq!(line_state.buffer().text(), "cat doc-");
        assert!(!line_state.has_kept_state());
    }

    #[test]
    fn inline_hint_renders_grey_at_end_of_line() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        callbacks.hint = Some(Box::new(|before: &str| {
            before.ends_with("l").then(|| "s -la".to_string())
        }));
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "l");
        let rendered = term.get_copy_of_buffer_as_string();
        assert!(rendered.contains("s -la"));
        // The hint is not part of the buffer.
        assert_eq!(line_state.buffer().text(), "l");
    }

    #[test]
    fn subline_is_drawn_and_cleared() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        callbacks.subline = Some(Box::new(|line: &str| {
            (line == "ls").then(|| "ls --color ".to_string())
        }));
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "ls");
        let rendered = term.get_copy_of_buffer_as_string();
        assert!(rendered.contains("ls --color "));
        // Scroll room was reserved for the subline row before the cursor save.
        assert!(rendered.contains("\x1b[1S"), "expected a scroll-up in {rendered:?}");

        // One more character: the subline callback now declines, the rows clear.
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "x");
        assert_eq!(line_state.shown_subline_rows, 0);

        // Back to `ls`: the subline reappears without scrolling a second time, the
        // row under this prompt is already reserved.
        line_state
            .apply_key(KeyInput::Backspace, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.shown_subline_rows, 1);
        let full = term.get_copy_of_buffer_as_string();
        assert_eq!(full.matches("\x1b[1S").count(), 1);
    }

    #[test]
    fn history_keys_browse_and_escape_restores_the_draft() {
        let (mut line_state, mut term, safe_history, mut callbacks) = editor();
        safe_history.lock().unwrap().add("older");
        safe_history.lock().unwrap().add("newer");
        type_str(&mut line_state, &mut term, &safe_history, &mut callbacks, "draft");

        line_state
            .apply_key(KeyInput::HistoryPrev, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.buffer().text(), "newer");
        line_state
            .apply_key(KeyInput::HistoryPrev, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.buffer().text(), "older");
        line_state
            .apply_key(KeyInput::ResetToCache, &mut term, &safe_history, &mut callbacks)
            .unwrap();
        assert_eq!(line_state.buffer().text(), "draft");
    }
}
