// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Async line reading over host-supplied descriptors.
//!
//! [`Readline`] ties the pieces together: a reader task pushes raw byte chunks into an
//! mpsc channel, the [`InputDecoder`] turns them into typed keys, [`LineState`]
//! applies them to the edit buffer and repaints, and complete results surface as
//! [`ReadlineEvent`]s. Dependency injection mirrors the rest of the crate: the
//! terminal is `dyn Write` behind a mutex and the input side is a plain channel, so
//! tests drive the whole loop without a TTY.

use crate::{
    readline_impl::{
        input_decoder::{InputDecoder, KeyInput},
        line_state::{EditorCallbacks, LineState},
    },
    shell_impl::completer::Completion,
    SafeHistory, SafeRawTerminal,
};
use std::{collections::VecDeque, io};
use thiserror::Error;
use tokio::{
    io::AsyncReadExt,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

/// Error returned from [`Readline::readline`]. Such errors generally require specific
/// procedures to recover from.
#[derive(Debug, Error)]
pub enum ReadlineError {
    /// An internal I/O error occurred.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// `readline()` was called after the input channel was closed.
    #[error("input byte channel closed")]
    Closed,
}

/// Events emitted by [`Readline::readline`].
#[derive(Debug, PartialEq)]
pub enum ReadlineEvent {
    /// The user completed a line: Enter, or `^D` flushing a non-empty buffer in
    /// command-input role (the latter carries no terminator; an Enter in that role
    /// cooks the `\n` into the text).
    Line(String),

    /// `^D` on an empty buffer.
    Eof,

    /// `^C`.
    Interrupted,

    /// Ambiguous Tab: the shell should list the candidates and call
    /// [`Readline::readline`] again; the kept line state is restored automatically.
    Completion(Completion),
}

pub struct Readline {
    pub line_state: LineState,
    pub safe_history: SafeHistory,
    pub callbacks: EditorCallbacks,
    decoder: InputDecoder,
    /// Byte chunks from the reader task. Absent while the dispatcher has lent it to a
    /// running command's input router.
    input_receiver: Option<mpsc::Receiver<Vec<u8>>>,
    /// Keys decoded but not yet applied (an event can surface mid-chunk).
    pending_keys: VecDeque<KeyInput>,
    safe_raw_terminal: SafeRawTerminal,
    /// Stops the reader task and any in-flight [`Readline::readline`].
    pub shutdown_sender: broadcast::Sender<bool>,
}

impl Readline {
    #[must_use]
    pub fn new(
        line_state: LineState,
        safe_history: SafeHistory,
        input_receiver: mpsc::Receiver<Vec<u8>>,
        safe_raw_terminal: SafeRawTerminal,
    ) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            line_state,
            safe_history,
            callbacks: EditorCallbacks::default(),
            decoder: InputDecoder::new(),
            input_receiver: Some(input_receiver),
            pending_keys: VecDeque::new(),
            safe_raw_terminal,
            shutdown_sender,
        }
    }

    /// Read one line (or other event) from the user.
    ///
    /// # Errors
    ///
    /// [`ReadlineError::Io`] when a terminal write fails; [`ReadlineError::Closed`]
    /// when the input channel is gone.
    ///
    /// # Panics
    ///
    /// Panics if the terminal mutex is poisoned.
    pub async fn readline(&mut self) -> Result<ReadlineEvent, ReadlineError> {
        {
            let mut guard = self.safe_raw_terminal.lock().unwrap();
            self.line_state.begin_read(&mut *guard, &mut self.callbacks)?;
        }

        // Keys left over from the chunk that produced the previous event.
        if let Some(event) = self.drain_pending()? {
            return Ok(event);
        }

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        loop {
            let maybe_chunk = {
                let receiver =
                    self.input_receiver.as_mut().ok_or(ReadlineError::Closed)?;
                tokio::select! {
                    chunk = receiver.recv() => chunk,
                    _ = shutdown_receiver.recv() => {
                        return Ok(ReadlineEvent::Eof);
                    }
                }
            };
            let Some(chunk) = maybe_chunk else {
                return Err(ReadlineError::Closed);
            };
            let keys = self.decoder.feed(&chunk);
            self.pending_keys.extend(keys);
            if let Some(event) = self.drain_pending()? {
                return Ok(event);
            }
        }
    }

    /// Lend the shell input receiver to a running command's input router.
    pub fn take_input_receiver(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.input_receiver.take()
    }

    /// Give the shell input receiver back once the command has returned.
    pub fn restore_input_receiver(&mut self, receiver: mpsc::Receiver<Vec<u8>>) {
        self.input_receiver = Some(receiver);
    }

    fn drain_pending(&mut self) -> Result<Option<ReadlineEvent>, ReadlineError> {
        while let Some(key) = self.pending_keys.pop_front() {
            let mut guard = self.safe_raw_terminal.lock().unwrap();
            let maybe_event = self.line_state.apply_key(
                key,
                &mut *guard,
                &self.safe_history,
                &mut self.callbacks,
            )?;
            if let Some(event) = maybe_event {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Record an accepted line in the history.
    ///
    /// # Panics
    ///
    /// Panics if the history mutex is poisoned.
    pub fn add_history_entry(&mut self, line: &str) {
        self.safe_history.lock().unwrap().add(line);
    }

    /// `true` while a completion event is pending re-entry, which is when prompts and
    /// banners must route to stdout.
    #[must_use]
    pub fn has_kept_state(&self) -> bool { self.line_state.has_kept_state() }

    /// Stop the reader task and unblock any in-flight read.
    pub fn close(&self) { let _ = self.shutdown_sender.send(true); }
}

/// Spawn the reader task: it blocks on the host's stdin descriptor and forwards byte
/// chunks until EOF, error, or shutdown.
pub fn spawn_stdin_reader_task(
    sender: mpsc::Sender<Vec<u8>>,
    shutdown_sender: &broadcast::Sender<bool>,
) -> JoinHandle<()> {
    let mut shutdown_receiver = shutdown_sender.subscribe();
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            tokio::select! {
                read = stdin.read(&mut buf) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(count) => {
                        if sender.send(buf[..count].to_vec()).await.is_err() {
                            break;
                        }
                    }
                },
                _ = shutdown_receiver.recv() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        default_cell_width_fn,
        readline_impl::{
            history::History,
            line_state::{EditorRole, HintColors},
        },
        test_fixtures::StdoutMock,
        StdMutex, CHANNEL_CAPACITY,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn readline_under_test() -> (Readline, mpsc::Sender<Vec<u8>>, StdoutMock) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let stdout_mock = StdoutMock::default();
        let safe_raw_terminal: SafeRawTerminal =
            Arc::new(StdMutex::new(stdout_mock.clone()));
        let line_state = LineState::new(
            "$ ".into(),
            default_cell_width_fn(),
            HintColors::default(),
            EditorRole::AtPrompt,
        );
        let safe_history: SafeHistory = Arc::new(StdMutex::new(History::new()));
        let readline = Readline::new(line_state, safe_history, receiver, safe_raw_terminal);
        (readline, sender, stdout_mock)
    }

    #[tokio::test]
    async fn a_typed_line_surfaces_as_a_line_event() {
        let (mut readline, sender, stdout_mock) = readline_under_test();
        sender.send(b"pwd\r".to_vec()).await.unwrap();
        let event = readline.readline().await.unwrap();
        assert_eq!(event, ReadlineEvent::Line("pwd".into()));
        let rendered =
            strip_ansi_escapes::strip_str(stdout_mock.get_copy_of_buffer_as_string());
        assert!(rendered.starts_with("$ "));
    }

    #[tokio::test]
    async fn keys_after_the_event_are_kept_for_the_next_read() {
        let (mut readline, sender, _stdout_mock) = readline_under_test();
        sender.send(b"a\rb\r".to_vec()).await.unwrap();
        assert_eq!(readline.readline().await.unwrap(), ReadlineEvent::Line("a".into()));
        assert_eq!(readline.readline().await.unwrap(), ReadlineEvent::Line("b".into()));
    }

    #[tokio::test]
    async fn ctrl_c_surfaces_as_interrupted() {
        let (mut readline, sender, _stdout_mock) = readline_under_test();
        sender.send(b"doomed\x03".to_vec()).await.unwrap();
        assert_eq!(readline.readline().await.unwrap(), ReadlineEvent::Interrupted);
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let (mut readline, sender, _stdout_mock) = readline_under_test();
        drop(sender);
        assert!(matches!(
            readline.readline().await,
            Err(ReadlineError::Closed)
        ));
    }

    #[tokio::test]
    async fn history_arrows_recall_previous_lines() {
        let (mut readline, sender, _stdout_mock) = readline_under_test();
        sender.send(b"first\r".to_vec()).await.unwrap();
        let event = readline.readline().await.unwrap();
        if let ReadlineEvent::Line(line) = &event {
            readline.add_history_entry(line);
        }
        sender.send(b"\x1b[A\r".to_vec()).await.unwrap();
        assert_eq!(
            readline.readline().await.unwrap(),
            ReadlineEvent::Line("first".into())
        );
    }
}
