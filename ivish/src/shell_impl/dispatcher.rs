// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Pipeline / sequence dispatch.
//!
//! A validated line is walked delimiter by delimiter: pipe delimiters accumulate
//! sublines into one pipeline, `;` (or the end of the line) closes a command. Each
//! closed command is resolved (built-in, known host command, or "command not
//! found") and handed to the host's Command Runner as a single string. Pipe stages whose
//! head the host cannot run directly (built-ins, unknown names, `ivish` itself) are
//! wrapped in a nested `ivish …` invocation so every stage is one host-dispatchable
//! entity.
//!
//! While a command runs, the dispatcher borrows the shell's input receiver and routes
//! bytes to the command's stdin according to the terminal mode: `line` cooks input
//! through an editor in command-input role, `raw` forwards bytes immediately. `^C` is
//! translated through the interrupt dispatcher in both modes.

use crate::{
    public_api::{
        config,
        host::{
            CommandRequest, CommandRunner, HostCallbacks, RunningCommand, SessionContext,
            StdioOverride, TermMode, TtyHandle,
        },
    },
    readline_impl::{
        history::History,
        input_decoder::InputDecoder,
        line_state::{EditorCallbacks, EditorRole, HintColors, LineState},
        readline::ReadlineEvent,
    },
    shell_impl::{
        builtins::{self, BuiltinContext, BuiltinOutcome},
        command_db::{CommandDb, PropertyKind},
        interrupt::{CommandHandle, InterruptAction, InterruptDispatcher, InterruptHandler},
        tokenizer::{tokenize, tokenize_limited},
    },
    CellWidthFn, SafeAliasSet, SafeHistory, SafeRawTerminal, StdMutex, CHANNEL_CAPACITY,
};
use crossterm::{
    cursor,
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
    QueueableCommand,
};
use std::{io, sync::Arc};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Line-level failures the shell loop reports in bold red.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unfinished {0}")]
    UnfinishedQuote(char),

    #[error("invalid delimiters {0}")]
    InvalidDelimiters(String),

    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("subshell invocation failed: {0}")]
    Subshell(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result of dispatching one line.
#[derive(Debug, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Exit code of the last executed segment; `None` when nothing ran.
    pub exit_code: Option<i32>,
    /// Set by the `exit` built-in.
    pub terminate: bool,
}

/// I/O surface for one dispatch: the (lent) shell input receiver plus the output and
/// error writers. `out` and `err` are usually the same terminal.
pub struct DispatchIo<'a> {
    pub input: Option<&'a mut mpsc::Receiver<Vec<u8>>>,
    pub out: SafeRawTerminal,
    pub err: SafeRawTerminal,
}

enum CommandStep {
    /// Empty command text (a trailing `;`): nothing ran.
    Skip,
    Ran(i32),
    Terminate,
}

/// Borrows the shell's collaborators for the duration of one dispatch, per the
/// ownership model: the dispatcher owns nothing.
pub struct Dispatcher<'a> {
    pub aliases: &'a SafeAliasSet,
    pub command_db: &'a CommandDb,
    pub runner: &'a dyn CommandRunner,
    pub host: &'a dyn HostCallbacks,
    pub safe_history: &'a SafeHistory,
    pub session: SessionContext,
    pub installed_interrupt: Option<&'a InterruptHandler>,
    pub cell_width: CellWidthFn,
}

impl Dispatcher<'_> {
    /// Validate and execute one (already alias-expanded) command line.
    ///
    /// # Errors
    ///
    /// Tokenizer-level failures (unfinished quote, invalid delimiters) and I/O errors
    /// writing reports. "Command not found" is reported inline, scored 127, and the
    /// walk continues.
    pub async fn dispatch(
        &mut self,
        line: &str,
        io: &mut DispatchIo<'_>,
    ) -> Result<DispatchOutcome, ShellError> {
        let scan = tokenize(line);

        if let Some(escape) = scan.unfinished_escape {
            return Err(ShellError::UnfinishedQuote(escape.kind.open_char()));
        }
        let invalid = scan.invalid_delimiter_indices();
        if !invalid.is_empty() {
            let list = invalid
                .iter()
                .map(|&idx| {
                    let delim = &scan.delimiters[idx];
                    format!("'{}' at {}", delim.kind.literal(), delim.position)
                })
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ShellError::InvalidDelimiters(list));
        }

        let mut last_exit = None;
        let mut terminate = false;
        let mut pending: Vec<(String, Option<&'static str>)> = vec![];

        for (range, closing) in scan.segment_bounds() {
            let subline = scan.line[range].trim().to_string();
            let closing_kind = closing.map(|idx| scan.delimiters[idx].kind);
            match closing_kind {
                Some(kind) if kind.is_pipe() => {
                    pending.push((subline, Some(kind.literal())));
                }
                _ => {
                    pending.push((subline, None));
                    let step =
                        self.run_command(std::mem::take(&mut pending), io).await?;
                    match step {
                        CommandStep::Skip => {}
                        CommandStep::Ran(code) => last_exit = Some(code),
                        CommandStep::Terminate => {
                            terminate = true;
                            break;
                        }
                    }
                }
            }
        }

        Ok(DispatchOutcome { exit_code: last_exit, terminate })
    }

    async fn run_command(
        &mut self,
        sublines: Vec<(String, Option<&'static str>)>,
        io: &mut DispatchIo<'_>,
    ) -> Result<CommandStep, ShellError> {
        let full_text = join_sublines(&sublines);
        if full_text.is_empty() {
            return Ok(CommandStep::Skip);
        }

        // A parenthesised group with an optional single trailing redirect runs as a
        // subshell with that stream reassigned. This is checked on the reassembled
        // command, since the delimiter walk splits right through a group's pipes.
        if let Some((inner, redirect)) = parse_group_redirect(&full_text) {
            let mut stdio = StdioOverride::default();
            if let Some((kind, path)) = redirect {
                match kind.open(&path) {
                    Ok(file) => kind.assign(&mut stdio, file),
                    Err(error) => {
                        report_shell_error(
                            &io.err,
                            &format!("cannot open {path}: {error}"),
                        )?;
                        return Ok(CommandStep::Ran(1));
                    }
                }
            }
            let inner_scan = tokenize(&inner);
            let head = inner_scan
                .tokens
                .first()
                .map(|t| t.content.clone())
                .unwrap_or_default();
            let runs_directly = inner_scan.delimiters.is_empty()
                && !head.is_empty()
                && !builtins::is_builtin(&head)
                && head != "ivish"
                && self.host_knows(&head);
            let command_line =
                if runs_directly { inner } else { format!("ivish {inner}") };
            let code = self.run_external(&command_line, stdio, io).await;
            return Ok(CommandStep::Ran(code));
        }

        if sublines.len() > 1 {
            let mut assembled = String::new();
            for (subline, literal) in &sublines {
                assembled.push_str(&self.wrap_stage_if_needed(subline));
                if let Some(literal) = literal {
                    assembled.push(' ');
                    assembled.push_str(literal);
                    assembled.push(' ');
                }
            }
            let code = self
                .run_external(&assembled, StdioOverride::default(), io)
                .await;
            return Ok(CommandStep::Ran(code));
        }

        let scan = tokenize(&full_text);
        let Some(head_token) = scan.tokens.first() else {
            return Ok(CommandStep::Skip);
        };
        let head = head_token.content.clone();

        if builtins::is_builtin(&head) {
            let args: Vec<String> =
                scan.tokens[1..].iter().map(|t| t.content.clone()).collect();
            return self.run_builtin_command(&head, &args, io);
        }

        if !self.is_known(&head) {
            let error = ShellError::CommandNotFound(head);
            report_shell_error(&io.err, &error.to_string())?;
            return Ok(CommandStep::Ran(127));
        }

        let code = self
            .run_external(&full_text, StdioOverride::default(), io)
            .await;
        Ok(CommandStep::Ran(code))
    }

    fn run_builtin_command(
        &mut self,
        name: &str,
        args: &[String],
        io: &mut DispatchIo<'_>,
    ) -> Result<CommandStep, ShellError> {
        // Built-ins write to buffers first: out and err may be the same terminal.
        let mut out_buf: Vec<u8> = vec![];
        let mut err_buf: Vec<u8> = vec![];
        let outcome = {
            let mut ctx = BuiltinContext {
                aliases: self.aliases,
                safe_history: self.safe_history,
                host: self.host,
                out: &mut out_buf,
                err: &mut err_buf,
            };
            builtins::run_builtin(name, args, &mut ctx)
        };
        write_cooked(&io.out, &out_buf)?;
        write_cooked(&io.err, &err_buf)?;
        match outcome {
            Ok(BuiltinOutcome::Exit) => Ok(CommandStep::Terminate),
            Ok(BuiltinOutcome::Handled(code)) => Ok(CommandStep::Ran(code)),
            Err(error) => {
                // % is Display, ? is Debug.
                tracing::error!(message = "builtin failed", name = %name, error = %error);
                Ok(CommandStep::Ran(1))
            }
        }
    }

    /// A pipe stage must be a single host-dispatchable entity; anything the host
    /// cannot run directly re-enters through a nested `ivish` invocation.
    fn wrap_stage_if_needed(&self, subline: &str) -> String {
        let head = tokenize_limited(subline, 1)
            .tokens
            .first()
            .map(|t| t.content.clone())
            .unwrap_or_default();
        if head.is_empty() {
            return subline.to_string();
        }
        if builtins::is_builtin(&head) || head == "ivish" || !self.host_knows(&head) {
            format!("ivish {subline}")
        } else {
            subline.to_string()
        }
    }

    fn host_knows(&self, name: &str) -> bool {
        self.host
            .available_commands(Some(name))
            .iter()
            .any(|command| command == name)
    }

    fn is_known(&self, name: &str) -> bool {
        builtins::is_builtin(name)
            || name == "ivish"
            || self.host_knows(name)
            || self.aliases.lock().unwrap().contains(name)
    }

    async fn run_external(
        &mut self,
        command_line: &str,
        stdio: StdioOverride,
        io: &mut DispatchIo<'_>,
    ) -> i32 {
        let head = tokenize_limited(command_line, 1)
            .tokens
            .first()
            .map(|t| t.content.clone())
            .unwrap_or_default();
        let term_mode = self
            .command_db
            .property(PropertyKind::TermMode, &head)
            .and_then(TermMode::parse)
            .unwrap_or_default();
        let (tty, mode_receiver) = TtyHandle::new(term_mode);
        let (stdin_sender, stdin_receiver) = mpsc::channel(CHANNEL_CAPACITY);

        // A nested `ivish` invocation carries this session's context, one level down.
        let session =
            if head == "ivish" { self.session.nested() } else { self.session };
        let request = CommandRequest {
            command_line: command_line.to_string(),
            session,
            window_size: config::window_size_from_env(),
            term_mode,
            input: stdin_receiver,
            tty,
            stdio,
        };

        // % is Display, ? is Debug.
        tracing::debug!(
            message = "launching command",
            command_line = %command_line,
            session_id = %self.session.id,
            mode = ?term_mode
        );

        let running = match self.runner.run(request).await {
            Ok(running) => running,
            Err(report) => {
                tracing::error!(message = "command failed to launch", error = ?report);
                if head == "ivish" {
                    let error = ShellError::Subshell(report.to_string());
                    let _ = report_shell_error(&io.err, &error.to_string());
                }
                return 1;
            }
        };

        let code = self
            .route_until_exit(&head, running, stdin_sender, &mode_receiver, io)
            .await;
        tracing::debug!(message = "command returned", command_line = %command_line, code = %code);
        code
    }

    /// Await the exit code while forwarding shell input to the command per the
    /// current terminal mode.
    async fn route_until_exit(
        &self,
        command: &str,
        running: RunningCommand,
        stdin_sender: mpsc::Sender<Vec<u8>>,
        mode_receiver: &watch::Receiver<TermMode>,
        io: &mut DispatchIo<'_>,
    ) -> i32 {
        let mut exit_receiver = running.exit_code;
        let handle = running.handle;
        let mut stdin_sender = Some(stdin_sender);
        let mut cooker = InputCooker::new(self.cell_width.clone());

        loop {
            let Some(input) = io.input.as_deref_mut() else {
                break;
            };
            let mut input_closed = false;
            tokio::select! {
                // Exit is checked first, so a command that has already returned does
                // not steal typeahead meant for the next prompt.
                biased;
                exit = &mut exit_receiver => {
                    return exit.unwrap_or(1);
                }
                maybe_chunk = input.recv() => {
                    match maybe_chunk {
                        // Reader is gone (host stdin closed); just await the command.
                        None => input_closed = true,
                        Some(chunk) => match *mode_receiver.borrow() {
                            TermMode::Raw => {
                                self.route_raw(
                                    &chunk,
                                    command,
                                    &handle,
                                    &mut stdin_sender,
                                )
                                .await;
                            }
                            TermMode::Line => {
                                let events = cooker.cook(&chunk, &io.out);
                                self.apply_cooked_events(
                                    events,
                                    command,
                                    &handle,
                                    &mut stdin_sender,
                                )
                                .await;
                            }
                        },
                    }
                }
            }
            if input_closed {
                io.input = None;
            }
        }
        exit_receiver.await.unwrap_or(1)
    }

    /// Raw mode: every byte is forwarded immediately, except `^C`, which is always
    /// translated through the interrupt dispatcher, and `^D`, which closes the
    /// command's input when its configured action is `end_of_file`.
    async fn route_raw(
        &self,
        chunk: &[u8],
        command: &str,
        handle: &Arc<dyn CommandHandle>,
        stdin_sender: &mut Option<mpsc::Sender<Vec<u8>>>,
    ) {
        let eof_on_ctrl_d = matches!(
            InterruptDispatcher::new(self.command_db).action_for(command),
            Some(InterruptAction::EndOfFile)
        );
        let mut start = 0;
        for (idx, byte) in chunk.iter().enumerate() {
            match byte {
                0x03 => {
                    forward(stdin_sender, &chunk[start..idx]).await;
                    self.deliver_interrupt(command, handle, stdin_sender).await;
                    start = idx + 1;
                }
                0x04 if eof_on_ctrl_d => {
                    forward(stdin_sender, &chunk[start..idx]).await;
                    *stdin_sender = None;
                    start = idx + 1;
                }
                _ => {}
            }
        }
        forward(stdin_sender, &chunk[start..]).await;
    }

    async fn apply_cooked_events(
        &self,
        events: Vec<ReadlineEvent>,
        command: &str,
        handle: &Arc<dyn CommandHandle>,
        stdin_sender: &mut Option<mpsc::Sender<Vec<u8>>>,
    ) {
        for event in events {
            match event {
                ReadlineEvent::Line(text) => {
                    forward(stdin_sender, text.as_bytes()).await;
                }
                ReadlineEvent::Eof => {
                    // Closing the channel is the EOF.
                    *stdin_sender = None;
                }
                ReadlineEvent::Interrupted => {
                    self.deliver_interrupt(command, handle, stdin_sender).await;
                }
                ReadlineEvent::Completion(_) => {}
            }
        }
    }

    async fn deliver_interrupt(
        &self,
        command: &str,
        handle: &Arc<dyn CommandHandle>,
        stdin_sender: &mut Option<mpsc::Sender<Vec<u8>>>,
    ) {
        let mut pending_write: Vec<u8> = vec![];
        let mut eof = false;
        InterruptDispatcher::new(self.command_db).dispatch(
            command,
            handle.as_ref(),
            &mut |bytes| pending_write.extend_from_slice(bytes),
            &mut || eof = true,
            self.installed_interrupt,
        );
        if !pending_write.is_empty() {
            forward(stdin_sender, &pending_write).await;
        }
        if eof {
            *stdin_sender = None;
        }
    }
}

fn join_sublines(sublines: &[(String, Option<&'static str>)]) -> String {
    let mut text = String::new();
    for (subline, literal) in sublines {
        text.push_str(subline);
        if let Some(literal) = literal {
            text.push(' ');
            text.push_str(literal);
            text.push(' ');
        }
    }
    text.trim().to_string()
}

async fn forward(stdin_sender: &mut Option<mpsc::Sender<Vec<u8>>>, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    if let Some(sender) = stdin_sender {
        // The command may have exited already; that is not our problem here.
        let _ = sender.send(bytes.to_vec()).await;
    }
}

/// Line-mode input cooking: a private editor in command-input role that echoes to the
/// shell's terminal and yields completed lines.
struct InputCooker {
    decoder: InputDecoder,
    line_state: LineState,
    history: SafeHistory,
    callbacks: EditorCallbacks,
}

impl InputCooker {
    fn new(cell_width: CellWidthFn) -> Self {
        Self {
            decoder: InputDecoder::new(),
            line_state: LineState::new(
                String::new(),
                cell_width,
                HintColors::default(),
                EditorRole::CommandInput,
            ),
            history: Arc::new(StdMutex::new(History::new())),
            callbacks: EditorCallbacks::default(),
        }
    }

    fn cook(&mut self, chunk: &[u8], term: &SafeRawTerminal) -> Vec<ReadlineEvent> {
        let mut events = vec![];
        for key in self.decoder.feed(chunk) {
            let mut guard = term.lock().unwrap();
            match self.line_state.apply_key(
                key,
                &mut *guard,
                &self.history,
                &mut self.callbacks,
            ) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(error) => {
                    // % is Display, ? is Debug.
                    tracing::warn!(message = "command input echo failed", error = %error);
                }
            }
        }
        events
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectKind {
    Out,
    In,
}

impl RedirectKind {
    fn open(self, path: &str) -> io::Result<std::fs::File> {
        match self {
            RedirectKind::Out => std::fs::File::create(path),
            RedirectKind::In => std::fs::File::open(path),
        }
    }

    fn assign(self, stdio: &mut StdioOverride, file: std::fs::File) {
        match self {
            RedirectKind::Out => stdio.output = Some(file),
            RedirectKind::In => stdio.input = Some(file),
        }
    }
}

/// `(group)` optionally followed by one trailing `> path` or `< path`.
fn parse_group_redirect(text: &str) -> Option<(String, Option<(RedirectKind, String)>)> {
    let trimmed = text.trim();
    if !trimmed.starts_with('(') {
        return None;
    }
    let close = trimmed.rfind(')')?;
    let inner = trimmed[1..close].trim().to_string();
    let after = trimmed[close + 1..].trim();

    let redirect = if after.is_empty() {
        None
    } else if let Some(path) = after.strip_prefix('>') {
        Some((RedirectKind::Out, path.trim().to_string()))
    } else if let Some(path) = after.strip_prefix('<') {
        Some((RedirectKind::In, path.trim().to_string()))
    } else {
        return None;
    };
    Some((inner, redirect))
}

/// Bold red line on the error stream, newline-cooked for a raw-mode terminal.
///
/// # Errors
///
/// Returns an error if writing to the terminal fails.
///
/// # Panics
///
/// Panics if the terminal mutex is poisoned.
pub fn report_shell_error(term: &SafeRawTerminal, message: &str) -> io::Result<()> {
    let mut guard = term.lock().unwrap();
    guard.queue(SetAttribute(Attribute::Bold))?;
    guard.queue(SetForegroundColor(Color::Red))?;
    guard.write_all(message.as_bytes())?;
    guard.queue(ResetColor)?;
    guard.queue(SetAttribute(Attribute::Reset))?;
    guard.write_all(b"\r\n")?;
    guard.flush()
}

/// Write program output so `\n` also acts as a carriage return under raw mode.
///
/// # Errors
///
/// Returns an error if writing to the terminal fails.
///
/// # Panics
///
/// Panics if the terminal mutex is poisoned.
pub fn write_cooked(term: &SafeRawTerminal, bytes: &[u8]) -> io::Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    let mut guard = term.lock().unwrap();
    for line in bytes.split_inclusive(|byte| *byte == b'\n') {
        guard.write_all(line)?;
        if line.ends_with(b"\n") {
            guard.queue(cursor::MoveToColumn(0))?;
        }
    }
    guard.flush()
}
