// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The interactive shell loop: prompt, read, expand aliases, dispatch, update
//! history, repeat. Also the glue that wires the editor callbacks (hint from
//! history, alias-preview subline, host-backed completion) into [`Readline`].

use crate::{
    default_cell_width_fn,
    public_api::{
        config::ShellConfig,
        host::{CommandRunner, HostCallbacks, SessionContext},
    },
    readline_impl::{
        history::History,
        line_state::{EditorRole, LineState},
        readline::{spawn_stdin_reader_task, Readline, ReadlineError, ReadlineEvent},
    },
    shell_impl::{
        alias::AliasSet,
        command_db::CommandDb,
        completer::{self, Completion},
        dispatcher::{
            report_shell_error, DispatchIo, DispatchOutcome, Dispatcher, ShellError,
        },
        interrupt::InterruptHandler,
    },
    CellWidthFn, SafeAliasSet, SafeHistory, SafeRawTerminal, StdMutex, CHANNEL_CAPACITY,
};
use std::{io::Write, sync::Arc};
use tokio::sync::mpsc;

/// Owns the session state: history, aliases, config, the command database, and the
/// line editor. The dispatcher only ever borrows these.
pub struct Shell {
    readline: Readline,
    aliases: SafeAliasSet,
    safe_history: SafeHistory,
    command_db: CommandDb,
    config: ShellConfig,
    runner: Arc<dyn CommandRunner>,
    host: Arc<dyn HostCallbacks>,
    cell_width: CellWidthFn,
    out: SafeRawTerminal,
    err: SafeRawTerminal,
    installed_interrupt: Option<InterruptHandler>,
    last_exit: i32,
    session_counter: u64,
}

impl Shell {
    /// Interactive shell on the host's stdin/stdout/stderr. Must be called inside a
    /// tokio runtime (it spawns the stdin reader task).
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        host: Arc<dyn HostCallbacks>,
        config: ShellConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let out: SafeRawTerminal = Arc::new(StdMutex::new(std::io::stdout()));
        let err: SafeRawTerminal = Arc::new(StdMutex::new(std::io::stderr()));
        let shell = Self::with_io(runner, host, config, receiver, out, err);
        spawn_stdin_reader_task(sender, &shell.readline.shutdown_sender);
        shell
    }

    /// Dependency-injected variant: the caller supplies the byte channel and the
    /// writers. This is the constructor tests use.
    #[must_use]
    pub fn with_io(
        runner: Arc<dyn CommandRunner>,
        host: Arc<dyn HostCallbacks>,
        config: ShellConfig,
        input_receiver: mpsc::Receiver<Vec<u8>>,
        out: SafeRawTerminal,
        err: SafeRawTerminal,
    ) -> Self {
        let cell_width = default_cell_width_fn();
        let history = match &config.history_file {
            Some(path) => History::load(path, config.history_max),
            None => History::with_max_size(config.history_max),
        };
        let safe_history: SafeHistory = Arc::new(StdMutex::new(history));
        let aliases: SafeAliasSet = Arc::new(StdMutex::new(AliasSet::new()));
        let command_db = CommandDb::load(config.command_db_path.as_deref());

        let line_state = LineState::new(
            config.prompt.clone(),
            cell_width.clone(),
            config.hint_colors,
            EditorRole::AtPrompt,
        );
        let readline =
            Readline::new(line_state, safe_history.clone(), input_receiver, out.clone());

        let mut shell = Self {
            readline,
            aliases,
            safe_history,
            command_db,
            config,
            runner,
            host,
            cell_width,
            out,
            err,
            installed_interrupt: None,
            last_exit: 0,
            session_counter: 0,
        };
        shell.install_editor_callbacks();
        shell
    }

    /// Install the shell's interrupt handler, the target of `handler_func` actions.
    pub fn set_interrupt_handler(&mut self, handler: InterruptHandler) {
        self.installed_interrupt = Some(handler);
    }

    #[must_use]
    pub fn last_exit(&self) -> i32 { self.last_exit }

    /// The interactive loop. Returns the last-observed exit code when the user leaves
    /// via `exit` or `^D` at an empty prompt.
    pub async fn run(&mut self) -> i32 {
        let _raw_guard = RawModeGuard::enable();
        let mut consecutive_io_failures = 0u8;

        loop {
            match self.readline.readline().await {
                Ok(ReadlineEvent::Line(line)) => {
                    consecutive_io_failures = 0;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let expanded = self
                        .aliases
                        .lock()
                        .unwrap()
                        .translate(&line)
                        .unwrap_or_else(|| line.clone());
                    let terminate = self.execute(&expanded).await;
                    self.readline.add_history_entry(&line);
                    if terminate {
                        break;
                    }
                }
                Ok(ReadlineEvent::Eof) => break,
                Ok(ReadlineEvent::Interrupted) => {
                    // The editor already cleared the line; fall through to re-prompt.
                }
                Ok(ReadlineEvent::Completion(completion)) => {
                    self.show_candidates(&completion);
                }
                Err(ReadlineError::Closed) => break,
                Err(ReadlineError::Io(error)) => {
                    // A terminal write failure aborts the current readline, not the
                    // shell. A terminal that stays dead would spin here, so give up
                    // after a few consecutive failures.
                    // % is Display, ? is Debug.
                    tracing::error!(message = "readline aborted", error = %error);
                    consecutive_io_failures += 1;
                    if consecutive_io_failures >= 3 {
                        break;
                    }
                }
            }
        }

        self.shutdown();
        self.last_exit
    }

    /// Dispatch one expanded line; `true` means the `exit` built-in fired.
    async fn execute(&mut self, line: &str) -> bool {
        match self.dispatch_line(line).await {
            Ok(outcome) => {
                if let Some(code) = outcome.exit_code {
                    self.last_exit = code;
                }
                outcome.terminate
            }
            Err(error) => {
                self.report(&error);
                self.last_exit = 1;
                false
            }
        }
    }

    async fn dispatch_line(&mut self, line: &str) -> Result<DispatchOutcome, ShellError> {
        self.session_counter += 1;
        // Lend the shell input receiver to the foreground command's router and take
        // it back afterwards, whatever happened.
        let mut lent_input = self.readline.take_input_receiver();

        let result = {
            let mut dispatcher = Dispatcher {
                aliases: &self.aliases,
                command_db: &self.command_db,
                runner: self.runner.as_ref(),
                host: self.host.as_ref(),
                safe_history: &self.safe_history,
                session: SessionContext { id: self.session_counter, depth: 0 },
                installed_interrupt: self.installed_interrupt.as_ref(),
                cell_width: self.cell_width.clone(),
            };
            let mut io = DispatchIo {
                input: lent_input.as_mut(),
                out: self.out.clone(),
                err: self.err.clone(),
            };
            dispatcher.dispatch(line, &mut io).await
        };

        if let Some(receiver) = lent_input {
            self.readline.restore_input_receiver(receiver);
        }
        result
    }

    /// Errors target stderr, except while a kept line state is pending: then they go
    /// to stdout so the prompt is not visually misplaced under the candidate listing.
    fn report(&self, error: &ShellError) {
        let target =
            if self.readline.has_kept_state() { &self.out } else { &self.err };
        if let Err(write_error) = report_shell_error(target, &error.to_string()) {
            tracing::error!(message = "could not report shell error", error = %write_error);
        }
    }

    fn show_candidates(&self, completion: &Completion) {
        let mut guard = self.out.lock().unwrap();
        let _ = guard.write_all(b"\r\n");
        let _ = guard.write_all(completion.candidates.join("  ").as_bytes());
        let _ = guard.write_all(b"\r\n");
        let _ = guard.flush();
    }

    fn install_editor_callbacks(&mut self) {
        // Alias preview subline: what the line will become after expansion.
        let aliases = self.aliases.clone();
        self.readline.callbacks.subline = Some(Box::new(move |line| {
            if line.is_empty() {
                return None;
            }
            aliases.lock().unwrap().translate(line)
        }));

        // Inline hint: the tail of the most recent history entry with this prefix.
        let history = self.safe_history.clone();
        self.readline.callbacks.hint = Some(Box::new(move |before| {
            if before.trim().is_empty() {
                return None;
            }
            let history = history.lock().unwrap();
            let result = history.iter().rev().find_map(|entry| {
                entry
                    .strip_prefix(before)
                    .filter(|rest| !rest.is_empty())
                    .map(String::from)
            });
            result
        }));

        let host = self.host.clone();
        self.readline.callbacks.completion =
            Some(Box::new(move |before| completer::complete(before, &*host)));
    }

    /// Release everything the loop held: persist history, stop the reader task.
    fn shutdown(&mut self) {
        if let Some(path) = &self.config.history_file {
            if let Err(error) = self.safe_history.lock().unwrap().save(path) {
                // % is Display, ? is Debug.
                tracing::warn!(
                    message = "could not save history",
                    path = %path.display(),
                    error = %error
                );
            }
        }
        self.readline.close();
    }
}

/// Raw mode for the duration of the interactive loop; restored on drop even when the
/// loop unwinds. Fails quietly off-TTY so tests and pipes work.
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        Self { enabled: crossterm::terminal::enable_raw_mode().is_ok() }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = crossterm::terminal::disable_raw_mode();
        }
    }
}
