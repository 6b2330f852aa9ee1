// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The contract between the shell and its embedding host.
//!
//! The shell has no process model of its own: the host registers the available
//! commands, expands filenames, and runs each command on a worker it controls. These
//! traits are the dependency-injection seam for all of that, so the whole shell can be
//! driven in tests by fakes.

use crate::shell_impl::{completer::CompletionProvider, interrupt::CommandHandle};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Whether the shell cooks input into lines for the command or forwards raw bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TermMode {
    #[default]
    Line,
    Raw,
}

impl TermMode {
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "line" => Some(TermMode::Line),
            "raw" => Some(TermMode::Raw),
            _ => None,
        }
    }
}

/// Identity of one shell session, threaded through nested `ivish` invocations instead
/// of a back-pointer to the parent shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub id: u64,
    /// 0 for the interactive shell, +1 for each nested subshell.
    pub depth: u32,
}

impl SessionContext {
    #[must_use]
    pub fn nested(&self) -> Self { Self { id: self.id, depth: self.depth + 1 } }
}

/// Lets a running command temporarily flip the terminal mode (a pager spawned from a
/// line-mode tool, say) and restore it afterwards.
#[derive(Debug, Clone)]
pub struct TtyHandle {
    sender: watch::Sender<TermMode>,
    base: TermMode,
}

impl TtyHandle {
    /// Returns the handle plus the receiver the input router watches.
    #[must_use]
    pub fn new(base: TermMode) -> (Self, watch::Receiver<TermMode>) {
        let (sender, receiver) = watch::channel(base);
        (Self { sender, base }, receiver)
    }

    pub fn request(&self, mode: TermMode) { let _ = self.sender.send(mode); }

    pub fn restore(&self) { let _ = self.sender.send(self.base); }
}

/// File redirections for one invocation (`(group) > path` / `(group) < path`).
#[derive(Debug, Default)]
pub struct StdioOverride {
    pub input: Option<std::fs::File>,
    pub output: Option<std::fs::File>,
}

/// Everything the host needs to launch one command.
#[derive(Debug)]
pub struct CommandRequest {
    pub command_line: String,
    pub session: SessionContext,
    /// Terminal geometry from `COLUMNS` / `LINES`, re-read at every launch.
    pub window_size: (u16, u16),
    pub term_mode: TermMode,
    /// The command-input pipe: cooked lines or raw bytes, per the current mode.
    pub input: tokio::sync::mpsc::Receiver<Vec<u8>>,
    pub tty: TtyHandle,
    pub stdio: StdioOverride,
}

/// A launched command: an interrupt target plus the pending exit code.
pub struct RunningCommand {
    pub handle: Arc<dyn CommandHandle>,
    pub exit_code: oneshot::Receiver<i32>,
}

/// Executes command lines on worker threads the host owns. The shell awaits the exit
/// code, which serialises command execution.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Launch `request.command_line`.
    ///
    /// # Errors
    ///
    /// An error here means the command could not be launched at all (the shell logs it
    /// and scores the command as exit 1); failures *of* the command are exit codes.
    async fn run(&self, request: CommandRequest) -> miette::Result<RunningCommand>;
}

/// Host services beyond execution: command enumeration and filename expansion (the
/// [`CompletionProvider`] half) plus the escape hatch into the host's own command
/// system, which backs the `help` built-in.
pub trait HostCallbacks: CompletionProvider {
    fn run_ex_command(&self, command: &str);
}
