// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Delivery of `^C` to the foreground command.
//!
//! Each command can configure, through the command database, what an interrupt means
//! to it: a signal on its worker thread, outright cancellation, an EOF on its input,
//! or a call into the shell's installed interrupt handler. Hosts without POSIX
//! signals implement [`CommandHandle`] with whatever cancellation primitive they have.

use crate::shell_impl::command_db::{CommandDb, PropertyKind};

/// Parsed value of the `intaction` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    ThreadKill,
    ThreadCancel,
    EndOfFile,
    HandlerFunc,
    /// Like [`Self::HandlerFunc`], followed by a newline on the command's input.
    HandlerFuncNl,
}

impl InterruptAction {
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "thread_kill" => Some(InterruptAction::ThreadKill),
            "thread_cancel" => Some(InterruptAction::ThreadCancel),
            "end_of_file" => Some(InterruptAction::EndOfFile),
            "handler_func" => Some(InterruptAction::HandlerFunc),
            "handler_func_nl" => Some(InterruptAction::HandlerFuncNl),
            _ => None,
        }
    }
}

/// Host-provided handle onto the worker running the foreground command.
pub trait CommandHandle: Send + Sync {
    /// Deliver SIGINT (or the host's nearest equivalent) to the worker thread.
    fn interrupt(&self);
    /// Cancel the worker outright.
    fn cancel(&self);
}

/// The shell's installed interrupt handler, used by `handler_func` actions and as the
/// first fallback when a command has no `intaction` entry.
pub type InterruptHandler = Box<dyn Fn() + Send + Sync>;

/// Selects and executes the interrupt semantics for one running command.
pub struct InterruptDispatcher<'a> {
    db: &'a CommandDb,
}

impl<'a> InterruptDispatcher<'a> {
    #[must_use]
    pub fn new(db: &'a CommandDb) -> Self { Self { db } }

    #[must_use]
    pub fn action_for(&self, command: &str) -> Option<InterruptAction> {
        self.db
            .property(PropertyKind::IntAction, command)
            .and_then(InterruptAction::parse)
    }

    /// Dispatch one `^C` aimed at `command`.
    ///
    /// `write_input` writes bytes to the command's stdin; `deliver_eof` closes it the
    /// way an EOF would. With no configured or recognised action the installed handler
    /// runs if there is one, else the worker is cancelled.
    pub fn dispatch(
        &self,
        command: &str,
        handle: &dyn CommandHandle,
        write_input: &mut dyn FnMut(&[u8]),
        deliver_eof: &mut dyn FnMut(),
        installed_handler: Option<&InterruptHandler>,
    ) {
        let action = self.action_for(command);
        // % is Display, ? is Debug.
        tracing::debug!(message = "dispatching interrupt", command = %command, action = ?action);

        match action {
            Some(InterruptAction::ThreadKill) => handle.interrupt(),
            Some(InterruptAction::ThreadCancel) => handle.cancel(),
            Some(InterruptAction::EndOfFile) => deliver_eof(),
            Some(InterruptAction::HandlerFunc) => {
                if let Some(handler) = installed_handler {
                    handler();
                }
            }
            Some(InterruptAction::HandlerFuncNl) => {
                if let Some(handler) = installed_handler {
                    handler();
                }
                write_input(b"\n");
            }
            None => match installed_handler {
                Some(handler) => handler(),
                None => handle.cancel(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingHandle {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl CommandHandle for RecordingHandle {
        fn interrupt(&self) { self.calls.lock().unwrap().push("interrupt"); }
        fn cancel(&self) { self.calls.lock().unwrap().push("cancel"); }
    }

    fn db() -> CommandDb {
        CommandDb::from_json(
            r#"{
                "less": { "intaction": "end_of_file" },
                "vim":  { "intaction": "thread_kill" },
                "repl": { "intaction": "handler_func_nl" },
                "odd":  { "intaction": "self_destruct" }
            }"#,
        )
        .unwrap()
    }

    struct Run {
        handle_calls: Arc<Mutex<Vec<&'static str>>>,
        written: Vec<u8>,
        eof_count: usize,
    }

    fn dispatch(command: &str, installed: Option<InterruptHandler>) -> Run {
        let db = db();
        let dispatcher = InterruptDispatcher::new(&db);
        let handle = RecordingHandle::default();
        let handle_calls = handle.calls.clone();
        let mut written = Vec::new();
        let mut eof_count = 0;
        dispatcher.dispatch(
            command,
            &handle,
            &mut |bytes| written.extend_from_slice(bytes),
            &mut || eof_count += 1,
            installed.as_ref(),
        );
        Run { handle_calls, written, eof_count }
    }

    #[test]
    fn end_of_file_action_delivers_eof_only() {
        let run = dispatch("less", None);
        assert_eq!(run.eof_count, 1);
        assert_eq!(run.written, Vec::<u8>::new());
        assert_eq!(run.handle_calls.lock().unwrap().len(), 0);
    }

    #[test]
    fn thread_kill_interrupts_the_worker() {
        let run = dispatch("vim", None);
        assert_eq!(*run.handle_calls.lock().unwrap(), vec!["interrupt"]);
    }

    #[test]
    fn handler_func_nl_runs_handler_then_writes_newline() {
        let fired = Arc::new(Mutex::new(0));
        let fired_in_handler = fired.clone();
        let handler: InterruptHandler =
            Box::new(move || *fired_in_handler.lock().unwrap() += 1);
        let run = dispatch("repl", Some(handler));
        assert_eq!(*fired.lock().unwrap(), 1);
        assert_eq!(run.written, b"\n");
    }

    #[test]
    fn unrecognised_action_falls_back_to_handler_then_cancel() {
        let run = dispatch("odd", None);
        assert_eq!(*run.handle_calls.lock().unwrap(), vec!["cancel"]);

        let fired = Arc::new(Mutex::new(0));
        let fired_in_handler = fired.clone();
        let handler: InterruptHandler =
            Box::new(move || *fired_in_handler.lock().unwrap() += 1);
        let run = dispatch("unknown-cmd", Some(handler));
        assert_eq!(*fired.lock().unwrap(), 1);
        assert_eq!(run.handle_calls.lock().unwrap().len(), 0);
    }
}
