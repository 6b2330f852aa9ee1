// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Non-interactive entry point: run one command line as a subshell and return its
//! exit code. This is both what `ivish <args…>` does and the path a host uses to
//! embed the shell without the interactive loop (streams and runner supplied, exit
//! code back).

use crate::{
    public_api::{
        config::ShellConfig,
        host::{CommandRunner, HostCallbacks, SessionContext},
    },
    shell_impl::{
        alias::AliasSet,
        command_db::CommandDb,
        dispatcher::{report_shell_error, DispatchIo, Dispatcher},
    },
    default_cell_width_fn, SafeAliasSet, SafeHistory, SafeRawTerminal, StdMutex,
};
use std::sync::Arc;

/// Run `command_line` once against the given writers. Interactive input routing is
/// not wired: a one-shot subshell's commands read whatever stdin the host gave them.
pub async fn run_command_line(
    command_line: &str,
    runner: &dyn CommandRunner,
    host: &dyn HostCallbacks,
    config: &ShellConfig,
    session: SessionContext,
    out: SafeRawTerminal,
    err: SafeRawTerminal,
) -> i32 {
    let aliases: SafeAliasSet = Arc::new(StdMutex::new(AliasSet::new()));
    let safe_history: SafeHistory =
        Arc::new(StdMutex::new(crate::readline_impl::history::History::new()));
    let command_db = CommandDb::load(config.command_db_path.as_deref());

    let expanded = aliases
        .lock()
        .unwrap()
        .translate(command_line)
        .unwrap_or_else(|| command_line.to_string());

    let mut dispatcher = Dispatcher {
        aliases: &aliases,
        command_db: &command_db,
        runner,
        host,
        safe_history: &safe_history,
        session,
        installed_interrupt: None,
        cell_width: default_cell_width_fn(),
    };
    let mut io = DispatchIo { input: None, out, err: err.clone() };

    match dispatcher.dispatch(&expanded, &mut io).await {
        Ok(outcome) => outcome.exit_code.unwrap_or(0),
        Err(error) => {
            if let Err(write_error) = report_shell_error(&err, &error.to_string()) {
                // % is Display, ? is Debug.
                tracing::error!(message = "could not report error", error = %write_error);
            }
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        public_api::host::{CommandRequest, RunningCommand},
        shell_impl::{completer::CompletionProvider, interrupt::CommandHandle},
        test_fixtures::StdoutMock,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::oneshot;

    struct Host;

    impl CompletionProvider for Host {
        fn available_commands(&self, _prefix: Option<&str>) -> Vec<String> {
            vec!["echo".into()]
        }

        fn expand_filenames(&self, _pattern: &str) -> Vec<String> { vec![] }
    }

    impl HostCallbacks for Host {
        fn run_ex_command(&self, _command: &str) {}
    }

    struct NullHandle;

    impl CommandHandle for NullHandle {
        fn interrupt(&self) {}
        fn cancel(&self) {}
    }

    struct OkRunner;

    #[async_trait]
    impl CommandRunner for OkRunner {
        async fn run(&self, _request: CommandRequest) -> miette::Result<RunningCommand> {
            let (sender, receiver) = oneshot::channel();
            let _ = sender.send(0);
            Ok(RunningCommand { handle: Arc::new(NullHandle), exit_code: receiver })
        }
    }

    #[tokio::test]
    async fn one_shot_returns_the_exit_code() {
        let term: SafeRawTerminal = Arc::new(StdMutex::new(StdoutMock::default()));
        let code = run_command_line(
            "echo hello",
            &OkRunner,
            &Host,
            &ShellConfig::default(),
            SessionContext { id: 1, depth: 1 },
            term.clone(),
            term,
        )
        .await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn one_shot_not_found_is_127() {
        let out = StdoutMock::default();
        let term: SafeRawTerminal = Arc::new(StdMutex::new(out.clone()));
        let code = run_command_line(
            "missing-command",
            &OkRunner,
            &Host,
            &ShellConfig::default(),
            SessionContext { id: 1, depth: 1 },
            term.clone(),
            term,
        )
        .await;
        assert_eq!(code, 127);
        assert!(out
            .get_copy_of_buffer_as_string()
            .contains("missing-command: command not found"));
    }
}
