// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The standalone `ivish` binary.
//!
//! With no arguments it runs the interactive loop; with arguments it joins them with
//! single spaces and runs the result as a one-shot subshell, exiting with its code.
//! Since there is no embedding application here, the binary doubles as its own host:
//! commands come from `$PATH`, filenames from the filesystem, and execution spawns
//! real processes on worker threads.

use clap::Parser;
use ivish::{
    CommandHandle, CommandRequest, CommandRunner, CompletionProvider, HostCallbacks,
    RunningCommand, SessionContext, Shell, ShellConfig, StdMutex,
};
use miette::IntoDiagnostic;
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::oneshot;

#[derive(Debug, Parser)]
#[command(name = "ivish", about = "Interactive shell for hosts without a process model")]
pub struct CLIArg {
    /// Log to a file (the display is raw-mode; logs never go there).
    #[arg(long)]
    pub enable_logging: bool,

    /// Where the log file lives when logging is enabled.
    #[arg(long, default_value = "/tmp/ivish.log")]
    pub log_file: PathBuf,

    /// One-shot command line; empty means interactive.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

fn main() -> miette::Result<()> {
    let code = main_impl()?;
    std::process::exit(code);
}

#[tokio::main]
async fn main_impl() -> miette::Result<i32> {
    let cli_arg = CLIArg::parse();

    if cli_arg.enable_logging {
        ivish::tracing_setup::init(tracing_core::LevelFilter::DEBUG, &cli_arg.log_file)?;
        // % is Display, ? is Debug.
        tracing::debug!(message = "ivish starting", cli_arg = ?cli_arg);
    }

    let host = Arc::new(ProcessHost);
    let runner = Arc::new(ProcessRunner);
    let config = ShellConfig::from_env();

    if cli_arg.command.is_empty() {
        let mut shell = Shell::new(runner, host, config);
        return Ok(shell.run().await);
    }

    // One-shot: the arguments joined by single spaces form the command line.
    let command_line = cli_arg.command.join(" ");
    let out: ivish::SafeRawTerminal = Arc::new(StdMutex::new(std::io::stdout()));
    let err: ivish::SafeRawTerminal = Arc::new(StdMutex::new(std::io::stderr()));
    let code = ivish::run_command_line(
        &command_line,
        runner.as_ref(),
        host.as_ref(),
        &config,
        SessionContext { id: u64::from(std::process::id()), depth: 1 },
        out,
        err,
    )
    .await;
    Ok(code)
}

// ── Host: $PATH registry + filesystem completion ─────────────────────────────

struct ProcessHost;

impl CompletionProvider for ProcessHost {
    fn available_commands(&self, prefix: Option<&str>) -> Vec<String> {
        let mut names = vec![];
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        for dir in std::env::split_paths(&path_var) {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if prefix.is_none_or(|p| name.starts_with(p)) {
                    names.push(name);
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }

    fn expand_filenames(&self, pattern: &str) -> Vec<String> {
        let (dir, stem) = match pattern.rsplit_once('/') {
            Some((dir, stem)) => (PathBuf::from(format!("{dir}/")), stem.to_string()),
            None => (PathBuf::from("."), pattern.to_string()),
        };
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return vec![];
        };
        let mut names = vec![];
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&stem) {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let shown = match pattern.rsplit_once('/') {
                Some((dir_part, _)) => format!("{dir_part}/{name}"),
                None => name,
            };
            names.push(if is_dir { format!("{shown}/") } else { shown });
        }
        names.sort();
        names
    }
}

impl HostCallbacks for ProcessHost {
    fn run_ex_command(&self, command: &str) {
        if command == "help" {
            println!(
                "ivish builtins: exit, help, history, alias [name[=value]]…, \
                 unalias [-a] name…"
            );
        }
    }
}

// ── Runner: real processes with pipeline plumbing ────────────────────────────

struct ProcessRunner;

struct ProcessHandle {
    children: Arc<StdMutex<Vec<std::process::Child>>>,
}

impl CommandHandle for ProcessHandle {
    fn interrupt(&self) {
        // No signal delivery without a signal crate; treat interrupt as kill.
        self.cancel();
    }

    fn cancel(&self) {
        for child in self.children.lock().unwrap().iter_mut() {
            let _ = child.kill();
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, request: CommandRequest) -> miette::Result<RunningCommand> {
        let stages = split_stages(&request.command_line);
        if stages.is_empty() {
            return Err(miette::miette!("empty command line"));
        }

        let mut request = request;
        let mut children: Vec<std::process::Child> = vec![];
        let last = stages.len() - 1;
        let mut previous_stdout: Option<std::process::ChildStdout> = None;

        for (idx, argv) in stages.iter().enumerate() {
            // Nested `ivish` stages re-enter through this very binary.
            let mut command = if argv[0] == "ivish" {
                std::process::Command::new(self_path())
            } else {
                std::process::Command::new(&argv[0])
            };
            command.args(&argv[1..]);
            command.env("COLUMNS", request.window_size.0.to_string());
            command.env("LINES", request.window_size.1.to_string());

            command.stdin(match previous_stdout.take() {
                Some(stdout) => std::process::Stdio::from(stdout),
                None => match request.stdio.input.take() {
                    Some(file) => std::process::Stdio::from(file),
                    None => std::process::Stdio::piped(),
                },
            });
            if idx < last {
                command.stdout(std::process::Stdio::piped());
            } else if let Some(file) = request.stdio.output.take() {
                command.stdout(std::process::Stdio::from(file));
            }

            let mut child = command.spawn().into_diagnostic()?;
            if idx < last {
                previous_stdout = child.stdout.take();
            }
            children.push(child);
        }

        // Feed the command-input pipe into the first child's stdin on a worker
        // thread; the channel closing is the EOF.
        if let Some(mut stdin) = children[0].stdin.take() {
            let mut input = request.input;
            std::thread::spawn(move || {
                while let Some(chunk) = input.blocking_recv() {
                    if stdin.write_all(&chunk).is_err() {
                        break;
                    }
                    let _ = stdin.flush();
                }
            });
        }

        let children = Arc::new(StdMutex::new(children));
        let handle = Arc::new(ProcessHandle { children: children.clone() });
        let (exit_sender, exit_receiver) = oneshot::channel();

        // The worker that owns the wait. Polling lets the handle kill mid-wait.
        std::thread::spawn(move || {
            let code = loop {
                let mut guard = children.lock().unwrap();
                let mut all_done = true;
                let mut last_code = 0;
                for child in guard.iter_mut() {
                    match child.try_wait() {
                        Ok(Some(status)) => last_code = status.code().unwrap_or(1),
                        Ok(None) => all_done = false,
                        Err(_) => last_code = 1,
                    }
                }
                drop(guard);
                if all_done {
                    break last_code;
                }
                std::thread::sleep(std::time::Duration::from_millis(20));
            };
            let _ = exit_sender.send(code);
        });

        Ok(RunningCommand { handle, exit_code: exit_receiver })
    }
}

/// Split an assembled command line into pipeline stages of argv vectors.
fn split_stages(command_line: &str) -> Vec<Vec<String>> {
    let scan = ivish::tokenize(command_line);
    let mut stages = vec![];
    let mut lower = 0;
    for delim in &scan.delimiters {
        stages.push(token_contents(&scan, lower, delim.left_tokens.end));
        lower = delim.left_tokens.end;
    }
    stages.push(token_contents(&scan, lower, scan.tokens.len()));
    stages.retain(|stage: &Vec<String>| !stage.is_empty());
    stages
}

fn token_contents(
    scan: &ivish::TokenizeResult,
    lower: usize,
    upper: usize,
) -> Vec<String> {
    scan.tokens[lower..upper]
        .iter()
        .map(|token| token.content.clone())
        .collect()
}

fn self_path() -> PathBuf {
    std::env::current_exe().unwrap_or_else(|_| Path::new("ivish").to_path_buf())
}
