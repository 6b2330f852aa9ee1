// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! `ivish` is an interactive shell designed to be embedded inside a host application
//! that has no real POSIX process model (a sandboxed editor, say). The host registers
//! the available commands and runs each one on a worker it owns; this crate layers the
//! interactive experience on top of that:
//!
//! 1. A full async line editor: raw-byte input decoding (UTF-8 plus a bounded
//!    escape-sequence state machine), an edit buffer with grapheme-safe cursor
//!    motion, in-place repaint with inline hints, an alias-preview subline, and
//!    256-colour highlighting of syntax errors while you type.
//! 2. A quote- and delimiter-aware tokenizer that never fails: unfinished quoting and
//!    dangling pipes are data for the highlighter, not errors.
//! 3. Alias expansion with cycle breaking and the classic "replacement ends in a
//!    space, so the next word is alias-eligible" rule.
//! 4. A pipeline/sequence dispatcher that validates the line, reports unknown
//!    commands, wraps internal pipe stages in nested `ivish` invocations, threads
//!    exit codes, and coordinates per-command interrupt semantics and terminal modes
//!    (`line` vs `raw`) from a host-supplied command database.
//!
//! # Why the shape is what it is
//!
//! Everything enters through channels and `dyn Write`, not through global
//! descriptors: a reader task forwards raw bytes into an mpsc channel, and the
//! terminal is an injected writer. That is what makes the whole loop (editor, shell
//! loop, dispatcher, input routing to a foreground command) testable without a TTY,
//! and what lets a host hand the shell whatever descriptors it has.
//!
//! # How to use this crate
//!
//! Implement [`CommandRunner`] and [`HostCallbacks`] for your host, then:
//!
//! ```no_run
//! # async fn demo(runner: std::sync::Arc<dyn ivish::CommandRunner>,
//! #               host: std::sync::Arc<dyn ivish::HostCallbacks>) {
//! use ivish::{Shell, ShellConfig};
//!
//! let config = ShellConfig::from_env();
//! let mut shell = Shell::new(runner, host, config);
//! let exit_code = shell.run().await;
//! # let _ = exit_code;
//! # }
//! ```
//!
//! The `ivish` binary does exactly this with a runner that re-enters the host, and
//! also supports the one-shot form: `ivish echo hello` runs `echo hello` as a
//! subshell and exits with its code.

// Attach sources.
pub mod public_api;
pub mod readline_impl;
pub mod shell_impl;
pub mod test_fixtures;

// Re-export the public API.
pub use public_api::*;
pub use readline_impl::*;
pub use shell_impl::*;

// Type aliases.
use std::sync::Arc;

pub type StdMutex<T> = std::sync::Mutex<T>;

pub type SendRawTerminal = dyn std::io::Write + Send;
pub type SafeRawTerminal = Arc<StdMutex<SendRawTerminal>>;

pub type SafeHistory = Arc<StdMutex<readline_impl::history::History>>;
pub type SafeAliasSet = Arc<StdMutex<shell_impl::alias::AliasSet>>;

/// The injected Cell Width Function: terminal columns occupied by one character.
pub type CellWidthFn = Arc<dyn Fn(char) -> usize + Send + Sync>;

// Constants.
pub const CHANNEL_CAPACITY: usize = 1_000;
pub const HISTORY_SIZE_DEFAULT: usize = 100;

/// The stock Cell Width Function; hosts with their own font metrics inject theirs.
#[must_use]
pub fn default_cell_width_fn() -> CellWidthFn {
    Arc::new(|ch| unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0))
}
