// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Tracing initialisation.
//!
//! Log output goes to a rolling file, never to the terminal: the display is in raw
//! mode and owned by the line editor, so writing log lines to it would shred the
//! prompt. Hosts that want the logs read the file.

use miette::IntoDiagnostic;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Simply initialize the tracing system writing to a rolling log file next to
/// `file_path_and_prefix` (e.g. `/tmp/ivish.log`).
///
/// # Errors
///
/// Returns an error when the log directory cannot be used or a global subscriber is
/// already installed.
pub fn init(
    level_filter: tracing_core::LevelFilter,
    file_path_and_prefix: &Path,
) -> miette::Result<()> {
    let dir = file_path_and_prefix.parent().unwrap_or(Path::new("."));
    let prefix = file_path_and_prefix
        .file_name()
        .ok_or_else(|| miette::miette!("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(dir, prefix);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(level_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .try_init()
        .into_diagnostic()
}
