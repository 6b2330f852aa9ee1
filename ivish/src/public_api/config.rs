// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Shell configuration, read once from the environment at startup. Terminal geometry
//! is the exception: it is re-read at every command launch, since the host may resize
//! between commands.

use crate::{readline_impl::line_state::HintColors, HISTORY_SIZE_DEFAULT};
use std::path::PathBuf;

pub const ENV_CMD_DB: &str = "IVISH_CMD_DB";
pub const ENV_HISTORY_FILE: &str = "IVISH_HISTORY_FILE";
pub const ENV_UNFINISHED_QUOTE_HINT_COLOR: &str = "UNFINISHED_QUOTE_HINT_COLOR";
pub const ENV_INVALID_PIPE_DELIMITER_HINT_COLOR: &str = "INVALID_PIPE_DELIMITER_HINT_COLOR";
pub const ENV_INVALID_COMMAND_SEPARATOR_HINT_COLOR: &str =
    "INVALID_COMMAND_SEPARATOR_HINT_COLOR";
pub const ENV_COLUMNS: &str = "COLUMNS";
pub const ENV_LINES: &str = "LINES";

pub const PROMPT_DEFAULT: &str = "$ ";
pub const WINDOW_SIZE_DEFAULT: (u16, u16) = (80, 24);

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub prompt: String,
    /// `IVISH_HISTORY_FILE`; no persistence when unset.
    pub history_file: Option<PathBuf>,
    /// `IVISH_CMD_DB`; empty command database when unset.
    pub command_db_path: Option<PathBuf>,
    pub history_max: usize,
    pub hint_colors: HintColors,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: PROMPT_DEFAULT.to_string(),
            history_file: None,
            command_db_path: None,
            history_max: HISTORY_SIZE_DEFAULT,
            hint_colors: HintColors::default(),
        }
    }
}

impl ShellConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            history_file: std::env::var_os(ENV_HISTORY_FILE).map(PathBuf::from),
            command_db_path: std::env::var_os(ENV_CMD_DB).map(PathBuf::from),
            hint_colors: HintColors {
                unfinished_quote: color_from_env(ENV_UNFINISHED_QUOTE_HINT_COLOR),
                invalid_pipe: color_from_env(ENV_INVALID_PIPE_DELIMITER_HINT_COLOR),
                invalid_separator: color_from_env(
                    ENV_INVALID_COMMAND_SEPARATOR_HINT_COLOR,
                ),
            },
            ..Self::default()
        }
    }
}

fn color_from_env(var: &str) -> u8 {
    std::env::var(var)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(crate::readline_impl::line_state::HINT_COLOR_DEFAULT)
}

/// `COLUMNS` / `LINES`, with a classic 80x24 fallback.
#[must_use]
pub fn window_size_from_env() -> (u16, u16) {
    let parse = |var: &str, fallback: u16| {
        std::env::var(var)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(fallback)
    };
    (
        parse(ENV_COLUMNS, WINDOW_SIZE_DEFAULT.0),
        parse(ENV_LINES, WINDOW_SIZE_DEFAULT.1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn env_snapshot_and_geometry() {
        std::env::set_var(ENV_UNFINISHED_QUOTE_HINT_COLOR, "196");
        std::env::set_var(ENV_INVALID_PIPE_DELIMITER_HINT_COLOR, "not-a-number");
        std::env::set_var(ENV_CMD_DB, "/tmp/ivish-cmd-db.json");
        std::env::set_var(ENV_COLUMNS, "120");
        std::env::set_var(ENV_LINES, "40");

        let config = ShellConfig::from_env();
        assert_eq!(config.hint_colors.unfinished_quote, 196);
        assert_eq!(config.hint_colors.invalid_pipe, 178);
        assert_eq!(
            config.command_db_path.as_deref(),
            Some(std::path::Path::new("/tmp/ivish-cmd-db.json"))
        );
        assert_eq!(window_size_from_env(), (120, 40));

        std::env::remove_var(ENV_COLUMNS);
        std::env::remove_var(ENV_LINES);
        assert_eq!(window_size_from_env(), WINDOW_SIZE_DEFAULT);
    }
}
