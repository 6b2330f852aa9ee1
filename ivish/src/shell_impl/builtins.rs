// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The shell's own commands: `exit`, `help`, `history`, `alias`, `unalias`.

use crate::{
    public_api::host::HostCallbacks,
    shell_impl::alias::AliasSet,
    SafeAliasSet, SafeHistory,
};
use std::io::{self, Write};

pub const BUILTIN_NAMES: &[&str] = &["alias", "exit", "help", "history", "unalias"];

#[must_use]
pub fn is_builtin(name: &str) -> bool { BUILTIN_NAMES.contains(&name) }

/// What the dispatcher should do after a built-in ran.
#[derive(Debug, PartialEq, Eq)]
pub enum BuiltinOutcome {
    Handled(i32),
    /// The `exit` built-in: end the shell loop with the last-observed exit code.
    Exit,
}

pub struct BuiltinContext<'a> {
    pub aliases: &'a SafeAliasSet,
    pub safe_history: &'a SafeHistory,
    pub host: &'a dyn HostCallbacks,
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

/// Run one built-in. `args` are the de-quoted tokens after the command name.
///
/// # Errors
///
/// Only I/O errors from writing output; built-in failures are exit codes.
///
/// # Panics
///
/// Panics if the alias or history mutex is poisoned.
pub fn run_builtin(
    name: &str,
    args: &[String],
    ctx: &mut BuiltinContext<'_>,
) -> io::Result<BuiltinOutcome> {
    match name {
        "exit" => Ok(BuiltinOutcome::Exit),
        "help" => {
            ctx.host.run_ex_command("help");
            Ok(BuiltinOutcome::Handled(0))
        }
        "history" => {
            let history = ctx.safe_history.lock().unwrap();
            for (idx, entry) in history.iter().enumerate() {
                writeln!(ctx.out, "{:5}  {entry}", idx + 1)?;
            }
            Ok(BuiltinOutcome::Handled(0))
        }
        "alias" => run_alias(args, ctx),
        "unalias" => run_unalias(args, ctx),
        _ => {
            writeln!(ctx.err, "{name}: not a shell builtin")?;
            Ok(BuiltinOutcome::Handled(1))
        }
    }
}

fn run_alias(args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<BuiltinOutcome> {
    let mut aliases = ctx.aliases.lock().unwrap();

    if args.is_empty() {
        for (name, replacement) in aliases.iter() {
            writeln!(ctx.out, "{}", AliasSet::reusable(name, replacement))?;
        }
        return Ok(BuiltinOutcome::Handled(0));
    }

    let mut code = 0;
    for arg in args {
        // `alias -- -v='x'` defines a dash-named alias instead of parsing options.
        if arg == "--" {
            continue;
        }
        let definition = AliasSet::parse_definition(arg);
        match definition.replacement {
            Some(replacement) => {
                if let Err(error) = aliases.define(definition.name, replacement) {
                    writeln!(ctx.err, "{error}")?;
                    code = 1;
                }
            }
            None => match aliases.get(definition.name) {
                Some(replacement) => {
                    writeln!(
                        ctx.out,
                        "{}",
                        AliasSet::reusable(definition.name, replacement)
                    )?;
                }
                None => {
                    writeln!(ctx.err, "alias: {}: not found", definition.name)?;
                    code = 1;
                }
            },
        }
    }
    Ok(BuiltinOutcome::Handled(code))
}

fn run_unalias(args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<BuiltinOutcome> {
    let mut aliases = ctx.aliases.lock().unwrap();

    if args.is_empty() {
        writeln!(ctx.err, "unalias: usage: unalias [-a] name [name ...]")?;
        return Ok(BuiltinOutcome::Handled(1));
    }
    if args.iter().any(|arg| arg == "-a") {
        aliases.clear();
        return Ok(BuiltinOutcome::Handled(0));
    }

    let mut code = 0;
    for name in args {
        if !aliases.remove(name) {
            writeln!(ctx.err, "unalias: {name}: not found")?;
            code = 1;
        }
    }
    Ok(BuiltinOutcome::Handled(code))
}
