// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Alias storage and command-line expansion.
//!
//! Expansion follows the classic rule set: only the first token of a segment is
//! alias-eligible, a replacement ending in whitespace makes the *next* word eligible
//! too, and a per-segment visited set breaks cycles so `alias ls='ls --color '` cannot
//! recurse forever.

use crate::shell_impl::tokenizer::{tokenize, tokenize_limited};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Characters that may not appear in an alias name: shell break characters, shell
/// quotes, backslash, expansion characters, and the path separator.
const ILLEGAL_NAME_CHARS: &str = "()<>;&| \t\n\"'\\$/";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("alias: '{name}': invalid alias name")]
pub struct InvalidAliasName {
    pub name: String,
}

/// Result of parsing one `alias` argument of the form `name[=value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDefinition<'a> {
    pub name: &'a str,
    pub replacement: Option<&'a str>,
}

/// The shell's name → replacement table. Iteration order is sorted by name, which is
/// what the `alias` built-in prints.
#[derive(Debug, Default)]
pub struct AliasSet {
    map: BTreeMap<String, String>,
}

impl AliasSet {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// `true` iff `name` is non-empty and contains no illegal character.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && !name.chars().any(|ch| ILLEGAL_NAME_CHARS.contains(ch))
    }

    /// Split a textual `name=value` definition at the first `=`. The `=` must sit at a
    /// non-zero index and the right side must be non-empty; anything else is a bare
    /// name lookup.
    #[must_use]
    pub fn parse_definition(text: &str) -> AliasDefinition<'_> {
        match text.find('=') {
            Some(eq_idx) if eq_idx > 0 && eq_idx + 1 < text.len() => AliasDefinition {
                name: &text[..eq_idx],
                replacement: Some(&text[eq_idx + 1..]),
            },
            _ => AliasDefinition { name: text, replacement: None },
        }
    }

    /// # Errors
    ///
    /// Returns [`InvalidAliasName`] when the name contains an illegal character.
    pub fn define(
        &mut self,
        name: &str,
        replacement: &str,
    ) -> Result<(), InvalidAliasName> {
        if !Self::is_valid_name(name) {
            return Err(InvalidAliasName { name: name.to_string() });
        }
        self.map.insert(name.to_string(), replacement.to_string());
        Ok(())
    }

    /// Remove one alias. Returns `false` when it was not defined.
    pub fn remove(&mut self, name: &str) -> bool { self.map.remove(name).is_some() }

    pub fn clear(&mut self) { self.map.clear(); }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.map.contains_key(name) }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render a definition in reusable form: `alias [-- ]name='value'`.
    #[must_use]
    pub fn reusable(name: &str, replacement: &str) -> String {
        let guard = if name.starts_with('-') { "-- " } else { "" };
        format!("alias {guard}{name}={}", single_quoted(replacement))
    }

    /// Expand aliases across the whole command line. Segments split by `|`, `|&` and
    /// `;` are translated independently; delimiters are re-inserted verbatim. Returns
    /// `Some` iff at least one segment was translated.
    #[must_use]
    pub fn translate(&self, cmdline: &str) -> Option<String> {
        let scan = tokenize(cmdline);
        let mut translated_any = false;
        let mut out = String::new();

        for (range, closing_delim) in scan.segment_bounds() {
            let raw_segment = &cmdline[range];
            let core = raw_segment.trim();
            let leading = &raw_segment[..raw_segment.len() - raw_segment.trim_start().len()];
            let trailing = &raw_segment[raw_segment.trim_end().len()..];

            let mut visited = HashSet::new();
            match self.translate_segment(core, &mut visited) {
                Some(translated) => {
                    translated_any = true;
                    out.push_str(leading);
                    out.push_str(&translated);
                    out.push_str(trailing);
                }
                None => out.push_str(raw_segment),
            }

            if let Some(idx) = closing_delim {
                out.push_str(scan.delimiters[idx].kind.literal());
            }
        }

        translated_any.then_some(out)
    }

    /// Translate one delimiter-free segment. `visited` is shared down the replacement
    /// chain of this segment; a fresh set is only opened when a trailing-space
    /// replacement makes the next word eligible.
    fn translate_segment(
        &self,
        segment: &str,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        let entered_fresh = visited.is_empty();

        let scan = tokenize_limited(segment, 1);
        let head = scan.tokens.first()?;
        let name = head.content.as_str();
        if !self.map.contains_key(name) || visited.contains(name) {
            return None;
        }
        visited.insert(name.to_string());

        let replacement = self.map[name].clone();
        let expanded = self
            .translate_segment(&replacement, visited)
            .unwrap_or_else(|| replacement.clone());

        let rest = scan.rest;
        if rest.is_empty() {
            return Some(expanded);
        }

        let chain_next_word =
            replacement.ends_with(char::is_whitespace) && entered_fresh;
        if chain_next_word {
            let mut fresh = HashSet::new();
            let rest_expanded = self
                .translate_segment(&rest, &mut fresh)
                .unwrap_or_else(|| rest.clone());
            Some(splice(expanded, &rest_expanded))
        } else {
            Some(splice(expanded, &rest))
        }
    }
}

/// Join an expanded head with the untouched tail, adding a separating space only when
/// the head does not already end in whitespace.
fn splice(head: String, tail: &str) -> String {
    if head.is_empty() || head.ends_with(char::is_whitespace) {
        head + tail
    } else {
        head + " " + tail
    }
}

/// Single-quote a value for reusable output. A lone `'` becomes `\'`; otherwise the
/// value is wrapped in single quotes with every inner `'` spelled `'\''`.
fn single_quoted(value: &str) -> String {
    if value == "'" {
        return "\\'".to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}
