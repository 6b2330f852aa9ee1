// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Completion-site classification and candidate gathering.
//!
//! The completer looks only at the text before the cursor: the word under completion
//! is the last token of the current segment, the site is derived from where that word
//! sits, and the host supplies the actual candidates (command enumeration and
//! filename expansion both live outside the shell).

use crate::shell_impl::tokenizer::tokenize;

/// What kind of word sits at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSite {
    /// First word of a segment: complete against the command registry.
    Command,
    /// A word starting with `-`: the host has no source for these.
    CommandOption,
    /// Anything else: complete against the filesystem.
    Filename,
}

/// The classification plus the candidate list, handed to the line editor and (for the
/// ambiguous case) up to the shell loop for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub site: CompletionSite,
    /// The word being completed (already de-quoted).
    pub pattern: String,
    /// Byte offset in the before-cursor text where the matched pattern begins.
    pub pattern_start: usize,
    pub candidates: Vec<String>,
}

impl Completion {
    /// The sole candidate, when completion is unambiguous.
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        match self.candidates.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    /// The longest prefix shared by every candidate, when it extends the pattern.
    #[must_use]
    pub fn common_prefix_extension(&self) -> Option<String> {
        let common = longest_common_prefix(&self.candidates);
        (common.len() > self.pattern.len()).then(|| common.to_string())
    }
}

/// Source of candidates, implemented by the embedding host.
pub trait CompletionProvider: Send + Sync {
    /// Known command names, optionally narrowed by a prefix.
    fn available_commands(&self, prefix: Option<&str>) -> Vec<String>;
    /// Filenames matching a pattern prefix.
    fn expand_filenames(&self, pattern: &str) -> Vec<String>;
}

/// Classify the completion site in `before_cursor` and gather candidates.
#[must_use]
pub fn complete(before_cursor: &str, provider: &dyn CompletionProvider) -> Completion {
    let scan = tokenize(before_cursor);

    let segment_first_token = scan
        .delimiters
        .last()
        .map_or(0, |delim| delim.left_tokens.end);

    // The cursor starts a fresh word after whitespace or directly after a delimiter.
    let at_fresh_word = scan.unfinished_escape.is_none()
        && (before_cursor.is_empty()
            || before_cursor.ends_with(char::is_whitespace)
            || scan.delimiters.last().is_some_and(|delim| {
                delim.position + delim.kind.literal().len() == before_cursor.len()
            }));

    let (pattern, pattern_start, is_first_word) = if at_fresh_word {
        let is_first = scan.tokens.len() == segment_first_token;
        (String::new(), before_cursor.len(), is_first)
    } else if scan.unfinished_escape.is_some() {
        // Mid-quote: the open token is in `rest`; strip the quote character so the
        // host sees the bare pattern.
        let start = before_cursor.len() - scan.rest.len();
        let pattern: String =
            scan.rest.chars().filter(|ch| !matches!(ch, '\'' | '"')).collect();
        (pattern, start, scan.tokens.len() == segment_first_token)
    } else {
        let last = scan.tokens.last().expect("non-empty unquoted text has a token");
        let is_first = scan.tokens.len() == segment_first_token + 1;
        (last.content.clone(), last.start, is_first)
    };

    let site = if is_first_word {
        CompletionSite::Command
    } else if pattern.starts_with('-') {
        CompletionSite::CommandOption
    } else {
        CompletionSite::Filename
    };

    let candidates = match site {
        CompletionSite::Command => {
            let prefix = (!pattern.is_empty()).then_some(pattern.as_str());
            let mut all = provider.available_commands(prefix);
            all.retain(|name| name.starts_with(&pattern));
            all
        }
        CompletionSite::CommandOption => vec![],
        CompletionSite::Filename => provider.expand_filenames(&pattern),
    };

    Completion { site, pattern, pattern_start, candidates }
}

/// Longest prefix shared by every item; empty when the list is empty.
#[must_use]
pub fn longest_common_prefix(items: &[String]) -> &str {
    let Some(first) = items.first() else {
        return "";
    };
    let mut end = first.len();
    for item in &items[1..] {
        let shared = first
            .char_indices()
            .take_while(|(idx, ch)| {
                *idx < end && item[*idx..].chars().next() == Some(*ch)
            })
            .last()
            .map_or(0, |(idx, ch)| idx + ch.len_utf8());
        end = end.min(shared);
    }
    &first[..end]
}
