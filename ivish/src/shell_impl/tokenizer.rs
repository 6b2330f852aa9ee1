// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Single-pass scanner for interactive command lines.
//!
//! The scanner walks the input character by character, honouring single-quote,
//! double-quote and backslash escaping, and produces three things in one pass:
//! [`Token`]s carrying their original byte ranges, [`Delimiter`] records for `|`, `|&`
//! and `;`, and an [`UnfinishedEscape`] marker when the scan ends inside an escape.
//!
//! It never fails at the API level: malformed input is data, not an error, so the line
//! editor can highlight an unfinished quote or a dangling pipe while the user is still
//! typing. All recorded positions are byte offsets into the original line; cell-width
//! and character-index arithmetic belong to other layers.

use std::ops::Range;

/// Kind of escape active at a point of the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeKind {
    SingleQuote,
    DoubleQuote,
    Backslash,
}

impl EscapeKind {
    /// The character that opened this escape, as shown in `unfinished` reports.
    #[must_use]
    pub fn open_char(&self) -> char {
        match self {
            EscapeKind::SingleQuote => '\'',
            EscapeKind::DoubleQuote => '"',
            EscapeKind::Backslash => '\\',
        }
    }
}

/// A harvested word with its original location.
///
/// `start..=end` are byte offsets of the first and last input byte that contributed to
/// the token (quotes included via `start` when a quote opened the token). `content` is
/// the de-quoted text: quote and escape rules have been applied exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterKind {
    /// `|`
    Pipe,
    /// `|&`
    PipeErrRedi,
    /// `;`
    CommandSep,
}

impl DelimiterKind {
    #[must_use]
    pub fn literal(&self) -> &'static str {
        match self {
            DelimiterKind::Pipe => "|",
            DelimiterKind::PipeErrRedi => "|&",
            DelimiterKind::CommandSep => ";",
        }
    }

    /// Pipes connect two command stages; `;` merely sequences them.
    #[must_use]
    pub fn is_pipe(&self) -> bool {
        matches!(self, DelimiterKind::Pipe | DelimiterKind::PipeErrRedi)
    }
}

/// A `|`, `|&` or `;` found at the top level of the line.
///
/// `left_tokens` is the half-open range of token *indices* between the previous
/// delimiter (or line start) and this one, so "left side is empty" is
/// `left_tokens.is_empty()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiter {
    pub kind: DelimiterKind,
    /// Byte offset of the delimiter's first character.
    pub position: usize,
    pub left_tokens: Range<usize>,
}

/// Present iff the scan ended while an escape was still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnfinishedEscape {
    /// Byte offset of the character that opened the escape.
    pub start: usize,
    pub kind: EscapeKind,
}

/// Everything the scanner learned about one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeResult {
    pub line: String,
    pub tokens: Vec<Token>,
    pub delimiters: Vec<Delimiter>,
    /// Unconsumed suffix. Empty when the whole line was consumed; starts at the
    /// earliest still-open token when the scan ended inside an escape; starts after the
    /// last consumed character when a token limit stopped the scan.
    pub rest: String,
    pub unfinished_escape: Option<UnfinishedEscape>,
}

impl TokenizeResult {
    /// Indices into [`Self::delimiters`] that violate the validity rules:
    /// pipes need at least one token on both sides, `;` needs one on its left.
    #[must_use]
    pub fn invalid_delimiter_indices(&self) -> Vec<usize> {
        let mut acc = vec![];
        for (idx, delim) in self.delimiters.iter().enumerate() {
            let left_ok = !delim.left_tokens.is_empty();
            let valid = if delim.kind.is_pipe() {
                let right_ok = match self.delimiters.get(idx + 1) {
                    Some(next) => !next.left_tokens.is_empty(),
                    None => self.tokens.len() > delim.left_tokens.end,
                };
                left_ok && right_ok
            } else {
                // A trailing `;` is accepted.
                left_ok
            };
            if !valid {
                acc.push(idx);
            }
        }
        acc
    }

    /// No invalid delimiters and no unfinished escape.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unfinished_escape.is_none() && self.invalid_delimiter_indices().is_empty()
    }

    /// Byte range of each delimiter-separated segment, paired with the index of the
    /// delimiter that closes it (`None` for the final segment). Ranges are raw, i.e.
    /// they keep the original whitespace around the segment text.
    #[must_use]
    pub fn segment_bounds(&self) -> Vec<(Range<usize>, Option<usize>)> {
        let mut acc = vec![];
        let mut lower = 0;
        for (idx, delim) in self.delimiters.iter().enumerate() {
            acc.push((lower..delim.position, Some(idx)));
            lower = delim.position + delim.kind.literal().len();
        }
        acc.push((lower..self.line.len(), None));
        acc
    }
}

/// Scan the whole line.
#[must_use]
pub fn tokenize(line: &str) -> TokenizeResult { tokenize_limited(line, 0) }

/// Scan until `count` tokens have been harvested (`0` = no limit). The unconsumed
/// suffix is returned in [`TokenizeResult::rest`].
#[must_use]
pub fn tokenize_limited(line: &str, count: usize) -> TokenizeResult {
    Scanner::new(line, count).run()
}

/// Token text under construction, with the byte range it covers so far.
struct Accum {
    text: String,
    start: usize,
    end: usize,
}

struct Scanner<'a> {
    line: &'a str,
    limit: usize,
    tokens: Vec<Token>,
    delimiters: Vec<Delimiter>,
    accum: Option<Accum>,
    escaping: Option<EscapeKind>,
    /// Byte offset of the character that opened the active escape.
    escape_start: usize,
    /// One-character lookahead inside a double quote, set by a backslash.
    sub_escaping: bool,
    /// Token index where the next delimiter's left side begins.
    left_lower_bound: usize,
}

impl<'a> Scanner<'a> {
    fn new(line: &'a str, limit: usize) -> Self {
        Self {
            line,
            limit,
            tokens: vec![],
            delimiters: vec![],
            accum: None,
            escaping: None,
            escape_start: 0,
            sub_escaping: false,
            left_lower_bound: 0,
        }
    }

    fn run(mut self) -> TokenizeResult {
        // `line` is a plain `&'a str`, so `rest` slices outlive the scanner itself.
        let line = self.line;
        let mut iter = line.char_indices().peekable();

        while let Some(&(idx, ch)) = iter.peek() {
            if self.limit > 0 && self.tokens.len() == self.limit {
                return self.finish(&line[idx..]);
            }
            iter.next();

            if let Some(kind) = self.escaping {
                self.scan_escaped(kind, idx, ch);
            } else if matches!(ch, '\'' | '"' | '\\') {
                self.open_escape(idx, ch);
            } else if ch.is_whitespace() {
                self.harvest();
            } else if ch == '|' || ch == ';' {
                self.harvest();
                let kind = if ch == '|' && matches!(iter.peek(), Some(&(_, '&'))) {
                    iter.next();
                    DelimiterKind::PipeErrRedi
                } else if ch == '|' {
                    DelimiterKind::Pipe
                } else {
                    DelimiterKind::CommandSep
                };
                self.delimiters.push(Delimiter {
                    kind,
                    position: idx,
                    left_tokens: self.left_lower_bound..self.tokens.len(),
                });
                self.left_lower_bound = self.tokens.len();
            } else {
                self.append(idx, ch);
            }
        }

        if let Some(kind) = self.escaping {
            // The partial token is not harvested; it is conveyed through `rest`.
            let open_at = self.escape_start;
            let token_start = self.accum.as_ref().map_or(open_at, |a| a.start);
            let mut result = self.finish(&line[token_start..]);
            result.unfinished_escape = Some(UnfinishedEscape { start: open_at, kind });
            return result;
        }

        self.harvest();
        self.finish("")
    }

    fn scan_escaped(&mut self, kind: EscapeKind, idx: usize, ch: char) {
        match kind {
            EscapeKind::SingleQuote => {
                if ch == '\'' {
                    self.escaping = None;
                } else {
                    self.append(idx, ch);
                }
            }
            EscapeKind::DoubleQuote => {
                if self.sub_escaping {
                    // Only `\"` and `\\` collapse; any other `\x` keeps the backslash.
                    if ch != '"' && ch != '\\' {
                        self.append(idx, '\\');
                    }
                    self.append(idx, ch);
                    self.sub_escaping = false;
                } else if ch == '\\' {
                    self.sub_escaping = true;
                } else if ch == '"' {
                    self.escaping = None;
                } else {
                    self.append(idx, ch);
                }
            }
            EscapeKind::Backslash => {
                self.append(idx, ch);
                self.escaping = None;
            }
        }
    }

    fn open_escape(&mut self, idx: usize, ch: char) {
        self.escaping = Some(match ch {
            '\'' => EscapeKind::SingleQuote,
            '"' => EscapeKind::DoubleQuote,
            _ => EscapeKind::Backslash,
        });
        self.escape_start = idx;
        self.sub_escaping = false;
        // An empty token is allowed: this is what preserves `""` and `''`.
        self.ensure_accum(idx);
    }

    fn ensure_accum(&mut self, idx: usize) {
        if self.accum.is_none() {
            self.accum = Some(Accum { text: String::new(), start: idx, end: idx });
        }
    }

    fn append(&mut self, idx: usize, ch: char) {
        self.ensure_accum(idx);
        let accum = self.accum.as_mut().expect("accum was just ensured");
        accum.text.push(ch);
        accum.end = idx;
    }

    fn harvest(&mut self) {
        if let Some(accum) = self.accum.take() {
            self.tokens.push(Token {
                start: accum.start,
                end: accum.end,
                content: accum.text,
            });
        }
    }

    fn finish(self, rest: &str) -> TokenizeResult {
        TokenizeResult {
            line: self.line.to_string(),
            tokens: self.tokens,
            delimiters: self.delimiters,
            rest: rest.to_string(),
            unfinished_escape: None,
        }
    }
}
