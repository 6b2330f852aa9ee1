// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Byte stream → typed key input.
//!
//! Bytes from the host descriptor are first assembled into UTF-8 characters, then run
//! through a bounded state machine that recognises the control characters and the
//! `ESC [` / `ESC O` sequences the editor understands. Unrecognised escape sequences
//! are discarded whole; a lone `ESC` (one that ends its input chunk) means "abandon
//! history browsing".
//!
//! The machine never needs more than three characters of lookahead after `ESC`, so
//! state is a small enum rather than a buffer.

/// One decoded unit of editor input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Enter,
    Tab,
    Backspace,
    /// Delete the grapheme at the cursor (`ESC[3~`).
    Delete,
    /// `^D`: delete at cursor, or EOF / line flush when the buffer is empty.
    DeleteOrEof,
    Interrupt,
    MoveLeft,
    MoveRight,
    MoveHome,
    MoveEnd,
    MoveWordLeft,
    MoveWordRight,
    HistoryPrev,
    HistoryNext,
    DeleteToHome,
    DeleteToEnd,
    DeleteWordLeft,
    /// Lone `ESC`: restore the history cache if browsing.
    ResetToCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscState {
    Ground,
    /// After `ESC`.
    Esc,
    /// After `ESC [`.
    Csi,
    /// After `ESC [ <digit>`.
    CsiDigit(char),
    /// After `ESC O`.
    Ss3,
}

#[derive(Debug)]
pub struct InputDecoder {
    utf8: Utf8Assembler,
    state: EscState,
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self { utf8: Utf8Assembler::default(), state: EscState::Ground }
    }
}

impl InputDecoder {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Decode one chunk as delivered by the reader. Chunk boundaries matter only for
    /// the lone-`ESC` rule: an `ESC` still pending when the chunk ends is taken as the
    /// Escape key itself, since a terminal sends multi-byte sequences in one burst.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<KeyInput> {
        let mut acc = vec![];
        for &byte in bytes {
            if let Some(ch) = self.utf8.push(byte) {
                self.feed_char(ch, &mut acc);
            }
        }
        if self.state == EscState::Esc {
            acc.push(KeyInput::ResetToCache);
            self.state = EscState::Ground;
        }
        acc
    }

    fn feed_char(&mut self, ch: char, acc: &mut Vec<KeyInput>) {
        match self.state {
            EscState::Ground => {
                if ch == '\x1b' {
                    self.state = EscState::Esc;
                } else if let Some(key) = decode_ground(ch) {
                    acc.push(key);
                }
            }
            EscState::Esc => match ch {
                '[' => self.state = EscState::Csi,
                'O' => self.state = EscState::Ss3,
                '\x1b' => acc.push(KeyInput::ResetToCache),
                // No recognised prefix: discard the whole sequence.
                _ => self.state = EscState::Ground,
            },
            EscState::Csi => {
                self.state = EscState::Ground;
                match ch {
                    'A' => acc.push(KeyInput::HistoryPrev),
                    'B' => acc.push(KeyInput::HistoryNext),
                    'C' => acc.push(KeyInput::MoveRight),
                    'D' => acc.push(KeyInput::MoveLeft),
                    'H' => acc.push(KeyInput::MoveHome),
                    'F' => acc.push(KeyInput::MoveEnd),
                    ch if ch.is_ascii_digit() => self.state = EscState::CsiDigit(ch),
                    _ => {}
                }
            }
            EscState::CsiDigit(digit) => {
                self.state = EscState::Ground;
                if ch == '~' {
                    match digit {
                        '1' | '7' => acc.push(KeyInput::MoveHome),
                        '3' => acc.push(KeyInput::Delete),
                        '4' => acc.push(KeyInput::MoveEnd),
                        _ => {}
                    }
                }
            }
            EscState::Ss3 => {
                self.state = EscState::Ground;
                match ch {
                    'H' => acc.push(KeyInput::MoveHome),
                    'F' => acc.push(KeyInput::MoveEnd),
                    _ => {}
                }
            }
        }
    }
}

/// The fixed control-character map, plus plain character insertion.
fn decode_ground(ch: char) -> Option<KeyInput> {
    match ch {
        '\r' | '\n' => Some(KeyInput::Enter),
        '\t' => Some(KeyInput::Tab),
        '\x7f' | '\x08' => Some(KeyInput::Backspace),
        '\x01' => Some(KeyInput::MoveHome),      // ^A
        '\x02' => Some(KeyInput::MoveLeft),      // ^B
        '\x03' => Some(KeyInput::Interrupt),     // ^C
        '\x04' => Some(KeyInput::DeleteOrEof),   // ^D
        '\x05' => Some(KeyInput::MoveEnd),       // ^E
        '\x06' => Some(KeyInput::MoveRight),     // ^F
        '\x0b' => Some(KeyInput::DeleteToEnd),   // ^K
        '\x0e' => Some(KeyInput::HistoryNext),   // ^N
        '\x10' => Some(KeyInput::HistoryPrev),   // ^P
        '\x14' => Some(KeyInput::MoveWordLeft),  // ^T
        '\x15' => Some(KeyInput::DeleteToHome),  // ^U
        '\x17' => Some(KeyInput::DeleteWordLeft),// ^W
        '\x19' => Some(KeyInput::MoveWordRight), // ^Y
        ch if (ch as u32) < 0x20 => None,
        ch => Some(KeyInput::Char(ch)),
    }
}

/// Incremental UTF-8 assembly; invalid sequences are dropped byte-wise.
#[derive(Debug, Default)]
struct Utf8Assembler {
    buf: [u8; 4],
    len: usize,
    need: usize,
}

impl Utf8Assembler {
    fn push(&mut self, byte: u8) -> Option<char> {
        if self.need == 0 {
            match byte {
                0x00..=0x7f => return Some(byte as char),
                0xc0..=0xdf => self.need = 2,
                0xe0..=0xef => self.need = 3,
                0xf0..=0xf7 => self.need = 4,
                // Stray continuation or invalid lead byte.
                _ => return None,
            }
            self.buf[0] = byte;
            self.len = 1;
            return None;
        }

        if byte & 0xc0 != 0x80 {
            // Sequence broke off; restart with this byte.
            self.need = 0;
            self.len = 0;
            return self.push(byte);
        }

        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < self.need {
            return None;
        }

        let decoded = std::str::from_utf8(&self.buf[..self.len])
            .ok()
            .and_then(|s| s.chars().next());
        self.need = 0;
        self.len = 0;
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_decodes_to_chars() {
        let mut decoder = InputDecoder::new();
        assert_eq!(
            decoder.feed(b"hi"),
            vec![KeyInput::Char('h'), KeyInput::Char('i')]
        );
    }

    #[test]
    fn arrow_keys_and_navigation_sequences() {
        let mut decoder = InputDecoder::new();
        assert_eq!(decoder.feed(b"\x1b[A"), vec![KeyInput::HistoryPrev]);
        assert_eq!(decoder.feed(b"\x1b[B"), vec![KeyInput::HistoryNext]);
        assert_eq!(decoder.feed(b"\x1b[C"), vec![KeyInput::MoveRight]);
        assert_eq!(decoder.feed(b"\x1b[D"), vec![KeyInput::MoveLeft]);
        assert_eq!(decoder.feed(b"\x1b[H"), vec![KeyInput::MoveHome]);
        assert_eq!(decoder.feed(b"\x1bOF"), vec![KeyInput::MoveEnd]);
    }

    #[test]
    fn vt_style_tilde_sequences() {
        let mut decoder = InputDecoder::new();
        assert_eq!(decoder.feed(b"\x1b[1~"), vec![KeyInput::MoveHome]);
        assert_eq!(decoder.feed(b"\x1b[7~"), vec![KeyInput::MoveHome]);
        assert_eq!(decoder.feed(b"\x1b[3~"), vec![KeyInput::Delete]);
        assert_eq!(decoder.feed(b"\x1b[4~"), vec![KeyInput::MoveEnd]);
    }

    #[test]
    fn lone_escape_at_chunk_end_resets_to_cache() {
        let mut decoder = InputDecoder::new();
        assert_eq!(decoder.feed(b"\x1b"), vec![KeyInput::ResetToCache]);
        // A sequence split across chunks is NOT a lone escape... but a terminal sends
        // it in one burst, so the pending-at-chunk-end rule holds.
        assert_eq!(decoder.feed(b"\x1b[A"), vec![KeyInput::HistoryPrev]);
    }

    #[test]
    fn unknown_sequences_are_discarded_whole() {
        let mut decoder = InputDecoder::new();
        assert_eq!(decoder.feed(b"\x1bxq"), vec![KeyInput::Char('q')]);
        assert_eq!(decoder.feed(b"\x1b[Zq"), vec![KeyInput::Char('q')]);
        assert_eq!(decoder.feed(b"\x1b[9~q"), vec![KeyInput::Char('q')]);
    }

    #[test]
    fn control_characters_map_per_convention() {
        let mut decoder = InputDecoder::new();
        let keys = decoder.feed(b"\x01\x05\x02\x06\x14\x19\x10\x0e\x15\x0b\x17\x04\x03\t\r");
        assert_eq!(
            keys,
            vec![
                KeyInput::MoveHome,
                KeyInput::MoveEnd,
                KeyInput::MoveLeft,
                KeyInput::MoveRight,
                KeyInput::MoveWordLeft,
                KeyInput::MoveWordRight,
                KeyInput::HistoryPrev,
                KeyInput::HistoryNext,
                KeyInput::DeleteToHome,
                KeyInput::DeleteToEnd,
                KeyInput::DeleteWordLeft,
                KeyInput::DeleteOrEof,
                KeyInput::Interrupt,
                KeyInput::Tab,
                KeyInput::Enter,
            ]
        );
    }

    #[test]
    fn multibyte_utf8_survives_chunk_splits() {
        let mut decoder = InputDecoder::new();
        let bytes = "é日".as_bytes();
        let mut keys = vec![];
        for byte in bytes {
            keys.extend(decoder.feed(&[*byte]));
        }
        assert_eq!(keys, vec![KeyInput::Char('é'), KeyInput::Char('日')]);
    }

    #[test]
    fn invalid_utf8_bytes_are_dropped() {
        let mut decoder = InputDecoder::new();
        assert_eq!(decoder.feed(&[0x80, 0xff, b'a']), vec![KeyInput::Char('a')]);
        // A broken-off sequence restarts cleanly on the next lead byte.
        assert_eq!(decoder.feed(&[0xe6, b'x']), vec![KeyInput::Char('x')]);
    }
}
