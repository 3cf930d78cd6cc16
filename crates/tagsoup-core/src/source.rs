//! Character sources and the bounded lookahead buffer.
//!
//! The tokenizer never holds the whole document. It reads through a
//! [`LookaheadSource`], which buffers at most `lookahead` characters so that
//! delimiters, entity codes and raw-text end tags can be recognized before
//! anything is consumed.

use std::collections::VecDeque;
use std::io::{self, Read};

/// Substitute for undecodable input bytes.
const REPLACEMENT: char = '\u{FFFD}';

/// Bytes requested from a reader per refill.
const CHUNK: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// Character sources
// ---------------------------------------------------------------------------

/// A sequential producer of characters.
///
/// `Ok(None)` signals end of data. A source is not expected to produce more
/// characters after signalling end of data or failing.
pub trait CharSource {
    fn read_char(&mut self) -> io::Result<Option<char>>;
}

impl<S: CharSource + ?Sized> CharSource for &mut S {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        (**self).read_char()
    }
}

/// Characters of an in-memory string.
pub struct StrSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> StrSource<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars(),
        }
    }
}

impl CharSource for StrSource<'_> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        Ok(self.chars.next())
    }
}

/// UTF-8 decoding adapter over any [`Read`].
///
/// Invalid or truncated byte sequences decode to U+FFFD, one replacement per
/// offending byte, so a damaged file still tokenizes.
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    eof: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(CHUNK),
            start: 0,
            eof: false,
        }
    }

    /// Ensure at least `need` unread bytes are buffered, unless the reader
    /// is exhausted first.
    fn fill(&mut self, need: usize) -> io::Result<()> {
        while self.buf.len() - self.start < need && !self.eof {
            if self.start > 0 {
                self.buf.drain(..self.start);
                self.start = 0;
            }
            let old = self.buf.len();
            self.buf.resize(old + CHUNK, 0);
            let read = loop {
                match self.reader.read(&mut self.buf[old..]) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.buf.truncate(old);
                        return Err(e);
                    },
                }
            };
            self.buf.truncate(old + read);
            if read == 0 {
                self.eof = true;
            }
        }
        Ok(())
    }
}

impl<R: Read> CharSource for ReaderSource<R> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        self.fill(1)?;
        let Some(&lead) = self.buf.get(self.start) else {
            return Ok(None);
        };
        let width = utf8_width(lead);
        if width == 0 {
            self.start += 1;
            return Ok(Some(REPLACEMENT));
        }
        self.fill(width)?;
        let end = (self.start + width).min(self.buf.len());
        match std::str::from_utf8(&self.buf[self.start..end]) {
            Ok(s) => {
                self.start = end;
                Ok(s.chars().next())
            },
            Err(_) => {
                self.start += 1;
                Ok(Some(REPLACEMENT))
            },
        }
    }
}

/// Encoded length announced by a UTF-8 lead byte; 0 for bytes that cannot
/// start a sequence.
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// LookaheadSource
// ---------------------------------------------------------------------------

/// Bounded lookahead over a [`CharSource`].
///
/// `peek_at(k)` with `k < lookahead` never moves the read position; `read`
/// always moves it by one. No operation pulls more than `lookahead`
/// characters ahead of the read position from the underlying source.
pub struct LookaheadSource<S> {
    source: S,
    buffer: VecDeque<char>,
    lookahead: usize,
    position: usize,
    drained: bool,
    error: Option<io::Error>,
}

impl<S: CharSource> LookaheadSource<S> {
    /// Wrap `source` with a window of `lookahead` characters (at least 1).
    pub fn new(source: S, lookahead: usize) -> Self {
        let lookahead = lookahead.max(1);
        Self {
            source,
            buffer: VecDeque::with_capacity(lookahead.min(CHUNK)),
            lookahead,
            position: 0,
            drained: false,
            error: None,
        }
    }

    /// Size of the lookahead window.
    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    /// Number of characters consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Buffer up to `n` characters (never more than the window).
    fn fill(&mut self, n: usize) {
        let n = n.min(self.lookahead);
        while self.buffer.len() < n && !self.drained {
            match self.source.read_char() {
                Ok(Some(ch)) => self.buffer.push_back(ch),
                Ok(None) => self.drained = true,
                Err(e) => {
                    log::warn!(
                        "character source failed after offset {}: {e}",
                        self.position + self.buffer.len()
                    );
                    self.error = Some(e);
                    self.drained = true;
                },
            }
        }
    }

    /// Next character without consuming it.
    pub fn peek(&mut self) -> Option<char> {
        self.peek_at(0)
    }

    /// The `k`-th character ahead (0 is the next one). `None` past the end
    /// of data or when `k` lies outside the window.
    pub fn peek_at(&mut self, k: usize) -> Option<char> {
        if k >= self.lookahead {
            return None;
        }
        self.fill(k + 1);
        self.buffer.get(k).copied()
    }

    /// Consume and return the next character.
    pub fn read(&mut self) -> Option<char> {
        self.fill(1);
        let ch = self.buffer.pop_front()?;
        self.position += 1;
        Some(ch)
    }

    /// Consume `n` characters, discarding them.
    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            if self.read().is_none() {
                break;
            }
        }
    }

    /// True iff the upcoming characters spell `prefix`. Always `false` for a
    /// prefix longer than the window.
    pub fn starts_with(&mut self, prefix: &str, case_sensitive: bool) -> bool {
        let len = prefix.chars().count();
        if len > self.lookahead {
            return false;
        }
        self.fill(len);
        if self.buffer.len() < len {
            return false;
        }
        prefix.chars().zip(self.buffer.iter()).all(|(p, &c)| {
            if case_sensitive {
                p == c
            } else {
                chars_eq_ignore_case(p, c)
            }
        })
    }

    /// Offset of the first occurrence of `needle` inside the window.
    pub fn index_of(&mut self, needle: &str) -> Option<usize> {
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() {
            return Some(0);
        }
        if needle.len() > self.lookahead {
            return None;
        }
        self.fill(self.lookahead);
        self.buffer
            .make_contiguous()
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
    }

    /// True once the source has ended and every buffered character has been
    /// consumed.
    pub fn is_exhausted(&mut self) -> bool {
        self.fill(1);
        self.buffer.is_empty()
    }

    /// The I/O error that ended the source early, if any. Returned once.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

/// Case-insensitive character comparison using full lowercase folding.
pub fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
