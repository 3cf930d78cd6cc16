//! Grammar-driven markup tokenizer.
//!
//! [`Tokenizer`] pulls characters through a [`LookaheadSource`] and emits
//! one token per production: tag, comment, processing instruction, DTD
//! fragment, character data, or raw-text element body. Every token passes
//! through a [`SequenceNormalizer`] before it reaches the caller.
//!
//! With error correction off, tags are emitted exactly as written and a
//! structural error ends the stream. With it on, tags are re-serialized in
//! canonical form and malformed spans are repaired or skipped.

use std::collections::VecDeque;
use std::io::Read;
use std::mem;

use crate::error::{Result, TagsoupError};
use crate::grammar::{Delimiters, Grammar};
use crate::normalizer::{SequenceNormalizer, TokenWindow};
use crate::recovery::Recovery;
use crate::source::{CharSource, LookaheadSource, ReaderSource, StrSource, chars_eq_ignore_case};

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Inside a raw-text element: everything up to its end tag is text.
    AwaitingEndTag(String),
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Production {
    Comment,
    ProcessingInstruction,
    CData,
    Dtd,
    Tag,
    Data,
}

/// An attribute as parsed. `None` marks a boolean attribute.
#[derive(Debug)]
struct Attribute {
    name: String,
    value: Option<String>,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Pull tokenizer over a character source.
///
/// Yields `Ok(token)` for every token in document order. In strict mode a
/// structural error is yielded once, after every token produced before it,
/// and ends the stream.
pub struct Tokenizer<'g, S, G: ?Sized> {
    src: LookaheadSource<S>,
    grammar: &'g G,
    mode: Mode,
    pending_ws: String,
    window: TokenWindow,
    normalizer: SequenceNormalizer,
    ready: VecDeque<String>,
    deferred: Option<TagsoupError>,
}

impl<'a, 'g, G: Grammar + ?Sized> Tokenizer<'g, StrSource<'a>, G> {
    /// Tokenize an in-memory string.
    pub fn from_str(input: &'a str, grammar: &'g G) -> Self {
        Self::new(StrSource::new(input), grammar)
    }
}

impl<'g, R: Read, G: Grammar + ?Sized> Tokenizer<'g, ReaderSource<R>, G> {
    /// Tokenize UTF-8 text from a reader, decoding incrementally.
    pub fn from_reader(reader: R, grammar: &'g G) -> Self {
        Self::new(ReaderSource::new(reader), grammar)
    }
}

impl<'g, S: CharSource, G: Grammar + ?Sized> Tokenizer<'g, S, G> {
    pub fn new(source: S, grammar: &'g G) -> Self {
        let floor = grammar
            .delimiters()
            .longest()
            .max(grammar.entities().max_code_len());
        let requested = grammar.char_lookahead();
        if requested < floor {
            log::warn!(
                "char lookahead {requested} is shorter than the longest delimiter or entity code; using {floor}"
            );
        }
        // "</" + name + '>' and one spare.
        let end_tag = grammar.longest_raw_text_name() + 4;
        let lookahead = requested.max(floor).max(end_tag);
        log::debug!(
            "tokenizer window: {lookahead} chars, {} tokens ahead",
            grammar.token_lookahead()
        );
        Self {
            src: LookaheadSource::new(source, lookahead),
            grammar,
            mode: Mode::Normal,
            pending_ws: String::new(),
            window: TokenWindow::new(grammar.token_lookahead()),
            normalizer: SequenceNormalizer::new(),
            ready: VecDeque::new(),
            deferred: None,
        }
    }

    pub fn grammar(&self) -> &'g G {
        self.grammar
    }

    /// Characters consumed from the source so far.
    pub fn position(&self) -> usize {
        self.src.position()
    }

    /// Size of the character lookahead window.
    pub fn lookahead(&self) -> usize {
        self.src.lookahead()
    }

    /// Produce one token and feed it to the normalizer, or wind down.
    fn advance(&mut self) {
        match self.produce() {
            Ok(Some(token)) => {
                self.window.push(token);
                if self.window.is_full() {
                    self.normalizer.step(
                        self.grammar,
                        &mut self.window,
                        self.src.position(),
                        &mut self.ready,
                    );
                }
            },
            Ok(None) => {
                if let Some(err) = self.src.take_error() {
                    self.deferred = Some(err.into());
                }
                self.drain();
            },
            Err(err) => {
                log::debug!("tokenizer stopped: {err}");
                self.deferred = Some(err);
                self.drain();
            },
        }
    }

    /// Release everything still held and stop.
    fn drain(&mut self) {
        let position = self.src.position();
        while !self.window.is_empty() {
            self.normalizer
                .step(self.grammar, &mut self.window, position, &mut self.ready);
        }
        self.normalizer.finish(position, &mut self.ready);
        self.pending_ws.clear();
        self.mode = Mode::Exhausted;
    }

    /// Next non-empty production, `None` at end of input.
    fn produce(&mut self) -> Result<Option<String>> {
        let g = self.grammar;
        let d = g.delimiters();
        loop {
            if let Mode::AwaitingEndTag(name) = &self.mode {
                let name = name.clone();
                let mut text = mem::take(&mut self.pending_ws);
                self.raw_text(&name, &mut text);
                self.mode = Mode::Normal;
                if text.is_empty() {
                    continue;
                }
                return Ok(Some(text));
            }

            if self.src.is_exhausted() {
                return Ok(Some(mem::take(&mut self.pending_ws)).filter(|ws| !ws.is_empty()));
            }

            let production = self.production();
            if production != Production::Data && !self.pending_ws.is_empty() {
                return Ok(Some(mem::take(&mut self.pending_ws)));
            }

            let token = match production {
                Production::Comment => self.delimited(d.comment_start, g.comment_closers()),
                Production::ProcessingInstruction => self.delimited(d.pi_start, &[d.pi_end]),
                Production::CData => self.delimited(d.cdata_start, &[d.cdata_end]),
                Production::Dtd => self.declaration(),
                Production::Tag => self.tag()?,
                Production::Data => {
                    let mut text = mem::take(&mut self.pending_ws);
                    self.data(&mut text);
                    text
                },
            };
            if production != Production::Data {
                self.buffer_whitespace();
            }
            if !token.is_empty() {
                return Ok(Some(token));
            }
        }
    }

    /// Which production starts at the read position.
    fn production(&mut self) -> Production {
        let g = self.grammar;
        let d = g.delimiters();
        // Comment before DTD: "<!" prefixes "<!--".
        if self.src.starts_with(d.comment_start, true) {
            return Production::Comment;
        }
        if self.src.starts_with(d.pi_start, true) {
            return Production::ProcessingInstruction;
        }
        // CDATA before DTD: "<!" prefixes "<![CDATA[".
        if self.src.starts_with(d.cdata_start, true) {
            return Production::CData;
        }
        if self.src.starts_with(d.dtd_start, true) {
            return Production::Dtd;
        }
        if self.src.peek() == Some(d.tag_open) {
            match self.src.peek_at(1) {
                Some(c) if g.is_name_start(c) => return Production::Tag,
                Some(c)
                    if c == d.end_tag_marker
                        && self.src.peek_at(2).is_some_and(|n| g.is_name_start(n)) =>
                {
                    return Production::Tag;
                },
                _ => {},
            }
        }
        Production::Data
    }

    /// Whether `ch` can begin a non-data production.
    fn opens_markup(&self, ch: char) -> bool {
        let d = self.grammar.delimiters();
        ch == d.tag_open
            || [d.comment_start, d.pi_start, d.cdata_start, d.dtd_start]
                .iter()
                .any(|opener| opener.starts_with(ch))
    }

    fn take(&mut self, raw: &mut String) -> Option<char> {
        let ch = self.src.read()?;
        raw.push(ch);
        Some(ch)
    }

    fn skip_whitespace(&mut self, raw: &mut String) {
        let g = self.grammar;
        while self.src.peek().is_some_and(|c| g.is_whitespace(c)) {
            self.take(raw);
        }
    }

    fn buffer_whitespace(&mut self) {
        let mut ws = mem::take(&mut self.pending_ws);
        self.skip_whitespace(&mut ws);
        self.pending_ws = ws;
    }

    // -- delimited constructs -----------------------------------------------

    /// Consume `opener` and everything through the first of `closers`.
    fn delimited(&mut self, opener: &str, closers: &[&str]) -> String {
        let mut token = String::new();
        for _ in 0..opener.chars().count() {
            self.take(&mut token);
        }
        let body = token.len();
        loop {
            if closers.iter().any(|c| token[body..].ends_with(c)) {
                return token;
            }
            if self.take(&mut token).is_none() {
                Recovery::PrematureEndOfInput.report(self.src.position(), &token);
                return token;
            }
        }
    }

    /// A declaration through its tag-close, stepping over a bracketed
    /// internal subset such as `<!DOCTYPE r [ <!ENTITY a "b"> ]>`.
    fn declaration(&mut self) -> String {
        let d = self.grammar.delimiters();
        let mut token = String::new();
        for _ in 0..d.dtd_start.chars().count() {
            self.take(&mut token);
        }
        let body = token.len();
        let mut depth = 0usize;
        loop {
            if depth == 0 && token[body..].ends_with(d.dtd_end) {
                return token;
            }
            let Some(ch) = self.take(&mut token) else {
                Recovery::PrematureEndOfInput.report(self.src.position(), &token);
                return token;
            };
            if ch == d.subset_open {
                depth += 1;
            } else if ch == d.subset_close {
                depth = depth.saturating_sub(1);
            }
        }
    }

    // -- character data -----------------------------------------------------

    fn data(&mut self, text: &mut String) {
        let g = self.grammar;
        while let Some(ch) = self.src.peek() {
            if self.opens_markup(ch) && self.production() != Production::Data {
                break;
            }
            if g.correct_char_encoding() {
                self.push_encoded(ch, text);
            } else {
                self.take(text);
            }
        }
    }

    /// Consume `ch` (the next character) and append it in normalized form.
    fn push_encoded(&mut self, ch: char, text: &mut String) {
        let table = self.grammar.entities();
        if ch != '&' {
            self.src.read();
            table.push_escaped(text, ch);
            return;
        }
        match table.match_at(&mut self.src) {
            Some(code) if code.numeric => {
                self.src.skip(code.len);
                table.push_escaped(text, code.ch);
            },
            Some(code) => {
                for _ in 0..code.len {
                    self.take(text);
                }
            },
            None => {
                self.src.read();
                text.push_str(table.encode('&').unwrap_or("&amp;"));
                Recovery::UnrecognizedEntityCode.report(self.src.position(), "bare '&'");
            },
        }
    }

    // -- raw text -----------------------------------------------------------

    /// Append everything up to the end tag of `name` to `text`.
    fn raw_text(&mut self, name: &str, text: &mut String) {
        let tag_open = self.grammar.delimiters().tag_open;
        loop {
            match self.src.peek() {
                None => {
                    Recovery::PrematureEndOfInput
                        .report(self.src.position(), &format!("unclosed <{name}>"));
                    return;
                },
                Some(ch) if ch == tag_open && self.at_end_tag(name) => return,
                Some(_) => {
                    self.take(text);
                },
            }
        }
    }

    /// True at `</name` followed by tag-close or whitespace.
    fn at_end_tag(&mut self, name: &str) -> bool {
        let g = self.grammar;
        let d = g.delimiters();
        if self.src.peek_at(1) != Some(d.end_tag_marker) {
            return false;
        }
        let mut k = 2;
        for expected in name.chars() {
            match self.src.peek_at(k) {
                Some(c) if c == expected => {},
                Some(c) if !g.case_sensitive() && chars_eq_ignore_case(c, expected) => {},
                _ => return false,
            }
            k += 1;
        }
        self.src
            .peek_at(k)
            .is_some_and(|c| c == d.tag_close || g.is_whitespace(c))
    }

    // -- tags ---------------------------------------------------------------

    fn tag(&mut self) -> Result<String> {
        let g = self.grammar;
        let d = g.delimiters();
        let tolerant = g.correct_errors();
        let mut raw = String::new();

        self.take(&mut raw);
        let end = self.src.peek() == Some(d.end_tag_marker);
        if end {
            self.take(&mut raw);
        }
        let mut name = String::new();
        if let Some(first) = self.take(&mut raw) {
            name.push(first);
        }
        while let Some(ch) = self.src.peek().filter(|&c| g.is_name_char(c)) {
            self.take(&mut raw);
            name.push(ch);
        }

        let mut attributes = Vec::new();
        let mut self_closing = false;
        let mut closed = false;
        loop {
            self.skip_whitespace(&mut raw);
            let Some(ch) = self.src.peek() else {
                Recovery::PrematureEndOfInput
                    .report(self.src.position(), &format!("inside <{name}>"));
                break;
            };
            if ch == d.tag_close {
                self.take(&mut raw);
                closed = true;
                break;
            }
            if ch == d.end_tag_marker {
                if self.src.peek_at(1) == Some(d.tag_close) {
                    self.take(&mut raw);
                    self.take(&mut raw);
                    self_closing = true;
                    closed = true;
                    break;
                }
                if !tolerant {
                    return Err(TagsoupError::UnexpectedCharacter {
                        tag: name,
                        found: ch,
                        expected: "'>'",
                        position: self.src.position(),
                    });
                }
                Recovery::MissingAttributeName
                    .report(self.src.position(), &format!("stray '{ch}' in <{name}>"));
                self.take(&mut raw);
                continue;
            }

            let attr_name = self.attribute_name(&mut raw);
            if attr_name.is_empty() {
                if !tolerant {
                    return Err(TagsoupError::MissingAttributeName {
                        tag: name,
                        found: ch,
                        expected: "an attribute name",
                        position: self.src.position(),
                    });
                }
                self.skip_unparsable(&name, &mut raw);
                continue;
            }

            self.skip_whitespace(&mut raw);
            let value = match self.src.peek() {
                Some(c) if c == d.value_separator => {
                    self.take(&mut raw);
                    self.skip_whitespace(&mut raw);
                    Some(self.attribute_value(&name, &attr_name, &mut raw)?)
                },
                Some(c) if tolerant && d.quotes.contains(&c) => {
                    Recovery::UnquotedOrMalformedAttributeValue.report(
                        self.src.position(),
                        &format!("`{attr_name}` in <{name}> has no '{}'", d.value_separator),
                    );
                    Some(self.attribute_value(&name, &attr_name, &mut raw)?)
                },
                _ => None,
            };
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }

        let token = if tolerant {
            let quote_code = |q: char| g.entities().encode(q).map(str::to_string);
            serialize_tag(d, end, &name, &attributes, self_closing, closed, quote_code)
        } else {
            raw
        };

        if !end && !self_closing && !g.is_singular(&name) && g.wait_for_end_tag(&name) {
            self.mode = Mode::AwaitingEndTag(name);
        }
        Ok(token)
    }

    fn attribute_name(&mut self, raw: &mut String) -> String {
        let g = self.grammar;
        let d = g.delimiters();
        let mut name = String::new();
        while let Some(ch) = self.src.peek() {
            if g.is_whitespace(ch)
                || ch == d.tag_close
                || ch == d.tag_open
                || ch == d.end_tag_marker
                || ch == d.value_separator
                || d.quotes.contains(&ch)
            {
                break;
            }
            self.take(raw);
            name.push(ch);
        }
        name
    }

    fn attribute_value(&mut self, tag: &str, attribute: &str, raw: &mut String) -> Result<String> {
        let g = self.grammar;
        let d = g.delimiters();
        let mut value = String::new();

        let Some(quote) = self.src.peek().filter(|c| d.quotes.contains(c)) else {
            while let Some(ch) = self.src.peek() {
                if g.is_whitespace(ch)
                    || ch == d.tag_close
                    || (ch == d.end_tag_marker && self.src.peek_at(1) == Some(d.tag_close))
                {
                    break;
                }
                self.take(raw);
                value.push(ch);
            }
            return Ok(value);
        };

        self.take(raw);
        let tolerant = g.correct_errors();
        let bounded = tolerant && !g.value_may_contain_whitespace(tag, attribute);
        loop {
            let Some(ch) = self.src.peek() else {
                Recovery::PrematureEndOfInput
                    .report(self.src.position(), &format!("inside value of `{attribute}`"));
                break;
            };
            if ch == quote {
                self.take(raw);
                break;
            }
            if ch == d.tag_close && self.is_runaway(quote) {
                if !tolerant {
                    return Err(TagsoupError::MalformedAttributeValue {
                        tag: tag.to_string(),
                        attribute: attribute.to_string(),
                        found: ch,
                        position: self.src.position(),
                    });
                }
                Recovery::UnquotedOrMalformedAttributeValue
                    .report(self.src.position(), &format!("runaway value of `{attribute}`"));
                break;
            }
            if bounded && g.is_whitespace(ch) {
                Recovery::UnquotedOrMalformedAttributeValue.report(
                    self.src.position(),
                    &format!("whitespace in value of `{attribute}`"),
                );
                break;
            }
            self.take(raw);
            value.push(ch);
        }
        Ok(value)
    }

    /// At a tag-close inside a quoted value: true when no matching `quote`
    /// follows in the window before the next tag-open.
    fn is_runaway(&mut self, quote: char) -> bool {
        let tag_open = self.grammar.delimiters().tag_open;
        for k in 1..self.src.lookahead() {
            match self.src.peek_at(k) {
                Some(c) if c == quote => return false,
                Some(c) if c == tag_open => return true,
                Some(_) => {},
                None => return true,
            }
        }
        true
    }

    /// Skip an unparsable attribute span: up to the nearer of the next
    /// tag-close or whitespace followed by a name-start character, or the
    /// whole window when neither is in sight.
    fn skip_unparsable(&mut self, tag: &str, raw: &mut String) {
        let g = self.grammar;
        let d = g.delimiters();
        let window = self.src.lookahead();
        let mut target = window;
        for k in 0..window {
            match self.src.peek_at(k) {
                None => {
                    target = k;
                    break;
                },
                Some(c) if c == d.tag_close => {
                    target = k;
                    break;
                },
                Some(c)
                    if g.is_whitespace(c)
                        && self.src.peek_at(k + 1).is_some_and(|n| g.is_name_start(n)) =>
                {
                    target = k;
                    break;
                },
                Some(_) => {},
            }
        }
        Recovery::MissingAttributeName.report(
            self.src.position(),
            &format!("skipped {target} characters in <{tag}>"),
        );
        for _ in 0..target {
            self.take(raw);
        }
    }
}

impl<S: CharSource, G: Grammar + ?Sized> Iterator for Tokenizer<'_, S, G> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.ready.pop_front() {
                return Some(Ok(token));
            }
            if let Some(err) = self.deferred.take() {
                return Some(Err(err));
            }
            if self.mode == Mode::Exhausted {
                return None;
            }
            self.advance();
        }
    }
}

/// Canonical form of a parsed tag: single spaces, every value quoted,
/// boolean attributes spelled out.
fn serialize_tag(
    d: &Delimiters,
    end: bool,
    name: &str,
    attributes: &[Attribute],
    self_closing: bool,
    closed: bool,
    quote_code: impl Fn(char) -> Option<String>,
) -> String {
    let mut out = String::new();
    out.push(d.tag_open);
    if end {
        out.push(d.end_tag_marker);
    }
    out.push_str(name);
    for attr in attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push(d.value_separator);
        let value = attr.value.as_deref().unwrap_or(&attr.name);
        push_quoted(d, &mut out, value, &quote_code);
    }
    if self_closing {
        out.push(d.end_tag_marker);
    }
    if closed {
        out.push(d.tag_close);
    }
    out
}

fn push_quoted(
    d: &Delimiters,
    out: &mut String,
    value: &str,
    quote_code: &impl Fn(char) -> Option<String>,
) {
    let quote = if value.contains(d.canonical_quote) {
        d.quotes
            .iter()
            .copied()
            .find(|&q| !value.contains(q))
            .unwrap_or(d.canonical_quote)
    } else {
        d.canonical_quote
    };
    out.push(quote);
    for ch in value.chars() {
        if ch == quote {
            match quote_code(ch) {
                Some(code) => out.push_str(&code),
                None => out.push_str(&format!("&#{};", ch as u32)),
            }
        } else {
            out.push(ch);
        }
    }
    out.push(quote);
}

/// Tokenize a whole string.
pub fn tokenize<G: Grammar + ?Sized>(input: &str, grammar: &G) -> Result<Vec<String>> {
    Tokenizer::from_str(input, grammar).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
