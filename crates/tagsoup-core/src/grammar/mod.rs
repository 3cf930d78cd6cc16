//! Markup dialects.
//!
//! A [`Grammar`] is a read-only bundle of lexical constants and policy
//! predicates. The tokenizer and the sequence normalizer consult it for every
//! decision that differs between dialects; a tree builder downstream uses the
//! same object to classify tokens and check nesting.
//!
//! Dialects share the [`Delimiters`] base value and differ through their own
//! tables plus an optional [`DialectConfig`] overlay.

pub mod html;
pub mod xml;

pub use html::HtmlGrammar;
pub use xml::XmlGrammar;

use crate::config::{DialectBase, DialectConfig};
use crate::entities::EntityTable;
use crate::source::chars_eq_ignore_case;

// ---------------------------------------------------------------------------
// Delimiters
// ---------------------------------------------------------------------------

/// Lexical delimiters of an SGML-family dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub tag_open: char,
    pub tag_close: char,
    pub end_tag_marker: char,
    pub value_separator: char,
    /// Characters accepted as attribute quotes.
    pub quotes: &'static [char],
    /// Quote used when a tag is re-serialized.
    pub canonical_quote: char,
    pub comment_start: &'static str,
    pub comment_end: &'static str,
    pub pi_start: &'static str,
    pub pi_end: &'static str,
    pub cdata_start: &'static str,
    pub cdata_end: &'static str,
    pub dtd_start: &'static str,
    pub dtd_end: &'static str,
    /// Brackets around a declaration's internal subset.
    pub subset_open: char,
    pub subset_close: char,
}

impl Delimiters {
    /// The delimiters shared by HTML and XML.
    pub const MARKUP: Self = Self {
        tag_open: '<',
        tag_close: '>',
        end_tag_marker: '/',
        value_separator: '=',
        quotes: &['"', '\''],
        canonical_quote: '"',
        comment_start: "<!--",
        comment_end: "-->",
        pi_start: "<?",
        pi_end: "?>",
        cdata_start: "<![CDATA[",
        cdata_end: "]]>",
        dtd_start: "<!",
        dtd_end: ">",
        subset_open: '[',
        subset_close: ']',
    };

    /// Length in characters of the longest multi-character delimiter.
    pub fn longest(&self) -> usize {
        [
            self.comment_start,
            self.comment_end,
            self.pi_start,
            self.pi_end,
            self.cdata_start,
            self.cdata_end,
            self.dtd_start,
            self.dtd_end,
        ]
        .iter()
        .map(|d| d.chars().count())
        .max()
        .unwrap_or(1)
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::MARKUP
    }
}

// ---------------------------------------------------------------------------
// Token classification
// ---------------------------------------------------------------------------

/// Lexical category of an emitted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    StartTag,
    EndTag,
    Text,
    Comment,
    ProcessingInstruction,
    CData,
    Dtd,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartTag => "start-tag",
            Self::EndTag => "end-tag",
            Self::Text => "text",
            Self::Comment => "comment",
            Self::ProcessingInstruction => "pi",
            Self::CData => "cdata",
            Self::Dtd => "dtd",
        }
    }
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

/// Lexical rules and error policy of one markup dialect.
pub trait Grammar {
    fn delimiters(&self) -> &Delimiters;

    fn entities(&self) -> &EntityTable;

    /// Repair structural errors instead of failing.
    fn correct_errors(&self) -> bool;

    /// Normalize entity codes in character data.
    fn correct_char_encoding(&self) -> bool;

    /// Whether element and attribute names are case-sensitive.
    fn case_sensitive(&self) -> bool;

    /// Whether the body of `tag` is captured as opaque text up to its
    /// literal end tag.
    fn wait_for_end_tag(&self, tag: &str) -> bool;

    /// Whether `tag` never takes an end tag.
    fn is_singular(&self, tag: &str) -> bool;

    /// Advisory nesting rule for tree builders.
    fn can_be_child_of(&self, child: &str, parent: &str) -> bool;

    /// Whether a value of `attribute` on `tag` may legitimately contain
    /// whitespace. Runaway-quote recovery stops at whitespace when it may
    /// not.
    fn value_may_contain_whitespace(&self, tag: &str, attribute: &str) -> bool;

    /// Length of the longest element name that
    /// [`wait_for_end_tag`](Self::wait_for_end_tag) accepts.
    fn longest_raw_text_name(&self) -> usize {
        0
    }

    fn is_whitespace(&self, ch: char) -> bool {
        ch.is_whitespace()
    }

    fn is_name_start(&self, ch: char) -> bool {
        ch.is_alphabetic() || ch == '_' || ch == ':'
    }

    fn is_name_char(&self, ch: char) -> bool {
        ch.is_alphanumeric() || matches!(ch, '_' | ':' | '-' | '.')
    }

    /// Characters the tokenizer must be able to see ahead.
    fn char_lookahead(&self) -> usize {
        self.delimiters()
            .longest()
            .max(self.entities().max_code_len())
    }

    /// Tokens the sequence normalizer may inspect ahead of the one it
    /// releases.
    fn token_lookahead(&self) -> usize {
        0
    }

    /// Whether tokens between a start tag of `tag` and its end tag are
    /// merged into one text token.
    fn reassembles_body(&self, tag: &str) -> bool {
        self.wait_for_end_tag(tag)
    }

    /// Whether two consecutive end tags of `tag` are legitimate.
    fn may_repeat_end_tag(&self, tag: &str) -> bool {
        self.can_be_child_of(tag, tag)
    }

    /// Sequences that end a comment. The first is the canonical closer.
    fn comment_closers(&self) -> &[&'static str] {
        std::slice::from_ref(&self.delimiters().comment_end)
    }

    /// Rewrite a token carrying damaged comment delimiters. `None` leaves the
    /// token alone.
    fn repair_comment(&self, _token: &str) -> Option<String> {
        None
    }

    /// Canonical element type for a raw tag name.
    fn canonical_name(&self, name: &str) -> String {
        if self.case_sensitive() {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Classify an emitted token.
    fn classify(&self, token: &str) -> TokenKind {
        let d = self.delimiters();
        if token.starts_with(d.comment_start) {
            return TokenKind::Comment;
        }
        if token.starts_with(d.pi_start) {
            return TokenKind::ProcessingInstruction;
        }
        if token.starts_with(d.cdata_start) {
            return TokenKind::CData;
        }
        if token.starts_with(d.dtd_start) {
            return TokenKind::Dtd;
        }
        let mut chars = token.chars();
        if chars.next() != Some(d.tag_open) {
            return TokenKind::Text;
        }
        match chars.next() {
            Some(c) if c == d.end_tag_marker => match chars.next() {
                Some(n) if self.is_name_start(n) => TokenKind::EndTag,
                _ => TokenKind::Text,
            },
            Some(c) if self.is_name_start(c) => TokenKind::StartTag,
            _ => TokenKind::Text,
        }
    }

    fn is_tag(&self, token: &str) -> bool {
        matches!(self.classify(token), TokenKind::StartTag | TokenKind::EndTag)
    }

    fn is_end_tag(&self, token: &str) -> bool {
        self.classify(token) == TokenKind::EndTag
    }

    /// The element name as written in a tag token.
    fn tag_name<'t>(&self, token: &'t str) -> Option<&'t str> {
        if !self.is_tag(token) {
            return None;
        }
        let d = self.delimiters();
        let rest = token.strip_prefix(d.tag_open)?;
        let rest = rest.strip_prefix(d.end_tag_marker).unwrap_or(rest);
        let end = rest
            .char_indices()
            .find(|&(_, c)| !self.is_name_char(c))
            .map_or(rest.len(), |(i, _)| i);
        Some(&rest[..end])
    }

    /// Canonical element type of a tag token.
    fn tag_type(&self, token: &str) -> Option<String> {
        self.tag_name(token).map(|name| self.canonical_name(name))
    }
}

/// Compare element names the way end tags are matched: ignoring case.
pub fn names_match(a: &str, b: &str) -> bool {
    a.chars().count() == b.chars().count()
        && a.chars().zip(b.chars()).all(|(x, y)| chars_eq_ignore_case(x, y))
}

// ---------------------------------------------------------------------------
// Dialect selection
// ---------------------------------------------------------------------------

/// A dialect chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyGrammar {
    Html(HtmlGrammar),
    Xml(XmlGrammar),
}

impl AnyGrammar {
    /// Build the configured base dialect with the overlay applied.
    pub fn from_config(config: &DialectConfig) -> Self {
        match config.base {
            DialectBase::Html => Self::Html(HtmlGrammar::with_config(config)),
            DialectBase::Xml => Self::Xml(XmlGrammar::with_config(config)),
        }
    }

    pub fn grammar(&self) -> &dyn Grammar {
        match self {
            Self::Html(g) => g,
            Self::Xml(g) => g,
        }
    }
}
