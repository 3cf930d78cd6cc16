//! tagsoup core.
//!
//! A forgiving, grammar-parameterized tokenizer for HTML- and XML-like
//! markup. Characters flow from a [`source::CharSource`] through a bounded
//! [`source::LookaheadSource`] into the [`tokenizer::Tokenizer`], which
//! emits tags, text runs, comments, processing instructions and DTD
//! fragments as strings. A [`normalizer::SequenceNormalizer`] repairs
//! adjacent-token anomalies on the way out.
//!
//! Every dialect decision is delegated to a [`grammar::Grammar`]:
//! [`grammar::HtmlGrammar`] repairs malformed input, [`grammar::XmlGrammar`]
//! reports it.

// Re-exports from tagsoup-types (foundation types).
pub use tagsoup_types::config;
pub use tagsoup_types::error;
pub use tagsoup_types::recovery;

pub mod entities;
pub mod grammar;
pub mod normalizer;
pub mod source;
pub mod tokenizer;

pub use error::{Result, TagsoupError};
pub use grammar::{AnyGrammar, Grammar, HtmlGrammar, TokenKind, XmlGrammar};
pub use tokenizer::{Tokenizer, tokenize};
