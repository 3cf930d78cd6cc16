//! Kinds of malformed input that tolerant grammars repair.
//!
//! Recoveries never reach the caller as errors. The tokenizer reports each
//! one through `log::debug!` so a run with `RUST_LOG=debug` shows where the
//! input was bent back into shape.

use std::fmt;

/// A category of repaired input error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// Attribute position held something that is not an attribute name.
    MissingAttributeName,
    /// Attribute value with a missing or runaway quote.
    UnquotedOrMalformedAttributeValue,
    /// `&` that does not start a known entity code.
    UnrecognizedEntityCode,
    /// Input ended inside a tag, comment, or other construct.
    PrematureEndOfInput,
    /// End tag repeated where the element cannot be its own child.
    MismatchedOrDuplicateEndTag,
    /// Comment opened or closed with a damaged marker.
    MalformedCommentDelimiter,
}

impl Recovery {
    /// Short stable name, used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingAttributeName => "missing-attribute-name",
            Self::UnquotedOrMalformedAttributeValue => "malformed-attribute-value",
            Self::UnrecognizedEntityCode => "unrecognized-entity",
            Self::PrematureEndOfInput => "premature-eof",
            Self::MismatchedOrDuplicateEndTag => "duplicate-end-tag",
            Self::MalformedCommentDelimiter => "malformed-comment",
        }
    }

    /// Log a recovery at `position` (characters consumed so far).
    pub fn report(self, position: usize, detail: &str) {
        log::debug!("recovered {} at offset {position}: {detail}", self.as_str());
    }
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
