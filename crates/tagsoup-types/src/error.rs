//! Error types for tagsoup.

use std::io;

/// Errors produced by tagsoup.
///
/// The structural variants are only raised by grammars running in strict
/// mode; tolerant grammars repair the same input silently.
#[derive(Debug, thiserror::Error)]
pub enum TagsoupError {
    #[error(
        "missing attribute name in <{tag}> at offset {position}: found {found:?}, expected {expected}"
    )]
    MissingAttributeName {
        tag: String,
        found: char,
        expected: &'static str,
        position: usize,
    },

    #[error(
        "malformed value for attribute `{attribute}` in <{tag}> at offset {position}: found {found:?}"
    )]
    MalformedAttributeValue {
        tag: String,
        attribute: String,
        found: char,
        position: usize,
    },

    #[error("unexpected {found:?} in <{tag}> at offset {position}: expected {expected}")]
    UnexpectedCharacter {
        tag: String,
        found: char,
        expected: &'static str,
        position: usize,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TagsoupError {
    /// True for errors caused by malformed markup rather than by the
    /// environment (I/O, configuration).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingAttributeName { .. }
                | Self::MalformedAttributeValue { .. }
                | Self::UnexpectedCharacter { .. }
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TagsoupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attribute_name_display() {
        let e = TagsoupError::MissingAttributeName {
            tag: "t".into(),
            found: '"',
            expected: "an attribute name",
            position: 3,
        };
        assert_eq!(
            format!("{e}"),
            "missing attribute name in <t> at offset 3: found '\"', expected an attribute name"
        );
    }

    #[test]
    fn malformed_value_display() {
        let e = TagsoupError::MalformedAttributeValue {
            tag: "a".into(),
            attribute: "href".into(),
            found: '>',
            position: 9,
        };
        assert_eq!(
            format!("{e}"),
            "malformed value for attribute `href` in <a> at offset 9: found '>'"
        );
    }

    #[test]
    fn unexpected_character_display() {
        let e = TagsoupError::UnexpectedCharacter {
            tag: "br".into(),
            found: 'x',
            expected: "'>'",
            position: 4,
        };
        assert_eq!(
            format!("{e}"),
            "unexpected 'x' in <br> at offset 4: expected '>'"
        );
    }

    #[test]
    fn config_error_display() {
        let e = TagsoupError::Config("unknown base".into());
        assert_eq!(format!("{e}"), "config error: unknown base");
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: TagsoupError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
        assert!(!e.is_structural());
    }

    #[test]
    fn toml_error_from_conversion() {
        let bad_toml = "this is [[[not valid toml";
        let toml_err = toml::from_str::<toml::Value>(bad_toml).unwrap_err();
        let e: TagsoupError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: TagsoupError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }

    #[test]
    fn structural_classification() {
        let e = TagsoupError::MissingAttributeName {
            tag: "p".into(),
            found: '=',
            expected: "an attribute name",
            position: 0,
        };
        assert!(e.is_structural());
        assert!(!TagsoupError::Config("x".into()).is_structural());
    }
}
