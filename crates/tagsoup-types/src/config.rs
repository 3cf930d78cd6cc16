//! Dialect configuration loaded from TOML.
//!
//! A [`DialectConfig`] names a base dialect and an overlay of policy
//! overrides. Grammars apply the overlay on top of their built-in tables, so
//! a custom dialect is "HTML, but with `<template>` as raw text" rather than
//! a new grammar type.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TagsoupError};

/// Upper bound for `char_lookahead`; the window is held in memory.
pub const MAX_CHAR_LOOKAHEAD: usize = 64 * 1024;

/// Built-in dialect a configuration starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectBase {
    /// Permissive HTML: tolerant, entity normalization on.
    #[default]
    Html,
    /// Strict XML: structural errors are fatal, text passes through.
    Xml,
}

/// Overrides applied on top of a base dialect.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DialectConfig {
    pub base: DialectBase,
    /// Repair structural errors instead of failing.
    pub correct_errors: Option<bool>,
    /// Normalize entity codes in character data.
    pub correct_char_encoding: Option<bool>,
    /// Extra elements whose body is captured as opaque text.
    pub raw_text_elements: Vec<String>,
    /// Extra elements that never take an end tag.
    pub singular_elements: Vec<String>,
    /// Extra attributes whose values never contain whitespace.
    pub whitespace_free_attributes: Vec<String>,
    /// Minimum character lookahead window.
    pub char_lookahead: Option<usize>,
}

impl DialectConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file. `.json` files are read as JSON,
    /// anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_toml_str(&text)?,
        };
        log::debug!("loaded dialect config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.char_lookahead {
            Some(0) => {
                return Err(TagsoupError::Config(
                    "char_lookahead must be at least 1".into(),
                ));
            },
            Some(n) if n > MAX_CHAR_LOOKAHEAD => {
                return Err(TagsoupError::Config(format!(
                    "char_lookahead must be at most {MAX_CHAR_LOOKAHEAD}, got {n}"
                )));
            },
            _ => {},
        }
        let lists = [
            ("raw_text_elements", &self.raw_text_elements),
            ("singular_elements", &self.singular_elements),
            ("whitespace_free_attributes", &self.whitespace_free_attributes),
        ];
        for (key, names) in lists {
            if let Some(bad) = names.iter().find(|n| !is_plain_name(n)) {
                return Err(TagsoupError::Config(format!(
                    "{key}: `{bad}` is not a valid element or attribute name"
                )));
            }
        }
        if let Some(both) = self
            .raw_text_elements
            .iter()
            .find(|n| self.singular_elements.contains(n))
        {
            log::warn!("`{both}` is both raw-text and singular; singular wins");
        }
        Ok(())
    }
}

/// Names in configuration use the same alphabet as tag names.
fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {},
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}
