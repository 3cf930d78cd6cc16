//! Strict XML dialect.

use std::collections::HashSet;

use super::{Delimiters, Grammar};
use crate::config::DialectConfig;
use crate::entities::EntityTable;

/// XML grammar: structural errors are fatal, names are case-sensitive and
/// character data passes through untouched. A configuration overlay may still
/// declare raw-text or singular elements for XML-like formats that need them.
#[derive(Debug, Clone)]
pub struct XmlGrammar {
    delimiters: Delimiters,
    correct_errors: bool,
    correct_char_encoding: bool,
    raw_text: HashSet<String>,
    singular: HashSet<String>,
    whitespace_free: HashSet<String>,
    entities: EntityTable,
    min_char_lookahead: usize,
}

impl Default for XmlGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlGrammar {
    pub fn new() -> Self {
        Self {
            delimiters: Delimiters::MARKUP,
            correct_errors: false,
            correct_char_encoding: false,
            raw_text: HashSet::new(),
            singular: HashSet::new(),
            whitespace_free: HashSet::new(),
            entities: EntityTable::xml(),
            min_char_lookahead: 0,
        }
    }

    pub fn with_config(config: &DialectConfig) -> Self {
        let mut grammar = Self::new();
        if let Some(on) = config.correct_errors {
            grammar.correct_errors = on;
        }
        if let Some(on) = config.correct_char_encoding {
            grammar.correct_char_encoding = on;
        }
        grammar.raw_text.extend(config.raw_text_elements.iter().cloned());
        grammar.singular.extend(config.singular_elements.iter().cloned());
        grammar
            .whitespace_free
            .extend(config.whitespace_free_attributes.iter().cloned());
        if let Some(n) = config.char_lookahead {
            grammar.min_char_lookahead = n;
        }
        grammar
    }
}

impl Grammar for XmlGrammar {
    fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    fn entities(&self) -> &EntityTable {
        &self.entities
    }

    fn correct_errors(&self) -> bool {
        self.correct_errors
    }

    fn correct_char_encoding(&self) -> bool {
        self.correct_char_encoding
    }

    fn case_sensitive(&self) -> bool {
        true
    }

    fn wait_for_end_tag(&self, tag: &str) -> bool {
        self.raw_text.contains(tag) && !self.singular.contains(tag)
    }

    fn is_singular(&self, tag: &str) -> bool {
        self.singular.contains(tag)
    }

    fn can_be_child_of(&self, _child: &str, _parent: &str) -> bool {
        true
    }

    fn value_may_contain_whitespace(&self, _tag: &str, attribute: &str) -> bool {
        !self.whitespace_free.contains(attribute)
    }

    fn longest_raw_text_name(&self) -> usize {
        self.raw_text
            .iter()
            .map(|n| n.chars().count())
            .max()
            .unwrap_or(0)
    }

    fn is_whitespace(&self, ch: char) -> bool {
        matches!(ch, ' ' | '\t' | '\r' | '\n')
    }

    fn char_lookahead(&self) -> usize {
        self.delimiters
            .longest()
            .max(self.entities.max_code_len())
            .max(self.min_char_lookahead)
    }
}
