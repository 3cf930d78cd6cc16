//! Permissive HTML dialect.

use std::collections::{HashMap, HashSet};

use super::{Delimiters, Grammar};
use crate::config::DialectConfig;
use crate::entities::EntityTable;

/// Elements whose body the tokenizer captures as opaque text.
const RAW_TEXT: &[&str] = &[
    "script", "style", "pre", "xmp", "plaintext", "noscript", "noembed", "noframes", "iframe",
];

/// Elements whose body is tokenized normally and merged afterwards.
const REASSEMBLED: &[&str] = &["title", "textarea"];

/// Elements that never take an end tag.
const SINGULAR: &[&str] = &[
    "area", "base", "basefont", "br", "col", "embed", "frame", "hr", "img", "input", "isindex",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Attributes whose values never contain whitespace, even when quoted.
const WHITESPACE_FREE: &[&str] = &[
    "id", "href", "src", "name", "type", "width", "height", "size", "maxlength", "colspan",
    "rowspan", "tabindex", "action", "method", "for", "lang",
];

/// Historical aliases and the element type they stand for.
const RENAMES: &[(&str, &str)] = &[
    ("image", "img"),
    ("listing", "pre"),
    ("xmp", "pre"),
    ("strike", "s"),
    ("dir", "ul"),
    ("menu", "ul"),
];

/// Containers that may enclose a paragraph.
const FLOW_CONTAINERS: &[&str] = &[
    "body", "div", "td", "th", "li", "dd", "blockquote", "form", "section", "article", "aside",
    "header", "footer", "main", "nav", "fieldset", "figure", "center", "details", "dialog",
    "noscript", "object", "caption", "address",
];

/// Legal parent types per element type. Types missing here may appear
/// anywhere.
const PARENTS: &[(&str, &[&str])] = &[
    ("html", &[]),
    ("head", &["html"]),
    ("body", &["html"]),
    ("title", &["head"]),
    ("base", &["head"]),
    ("li", &["ul", "ol"]),
    ("dt", &["dl"]),
    ("dd", &["dl"]),
    ("thead", &["table"]),
    ("tbody", &["table"]),
    ("tfoot", &["table"]),
    ("caption", &["table"]),
    ("colgroup", &["table"]),
    ("col", &["colgroup", "table"]),
    ("tr", &["table", "thead", "tbody", "tfoot"]),
    ("td", &["tr"]),
    ("th", &["tr"]),
    ("option", &["select", "optgroup", "datalist"]),
    ("optgroup", &["select"]),
    ("param", &["object", "applet"]),
    ("area", &["map"]),
    ("source", &["video", "audio", "picture"]),
    ("track", &["video", "audio"]),
    ("legend", &["fieldset"]),
    ("figcaption", &["figure"]),
    ("summary", &["details"]),
    ("p", FLOW_CONTAINERS),
];

/// Comment closers accepted while repairing: the standard one first.
const COMMENT_CLOSERS: &[&str] = &["-->", "--!>", "-- >"];

/// Default character window: wide enough to find a closing quote a few
/// dozen characters away during attribute recovery.
const DEFAULT_CHAR_LOOKAHEAD: usize = 64;

/// Permissive HTML grammar.
///
/// Tolerant by default: structural errors are repaired, entity codes in text
/// are normalized, duplicate end tags collapse and damaged comment markers
/// are rewritten. Element and attribute names are case-insensitive.
#[derive(Debug, Clone)]
pub struct HtmlGrammar {
    delimiters: Delimiters,
    correct_errors: bool,
    correct_char_encoding: bool,
    raw_text: HashSet<String>,
    reassembled: HashSet<String>,
    singular: HashSet<String>,
    whitespace_free: HashSet<String>,
    parents: HashMap<&'static str, &'static [&'static str]>,
    renames: HashMap<&'static str, &'static str>,
    entities: EntityTable,
    min_char_lookahead: usize,
}

impl Default for HtmlGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlGrammar {
    pub fn new() -> Self {
        Self {
            delimiters: Delimiters::MARKUP,
            correct_errors: true,
            correct_char_encoding: true,
            raw_text: owned_set(RAW_TEXT),
            reassembled: owned_set(REASSEMBLED),
            singular: owned_set(SINGULAR),
            whitespace_free: owned_set(WHITESPACE_FREE),
            parents: PARENTS.iter().copied().collect(),
            renames: RENAMES.iter().copied().collect(),
            entities: EntityTable::html(),
            min_char_lookahead: DEFAULT_CHAR_LOOKAHEAD,
        }
    }

    /// The default dialect with a configuration overlay applied. The
    /// configured base is not consulted.
    pub fn with_config(config: &DialectConfig) -> Self {
        let mut grammar = Self::new();
        if let Some(on) = config.correct_errors {
            grammar.correct_errors = on;
        }
        if let Some(on) = config.correct_char_encoding {
            grammar.correct_char_encoding = on;
        }
        extend_lowercase(&mut grammar.raw_text, &config.raw_text_elements);
        extend_lowercase(&mut grammar.singular, &config.singular_elements);
        extend_lowercase(&mut grammar.whitespace_free, &config.whitespace_free_attributes);
        if let Some(n) = config.char_lookahead {
            grammar.min_char_lookahead = n;
        }
        grammar
    }

    /// Toggle structural error correction.
    pub fn with_error_correction(mut self, on: bool) -> Self {
        self.correct_errors = on;
        self
    }

    /// Toggle entity normalization in character data.
    pub fn with_char_encoding_correction(mut self, on: bool) -> Self {
        self.correct_char_encoding = on;
        self
    }

    /// Canonical type for a possibly aliased element name.
    pub fn rename(&self, tag: &str) -> String {
        let lower = tag.to_lowercase();
        match self.renames.get(lower.as_str()) {
            Some(&canonical) => canonical.to_string(),
            None => lower,
        }
    }

    /// Legal parent types for `tag`, if the table restricts it.
    pub fn legal_parents(&self, tag: &str) -> Option<&'static [&'static str]> {
        self.parents.get(self.rename(tag).as_str()).copied()
    }
}

fn owned_set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn extend_lowercase(set: &mut HashSet<String>, names: &[String]) {
    set.extend(names.iter().map(|n| n.to_lowercase()));
}

impl Grammar for HtmlGrammar {
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
        false
    }

    fn wait_for_end_tag(&self, tag: &str) -> bool {
        let lower = tag.to_lowercase();
        self.raw_text.contains(&lower) && !self.singular.contains(&lower)
    }

    fn is_singular(&self, tag: &str) -> bool {
        self.singular.contains(&tag.to_lowercase())
    }

    fn can_be_child_of(&self, child: &str, parent: &str) -> bool {
        match self.legal_parents(child) {
            Some(parents) => parents.contains(&self.rename(parent).as_str()),
            None => true,
        }
    }

    fn value_may_contain_whitespace(&self, _tag: &str, attribute: &str) -> bool {
        !self.whitespace_free.contains(&attribute.to_lowercase())
    }

    fn is_whitespace(&self, ch: char) -> bool {
        matches!(ch, ' ' | '\t' | '\n' | '\r' | '\u{0C}')
    }

    fn longest_raw_text_name(&self) -> usize {
        self.raw_text
            .iter()
            .map(|n| n.chars().count())
            .max()
            .unwrap_or(0)
    }

    fn char_lookahead(&self) -> usize {
        self.delimiters
            .longest()
            .max(self.entities.max_code_len())
            .max(self.min_char_lookahead)
    }

    fn token_lookahead(&self) -> usize {
        1
    }

    fn reassembles_body(&self, tag: &str) -> bool {
        self.reassembled.contains(&tag.to_lowercase()) || self.wait_for_end_tag(tag)
    }

    fn comment_closers(&self) -> &[&'static str] {
        if self.correct_errors {
            COMMENT_CLOSERS
        } else {
            std::slice::from_ref(&self.delimiters.comment_end)
        }
    }

    fn repair_comment(&self, token: &str) -> Option<String> {
        if !self.correct_errors {
            return None;
        }
        let d = &self.delimiters;
        if token.starts_with(d.comment_start) && token.ends_with(d.comment_end) {
            return None;
        }
        // "<!-" for the standard opener.
        let mut opener = d.comment_start.chars();
        opener.next_back();
        let rest = token.strip_prefix(opener.as_str())?;
        let rest = rest.trim_start_matches('-');
        let body = ["--!>", "-- >", "->"]
            .iter()
            .find_map(|closer| rest.strip_suffix(closer))?;
        let body = body.trim_end_matches('-');
        // A closer inside the body would end the rewritten comment early.
        if COMMENT_CLOSERS.iter().any(|closer| body.contains(closer)) {
            return None;
        }
        Some(format!("{}{body}{}", d.comment_start, d.comment_end))
    }

    fn canonical_name(&self, name: &str) -> String {
        self.rename(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_tolerant() {
        let g = HtmlGrammar::new();
        assert!(g.correct_errors());
        assert!(g.correct_char_encoding());
        assert!(!g.case_sensitive());
        assert_eq!(g.token_lookahead(), 1);
        assert!(g.char_lookahead() >= DEFAULT_CHAR_LOOKAHEAD);
    }

    #[test]
    fn raw_text_and_singular() {
        let g = HtmlGrammar::new();
        assert!(g.wait_for_end_tag("script"));
        assert!(g.wait_for_end_tag("STYLE"));
        assert!(g.wait_for_end_tag("pre"));
        assert!(!g.wait_for_end_tag("div"));
        assert!(!g.wait_for_end_tag("title"));
        assert!(g.reassembles_body("title"));
        assert!(g.reassembles_body("script"));
        assert!(g.is_singular("br"));
        assert!(g.is_singular("IMG"));
        assert!(!g.is_singular("p"));
        assert!(!g.wait_for_end_tag("br"));
        assert_eq!(g.longest_raw_text_name(), "plaintext".len());
    }

    #[test]
    fn nesting_table_is_advisory() {
        let g = HtmlGrammar::new();
        assert!(g.can_be_child_of("li", "ul"));
        assert!(g.can_be_child_of("LI", "OL"));
        assert!(g.can_be_child_of("li", "menu"));
        assert!(!g.can_be_child_of("li", "div"));
        assert!(!g.can_be_child_of("td", "table"));
        assert!(g.can_be_child_of("p", "div"));
        assert!(!g.can_be_child_of("p", "p"));
        assert!(!g.can_be_child_of("html", "body"));
        assert!(g.can_be_child_of("custom-element", "anything"));
    }

    #[test]
    fn repeated_end_tags_follow_nesting() {
        let g = HtmlGrammar::new();
        assert!(!g.may_repeat_end_tag("li"));
        assert!(!g.may_repeat_end_tag("p"));
        assert!(!g.may_repeat_end_tag("option"));
        assert!(g.may_repeat_end_tag("div"));
        assert!(g.may_repeat_end_tag("span"));
    }

    #[test]
    fn renames() {
        let g = HtmlGrammar::new();
        assert_eq!(g.rename("IMAGE"), "img");
        assert_eq!(g.rename("strike"), "s");
        assert_eq!(g.rename("div"), "div");
        assert_eq!(g.tag_type("<Listing>"), Some("pre".to_string()));
        assert_eq!(g.legal_parents("dir"), None);
    }

    #[test]
    fn html_whitespace_is_ascii() {
        let g = HtmlGrammar::new();
        assert!(g.is_whitespace('\u{0C}'));
        assert!(g.is_whitespace('\n'));
        assert!(!g.is_whitespace('\u{00A0}'));
    }

    #[test]
    fn tolerant_comment_closers() {
        assert_eq!(HtmlGrammar::new().comment_closers().len(), 3);
        let strict = HtmlGrammar::new().with_error_correction(false);
        assert_eq!(strict.comment_closers(), &["-->"]);
    }

    #[test]
    fn whitespace_free_attributes() {
        let g = HtmlGrammar::new();
        assert!(!g.value_may_contain_whitespace("a", "href"));
        assert!(!g.value_may_contain_whitespace("div", "ID"));
        assert!(g.value_may_contain_whitespace("div", "class"));
        assert!(g.value_may_contain_whitespace("img", "alt"));
    }

    #[test]
    fn comment_repair() {
        let g = HtmlGrammar::new();
        assert_eq!(g.repair_comment("<!-- fine -->"), None);
        assert_eq!(g.repair_comment("<!- a ->"), Some("<!-- a -->".to_string()));
        assert_eq!(g.repair_comment("<!- a -- >"), Some("<!-- a -->".to_string()));
        assert_eq!(g.repair_comment("<!-a--!>"), Some("<!--a-->".to_string()));
        assert_eq!(g.repair_comment("<!-x>"), None);
        assert_eq!(g.repair_comment("<!- [ -- > ] ->"), None);
        assert_eq!(g.repair_comment("<!- [ > ] ->"), Some("<!-- [ > ] -->".to_string()));
        assert_eq!(g.repair_comment("<!DOCTYPE html>"), None);
        assert_eq!(g.repair_comment("<p>"), None);

        let strict = HtmlGrammar::new().with_error_correction(false);
        assert_eq!(strict.repair_comment("<!- a ->"), None);
    }

    #[test]
    fn config_overlay() {
        let cfg = DialectConfig {
            correct_errors: Some(false),
            correct_char_encoding: Some(false),
            raw_text_elements: vec!["Template".into()],
            singular_elements: vec!["command".into()],
            whitespace_free_attributes: vec!["data-id".into()],
            char_lookahead: Some(128),
            ..DialectConfig::default()
        };
        let g = HtmlGrammar::with_config(&cfg);
        assert!(!g.correct_errors());
        assert!(!g.correct_char_encoding());
        assert!(g.wait_for_end_tag("template"));
        assert!(g.is_singular("command"));
        assert!(!g.value_may_contain_whitespace("div", "data-id"));
        assert_eq!(g.char_lookahead(), 128);
        assert!(g.wait_for_end_tag("script"));
    }

    #[test]
    fn singular_overrides_raw_text() {
        let cfg = DialectConfig {
            singular_elements: vec!["script".into()],
            ..DialectConfig::default()
        };
        let g = HtmlGrammar::with_config(&cfg);
        assert!(!g.wait_for_end_tag("script"));
    }
}
