//! Entity tables: literal characters and their escaped codes.
//!
//! Names are case-sensitive, as in HTML and XML. Codes are stored in full
//! textual form (`&lt;`), so a table answers both "how is `<` written" and
//! "what does `&lt;` mean". Numeric codes (`&#60;`, `&#x3c;`) are decoded
//! arithmetically and never stored.

use std::collections::HashMap;

use crate::source::{CharSource, LookaheadSource};

/// Length of the longest numeric code, `&#x10FFFF;` / `&#1114111;`.
const MAX_NUMERIC_CODE_LEN: usize = 10;

/// XML predefined entities.
const XML_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
];

/// HTML named character references.
const HTML_ENTITIES: &[(&str, char)] = &[
    // ---- Essential / XML predefined -----------------------------------
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{00A0}'),
    // ---- Whitespace and formatting ------------------------------------
    ("ensp", '\u{2002}'),
    ("emsp", '\u{2003}'),
    ("thinsp", '\u{2009}'),
    ("zwnj", '\u{200C}'),
    ("zwj", '\u{200D}'),
    ("lrm", '\u{200E}'),
    ("rlm", '\u{200F}'),
    ("shy", '\u{00AD}'),
    // ---- Typography ---------------------------------------------------
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("sbquo", '\u{201A}'),
    ("ldquo", '\u{201C}'),
    ("rdquo", '\u{201D}'),
    ("bdquo", '\u{201E}'),
    ("hellip", '\u{2026}'),
    ("bull", '\u{2022}'),
    ("middot", '\u{00B7}'),
    ("laquo", '\u{00AB}'),
    ("raquo", '\u{00BB}'),
    ("iexcl", '\u{00A1}'),
    ("iquest", '\u{00BF}'),
    ("dagger", '\u{2020}'),
    ("Dagger", '\u{2021}'),
    ("permil", '\u{2030}'),
    ("prime", '\u{2032}'),
    ("Prime", '\u{2033}'),
    // ---- Symbols ------------------------------------------------------
    ("copy", '\u{00A9}'),
    ("reg", '\u{00AE}'),
    ("trade", '\u{2122}'),
    ("times", '\u{00D7}'),
    ("divide", '\u{00F7}'),
    ("plusmn", '\u{00B1}'),
    ("deg", '\u{00B0}'),
    ("micro", '\u{00B5}'),
    ("para", '\u{00B6}'),
    ("sect", '\u{00A7}'),
    ("cent", '\u{00A2}'),
    ("pound", '\u{00A3}'),
    ("yen", '\u{00A5}'),
    ("euro", '\u{20AC}'),
    ("curren", '\u{00A4}'),
    ("brvbar", '\u{00A6}'),
    ("uml", '\u{00A8}'),
    ("ordf", '\u{00AA}'),
    ("not", '\u{00AC}'),
    ("macr", '\u{00AF}'),
    ("sup1", '\u{00B9}'),
    ("sup2", '\u{00B2}'),
    ("sup3", '\u{00B3}'),
    ("acute", '\u{00B4}'),
    ("cedil", '\u{00B8}'),
    ("ordm", '\u{00BA}'),
    // ---- Arrows -------------------------------------------------------
    ("larr", '\u{2190}'),
    ("uarr", '\u{2191}'),
    ("rarr", '\u{2192}'),
    ("darr", '\u{2193}'),
    ("harr", '\u{2194}'),
    // ---- Math ---------------------------------------------------------
    ("frac14", '\u{00BC}'),
    ("frac12", '\u{00BD}'),
    ("frac34", '\u{00BE}'),
    ("ne", '\u{2260}'),
    ("le", '\u{2264}'),
    ("ge", '\u{2265}'),
    ("infin", '\u{221E}'),
    ("sum", '\u{2211}'),
    ("prod", '\u{220F}'),
    ("radic", '\u{221A}'),
    ("minus", '\u{2212}'),
    ("lowast", '\u{2217}'),
    ("sim", '\u{223C}'),
    ("asymp", '\u{2248}'),
    ("equiv", '\u{2261}'),
    ("fnof", '\u{0192}'),
    // ---- Accented Latin (uppercase) -----------------------------------
    ("Agrave", '\u{00C0}'),
    ("Aacute", '\u{00C1}'),
    ("Acirc", '\u{00C2}'),
    ("Atilde", '\u{00C3}'),
    ("Auml", '\u{00C4}'),
    ("Aring", '\u{00C5}'),
    ("AElig", '\u{00C6}'),
    ("Ccedil", '\u{00C7}'),
    ("Egrave", '\u{00C8}'),
    ("Eacute", '\u{00C9}'),
    ("Ecirc", '\u{00CA}'),
    ("Euml", '\u{00CB}'),
    ("Igrave", '\u{00CC}'),
    ("Iacute", '\u{00CD}'),
    ("Icirc", '\u{00CE}'),
    ("Iuml", '\u{00CF}'),
    ("ETH", '\u{00D0}'),
    ("Ntilde", '\u{00D1}'),
    ("Ograve", '\u{00D2}'),
    ("Oacute", '\u{00D3}'),
    ("Ocirc", '\u{00D4}'),
    ("Otilde", '\u{00D5}'),
    ("Ouml", '\u{00D6}'),
    ("Oslash", '\u{00D8}'),
    ("Ugrave", '\u{00D9}'),
    ("Uacute", '\u{00DA}'),
    ("Ucirc", '\u{00DB}'),
    ("Uuml", '\u{00DC}'),
    ("Yacute", '\u{00DD}'),
    ("THORN", '\u{00DE}'),
    // ---- Accented Latin (lowercase) -----------------------------------
    ("szlig", '\u{00DF}'),
    ("agrave", '\u{00E0}'),
    ("aacute", '\u{00E1}'),
    ("acirc", '\u{00E2}'),
    ("atilde", '\u{00E3}'),
    ("auml", '\u{00E4}'),
    ("aring", '\u{00E5}'),
    ("aelig", '\u{00E6}'),
    ("ccedil", '\u{00E7}'),
    ("egrave", '\u{00E8}'),
    ("eacute", '\u{00E9}'),
    ("ecirc", '\u{00EA}'),
    ("euml", '\u{00EB}'),
    ("igrave", '\u{00EC}'),
    ("iacute", '\u{00ED}'),
    ("icirc", '\u{00EE}'),
    ("iuml", '\u{00EF}'),
    ("eth", '\u{00F0}'),
    ("ntilde", '\u{00F1}'),
    ("ograve", '\u{00F2}'),
    ("oacute", '\u{00F3}'),
    ("ocirc", '\u{00F4}'),
    ("otilde", '\u{00F5}'),
    ("ouml", '\u{00F6}'),
    ("oslash", '\u{00F8}'),
    ("ugrave", '\u{00F9}'),
    ("uacute", '\u{00FA}'),
    ("ucirc", '\u{00FB}'),
    ("uuml", '\u{00FC}'),
    ("yacute", '\u{00FD}'),
    ("thorn", '\u{00FE}'),
    ("yuml", '\u{00FF}'),
    // ---- Greek (uppercase) --------------------------------------------
    ("Alpha", '\u{0391}'),
    ("Beta", '\u{0392}'),
    ("Gamma", '\u{0393}'),
    ("Delta", '\u{0394}'),
    ("Epsilon", '\u{0395}'),
    ("Zeta", '\u{0396}'),
    ("Eta", '\u{0397}'),
    ("Theta", '\u{0398}'),
    ("Iota", '\u{0399}'),
    ("Kappa", '\u{039A}'),
    ("Lambda", '\u{039B}'),
    ("Mu", '\u{039C}'),
    ("Nu", '\u{039D}'),
    ("Xi", '\u{039E}'),
    ("Omicron", '\u{039F}'),
    ("Pi", '\u{03A0}'),
    ("Rho", '\u{03A1}'),
    ("Sigma", '\u{03A3}'),
    ("Tau", '\u{03A4}'),
    ("Upsilon", '\u{03A5}'),
    ("Phi", '\u{03A6}'),
    ("Chi", '\u{03A7}'),
    ("Psi", '\u{03A8}'),
    ("Omega", '\u{03A9}'),
    // ---- Greek (lowercase) --------------------------------------------
    ("alpha", '\u{03B1}'),
    ("beta", '\u{03B2}'),
    ("gamma", '\u{03B3}'),
    ("delta", '\u{03B4}'),
    ("epsilon", '\u{03B5}'),
    ("zeta", '\u{03B6}'),
    ("eta", '\u{03B7}'),
    ("theta", '\u{03B8}'),
    ("iota", '\u{03B9}'),
    ("kappa", '\u{03BA}'),
    ("lambda", '\u{03BB}'),
    ("mu", '\u{03BC}'),
    ("nu", '\u{03BD}'),
    ("xi", '\u{03BE}'),
    ("omicron", '\u{03BF}'),
    ("pi", '\u{03C0}'),
    ("rho", '\u{03C1}'),
    ("sigmaf", '\u{03C2}'),
    ("sigma", '\u{03C3}'),
    ("tau", '\u{03C4}'),
    ("upsilon", '\u{03C5}'),
    ("phi", '\u{03C6}'),
    ("chi", '\u{03C7}'),
    ("psi", '\u{03C8}'),
    ("omega", '\u{03C9}'),
];

/// An entity code found at the read position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMatch {
    /// Characters the code occupies, `&` and `;` included.
    pub len: usize,
    /// The literal character it stands for.
    pub ch: char,
    /// Whether the code is numeric (`&#...;`).
    pub numeric: bool,
}

/// Bidirectional map between literal characters and entity codes.
#[derive(Debug, Clone)]
pub struct EntityTable {
    to_code: HashMap<char, String>,
    to_char: HashMap<String, char>,
    max_code_len: usize,
}

impl EntityTable {
    /// Build a table from `(name, literal)` pairs. When two names share a
    /// literal, the first one is used for encoding.
    pub fn from_pairs(pairs: &[(&str, char)]) -> Self {
        let mut to_code = HashMap::with_capacity(pairs.len());
        let mut to_char = HashMap::with_capacity(pairs.len());
        let mut max_code_len = MAX_NUMERIC_CODE_LEN;
        for &(name, ch) in pairs {
            let code = format!("&{name};");
            max_code_len = max_code_len.max(code.chars().count());
            to_code.entry(ch).or_insert_with(|| code.clone());
            to_char.insert(code, ch);
        }
        Self {
            to_code,
            to_char,
            max_code_len,
        }
    }

    /// The HTML named-reference table.
    pub fn html() -> Self {
        Self::from_pairs(HTML_ENTITIES)
    }

    /// The five XML predefined entities.
    pub fn xml() -> Self {
        Self::from_pairs(XML_ENTITIES)
    }

    /// Number of named codes.
    pub fn len(&self) -> usize {
        self.to_char.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_char.is_empty()
    }

    /// Longest code this table can recognize, numeric codes included.
    pub fn max_code_len(&self) -> usize {
        self.max_code_len
    }

    /// Named code for a literal character.
    pub fn encode(&self, ch: char) -> Option<&str> {
        self.to_code.get(&ch).map(String::as_str)
    }

    /// Literal character for a full code (`&lt;`, `&#60;`, `&#x3C;`).
    pub fn decode(&self, code: &str) -> Option<char> {
        if let Some(&ch) = self.to_char.get(code) {
            return Some(ch);
        }
        let body = code.strip_prefix("&#")?.strip_suffix(';')?;
        let value = match body.strip_prefix(['x', 'X']) {
            Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                u32::from_str_radix(hex, 16).ok()?
            },
            None if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) => {
                body.parse::<u32>().ok()?
            },
            _ => return None,
        };
        match value {
            0 => None,
            v => char::from_u32(v),
        }
    }

    /// All named codes with their literals.
    pub fn codes(&self) -> impl Iterator<Item = (&str, char)> {
        self.to_char.iter().map(|(code, &ch)| (code.as_str(), ch))
    }

    /// True when `ch` must be written as a code in normalized text: markup
    /// delimiters always, non-ASCII characters when a name exists.
    pub fn needs_escape(&self, ch: char) -> bool {
        matches!(ch, '<' | '>' | '&') || (!ch.is_ascii() && self.to_code.contains_key(&ch))
    }

    /// Append `ch` to `out`, encoded when [`needs_escape`](Self::needs_escape)
    /// says so.
    pub fn push_escaped(&self, out: &mut String, ch: char) {
        match self.encode(ch) {
            Some(code) if self.needs_escape(ch) => out.push_str(code),
            _ => out.push(ch),
        }
    }

    /// Escape every character of `text` that needs it.
    pub fn escape_text(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            self.push_escaped(&mut out, ch);
        }
        out
    }

    /// Recognize a code at the read position of `src` without consuming it.
    pub fn match_at<S: CharSource>(&self, src: &mut LookaheadSource<S>) -> Option<EntityMatch> {
        if src.peek() != Some('&') {
            return None;
        }
        let mut code = String::from("&");
        for i in 1..self.max_code_len {
            let ch = src.peek_at(i)?;
            code.push(ch);
            match ch {
                ';' => {
                    let literal = self.decode(&code)?;
                    return Some(EntityMatch {
                        len: i + 1,
                        ch: literal,
                        numeric: code.starts_with("&#"),
                    });
                },
                '#' if i == 1 => {},
                c if c.is_ascii_alphanumeric() => {},
                _ => return None,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StrSource;

    fn match_str(table: &EntityTable, input: &str) -> Option<EntityMatch> {
        let mut src = LookaheadSource::new(StrSource::new(input), table.max_code_len());
        table.match_at(&mut src)
    }

    #[test]
    fn essential_entities() {
        let t = EntityTable::html();
        assert_eq!(t.decode("&amp;"), Some('&'));
        assert_eq!(t.decode("&lt;"), Some('<'));
        assert_eq!(t.decode("&gt;"), Some('>'));
        assert_eq!(t.decode("&quot;"), Some('"'));
        assert_eq!(t.decode("&apos;"), Some('\''));
        assert_eq!(t.decode("&nbsp;"), Some('\u{00A0}'));
        assert_eq!(t.encode('<'), Some("&lt;"));
        assert_eq!(t.encode('\u{00E9}'), Some("&eacute;"));
    }

    #[test]
    fn numeric_codes() {
        let t = EntityTable::xml();
        assert_eq!(t.decode("&#60;"), Some('<'));
        assert_eq!(t.decode("&#x3c;"), Some('<'));
        assert_eq!(t.decode("&#X3C;"), Some('<'));
        assert_eq!(t.decode("&#x1F600;"), Some('\u{1F600}'));
        assert_eq!(t.decode("&#0;"), None);
        assert_eq!(t.decode("&#xD800;"), None);
        assert_eq!(t.decode("&#x110000;"), None);
        assert_eq!(t.decode("&#;"), None);
        assert_eq!(t.decode("&#x;"), None);
    }

    #[test]
    fn case_sensitivity() {
        let t = EntityTable::html();
        assert_eq!(t.decode("&Agrave;"), Some('\u{00C0}'));
        assert_eq!(t.decode("&agrave;"), Some('\u{00E0}'));
        assert_eq!(t.decode("&AMP;"), None);
    }

    #[test]
    fn xml_table_is_small() {
        let t = EntityTable::xml();
        assert_eq!(t.len(), 5);
        assert_eq!(t.decode("&eacute;"), None);
        assert!(t.max_code_len() >= MAX_NUMERIC_CODE_LEN);
    }

    #[test]
    fn escape_policy() {
        let t = EntityTable::html();
        assert!(t.needs_escape('<'));
        assert!(t.needs_escape('&'));
        assert!(t.needs_escape('\u{00E9}'));
        assert!(!t.needs_escape('"'));
        assert!(!t.needs_escape('a'));
        assert!(!t.needs_escape('\u{4E2D}'));
        let mut out = String::new();
        for ch in "a<\u{e9}\"".chars() {
            t.push_escaped(&mut out, ch);
        }
        assert_eq!(out, "a&lt;&eacute;\"");
        assert_eq!(t.escape_text("x & y > \u{4e2d}"), "x &amp; y &gt; \u{4e2d}");
        assert_eq!(EntityTable::xml().escape_text("\u{e9}<"), "\u{e9}&lt;");
    }

    #[test]
    fn match_named_and_numeric() {
        let t = EntityTable::html();
        assert_eq!(
            match_str(&t, "&amp;rest"),
            Some(EntityMatch {
                len: 5,
                ch: '&',
                numeric: false,
            })
        );
        assert_eq!(
            match_str(&t, "&#233;"),
            Some(EntityMatch {
                len: 6,
                ch: '\u{e9}',
                numeric: true,
            })
        );
    }

    #[test]
    fn match_rejects_unterminated_and_unknown() {
        let t = EntityTable::html();
        assert_eq!(match_str(&t, "&amp"), None);
        assert_eq!(match_str(&t, "& b"), None);
        assert_eq!(match_str(&t, "&foobar;"), None);
        assert_eq!(match_str(&t, "&a#b;"), None);
        assert_eq!(match_str(&t, "x&amp;"), None);
        assert_eq!(match_str(&t, "&averyveryverylongname;"), None);
    }

    #[test]
    fn match_does_not_consume() {
        let t = EntityTable::html();
        let mut src = LookaheadSource::new(StrSource::new("&lt;"), t.max_code_len());
        assert!(t.match_at(&mut src).is_some());
        assert_eq!(src.position(), 0);
        assert_eq!(src.peek(), Some('&'));
    }

    #[test]
    fn round_trip_every_literal_and_code() {
        for t in [EntityTable::html(), EntityTable::xml()] {
            assert!(!t.is_empty());
            for (code, ch) in t.codes() {
                assert_eq!(t.decode(code), Some(ch), "decode {code}");
                let encoded = t.encode(ch).expect("literal has a code");
                assert_eq!(t.decode(encoded), Some(ch), "round trip {ch:?}");
            }
        }
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn numeric_codes_round_trip(ch in any::<char>()) {
                prop_assume!(ch != '\0');
                let t = EntityTable::xml();
                let dec = format!("&#{};", ch as u32);
                let hex = format!("&#x{:X};", ch as u32);
                prop_assert_eq!(t.decode(&dec), Some(ch));
                prop_assert_eq!(t.decode(&hex), Some(ch));
                prop_assert_eq!(match_str(&t, &hex).map(|m| m.ch), Some(ch));
            }
        }
    }
}
