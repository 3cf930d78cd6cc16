//! Post-tokenization repairs over a short window of tokens.
//!
//! The tokenizer pushes every produced token into a [`TokenWindow`]. Once the
//! window holds `token_lookahead + 1` tokens, the [`SequenceNormalizer`]
//! releases the front one into the ready queue, looking back at most at the
//! last token it preserved and forward at most at the rest of the window.

use std::collections::VecDeque;

use crate::grammar::{Grammar, TokenKind, names_match};
use crate::recovery::Recovery;

// ---------------------------------------------------------------------------
// TokenWindow
// ---------------------------------------------------------------------------

/// Produced tokens not yet released, oldest first.
#[derive(Debug, Clone)]
pub struct TokenWindow {
    tokens: VecDeque<String>,
    capacity: usize,
}

impl TokenWindow {
    /// Window holding the released token plus `token_lookahead` more.
    pub fn new(token_lookahead: usize) -> Self {
        let capacity = token_lookahead + 1;
        Self {
            tokens: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tokens.len() >= self.capacity
    }

    pub fn push(&mut self, token: String) {
        self.tokens.push_back(token);
    }

    pub fn front(&self) -> Option<&str> {
        self.tokens.front().map(String::as_str)
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }
}

// ---------------------------------------------------------------------------
// SequenceNormalizer
// ---------------------------------------------------------------------------

/// Body of an element whose content is being merged into one text token.
#[derive(Debug)]
struct OpenBody {
    name: String,
    text: String,
}

/// Streaming reducer that repairs adjacent-token anomalies.
#[derive(Debug, Default)]
pub struct SequenceNormalizer {
    /// Name of the last preserved token when it was an end tag.
    last_end_tag: Option<String>,
    open_body: Option<OpenBody>,
}

impl SequenceNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release the front token of `window` into `out`, possibly rewritten,
    /// merged or dropped. `position` is the input offset used in recovery
    /// logs.
    pub fn step<G: Grammar + ?Sized>(
        &mut self,
        grammar: &G,
        window: &mut TokenWindow,
        position: usize,
        out: &mut VecDeque<String>,
    ) {
        let Some(token) = window.pop_front() else {
            return;
        };

        if let Some(body) = self.open_body.as_mut() {
            if closes(grammar, &token, &body.name) {
                self.close_body(out);
                self.release(grammar, token, out);
                return;
            }
            body.text.push_str(&token);
            // Merge whatever of the body is already in the window.
            while let Some(next) = window.front() {
                if closes(grammar, next, &body.name) {
                    break;
                }
                if let Some(next) = window.pop_front() {
                    body.text.push_str(&next);
                }
            }
            return;
        }

        let token = if grammar.correct_errors() {
            match grammar.repair_comment(&token) {
                Some(repaired) => {
                    Recovery::MalformedCommentDelimiter.report(position, &token);
                    repaired
                },
                None => token,
            }
        } else {
            token
        };

        if grammar.correct_errors() && self.is_duplicate_end_tag(grammar, &token) {
            Recovery::MismatchedOrDuplicateEndTag.report(position, &token);
            return;
        }

        self.release(grammar, token, out);
    }

    /// Flush state at end of input.
    pub fn finish(&mut self, position: usize, out: &mut VecDeque<String>) {
        if let Some(body) = &self.open_body {
            Recovery::PrematureEndOfInput.report(position, &format!("unclosed <{}>", body.name));
        }
        self.close_body(out);
    }

    fn close_body(&mut self, out: &mut VecDeque<String>) {
        if let Some(body) = self.open_body.take() {
            if !body.text.is_empty() {
                out.push_back(body.text);
            }
        }
    }

    fn is_duplicate_end_tag<G: Grammar + ?Sized>(&self, grammar: &G, token: &str) -> bool {
        let (Some(last), Some(name)) = (&self.last_end_tag, end_tag_name(grammar, token)) else {
            return false;
        };
        same_name(grammar, last, name) && !grammar.may_repeat_end_tag(name)
    }

    fn release<G: Grammar + ?Sized>(
        &mut self,
        grammar: &G,
        token: String,
        out: &mut VecDeque<String>,
    ) {
        match grammar.classify(&token) {
            TokenKind::EndTag => {
                self.last_end_tag = end_tag_name(grammar, &token).map(str::to_string);
            },
            TokenKind::StartTag => {
                self.last_end_tag = None;
                if let Some(name) = grammar.tag_name(&token) {
                    let self_closing = token.ends_with("/>");
                    if !self_closing
                        && !grammar.is_singular(name)
                        && grammar.reassembles_body(name)
                    {
                        self.open_body = Some(OpenBody {
                            name: name.to_string(),
                            text: String::new(),
                        });
                    }
                }
            },
            TokenKind::Text if token.chars().all(|c| grammar.is_whitespace(c)) => {},
            _ => self.last_end_tag = None,
        }
        out.push_back(token);
    }
}

fn end_tag_name<'t, G: Grammar + ?Sized>(grammar: &G, token: &'t str) -> Option<&'t str> {
    if grammar.is_end_tag(token) {
        grammar.tag_name(token)
    } else {
        None
    }
}

fn same_name<G: Grammar + ?Sized>(grammar: &G, a: &str, b: &str) -> bool {
    if grammar.case_sensitive() {
        a == b
    } else {
        names_match(a, b)
    }
}

/// Whether `token` is the end tag of the element named `name`.
fn closes<G: Grammar + ?Sized>(grammar: &G, token: &str, name: &str) -> bool {
    end_tag_name(grammar, token).is_some_and(|n| same_name(grammar, n, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{HtmlGrammar, XmlGrammar};

    /// Run `tokens` through a normalizer the way the tokenizer does.
    fn normalize<G: Grammar + ?Sized>(grammar: &G, tokens: &[&str]) -> Vec<String> {
        let mut window = TokenWindow::new(grammar.token_lookahead());
        let mut norm = SequenceNormalizer::new();
        let mut out = VecDeque::new();
        for tok in tokens {
            window.push(tok.to_string());
            if window.is_full() {
                norm.step(grammar, &mut window, 0, &mut out);
            }
        }
        while !window.is_empty() {
            norm.step(grammar, &mut window, 0, &mut out);
        }
        norm.finish(0, &mut out);
        out.into_iter().collect()
    }

    #[test]
    fn window_capacity() {
        let mut w = TokenWindow::new(1);
        assert!(w.is_empty());
        w.push("a".into());
        assert!(!w.is_full());
        w.push("b".into());
        assert!(w.is_full());
        assert_eq!(w.front(), Some("a"));
        assert_eq!(w.pop_front().as_deref(), Some("a"));
        assert!(!w.is_full());
        assert_eq!(w.front(), Some("b"));
    }

    #[test]
    fn duplicate_end_tag_collapses() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<li>", "x", "</li>", "</li>"]);
        assert_eq!(out, vec!["<li>", "x", "</li>"]);
    }

    #[test]
    fn whitespace_is_transparent_for_duplicates() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<p>", "x", "</P>", "\n", "</p>"]);
        assert_eq!(out, vec!["<p>", "x", "</P>", "\n"]);
    }

    #[test]
    fn nestable_end_tags_are_kept() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<div>", "<div>", "</div>", "</div>"]);
        assert_eq!(out, vec!["<div>", "<div>", "</div>", "</div>"]);
    }

    #[test]
    fn text_between_end_tags_resets_duplicate_check() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["</li>", "x", "</li>"]);
        assert_eq!(out, vec!["</li>", "x", "</li>"]);
    }

    #[test]
    fn strict_grammar_keeps_duplicates() {
        let g = HtmlGrammar::new().with_error_correction(false);
        let out = normalize(&g, &["<li>", "</li>", "</li>"]);
        assert_eq!(out, vec!["<li>", "</li>", "</li>"]);
    }

    #[test]
    fn comment_delimiters_repaired() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<!- note ->", "<!-- ok -->"]);
        assert_eq!(out, vec!["<!-- note -->", "<!-- ok -->"]);

        let x = XmlGrammar::new();
        let out = normalize(&x, &["<!- note ->"]);
        assert_eq!(out, vec!["<!- note ->"]);
    }

    #[test]
    fn title_body_reassembled() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<title>", "a ", "<b>", "bold", "</b>", "</TITLE>", "x"]);
        assert_eq!(out, vec!["<title>", "a <b>bold</b>", "</TITLE>", "x"]);
    }

    #[test]
    fn empty_body_emits_nothing() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<textarea>", "</textarea>"]);
        assert_eq!(out, vec!["<textarea>", "</textarea>"]);
    }

    #[test]
    fn self_closing_start_tag_opens_no_body() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<title/>", "x", "<p>"]);
        assert_eq!(out, vec!["<title/>", "x", "<p>"]);
    }

    #[test]
    fn unclosed_body_flushed_at_end() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<title>", "a", "<i>", "b"]);
        assert_eq!(out, vec!["<title>", "a<i>b"]);
    }

    #[test]
    fn body_is_not_repaired() {
        let g = HtmlGrammar::new();
        let out = normalize(&g, &["<textarea>", "</li>", "</li>", "</textarea>"]);
        assert_eq!(out, vec!["<textarea>", "</li></li>", "</textarea>"]);
    }
}
