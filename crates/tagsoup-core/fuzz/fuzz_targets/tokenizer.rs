#![no_main]

use libfuzzer_sys::fuzz_target;
use tagsoup_core::grammar::{HtmlGrammar, XmlGrammar};
use tagsoup_core::tokenizer::{Tokenizer, tokenize};

fuzz_target!(|data: &[u8]| {
    // Must not panic or loop infinitely on any input.
    let html = HtmlGrammar::new();
    let _ = Tokenizer::from_reader(data, &html).count();

    if let Ok(input) = std::str::from_utf8(data) {
        assert!(tokenize(input, &html).is_ok(), "tolerant mode failed");

        let xml = XmlGrammar::new();
        let mut out = String::new();
        let mut failed = false;
        for item in Tokenizer::from_str(input, &xml) {
            match item {
                Ok(token) => out.push_str(&token),
                Err(_) => failed = true,
            }
        }
        if !failed {
            assert_eq!(out, input, "strict mode must reproduce its input");
        }
    }
});
