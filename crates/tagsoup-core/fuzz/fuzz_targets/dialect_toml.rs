#![no_main]

use libfuzzer_sys::fuzz_target;
use tagsoup_core::config::DialectConfig;
use tagsoup_core::grammar::AnyGrammar;
use tagsoup_core::tokenizer::tokenize;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Must not panic on any config, valid or not.
        if let Ok(config) = DialectConfig::from_toml_str(text) {
            let grammar = AnyGrammar::from_config(&config);
            let _ = tokenize("<p a=\"1\">x<script>y</script>", grammar.grammar());
        }
    }
});
