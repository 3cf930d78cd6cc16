//! tagsoup command-line entry point.
//!
//! Tokenizes a file (or stdin) and prints one token per line.
//!
//! Usage:
//!   tagsoup page.html
//!   tagsoup --xml --kinds feed.xml
//!   tagsoup --strict --no-encoding < page.html
//!   tagsoup --config dialect.toml --json page.html
//!
//! Set `RUST_LOG=debug` to see every repaired input error.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use tagsoup_core::config::{DialectBase, DialectConfig};
use tagsoup_core::grammar::{AnyGrammar, Grammar};
use tagsoup_core::tokenizer::Tokenizer;

const USAGE: &str = "Usage: tagsoup [--xml] [--strict] [--no-encoding] [--config FILE] \
                     [--json] [--kinds] [FILE]";

// ---------------------------------------------------------------------------
// CLI parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq)]
struct Args {
    /// Start from the XML dialect instead of HTML.
    xml: bool,
    /// Fail on structural errors instead of repairing them.
    strict: bool,
    /// Leave entity codes in character data alone.
    no_encoding: bool,
    /// Dialect overlay file, TOML or JSON.
    config: Option<PathBuf>,
    /// Print JSON lines instead of escaped text.
    json: bool,
    /// Prefix every token with its kind.
    kinds: bool,
    /// Input file; stdin when absent.
    file: Option<PathBuf>,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--xml" => parsed.xml = true,
            "--strict" => parsed.strict = true,
            "--no-encoding" => parsed.no_encoding = true,
            "--json" => parsed.json = true,
            "--kinds" => parsed.kinds = true,
            "-h" | "--help" => parsed.help = true,
            "--config" => {
                let path = iter.next().context("--config needs a file")?;
                parsed.config = Some(PathBuf::from(path));
            },
            other if other.starts_with("--") => {
                anyhow::bail!("unknown argument: {other}\n{USAGE}");
            },
            _ if parsed.file.is_some() => {
                anyhow::bail!("only one input file may be given\n{USAGE}");
            },
            _ => parsed.file = Some(PathBuf::from(arg)),
        }
    }
    Ok(parsed)
}

/// Configuration file (if any) with command-line flags layered on top.
fn dialect_config(args: &Args) -> Result<DialectConfig> {
    let mut config = match &args.config {
        Some(path) => DialectConfig::load(path)
            .with_context(|| format!("loading dialect config {}", path.display()))?,
        None => DialectConfig::default(),
    };
    if args.xml {
        config.base = DialectBase::Xml;
    }
    if args.strict {
        config.correct_errors = Some(false);
    }
    if args.no_encoding {
        config.correct_char_encoding = Some(false);
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TokenLine<'a> {
    kind: &'static str,
    text: &'a str,
}

fn write_token(
    out: &mut impl Write,
    args: &Args,
    grammar: &dyn Grammar,
    token: &str,
) -> Result<()> {
    let kind = grammar.classify(token).as_str();
    if args.json {
        serde_json::to_writer(&mut *out, &TokenLine { kind, text: token })?;
        writeln!(out)?;
    } else if args.kinds {
        writeln!(out, "{kind}\t{token:?}")?;
    } else {
        writeln!(out, "{token:?}")?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = dialect_config(args)?;
    let dialect = AnyGrammar::from_config(&config);
    let grammar = dialect.grammar();

    let input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut count = 0usize;
    for item in Tokenizer::from_reader(input, grammar) {
        match item {
            Ok(token) => {
                write_token(&mut out, args, grammar, &token)?;
                count += 1;
            },
            Err(err) => {
                out.flush()?;
                let what = if err.is_structural() {
                    "malformed markup"
                } else {
                    "reading input"
                };
                return Err(anyhow::Error::new(err).context(what));
            },
        }
    }
    out.flush()?;
    log::debug!("{count} tokens");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }
    run(&args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsoup_core::grammar::HtmlGrammar;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parse_flags() {
        let a = args(&["--xml", "--strict", "--json", "page.xml"]).unwrap();
        assert!(a.xml);
        assert!(a.strict);
        assert!(a.json);
        assert!(!a.kinds);
        assert_eq!(a.file, Some(PathBuf::from("page.xml")));
    }

    #[test]
    fn parse_defaults() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn parse_config_path() {
        let a = args(&["--config", "d.toml"]).unwrap();
        assert_eq!(a.config, Some(PathBuf::from("d.toml")));
        assert!(args(&["--config"]).is_err());
    }

    #[test]
    fn parse_rejects_unknown_and_extra() {
        assert!(args(&["--frobnicate"]).is_err());
        assert!(args(&["a.html", "b.html"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dialect.toml");
        std::fs::write(&path, "correct_errors = true\nraw_text_elements = [\"template\"]\n")
            .unwrap();
        let a = Args {
            config: Some(path),
            xml: true,
            strict: true,
            ..Args::default()
        };
        let cfg = dialect_config(&a).unwrap();
        assert_eq!(cfg.base, DialectBase::Xml);
        assert_eq!(cfg.correct_errors, Some(false));
        assert_eq!(cfg.correct_char_encoding, None);
        assert_eq!(cfg.raw_text_elements, vec!["template".to_string()]);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let a = Args {
            config: Some(PathBuf::from("/nonexistent/dialect.toml")),
            ..Args::default()
        };
        let err = dialect_config(&a).unwrap_err();
        assert!(format!("{err}").contains("loading dialect config"));
    }

    fn render(a: &Args, token: &str) -> String {
        let mut buf = Vec::new();
        write_token(&mut buf, a, &HtmlGrammar::new(), token).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn plain_output_is_escaped() {
        assert_eq!(render(&Args::default(), "a\nb"), "\"a\\nb\"\n");
    }

    #[test]
    fn kinds_output() {
        let a = Args {
            kinds: true,
            ..Args::default()
        };
        assert_eq!(render(&a, "</p>"), "end-tag\t\"</p>\"\n");
    }

    #[test]
    fn json_output() {
        let a = Args {
            json: true,
            ..Args::default()
        };
        let line = render(&a, "<!-- c -->");
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["kind"], "comment");
        assert_eq!(value["text"], "<!-- c -->");
    }
}
