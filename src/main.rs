use std::fs;
use std::io::{self, Write};

use clap::builder::BoolishValueParser;
use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use duang::error::DuangError;
use duang::interpreter::Interpreter;
use duang::lexer::Lexer;
use duang::parser::Parser;
use duang::resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AstFormat {
    Text,
    Json,
}

#[derive(Debug)]
struct Config {
    input: String,
    verbose: bool,
    dump_tokens: bool,
    dump_ast: Option<AstFormat>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cli() -> ClapCommand {
    ClapCommand::new("duang")
        .version("0.1.0")
        .about("Duang scripting language interpreter")
        .arg(
            Arg::new("input")
                .help("Source file to run")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log every phase at debug level")
                .env("DUANG_DEBUG")
                .value_parser(BoolishValueParser::new())
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-tokens")
                .long("dump-tokens")
                .help("Print the token stream as JSON lines before running")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-ast")
                .long("dump-ast")
                .help("Print the resolved syntax tree before running")
                .value_parser(["text", "json"])
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("text"),
        )
}

impl Config {
    fn from_matches(matches: &ArgMatches) -> Self {
        let dump_ast = matches
            .get_one::<String>("dump-ast")
            .map(|format| match format.as_str() {
                "json" => AstFormat::Json,
                _ => AstFormat::Text,
            });

        Config {
            input: matches
                .get_one::<String>("input")
                .cloned()
                .unwrap_or_default(),
            verbose: matches.get_flag("verbose"),
            dump_tokens: matches.get_flag("dump-tokens"),
            dump_ast,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<(), DuangError> {
    let config = Config::from_matches(&cli().get_matches());
    init_tracing(config.verbose);
    debug!(?config, "starting");

    let source = fs::read_to_string(&config.input)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if config.dump_tokens {
        for token in Lexer::new(&source).tokenize()? {
            writeln!(out, "{}", json!(token))?;
        }
    }

    let program = Parser::new(&source).parse()?;
    if config.verbose {
        debug!("syntax tree before resolution:\n{}", program.dump(None));
    }

    let resolution = resolver::resolve(&program)?;
    if config.verbose {
        debug!("syntax tree after resolution:\n{}", program.dump(Some(&resolution)));
    }

    match config.dump_ast {
        Some(AstFormat::Text) => write!(out, "{}", program.dump(Some(&resolution)))?,
        Some(AstFormat::Json) => {
            let references: Vec<_> = resolution
                .references()
                .into_iter()
                .map(|(id, name)| json!({ "node": id, "symbol": name }))
                .collect();
            let dump = json!({ "program": program, "references": references });
            writeln!(out, "{:#}", dump)?;
        }
        None => {}
    }

    let mut interpreter = Interpreter::new(&resolution, &mut out);
    let value = interpreter.run(&program)?;
    info!(%value, "program returned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let matches = cli().try_get_matches_from(args).unwrap();
        Config::from_matches(&matches)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["duang", "hello.rs"]);
        assert_eq!(config.input, "hello.rs");
        assert!(!config.dump_tokens);
        assert_eq!(config.dump_ast, None);
    }

    #[test]
    fn test_dump_ast_formats() {
        assert_eq!(parse(&["duang", "a", "--dump-ast"]).dump_ast, Some(AstFormat::Text));
        assert_eq!(parse(&["duang", "a", "--dump-ast=json"]).dump_ast, Some(AstFormat::Json));
        assert!(cli()
            .try_get_matches_from(["duang", "a", "--dump-ast=yaml"])
            .is_err());
    }

    // Only this test asserts on verbose, which DUANG_DEBUG feeds
    #[test]
    fn test_verbose_from_environment() {
        std::env::set_var("DUANG_DEBUG", "1");
        let on = parse(&["duang", "a"]).verbose;
        std::env::set_var("DUANG_DEBUG", "0");
        let off = parse(&["duang", "a"]).verbose;
        std::env::remove_var("DUANG_DEBUG");
        let flag = parse(&["duang", "a", "-v"]).verbose;

        assert!(on);
        assert!(!off);
        assert!(flag);
    }
}
