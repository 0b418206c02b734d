pub mod ast;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;

use std::io::Write;

use tracing::debug;

use error::DuangResult;
use interpreter::{Interpreter, Value};
use parser::Parser;

/// Parse, resolve and run `source`, writing program output to `out`.
/// Returns the value of the last top-level statement.
pub fn run_source(source: &str, out: &mut impl Write) -> DuangResult<Value> {
    let program = Parser::new(source).parse()?;
    let resolution = resolver::resolve(&program)?;
    debug!(
        symbols = resolution.symbols().len(),
        resolved = resolution.resolved_count(),
        "resolved program"
    );

    let mut interpreter = Interpreter::new(&resolution, out);
    Ok(interpreter.run(&program)?)
}

/// Install a test subscriber once; `RUST_LOG` picks the level.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    // Already installed by another test is fine
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DuangError, ResolveError};

    #[test]
    fn test_run_source_end_to_end() {
        init_test_tracing();
        let mut out = Vec::new();
        let value = run_source(r#"let n = 2; n *= 21; printf("n=%d", n); n"#, &mut out).unwrap();
        assert_eq!(value, Value::Int(42));
        assert_eq!(String::from_utf8(out).unwrap(), "n=42");
    }

    #[test]
    fn test_resolution_error_prevents_execution() {
        init_test_tracing();
        let mut out = Vec::new();
        let err = run_source(r#"print("never"); let x = 1; let x = 2;"#, &mut out).unwrap_err();
        assert!(matches!(err, DuangError::Resolve(ResolveError::DuplicateSymbol(_))));
        assert!(out.is_empty());
    }
}
