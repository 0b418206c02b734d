use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// Lexer Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("{location}: Unterminated string literal")]
    UnterminatedString { location: SourceLocation },
    #[error("{location}: Unterminated comment, no matching */")]
    UnterminatedComment { location: SourceLocation },
    #[error("{location}: 0 cannot be followed by another digit")]
    LeadingZero { location: SourceLocation },
}

// Parser Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{location}: Expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        location: SourceLocation,
    },
    #[error("{location}: Unexpected end of file, expected {expected}")]
    UnexpectedEof {
        expected: String,
        location: SourceLocation,
    },
    #[error("{location}: Invalid {kind} literal '{text}'")]
    InvalidLiteral {
        kind: &'static str,
        text: String,
        location: SourceLocation,
    },
    #[error("{location}: Import path '{path}' must end with '{extension}'")]
    InvalidImportPath {
        path: String,
        extension: &'static str,
        location: SourceLocation,
    },
    #[error("{location}: '{keyword}' is reserved but not yet supported")]
    ReservedKeyword {
        keyword: String,
        location: SourceLocation,
    },
    #[error("{location}: Nesting deeper than {limit} levels")]
    NestingTooDeep {
        limit: usize,
        location: SourceLocation,
    },
}

// Resolution Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),
    #[error("Cannot find declaration of function {0}")]
    UndefinedFunction(String),
    #[error("'{0}' is not a function")]
    NotAFunction(String),
    #[error("Cannot find declaration of variable {0}")]
    UndefinedVariable(String),
    #[error("'{0}' is not a variable")]
    NotAVariable(String),
}

// Evaluation Errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unsupported binary operation: {left} {op} {right}")]
    UnsupportedBinaryOperation {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("Assignment with '{0}' needs a variable on the left side")]
    InvalidAssignmentTarget(&'static str),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Builtin '{name}' expects {expected} argument(s), got {found}")]
    BuiltinArity {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("External call {0} is not supported by the interpreter")]
    ExternalCallUnsupported(String),
    #[error("Call to unresolved function {0}")]
    UnresolvedCall(String),
    #[error("Call to {name} exceeds the maximum call depth of {limit}")]
    CallDepthExceeded { name: String, limit: usize },
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DuangError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LexError> for DuangError {
    fn from(err: LexError) -> Self {
        DuangError::Parse(ParseError::Lex(err))
    }
}

// Result types
pub type LexResult<T> = Result<T, LexError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type ResolveResult<T> = Result<T, ResolveError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
pub type DuangResult<T> = Result<T, DuangError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_surfaces_through_parse_error() {
        let err: DuangError = LexError::LeadingZero {
            location: SourceLocation::new(2, 5),
        }
        .into();
        assert!(matches!(err, DuangError::Parse(ParseError::Lex(_))));
        assert_eq!(
            err.to_string(),
            "Parse error: 2:5: 0 cannot be followed by another digit"
        );
    }

    #[test]
    fn test_unsupported_operation_message() {
        let err = RuntimeError::UnsupportedBinaryOperation {
            op: "+",
            left: "int",
            right: "string",
        };
        assert_eq!(err.to_string(), "Unsupported binary operation: int + string");
    }
}
