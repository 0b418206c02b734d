use std::collections::VecDeque;

use serde::Serialize;
use tracing::{trace, warn};

use crate::error::{LexError, LexResult, SourceLocation};

pub const KEYWORD_IMPORT: &str = "import";
pub const KEYWORD_FUNCTION: &str = "fn";
pub const KEYWORD_LET: &str = "let";

pub const KEYWORDS: &[&str] = &[
    KEYWORD_IMPORT,
    "class",
    "interface",
    "new",
    "impl",
    "pub",
    "isinstance",
    "type",
    KEYWORD_FUNCTION,
    "return",
    "static",
    "if",
    "else",
    "switch",
    "case",
    "for",
    "continue",
    "break",
    "yield",
    KEYWORD_LET,
    "this",
    "in",
    "with",
    "try",
    "catch",
    "throw",
    "finally",
];

const LITERAL_NULL: &str = "null";
const LITERAL_TRUE: &str = "true";
const LITERAL_FALSE: &str = "false";

const SINGLE_CHAR_OPERATORS: &str = "+-*/%=!<>&|^~";
const TWO_CHAR_OPERATORS: &[&str] = &[
    "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "~=", "==", "!=", "<=", ">=",
    "<<", ">>", "&&", "||", "=>",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Keyword,
    Identifier,
    StringLiteral,
    IntegerLiteral,
    DecimalLiteral,
    NullLiteral,
    BooleanLiteral,
    Separator,
    Operator,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn is_separator(&self, text: &str) -> bool {
        self.kind == TokenKind::Separator && self.text == text
    }

    pub fn is_operator(&self, text: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == text
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Character cursor over the source text.
///
/// `peek`/`next` return `None` once the input is exhausted, and keep doing so.
pub struct CharStream {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl CharStream {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// The character after the one `peek` returns.
    pub fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    pub fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

/// Produces tokens on demand with up to two tokens of lookahead.
pub struct Lexer {
    stream: CharStream,
    pending: VecDeque<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            stream: CharStream::new(source),
            pending: VecDeque::with_capacity(2),
        }
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> LexResult<Token> {
        match self.pending.pop_front() {
            Some(token) => Ok(token),
            None => self.scan_token(),
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> LexResult<Token> {
        self.fill(1)?;
        Ok(self.pending[0].clone())
    }

    /// Look at the token after the next one without consuming anything.
    pub fn peek2(&mut self) -> LexResult<Token> {
        self.fill(2)?;
        Ok(self.pending[1].clone())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drain the whole input, ending with the Eof token.
    pub fn tokenize(mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn fill(&mut self, count: usize) -> LexResult<()> {
        while self.pending.len() < count {
            let token = self.scan_token()?;
            self.pending.push_back(token);
        }
        Ok(())
    }

    fn scan_token(&mut self) -> LexResult<Token> {
        loop {
            self.skip_whitespace();
            let location = self.stream.location();
            let Some(ch) = self.stream.peek() else {
                return Ok(Token::new(TokenKind::Eof, "", location));
            };

            let token = match ch {
                _ if is_identifier_start(ch) => self.read_identifier(location),
                '"' => self.read_string(location)?,
                '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' | '?' | '@' | '#' => {
                    self.stream.next();
                    Token::new(TokenKind::Separator, ch.to_string(), location)
                }
                ':' => {
                    self.stream.next();
                    if self.stream.peek() == Some(':') {
                        self.stream.next();
                        Token::new(TokenKind::Separator, "::", location)
                    } else {
                        Token::new(TokenKind::Separator, ":", location)
                    }
                }
                '/' if self.stream.peek_next() == Some('/') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.stream.peek_next() == Some('*') => {
                    self.skip_block_comment(location)?;
                    continue;
                }
                '0'..='9' => self.read_number(location)?,
                '.' => {
                    self.stream.next();
                    if self.stream.peek().is_some_and(|c| c.is_ascii_digit()) {
                        let mut text = String::from(".");
                        self.read_digits(&mut text);
                        Token::new(TokenKind::DecimalLiteral, text, location)
                    } else {
                        Token::new(TokenKind::Separator, ".", location)
                    }
                }
                _ if SINGLE_CHAR_OPERATORS.contains(ch) => self.read_operator(location),
                _ => {
                    warn!("{}: can not recognize character '{}', skipping", location, ch);
                    self.stream.next();
                    continue;
                }
            };

            trace!(kind = ?token.kind, text = %token.text, "token");
            return Ok(token);
        }
    }

    fn read_identifier(&mut self, location: SourceLocation) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.stream.peek() {
            if !is_identifier_part(ch) {
                break;
            }
            text.push(ch);
            self.stream.next();
        }

        let kind = match text.as_str() {
            LITERAL_NULL => TokenKind::NullLiteral,
            LITERAL_TRUE | LITERAL_FALSE => TokenKind::BooleanLiteral,
            _ if KEYWORDS.contains(&text.as_str()) => TokenKind::Keyword,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, text, location)
    }

    // No escape processing: everything up to the next quote is the literal.
    fn read_string(&mut self, location: SourceLocation) -> LexResult<Token> {
        self.stream.next(); // skip opening quote
        let mut text = String::new();
        loop {
            match self.stream.next() {
                Some('"') => return Ok(Token::new(TokenKind::StringLiteral, text, location)),
                Some(ch) => text.push(ch),
                None => return Err(LexError::UnterminatedString { location }),
            }
        }
    }

    fn read_number(&mut self, location: SourceLocation) -> LexResult<Token> {
        let mut text = String::new();
        if self.stream.peek() == Some('0') {
            self.stream.next();
            if self.stream.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(LexError::LeadingZero { location });
            }
            text.push('0');
        } else {
            self.read_digits(&mut text);
        }

        if self.stream.peek() == Some('.') {
            self.stream.next();
            text.push('.');
            self.read_digits(&mut text);
            return Ok(Token::new(TokenKind::DecimalLiteral, text, location));
        }
        Ok(Token::new(TokenKind::IntegerLiteral, text, location))
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.stream.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            text.push(ch);
            self.stream.next();
        }
    }

    fn read_operator(&mut self, location: SourceLocation) -> Token {
        let mut text = String::new();
        if let Some(first) = self.stream.next() {
            text.push(first);
        }
        if let Some(second) = self.stream.peek() {
            text.push(second);
            if TWO_CHAR_OPERATORS.contains(&text.as_str()) {
                self.stream.next();
            } else {
                text.pop();
            }
        }
        Token::new(TokenKind::Operator, text, location)
    }

    fn skip_whitespace(&mut self) {
        while let Some(' ' | '\t' | '\r' | '\n') = self.stream.peek() {
            self.stream.next();
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.stream.peek() {
            if ch == '\n' {
                break;
            }
            self.stream.next();
        }
    }

    fn skip_block_comment(&mut self, location: SourceLocation) -> LexResult<()> {
        self.stream.next(); // '/'
        self.stream.next(); // '*'
        loop {
            match self.stream.next() {
                Some('*') if self.stream.peek() == Some('/') => {
                    self.stream.next();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(LexError::UnterminatedComment { location }),
            }
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || is_han(ch)
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}

// Unicode blocks assigned to the Han script.
fn is_han(ch: char) -> bool {
    matches!(
        ch as u32,
        0x2E80..=0x2E99
            | 0x2E9B..=0x2EF3
            | 0x2F00..=0x2FD5
            | 0x3005
            | 0x3007
            | 0x3021..=0x3029
            | 0x3038..=0x303B
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xF900..=0xFA6D
            | 0xFA70..=0xFAD9
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2EBE0
            | 0x2F800..=0x2FA1D
            | 0x30000..=0x323AF
    )
}
