use tracing::{debug, instrument, trace};

use crate::ast::{
    BinaryOperator, Block, Expression, FunctionDecl, NodeId, Program, Statement, VariableDecl,
};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Lexer, Token, TokenKind, KEYWORD_FUNCTION, KEYWORD_IMPORT, KEYWORD_LET};

/// Import paths name host source files.
pub const IMPORT_EXTENSION: &str = ".rs";

const DEFAULT_TYPE_NAME: &str = "any";

/// How deep expressions and function bodies may nest.
pub const MAX_NESTING: usize = 128;

pub struct Parser {
    lexer: Lexer,
    next_id: u32,
    depth: usize,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self::from_lexer(Lexer::new(source))
    }

    pub fn from_lexer(lexer: Lexer) -> Self {
        Self {
            lexer,
            next_id: 0,
            depth: 0,
        }
    }

    #[instrument(skip_all)]
    pub fn parse(&mut self) -> ParseResult<Program> {
        let statements = self.parse_statement_list()?;

        // Only a stray '}' can stop the top-level list early
        let token = self.lexer.peek()?;
        if !token.is_eof() {
            return Err(unexpected("a statement", &token));
        }

        debug!(statements = statements.len(), "parsed program");
        Ok(Program { statements })
    }

    fn parse_statement_list(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            let token = self.lexer.peek()?;
            if token.is_eof() || token.is_separator("}") {
                return Ok(statements);
            }
            statements.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let token = self.lexer.peek()?;
        trace!(text = %token.text, "statement");
        match token.kind {
            TokenKind::Keyword => match token.text.as_str() {
                KEYWORD_IMPORT => self.parse_import(),
                KEYWORD_FUNCTION => self.parse_function_decl(),
                KEYWORD_LET => self.parse_variable_decl(),
                _ => Err(ParseError::ReservedKeyword {
                    keyword: token.text.clone(),
                    location: token.location,
                }),
            },
            TokenKind::Identifier
            | TokenKind::IntegerLiteral
            | TokenKind::DecimalLiteral
            | TokenKind::StringLiteral
            | TokenKind::BooleanLiteral
            | TokenKind::NullLiteral => self.parse_expression_statement(),
            TokenKind::Separator if token.text == "(" => self.parse_expression_statement(),
            _ => Err(unexpected("a statement", &token)),
        }
    }

    fn parse_import(&mut self) -> ParseResult<Statement> {
        self.lexer.next_token()?; // consume 'import'

        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::StringLiteral {
            return Err(unexpected("an import path string", &token));
        }
        if !token.text.ends_with(IMPORT_EXTENSION) {
            return Err(ParseError::InvalidImportPath {
                path: token.text,
                extension: IMPORT_EXTENSION,
                location: token.location,
            });
        }

        self.skip_semicolon()?;
        Ok(Statement::Import { path: token.text })
    }

    fn parse_function_decl(&mut self) -> ParseResult<Statement> {
        self.lexer.next_token()?; // consume 'fn'

        let name = self.expect_identifier("function name after 'fn'")?;
        self.expect_separator("(", "after the function name")?;
        self.expect_separator(")", "in function declaration")?;
        let body = self.parse_block()?;

        Ok(Statement::Function(FunctionDecl {
            name: name.text,
            body,
        }))
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect_separator("{", "to open the function body")?;
        let statements = self.nested(Self::parse_statement_list)?;
        self.expect_separator("}", "to close the function body")?;
        Ok(Block { statements })
    }

    fn parse_variable_decl(&mut self) -> ParseResult<Statement> {
        self.lexer.next_token()?; // consume 'let'

        let name = self.expect_identifier("variable name after 'let'")?;

        let mut type_name = DEFAULT_TYPE_NAME.to_string();
        if self.lexer.peek()?.is_separator("::") {
            self.lexer.next_token()?; // consume '::'
            type_name = self.expect_identifier("type name after '::'")?.text;
        }

        let mut init = None;
        if self.lexer.peek()?.is_operator("=") {
            self.lexer.next_token()?; // consume '='
            init = Some(self.parse_expression()?);
        }

        self.skip_semicolon()?;
        Ok(Statement::Variable(VariableDecl {
            name: name.text,
            type_name,
            init,
        }))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.parse_expression()?;
        self.skip_semicolon()?;
        Ok(Statement::Expression(expr))
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.nested(|parser| parser.parse_binary(0))
    }

    // All recursion into expressions and bodies passes through here
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            let token = self.lexer.peek()?;
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING,
                location: token.location,
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // Precedence climbing: keep folding while the next operator binds
    // tighter than `min_precedence`, parsing its right side at its own level.
    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expression> {
        let mut left = self.parse_primary()?;

        loop {
            let token = self.lexer.peek()?;
            if token.kind != TokenKind::Operator {
                break;
            }
            let Some(op) = BinaryOperator::from_symbol(&token.text) else {
                break;
            };
            if op.precedence() <= min_precedence {
                break;
            }

            self.lexer.next_token()?; // consume operator
            let right = self.parse_binary(op.precedence())?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = self.lexer.peek()?;
        match token.kind {
            TokenKind::Identifier => {
                // Local LL(2): the token after the name picks the form
                let lookahead = self.lexer.peek2()?;
                if lookahead.is_separator("::") {
                    self.parse_external_call()
                } else if lookahead.is_separator("(") {
                    self.parse_function_call()
                } else {
                    self.lexer.next_token()?;
                    Ok(Expression::Variable {
                        id: self.next_node_id(),
                        name: token.text,
                    })
                }
            }
            TokenKind::IntegerLiteral => {
                self.lexer.next_token()?;
                token
                    .text
                    .parse::<i64>()
                    .map(Expression::IntegerLiteral)
                    .map_err(|_| invalid_literal("integer", token))
            }
            TokenKind::DecimalLiteral => {
                self.lexer.next_token()?;
                token
                    .text
                    .parse::<f32>()
                    .map(Expression::DecimalLiteral)
                    .map_err(|_| invalid_literal("decimal", token))
            }
            TokenKind::StringLiteral => {
                self.lexer.next_token()?;
                Ok(Expression::StringLiteral(token.text))
            }
            TokenKind::BooleanLiteral => {
                self.lexer.next_token()?;
                Ok(Expression::BooleanLiteral(token.text == "true"))
            }
            TokenKind::NullLiteral => {
                self.lexer.next_token()?;
                Ok(Expression::NullLiteral)
            }
            TokenKind::Separator if token.text == "(" => {
                self.lexer.next_token()?; // consume '('
                let expr = self.parse_expression()?;
                self.expect_separator(")", "to close the parenthesized expression")?;
                Ok(expr)
            }
            _ => Err(unexpected("an expression", &token)),
        }
    }

    fn parse_function_call(&mut self) -> ParseResult<Expression> {
        let name = self.expect_identifier("function name")?;
        let id = self.next_node_id();
        let args = self.parse_arguments()?;
        Ok(Expression::FunctionCall {
            id,
            name: name.text,
            args,
        })
    }

    fn parse_external_call(&mut self) -> ParseResult<Expression> {
        let module = self.expect_identifier("module name")?;
        self.expect_separator("::", "after the module name")?;
        let function = self.expect_identifier("function name after '::'")?;
        let args = self.parse_arguments()?;
        Ok(Expression::ExternalCall {
            module: module.text,
            function: function.text,
            args,
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect_separator("(", "to open the argument list")?;

        let mut args = Vec::new();
        if self.lexer.peek()?.is_separator(")") {
            self.lexer.next_token()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);
            let token = self.lexer.next_token()?;
            if token.is_separator(")") {
                return Ok(args);
            }
            if !token.is_separator(",") {
                return Err(unexpected("',' or ')' in argument list", &token));
            }
        }
    }

    fn expect_separator(&mut self, text: &str, context: &str) -> ParseResult<Token> {
        let token = self.lexer.next_token()?;
        if token.is_separator(text) {
            Ok(token)
        } else {
            Err(unexpected(format!("'{}' {}", text, context), &token))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<Token> {
        let token = self.lexer.next_token()?;
        if token.kind == TokenKind::Identifier {
            Ok(token)
        } else {
            Err(unexpected(what, &token))
        }
    }

    fn skip_semicolon(&mut self) -> ParseResult<()> {
        if self.lexer.peek()?.is_separator(";") {
            self.lexer.next_token()?;
        }
        Ok(())
    }

    fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

fn unexpected(expected: impl Into<String>, token: &Token) -> ParseError {
    if token.is_eof() {
        ParseError::UnexpectedEof {
            expected: expected.into(),
            location: token.location,
        }
    } else {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: token.text.clone(),
            location: token.location,
        }
    }
}

fn invalid_literal(kind: &'static str, token: Token) -> ParseError {
    ParseError::InvalidLiteral {
        kind,
        text: token.text,
        location: token.location,
    }
}
