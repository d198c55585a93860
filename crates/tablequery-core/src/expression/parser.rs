//! Lexer and recursive-descent parser for condition and projection
//! expressions.
//!
//! Keywords and function names are matched case-insensitively. Nesting of
//! parentheses and `NOT` is bounded so hostile input cannot exhaust the stack.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::ast::{CompareOp, Expr, FunctionName, LogicalOp, NameRef, Operand};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while parsing or binding an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// An unexpected token was encountered.
    #[error("Syntax error; token: {found}, expected: {expected}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },
    /// The expression ended prematurely.
    #[error("Syntax error; unexpected end of expression")]
    UnexpectedEof,
    /// A `#name` placeholder is not defined.
    #[error("An expression attribute name used in the document path is not defined; attribute name: {name}")]
    UnresolvedName {
        /// The unresolved placeholder.
        name: String,
    },
    /// A `:value` placeholder is not defined.
    #[error("An expression attribute value used in expression is not defined; attribute value: {name}")]
    UnresolvedValue {
        /// The unresolved placeholder.
        name: String,
    },
    /// An operand is invalid for the given operation.
    #[error("Invalid operand for {operation}: {message}")]
    InvalidOperand {
        /// The operation that failed.
        operation: String,
        /// Explanation.
        message: String,
    },
    /// A nested document path was used.
    #[error("Nested attribute paths are not supported; path starts at: {path}")]
    UnsupportedPath {
        /// The top-level element of the rejected path.
        path: String,
    },
    /// Nesting exceeds the configured depth.
    #[error("The expression is nested too deeply; maximum depth: {limit}")]
    TooDeep {
        /// The configured maximum depth.
        limit: usize,
    },
}

// ---------------------------------------------------------------------------
// Token type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    /// `#name`, stored with its `#`.
    NamePlaceholder(String),
    /// `:value`, stored with its `:`.
    ValuePlaceholder(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
    Between,
    In,
    AttributeExists,
    AttributeNotExists,
    AttributeType,
    BeginsWith,
    Contains,
    Size,
    Number(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s)
            | Self::NamePlaceholder(s)
            | Self::ValuePlaceholder(s)
            | Self::Number(s) => f.write_str(s),
            Self::Eq => f.write_str("="),
            Self::Ne => f.write_str("<>"),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::Dot => f.write_str("."),
            Self::Comma => f.write_str(","),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::LBracket => f.write_str("["),
            Self::RBracket => f.write_str("]"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Between => f.write_str("BETWEEN"),
            Self::In => f.write_str("IN"),
            Self::AttributeExists => f.write_str("attribute_exists"),
            Self::AttributeNotExists => f.write_str("attribute_not_exists"),
            Self::AttributeType => f.write_str("attribute_type"),
            Self::BeginsWith => f.write_str("begins_with"),
            Self::Contains => f.write_str("contains"),
            Self::Size => f.write_str("size"),
            Self::Eof => f.write_str("<EOF>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }

        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            '#' => self.read_placeholder('#').map(Token::NamePlaceholder),
            ':' => self.read_placeholder(':').map(Token::ValuePlaceholder),
            '=' => Ok(self.single(Token::Eq)),
            '<' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => Ok(self.single(Token::Le)),
                    Some('>') => Ok(self.single(Token::Ne)),
                    _ => Ok(Token::Lt),
                }
            }
            '>' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => Ok(self.single(Token::Ge)),
                    _ => Ok(Token::Gt),
                }
            }
            '.' => Ok(self.single(Token::Dot)),
            ',' => Ok(self.single(Token::Comma)),
            '(' => Ok(self.single(Token::LParen)),
            ')' => Ok(self.single(Token::RParen)),
            '[' => Ok(self.single(Token::LBracket)),
            ']' => Ok(self.single(Token::RBracket)),
            c if c.is_ascii_digit() => Ok(Token::Number(self.read_while(|c| c.is_ascii_digit()))),
            c if is_ident_start(c) => Ok(self.read_identifier_or_keyword()),
            _ => Err(ExpressionError::UnexpectedToken {
                expected: "a valid token".to_owned(),
                found: ch.to_string(),
            }),
        }
    }

    fn read_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if !accept(c) {
                break;
            }
            s.push(c);
            self.chars.next();
        }
        s
    }

    fn read_placeholder(&mut self, sigil: char) -> Result<String, ExpressionError> {
        self.chars.next();
        let name = self.read_while(is_ident_continue);
        if name.is_empty() {
            return Err(ExpressionError::UnexpectedToken {
                expected: format!("a name after '{sigil}'"),
                found: self
                    .chars
                    .peek()
                    .map_or_else(|| "<EOF>".to_owned(), char::to_string),
            });
        }
        Ok(format!("{sigil}{name}"))
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let ident = self.read_while(is_ident_continue);
        match ident.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "between" => Token::Between,
            "in" => Token::In,
            "attribute_exists" => Token::AttributeExists,
            "attribute_not_exists" => Token::AttributeNotExists,
            "attribute_type" => Token::AttributeType,
            "begins_with" => Token::BeginsWith,
            "contains" => Token::Contains,
            "size" => Token::Size,
            _ => Token::Identifier(ident),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        match self.advance() {
            Token::Eof if *expected != Token::Eof => Err(ExpressionError::UnexpectedEof),
            tok if tok == *expected => Ok(()),
            tok => Err(ExpressionError::UnexpectedToken {
                expected: expected.to_string(),
                found: tok.to_string(),
            }),
        }
    }

    fn expect_end(&self) -> Result<(), ExpressionError> {
        match self.peek() {
            Token::Eof => Ok(()),
            tok => Err(ExpressionError::UnexpectedToken {
                expected: "end of expression".to_owned(),
                found: tok.to_string(),
            }),
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExpressionError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

// ---------------------------------------------------------------------------
// Condition parsing (precedence climbing: OR < AND < NOT < primary)
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_or_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and_expr()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_not_expr()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ExpressionError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            self.enter()?;
            let inner = self.parse_not_expr()?;
            self.leave();
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ExpressionError> {
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            self.enter()?;
            let expr = self.parse_or_expr()?;
            self.leave();
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }

        if let Some(name) = self.peek_function_name() {
            return self.parse_function_expr(name);
        }

        let operand = self.parse_operand()?;
        self.parse_postfix_expr(operand)
    }

    fn peek_function_name(&self) -> Option<FunctionName> {
        match self.peek() {
            Token::AttributeExists => Some(FunctionName::AttributeExists),
            Token::AttributeNotExists => Some(FunctionName::AttributeNotExists),
            Token::AttributeType => Some(FunctionName::AttributeType),
            Token::BeginsWith => Some(FunctionName::BeginsWith),
            Token::Contains => Some(FunctionName::Contains),
            _ => None,
        }
    }

    fn parse_function_expr(&mut self, name: FunctionName) -> Result<Expr, ExpressionError> {
        self.advance();
        self.expect(&Token::LParen)?;
        let args = self.parse_operand_list()?;
        self.expect(&Token::RParen)?;

        if args.len() != name.arity() {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: format!(
                    "Incorrect number of operands; expected: {}, found: {}",
                    name.arity(),
                    args.len()
                ),
            });
        }
        if args.first().and_then(Operand::as_name).is_none() {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "the first operand must be an attribute name".to_owned(),
            });
        }
        if name == FunctionName::AttributeType && !matches!(args[1], Operand::Value(_)) {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "the type operand must be an expression attribute value".to_owned(),
            });
        }
        Ok(Expr::Function { name, args })
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, ExpressionError> {
        let mut list = vec![self.parse_operand()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            list.push(self.parse_operand()?);
        }
        Ok(list)
    }

    fn parse_postfix_expr(&mut self, left: Operand) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::Between => {
                self.advance();
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                return Ok(Expr::Between {
                    value: left,
                    low,
                    high,
                });
            }
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let list = self.parse_operand_list()?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::In { value: left, list });
            }
            Token::Eof => return Err(ExpressionError::UnexpectedEof),
            tok => {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "a comparison operator, BETWEEN or IN".to_owned(),
                    found: tok.to_string(),
                });
            }
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expr::Compare { left, op, right })
    }
}

// ---------------------------------------------------------------------------
// Operand parsing
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.peek() {
            Token::ValuePlaceholder(_) => match self.advance() {
                Token::ValuePlaceholder(value) => Ok(Operand::Value(value)),
                _ => Err(ExpressionError::UnexpectedEof),
            },
            Token::Size => {
                self.advance();
                self.expect(&Token::LParen)?;
                let name = self.parse_name()?;
                self.expect(&Token::RParen)?;
                Ok(Operand::Size(Box::new(Operand::Name(name))))
            }
            _ => self.parse_name().map(Operand::Name),
        }
    }

    /// Parse a top-level attribute name, rejecting document paths.
    fn parse_name(&mut self) -> Result<NameRef, ExpressionError> {
        let name = match self.advance() {
            Token::Identifier(name) => NameRef::Plain(name),
            Token::NamePlaceholder(name) => NameRef::Placeholder(name),
            Token::Eof => return Err(ExpressionError::UnexpectedEof),
            tok => {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "an attribute name or #name".to_owned(),
                    found: tok.to_string(),
                });
            }
        };
        if matches!(self.peek(), Token::Dot | Token::LBracket) {
            return Err(ExpressionError::UnsupportedPath {
                path: name.to_string(),
            });
        }
        Ok(name)
    }

    fn parse_projection_list(&mut self) -> Result<Vec<NameRef>, ExpressionError> {
        let mut names = vec![self.parse_name()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            names.push(self.parse_name()?);
        }
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Parse a key condition or filter expression.
///
/// `max_depth` bounds the nesting of parentheses and `NOT`.
pub fn parse_condition(input: &str, max_depth: usize) -> Result<Expr, ExpressionError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens, max_depth);
    let expr = parser.parse_or_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a projection expression: a comma-separated list of attribute names.
pub fn parse_projection(input: &str) -> Result<Vec<NameRef>, ExpressionError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens, 0);
    let names = parser.parse_projection_list()?;
    parser.expect_end()?;
    Ok(names)
}
