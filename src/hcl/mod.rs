//! Minimal HCL reader
//!
//! Parses Terraform configuration into a tree of attributes and blocks. Only
//! literal expressions (strings, numbers, bools, null, tuples and objects of
//! those) are classified; anything else is kept as [`ExprKind::Other`] with the
//! byte span of its source so callers can recover the text verbatim.

mod lexer;
mod value;

pub use value::{evaluate, Value};

use lexer::{Token, TokenKind};
use std::ops::Range;

/// A parse failure with the 1-based line it occurred on
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl ParseError {
    pub(crate) fn at(src: &str, offset: usize, message: &str) -> Self {
        let end = offset.min(src.len());
        let line = src.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1;
        Self {
            message: message.to_string(),
            line,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// The contents of a file or of a block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
}

impl Body {
    /// First attribute named `name`
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Blocks of the given type in source order
    pub fn blocks_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: String,
    pub labels: Vec<String>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    /// Byte range of the expression in the parsed source
    pub span: Range<usize>,
}

impl Expression {
    /// The expression exactly as written
    pub fn source_text<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.span.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Quoted string or heredoc containing interpolation or directives
    Template,
    Tuple(Vec<Expression>),
    Object(Vec<(String, Expression)>),
    /// References, function calls, operators, `for` expressions
    Other,
}

/// Parse a whole configuration file
pub fn parse(src: &str) -> Result<Body, ParseError> {
    let tokens = lexer::tokenize(src)?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
    };
    parser.parse_body(false)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn error_here(&self, message: &str) -> ParseError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or(self.src.len());
        ParseError::at(self.src, offset, message)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(TokenKind::Newline)) {
            self.pos += 1;
        }
    }

    fn parse_body(&mut self, nested: bool) -> Result<Body, ParseError> {
        let mut body = Body::default();

        loop {
            self.skip_newlines();
            let name = match self.peek() {
                None if nested => return Err(self.error_here("unclosed block, expected '}'")),
                None => return Ok(body),
                Some(TokenKind::Punct("}")) if nested => {
                    self.pos += 1;
                    return Ok(body);
                }
                Some(TokenKind::Ident(name)) => name.clone(),
                Some(_) => return Err(self.error_here("expected an attribute or block")),
            };
            self.pos += 1;

            match self.peek() {
                Some(TokenKind::Punct("=")) => {
                    self.pos += 1;
                    let expr = self.parse_expression()?;
                    body.attributes.push(Attribute { name, expr });
                }
                Some(TokenKind::Punct("{")) | Some(TokenKind::Str { .. }) | Some(TokenKind::Ident(_)) => {
                    let block = self.parse_block(name)?;
                    body.blocks.push(block);
                }
                _ => {
                    return Err(self.error_here(&format!(
                        "expected '=' or a block after '{}'",
                        name
                    )))
                }
            }
        }
    }

    fn parse_block(&mut self, kind: String) -> Result<Block, ParseError> {
        let mut labels = Vec::new();
        loop {
            match self.peek() {
                Some(TokenKind::Str { literal: Some(s) }) => labels.push(s.clone()),
                Some(TokenKind::Str { literal: None }) => {
                    return Err(self.error_here("block labels cannot contain interpolation"))
                }
                Some(TokenKind::Ident(s)) => labels.push(s.clone()),
                Some(TokenKind::Punct("{")) => break,
                _ => return Err(self.error_here("expected '{' to open block")),
            }
            self.pos += 1;
        }
        self.pos += 1;
        let body = self.parse_body(true)?;
        Ok(Block { kind, labels, body })
    }

    /// Consume tokens up to the end of the line, or up to an unmatched closing
    /// bracket, tracking nesting so multi-line collections stay whole.
    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(tok) = self.tokens.get(self.pos) {
            match tok.kind {
                TokenKind::Newline if depth == 0 => break,
                TokenKind::Punct("{") | TokenKind::Punct("[") | TokenKind::Punct("(") => {
                    depth += 1
                }
                TokenKind::Punct("}") | TokenKind::Punct("]") | TokenKind::Punct(")") => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.pos += 1;
        }

        if depth != 0 {
            return Err(self.error_here("unbalanced brackets in expression"));
        }
        if start == self.pos {
            return Err(self.error_here("expected an expression"));
        }

        Ok(build_expression(&self.tokens[start..self.pos]))
    }
}

fn trim_newlines(mut tokens: &[Token]) -> &[Token] {
    while let Some((first, rest)) = tokens.split_first() {
        if first.kind != TokenKind::Newline {
            break;
        }
        tokens = rest;
    }
    while let Some((last, rest)) = tokens.split_last() {
        if last.kind != TokenKind::Newline {
            break;
        }
        tokens = rest;
    }
    tokens
}

fn is_open(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Punct("{") | TokenKind::Punct("[") | TokenKind::Punct("(")
    )
}

fn is_close(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Punct("}") | TokenKind::Punct("]") | TokenKind::Punct(")")
    )
}

/// Index of the bracket closing the one at `open`
fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if is_open(&tok.kind) {
            depth += 1;
        } else if is_close(&tok.kind) {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split on separators that sit outside any brackets
fn split_top_level<'t>(tokens: &'t [Token], is_sep: impl Fn(&TokenKind) -> bool) -> Vec<&'t [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if is_open(&tok.kind) {
            depth += 1;
        } else if is_close(&tok.kind) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && is_sep(&tok.kind) {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn starts_for_expression(inner: &[Token]) -> bool {
    matches!(
        trim_newlines(inner).first().map(|t| &t.kind),
        Some(TokenKind::Ident(s)) if s == "for"
    )
}

fn build_expression(tokens: &[Token]) -> Expression {
    let tokens = trim_newlines(tokens);
    let span = match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => first.span.start..last.span.end,
        _ => 0..0,
    };
    Expression {
        kind: classify(tokens),
        span,
    }
}

fn classify(tokens: &[Token]) -> ExprKind {
    match tokens {
        [] => ExprKind::Other,
        [single] => match &single.kind {
            TokenKind::Ident(s) if s == "true" => ExprKind::Bool(true),
            TokenKind::Ident(s) if s == "false" => ExprKind::Bool(false),
            TokenKind::Ident(s) if s == "null" => ExprKind::Null,
            TokenKind::Number(n) => n.parse().map(ExprKind::Number).unwrap_or(ExprKind::Other),
            TokenKind::Str { literal: Some(s) } => ExprKind::String(s.clone()),
            TokenKind::Str { literal: None } | TokenKind::Heredoc => ExprKind::Template,
            _ => ExprKind::Other,
        },
        [minus, number] if minus.kind == TokenKind::Punct("-") => match &number.kind {
            TokenKind::Number(n) => n
                .parse::<f64>()
                .map(|v| ExprKind::Number(-v))
                .unwrap_or(ExprKind::Other),
            _ => ExprKind::Other,
        },
        _ => {
            if matching_close(tokens, 0) != Some(tokens.len() - 1) {
                return ExprKind::Other;
            }
            let inner = &tokens[1..tokens.len() - 1];
            if starts_for_expression(inner) {
                return ExprKind::Other;
            }
            match tokens[0].kind {
                TokenKind::Punct("[") => classify_tuple(inner),
                TokenKind::Punct("{") => classify_object(inner),
                _ => ExprKind::Other,
            }
        }
    }
}

fn classify_tuple(inner: &[Token]) -> ExprKind {
    let items = split_top_level(inner, |k| *k == TokenKind::Punct(","))
        .into_iter()
        .map(trim_newlines)
        .filter(|part| !part.is_empty())
        .map(build_expression)
        .collect();
    ExprKind::Tuple(items)
}

fn classify_object(inner: &[Token]) -> ExprKind {
    let mut fields = Vec::new();
    let items = split_top_level(inner, |k| {
        *k == TokenKind::Punct(",") || *k == TokenKind::Newline
    });

    for item in items.into_iter().map(trim_newlines) {
        if item.is_empty() {
            continue;
        }
        let Some(sep) = item
            .iter()
            .position(|t| t.kind == TokenKind::Punct("=") || t.kind == TokenKind::Punct(":"))
        else {
            return ExprKind::Other;
        };
        let key = match &item[..sep] {
            [tok] => match &tok.kind {
                TokenKind::Ident(s) => Some(s.clone()),
                TokenKind::Str { literal: Some(s) } => Some(s.clone()),
                _ => None,
            },
            _ => None,
        };
        let value = &item[sep + 1..];
        if value.is_empty() {
            return ExprKind::Other;
        }
        // Computed keys cannot be resolved statically
        if let Some(key) = key {
            fields.push((key, build_expression(value)));
        }
    }

    ExprKind::Object(fields)
}
