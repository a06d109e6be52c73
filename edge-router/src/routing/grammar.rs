/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Route rule grammar: `FROM <source> [WHERE <condition>] INTO <endpoint>`.
//!
//! The parser is a single recursive-descent pass over a token stream and builds the
//! predicate tree directly. Condition precedence, lowest first: `OR`, `AND`, `NOT`,
//! comparison, operand.

use crate::endpoint::EndpointReference;
use crate::routing::condition::{Builtin, ComparisonOp, Expr, Value};
use crate::routing::route::RouteSource;
use thiserror::Error;

/// Rule text that failed to parse. `position` is a byte offset into `text`.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("route '{text}' is invalid at position {position}: {message}")]
pub struct RouteParseError {
    pub message: String,
    pub position: usize,
    pub text: String,
}

/// Syntactic parts of a rule before endpoint resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedRoute {
    pub source: RouteSource,
    pub condition: Option<Expr>,
    pub endpoint: EndpointReference,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Path(String),
    Ident(String),
    SystemIdent(String),
    Str(String),
    Number(f64),
    LParen,
    RParen,
    Comma,
    Op(ComparisonOp),
    Eof,
}

struct Lexer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> RouteParseError {
        RouteParseError {
            message: message.into(),
            position,
            text: self.text.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if !accept(byte) {
                break;
            }
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, RouteParseError> {
        let mut tokens = Vec::new();
        loop {
            self.take_while(|byte| byte.is_ascii_whitespace());
            let start = self.pos;
            let Some(byte) = self.peek() else {
                tokens.push((Token::Eof, start));
                return Ok(tokens);
            };

            let token = match byte {
                b'/' => Token::Path(self.take_while(|b| !b.is_ascii_whitespace()).to_string()),
                b'$' => {
                    self.pos += 1;
                    let name = self.take_while(|b| is_ident_byte(b) || b == b'.');
                    if name.is_empty() {
                        return Err(self.error("expected a name after '$'", start));
                    }
                    Token::SystemIdent(name.to_string())
                }
                b'\'' | b'"' => Token::Str(self.string_literal(byte)?),
                b'-' | b'0'..=b'9' => self.number(start)?,
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b',' => self.single(Token::Comma),
                b'=' => self.single(Token::Op(ComparisonOp::Eq)),
                b'!' => {
                    if self.bytes.get(self.pos + 1) == Some(&b'=') {
                        self.pos += 2;
                        Token::Op(ComparisonOp::Ne)
                    } else {
                        return Err(self.error("expected '!='", start));
                    }
                }
                b'<' => match self.bytes.get(self.pos + 1) {
                    Some(b'=') => {
                        self.pos += 2;
                        Token::Op(ComparisonOp::Le)
                    }
                    Some(b'>') => {
                        self.pos += 2;
                        Token::Op(ComparisonOp::Ne)
                    }
                    _ => self.single(Token::Op(ComparisonOp::Lt)),
                },
                b'>' => {
                    if self.bytes.get(self.pos + 1) == Some(&b'=') {
                        self.pos += 2;
                        Token::Op(ComparisonOp::Ge)
                    } else {
                        self.single(Token::Op(ComparisonOp::Gt))
                    }
                }
                byte if is_ident_start(byte) => {
                    Token::Ident(self.take_while(is_ident_byte).to_string())
                }
                _ => {
                    let unexpected = self.text[start..].chars().next().unwrap_or('?');
                    return Err(self.error(format!("unexpected character '{unexpected}'"), start));
                }
            };
            tokens.push((token, start));
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn string_literal(&mut self, quote: u8) -> Result<String, RouteParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        let text = self.text;
        let mut chars = text[self.pos..].char_indices();
        while let Some((offset, ch)) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                ch if ch as u32 == quote as u32 => {
                    self.pos += offset + 1;
                    return Ok(value);
                }
                ch => value.push(ch),
            }
        }
        Err(self.error("unterminated string literal", start))
    }

    fn number(&mut self, start: usize) -> Result<Token, RouteParseError> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        self.take_while(|b| b.is_ascii_digit() || b == b'.');
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            self.take_while(|b| b.is_ascii_digit());
        }
        let literal = &self.text[start..self.pos];
        literal
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number '{literal}'"), start))
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(Token, usize)>,
    index: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> RouteParseError {
        RouteParseError {
            message: message.into(),
            position: self.position(),
            text: self.text.to_string(),
        }
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .map(|(_, position)| *position)
            .unwrap_or(self.text.len())
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.index)
            .map(|(token, _)| token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), RouteParseError> {
        if self.at_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{keyword}'")))
        }
    }

    fn expect(&mut self, expected: Token, label: &str) -> Result<(), RouteParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{label}'")))
        }
    }

    fn route(&mut self) -> Result<ParsedRoute, RouteParseError> {
        self.expect_keyword("FROM")?;
        let source = match self.peek().clone() {
            Token::Path(selector) => {
                let source = RouteSource::from_selector(&selector)
                    .ok_or_else(|| self.error(format!("unknown source '{selector}'")))?;
                self.advance();
                source
            }
            _ => return Err(self.error("expected a source selector")),
        };

        let condition = if self.at_keyword("WHERE") {
            self.advance();
            Some(self.or_expr()?)
        } else {
            None
        };

        self.expect_keyword("INTO")?;
        let endpoint = self.endpoint()?;

        if *self.peek() != Token::Eof {
            return Err(self.error("unexpected input after endpoint"));
        }

        Ok(ParsedRoute {
            source,
            condition,
            endpoint,
        })
    }

    fn endpoint(&mut self) -> Result<EndpointReference, RouteParseError> {
        match self.advance() {
            Token::SystemIdent(name) => Ok(EndpointReference::System(format!("${name}"))),
            Token::Ident(name) => {
                self.expect(Token::LParen, "(")?;
                let parameter = match self.advance() {
                    Token::Str(parameter) => parameter,
                    _ => {
                        self.index -= 1;
                        return Err(self.error("expected a string endpoint parameter"));
                    }
                };
                self.expect(Token::RParen, ")")?;
                Ok(EndpointReference::Function { name, parameter })
            }
            _ => {
                self.index = self.index.saturating_sub(1);
                Err(self.error("expected an endpoint"))
            }
        }
    }

    fn or_expr(&mut self) -> Result<Expr, RouteParseError> {
        let mut lhs = self.and_expr()?;
        while self.at_keyword("OR") {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, RouteParseError> {
        let mut lhs = self.not_expr()?;
        while self.at_keyword("AND") {
            self.advance();
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, RouteParseError> {
        if self.at_keyword("NOT") {
            self.advance();
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, RouteParseError> {
        let lhs = self.operand()?;
        if let Token::Op(op) = *self.peek() {
            self.advance();
            let rhs = self.operand()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<Expr, RouteParseError> {
        match self.peek().clone() {
            Token::Str(value) => {
                self.advance();
                Ok(Expr::Literal(Value::String(value)))
            }
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(value)))
            }
            Token::LParen => {
                self.advance();
                let inner = self.or_expr()?;
                self.expect(Token::RParen, ")")?;
                Ok(inner)
            }
            Token::SystemIdent(name) => {
                let expr = self.system_operand(&name)?;
                self.advance();
                Ok(expr)
            }
            Token::Ident(name) => {
                if name.eq_ignore_ascii_case("true") {
                    self.advance();
                    return Ok(Expr::Literal(Value::Bool(true)));
                }
                if name.eq_ignore_ascii_case("false") {
                    self.advance();
                    return Ok(Expr::Literal(Value::Bool(false)));
                }
                if name.eq_ignore_ascii_case("null") {
                    self.advance();
                    return Ok(Expr::Literal(Value::Null));
                }
                if ["AND", "OR", "NOT", "INTO", "WHERE", "FROM"]
                    .iter()
                    .any(|keyword| name.eq_ignore_ascii_case(keyword))
                {
                    return Err(self.error(format!("unexpected keyword '{name}'")));
                }
                if self.tokens.get(self.index + 1).map(|(token, _)| token) == Some(&Token::LParen) {
                    return self.call(&name);
                }
                self.advance();
                Ok(Expr::Property(name))
            }
            Token::Eof => Err(self.error("unexpected end of rule")),
            _ => Err(self.error("expected an operand")),
        }
    }

    fn system_operand(&self, name: &str) -> Result<Expr, RouteParseError> {
        let mut segments = name.split('.');
        let head = segments.next().unwrap_or_default();
        let rest: Vec<String> = segments.map(str::to_string).collect();

        if head.eq_ignore_ascii_case("body") {
            if rest.iter().any(String::is_empty) {
                return Err(self.error(format!("invalid body query '${name}'")));
            }
            return Ok(Expr::BodyQuery(rest));
        }
        if !rest.is_empty() {
            return Err(self.error(format!("unsupported property path '${name}'")));
        }
        Ok(Expr::SystemProperty(head.to_string()))
    }

    fn call(&mut self, name: &str) -> Result<Expr, RouteParseError> {
        let function = Builtin::from_name(name)
            .ok_or_else(|| self.error(format!("unknown function '{name}'")))?;
        self.advance();
        self.expect(Token::LParen, "(")?;

        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.or_expr()?);
                if *self.peek() == Token::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        if args.len() != function.arity() {
            return Err(self.error(format!(
                "function '{name}' expects {} argument(s), got {}",
                function.arity(),
                args.len()
            )));
        }
        self.expect(Token::RParen, ")")?;
        Ok(Expr::Call { function, args })
    }
}

/// Parses a complete route rule. Either the whole rule parses or an error is returned.
pub fn parse_route(text: &str) -> Result<ParsedRoute, RouteParseError> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser {
        text,
        tokens,
        index: 0,
    };
    parser.route()
}
