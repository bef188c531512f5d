//! Recursive-descent parser from tokens to a single expression tree.
//!
//! A program is exactly one parenthesized form. Inside a form the first token is the
//! head atom and the remaining tokens (or nested forms) are the children.

use crate::atom::Atom;
use crate::expression::Expression;
use crate::token::{Token, tokenize};
use crate::{MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Cursor over the token slice
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Build an error whose context is the token stream around `index`
    fn error_at(
        &self,
        kind: ParseErrorKind,
        message: impl Into<String>,
        index: usize,
    ) -> ParseError {
        let mut rendered = String::new();
        let mut offset = 0;
        for (i, token) in self.tokens.iter().enumerate() {
            if i == index {
                offset = rendered.chars().count();
            }
            if i > 0 {
                rendered.push(' ');
            }
            rendered.push_str(&token.to_string());
        }
        if index >= self.tokens.len() {
            offset = rendered.chars().count();
        }

        let found = self.tokens.get(index).map(ToString::to_string);
        ParseError::with_context_and_found(kind, message, &rendered, offset, found)
    }

    fn atom(&self, text: &str, index: usize) -> Result<Atom, ParseError> {
        Atom::from_token(text).ok_or_else(|| {
            self.error_at(
                ParseErrorKind::InvalidSyntax,
                format!("Invalid token '{text}'"),
                index,
            )
        })
    }

    /// Parse a form; the opening parenthesis has already been consumed
    fn parse_form(&mut self, depth: usize) -> Result<Expression, ParseError> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(self.error_at(
                ParseErrorKind::TooDeeplyNested,
                format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                self.pos,
            ));
        }

        let head_index = self.pos;
        let head = match self.next() {
            Some(Token::Text(text)) => self.atom(text, head_index)?,
            Some(Token::Close) => {
                return Err(self.error_at(
                    ParseErrorKind::InvalidSyntax,
                    "Empty form",
                    head_index,
                ));
            }
            Some(Token::Open) => {
                return Err(self.error_at(
                    ParseErrorKind::InvalidSyntax,
                    "A form must start with an atom",
                    head_index,
                ));
            }
            None => {
                return Err(self.error_at(
                    ParseErrorKind::Incomplete,
                    "Could not parse. Missing closing parenthesis",
                    head_index,
                ));
            }
        };

        let mut expr = Expression::new(head);
        loop {
            let index = self.pos;
            match self.next() {
                Some(Token::Close) => return Ok(expr),
                Some(Token::Open) => expr.push(self.parse_form(depth + 1)?),
                Some(Token::Text(text)) => expr.push(Expression::new(self.atom(text, index)?)),
                None => {
                    return Err(self.error_at(
                        ParseErrorKind::Incomplete,
                        "Could not parse. Missing closing parenthesis",
                        index,
                    ));
                }
            }
        }
    }
}

/// Parse a token sequence holding exactly one top-level form
pub fn parse(tokens: &[Token]) -> Result<Expression, ParseError> {
    let mut parser = Parser { tokens, pos: 0 };

    match parser.next() {
        Some(Token::Open) => {}
        Some(_) => {
            return Err(parser.error_at(
                ParseErrorKind::InvalidSyntax,
                "Could not parse. A program must be a parenthesized form",
                0,
            ));
        }
        None => {
            return Err(ParseError::from_message(
                ParseErrorKind::Incomplete,
                "Could not parse. Empty program",
            ));
        }
    }

    let expr = parser.parse_form(0)?;

    if parser.peek().is_some() {
        return Err(parser.error_at(
            ParseErrorKind::TrailingContent,
            "Could not parse. Unexpected input after the program",
            parser.pos,
        ));
    }

    Ok(expr)
}

/// Tokenize and parse program text
pub fn parse_str(input: &str) -> Result<Expression, ParseError> {
    parse(&tokenize(input))
}
