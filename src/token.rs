//! Lexical analysis: program text to a flat token sequence.
//!
//! Whitespace separates tokens and `;` starts a comment running to the end of the line.
//! A double quote starts a string token that runs to the next double quote, spaces
//! included. An unterminated string is still returned as a token; classifying it as
//! malformed is left to the parser.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace1},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{pair, terminated},
};
use std::fmt;
use std::io::Read;

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open,
    Close,
    /// Any atomic run of text: number, symbol or quoted string
    Text(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Ordered token sequence produced by [`tokenize`]
pub type TokenSequence = Vec<Token>;

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ';' | '"')
}

/// Skip any run of whitespace and comments
fn skip_trivia(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            multispace1,
            recognize(pair(char(';'), take_while(|c: char| c != '\n'))),
        ))),
    )
    .parse(input)
}

/// Quoted string including both quote characters; the closing quote may be missing
fn quoted(input: &str) -> IResult<&str, &str> {
    recognize((
        char('"'),
        take_while(|c: char| c != '"'),
        opt(char('"')),
    ))
    .parse(input)
}

/// One token, with any trailing trivia consumed
fn token(input: &str) -> IResult<&str, Token> {
    terminated(
        alt((
            value(Token::Open, char('(')),
            value(Token::Close, char(')')),
            map(quoted, |text: &str| Token::Text(text.to_owned())),
            map(take_while1(|c: char| !is_delimiter(c)), |text: &str| {
                Token::Text(text.to_owned())
            }),
        )),
        skip_trivia,
    )
    .parse(input)
}

/// Split program text into tokens
pub fn tokenize(input: &str) -> TokenSequence {
    let mut tokens = TokenSequence::new();

    let Ok((mut remaining, ())) = skip_trivia(input) else {
        return tokens;
    };

    while !remaining.is_empty() {
        match token(remaining) {
            Ok((rest, tok)) => {
                tokens.push(tok);
                remaining = rest;
            }
            Err(_) => {
                // Unreachable for well-formed UTF-8, but never drop input silently
                tokens.push(Token::Text(remaining.to_owned()));
                break;
            }
        }
    }

    log::trace!("tokenized {} tokens", tokens.len());
    tokens
}

/// Read a whole stream and tokenize it. A read failure yields no tokens, which the
/// parser reports as an empty program.
pub fn tokenize_stream(mut stream: impl Read) -> TokenSequence {
    let mut text = String::new();
    match stream.read_to_string(&mut text) {
        Ok(_) => tokenize(&text),
        Err(err) => {
            log::warn!("failed to read program text: {err}");
            TokenSequence::new()
        }
    }
}
