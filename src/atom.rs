//! The scalar value type of the language.
//!
//! An [`Atom`] is exactly one of: nothing, a real number, a complex number, a symbol,
//! a string, an error message, or one of the two structural markers (`List` and
//! `Lambda`) used as the head of synthesized expressions.
//!
//! Strings keep their surrounding quote characters, so `"hi"` in program text is stored
//! as the four characters `"hi"` and printed back the same way.

use nom::number::complete::recognize_float;
use num::complex::Complex64;
use std::fmt;

/// Tagged scalar value
#[derive(Debug, Clone, Default)]
pub enum Atom {
    #[default]
    None,
    Number(f64),
    Complex(Complex64),
    Symbol(String),
    /// Head marker of a list value
    List,
    /// Head marker of a lambda value
    Lambda,
    /// String literal, stored with its quote framing
    String(String),
    /// Error message produced at the evaluation boundary
    Error(String),
}

/// Prefix that turns a raw string into an [`Atom::Error`]
const ERROR_PREFIX: &str = "error";

impl Atom {
    /// Classify a lexical token.
    ///
    /// A token that reads completely as a floating point literal is a number. Otherwise
    /// a token that starts with a digit is malformed (`1abc`), a token framed by exactly
    /// two quote characters is a string, one containing any other quote arrangement is
    /// malformed, and everything else is a symbol. Malformed tokens yield `None`.
    pub fn from_token(token: &str) -> Option<Atom> {
        if let Some(number) = parse_number(token) {
            return Some(Atom::Number(number));
        }

        let first = token.chars().next()?;
        if first.is_ascii_digit() {
            return None;
        }

        let quotes = token.matches('"').count();
        match quotes {
            0 => Some(Atom::Symbol(token.to_owned())),
            2 if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') => {
                Some(Atom::String(token.to_owned()))
            }
            _ => None,
        }
    }

    /// Build an error atom carrying `message`
    pub fn error(message: impl Into<String>) -> Self {
        Atom::Error(message.into())
    }

    /// Build a string atom from unquoted text, adding the quote framing
    pub fn string(content: &str) -> Self {
        Atom::String(format!("\"{content}\""))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Atom::None)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Atom::Number(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Atom::Complex(_))
    }

    /// True for real or complex numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Atom::Number(_) | Atom::Complex(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Atom::Symbol(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Atom::List)
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self, Atom::Lambda)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Atom::String(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Atom::Error(_))
    }

    /// Numeric payload, or 0.0 for any other variant
    pub fn as_number(&self) -> f64 {
        match self {
            Atom::Number(n) => *n,
            _ => 0.0,
        }
    }

    /// Complex payload, or 0+0i for any other variant
    pub fn as_complex(&self) -> Complex64 {
        match self {
            Atom::Complex(c) => *c,
            _ => Complex64::new(0.0, 0.0),
        }
    }

    /// Real or complex payload widened to complex, or 0+0i
    pub fn as_complex_widened(&self) -> Complex64 {
        match self {
            Atom::Number(n) => Complex64::new(*n, 0.0),
            Atom::Complex(c) => *c,
            _ => Complex64::new(0.0, 0.0),
        }
    }

    /// Symbol name, or the empty string
    pub fn as_symbol(&self) -> &str {
        match self {
            Atom::Symbol(s) => s,
            _ => "",
        }
    }

    pub fn as_list(&self) -> bool {
        self.is_list()
    }

    /// `"lambda"` for the lambda marker, or the empty string
    pub fn as_lambda(&self) -> &str {
        match self {
            Atom::Lambda => "lambda",
            _ => "",
        }
    }

    /// String payload including its quote framing, or the empty string
    pub fn as_string(&self) -> &str {
        match self {
            Atom::String(s) => s,
            _ => "",
        }
    }

    /// String payload with the quote framing removed, or the empty string
    pub fn string_content(&self) -> &str {
        let framed = self.as_string();
        framed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(framed)
    }

    /// Error message, or the empty string
    pub fn as_error(&self) -> &str {
        match self {
            Atom::Error(message) => message,
            _ => "",
        }
    }
}

/// Parse `token` as a number only if the whole token is a floating point literal
fn parse_number(token: &str) -> Option<f64> {
    match recognize_float::<_, nom::error::Error<&str>>(token) {
        Ok(("", literal)) => literal.parse().ok(),
        _ => None,
    }
}

impl From<f64> for Atom {
    fn from(value: f64) -> Self {
        Atom::Number(value)
    }
}

impl From<Complex64> for Atom {
    fn from(value: Complex64) -> Self {
        Atom::Complex(value)
    }
}

/// Classify raw text the way synthesized atoms are named: `lambda` is the lambda marker,
/// a leading quote makes a string, a leading `error` makes an error whose message is the
/// remainder, and anything else is a symbol.
impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        if value == "lambda" {
            Atom::Lambda
        } else if value.starts_with('"') {
            Atom::String(value.to_owned())
        } else if let Some(message) = value.strip_prefix(ERROR_PREFIX) {
            Atom::Error(message.to_owned())
        } else {
            Atom::Symbol(value.to_owned())
        }
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Atom::from(value.as_str())
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Atom::None, Atom::None) | (Atom::List, Atom::List) | (Atom::Lambda, Atom::Lambda) => {
                true
            }
            // NaN fails the comparison on its own
            (Atom::Number(a), Atom::Number(b)) => (a - b).abs() <= f64::EPSILON,
            (Atom::Complex(a), Atom::Complex(b)) => (a - b).norm() <= f64::EPSILON,
            (Atom::Symbol(a), Atom::Symbol(b))
            | (Atom::String(a), Atom::String(b))
            | (Atom::Error(a), Atom::Error(b)) => a == b,
            _ => false,
        }
    }
}

/// Format like C's `%.{precision}g`: shortest of fixed or scientific notation with
/// `precision` significant digits and trailing zeros removed.
pub(crate) fn format_general(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            strip_trailing_zeros(mantissa),
            exponent.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{value:.decimals$}")).to_owned()
    }
}

fn strip_trailing_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::None => write!(f, "NONE"),
            Atom::Number(n) => write!(f, "{}", format_general(*n, 6)),
            Atom::Complex(c) => write!(
                f,
                "({},{})",
                format_general(c.re, 6),
                format_general(c.im, 6)
            ),
            Atom::Symbol(s) | Atom::String(s) | Atom::Error(s) => write!(f, "{s}"),
            Atom::List => Ok(()),
            Atom::Lambda => write!(f, "lambda"),
        }
    }
}
