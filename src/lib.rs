//! Plotscript - an embeddable interpreter for a small Scheme-like plotting language
//!
//! Programs are single parenthesized forms evaluated against a mutable environment of
//! built-in procedures and user definitions. Values are numbers, complex numbers,
//! strings, symbols, lists and lambdas, and any value can carry a map of properties
//! that an external display layer reads to draw points, lines and text.
//!
//! ```scheme
//! (+ 1 2 I)                                  ; complex arithmetic -> (3,1)
//! (begin (define f (lambda (x) (* 2 x)))
//!        (map f (list 1 2 3)))               ; -> (2 4 6)
//! (get-property "note" (set-property "note" "hi" (1)))
//! (discrete-plot (list (list 0 1) (list 1 2)) (list (list "title" "demo")))
//! ```
//!
//! ## Evaluation model
//!
//! - Evaluation is a recursive tree walk; special forms (`begin`, `define`, `lambda`,
//!   `apply`, `map`, `set-property`, `get-property`, the plot forms) are dispatched on
//!   the head symbol, everything else is procedure application.
//! - Lambda calls run in a child scope holding only the bound parameters, so a `define`
//!   inside a lambda body never leaks into the caller.
//! - Every evaluation step checks a cooperative [`interrupt::Interrupt`] token, which is
//!   how a running evaluation is cancelled from another thread.
//!
//! ## Modules
//!
//! - `atom` / `expression`: the value model
//! - `token` / `parser`: text to expression tree
//! - `environment` / `builtinops`: bindings and the built-in procedure registry
//! - `evaluator`: special forms, procedure application, plots
//! - `interpreter`: parse-then-evaluate front end with startup seeding
//! - `queue` / `consumer` / `interrupt`: the worker thread protocol
//! - `scene`: typed render primitives extracted from results (feature `scene`)

use std::fmt;

use crate::builtinops::Arity;

/// Maximum nesting depth accepted by the parser
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum evaluation depth before a runaway recursion is reported as an error
/// Every nested form and every lambda call adds one level
pub const MAX_EVAL_DEPTH: usize = 512;

/// Startup program evaluated by every interpreter created through [`interpreter::Interpreter::with_default_startup`].
///
/// Defines the constructors for the three render primitives understood by the display layer.
pub const DEFAULT_STARTUP: &str = r#"(begin
  (define make-point
    (lambda (x y)
      (set-property "size" 0 (set-property "object-name" "point" (list x y)))))
  (define make-line
    (lambda (p1 p2)
      (set-property "thickness" 1 (set-property "object-name" "line" (list p1 p2)))))
  (define make-text
    (lambda (str)
      (set-property "position" (make-point 0 0) (set-property "object-name" "text" str))))
)
"#;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed literals, empty forms)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed parens, empty program)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from the rendered token stream
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        Self::with_context_and_found(kind, message, input, error_offset, None)
    }

    /// Create a ParseError with context and found token
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
///
/// The `Display` form of each variant is the user-facing message surfaced by the
/// consumer and the REPL, so the wording is stable.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    /// Malformed special form, redefinition attempt, bad procedure position, ...
    EvalError(String),
    UnboundSymbol(String),
    /// A built-in procedure rejected one of its arguments
    ArgumentError {
        procedure: String,
        message: String,
    },
    ArityError {
        procedure: String,
        expected: Arity,
        got: usize,
    },
    /// Invalid input to one of the plot forms
    PlotError(String),
    /// Evaluation was cancelled through the interpreter's interrupt token
    Interrupted,
    /// Failure of the worker thread machinery rather than of the program itself
    KernelError(String),
}

impl Error {
    /// Create an ArgumentError for the named procedure
    pub fn argument_error(procedure: &str, message: impl Into<String>) -> Self {
        Error::ArgumentError {
            procedure: procedure.to_owned(),
            message: message.into(),
        }
    }

    /// Create an ArityError for the named procedure
    pub fn arity_error(procedure: &str, expected: Arity, got: usize) -> Self {
        Error::ArityError {
            procedure: procedure.to_owned(),
            expected,
            got,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "Error: Invalid Expression. {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "Error during evaluation: {msg}"),
            Error::UnboundSymbol(name) => {
                write!(f, "Error during evaluation: unknown symbol {name}")
            }
            Error::ArgumentError { procedure, message } => {
                write!(f, "Error in call to {procedure}: {message}.")
            }
            Error::ArityError { procedure, .. } => {
                write!(f, "Error in call to {procedure}: invalid number of arguments.")
            }
            Error::PlotError(msg) => write!(f, "Error: {msg}"),
            Error::Interrupted => write!(f, "Error: interpreter kernel interrupted"),
            Error::KernelError(msg) => write!(f, "Error: interpreter kernel {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

pub mod atom;
pub mod builtinops;
pub mod consumer;
pub mod environment;
pub mod evaluator;
pub mod expression;
pub mod interpreter;
pub mod interrupt;
pub mod parser;
pub mod queue;
pub mod token;

#[cfg(feature = "scene")]
pub mod scene;
