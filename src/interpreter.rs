//! Front end pairing a parsed program with the environment it is evaluated in.

use crate::environment::Environment;
use crate::evaluator::eval;
use crate::expression::Expression;
use crate::interrupt::Interrupt;
use crate::parser::{parse, parse_str};
use crate::token::tokenize_stream;
use crate::{DEFAULT_STARTUP, Error, ParseError};
use std::io::Read;

/// Parses programs and evaluates them against one persistent environment.
///
/// Parsing and evaluation are separate steps: [`Interpreter::parse_str`] or
/// [`Interpreter::parse_stream`] stores the program, [`Interpreter::evaluate`] runs the
/// most recently parsed one.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    env: Environment<'static>,
    program: Option<Expression>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter whose evaluations observe `interrupt`
    pub fn with_interrupt(interrupt: Interrupt) -> Self {
        Interpreter {
            env: Environment::with_interrupt(interrupt),
            program: None,
        }
    }

    /// Interpreter seeded by evaluating `startup` once
    pub fn with_startup(startup: &str) -> Result<Self, Error> {
        let mut interpreter = Self::new();
        interpreter.run_startup(startup)?;
        Ok(interpreter)
    }

    /// Interpreter seeded with `make-point`, `make-line` and `make-text`
    pub fn with_default_startup() -> Result<Self, Error> {
        Self::with_startup(DEFAULT_STARTUP)
    }

    /// Evaluate a startup program into the environment, leaving no parsed program behind
    pub fn run_startup(&mut self, startup: &str) -> Result<(), Error> {
        let program = parse_str(startup)?;
        eval(&program, &mut self.env)?;
        log::debug!("startup program evaluated");
        Ok(())
    }

    /// Parse program text from a stream; the program is kept only on success
    pub fn parse_stream(&mut self, stream: impl Read) -> Result<(), ParseError> {
        self.store(parse(&tokenize_stream(stream)))
    }

    /// Parse program text; the program is kept only on success
    pub fn parse_str(&mut self, input: &str) -> Result<(), ParseError> {
        self.store(parse_str(input))
    }

    fn store(&mut self, parsed: Result<Expression, ParseError>) -> Result<(), ParseError> {
        match parsed {
            Ok(program) => {
                self.program = Some(program);
                Ok(())
            }
            Err(err) => {
                self.program = None;
                Err(err)
            }
        }
    }

    /// Evaluate the most recently parsed program
    pub fn evaluate(&mut self) -> Result<Expression, Error> {
        let Some(program) = &self.program else {
            return Err(Error::EvalError(
                "no program has been parsed".to_owned(),
            ));
        };
        eval(program, &mut self.env)
    }

    /// Parse and evaluate in one step
    pub fn eval_str(&mut self, input: &str) -> Result<Expression, Error> {
        self.parse_str(input)?;
        self.evaluate()
    }

    pub fn env(&self) -> &Environment<'static> {
        &self.env
    }

    /// Replace the environment, keeping this interpreter's cancellation token
    pub fn set_env(&mut self, mut env: Environment<'static>) {
        env.set_interrupt(self.env.interrupt().clone());
        self.env = env;
    }

    pub fn interrupt(&self) -> &Interrupt {
        self.env.interrupt()
    }

    pub fn raise_interrupt(&self) {
        self.interrupt().raise();
    }

    pub fn clear_interrupt(&self) {
        self.interrupt().clear();
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ParseErrorKind;
    use crate::atom::Atom;

    #[test]
    fn test_parse_then_evaluate() {
        let mut interp = Interpreter::new();

        interp.parse_str("(+ 1 2)").unwrap();
        assert_eq!(interp.evaluate().unwrap(), Expression::from(3.0));
        // The parsed program stays until replaced
        assert_eq!(interp.evaluate().unwrap(), Expression::from(3.0));

        interp.parse_stream("(define a (* 2 3))".as_bytes()).unwrap();
        assert_eq!(interp.evaluate().unwrap(), Expression::from(6.0));
        assert_eq!(interp.eval_str("(+ a 1)").unwrap(), Expression::from(7.0));
    }

    #[test]
    fn test_parse_failures() {
        let mut interp = Interpreter::new();

        let err = interp.parse_str("(+ 1 2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Incomplete);
        assert!(interp.parse_stream("".as_bytes()).is_err());
        assert!(interp.parse_stream("(1abc)".as_bytes()).is_err());

        // A failed parse discards the previous program
        interp.parse_str("(1)").unwrap();
        assert!(interp.parse_str("(").is_err());
        assert!(matches!(interp.evaluate(), Err(Error::EvalError(_))));
    }

    #[test]
    fn test_default_startup() {
        let mut interp = Interpreter::with_default_startup().unwrap();

        let point = interp.eval_str("(make-point 1 2)").unwrap();
        assert_eq!(point, Expression::point(1.0, 2.0));
        assert_eq!(point.object_name(), Some("point"));
        assert_eq!(point.property("size"), Some(&Expression::from(0.0)));

        let line = interp
            .eval_str("(make-line (make-point 0 0) (make-point 1 1))")
            .unwrap();
        assert_eq!(line.object_name(), Some("line"));
        assert_eq!(line.property("thickness"), Some(&Expression::from(1.0)));

        let text = interp.eval_str("(make-text \"hi\")").unwrap();
        assert_eq!(text.head(), &Atom::string("hi"));
        assert_eq!(text.object_name(), Some("text"));
        assert_eq!(
            text.property("position").and_then(Expression::as_coordinate),
            Some((0.0, 0.0))
        );
    }

    #[test]
    fn test_startup_failures() {
        assert!(matches!(
            Interpreter::with_startup("(define"),
            Err(Error::ParseError(_))
        ));
        assert!(matches!(
            Interpreter::with_startup("(define begin 1)"),
            Err(Error::EvalError(_))
        ));
    }

    #[test]
    fn test_env_snapshot_and_restore() {
        let mut interp = Interpreter::new();
        interp.eval_str("(define a 1)").unwrap();
        let snapshot = interp.env().clone();

        interp.eval_str("(define b 2)").unwrap();
        interp.set_env(snapshot);

        assert!(interp.eval_str("(b)").is_err());
        assert_eq!(interp.eval_str("(a)").unwrap(), Expression::from(1.0));
    }

    #[test]
    fn test_set_env_keeps_interrupt_token() {
        let token = Interrupt::new();
        let mut interp = Interpreter::with_interrupt(token.clone());

        interp.set_env(Environment::new());
        token.raise();
        assert_eq!(interp.eval_str("(1)").unwrap_err(), Error::Interrupted);

        interp.clear_interrupt();
        assert!(!token.is_raised());
        interp.raise_interrupt();
        assert!(token.is_raised());
    }
}
