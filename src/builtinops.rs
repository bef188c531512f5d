//! Built-in operations registry.
//!
//! Every built-in operation is described once in [`BUILTIN_OPS`] with its identifier,
//! the name used in its error messages, its arity and its implementation.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: receive already-evaluated arguments (e.g. `+`, `sqrt`, `first`).
//!   They are bound as procedures in every fresh [`Environment`].
//! - **Special Forms**: receive their arguments unevaluated together with the
//!   environment (e.g. `define`, `lambda`, `map`). They are dispatched by the evaluator
//!   on the head symbol and are never bound in the environment, but their names are
//!   reserved and cannot be redefined.
//!
//! ## Numeric tower
//!
//! Arithmetic accepts any mix of real and complex arguments. The result is complex
//! whenever any argument was complex, even if its imaginary part ends up zero, and real
//! otherwise. `sqrt` of a negative real is the one real operation with a complex result.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature `fn(&[Expression]) -> Result<Expression, Error>`
//! 2. **Add it to BUILTIN_OPS** with its identifier, message name and arity
//! 3. **Add tests** for both results and error conditions

use crate::Error;
use crate::atom::Atom;
use crate::environment::Environment;
use crate::evaluator::plot::{eval_continuous_plot, eval_discrete_plot};
use crate::evaluator::{
    eval_apply, eval_begin, eval_define, eval_get_property, eval_lambda, eval_map,
    eval_set_property,
};
use crate::expression::Expression;
use num::complex::Complex64;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Accepted argument counts of an operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive range
    Range(usize, usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
            Arity::Any => true,
        }
    }

    /// Check an argument count, naming `procedure` in the error
    pub fn validate(&self, procedure: &str, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(procedure, *self, count))
        }
    }
}

/// Signature of a built-in function
pub type BuiltinFn = fn(&[Expression]) -> Result<Expression, Error>;

/// Signature of a special form: unevaluated arguments, environment, evaluation depth
pub type SpecialFormFn = fn(&[Expression], &mut Environment<'_>, usize) -> Result<Expression, Error>;

/// Represents the implementation of a built-in operation
#[derive(Clone, Copy)]
pub enum OpKind {
    Function(BuiltinFn),
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The identifier programs use for this operation
    pub scheme_id: &'static str,
    /// The name used in this operation's error messages
    pub name: &'static str,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.scheme_id == other.scheme_id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(self.name, arg_count)
    }

    /// Apply a function operation to already-evaluated arguments.
    ///
    /// Special forms cannot be applied to values and report an evaluation error.
    pub fn call(&self, args: &[Expression]) -> Result<Expression, Error> {
        match self.op_kind {
            OpKind::Function(func) => {
                self.validate_arity(args.len())?;
                func(args)
            }
            OpKind::SpecialForm(_) => Err(Error::EvalError(format!(
                "special form {} cannot be applied as a procedure",
                self.scheme_id
            ))),
        }
    }
}

//
// Argument helpers
//

/// A numeric argument, remembering whether it was given as complex
#[derive(Debug, Clone, Copy)]
enum Numeric {
    Real(f64),
    Complex(Complex64),
}

impl Numeric {
    fn widened(self) -> Complex64 {
        match self {
            Numeric::Real(n) => Complex64::new(n, 0.0),
            Numeric::Complex(c) => c,
        }
    }
}

impl From<Numeric> for Expression {
    fn from(value: Numeric) -> Self {
        match value {
            Numeric::Real(n) => Expression::from(n),
            Numeric::Complex(c) => Expression::from(c),
        }
    }
}

fn numeric(procedure: &str, arg: &Expression) -> Result<Numeric, Error> {
    match arg.head() {
        Atom::Number(n) if arg.tail().is_empty() => Ok(Numeric::Real(*n)),
        Atom::Complex(c) if arg.tail().is_empty() => Ok(Numeric::Complex(*c)),
        _ => Err(Error::argument_error(procedure, "invalid argument")),
    }
}

fn real(procedure: &str, arg: &Expression) -> Result<f64, Error> {
    arg.as_number()
        .ok_or_else(|| Error::argument_error(procedure, "invalid argument"))
}

fn complex(procedure: &str, arg: &Expression) -> Result<Complex64, Error> {
    match arg.head() {
        Atom::Complex(c) if arg.tail().is_empty() => Ok(*c),
        _ => Err(Error::argument_error(procedure, "invalid argument")),
    }
}

fn list<'a>(procedure: &str, arg: &'a Expression) -> Result<&'a [Expression], Error> {
    if arg.is_list() {
        Ok(arg.tail())
    } else {
        Err(Error::argument_error(procedure, "argument is not a list"))
    }
}

/// Report `value` as complex if any argument was complex, else as its real part
fn numeric_result(value: Complex64, args: &[Expression]) -> Expression {
    if args.iter().any(|arg| arg.head().is_complex()) {
        Expression::from(value)
    } else {
        Expression::from(value.re)
    }
}

/// Multiplicative inverse; the inverse of complex zero is taken to be zero
fn inverse(value: Numeric) -> Numeric {
    match value {
        Numeric::Real(n) => Numeric::Real(1.0 / n),
        Numeric::Complex(c) if c.norm_sqr() == 0.0 => Numeric::Complex(c),
        Numeric::Complex(c) => Numeric::Complex(c.conj() / c.norm_sqr()),
    }
}

//
// Builtin Function Implementations
//

fn builtin_default(_args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::default())
}

fn builtin_add(args: &[Expression]) -> Result<Expression, Error> {
    let mut sum = Complex64::new(0.0, 0.0);
    for arg in args {
        sum += numeric("add", arg)?.widened();
    }
    Ok(numeric_result(sum, args))
}

fn builtin_mul(args: &[Expression]) -> Result<Expression, Error> {
    let mut product = Complex64::new(1.0, 0.0);
    for arg in args {
        product *= numeric("mul", arg)?.widened();
    }
    Ok(numeric_result(product, args))
}

fn builtin_sub(args: &[Expression]) -> Result<Expression, Error> {
    let result = match args {
        [x] => -numeric("sub", x)?.widened(),
        [a, b] => numeric("sub", a)?.widened() - numeric("sub", b)?.widened(),
        _ => return Err(Error::arity_error("sub", Arity::Range(1, 2), args.len())),
    };
    Ok(numeric_result(result, args))
}

fn builtin_div(args: &[Expression]) -> Result<Expression, Error> {
    let quotient = match args {
        [x] => inverse(numeric("div", x)?),
        [a, b] => match (numeric("div", a)?, numeric("div", b)?) {
            (Numeric::Real(a), Numeric::Real(b)) => Numeric::Real(a / b),
            // Component-wise, so a real divisor never goes through |b|^2
            (a, Numeric::Real(b)) => Numeric::Complex(a.widened() / b),
            (a, b) => Numeric::Complex(a.widened() / b.widened()),
        },
        _ => return Err(Error::arity_error("div", Arity::Range(1, 2), args.len())),
    };
    Ok(quotient.into())
}

fn builtin_sqrt(args: &[Expression]) -> Result<Expression, Error> {
    let result = match numeric("sqrt", &args[0])? {
        Numeric::Real(n) if n >= 0.0 => Complex64::new(n.sqrt(), 0.0),
        Numeric::Real(n) => Complex64::new(0.0, (-n).sqrt()),
        Numeric::Complex(c) => return Ok(Expression::from(c.sqrt())),
    };
    if result.im == 0.0 {
        Ok(Expression::from(result.re))
    } else {
        Ok(Expression::from(result))
    }
}

fn builtin_pow(args: &[Expression]) -> Result<Expression, Error> {
    let base = numeric("pow", &args[0])?;
    let exponent = numeric("pow", &args[1])?;
    let result = match (base, exponent) {
        (Numeric::Real(b), Numeric::Real(e)) => Complex64::new(b.powf(e), 0.0),
        (Numeric::Complex(b), Numeric::Real(e)) => b.powf(e),
        (b, e) => b.widened().powc(e.widened()),
    };
    Ok(numeric_result(result, args))
}

fn builtin_ln(args: &[Expression]) -> Result<Expression, Error> {
    let x = real("ln", &args[0])?;
    if x < 0.0 {
        return Err(Error::argument_error("ln", "invalid argument"));
    }
    Ok(Expression::from(x.ln()))
}

fn builtin_sin(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(real("sin", &args[0])?.sin()))
}

fn builtin_cos(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(real("cos", &args[0])?.cos()))
}

fn builtin_tan(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(real("tan", &args[0])?.tan()))
}

fn builtin_real(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(complex("real", &args[0])?.re))
}

fn builtin_imag(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(complex("imag", &args[0])?.im))
}

fn builtin_mag(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(complex("mag", &args[0])?.norm()))
}

fn builtin_arg(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(complex("arg", &args[0])?.arg()))
}

fn builtin_conj(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::from(complex("conj", &args[0])?.conj()))
}

fn builtin_list(args: &[Expression]) -> Result<Expression, Error> {
    Ok(Expression::list(args.to_vec()))
}

fn builtin_first(args: &[Expression]) -> Result<Expression, Error> {
    match list("first", &args[0])? {
        [first, ..] => Ok(first.clone()),
        [] => Err(Error::argument_error("first", "list is empty")),
    }
}

fn builtin_rest(args: &[Expression]) -> Result<Expression, Error> {
    match list("rest", &args[0])? {
        [_, rest @ ..] => Ok(Expression::list(rest.to_vec())),
        [] => Err(Error::argument_error("rest", "list is empty")),
    }
}

fn builtin_length(args: &[Expression]) -> Result<Expression, Error> {
    let items = list("length", &args[0])?;
    Ok(Expression::from(items.len() as f64))
}

fn builtin_append(args: &[Expression]) -> Result<Expression, Error> {
    let items = list("append", &args[0])
        .map_err(|_| Error::argument_error("append", "first argument is not a list"))?;
    let mut appended = items.to_vec();
    appended.push(args[1].clone());
    Ok(Expression::list(appended))
}

fn builtin_join(args: &[Expression]) -> Result<Expression, Error> {
    let mut joined = list("join", &args[0])?.to_vec();
    joined.extend_from_slice(list("join", &args[1])?);
    Ok(Expression::list(joined))
}

fn builtin_range(args: &[Expression]) -> Result<Expression, Error> {
    let bound = |arg: &Expression| {
        arg.as_number()
            .ok_or_else(|| Error::argument_error("range", "argument is not a number"))
    };
    let (low, high, step) = (bound(&args[0])?, bound(&args[1])?, bound(&args[2])?);

    if low > high {
        return Err(Error::argument_error(
            "range",
            "upperbound is less than lowerbound",
        ));
    }
    if step <= 0.0 {
        return Err(Error::argument_error(
            "range",
            "increment is negative or zero",
        ));
    }

    let values = (0..)
        .map(|i| low + step * f64::from(i))
        .take_while(|value| *value <= high)
        .map(Expression::from)
        .collect();
    Ok(Expression::list(values))
}

/// Procedure returned for names that are not bound to a procedure
static DEFAULT_OP: BuiltinOp = BuiltinOp {
    scheme_id: "",
    name: "default",
    op_kind: OpKind::Function(builtin_default),
    arity: Arity::Any,
};

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn function(
        scheme_id: &'static str,
        name: &'static str,
        arity: Arity,
        func: BuiltinFn,
    ) -> BuiltinOp {
        BuiltinOp {
            scheme_id,
            name,
            op_kind: OpKind::Function(func),
            arity,
        }
    }

    fn special_form(scheme_id: &'static str, arity: Arity, form: SpecialFormFn) -> BuiltinOp {
        BuiltinOp {
            scheme_id,
            name: scheme_id,
            op_kind: OpKind::SpecialForm(form),
            arity,
        }
    }

    use Arity::{AtLeast, Any, Exact, Range};

    vec![
        // Arithmetic operations
        function("+", "add", Any, builtin_add),
        function("-", "sub", Range(1, 2), builtin_sub),
        function("*", "mul", Any, builtin_mul),
        function("/", "div", Range(1, 2), builtin_div),
        function("sqrt", "sqrt", Exact(1), builtin_sqrt),
        function("^", "pow", Exact(2), builtin_pow),
        function("ln", "ln", Exact(1), builtin_ln),
        // Trigonometry
        function("sin", "sin", Exact(1), builtin_sin),
        function("cos", "cos", Exact(1), builtin_cos),
        function("tan", "tan", Exact(1), builtin_tan),
        // Complex components
        function("real", "real", Exact(1), builtin_real),
        function("imag", "imag", Exact(1), builtin_imag),
        function("mag", "mag", Exact(1), builtin_mag),
        function("arg", "arg", Exact(1), builtin_arg),
        function("conj", "conj", Exact(1), builtin_conj),
        // List operations
        function("list", "list", Any, builtin_list),
        function("first", "first", Exact(1), builtin_first),
        function("rest", "rest", Exact(1), builtin_rest),
        function("length", "length", Exact(1), builtin_length),
        function("append", "append", Exact(2), builtin_append),
        function("join", "join", Exact(2), builtin_join),
        function("range", "range", Exact(3), builtin_range),
        // Special forms
        special_form("begin", AtLeast(1), eval_begin),
        special_form("define", Exact(2), eval_define),
        special_form("lambda", Exact(2), eval_lambda),
        special_form("apply", Exact(2), eval_apply),
        special_form("map", Exact(2), eval_map),
        special_form("set-property", Exact(3), eval_set_property),
        special_form("get-property", Exact(2), eval_get_property),
        special_form("discrete-plot", Exact(2), eval_discrete_plot),
        special_form("continuous-plot", Range(2, 3), eval_continuous_plot),
    ]
});

/// Lazy static map from scheme_id to BuiltinOp (private - use find_scheme_op)
static BUILTIN_SCHEME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.scheme_id, op)).collect()
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_scheme_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_SCHEME.get(id).copied()
}

/// Find a special form by its identifier
pub(crate) fn find_special_form(id: &str) -> Option<&'static BuiltinOp> {
    find_scheme_op(id).filter(|op| op.is_special_form())
}

/// The procedure that ignores its arguments and returns the empty expression
pub fn default_procedure() -> &'static BuiltinOp {
    &DEFAULT_OP
}

/// Constants bound in every fresh environment
pub(crate) fn builtin_constants() -> [(&'static str, Expression); 3] {
    [
        ("pi", Expression::from(f64::atan2(0.0, -1.0))),
        ("e", Expression::from(1f64.exp())),
        ("I", Expression::from(Complex64::new(0.0, 1.0))),
    ]
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn num(n: f64) -> Expression {
        Expression::from(n)
    }

    fn cx(re: f64, im: f64) -> Expression {
        Expression::from(Complex64::new(re, im))
    }

    fn text(s: &str) -> Expression {
        Expression::new(Atom::string(s))
    }

    fn success(value: Expression) -> Option<Expression> {
        Some(value)
    }

    /// Invoke a builtin through the public registry, arity validation included
    fn call_builtin(name: &str, args: &[Expression]) -> Result<Expression, Error> {
        find_scheme_op(name).expect("builtin not found").call(args)
    }

    #[test]
    fn test_builtin_ops_registry() {
        let add_op = find_scheme_op("+").unwrap();
        assert_eq!(add_op.name, "add");
        assert_eq!(add_op.arity, Arity::Any);
        assert!(!add_op.is_special_form());

        let define_op = find_scheme_op("define").unwrap();
        assert!(define_op.is_special_form());
        assert_eq!(define_op.arity, Arity::Exact(2));
        assert!(find_special_form("define").is_some());
        assert!(find_special_form("+").is_none());

        assert!(find_scheme_op("unknown").is_none());

        let all_ops = get_builtin_ops();
        assert!(all_ops.iter().any(|op| op.scheme_id == "range"));
        assert!(all_ops.iter().any(|op| op.scheme_id == "continuous-plot"));

        // Identifiers are unique
        assert_eq!(BUILTIN_SCHEME.len(), all_ops.len());

        // Special forms cannot be called with values
        assert!(matches!(
            define_op.call(&[num(1.0), num(2.0)]),
            Err(Error::EvalError(_))
        ));
    }

    #[test]
    fn test_default_procedure() {
        let p1 = default_procedure();
        let p2 = default_procedure();
        assert_eq!(p1, p2);
        assert_eq!(p1.call(&[]).unwrap(), Expression::default());
        assert_eq!(p1.call(&[num(1.0), num(2.0)]).unwrap(), Expression::default());
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Expression, Error>, Option<Expression>);

        let pi = std::f64::consts::PI;
        let one_two_three = Expression::list(vec![num(1.0), num(2.0), num(3.0)]);
        let empty = Expression::list(vec![]);

        let test_cases: Vec<TestCase> = vec![
            // =================================================================
            // ADD
            // =================================================================
            test!("+", &[num(1.0), num(2.0)], success(num(3.0))),
            test!("+", &[], success(num(0.0))),
            test!("+", &[num(1.0), num(2.0), cx(7.0, 4.0)], success(cx(10.0, 4.0))),
            test!(
                "+",
                &[num(1.0), num(2.0), cx(7.0, 4.0), cx(0.0, 1.0)],
                success(cx(10.0, 5.0))
            ),
            // Complex in, complex out even when the imaginary part cancels
            test!("+", &[cx(0.0, 1.0), cx(0.0, -1.0)], success(cx(0.0, 0.0))),
            test!("+", &[num(1.0), text("hi")], None),
            // =================================================================
            // MUL
            // =================================================================
            test!("*", &[num(1.0), num(2.0)], success(num(2.0))),
            test!("*", &[num(1.0), num(2.0), num(5.0)], success(num(10.0))),
            test!(
                "*",
                &[num(1.0), num(2.0), num(5.0), cx(0.0, 1.0)],
                success(cx(0.0, 10.0))
            ),
            test!("*", &[num(2.0), text("hi")], None),
            // =================================================================
            // SUB / NEGATE
            // =================================================================
            test!("-", &[num(1.0)], success(num(-1.0))),
            test!("-", &[num(1.0), num(2.0)], success(num(-1.0))),
            test!("-", &[num(1.0), num(2.0), num(5.0)], None),
            test!("-", &[], None),
            test!("-", &[cx(0.0, 1.0)], success(cx(0.0, -1.0))),
            test!("-", &[cx(0.0, 1.0), cx(3.0, 5.0)], success(cx(-3.0, -4.0))),
            test!("-", &[text("hi")], None),
            test!("-", &[text("hi"), text("hi")], None),
            // =================================================================
            // DIV
            // =================================================================
            test!("/", &[num(10.0), num(5.0)], success(num(2.0))),
            test!("/", &[num(10.0), num(5.0), num(2.0)], None),
            test!("/", &[num(10.0), text("hi")], None),
            test!("/", &[num(10.0), cx(0.0, 2.0)], success(cx(0.0, -5.0))),
            test!("/", &[num(2.0)], success(num(0.5))),
            test!("/", &[cx(2.0, 1.0)], success(cx(0.4, -0.2))),
            test!("/", &[cx(0.0, 0.0)], success(cx(0.0, 0.0))),
            test!("/", &[text("hi")], None),
            // Real operands divide directly, without overflowing through |b|^2
            test!("/", &[num(1e200), num(1e200)], success(num(1.0))),
            test!("/", &[cx(0.0, 1.0), num(2.0)], success(cx(0.0, 0.5))),
            test!("/", &[cx(1e200, 1e200), num(1e200)], success(cx(1.0, 1.0))),
            // =================================================================
            // SQRT / POW / LN
            // =================================================================
            test!("sqrt", &[num(25.0)], success(num(5.0))),
            test!("sqrt", &[num(25.0), num(25.0)], None),
            test!("sqrt", &[text("hi")], None),
            test!("sqrt", &[num(-25.0)], success(cx(0.0, 5.0))),
            test!("sqrt", &[cx(4.0, 0.0)], success(cx(2.0, 0.0))),
            test!("^", &[num(5.0), num(2.0)], success(num(25.0))),
            test!("^", &[num(5.0), num(2.0), num(2.0)], None),
            test!("^", &[num(5.0), text("hi")], None),
            test!("^", &[cx(0.0, 1.0), cx(2.0, 0.0)], success(cx(-1.0, 0.0))),
            test!("ln", &[num(1f64.exp())], success(num(1.0))),
            test!("ln", &[num(1.0), num(1.0)], None),
            test!("ln", &[num(-1.0)], None),
            test!("ln", &[text("hi")], None),
            // =================================================================
            // TRIGONOMETRY
            // =================================================================
            test!("sin", &[num(pi)], success(num(0.0))),
            test!("sin", &[num(pi), num(pi)], None),
            test!("sin", &[text("hi")], None),
            test!("sin", &[cx(0.0, 1.0)], None),
            test!("cos", &[num(pi)], success(num(-1.0))),
            test!("cos", &[num(pi), num(pi)], None),
            test!("cos", &[text("hi")], None),
            test!("tan", &[num(pi)], success(num(0.0))),
            test!("tan", &[num(pi), num(pi)], None),
            test!("tan", &[text("hi")], None),
            // =================================================================
            // COMPLEX COMPONENTS
            // =================================================================
            test!("real", &[cx(4.0, 5.0)], success(num(4.0))),
            test!("real", &[num(4.0)], None),
            test!("real", &[cx(4.0, 5.0), cx(4.0, 5.0)], None),
            test!("imag", &[cx(4.0, 5.0)], success(num(5.0))),
            test!("imag", &[text("hi")], None),
            test!("mag", &[cx(3.0, 4.0)], success(num(5.0))),
            test!("mag", &[num(3.0)], None),
            test!("arg", &[cx(0.0, 1.0)], success(num(pi / 2.0))),
            test!("arg", &[], None),
            test!("conj", &[cx(4.0, 5.0)], success(cx(4.0, -5.0))),
            test!("conj", &[num(4.0)], None),
            // =================================================================
            // LISTS
            // =================================================================
            test!("list", &[], success(Expression::list(vec![]))),
            test!(
                "list",
                &[num(1.0), num(2.0), num(3.0)],
                success(one_two_three.clone())
            ),
            test!("first", &[one_two_three.clone()], success(num(1.0))),
            test!("first", &[empty.clone()], None),
            test!("first", &[num(1.0)], None),
            test!("first", &[one_two_three.clone(), one_two_three.clone()], None),
            test!(
                "rest",
                &[one_two_three.clone()],
                success(Expression::list(vec![num(2.0), num(3.0)]))
            ),
            test!("rest", &[empty.clone()], None),
            test!("rest", &[num(1.0)], None),
            test!("length", &[one_two_three.clone()], success(num(3.0))),
            test!("length", &[empty.clone()], success(num(0.0))),
            test!("length", &[num(1.0)], None),
            test!(
                "append",
                &[one_two_three.clone(), num(4.0)],
                success(Expression::list(vec![num(1.0), num(2.0), num(3.0), num(4.0)]))
            ),
            test!(
                "append",
                &[empty.clone(), one_two_three.clone()],
                success(Expression::list(vec![one_two_three.clone()]))
            ),
            test!("append", &[num(1.0), num(2.0)], None),
            test!("append", &[one_two_three.clone()], None),
            test!(
                "join",
                &[one_two_three.clone(), Expression::list(vec![num(4.0)])],
                success(Expression::list(vec![num(1.0), num(2.0), num(3.0), num(4.0)]))
            ),
            test!("join", &[one_two_three.clone(), num(4.0)], None),
            test!("join", &[one_two_three.clone()], None),
            test!(
                "range",
                &[num(0.0), num(5.0), num(1.0)],
                success(Expression::list((0..=5).map(|i| num(f64::from(i))).collect()))
            ),
            test!(
                "range",
                &[num(-1.0), num(1.0), num(0.5)],
                success(Expression::list(vec![
                    num(-1.0),
                    num(-0.5),
                    num(0.0),
                    num(0.5),
                    num(1.0)
                ]))
            ),
            test!("range", &[num(3.0), num(3.0), num(1.0)], success(Expression::list(vec![num(3.0)]))),
            test!("range", &[num(3.0), num(-1.0), num(1.0)], None),
            test!("range", &[num(0.0), num(5.0), num(-1.0)], None),
            test!("range", &[num(0.0), num(5.0), num(0.0)], None),
            test!("range", &[num(0.0), text("hi"), num(1.0)], None),
            test!("range", &[num(0.0), num(5.0)], None),
        ];

        for (name, actual, expected) in test_cases {
            match (&actual, &expected) {
                (Ok(actual_val), Some(expected_val)) => {
                    assert_eq!(actual_val, expected_val, "Failed for builtin '{name}'");
                }
                (Err(_), None) => {}
                _ => panic!(
                    "Result mismatch for builtin '{name}'. Expected: {expected:?}, Got: {actual:?}"
                ),
            }
        }
    }

    #[test]
    fn test_division_by_zero() {
        // Infinities never compare equal, so these are checked by value
        let quotient = |args: &[Expression]| call_builtin("/", args).unwrap().as_number();

        assert_eq!(quotient(&[num(1.0), num(0.0)]), Some(f64::INFINITY));
        assert_eq!(quotient(&[num(-1.0), num(0.0)]), Some(f64::NEG_INFINITY));
        assert_eq!(quotient(&[num(0.0)]), Some(f64::INFINITY));
        assert!(quotient(&[num(0.0), num(0.0)]).unwrap().is_nan());

        let Atom::Complex(c) = *call_builtin("/", &[cx(1.0, 0.0), num(0.0)]).unwrap().head()
        else {
            panic!("complex dividend must give a complex quotient");
        };
        assert_eq!(c.re, f64::INFINITY);
        assert!(c.im.is_nan());
    }

    #[test]
    fn test_error_message_construction() {
        type ErrorTest = (&'static str, Vec<Expression>, &'static str);
        let test_cases: Vec<ErrorTest> = vec![
            ("+", vec![text("a")], "Error in call to add: invalid argument."),
            (
                "-",
                vec![num(1.0), num(1.0), num(2.0)],
                "Error in call to sub: invalid number of arguments.",
            ),
            (
                "first",
                vec![Expression::list(vec![])],
                "Error in call to first: list is empty.",
            ),
            (
                "append",
                vec![num(1.0), num(2.0)],
                "Error in call to append: first argument is not a list.",
            ),
            (
                "range",
                vec![num(0.0), num(5.0), num(0.0)],
                "Error in call to range: increment is negative or zero.",
            ),
        ];

        for (name, args, expected_msg) in test_cases {
            let err = call_builtin(name, &args).unwrap_err();
            assert_eq!(err.to_string(), expected_msg, "Failed for builtin '{name}'");
        }
    }

    #[test]
    fn test_arity_validation() {
        use Arity::*;

        Exact(2).validate("f", 2).unwrap();
        Exact(2).validate("f", 1).unwrap_err();
        Exact(2).validate("f", 3).unwrap_err();

        AtLeast(1).validate("f", 1).unwrap();
        AtLeast(1).validate("f", 2).unwrap();
        AtLeast(1).validate("f", 0).unwrap_err();

        Range(1, 3).validate("f", 1).unwrap();
        Range(1, 3).validate("f", 3).unwrap();
        Range(1, 3).validate("f", 0).unwrap_err();
        Range(1, 3).validate("f", 4).unwrap_err();

        Any.validate("f", 0).unwrap();
        Any.validate("f", 100).unwrap();

        match Exact(2).validate("f", 1).unwrap_err() {
            Error::ArityError {
                procedure,
                expected,
                got,
            } => {
                assert_eq!(procedure, "f");
                assert_eq!(expected, Exact(2));
                assert_eq!(got, 1);
            }
            other => panic!("Expected ArityError, got {other:?}"),
        }
    }

    #[test]
    fn test_builtin_constants() {
        let constants = builtin_constants();
        assert_eq!(constants[0].1, num(std::f64::consts::PI));
        assert_eq!(constants[1].1, num(std::f64::consts::E));
        assert_eq!(constants[2].1, cx(0.0, 1.0));
    }
}
