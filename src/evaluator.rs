use crate::atom::Atom;
use crate::builtinops::{Arity, BuiltinOp, OpKind, find_special_form};
use crate::environment::Environment;
use crate::expression::Expression;
use crate::{Error, MAX_EVAL_DEPTH};

pub mod plot;

/// Evaluate an expression (public API)
pub fn eval(expr: &Expression, env: &mut Environment<'_>) -> Result<Expression, Error> {
    eval_with_depth_tracking(expr, env, 0)
}

/// Evaluate an expression with depth tracking to prevent stack overflow
///
/// Dispatch order: terminal lookup, then special forms by head symbol, then
/// procedure application.
pub(crate) fn eval_with_depth_tracking(
    expr: &Expression,
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    if env.interrupt().is_raised() {
        return Err(Error::Interrupted);
    }
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        )));
    }

    let args = expr.tail();

    // `(list)` is the one empty form that is an application
    let is_list_call = matches!(expr.head(), Atom::Symbol(name) if name == "list");
    if args.is_empty() && !is_list_call {
        return eval_terminal(expr.head(), env);
    }

    if let Atom::Symbol(name) = expr.head()
        && let Some(op) = find_special_form(name)
        && let OpKind::SpecialForm(special_form) = op.op_kind
    {
        log::trace!("special form {name} with {} arguments", args.len());
        op.validate_arity(args.len())?;
        return special_form(args, env, depth);
    }

    eval_application(expr, env, depth)
}

/// Evaluate a childless node: symbols are looked up, literals evaluate to themselves
fn eval_terminal(head: &Atom, env: &Environment<'_>) -> Result<Expression, Error> {
    match head {
        Atom::Symbol(name) if env.is_exp(head) => {
            log::trace!("lookup {name}");
            Ok(env.get_exp(head))
        }
        Atom::Symbol(name) => Err(Error::UnboundSymbol(name.clone())),
        Atom::Number(_) | Atom::Complex(_) | Atom::String(_) => Ok(Expression::new(head.clone())),
        other => Err(Error::EvalError(format!(
            "invalid type in terminal expression: {other}"
        ))),
    }
}

/// Helper function to evaluate a list of argument expressions with depth tracking
fn eval_args(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Vec<Expression>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth + 1))
        .collect()
}

/// Evaluate the children, then call the lambda or built-in procedure named by the head
fn eval_application(
    expr: &Expression,
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let args = eval_args(expr.tail(), env, depth)?;

    let head = expr.head();
    let Atom::Symbol(name) = head else {
        return Err(Error::EvalError(format!(
            "head of a compound expression is not a procedure: {head}"
        )));
    };

    if env.is_proc(head) {
        return env.get_proc(head).call(&args);
    }

    let value = env.get_exp(head);
    if value.is_lambda() {
        return call_lambda(&value, &args, env, depth);
    }

    Err(Error::EvalError(format!(
        "symbol {name} does not name a procedure"
    )))
}

/// Bind `args` to the lambda's parameters in a child scope of `env` and evaluate its body
fn call_lambda(
    lambda: &Expression,
    args: &[Expression],
    env: &Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let (Some(params), Some(body)) = (lambda.child(0), lambda.child(1)) else {
        return Err(Error::EvalError("malformed lambda value".to_owned()));
    };

    let params = params.tail();
    Arity::Exact(params.len()).validate("lambda", args.len())?;

    log::trace!("lambda call with {} arguments", args.len());
    let mut scope = env.child();
    for (param, arg) in params.iter().zip(args) {
        scope.add_exp(param.head(), arg.clone())?;
    }
    eval_with_depth_tracking(body, &mut scope, depth + 1)
}

/// A procedure named by the first argument of `apply` or `map`
enum Procedure {
    Builtin(&'static BuiltinOp),
    Lambda(Expression),
}

impl Procedure {
    /// Resolve a bare procedure symbol, a lambda-valued symbol or an inline `lambda` form
    fn resolve(
        form: &str,
        expr: &Expression,
        env: &mut Environment<'_>,
        depth: usize,
    ) -> Result<Self, Error> {
        let head = expr.head();
        let is_inline_lambda = matches!(head, Atom::Symbol(name) if name == "lambda");

        if is_inline_lambda && !expr.tail().is_empty() {
            let lambda = eval_with_depth_tracking(expr, env, depth + 1)?;
            return Ok(Procedure::Lambda(lambda));
        }

        if expr.tail().is_empty() {
            if env.is_proc(head) {
                return Ok(Procedure::Builtin(env.get_proc(head)));
            }
            let value = env.get_exp(head);
            if value.is_lambda() {
                return Ok(Procedure::Lambda(value));
            }
        }

        Err(Error::EvalError(format!(
            "first argument to {form} not a procedure"
        )))
    }

    fn invoke(
        &self,
        args: &[Expression],
        env: &Environment<'_>,
        depth: usize,
    ) -> Result<Expression, Error> {
        match self {
            Procedure::Builtin(op) => op.call(args),
            Procedure::Lambda(lambda) => call_lambda(lambda, args, env, depth),
        }
    }
}

/// Evaluate the list argument of `apply` or `map`
fn eval_list_argument(
    form: &str,
    expr: &Expression,
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let list = eval_with_depth_tracking(expr, env, depth + 1)?;
    if list.is_list() {
        Ok(list)
    } else {
        Err(Error::EvalError(format!(
            "second argument to {form} not a list"
        )))
    }
}

/// Name of a binding form's target, if it is a bare symbol
fn bare_symbol(expr: &Expression) -> Option<&str> {
    match expr.head() {
        Atom::Symbol(name) if expr.tail().is_empty() => Some(name),
        _ => None,
    }
}

/// Reject names of special forms and built-in procedures as binding targets
fn check_bindable(form: &str, name: &str, env: &Environment<'_>) -> Result<(), Error> {
    if find_special_form(name).is_some() {
        return Err(Error::EvalError(format!(
            "attempt to redefine special-form {name} in {form}"
        )));
    }
    if env.is_proc(&Atom::Symbol(name.to_owned())) {
        return Err(Error::EvalError(format!(
            "attempt to redefine built-in procedure {name} in {form}"
        )));
    }
    Ok(())
}

/// Evaluate begin special form
pub(crate) fn eval_begin(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let mut result = Expression::default();
    for arg in args {
        result = eval_with_depth_tracking(arg, env, depth + 1)?;
    }
    Ok(result)
}

/// Evaluate define special form
pub(crate) fn eval_define(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let [target, value_expr] = args else {
        return Err(Error::arity_error("define", Arity::Exact(2), args.len()));
    };
    let Some(name) = bare_symbol(target) else {
        return Err(Error::EvalError(
            "first argument to define not symbol".to_owned(),
        ));
    };
    check_bindable("define", name, env)?;

    let value = eval_with_depth_tracking(value_expr, env, depth + 1)?;
    env.add_exp(target.head(), value.clone())?;
    Ok(value)
}

/// Evaluate lambda special form
///
/// The parameter form `(x y z)` parses with `x` as its head and `y z` as its tail; all
/// of them become parameters. The body is kept unevaluated.
pub(crate) fn eval_lambda(
    args: &[Expression],
    env: &mut Environment<'_>,
    _depth: usize,
) -> Result<Expression, Error> {
    let [param_form, body] = args else {
        return Err(Error::arity_error("lambda", Arity::Exact(2), args.len()));
    };

    let candidates = std::iter::once(Expression::new(param_form.head().clone()))
        .chain(param_form.tail().iter().cloned());

    let mut params: Vec<Expression> = Vec::new();
    for param in candidates {
        let Some(name) = bare_symbol(&param) else {
            return Err(Error::EvalError(
                "Lambda parameters must be symbols".to_owned(),
            ));
        };
        check_bindable("lambda", name, env)?;
        if params.contains(&param) {
            return Err(Error::EvalError(format!(
                "Duplicate parameter name: {name}"
            )));
        }
        params.push(param);
    }

    Ok(Expression::lambda(Expression::list(params), body.clone()))
}

/// Evaluate apply special form
pub(crate) fn eval_apply(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let [proc_expr, list_expr] = args else {
        return Err(Error::arity_error("apply", Arity::Exact(2), args.len()));
    };
    let procedure = Procedure::resolve("apply", proc_expr, env, depth)?;
    let list = eval_list_argument("apply", list_expr, env, depth)?;
    procedure.invoke(list.tail(), env, depth)
}

/// Evaluate map special form
pub(crate) fn eval_map(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let [proc_expr, list_expr] = args else {
        return Err(Error::arity_error("map", Arity::Exact(2), args.len()));
    };
    let procedure = Procedure::resolve("map", proc_expr, env, depth)?;
    let list = eval_list_argument("map", list_expr, env, depth)?;

    let results = list
        .into_tail()
        .into_iter()
        .map(|item| procedure.invoke(std::slice::from_ref(&item), env, depth))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expression::list(results))
}

/// Key of a property form: a string literal, unquoted
fn property_key<'a>(form: &str, key: &'a Expression) -> Result<&'a str, Error> {
    match key.head() {
        Atom::String(_) if key.tail().is_empty() => Ok(key.head().string_content()),
        _ => Err(Error::EvalError(format!(
            "first argument to {form} not a string"
        ))),
    }
}

/// Evaluate set-property special form
pub(crate) fn eval_set_property(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let [key, value_expr, target_expr] = args else {
        return Err(Error::arity_error("set-property", Arity::Exact(3), args.len()));
    };
    let key = property_key("set-property", key)?;
    let value = eval_with_depth_tracking(value_expr, env, depth + 1)?;
    let target = eval_with_depth_tracking(target_expr, env, depth + 1)?;
    Ok(target.with_property(key, value))
}

/// Evaluate get-property special form
pub(crate) fn eval_get_property(
    args: &[Expression],
    env: &mut Environment<'_>,
    depth: usize,
) -> Result<Expression, Error> {
    let [key, target_expr] = args else {
        return Err(Error::arity_error("get-property", Arity::Exact(2), args.len()));
    };
    let key = property_key("get-property", key)?;
    let target = eval_with_depth_tracking(target_expr, env, depth + 1)?;
    Ok(target.property(key).cloned().unwrap_or_default())
}
