//! Symbol tables for evaluation.
//!
//! The root environment holds the constants and built-in procedures plus every top-level
//! definition. A lambda call evaluates its body in a child scope that binds only the
//! parameters and reads through to the caller's scope, so definitions made inside the
//! body disappear when the call returns.

use crate::Error;
use crate::atom::Atom;
use crate::builtinops::{BuiltinOp, OpKind, builtin_constants, default_procedure, get_builtin_ops};
use crate::expression::Expression;
use crate::interrupt::Interrupt;
use std::collections::HashMap;

/// What a symbol is bound to
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Expression),
    Procedure(&'static BuiltinOp),
}

/// One scope of bindings, optionally chained to the scope it was called from
#[derive(Debug, Clone)]
pub struct Environment<'p> {
    bindings: HashMap<String, Binding>,
    parent: Option<&'p Environment<'p>>,
    interrupt: Interrupt,
}

impl Default for Environment<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment<'_> {
    /// Root environment holding the default constants and procedures
    pub fn new() -> Self {
        Self::with_interrupt(Interrupt::new())
    }

    /// Root environment observing an existing cancellation token
    pub fn with_interrupt(interrupt: Interrupt) -> Self {
        let mut env = Environment {
            bindings: HashMap::new(),
            parent: None,
            interrupt,
        };
        env.install_defaults();
        env
    }

    /// Empty scope reading through to `self`, sharing its cancellation token
    pub fn child(&self) -> Environment<'_> {
        Environment {
            bindings: HashMap::new(),
            parent: Some(self),
            interrupt: self.interrupt.clone(),
        }
    }

    fn install_defaults(&mut self) {
        for (name, value) in builtin_constants() {
            self.bindings.insert(name.to_owned(), Binding::Value(value));
        }
        for op in get_builtin_ops() {
            if let OpKind::Function(_) = op.op_kind {
                self.bindings
                    .insert(op.scheme_id.to_owned(), Binding::Procedure(op));
            }
        }
    }

    /// Find the binding for `name`, searching outwards through parent scopes
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        match self.bindings.get(name) {
            Some(binding) => Some(binding),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }

    fn lookup_symbol(&self, sym: &Atom) -> Option<&Binding> {
        match sym {
            Atom::Symbol(name) => self.lookup(name),
            _ => None,
        }
    }

    pub fn is_known(&self, sym: &Atom) -> bool {
        self.lookup_symbol(sym).is_some()
    }

    /// True if `sym` is bound to a value
    pub fn is_exp(&self, sym: &Atom) -> bool {
        matches!(self.lookup_symbol(sym), Some(Binding::Value(_)))
    }

    /// True if `sym` is bound to a built-in procedure
    pub fn is_proc(&self, sym: &Atom) -> bool {
        matches!(self.lookup_symbol(sym), Some(Binding::Procedure(_)))
    }

    /// The value bound to `sym`, or the empty expression
    pub fn get_exp(&self, sym: &Atom) -> Expression {
        match self.lookup_symbol(sym) {
            Some(Binding::Value(expr)) => expr.clone(),
            _ => Expression::default(),
        }
    }

    /// The procedure bound to `sym`, or the no-op default procedure
    pub fn get_proc(&self, sym: &Atom) -> &'static BuiltinOp {
        match self.lookup_symbol(sym) {
            Some(Binding::Procedure(op)) => op,
            _ => default_procedure(),
        }
    }

    /// Bind `sym` to `expr` in this scope, replacing any previous binding here
    pub fn add_exp(&mut self, sym: &Atom, expr: Expression) -> Result<(), Error> {
        let Atom::Symbol(name) = sym else {
            return Err(Error::EvalError(
                "Attempt to add non-symbol to environment".to_owned(),
            ));
        };
        self.bindings.insert(name.clone(), Binding::Value(expr));
        Ok(())
    }

    /// Remove a value binding of `sym` from this scope, if there is one
    pub fn delete_exp(&mut self, sym: &Atom) -> Result<(), Error> {
        let Atom::Symbol(name) = sym else {
            return Err(Error::EvalError(
                "Attempt to delete non-symbol from environment".to_owned(),
            ));
        };
        if let Some(Binding::Value(_)) = self.bindings.get(name) {
            self.bindings.remove(name);
        }
        Ok(())
    }

    /// Drop every binding of this scope and reinstall the defaults
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.install_defaults();
    }

    /// The cancellation token evaluation in this environment observes
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Observe `interrupt` from now on
    pub fn set_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupt = interrupt;
    }

    /// Every visible binding, sorted by name; inner scopes shadow outer ones
    pub fn get_all_bindings(&self) -> Vec<(String, Binding)> {
        let mut visible: HashMap<&str, &Binding> = HashMap::new();
        let mut scope = Some(self);
        while let Some(env) = scope {
            for (name, binding) in &env.bindings {
                visible.entry(name.as_str()).or_insert(binding);
            }
            scope = env.parent;
        }

        let mut bindings: Vec<(String, Binding)> = visible
            .into_iter()
            .map(|(name, binding)| (name.to_owned(), binding.clone()))
            .collect();
        bindings.sort_by(|(a, _), (b, _)| a.cmp(b));
        bindings
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn sym(name: &str) -> Atom {
        Atom::Symbol(name.to_owned())
    }

    #[test]
    fn test_default_bindings() {
        let env = Environment::new();

        for name in ["pi", "e", "I"] {
            assert!(env.is_known(&sym(name)), "{name} should be known");
            assert!(env.is_exp(&sym(name)), "{name} should be a value");
        }
        for op in get_builtin_ops() {
            let name = sym(op.scheme_id);
            if op.is_special_form() {
                assert!(!env.is_known(&name), "{} is not bound", op.scheme_id);
            } else {
                assert!(env.is_proc(&name), "{} should be a procedure", op.scheme_id);
                assert!(!env.is_exp(&name));
            }
        }

        // Non-symbol atoms are never bound
        assert!(!env.is_known(&Atom::Number(1.0)));
        assert!(!env.is_exp(&Atom::string("pi")));
        assert!(!env.is_proc(&Atom::None));
    }

    #[test]
    fn test_get_exp_and_get_proc_fallbacks() {
        let env = Environment::new();

        assert_eq!(env.get_exp(&sym("pi")), Expression::from(std::f64::consts::PI));
        assert!(env.get_exp(&sym("missing")).is_none());
        assert!(env.get_exp(&sym("+")).is_none());

        assert_eq!(env.get_proc(&sym("+")).scheme_id, "+");
        assert_eq!(env.get_proc(&sym("pi")), default_procedure());
        assert_eq!(env.get_proc(&Atom::Number(1.0)), default_procedure());
        assert!(env.get_proc(&sym("missing")).call(&[]).unwrap().is_none());
    }

    #[test]
    fn test_add_and_delete() {
        let mut env = Environment::new();

        env.add_exp(&sym("a"), Expression::from(1.0)).unwrap();
        assert_eq!(env.get_exp(&sym("a")), Expression::from(1.0));

        // Rebinding replaces
        env.add_exp(&sym("a"), Expression::from(2.0)).unwrap();
        assert_eq!(env.get_exp(&sym("a")), Expression::from(2.0));

        env.delete_exp(&sym("a")).unwrap();
        assert!(!env.is_known(&sym("a")));
        env.delete_exp(&sym("a")).unwrap();

        // Procedures are not removed by delete_exp
        env.delete_exp(&sym("+")).unwrap();
        assert!(env.is_proc(&sym("+")));

        assert!(matches!(
            env.add_exp(&Atom::Number(1.0), Expression::from(1.0)),
            Err(Error::EvalError(_))
        ));
        assert!(env.delete_exp(&Atom::string("a")).is_err());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut env = Environment::new();
        env.add_exp(&sym("a"), Expression::from(1.0)).unwrap();
        env.add_exp(&sym("pi"), Expression::from(3.0)).unwrap();

        env.reset();

        assert!(!env.is_known(&sym("a")));
        assert_eq!(env.get_exp(&sym("pi")), Expression::from(std::f64::consts::PI));
        assert!(env.is_proc(&sym("range")));
    }

    #[test]
    fn test_child_scope() {
        let mut root = Environment::new();
        root.add_exp(&sym("a"), Expression::from(1.0)).unwrap();
        root.interrupt().raise();

        {
            let mut child = root.child();
            assert_eq!(child.get_exp(&sym("a")), Expression::from(1.0));
            assert!(child.is_proc(&sym("+")));
            assert!(child.interrupt().is_raised());

            child.add_exp(&sym("a"), Expression::from(5.0)).unwrap();
            child.add_exp(&sym("b"), Expression::from(2.0)).unwrap();
            assert_eq!(child.get_exp(&sym("a")), Expression::from(5.0));

            let names: Vec<String> = child
                .get_all_bindings()
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            assert!(names.contains(&"b".to_owned()));
            assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
        }

        // Child definitions do not leak
        assert_eq!(root.get_exp(&sym("a")), Expression::from(1.0));
        assert!(!root.is_known(&sym("b")));
    }

    #[test]
    fn test_clone_is_independent_snapshot() {
        let mut env = Environment::new();
        env.add_exp(&sym("a"), Expression::from(1.0)).unwrap();
        let snapshot = env.clone();

        env.add_exp(&sym("b"), Expression::from(2.0)).unwrap();
        env.delete_exp(&sym("a")).unwrap();

        assert!(snapshot.is_known(&sym("a")));
        assert!(!snapshot.is_known(&sym("b")));
        assert!(snapshot.interrupt().same_token(env.interrupt()));
    }
}
