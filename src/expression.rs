//! The expression tree: the language's AST and its runtime value representation.
//!
//! Every node is a head [`Atom`] plus an ordered tail of child expressions. Lists are
//! nodes whose head is [`Atom::List`]; lambdas are nodes whose head is [`Atom::Lambda`]
//! with the parameter list and body as their two children. Each node also carries a map
//! of named properties that is ignored by equality and used only by the display layer.

use crate::atom::Atom;
use num::complex::Complex64;
use std::collections::BTreeMap;
use std::fmt;

/// Property naming the render primitive a node represents
pub const OBJECT_NAME: &str = "object-name";

/// A node of the expression tree
#[derive(Debug, Clone, Default)]
pub struct Expression {
    head: Atom,
    tail: Vec<Expression>,
    properties: BTreeMap<String, Expression>,
}

impl Expression {
    /// Create a leaf expression
    pub fn new(head: Atom) -> Self {
        Expression {
            head,
            tail: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Create an expression with the given head and children
    pub fn with_tail(head: Atom, tail: Vec<Expression>) -> Self {
        Expression {
            head,
            tail,
            properties: BTreeMap::new(),
        }
    }

    /// Create a list value
    pub fn list(items: Vec<Expression>) -> Self {
        Self::with_tail(Atom::List, items)
    }

    /// Create a lambda value from its parameter list and (unevaluated) body
    pub fn lambda(params: Expression, body: Expression) -> Self {
        Self::with_tail(Atom::Lambda, vec![params, body])
    }

    /// Create a two-element list of numbers
    pub fn point(x: f64, y: f64) -> Self {
        Self::list(vec![Expression::from(x), Expression::from(y)])
    }

    /// Create an error value carrying `message`
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Atom::error(message))
    }

    pub fn head(&self) -> &Atom {
        &self.head
    }

    pub fn tail(&self) -> &[Expression] {
        &self.tail
    }

    pub fn into_tail(self) -> Vec<Expression> {
        self.tail
    }

    pub fn push(&mut self, child: Expression) {
        self.tail.push(child);
    }

    /// The `index`-th child, if present
    pub fn child(&self, index: usize) -> Option<&Expression> {
        self.tail.get(index)
    }

    pub fn is_none(&self) -> bool {
        self.head.is_none() && self.tail.is_empty()
    }

    pub fn is_list(&self) -> bool {
        self.head.is_list()
    }

    pub fn is_lambda(&self) -> bool {
        self.head.is_lambda()
    }

    /// True for a leaf number
    pub fn is_number(&self) -> bool {
        self.head.is_number() && self.tail.is_empty()
    }

    /// True if the head is a string, whatever the children
    pub fn is_string(&self) -> bool {
        self.head.is_string()
    }

    /// Number held by a leaf, if this is one
    pub fn as_number(&self) -> Option<f64> {
        match self.head {
            Atom::Number(n) if self.tail.is_empty() => Some(n),
            _ => None,
        }
    }

    /// True for a list of exactly two numbers
    pub fn is_coordinate(&self) -> bool {
        self.is_list() && self.tail.len() == 2 && self.tail.iter().all(Expression::is_number)
    }

    /// The `(x, y)` pair of a two-number list
    pub fn as_coordinate(&self) -> Option<(f64, f64)> {
        match (self.is_list(), self.tail.as_slice()) {
            (true, [x, y]) => Some((x.as_number()?, y.as_number()?)),
            _ => None,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Expression> {
        self.properties.get(key)
    }

    /// Attach `value` under `key`, replacing any previous entry
    pub fn set_property(&mut self, key: impl Into<String>, value: Expression) {
        self.properties.insert(key.into(), value);
    }

    /// Builder form of [`Expression::set_property`]
    pub fn with_property(mut self, key: impl Into<String>, value: Expression) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The unquoted `object-name` property, if the node is tagged as a render primitive
    pub fn object_name(&self) -> Option<&str> {
        self.property(OBJECT_NAME)
            .filter(|name| name.is_string())
            .map(|name| name.head.string_content())
    }
}

impl From<Atom> for Expression {
    fn from(head: Atom) -> Self {
        Expression::new(head)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::new(Atom::Number(value))
    }
}

impl From<Complex64> for Expression {
    fn from(value: Complex64) -> Self {
        Expression::new(Atom::Complex(value))
    }
}

impl From<Vec<Expression>> for Expression {
    fn from(items: Vec<Expression>) -> Self {
        Expression::list(items)
    }
}

/// Structural equality on head and children; properties are not compared.
impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.tail == other.tail
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parenthesized = !matches!(self.head, Atom::Complex(_) | Atom::None | Atom::Error(_));
        if parenthesized {
            write!(f, "(")?;
        }

        match &self.head {
            Atom::List | Atom::Lambda => {}
            Atom::None => write!(f, "NONE")?,
            head => {
                write!(f, "{head}")?;
                if !self.tail.is_empty() {
                    write!(f, " ")?;
                }
            }
        }

        for (i, child) in self.tail.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{child}")?;
        }

        if parenthesized {
            write!(f, ")")?;
        }
        Ok(())
    }
}
