//! Arithmetic expression trees: the bundled program space.
//!
//! Programs are rooted trees over the operators `+ - * neg`, numbered
//! input variables `$1..$n` and numeric literals. The module provides
//! the tree type itself plus the pieces the engine consumes through its
//! capability contracts:
//!
//! - reduction (constant folding and identity elimination) and a
//!   node-count complexity measure
//! - a knob representation perturbing literals and rotating variables
//!   (`repr`)
//! - regression scorers over a numeric dataset (`scoring`)

mod repr;
mod scoring;

pub use repr::ExprRepr;
pub use scoring::{Dataset, RegressionBscorer, RegressionScorer};

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::schema::OperatorSet;
use crate::search::ProgramSpace;

/// An arithmetic expression over numbered input variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// Input variable, zero-indexed internally, printed as `$1`, `$2`, ...
    Var(usize),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        use Expr::*;
        match (self, other) {
            (Num(a), Num(b)) => a.to_bits() == b.to_bits(),
            (Var(a), Var(b)) => a == b,
            (Add(a1, a2), Add(b1, b2))
            | (Sub(a1, a2), Sub(b1, b2))
            | (Mul(a1, a2), Mul(b1, b2)) => a1 == b1 && a2 == b2,
            (Neg(a), Neg(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Expr::Num(v) => v.to_bits().hash(state),
            Expr::Var(i) => i.hash(state),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => {
                a.hash(state);
                b.hash(state);
            }
            Expr::Neg(a) => a.hash(state),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{v}"),
            Expr::Var(i) => write!(f, "${}", i + 1),
            Expr::Add(a, b) => write!(f, "+({a} {b})"),
            Expr::Sub(a, b) => write!(f, "-({a} {b})"),
            Expr::Mul(a, b) => write!(f, "*({a} {b})"),
            Expr::Neg(a) => write!(f, "neg({a})"),
        }
    }
}

impl Expr {
    /// Evaluate against one input row. Missing inputs read as zero.
    pub fn eval(&self, inputs: &[f64]) -> f64 {
        match self {
            Expr::Num(v) => *v,
            Expr::Var(i) => inputs.get(*i).copied().unwrap_or(0.0),
            Expr::Add(a, b) => a.eval(inputs) + b.eval(inputs),
            Expr::Sub(a, b) => a.eval(inputs) - b.eval(inputs),
            Expr::Mul(a, b) => a.eval(inputs) * b.eval(inputs),
            Expr::Neg(a) => -a.eval(inputs),
        }
    }

    /// Number of vertices.
    pub fn size(&self) -> u64 {
        match self {
            Expr::Num(_) | Expr::Var(_) => 1,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => {
                1 + a.size() + b.size()
            }
            Expr::Neg(a) => 1 + a.size(),
        }
    }

    /// Complexity: vertex count discounting numeric literals.
    pub fn complexity(&self) -> u64 {
        match self {
            Expr::Num(_) => 0,
            Expr::Var(_) => 1,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => {
                1 + a.complexity() + b.complexity()
            }
            Expr::Neg(a) => 1 + a.complexity(),
        }
    }

    /// Simplify: fold constants, drop additive and multiplicative
    /// identities, cancel double negation and self-subtraction.
    pub fn reduce(&self) -> Expr {
        match self {
            Expr::Add(a, b) => {
                let (a, b) = (a.reduce(), b.reduce());
                match (&a, &b) {
                    (Expr::Num(x), Expr::Num(y)) => Expr::Num(x + y),
                    (Expr::Num(z), other) | (other, Expr::Num(z))
                        if *z == 0.0 =>
                    {
                        other.clone()
                    }
                    _ => Expr::Add(Box::new(a), Box::new(b)),
                }
            }
            Expr::Sub(a, b) => {
                let (a, b) = (a.reduce(), b.reduce());
                match (&a, &b) {
                    (Expr::Num(x), Expr::Num(y)) => Expr::Num(x - y),
                    (_, Expr::Num(z)) if *z == 0.0 => a.clone(),
                    _ if a == b => Expr::Num(0.0),
                    _ => Expr::Sub(Box::new(a), Box::new(b)),
                }
            }
            Expr::Mul(a, b) => {
                let (a, b) = (a.reduce(), b.reduce());
                match (&a, &b) {
                    (Expr::Num(x), Expr::Num(y)) => Expr::Num(x * y),
                    (Expr::Num(z), other) | (other, Expr::Num(z))
                        if *z == 1.0 =>
                    {
                        other.clone()
                    }
                    (Expr::Num(z), _) | (_, Expr::Num(z)) if *z == 0.0 => {
                        Expr::Num(0.0)
                    }
                    _ => Expr::Mul(Box::new(a), Box::new(b)),
                }
            }
            Expr::Neg(a) => {
                let a = a.reduce();
                match a {
                    Expr::Num(v) => Expr::Num(-v),
                    Expr::Neg(inner) => *inner,
                    _ => Expr::Neg(Box::new(a)),
                }
            }
            leaf => leaf.clone(),
        }
    }
}

/// Program space over arithmetic expressions with a fixed input arity.
#[derive(Debug, Clone)]
pub struct ExprSpace {
    arity: usize,
}

impl ExprSpace {
    pub fn new(arity: usize) -> Self {
        Self { arity }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl ProgramSpace for ExprSpace {
    type Program = Expr;
    type Repr = ExprRepr;

    fn reduce(&self, program: &Expr) -> Expr {
        program.reduce()
    }

    fn complexity(&self, program: &Expr) -> u64 {
        program.complexity()
    }

    fn build_repr(
        &self,
        exemplar: &Expr,
        ignore_ops: &OperatorSet,
    ) -> Option<ExprRepr> {
        ExprRepr::build(exemplar, self.arity, ignore_ops)
    }
}
