//! Abstract syntax tree for colormap scripts.
//!
//! Nodes are built through checked constructors so that structural mistakes
//! (adding vectors of different lengths, multiplying two vectors) are caught
//! while the tree is being assembled, before anything is evaluated.

use std::collections::HashMap;
use std::fmt;

use crate::error::{MapError, Result};

/// Binary operators, lowest precedence group first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Xor,
    Or,
    And,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Xor => "^",
            BinaryOp::Or => "|",
            BinaryOp::And => "&",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::Xor | BinaryOp::Or | BinaryOp::And)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::In
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Negate,
    /// `~x`
    Invert,
}

/// Literal leaf values.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Number(f32),
    Boolean(bool),
    None,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Primitive(Primitive),
    /// `$name`
    ScalarVar(String),
    /// `$$name`
    VectorVar(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Range {
        min: Box<Expr>,
        max: Box<Expr>,
        strict_min: bool,
        strict_max: bool,
    },
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    /// `[e1, e2, ...]`
    Vector(Vec<Expr>),
    /// `vector[index]` or `vector[start:stop:step]`
    Indexed {
        vector: Box<Expr>,
        index: Box<Expr>,
    },
    /// `(| expr |)`
    Saturated(Box<Expr>),
}

/// Statically known shape of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Anything that is not a vector: scalars, planes, masks, ranges.
    Plain,
    /// A vector, with its length when it can be known before evaluation.
    Vector(Option<usize>),
}

impl Shape {
    pub fn is_vector(self) -> bool {
        matches!(self, Shape::Vector(_))
    }
}

/// Known vector lengths, keyed by `$$name`.
pub type VectorLengths = HashMap<String, usize>;

impl Expr {
    pub fn number(value: f32) -> Self {
        Expr::Primitive(Primitive::Number(value))
    }

    pub fn scalar_var(name: impl Into<String>) -> Self {
        Expr::ScalarVar(name.into())
    }

    pub fn vector_var(name: impl Into<String>) -> Self {
        Expr::VectorVar(name.into())
    }

    pub fn vector(items: Vec<Expr>) -> Self {
        Expr::Vector(items)
    }

    /// Inclusive range with both bounds as expressions.
    pub fn range(min: Expr, max: Expr) -> Self {
        Expr::Range {
            min: Box::new(min),
            max: Box::new(max),
            strict_min: false,
            strict_max: false,
        }
    }

    /// `center +- tolerance`, i.e. `[center - tolerance, center + tolerance]`.
    pub fn tolerance(center: Expr, tolerance: Expr) -> Self {
        let min = Expr::Binary {
            op: BinaryOp::Sub,
            left: Box::new(center.clone()),
            right: Box::new(tolerance.clone()),
        };
        let max = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(center),
            right: Box::new(tolerance),
        };
        Expr::range(min, max)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn saturated(inner: Expr) -> Self {
        Expr::Saturated(Box::new(inner))
    }

    /// Build a binary node, rejecting operand shapes that can never work.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Result<Self> {
        Self::binary_with(op, left, right, &VectorLengths::new())
    }

    /// Like [`Expr::binary`], also resolving `$$name` lengths from `lengths`.
    pub fn binary_with(op: BinaryOp, left: Expr, right: Expr, lengths: &VectorLengths) -> Result<Self> {
        check_operands(op, left.shape(lengths), right.shape(lengths))?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Build an indexing node; the indexed expression must be a vector.
    pub fn indexed(vector: Expr, index: Expr, lengths: &VectorLengths) -> Result<Self> {
        if !vector.shape(lengths).is_vector() {
            return Err(MapError::Type {
                message: "Only vectors can be indexed".to_string(),
                help: Some("Index a $$vector or a [..] literal".to_string()),
            });
        }
        Ok(Expr::Indexed {
            vector: Box::new(vector),
            index: Box::new(index),
        })
    }

    /// Infer the shape of this expression without evaluating it.
    pub fn shape(&self, lengths: &VectorLengths) -> Shape {
        match self {
            Expr::VectorVar(name) => Shape::Vector(lengths.get(name).copied()),
            Expr::Vector(items) => Shape::Vector(Some(items.len())),
            Expr::Binary { op, left, right } if op.is_arithmetic() => {
                match (left.shape(lengths), right.shape(lengths)) {
                    (Shape::Vector(n), _) | (_, Shape::Vector(n)) => Shape::Vector(n),
                    _ => Shape::Plain,
                }
            }
            Expr::Unary { operand, .. } | Expr::Saturated(operand) => operand.shape(lengths),
            Expr::Indexed { index, .. } => match index.as_ref() {
                Expr::Slice { .. } => Shape::Vector(None),
                _ => Shape::Plain,
            },
            _ => Shape::Plain,
        }
    }
}

fn check_operands(op: BinaryOp, left: Shape, right: Shape) -> Result<()> {
    if !left.is_vector() && !right.is_vector() {
        return Ok(());
    }

    match (op, left, right) {
        (BinaryOp::Add | BinaryOp::Sub, Shape::Vector(a), Shape::Vector(b)) => match (a, b) {
            (Some(a), Some(b)) if a != b => Err(MapError::Shape {
                message: format!("Cannot apply '{}' to vectors of length {} and {}", op, a, b),
                help: Some("Both vectors must have the same number of elements".to_string()),
            }),
            _ => Ok(()),
        },
        (BinaryOp::Mul, Shape::Vector(_), Shape::Plain)
        | (BinaryOp::Mul, Shape::Plain, Shape::Vector(_))
        | (BinaryOp::Div | BinaryOp::Mod, Shape::Vector(_), Shape::Plain) => Ok(()),
        (BinaryOp::Eq | BinaryOp::Ne, Shape::Vector(_), Shape::Vector(_)) => Ok(()),
        _ => Err(MapError::Type {
            message: format!("Operator '{}' is not defined for these vector operands", op),
            help: Some(
                "Vectors support v + v, v - v, v * n, n * v, v / n and v % n".to_string(),
            ),
        }),
    }
}

/// How a script treats the alpha band of input images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaPolicy {
    /// Images must carry an alpha band.
    Require,
    /// Images may or may not carry an alpha band.
    #[default]
    Allow,
    /// Images must not carry an alpha band.
    Forbid,
}

/// The variable an assignment writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Scalar(String),
    Vector(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Scalar(name) => write!(f, "${}", name),
            Target::Vector(name) => write!(f, "$${}", name),
        }
    }
}

/// `target = value;`. Compound forms are desugared by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Target,
    pub value: Expr,
}

/// One `[using space:] statements` group inside a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBlock {
    pub space: String,
    pub statements: Vec<Assignment>,
}

/// `on [space] pixels having predicate do ... end;`
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub space: String,
    pub predicate: Expr,
    pub actions: Vec<ActionBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign(Assignment),
    Alpha(AlphaPolicy),
    Rule(Rule),
}

/// A parsed script: statements in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Assign(a) => Some(a),
            _ => None,
        })
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Rule(r) => Some(r),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(n: usize) -> Expr {
        Expr::vector((0..n).map(|i| Expr::number(i as f32)).collect())
    }

    #[test]
    fn test_vector_addition_length_mismatch() {
        let err = Expr::binary(BinaryOp::Add, vec_of(3), vec_of(4)).unwrap_err();
        assert!(matches!(err, MapError::Shape { .. }));
    }

    #[test]
    fn test_vector_subtraction_same_length() {
        let expr = Expr::binary(BinaryOp::Sub, vec_of(3), vec_of(3)).unwrap();
        assert_eq!(expr.shape(&VectorLengths::new()), Shape::Vector(Some(3)));
    }

    #[test]
    fn test_vector_length_from_declared_variable() {
        let mut lengths = VectorLengths::new();
        lengths.insert("c".to_string(), 4);

        let err = Expr::binary_with(BinaryOp::Add, Expr::vector_var("c"), vec_of(3), &lengths)
            .unwrap_err();
        assert!(matches!(err, MapError::Shape { .. }));

        // Unknown length is deferred to evaluation
        assert!(Expr::binary(BinaryOp::Add, Expr::vector_var("c"), vec_of(3)).is_ok());
    }

    #[test]
    fn test_vector_scaling_broadcasts() {
        assert!(Expr::binary(BinaryOp::Mul, vec_of(3), Expr::number(2.0)).is_ok());
        assert!(Expr::binary(BinaryOp::Mul, Expr::number(2.0), vec_of(3)).is_ok());
        assert!(Expr::binary(BinaryOp::Div, vec_of(3), Expr::number(2.0)).is_ok());
    }

    #[test]
    fn test_vector_products_are_rejected() {
        let err = Expr::binary(BinaryOp::Mul, vec_of(3), vec_of(3)).unwrap_err();
        assert!(matches!(err, MapError::Type { .. }));

        let err = Expr::binary(BinaryOp::Div, vec_of(3), vec_of(3)).unwrap_err();
        assert!(matches!(err, MapError::Type { .. }));

        let err = Expr::binary(BinaryOp::Div, Expr::number(1.0), vec_of(3)).unwrap_err();
        assert!(matches!(err, MapError::Type { .. }));
    }

    #[test]
    fn test_vector_plus_scalar_is_rejected() {
        let err = Expr::binary(BinaryOp::Add, vec_of(2), Expr::number(1.0)).unwrap_err();
        assert!(matches!(err, MapError::Type { .. }));
    }

    #[test]
    fn test_tolerance_expands_to_range() {
        let expr = Expr::tolerance(Expr::number(0.5), Expr::number(0.25));
        match expr {
            Expr::Range {
                min,
                max,
                strict_min,
                strict_max,
            } => {
                assert!(matches!(*min, Expr::Binary { op: BinaryOp::Sub, .. }));
                assert!(matches!(*max, Expr::Binary { op: BinaryOp::Add, .. }));
                assert!(!strict_min && !strict_max);
            }
            other => panic!("Expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_indexing_requires_vector() {
        let lengths = VectorLengths::new();
        assert!(Expr::indexed(vec_of(2), Expr::number(0.0), &lengths).is_ok());
        assert!(Expr::indexed(Expr::number(1.0), Expr::number(0.0), &lengths).is_err());
    }
}
