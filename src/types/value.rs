//! Runtime values produced by evaluating expressions.
//!
//! Operators are defined per operand kind. Anything not listed in a match
//! arm below is a type error; nothing is coerced silently.

use std::fmt;

use crate::error::{MapError, Result};

use super::raster::{Mask, Plane};

/// An interval with independently strict bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
    pub strict_min: bool,
    pub strict_max: bool,
}

impl Range {
    /// `[min, max]`, both bounds inclusive.
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            strict_min: false,
            strict_max: false,
        }
    }

    /// Range with explicit bound strictness.
    pub fn with_strictness(min: f32, max: f32, strict_min: bool, strict_max: bool) -> Self {
        Self {
            min,
            max,
            strict_min,
            strict_max,
        }
    }

    pub fn contains(&self, x: f32) -> bool {
        let lower = if self.strict_min { x > self.min } else { x >= self.min };
        let upper = if self.strict_max { x < self.max } else { x <= self.max };
        lower && upper
    }

    /// Membership test over every value of a plane.
    pub fn contains_plane(&self, plane: &Plane) -> Mask {
        plane.test(|v| self.contains(v))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.strict_min { '(' } else { '[' };
        let close = if self.strict_max { ')' } else { ']' };
        write!(f, "{}{}, {}{}", open, self.min, self.max, close)
    }
}

/// A `start:stop:step` selection over a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    /// Select elements of `items` the way sequence slicing does, negative
    /// bounds counting from the end.
    pub fn apply(&self, items: &[f32]) -> Result<Vec<f32>> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(MapError::evaluation("Slice step cannot be zero"));
        }

        let len = items.len() as i64;
        let clamp = |bound: i64, low: i64, high: i64| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(low, high)
        };

        let mut out = Vec::new();
        if step > 0 {
            let start = self.start.map_or(0, |s| clamp(s, 0, len));
            let stop = self.stop.map_or(len, |s| clamp(s, 0, len));
            let mut i = start;
            while i < stop {
                out.push(items[i as usize]);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        } else {
            let start = self.start.map_or(len - 1, |s| clamp(s, -1, len - 1));
            let stop = self.stop.map_or(-1, |s| clamp(s, -1, len - 1));
            let mut i = start;
            while i > stop {
                out.push(items[i as usize]);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        }
        Ok(out)
    }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f32),
    Boolean(bool),
    None,
    Mask(Mask),
    Plane(Plane),
    Vector(Vec<f32>),
    Range(Range),
    Slice(Slice),
}

impl Value {
    /// Kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::None => "none",
            Value::Mask(_) => "mask",
            Value::Plane(_) => "band",
            Value::Vector(_) => "vector",
            Value::Range(_) => "range",
            Value::Slice(_) => "slice",
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Value::Vector(_))
    }

    /// `+ - * / %`
    pub fn arithmetic(&self, op: Arith, other: &Value) -> Result<Value> {
        let f = op.function();
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
            (Value::Plane(a), Value::Plane(b)) => Ok(Value::Plane(a.zip_with(b, f)?)),
            (Value::Plane(a), Value::Scalar(b)) => Ok(Value::Plane(a.map(|v| f(v, *b)))),
            (Value::Scalar(a), Value::Plane(b)) => Ok(Value::Plane(b.map(|v| f(*a, v)))),
            (Value::Vector(a), Value::Vector(b)) if matches!(op, Arith::Add | Arith::Sub) => {
                if a.len() != b.len() {
                    return Err(MapError::shape(format!(
                        "Cannot apply '{}' to vectors of length {} and {}",
                        op.symbol(),
                        a.len(),
                        b.len()
                    )));
                }
                Ok(Value::Vector(a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()))
            }
            (Value::Vector(a), Value::Scalar(b)) if !matches!(op, Arith::Add | Arith::Sub) => {
                Ok(Value::Vector(a.iter().map(|x| f(*x, *b)).collect()))
            }
            (Value::Scalar(a), Value::Vector(b)) if op == Arith::Mul => {
                Ok(Value::Vector(b.iter().map(|x| f(*a, *x)).collect()))
            }
            _ => Err(self.mismatch(op.symbol(), other)),
        }
    }

    /// `< <= > >= == !=`
    pub fn compare(&self, op: Compare, other: &Value) -> Result<Value> {
        let f = op.function();
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Boolean(f(*a, *b))),
            (Value::Plane(a), Value::Plane(b)) => Ok(Value::Mask(a.test_with(b, f)?)),
            (Value::Plane(a), Value::Scalar(b)) => Ok(Value::Mask(a.test(|v| f(v, *b)))),
            (Value::Scalar(a), Value::Plane(b)) => Ok(Value::Mask(b.test(|v| f(*a, v)))),
            (Value::Boolean(a), Value::Boolean(b)) if op.is_equality() => {
                Ok(Value::Boolean((a == b) == (op == Compare::Eq)))
            }
            (Value::Mask(a), Value::Mask(b)) if op.is_equality() => {
                let same = op == Compare::Eq;
                Ok(Value::Mask(a.zip_with(b, |x, y| (x == y) == same)?))
            }
            (Value::Vector(a), Value::Vector(b)) if op.is_equality() => {
                if a.len() != b.len() {
                    return Err(MapError::shape(format!(
                        "Cannot compare vectors of length {} and {}",
                        a.len(),
                        b.len()
                    )));
                }
                Ok(Value::Boolean((a == b) == (op == Compare::Eq)))
            }
            _ => Err(self.mismatch(op.symbol(), other)),
        }
    }

    /// `& | ^`
    pub fn logic(&self, op: Logic, other: &Value) -> Result<Value> {
        let f = op.function();
        match (self, other) {
            (Value::Mask(a), Value::Mask(b)) => Ok(Value::Mask(a.zip_with(b, f)?)),
            (Value::Mask(a), Value::Boolean(b)) => Ok(Value::Mask(a.map(|x| f(x, *b)))),
            (Value::Boolean(a), Value::Mask(b)) => Ok(Value::Mask(b.map(|x| f(*a, x)))),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(f(*a, *b))),
            (Value::Scalar(a), Value::Scalar(b)) => {
                let a = as_integer(*a, op.symbol())?;
                let b = as_integer(*b, op.symbol())?;
                let result = match op {
                    Logic::And => a & b,
                    Logic::Or => a | b,
                    Logic::Xor => a ^ b,
                };
                Ok(Value::Scalar(result as f32))
            }
            _ => Err(self.mismatch(op.symbol(), other)),
        }
    }

    /// `self in range`
    pub fn within(&self, range: &Value) -> Result<Value> {
        let Value::Range(range) = range else {
            return Err(MapError::Type {
                message: format!("Right operand of 'in' must be a range, got {}", range.kind()),
                help: Some("Write ranges as min .. max or value +- tolerance".to_string()),
            });
        };
        match self {
            Value::Scalar(x) => Ok(Value::Boolean(range.contains(*x))),
            Value::Plane(p) => Ok(Value::Mask(range.contains_plane(p))),
            _ => Err(MapError::type_error(format!(
                "Cannot test membership of a {} in a range",
                self.kind()
            ))),
        }
    }

    /// `-x`
    pub fn negate(&self) -> Result<Value> {
        match self {
            Value::Scalar(v) => Ok(Value::Scalar(-v)),
            Value::Plane(p) => Ok(Value::Plane(p.map(|v| -v))),
            Value::Vector(items) => Ok(Value::Vector(items.iter().map(|v| -v).collect())),
            _ => Err(MapError::type_error(format!("Cannot negate a {}", self.kind()))),
        }
    }

    /// `~x`
    pub fn invert(&self) -> Result<Value> {
        match self {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            Value::Mask(m) => Ok(Value::Mask(m.not())),
            Value::Scalar(v) => Ok(Value::Scalar(!as_integer(*v, "~")? as f32)),
            _ => Err(MapError::type_error(format!("Cannot invert a {}", self.kind()))),
        }
    }

    /// Clamp into `[0, 1]`.
    pub fn saturate(&self) -> Result<Value> {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        match self {
            Value::Scalar(v) => Ok(Value::Scalar(clamp(*v))),
            Value::Plane(p) => Ok(Value::Plane(p.map(clamp))),
            Value::Vector(items) => Ok(Value::Vector(items.iter().map(|v| clamp(*v)).collect())),
            _ => Err(MapError::type_error(format!("Cannot saturate a {}", self.kind()))),
        }
    }

    fn mismatch(&self, op: &str, other: &Value) -> MapError {
        MapError::type_error(format!(
            "Operator '{}' is not defined for {} and {}",
            op,
            self.kind(),
            other.kind()
        ))
    }
}

fn as_integer(v: f32, op: &str) -> Result<i64> {
    if v.fract() != 0.0 || !v.is_finite() {
        return Err(MapError::type_error(format!(
            "Operator '{}' needs integer operands, got {}",
            op, v
        )));
    }
    Ok(v as i64)
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Arith {
    fn symbol(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
            Arith::Mod => "%",
        }
    }

    fn function(self) -> fn(f32, f32) -> f32 {
        match self {
            Arith::Add => |a, b| a + b,
            Arith::Sub => |a, b| a - b,
            Arith::Mul => |a, b| a * b,
            Arith::Div => |a, b| a / b,
            // Floored modulo: the result takes the sign of the divisor.
            Arith::Mod => |a, b| a - b * (a / b).floor(),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Compare {
    fn symbol(self) -> &'static str {
        match self {
            Compare::Lt => "<",
            Compare::Le => "<=",
            Compare::Gt => ">",
            Compare::Ge => ">=",
            Compare::Eq => "==",
            Compare::Ne => "!=",
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, Compare::Eq | Compare::Ne)
    }

    fn function(self) -> fn(f32, f32) -> bool {
        match self {
            Compare::Lt => |a, b| a < b,
            Compare::Le => |a, b| a <= b,
            Compare::Gt => |a, b| a > b,
            Compare::Ge => |a, b| a >= b,
            Compare::Eq => |a, b| a == b,
            Compare::Ne => |a, b| a != b,
        }
    }
}

/// Bitwise logic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
    Xor,
}

impl Logic {
    fn symbol(self) -> &'static str {
        match self {
            Logic::And => "&",
            Logic::Or => "|",
            Logic::Xor => "^",
        }
    }

    fn function(self) -> fn(bool, bool) -> bool {
        match self {
            Logic::And => |a, b| a & b,
            Logic::Or => |a, b| a | b,
            Logic::Xor => |a, b| a ^ b,
        }
    }
}
