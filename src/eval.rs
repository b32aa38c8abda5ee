//! Expression evaluation.
//!
//! Expressions are evaluated against an [`Environment`] mapping `$name` and
//! `$$name` to values. Environments can be layered: a rule evaluates in a
//! child of the script's global environment, so band bindings and locals
//! shadow globals without modifying them.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{MapError, Result};
use crate::parser::{Assignment, BinaryOp, Expr, Primitive, Target, UnaryOp};
use crate::types::{Arith, Compare, Logic, Range, Slice, Value};

/// Variable bindings for evaluation.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    scalars: HashMap<String, Value>,
    vectors: HashMap<String, Vec<f32>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty environment that falls back to `parent` for lookups.
    pub fn child(parent: Rc<Environment>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Bind `$name`.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.scalars.insert(name.into(), value);
    }

    /// Bind `$$name`.
    pub fn bind_vector(&mut self, name: impl Into<String>, items: Vec<f32>) {
        self.vectors.insert(name.into(), items);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.scalars.get(name) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn get_vector(&self, name: &str) -> Option<&[f32]> {
        match self.vectors.get(name) {
            Some(items) => Some(items),
            None => self.parent.as_ref().and_then(|p| p.get_vector(name)),
        }
    }

    /// Remove a local `$name` binding, returning it.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.scalars.remove(name)
    }

    /// Lengths of every vector visible from this environment.
    pub fn vector_lengths(&self) -> HashMap<String, usize> {
        let mut lengths = match &self.parent {
            Some(parent) => parent.vector_lengths(),
            None => HashMap::new(),
        };
        for (name, items) in &self.vectors {
            lengths.insert(name.clone(), items.len());
        }
        lengths
    }
}

/// Evaluate `expr` against `env`.
pub fn evaluate(expr: &Expr, env: &Environment) -> Result<Value> {
    Evaluator::new(env).eval(expr)
}

/// Run assignments in order, binding each result in `env`.
pub fn execute(statements: &[Assignment], env: &mut Environment) -> Result<()> {
    for statement in statements {
        let value = evaluate(&statement.value, env)?;
        match (&statement.target, value) {
            (Target::Vector(name), Value::Vector(items)) => env.bind_vector(name.clone(), items),
            (Target::Vector(name), other) => {
                return Err(MapError::type_error(format!(
                    "Cannot assign a {} to $${}",
                    other.kind(),
                    name
                )));
            }
            (Target::Scalar(name), Value::Vector(_)) => {
                return Err(MapError::Type {
                    message: format!("Cannot assign a vector to scalar variable ${}", name),
                    help: Some(format!("Use $${} for vector variables", name)),
                });
            }
            (Target::Scalar(name), value) => env.bind(name.clone(), value),
        }
    }
    Ok(())
}

/// Tree-walking evaluator over a borrowed environment.
pub struct Evaluator<'e> {
    env: &'e Environment,
}

impl<'e> Evaluator<'e> {
    pub fn new(env: &'e Environment) -> Self {
        Self { env }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Primitive(Primitive::Number(n)) => Ok(Value::Scalar(*n)),
            Expr::Primitive(Primitive::Boolean(b)) => Ok(Value::Boolean(*b)),
            Expr::Primitive(Primitive::None) => Ok(Value::None),

            Expr::ScalarVar(name) => self.env.get(name).cloned().ok_or_else(|| {
                MapError::UndefinedVariable {
                    name: format!("${}", name),
                }
            }),

            Expr::VectorVar(name) => self
                .env
                .get_vector(name)
                .map(|items| Value::Vector(items.to_vec()))
                .ok_or_else(|| MapError::UndefinedVariable {
                    name: format!("$${}", name),
                }),

            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                apply_binary(*op, &left, &right)
            }

            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Negate => operand.negate(),
                    UnaryOp::Invert => operand.invert(),
                }
            }

            Expr::Saturated(inner) => self.eval(inner)?.saturate(),

            Expr::Range {
                min,
                max,
                strict_min,
                strict_max,
            } => {
                let min = self.number(min, "Range bound")?;
                let max = self.number(max, "Range bound")?;
                Ok(Value::Range(Range::with_strictness(min, max, *strict_min, *strict_max)))
            }

            Expr::Vector(items) => {
                let items = items
                    .iter()
                    .map(|item| self.number(item, "Vector element"))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Vector(items))
            }

            Expr::Slice { start, stop, step } => Ok(Value::Slice(Slice {
                start: self.optional_integer(start.as_deref())?,
                stop: self.optional_integer(stop.as_deref())?,
                step: self.optional_integer(step.as_deref())?,
            })),

            Expr::Indexed { vector, index } => {
                let items = match self.eval(vector)? {
                    Value::Vector(items) => items,
                    other => {
                        return Err(MapError::type_error(format!(
                            "Only vectors can be indexed, got {}",
                            other.kind()
                        )));
                    }
                };
                match self.eval(index)? {
                    Value::Slice(slice) => Ok(Value::Vector(slice.apply(&items)?)),
                    Value::Scalar(i) => index_vector(&items, i),
                    other => Err(MapError::type_error(format!(
                        "Vector index must be a number or slice, got {}",
                        other.kind()
                    ))),
                }
            }
        }
    }

    fn number(&self, expr: &Expr, what: &str) -> Result<f32> {
        match self.eval(expr)? {
            Value::Scalar(n) => Ok(n),
            other => Err(MapError::type_error(format!(
                "{} must be a number, got {}",
                what,
                other.kind()
            ))),
        }
    }

    fn optional_integer(&self, expr: Option<&Expr>) -> Result<Option<i64>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::None => Ok(None),
            Value::Scalar(n) => integer(n).map(Some),
            other => Err(MapError::type_error(format!(
                "Slice bounds must be numbers, got {}",
                other.kind()
            ))),
        }
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add => left.arithmetic(Arith::Add, right),
        BinaryOp::Sub => left.arithmetic(Arith::Sub, right),
        BinaryOp::Mul => left.arithmetic(Arith::Mul, right),
        BinaryOp::Div => left.arithmetic(Arith::Div, right),
        BinaryOp::Mod => left.arithmetic(Arith::Mod, right),
        BinaryOp::Lt => left.compare(Compare::Lt, right),
        BinaryOp::Le => left.compare(Compare::Le, right),
        BinaryOp::Gt => left.compare(Compare::Gt, right),
        BinaryOp::Ge => left.compare(Compare::Ge, right),
        BinaryOp::Eq => left.compare(Compare::Eq, right),
        BinaryOp::Ne => left.compare(Compare::Ne, right),
        BinaryOp::And => left.logic(Logic::And, right),
        BinaryOp::Or => left.logic(Logic::Or, right),
        BinaryOp::Xor => left.logic(Logic::Xor, right),
        BinaryOp::In => left.within(right),
    }
}

fn integer(n: f32) -> Result<i64> {
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(MapError::evaluation(format!("Index must be an integer, got {}", n)));
    }
    Ok(n as i64)
}

fn index_vector(items: &[f32], index: f32) -> Result<Value> {
    let i = integer(index)?;
    let len = items.len() as i64;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(MapError::evaluation(format!(
            "Index {} out of range for vector of length {}",
            i, len
        )));
    }
    Ok(Value::Scalar(items[resolved as usize]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_expression, tokenize};
    use crate::types::Plane;
    use pretty_assertions::assert_eq;

    fn eval_in(source: &str, env: &Environment) -> Result<Value> {
        let expr = parse_expression(&tokenize(source).tokens)?;
        evaluate(&expr, env)
    }

    fn eval(source: &str) -> Result<Value> {
        eval_in(source, &Environment::new())
    }

    fn run(source: &str) -> Environment {
        let program = parse(&tokenize(source).tokens).unwrap();
        let statements: Vec<_> = program.assignments().cloned().collect();
        let mut env = Environment::new();
        execute(&statements, &mut env).unwrap();
        env
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Scalar(7.0));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Scalar(9.0));
    }

    #[test]
    fn test_subtraction_subtracts() {
        assert_eq!(eval("5 - 3").unwrap(), Value::Scalar(2.0));
        assert_eq!(eval("5 - 3 - 1").unwrap(), Value::Scalar(1.0));
    }

    #[test]
    fn test_modulo_is_remainder() {
        assert_eq!(eval("7 % 3").unwrap(), Value::Scalar(1.0));
        assert_eq!(eval("-1 % 3").unwrap(), Value::Scalar(2.0));
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("1 < 2 & 2 < 1").unwrap(), Value::Boolean(false));
        assert_eq!(eval("1 < 2 | 2 < 1").unwrap(), Value::Boolean(true));
        assert_eq!(eval("~(1 == 1)").unwrap(), Value::Boolean(false));
        assert_eq!(eval("true ^ true").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_integer_logic_is_bitwise() {
        assert_eq!(eval("6 & 3").unwrap(), Value::Scalar(2.0));
        assert_eq!(eval("6 | 3").unwrap(), Value::Scalar(7.0));
        assert_eq!(eval("6 ^ 3").unwrap(), Value::Scalar(5.0));
    }

    #[test]
    fn test_range_membership() {
        assert_eq!(eval("0.05 in 0 .. 0.1").unwrap(), Value::Boolean(true));
        assert_eq!(eval("0.5 in 0.25 +- 0.25").unwrap(), Value::Boolean(true));
        assert_eq!(eval("0.6 in 0.25 +- 0.25").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_in_requires_range() {
        assert!(matches!(eval("1 in 2"), Err(MapError::Type { .. })));
    }

    #[test]
    fn test_saturation_clamps() {
        assert_eq!(eval("(| 1.5 |)").unwrap(), Value::Scalar(1.0));
        assert_eq!(eval("(| -0.5 |)").unwrap(), Value::Scalar(0.0));
        assert_eq!(eval("(| [2, 0.5, -1] |)").unwrap(), Value::Vector(vec![1.0, 0.5, 0.0]));
    }

    #[test]
    fn test_vector_arithmetic() {
        assert_eq!(eval("[1, 2] + [3, 4]").unwrap(), Value::Vector(vec![4.0, 6.0]));
        assert_eq!(eval("[1, 2] * 2").unwrap(), Value::Vector(vec![2.0, 4.0]));
        assert_eq!(eval("2 * [1, 2]").unwrap(), Value::Vector(vec![2.0, 4.0]));
        assert_eq!(eval("[3, 4] / 2").unwrap(), Value::Vector(vec![1.5, 2.0]));
    }

    #[test]
    fn test_vector_length_mismatch_at_runtime() {
        let mut env = Environment::new();
        env.bind_vector("a", vec![1.0, 2.0, 3.0]);
        env.bind_vector("b", vec![1.0, 2.0]);
        assert!(matches!(eval_in("$$a + $$b", &env), Err(MapError::Shape { .. })));
    }

    #[test]
    fn test_indexing() {
        assert_eq!(eval("[1, 2, 3][0]").unwrap(), Value::Scalar(1.0));
        assert_eq!(eval("[1, 2, 3][-1]").unwrap(), Value::Scalar(3.0));
        assert!(matches!(eval("[1, 2, 3][3]"), Err(MapError::Evaluation { .. })));
        assert!(matches!(eval("[1, 2, 3][0.5]"), Err(MapError::Evaluation { .. })));
    }

    #[test]
    fn test_slicing() {
        assert_eq!(eval("[1, 2, 3, 4][1:3]").unwrap(), Value::Vector(vec![2.0, 3.0]));
        assert_eq!(eval("[1, 2, 3, 4][::2]").unwrap(), Value::Vector(vec![1.0, 3.0]));
        assert_eq!(
            eval("[1, 2, 3, 4][::-1]").unwrap(),
            Value::Vector(vec![4.0, 3.0, 2.0, 1.0])
        );
        assert!(matches!(eval("[1, 2][::0]"), Err(MapError::Evaluation { .. })));
    }

    #[test]
    fn test_slice_step_beyond_length() {
        assert_eq!(
            eval("[1, 2, 3][1::10000000000 * 10000000000]").unwrap(),
            Value::Vector(vec![2.0])
        );
    }

    #[test]
    fn test_undefined_variable() {
        match eval("$missing + 1") {
            Err(MapError::UndefinedVariable { name }) => assert_eq!(name, "$missing"),
            other => panic!("Expected undefined variable, got {:?}", other),
        }
        assert!(matches!(eval("$$missing"), Err(MapError::UndefinedVariable { .. })));
    }

    #[test]
    fn test_plane_operations() {
        let mut env = Environment::new();
        env.bind("h", Value::Plane(Plane::from_vec(2, 1, vec![0.01, 0.5])));

        let mask = eval_in("$h in 0 .. 0.1", &env).unwrap();
        match mask {
            Value::Mask(mask) => assert_eq!(mask.bits(), &[true, false]),
            other => panic!("Expected mask, got {:?}", other),
        }

        let scaled = eval_in("$h * 2", &env).unwrap();
        assert_eq!(scaled, Value::Plane(Plane::from_vec(2, 1, vec![0.02, 1.0])));
    }

    #[test]
    fn test_execute_binds_in_order() {
        let env = run("$a = 2; $b = $a * 3; $$v = [$a, $b];");
        assert_eq!(env.get("b"), Some(&Value::Scalar(6.0)));
        assert_eq!(env.get_vector("v"), Some(&[2.0, 6.0][..]));
    }

    #[test]
    fn test_child_environment_shadows_parent() {
        let mut globals = Environment::new();
        globals.bind("a", Value::Scalar(1.0));
        globals.bind_vector("v", vec![1.0, 2.0]);
        let globals = Rc::new(globals);

        let mut local = Environment::child(Rc::clone(&globals));
        assert_eq!(local.get("a"), Some(&Value::Scalar(1.0)));

        local.bind("a", Value::Scalar(5.0));
        assert_eq!(local.get("a"), Some(&Value::Scalar(5.0)));
        assert_eq!(globals.get("a"), Some(&Value::Scalar(1.0)));
        assert_eq!(local.vector_lengths().get("v"), Some(&2));
    }

    #[test]
    fn test_execute_rejects_vector_into_scalar() {
        let mut env = Environment::new();
        env.bind_vector("v", vec![1.0]);
        let statement = Assignment {
            target: Target::Scalar("a".to_string()),
            value: Expr::vector_var("v"),
        };
        assert!(matches!(execute(&[statement], &mut env), Err(MapError::Type { .. })));
    }
}
