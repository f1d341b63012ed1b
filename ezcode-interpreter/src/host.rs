//! Host functions reachable through `runexec`
//!
//! The registry maps dotted paths such as `EZCode.print` to native closures.
//! Host functions receive already-evaluated values and a context they can
//! write program output to. The interpreter owns exactly one registry, so
//! embedders can extend it before running a program.

use crate::value::Value;
use ezcode_parser::TypeTag;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

type HostFn = Box<dyn Fn(&mut HostContext, &[Value]) -> Result<Value, HostError>>;

/// Errors raised by host functions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    #[error("Host function '{path}' not found")]
    NotFound { path: String },

    #[error("'{path}' expects {expected} argument(s), found {found}")]
    WrongArity {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("Type mismatch: expected {expected}, found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

/// Side channel host functions write to
#[derive(Debug, Default)]
pub struct HostContext {
    pub output: Vec<String>,
}

pub struct HostFunction {
    /// Exact argument count, `None` for variadic functions
    pub arity: Option<usize>,
    function: HostFn,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct HostRegistry {
    functions: HashMap<String, HostFunction>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `EZCode.*` standard functions
    pub fn with_standard_library() -> Self {
        let mut registry = Self::new();
        registry.register_standard_library();
        registry
    }

    pub fn register<F>(&mut self, path: impl Into<String>, arity: Option<usize>, function: F)
    where
        F: Fn(&mut HostContext, &[Value]) -> Result<Value, HostError> + 'static,
    {
        self.functions.insert(
            path.into(),
            HostFunction {
                arity,
                function: Box::new(function),
            },
        );
    }

    pub fn contains(&self, path: &str) -> bool {
        self.functions.contains_key(path)
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn call(
        &self,
        path: &str,
        context: &mut HostContext,
        args: &[Value],
    ) -> Result<Value, HostError> {
        let function = self.functions.get(path).ok_or_else(|| HostError::NotFound {
            path: path.to_string(),
        })?;
        if let Some(expected) = function.arity {
            if expected != args.len() {
                return Err(HostError::WrongArity {
                    path: path.to_string(),
                    expected,
                    found: args.len(),
                });
            }
        }
        (function.function)(context, args)
    }

    fn register_standard_library(&mut self) {
        self.register("EZCode.print", None, |context, args| {
            let line = args
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(" ");
            context.output.push(line);
            Ok(Value::Empty)
        });
        self.register("EZCode.add", Some(2), |_, args| {
            arithmetic(&args[0], &args[1], "+", i32::checked_add, i64::checked_add, |a, b| a + b)
        });
        self.register("EZCode.subtract", Some(2), |_, args| {
            arithmetic(&args[0], &args[1], "-", i32::checked_sub, i64::checked_sub, |a, b| a - b)
        });
        self.register("EZCode.multiply", Some(2), |_, args| {
            arithmetic(&args[0], &args[1], "*", i32::checked_mul, i64::checked_mul, |a, b| a * b)
        });
        self.register("EZCode.divide", Some(2), |_, args| divide(&args[0], &args[1]));
        self.register("EZCode.equals", Some(2), |_, args| {
            let equal = match (number(&args[0]), number(&args[1])) {
                (Ok(a), Ok(b)) => a == b,
                _ => args[0].to_text() == args[1].to_text(),
            };
            Ok(Value::Bool(equal))
        });
        self.register("EZCode.greater", Some(2), |_, args| {
            Ok(Value::Bool(number(&args[0])? > number(&args[1])?))
        });
        self.register("EZCode.less", Some(2), |_, args| {
            Ok(Value::Bool(number(&args[0])? < number(&args[1])?))
        });
        self.register("EZCode.concat", None, |_, args| {
            Ok(Value::Text(args.iter().map(Value::to_text).collect()))
        });
        self.register("EZCode.not", Some(1), |_, args| {
            let value = args[0].truth().map_err(|_| HostError::TypeMismatch {
                expected: "bool".to_string(),
                found: args[0].to_text(),
            })?;
            Ok(Value::Bool(!value))
        });
        self.register("EZCode.length", Some(1), |_, args| {
            let length = args[0].to_text().chars().count();
            i32::try_from(length)
                .map(Value::Int)
                .map_err(|_| HostError::InvalidOperation {
                    message: "length does not fit in an int".to_string(),
                })
        });
    }
}

fn number(value: &Value) -> Result<f64, HostError> {
    value.as_f64().ok_or_else(|| HostError::TypeMismatch {
        expected: "number".to_string(),
        found: value.to_text(),
    })
}

fn integer(value: &Value) -> Option<i32> {
    match value.type_tag() {
        TypeTag::Int => value.as_i64().and_then(|n| i32::try_from(n).ok()),
        _ => None,
    }
}

/// Integral operands wider than an int: longs, unsigned values and long digit text
fn long(value: &Value) -> Option<i64> {
    match value {
        Value::Int(_) | Value::Long(_) | Value::UInt(_) | Value::ULong(_) => value.as_i64(),
        Value::Text(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn overflow(a: impl std::fmt::Display, op: &str, b: impl std::fmt::Display) -> HostError {
    HostError::InvalidOperation {
        message: format!("integer overflow in {a} {op} {b}"),
    }
}

/// Int arithmetic when both sides are ints, long arithmetic for wider integers, float otherwise
fn arithmetic(
    left: &Value,
    right: &Value,
    op: &str,
    int_op: fn(i32, i32) -> Option<i32>,
    long_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, HostError> {
    if let (Some(a), Some(b)) = (integer(left), integer(right)) {
        return int_op(a, b).map(Value::Int).ok_or_else(|| overflow(a, op, b));
    }
    if let (Some(a), Some(b)) = (long(left), long(right)) {
        return long_op(a, b).map(Value::Long).ok_or_else(|| overflow(a, op, b));
    }
    Ok(Value::Float(float_op(number(left)?, number(right)?) as f32))
}

fn divide(left: &Value, right: &Value) -> Result<Value, HostError> {
    if let (Some(a), Some(b)) = (integer(left), integer(right)) {
        if b == 0 {
            return Err(HostError::DivisionByZero);
        }
        if a.checked_rem(b).ok_or_else(|| overflow(a, "/", b))? == 0 {
            return a.checked_div(b).map(Value::Int).ok_or_else(|| overflow(a, "/", b));
        }
    } else if let (Some(a), Some(b)) = (long(left), long(right)) {
        if b == 0 {
            return Err(HostError::DivisionByZero);
        }
        if a.checked_rem(b).ok_or_else(|| overflow(a, "/", b))? == 0 {
            return a.checked_div(b).map(Value::Long).ok_or_else(|| overflow(a, "/", b));
        }
    }
    let divisor = number(right)?;
    if divisor == 0.0 {
        return Err(HostError::DivisionByZero);
    }
    Ok(Value::Float((number(left)? / divisor) as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(path: &str, args: &[Value]) -> Result<Value, HostError> {
        HostRegistry::with_standard_library().call(path, &mut HostContext::default(), args)
    }

    #[test]
    fn test_print_writes_output() {
        let registry = HostRegistry::with_standard_library();
        let mut context = HostContext::default();
        registry
            .call("EZCode.print", &mut context, &[Value::text("hello"), Value::Int(2)])
            .unwrap();
        assert_eq!(context.output, vec!["hello 2".to_string()]);
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(call("EZCode.add", &[Value::text("2"), Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(
            call("EZCode.multiply", &[Value::Int(4), Value::Int(3)]).unwrap(),
            Value::Int(12)
        );
        assert_eq!(
            call("EZCode.add", &[Value::text("1.5"), Value::Int(1)]).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn test_division() {
        assert_eq!(call("EZCode.divide", &[Value::Int(6), Value::Int(3)]).unwrap(), Value::Int(2));
        assert_eq!(
            call("EZCode.divide", &[Value::Int(7), Value::Int(2)]).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            call("EZCode.divide", &[Value::Int(1), Value::Int(0)]),
            Err(HostError::DivisionByZero)
        );
    }

    #[test]
    fn test_division_overflow_is_an_error() {
        match call("EZCode.divide", &[Value::text("-2147483648"), Value::text("-1")]) {
            Err(HostError::InvalidOperation { message }) => {
                assert_eq!(message, "integer overflow in -2147483648 / -1")
            }
            other => panic!("Expected InvalidOperation, got {other:?}"),
        }
        assert!(call("EZCode.divide", &[Value::Long(i64::MIN), Value::Long(-1)]).is_err());
    }

    #[test]
    fn test_long_arithmetic_keeps_precision() {
        let big = 16_777_217_i64;
        assert_eq!(
            call("EZCode.add", &[Value::Long(big), Value::Long(big)]).unwrap(),
            Value::Long(2 * big)
        );
        assert_eq!(
            call("EZCode.multiply", &[Value::text("3000000000"), Value::Int(2)]).unwrap(),
            Value::Long(6_000_000_000)
        );
        assert_eq!(
            call("EZCode.divide", &[Value::ULong(9_000_000_000), Value::Int(3)]).unwrap(),
            Value::Long(3_000_000_000)
        );
    }

    #[test]
    fn test_unknown_path_and_arity() {
        match call("EZCode.missing", &[]) {
            Err(HostError::NotFound { path }) => assert_eq!(path, "EZCode.missing"),
            other => panic!("Expected NotFound, got {other:?}"),
        }
        match call("EZCode.add", &[Value::Int(1)]) {
            Err(HostError::WrongArity { expected, found, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("Expected WrongArity, got {other:?}"),
        }
    }

    #[test]
    fn test_comparisons_and_text() {
        assert_eq!(
            call("EZCode.equals", &[Value::text("2"), Value::Int(2)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("EZCode.equals", &[Value::text("a"), Value::text("b")]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            call("EZCode.greater", &[Value::Int(3), Value::Int(2)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("EZCode.concat", &[Value::text("ab"), Value::text("cd")]).unwrap(),
            Value::text("abcd")
        );
        assert_eq!(call("EZCode.length", &[Value::text("four")]).unwrap(), Value::Int(4));
        assert_eq!(call("EZCode.not", &[Value::text("yes")]).unwrap(), Value::Bool(false));
        assert!(call("EZCode.less", &[Value::text("a"), Value::Int(1)]).is_err());
    }
}
