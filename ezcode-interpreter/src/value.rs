//! Runtime values for the EZCode interpreter.
//!
//! Values form a closed tagged union. Text carries no fixed type and is tagged
//! by inspection; class instances are shared, mutable property tables.

use crate::error::{Result, RuntimeError};
use ezcode_parser::{Class, DataType, TypeTag};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type InstanceRef = Rc<RefCell<Instance>>;

/// A variable slot: local, parameter or instance property
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Value,
    pub data_type: DataType,
    pub required: bool,
    pub line: usize,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: Value, data_type: DataType, line: usize) -> Self {
        Self {
            name: name.into(),
            value,
            data_type,
            required: true,
            line,
        }
    }
}

/// An instance of a class. It owns its property table; the template is never mutated.
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub properties: IndexMap<String, Binding>,
}

impl Instance {
    pub fn new_ref(class: Rc<Class>, properties: IndexMap<String, Binding>) -> InstanceRef {
        Rc::new(RefCell::new(Instance { class, properties }))
    }

    /// The `value`/`Value` property used by primitive `typeof` classes
    pub fn primitive_property(&self) -> Option<&Binding> {
        self.properties
            .get("value")
            .or_else(|| self.properties.get("Value"))
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Int(i32),
    Float(f32),
    Bool(bool),
    Char(char),
    Double(f64),
    Decimal(f64),
    Long(i64),
    UInt(u32),
    ULong(u64),
    Instance(InstanceRef),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_instance(&self) -> Option<&InstanceRef> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// The primitive tag of this value. Text is tagged by inspecting its content.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Empty => TypeTag::Untyped,
            Value::Text(text) => infer_tag(text),
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Bool(_) => TypeTag::Bool,
            Value::Char(_) => TypeTag::Char,
            Value::Double(_) => TypeTag::Double,
            Value::Decimal(_) => TypeTag::Decimal,
            Value::Long(_) => TypeTag::Long,
            Value::UInt(_) => TypeTag::UInt,
            Value::ULong(_) => TypeTag::ULong,
            Value::Instance(instance) => instance.borrow().class.instance_type().tag,
        }
    }

    /// Human readable type name used in error messages
    pub fn type_name(&self) -> String {
        match self {
            Value::Instance(instance) => instance.borrow().class.name.clone(),
            other => other.type_tag().to_string(),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(f64::from(*n)),
            Value::Float(n) => Some(f64::from(*n)),
            Value::Double(n) | Value::Decimal(n) => Some(*n),
            Value::Long(n) => Some(*n as f64),
            Value::UInt(n) => Some(f64::from(*n)),
            Value::ULong(n) => Some(*n as f64),
            Value::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Integer view of the value, if it is integral and fits in 64 bits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            Value::UInt(n) => Some(i64::from(*n)),
            Value::ULong(n) => i64::try_from(*n).ok(),
            Value::Text(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Read the value as a truth literal
    pub fn truth(&self) -> Result<bool> {
        if let Value::Bool(value) = self {
            return Ok(*value);
        }
        let text = self.to_text();
        match text.trim().to_lowercase().as_str() {
            "true" | "y" | "yes" | "1" => Ok(true),
            "false" | "n" | "no" | "0" => Ok(false),
            _ => Err(RuntimeError::NotBoolean { text }),
        }
    }

    /// Convert to the given primitive tag by textual parse. Untyped and object leave the value alone.
    pub fn coerce(&self, tag: TypeTag) -> Result<Value> {
        if !tag.is_primitive() || self.type_tag_is_exactly(tag) {
            return Ok(self.clone());
        }

        let text = self.to_text();
        let trimmed = text.trim();
        let fail = || RuntimeError::type_error(tag.name(), text.clone());

        let value = match tag {
            TypeTag::String => Value::Text(text.clone()),
            TypeTag::Int => Value::Int(parse_integral(self, trimmed).ok_or_else(fail)?),
            TypeTag::Long => Value::Long(parse_integral(self, trimmed).ok_or_else(fail)?),
            TypeTag::UInt => Value::UInt(parse_integral(self, trimmed).ok_or_else(fail)?),
            TypeTag::ULong => Value::ULong(parse_integral(self, trimmed).ok_or_else(fail)?),
            TypeTag::Float => Value::Float(trimmed.parse().map_err(|_| fail())?),
            TypeTag::Double => Value::Double(trimmed.parse().map_err(|_| fail())?),
            TypeTag::Decimal => Value::Decimal(trimmed.parse().map_err(|_| fail())?),
            TypeTag::Bool => Value::Bool(self.truth().map_err(|_| fail())?),
            TypeTag::Char => {
                let mut chars = trimmed.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(fail()),
                }
            }
            TypeTag::Untyped | TypeTag::Object => self.clone(),
        };
        Ok(value)
    }

    fn type_tag_is_exactly(&self, tag: TypeTag) -> bool {
        !matches!(self, Value::Text(_)) && self.type_tag() == tag && !matches!(self, Value::Instance(_))
    }
}

/// Parse integral text into any integer width. `3.0` style text is accepted when it has no fraction.
fn parse_integral<T: TryFrom<i64> + std::str::FromStr>(value: &Value, text: &str) -> Option<T> {
    if let Ok(parsed) = text.parse::<T>() {
        return Some(parsed);
    }
    let number = value.as_f64()?;
    if number.fract() != 0.0 || !number.is_finite() {
        return None;
    }
    T::try_from(number as i64).ok()
}

/// Tag text by its content: integer, decimal, boolean or plain string
pub fn infer_tag(text: &str) -> TypeTag {
    let trimmed = text.trim();
    if trimmed.parse::<i32>().is_ok() {
        TypeTag::Int
    } else if trimmed.parse::<f32>().is_ok() && trimmed.chars().any(|c| c.is_ascii_digit()) {
        TypeTag::Float
    } else if trimmed == "true" || trimmed == "false" {
        TypeTag::Bool
    } else {
        TypeTag::String
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(text) => write!(f, "{text}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Double(n) | Value::Decimal(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::ULong(n) => write!(f, "{n}"),
            Value::Instance(instance) => write!(f, "{}", instance.borrow().class.name),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::ULong(a), Value::ULong(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
