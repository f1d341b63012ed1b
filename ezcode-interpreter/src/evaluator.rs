//! Expression evaluation: token runs to values, variable reads, conditions
//! and the type rules applied when a value crosses into a typed slot.

use crate::error::{Result, RuntimeError};
use crate::interpreter::{Interpreter, typed};
use crate::value::{Binding, InstanceRef, Value};
use ezcode_parser::{Class, Condition, DataType, Join, Token, TokenKind, TokenValue, TypeTag};
use std::rc::Rc;

impl Interpreter {
    /// Evaluate a token run.
    ///
    /// A run starting with a variable, method, class, watch match or host call
    /// is that operation. Anything else resolves token by token and the parts
    /// are joined with single spaces.
    pub(crate) fn evaluate_expression(
        &mut self,
        tokens: &[Token],
        requested: Option<&DataType>,
    ) -> Result<Value> {
        let Some(first) = tokens.first() else {
            return Ok(Value::Empty);
        };

        match first.kind {
            TokenKind::Identifier => {
                let name = first.to_string();
                if let Some(binding) = self.env.get(&name) {
                    if tokens.len() == 1 {
                        return self.get_value(&binding, requested);
                    }
                    if let (Some(instance), Some(next)) = (binding.value.as_instance(), tokens.get(1)) {
                        let class = instance.borrow().class.clone();
                        if let Some(method) = class.methods.get(&next.to_string()).cloned() {
                            return self.call_method(&method, Some(instance.clone()), &tokens[2..]);
                        }
                    }
                } else if let Some((method, instance)) = self.find_method(&name) {
                    return self.call_method(&method, instance, &tokens[1..]);
                } else if let Some(class) = self.classes.get(&name).cloned() {
                    let init = tokens
                        .iter()
                        .position(|token| token.is(TokenKind::Colon))
                        .map(|index| tokens_text(&tokens[index + 1..]))
                        .filter(|text| !text.is_empty());
                    return self.class_line(class, &tokens[1..], init, self.current_line);
                }
            }
            TokenKind::Match | TokenKind::RunExec if tokens.len() == 1 => {
                return self.resolve_token(first, requested);
            }
            _ => {}
        }

        if let [single] = tokens {
            return self.resolve_token(single, requested);
        }
        let mut parts = Vec::with_capacity(tokens.len());
        for token in tokens {
            parts.push(self.resolve_token(token, None)?.to_text());
        }
        Ok(Value::Text(parts.join(" ")))
    }

    /// Resolve one token: variable read, bound or host call, or literal text
    pub(crate) fn resolve_token(&mut self, token: &Token, requested: Option<&DataType>) -> Result<Value> {
        match &token.value {
            TokenValue::Bound(call) => self.call_bound(call),
            TokenValue::HostCall(call) => self.call_host(call),
            _ => match token.kind {
                TokenKind::Null => Ok(Value::Empty),
                TokenKind::Identifier => {
                    let name = token.to_string();
                    match self.env.get(&name) {
                        Some(binding) => self.get_value(&binding, requested),
                        None => Ok(Value::Text(name)),
                    }
                }
                _ => Ok(Value::Text(token.to_string())),
            },
        }
    }

    /// Read a binding, converting instances to the requested type.
    ///
    /// Primitive values come back unchanged. An instance of a primitive
    /// `typeof` class yields its value property unless the class itself is
    /// requested; other instances go through a `get` converter when a
    /// different type is requested.
    pub(crate) fn get_value(&mut self, binding: &Binding, requested: Option<&DataType>) -> Result<Value> {
        let Value::Instance(instance) = &binding.value else {
            return Ok(binding.value.clone());
        };
        let class = instance.borrow().class.clone();
        let requested = requested.filter(|data_type| !data_type.is_untyped());

        if let Some(target) = requested {
            if self.instance_satisfies(&class, target) {
                return Ok(binding.value.clone());
            }
        }

        if let Some(tag) = primitive_type_of(&class) {
            let raw = instance
                .borrow()
                .primitive_property()
                .map(|property| property.value.clone())
                .unwrap_or_default();
            let value = raw.coerce(tag)?;
            return match requested {
                Some(target) if target.class.is_none() && target.tag.is_primitive() => {
                    value.coerce(target.tag)
                }
                _ => Ok(value),
            };
        }

        match requested {
            None => Ok(binding.value.clone()),
            Some(target) => self.convert_instance(instance, &class, target),
        }
    }

    fn convert_instance(
        &mut self,
        instance: &InstanceRef,
        class: &Rc<Class>,
        target: &DataType,
    ) -> Result<Value> {
        let Some(converter) = class.converter(target) else {
            return Err(RuntimeError::MissingConverter {
                class: class.name.clone(),
                target: target.to_string(),
            });
        };
        let method = converter.method.clone();
        let value = self.invoke(&method, Some(instance.clone()), Vec::new())?;
        if target.tag.is_primitive() && target.class.is_none() {
            value.coerce(target.tag)
        } else {
            Ok(value)
        }
    }

    /// The instance already is the requested type: same class, container member or plain object
    pub(crate) fn instance_satisfies(&self, class: &Class, target: &DataType) -> bool {
        if let Some(name) = &target.class {
            return name == &class.name;
        }
        if let Some(name) = &target.container {
            return self.container_holds(name, &class.name);
        }
        target.tag == TypeTag::Object
    }

    pub(crate) fn container_holds(&self, container: &str, class: &str) -> bool {
        self.containers
            .get(container)
            .is_some_and(|container| container.classes.iter().any(|name| name == class))
    }

    /// Whether a value may fill a slot of the declared type
    pub(crate) fn compatible(&self, declared: &DataType, value: &Value) -> bool {
        if declared.is_untyped() {
            return true;
        }
        if declared.class.is_some() || declared.container.is_some() {
            return match value {
                Value::Instance(instance) => self.instance_satisfies(&instance.borrow().class, declared),
                _ => false,
            };
        }
        match declared.tag {
            TypeTag::Untyped => true,
            TypeTag::Object => matches!(value, Value::Instance(_)),
            TypeTag::String => !matches!(value, Value::Instance(_)),
            TypeTag::Char => value.to_text().chars().count() == 1,
            tag => {
                let found = value.type_tag();
                found == tag || widens(found, tag)
            }
        }
    }

    /// Whether an argument may bind to a method parameter.
    ///
    /// A primitive parameter needs the argument's type tag to equal its own.
    /// Single-character text fills a `@char` parameter.
    pub(crate) fn accepts_argument(&self, declared: &DataType, value: &Value) -> bool {
        if declared.is_untyped() || declared.class.is_some() || declared.container.is_some() {
            return self.compatible(declared, value);
        }
        let found = value.type_tag();
        match declared.tag {
            TypeTag::Untyped => true,
            TypeTag::Char => {
                found == TypeTag::Char
                    || (found == TypeTag::String && value.to_text().chars().count() == 1)
            }
            tag => found == tag,
        }
    }

    /// Check a value against a declared slot type and coerce primitives
    pub(crate) fn conform(&self, declared: &DataType, value: Value) -> Result<Value> {
        if !self.compatible(declared, &value) {
            return Err(RuntimeError::type_error(declared.to_string(), value.to_text()));
        }
        match typed(declared) {
            Some(data_type) if data_type.class.is_none() && data_type.container.is_none() => {
                value.coerce(data_type.tag)
            }
            _ => Ok(value),
        }
    }

    /// Fold the terms of a condition left to right with their `and`/`or` joins
    pub(crate) fn eval_condition(&mut self, condition: &Condition) -> Result<bool> {
        let mut result: Option<bool> = None;
        let mut join: Option<Join> = None;
        for term in &condition.terms {
            let mut value = self.evaluate_expression(&term.tokens, None)?.truth()?;
            if term.negated {
                value = !value;
            }
            result = Some(match (result, join) {
                (Some(acc), Some(Join::And)) => acc && value,
                (Some(acc), Some(Join::Or)) => acc || value,
                _ => value,
            });
            join = term.join;
        }
        result.ok_or_else(|| RuntimeError::syntax("Empty condition"))
    }

    /// A loop argument that is a single numeric token gives a pass count
    pub(crate) fn loop_count(&mut self, condition: &Condition) -> Result<Option<u64>> {
        let [term] = condition.terms.as_slice() else {
            return Ok(None);
        };
        let [token] = term.tokens.as_slice() else {
            return Ok(None);
        };
        if term.negated || !token.is(TokenKind::Identifier) {
            return Ok(None);
        }
        let name = token.to_string();
        if self.find_method(&name).is_some() || self.classes.contains_key(&name) {
            return Ok(None);
        }

        let value = self.resolve_token(token, None)?;
        if matches!(value, Value::Instance(_)) || !value.type_tag().is_numeric() {
            return Ok(None);
        }
        let Some(number) = value.as_f64() else {
            return Ok(None);
        };
        if number.fract() != 0.0 {
            return Err(RuntimeError::type_error("int", value.to_text()));
        }
        Ok(Some(number.max(0.0) as u64))
    }
}

fn primitive_type_of(class: &Class) -> Option<TypeTag> {
    class
        .type_of
        .as_ref()
        .filter(|data_type| data_type.tag.is_primitive() && data_type.class.is_none())
        .map(|data_type| data_type.tag)
}

/// Implicit numeric widening accepted for typed property and variable slots
fn widens(from: TypeTag, to: TypeTag) -> bool {
    use TypeTag::*;
    matches!(
        (from, to),
        (Int, Long | UInt | ULong | Float | Double | Decimal)
            | (UInt, ULong | Long | Float | Double | Decimal)
            | (Long | ULong, Float | Double | Decimal)
            | (Float, Double | Decimal)
            | (Double, Decimal)
            | (Decimal, Double)
    )
}

/// Rebuild source-like text from tokens: spaces between words, none before `,` or `:`
pub(crate) fn tokens_text(tokens: &[Token]) -> String {
    let mut text = String::new();
    for token in tokens {
        let part = token.to_string();
        let tight = token.is(TokenKind::Comma) || token.is(TokenKind::Colon);
        if !text.is_empty() && !tight {
            text.push(' ');
        }
        text.push_str(&part);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezcode_parser::lexer::tokenize_code;

    #[test]
    fn test_tokens_text() {
        assert_eq!(tokens_text(&tokenize_code("3 , 4")), "3, 4");
        assert_eq!(tokens_text(&tokenize_code("x : 1, y : 2")), "x: 1, y: 2");
    }

    #[test]
    fn test_widening() {
        assert!(widens(TypeTag::Int, TypeTag::Float));
        assert!(widens(TypeTag::Int, TypeTag::Long));
        assert!(!widens(TypeTag::Float, TypeTag::Int));
        assert!(!widens(TypeTag::String, TypeTag::Int));
    }

    #[test]
    fn test_compatibility_rules() {
        let interpreter = Interpreter::new();
        let int = DataType::primitive(TypeTag::Int);
        let string = DataType::primitive(TypeTag::String);
        assert!(interpreter.compatible(&int, &Value::text("5")));
        assert!(!interpreter.compatible(&int, &Value::text("five")));
        assert!(interpreter.compatible(&string, &Value::Int(5)));
        assert!(interpreter.compatible(&DataType::UNTYPED, &Value::Empty));
        assert!(interpreter.compatible(&DataType::primitive(TypeTag::Float), &Value::text("5")));
        assert!(!interpreter.compatible(&DataType::class(TypeTag::Object, "Point"), &Value::text("p")));
    }

    #[test]
    fn test_arguments_need_matching_tags() {
        let interpreter = Interpreter::new();
        let int = DataType::primitive(TypeTag::Int);
        let string = DataType::primitive(TypeTag::String);
        let float = DataType::primitive(TypeTag::Float);
        let char = DataType::primitive(TypeTag::Char);
        assert!(interpreter.accepts_argument(&int, &Value::text("5")));
        assert!(!interpreter.accepts_argument(&string, &Value::text("5")));
        assert!(!interpreter.accepts_argument(&string, &Value::Int(5)));
        assert!(interpreter.accepts_argument(&string, &Value::text("five")));
        assert!(!interpreter.accepts_argument(&float, &Value::text("5")));
        assert!(interpreter.accepts_argument(&float, &Value::text("5.5")));
        assert!(!interpreter.accepts_argument(&DataType::primitive(TypeTag::Long), &Value::Int(5)));
        assert!(interpreter.accepts_argument(&char, &Value::text("c")));
        assert!(!interpreter.accepts_argument(&char, &Value::text("cd")));
        assert!(interpreter.accepts_argument(&DataType::UNTYPED, &Value::Int(5)));
        assert!(!interpreter.accepts_argument(&DataType::class(TypeTag::Object, "Point"), &Value::text("p")));
    }
}
