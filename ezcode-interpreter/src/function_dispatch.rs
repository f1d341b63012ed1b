//! Call dispatch: user methods, class instantiation, watch-pattern calls and host calls.
//!
//! Arguments are always evaluated in the caller's scope before any frame for
//! the callee is pushed. Methods called on an instance run with an instance
//! frame beneath their call frame, so property reads and writes go straight
//! to the instance.

use crate::call_stack::{StackFrame, ensure_sufficient_stack};
use crate::context::Flow;
use crate::environment::FrameKind;
use crate::error::{Result, RuntimeError};
use crate::interpreter::{Interpreter, typed};
use crate::value::{Binding, Instance, InstanceRef, Value};
use ezcode_parser::lexer::tokenize_code;
use ezcode_parser::{
    BoundArg, BoundCall, Class, DataType, HostCall, Method, Token, TokenKind, TypeTag,
    parse_host_call,
};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::debug;

impl Interpreter {
    /// Find a callable method by name: the running instance's class first, then global methods
    pub(crate) fn find_method(&self, name: &str) -> Option<(Rc<Method>, Option<InstanceRef>)> {
        if let Some(instance) = self.env.current_instance() {
            let local = instance.borrow().class.methods.get(name).cloned();
            if let Some(method) = local {
                return Some((method, Some(instance)));
            }
        }
        self.methods.get(name).cloned().map(|method| (method, None))
    }

    /// Resolve a type name against primitives, classes and containers
    pub(crate) fn lookup_type(&self, name: &str) -> Option<DataType> {
        let name = name.trim().trim_start_matches('@');
        if let Some(tag) = TypeTag::from_name(name) {
            return Some(DataType::primitive(tag));
        }
        if let Some(class) = self.classes.get(name) {
            return Some(class.instance_type());
        }
        self.containers
            .contains_key(name)
            .then(|| DataType::container(name))
    }

    /// Call a method with the tokens that follow its name
    pub(crate) fn call_method(
        &mut self,
        method: &Rc<Method>,
        instance: Option<InstanceRef>,
        tokens: &[Token],
    ) -> Result<Value> {
        let args = match tokens.first() {
            None => tokens,
            Some(token) if token.is(TokenKind::Colon) => &tokens[1..],
            Some(_) if method.settings.nocol => tokens,
            Some(token) => {
                return Err(RuntimeError::syntax(format!(
                    "Expected ':' after '{}', found '{token}'",
                    method.name
                )));
            }
        };

        let groups = split_args(args);
        self.check_count(method, groups.len())?;

        let mut values = Vec::with_capacity(groups.len());
        for (group, param) in groups.iter().zip(&method.params) {
            values.push(self.evaluate_expression(group, typed(&param.data_type))?);
        }
        self.invoke(method, instance, values)
    }

    fn check_count(&self, method: &Method, found: usize) -> Result<()> {
        let min = method.required_count();
        let max = method.params.len();
        if found < min || found > max {
            return Err(RuntimeError::ParameterCount {
                method: method.name.clone(),
                min,
                max,
                found,
            });
        }
        Ok(())
    }

    /// Bind evaluated arguments and run a method body.
    ///
    /// Missing optional parameters are bound empty. A primitive return type
    /// coerces the returned value.
    pub(crate) fn invoke(
        &mut self,
        method: &Rc<Method>,
        instance: Option<InstanceRef>,
        values: Vec<Value>,
    ) -> Result<Value> {
        self.check_count(method, values.len())?;

        let mut values = values.into_iter();
        let mut bindings = Vec::with_capacity(method.params.len());
        for param in &method.params {
            let value = match values.next() {
                Some(value) => self.bind_param(method, &param.name, &param.data_type, value)?,
                None => Value::Empty,
            };
            bindings.push(Binding {
                name: param.name.clone(),
                value,
                data_type: param.data_type.clone(),
                required: param.required,
                line: param.line,
            });
        }

        debug!(method = %method.name, instance = instance.is_some(), "invoke");
        let frame = StackFrame::Method {
            name: method.name.clone(),
            file: self.config.file_name.clone(),
            line: method.line,
        };
        let flow = ensure_sufficient_stack(|| {
            self.with_frame(frame, |this| match instance {
                Some(instance) => this.with_scope(FrameKind::Instance(instance), |this| {
                    this.run_method_body(method, bindings)
                }),
                None => this.run_method_body(method, bindings),
            })
        })?;

        let value = flow.value();
        match &method.returns {
            Some(returns) if !value.is_empty() && returns.class.is_none() && returns.tag.is_primitive() => {
                value.coerce(returns.tag)
            }
            _ => Ok(value),
        }
    }

    fn run_method_body(
        &mut self,
        method: &Method,
        bindings: Vec<Binding>,
    ) -> Result<Flow> {
        self.with_scope(FrameKind::Call, |this| {
            for binding in bindings {
                this.env.bind(binding);
            }
            this.run_body(&method.body)
        })
    }

    fn bind_param(
        &self,
        method: &Method,
        param: &str,
        declared: &DataType,
        value: Value,
    ) -> Result<Value> {
        let mismatch = |value: &Value| RuntimeError::ParameterType {
            method: method.name.clone(),
            param: param.to_string(),
            expected: declared.to_string(),
            found: value.type_name(),
        };
        if !self.accepts_argument(declared, &value) {
            return Err(mismatch(&value));
        }
        match typed(declared) {
            Some(data_type) if data_type.class.is_none() && data_type.container.is_none() => {
                value.coerce(data_type.tag).map_err(|_| mismatch(&value))
            }
            _ => Ok(value),
        }
    }

    /// `<Class> <name> new [: init]` or `<Class> <static method> [: args]`
    pub(crate) fn class_line(
        &mut self,
        class: Rc<Class>,
        rest: &[Token],
        init: Option<String>,
        line: usize,
    ) -> Result<Value> {
        match rest {
            [name, new, ..] if name.is(TokenKind::Identifier) && new.is(TokenKind::New) => {
                self.instantiate(class, &name.to_string(), init.as_deref(), line)
            }
            [name, ..] if name.is(TokenKind::Identifier) => {
                let method_name = name.to_string();
                match class.methods.get(&method_name).cloned() {
                    Some(method) if method.settings.is_static => {
                        self.call_method(&method, None, &rest[1..])
                    }
                    Some(_) => Err(RuntimeError::declaration(format!(
                        "'{}.{method_name}' is not static; call it on an instance",
                        class.name
                    ))),
                    None => Err(RuntimeError::declaration(format!(
                        "Expected '{} {method_name} new'",
                        class.name
                    ))),
                }
            }
            _ => Err(RuntimeError::declaration(format!(
                "Expected '{} <name> new'",
                class.name
            ))),
        }
    }

    /// Create an instance bound to `name`. Re-instantiating an instance of the same class re-initialises it.
    pub(crate) fn instantiate(
        &mut self,
        class: Rc<Class>,
        name: &str,
        init: Option<&str>,
        line: usize,
    ) -> Result<Value> {
        self.check_name_free(name)?;
        if class.settings.is_static {
            return Err(RuntimeError::declaration(format!(
                "Static class '{}' cannot be instantiated",
                class.name
            )));
        }
        self.check_inside_of(&class)?;

        let existing = self.env.get(name);
        if let Some(binding) = &existing {
            let same_class = binding
                .value
                .as_instance()
                .is_some_and(|instance| instance.borrow().class.name == class.name);
            if !same_class {
                return Err(RuntimeError::declaration(format!(
                    "'{name}' is already declared"
                )));
            }
        }

        let value = self.construct(&class, init)?;
        match existing {
            Some(_) => self.env.assign(name, value.clone())?,
            None => self.env.declare(Binding::new(
                name,
                value.clone(),
                class.instance_type(),
                line,
            ))?,
        }
        debug!(class = %class.name, name, "instantiated");
        Ok(value)
    }

    fn check_inside_of(&self, class: &Class) -> Result<()> {
        if class.inside_of.is_empty() {
            return Ok(());
        }
        let allowed = self.env.current_instance().is_some_and(|instance| {
            let owner = instance.borrow().class.clone();
            class
                .inside_of
                .iter()
                .any(|data_type| self.instance_satisfies(&owner, data_type))
        });
        if allowed {
            return Ok(());
        }
        let owners = class
            .inside_of
            .iter()
            .map(|data_type| data_type.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(RuntimeError::declaration(format!(
            "'{}' can only be created inside of {owners}",
            class.name
        )))
    }

    /// Build and initialise an instance.
    ///
    /// Initialiser text matching the class's `params` pattern calls the rule's
    /// method on the new instance. Otherwise it is read as `Prop:Value` pairs,
    /// which an `override` rule forbids.
    pub(crate) fn construct(&mut self, class: &Rc<Class>, init: Option<&str>) -> Result<Value> {
        let instance = self.new_instance(class)?;
        let Some(init) = init.map(str::trim).filter(|text| !text.is_empty()) else {
            return Ok(Value::Instance(instance));
        };

        let matched = class.params.as_ref().and_then(|rule| {
            rule.pattern.match_full(init).map(|found| {
                let args = rule.bind(&found, &|name: &str| self.lookup_type(name));
                (rule.method.clone(), args)
            })
        });

        match matched {
            Some((method_name, args)) => {
                let method = class
                    .methods
                    .get(&method_name)
                    .cloned()
                    .or_else(|| self.methods.get(&method_name).cloned())
                    .ok_or_else(|| RuntimeError::MissingMethod {
                        owner: class.name.clone(),
                        method: method_name.clone(),
                    })?;
                let values = self.resolve_bound_args(&args)?;
                self.invoke(&method, Some(instance.clone()), values)?;
            }
            None if class.params.as_ref().is_some_and(|rule| rule.is_override) => {
                return Err(RuntimeError::declaration(format!(
                    "'{init}' does not match the parameters of '{}'",
                    class.name
                )));
            }
            None => self.assign_properties(&instance, init)?,
        }
        Ok(Value::Instance(instance))
    }

    /// A fresh instance with every property at its default
    pub(crate) fn new_instance(&mut self, class: &Rc<Class>) -> Result<InstanceRef> {
        let mut properties = IndexMap::new();
        for property in &class.properties {
            let value = match &property.default {
                Some(text) => self.property_default(&property.data_type, text)?,
                None => Value::Empty,
            };
            properties.insert(
                property.name.clone(),
                Binding {
                    name: property.name.clone(),
                    value,
                    data_type: property.data_type.clone(),
                    required: property.required,
                    line: property.line,
                },
            );
        }
        Ok(Instance::new_ref(class.clone(), properties))
    }

    fn property_default(&mut self, data_type: &DataType, text: &str) -> Result<Value> {
        if let Some(class) = data_type
            .class
            .as_ref()
            .and_then(|name| self.classes.get(name).cloned())
        {
            if class.type_of.is_none() {
                return self.construct(&class, Some(text));
            }
        }
        let value = self.evaluate_expression(&tokenize_code(text), typed(data_type))?;
        self.conform(data_type, value)
    }

    fn assign_properties(&mut self, instance: &InstanceRef, init: &str) -> Result<()> {
        let class_name = instance.borrow().class.name.clone();
        for entry in init.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let Some((name, text)) = entry.split_once(':') else {
                return Err(RuntimeError::declaration(format!(
                    "Expected 'Property:Value' in '{class_name}' initialiser, found '{entry}'"
                )));
            };
            let name = name.trim();
            let declared = instance
                .borrow()
                .properties
                .get(name)
                .map(|property| property.data_type.clone())
                .ok_or_else(|| {
                    RuntimeError::declaration(format!("'{class_name}' has no property '{name}'"))
                })?;

            let value = self.evaluate_expression(&tokenize_code(text.trim()), typed(&declared))?;
            let value = self.conform(&declared, value)?;
            if let Some(property) = instance.borrow_mut().properties.get_mut(name) {
                property.value = value;
            }
        }
        Ok(())
    }

    /// Capture texts naming a variable read it; anything else is literal text
    fn resolve_bound_args(&mut self, args: &[BoundArg]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let value = match self.env.get(&arg.text) {
                Some(binding) => self.get_value(&binding, typed(&arg.data_type))?,
                None => Value::Text(arg.text.clone()),
            };
            values.push(value);
        }
        Ok(values)
    }

    /// Run a watch-pattern call on a fresh instance of the rule's class
    pub(crate) fn call_bound(&mut self, call: &BoundCall) -> Result<Value> {
        let class = self
            .classes
            .get(&call.class_name)
            .cloned()
            .ok_or_else(|| RuntimeError::undefined(&call.class_name))?;
        let method = class
            .methods
            .get(&call.method)
            .cloned()
            .or_else(|| self.methods.get(&call.method).cloned())
            .ok_or_else(|| RuntimeError::MissingMethod {
                owner: class.name.clone(),
                method: call.method.clone(),
            })?;

        let values = self.resolve_bound_args(&call.args)?;
        debug!(class = %class.name, method = %method.name, source = %call.source, "watch match");
        let instance = self.new_instance(&class)?;
        self.invoke(&method, Some(instance), values)
    }

    /// Evaluate the arguments of a host call and hand them to the registry
    pub(crate) fn call_host(&mut self, call: &HostCall) -> Result<Value> {
        let call = if call.is_dynamic {
            let name = call.variable_name();
            let binding = self.env.get(name).ok_or_else(|| RuntimeError::undefined(name))?;
            let text = binding.value.to_text();
            match parse_host_call(&text) {
                Some(resolved) if !resolved.is_dynamic => resolved,
                _ => {
                    return Err(RuntimeError::Host {
                        path: call.path.clone(),
                        message: format!("'{text}' is not a host call"),
                    });
                }
            }
        } else {
            call.clone()
        };

        let mut values = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            values.push(self.evaluate_expression(&tokenize_code(arg), None)?);
        }

        debug!(path = %call.path, args = values.len(), "host call");
        let frame = StackFrame::HostMethod {
            path: call.path.clone(),
            file: self.config.file_name.clone(),
            line: self.current_line,
        };
        self.with_frame(frame, |this| {
            let result = this.host.call(&call.path, &mut this.host_context, &values);
            let output = std::mem::take(&mut this.host_context.output);
            this.output.extend(output);
            result.map_err(|error| RuntimeError::Host {
                path: call.path.clone(),
                message: error.to_string(),
            })
        })
    }
}

/// Split argument tokens at commas
fn split_args(tokens: &[Token]) -> Vec<&[Token]> {
    if tokens.is_empty() {
        return Vec::new();
    }
    tokens
        .split(|token| token.is(TokenKind::Comma))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args() {
        let tokens = tokenize_code("a, b c, d");
        let groups = split_args(&tokens);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].len(), 2);
        assert!(split_args(&[]).is_empty());
    }
}
