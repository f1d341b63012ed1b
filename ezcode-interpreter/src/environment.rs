//! Environment and scope management for the EZCode interpreter.
//!
//! Frames are kept on a stack, most recent last. Lookups walk from the top
//! frame down. Global, call and block frames see everything beneath them; an
//! instance frame exposes the instance's properties and stops the walk, so a
//! method running on an instance cannot see the caller's variables.

use crate::error::{Result, RuntimeError};
use crate::value::{Binding, InstanceRef, Value};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub enum FrameKind {
    Global,
    Call,
    Block,
    Instance(InstanceRef),
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    bindings: IndexMap<String, Binding>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            bindings: IndexMap::new(),
        }
    }
}

/// Variable environment with scope management
#[derive(Debug, Clone)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(FrameKind::Global)],
        }
    }

    pub fn push(&mut self, kind: FrameKind) {
        self.frames.push(Frame::new(kind));
    }

    /// Pop the most recent frame. The global frame is never popped.
    pub fn pop(&mut self) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(RuntimeError::custom("Cannot pop global scope"));
        }
        self.frames.pop();
        Ok(())
    }

    /// Current frame depth (0 = global only)
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn get(&self, name: &str) -> Option<Binding> {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.bindings.get(name) {
                return Some(binding.clone());
            }
            if let FrameKind::Instance(instance) = &frame.kind {
                return instance.borrow().properties.get(name).cloned();
            }
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Declare a binding in the top frame. Names are unique within a frame.
    pub fn declare(&mut self, binding: Binding) -> Result<()> {
        let frame = self.top_mut();
        if frame.bindings.contains_key(&binding.name) {
            return Err(RuntimeError::declaration(format!(
                "'{}' is already declared in this scope",
                binding.name
            )));
        }
        frame.bindings.insert(binding.name.clone(), binding);
        Ok(())
    }

    /// Declare `name` in the top frame, replacing any binding already there
    pub fn bind(&mut self, binding: Binding) {
        self.top_mut().bindings.insert(binding.name.clone(), binding);
    }

    /// Overwrite the value of the nearest visible binding
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(binding) = frame.bindings.get_mut(name) {
                binding.value = value;
                return Ok(());
            }
            if let FrameKind::Instance(instance) = &frame.kind {
                let mut instance = instance.borrow_mut();
                return match instance.properties.get_mut(name) {
                    Some(binding) => {
                        binding.value = value;
                        Ok(())
                    }
                    None => Err(RuntimeError::undefined(name)),
                };
            }
        }
        Err(RuntimeError::undefined(name))
    }

    /// The instance whose method is currently running, if any
    pub fn current_instance(&self) -> Option<InstanceRef> {
        self.frames.iter().rev().find_map(|frame| match &frame.kind {
            FrameKind::Instance(instance) => Some(instance.clone()),
            _ => None,
        })
    }

    /// Bindings of the global frame in declaration order
    pub fn globals(&self) -> Vec<Binding> {
        self.frames[0].bindings.values().cloned().collect()
    }

    /// Drop every frame and global binding
    pub fn clear(&mut self) {
        self.frames = vec![Frame::new(FrameKind::Global)];
    }

    fn top_mut(&mut self) -> &mut Frame {
        let index = self.frames.len() - 1;
        &mut self.frames[index]
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Instance;
    use ezcode_parser::{Class, ClassSettings, DataType};
    use indexmap::IndexMap;
    use std::rc::Rc;

    fn binding(name: &str, value: &str) -> Binding {
        Binding::new(name, Value::text(value), DataType::UNTYPED, 1)
    }

    fn instance_with(property: &str, value: &str) -> InstanceRef {
        let class = Rc::new(Class {
            name: "Box".to_string(),
            line: 1,
            settings: ClassSettings::default(),
            properties: Vec::new(),
            methods: IndexMap::new(),
            classes: Vec::new(),
            watch: Vec::new(),
            params: None,
            type_of: None,
            converters: Vec::new(),
            inside_of: Vec::new(),
            length: 2,
        });
        let mut properties = IndexMap::new();
        properties.insert(property.to_string(), binding(property, value));
        Instance::new_ref(class, properties)
    }

    #[test]
    fn test_block_frames_see_outer_bindings() {
        let mut env = Environment::new();
        env.declare(binding("x", "1")).unwrap();
        env.push(FrameKind::Block);
        assert_eq!(env.get("x").unwrap().value, Value::text("1"));
        env.assign("x", Value::text("2")).unwrap();
        env.pop().unwrap();
        assert_eq!(env.get("x").unwrap().value, Value::text("2"));
    }

    #[test]
    fn test_block_bindings_are_dropped_on_pop() {
        let mut env = Environment::new();
        env.push(FrameKind::Block);
        env.declare(binding("inner", "1")).unwrap();
        env.pop().unwrap();
        assert!(env.get("inner").is_none());
    }

    #[test]
    fn test_duplicate_declaration_in_same_frame() {
        let mut env = Environment::new();
        env.declare(binding("x", "1")).unwrap();
        match env.declare(binding("x", "2")) {
            Err(RuntimeError::Declaration { .. }) => {}
            other => panic!("Expected Declaration, got {other:?}"),
        }
        env.push(FrameKind::Block);
        assert!(env.declare(binding("x", "3")).is_ok());
    }

    #[test]
    fn test_instance_frame_is_a_lookup_barrier() {
        let mut env = Environment::new();
        env.declare(binding("outer", "1")).unwrap();
        let instance = instance_with("size", "3");
        env.push(FrameKind::Instance(instance.clone()));
        env.push(FrameKind::Call);

        assert!(env.get("outer").is_none());
        assert_eq!(env.get("size").unwrap().value, Value::text("3"));

        env.assign("size", Value::text("4")).unwrap();
        assert_eq!(
            instance.borrow().properties["size"].value,
            Value::text("4")
        );
        assert!(env.assign("outer", Value::Empty).is_err());
        assert!(env.current_instance().is_some());
    }

    #[test]
    fn test_global_frame_cannot_be_popped() {
        let mut env = Environment::new();
        assert!(env.pop().is_err());
        assert_eq!(env.depth(), 0);
    }
}
