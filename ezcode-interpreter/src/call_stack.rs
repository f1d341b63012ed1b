//! Call stack tracking for error traces
//!
//! Every executed line, method call and host call pushes a frame while it runs.
//! When an error escapes, the frames still on the stack become its trace,
//! innermost first. Only method frames count against the depth limit.

use crate::error::{Result, RuntimeError};
use std::fmt;

/// Default maximum number of nested method calls
pub const MAX_CALL_DEPTH: usize = 256;

/// Grow the native stack when less than this remains
const RED_ZONE: usize = 256 * 1024;

/// Size of each stack segment added on growth
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Run `f` with enough native stack for another level of line or method nesting.
///
/// Evaluation recurses on the native stack once per nested line, so deep
/// method recursion must reach the depth limit without overflowing the thread.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackFrame {
    CodeLine {
        text: String,
        file: String,
        line: usize,
    },
    Method {
        name: String,
        file: String,
        line: usize,
    },
    HostMethod {
        path: String,
        file: String,
        line: usize,
    },
}

impl StackFrame {
    fn is_method(&self) -> bool {
        matches!(self, StackFrame::Method { .. })
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackFrame::CodeLine { text, file, line } => {
                write!(f, "codeline: \"{text}\", file: \"{file}\", line: {line}")
            }
            StackFrame::Method { name, file, line } => {
                write!(f, "method: {name}, file: {file}, line: {line}")
            }
            StackFrame::HostMethod { path, file, line } => {
                write!(f, "host-method: \"{path}\", file: {file}, line: {line}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<StackFrame>,
    method_depth: usize,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            method_depth: 0,
            max_depth,
        }
    }

    pub fn push(&mut self, frame: StackFrame) -> Result<()> {
        if frame.is_method() {
            if self.method_depth >= self.max_depth {
                return Err(RuntimeError::StackOverflow {
                    max_depth: self.max_depth,
                });
            }
            self.method_depth += 1;
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<StackFrame> {
        let frame = self.frames.pop()?;
        if frame.is_method() {
            self.method_depth -= 1;
        }
        Some(frame)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn method_depth(&self) -> usize {
        self.method_depth
    }

    /// Rendered frames, innermost first
    pub fn trace(&self) -> Vec<String> {
        self.frames.iter().rev().map(|frame| frame.to_string()).collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.method_depth = 0;
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new(MAX_CALL_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str) -> StackFrame {
        StackFrame::Method {
            name: name.to_string(),
            file: "main".to_string(),
            line: 1,
        }
    }

    #[test]
    fn test_frame_formats() {
        let line = StackFrame::CodeLine {
            text: "print : x".to_string(),
            file: "main".to_string(),
            line: 3,
        };
        assert_eq!(line.to_string(), "codeline: \"print : x\", file: \"main\", line: 3");
        assert_eq!(method("add").to_string(), "method: add, file: main, line: 1");
        let host = StackFrame::HostMethod {
            path: "EZCode.print".to_string(),
            file: "main".to_string(),
            line: 2,
        };
        assert_eq!(host.to_string(), "host-method: \"EZCode.print\", file: main, line: 2");
    }

    #[test]
    fn test_trace_is_innermost_first() {
        let mut stack = CallStack::default();
        stack.push(method("outer")).unwrap();
        stack.push(method("inner")).unwrap();
        let trace = stack.trace();
        assert!(trace[0].contains("inner"));
        assert!(trace[1].contains("outer"));
    }

    #[test]
    fn test_only_method_frames_count_toward_depth() {
        let mut stack = CallStack::new(1);
        stack
            .push(StackFrame::CodeLine {
                text: "x".to_string(),
                file: "main".to_string(),
                line: 1,
            })
            .unwrap();
        stack.push(method("f")).unwrap();
        match stack.push(method("g")) {
            Err(RuntimeError::StackOverflow { max_depth }) => assert_eq!(max_depth, 1),
            other => panic!("Expected StackOverflow, got {other:?}"),
        }
        stack.pop();
        assert_eq!(stack.method_depth(), 0);
        assert!(stack.push(method("g")).is_ok());
    }
}
