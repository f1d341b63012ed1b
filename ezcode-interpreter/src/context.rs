//! Runtime configuration and per-run bookkeeping for the EZCode interpreter.

use crate::call_stack::MAX_CALL_DEPTH;
use crate::error::RuntimeError;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Name reported in stack traces and the exit line
    pub file_name: String,
    /// Maximum number of nested method calls
    pub max_call_depth: usize,
    /// Also print each top-level error to stderr as it happens
    pub echo_errors: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            file_name: "main".to_string(),
            max_call_depth: MAX_CALL_DEPTH,
            echo_errors: false,
        }
    }
}

impl InterpreterConfig {
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

/// Links `if`/`elif`/`else` and `try`/`fail` within one body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    pub last_branch_taken: bool,
    /// Message of the error raised by the last `try`, consumed by `fail`
    pub pending_failure: Option<String>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            last_branch_taken: true,
            pending_failure: None,
        }
    }
}

/// How execution left a line or body
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Return(Value),
    Break,
    /// `yield break`: finish the current pass, then leave the loop
    YieldBreak,
}

impl Flow {
    pub fn value(self) -> Value {
        match self {
            Flow::Normal(value) | Flow::Return(value) => value,
            Flow::Break | Flow::YieldBreak => Value::Empty,
        }
    }
}

/// A top-level error with the trace captured where it was raised
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedError {
    pub error: RuntimeError,
    pub trace: Vec<String>,
    /// `<error>, StackTrace: ` followed by one tab-indented frame per line
    pub message: String,
}

impl ReportedError {
    pub fn new(error: RuntimeError, trace: Vec<String>) -> Self {
        let message = format!("{error}, StackTrace: \n\t{}", trace.join("\n\t"));
        Self {
            error,
            trace,
            message,
        }
    }
}

/// Everything a program run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub output: Vec<String>,
    pub errors: Vec<ReportedError>,
    pub status: i32,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The output log joined with newlines
    pub fn output_text(&self) -> String {
        self.output.join("\n")
    }
}
