//! Interpreter session for the EZCode interpreter
//!
//! A session keeps one parser and one interpreter alive across inputs, so
//! classes, methods, watch rules and variables persist between evaluations.
//! It backs the REPL and the acceptance tests.

use crate::context::{InterpreterConfig, RunReport};
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::value::{Binding, Value};
use ezcode_parser::{DataType, EzParser, ParseError};
use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur during session operations
#[derive(Debug, Error, Diagnostic)]
pub enum TestHarnessError {
    #[error("Parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("Runtime error: {source}")]
    Runtime {
        #[from]
        source: RuntimeError,
    },

    #[error("Assertion failed: expected {expected}, but got {actual}")]
    AssertionFailed { expected: String, actual: String },

    #[error("Setup error: {message}")]
    Setup { message: String },

    #[error("Type error: expected {expected_type}, got {actual_type}")]
    TypeError {
        expected_type: String,
        actual_type: String,
    },

    #[error("Variable not found: {name}")]
    VariableNotFound { name: String },
}

/// Interpreter session for evaluating EZCode snippets
#[derive(Debug)]
pub struct InterpreterSession {
    parser: EzParser,
    interpreter: Interpreter,
}

impl InterpreterSession {
    pub fn new() -> Result<Self, TestHarnessError> {
        Ok(Self::with_config(InterpreterConfig::default()))
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self {
            parser: EzParser::new(),
            interpreter: Interpreter::with_config(config),
        }
    }

    /// Parse and execute code, returning the value of the last line.
    ///
    /// Stops at the first error. Output written by the code stays in the
    /// session until [`take_output`](Self::take_output).
    pub fn evaluate(&mut self, code: &str) -> Result<Value, TestHarnessError> {
        let program = self.parser.parse_program(code)?;
        self.interpreter.load(&program);
        Ok(self.interpreter.execute(&program.lines)?)
    }

    /// Parse and run code as a complete program with fault-isolated top-level lines
    pub fn run(&mut self, code: &str) -> Result<RunReport, TestHarnessError> {
        let program = self.parser.parse_program(code)?;
        Ok(self.interpreter.run(&program))
    }

    pub fn assert_evaluates_to_text(
        &mut self,
        code: &str,
        expected: &str,
    ) -> Result<(), TestHarnessError> {
        let actual = self.evaluate(code)?.to_text();
        if actual == expected {
            Ok(())
        } else {
            Err(TestHarnessError::AssertionFailed {
                expected: expected.to_string(),
                actual,
            })
        }
    }

    pub fn assert_evaluates_to_integer(
        &mut self,
        code: &str,
        expected: i64,
    ) -> Result<(), TestHarnessError> {
        let result = self.evaluate(code)?;
        match result.as_i64() {
            Some(value) if value == expected => Ok(()),
            Some(value) => Err(TestHarnessError::AssertionFailed {
                expected: expected.to_string(),
                actual: value.to_string(),
            }),
            None => Err(TestHarnessError::TypeError {
                expected_type: "int".to_string(),
                actual_type: result.type_name(),
            }),
        }
    }

    pub fn assert_evaluates_to_boolean(
        &mut self,
        code: &str,
        expected: bool,
    ) -> Result<(), TestHarnessError> {
        let result = self.evaluate(code)?;
        match result.truth() {
            Ok(value) if value == expected => Ok(()),
            Ok(value) => Err(TestHarnessError::AssertionFailed {
                expected: expected.to_string(),
                actual: value.to_string(),
            }),
            Err(_) => Err(TestHarnessError::TypeError {
                expected_type: "bool".to_string(),
                actual_type: result.type_name(),
            }),
        }
    }

    /// Declare a global variable for subsequent evaluations
    pub fn define_variable(&mut self, name: &str, value: Value) -> Result<(), TestHarnessError> {
        self.interpreter
            .env
            .declare(Binding::new(name, value, DataType::UNTYPED, 0))
            .map_err(|e| TestHarnessError::Setup {
                message: format!("Failed to define variable '{name}': {e}"),
            })
    }

    pub fn get_variable(&self, name: &str) -> Result<Value, TestHarnessError> {
        self.interpreter
            .variable(name)
            .ok_or_else(|| TestHarnessError::VariableNotFound {
                name: name.to_string(),
            })
    }

    /// Forget all variables. Declarations stay known.
    pub fn clear_variables(&mut self) {
        self.interpreter.reset_variables();
    }

    /// Drain the output written since the last call
    pub fn take_output(&mut self) -> Vec<String> {
        self.interpreter.take_output()
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn parser(&self) -> &EzParser {
        &self.parser
    }
}

impl Default for InterpreterSession {
    fn default() -> Self {
        Self::with_config(InterpreterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        assert!(InterpreterSession::new().is_ok());
    }

    #[test]
    fn test_variable_declaration_and_read() {
        let mut session = InterpreterSession::new().unwrap();
        let value = session.evaluate("undefined x => 42").unwrap();
        assert_eq!(value, Value::text("42"));
        session.assert_evaluates_to_integer("x", 42).unwrap();
        session.assert_evaluates_to_text("x", "42").unwrap();
    }

    #[test]
    fn test_context_management() {
        let mut session = InterpreterSession::new().unwrap();
        session
            .define_variable("flag", Value::text("yes"))
            .unwrap();
        assert_eq!(session.get_variable("flag").unwrap(), Value::text("yes"));
        session.assert_evaluates_to_boolean("flag", true).unwrap();

        session.clear_variables();
        assert!(session.get_variable("flag").is_err());
    }

    #[test]
    fn test_error_handling() {
        let mut session = InterpreterSession::new().unwrap();
        match session.evaluate("if {") {
            Err(TestHarnessError::Parse { .. }) => {}
            other => panic!("Expected Parse error, got {other:?}"),
        }
        match session.evaluate("nonexistent") {
            Err(TestHarnessError::Runtime { .. }) => {}
            other => panic!("Expected Runtime error, got {other:?}"),
        }
        assert!(session.assert_evaluates_to_integer("undefined word => hello", 1).is_err());
    }

    #[test]
    fn test_output_is_drained() {
        let mut session = InterpreterSession::new().unwrap();
        session.evaluate("runexec => EZCode.print ~> hi").unwrap();
        assert_eq!(session.take_output(), vec!["hi".to_string()]);
        assert!(session.take_output().is_empty());
    }
}
