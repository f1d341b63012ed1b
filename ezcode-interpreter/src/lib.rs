//! EZCode Interpreter
//!
//! Executes programs produced by `ezcode-parser`. The interpreter walks the
//! token lines directly: statements, method calls, class instantiation,
//! watch-pattern calls and `runexec` host calls. Runtime errors carry a stack
//! trace and never stop a program; each failing top-level line is reported
//! and execution continues with the next one.

#![allow(clippy::result_large_err)]

pub mod call_stack;
pub mod context;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod function_dispatch;
pub mod host;
pub mod interpreter;
pub mod test_harness;
pub mod value;

// Include tests directory with all test modules
#[cfg(test)]
#[path = "tests/mod.rs"]
pub mod tests;

// Re-export public API
pub use call_stack::{CallStack, MAX_CALL_DEPTH, StackFrame};
pub use context::{ChainState, Flow, InterpreterConfig, ReportedError, RunReport};
pub use environment::{Environment, FrameKind};
pub use error::RuntimeError;
pub use host::{HostContext, HostError, HostRegistry};
pub use interpreter::Interpreter;
pub use test_harness::{InterpreterSession, TestHarnessError};
pub use value::{Binding, Instance, InstanceRef, Value};

/// Run a parsed program with a fresh interpreter
pub fn run_program(program: &ezcode_parser::Program, config: InterpreterConfig) -> RunReport {
    Interpreter::with_config(config).run(program)
}

/// Parse and run source text. Structural errors drop their construct and are returned alongside the report.
pub fn run_source(
    source: &str,
    config: InterpreterConfig,
) -> (RunReport, ezcode_parser::DiagnosticCollector) {
    let (program, diagnostics) = ezcode_parser::parse_program_with_diagnostics(source);
    (run_program(&program, config), diagnostics)
}
