//! Acceptance tests for the EZCode interpreter
//!
//! Each module drives source text through an `InterpreterSession`, the same
//! parser → interpreter pipeline the CLI and REPL use.

pub mod test_acceptance_host_calls;
pub mod test_acceptance_loops;
pub mod test_acceptance_methods;

/// A `print` method forwarding to the host print function
pub const PRINT: &str = "method print : text\nrunexec => EZCode.print ~> text\n";
