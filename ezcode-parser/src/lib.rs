// EZCode Parser Library
// Line lexer, structural parser, pattern engine and macro rewrite for EZCode source

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod pattern;

pub use ast::*;
pub use diagnostics::*;
pub use error::*;
pub use lexer::{classify, split_parts, tokenize_line};
pub use parser::{split_lines, EzParser};
pub use pattern::{CaptureClass, Pattern, PatternMatch};

// Main parsing functions
pub fn parse_program(source: &str) -> ParseResult<Program> {
    EzParser::new().parse_program(source)
}

pub fn parse_program_with_diagnostics(source: &str) -> (Program, DiagnosticCollector) {
    EzParser::new().parse_program_with_diagnostics(source)
}

/// Parse the text of a dynamic host call. The leading `runexec` keyword is optional.
pub fn parse_host_call(text: &str) -> Option<HostCall> {
    let text = text.trim();
    let rest = match parser::find_word(text, "runexec") {
        Some(0) => &text["runexec".len()..],
        Some(_) => return None,
        None => text,
    };
    parser::parse_host_call_text(rest, 0).ok()
}

// Version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
