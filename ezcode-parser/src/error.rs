// EZCode Parser Error Handling
// Structural errors with line numbers and miette diagnostics

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while building structural objects out of source lines
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Expected a name after '{keyword}' on line {line}")]
    #[diagnostic(
        code(ezcode::parse::missing_name),
        help("Declarations look like '{keyword} Name'")
    )]
    MissingName { keyword: String, line: usize },

    #[error("Block opened on line {line} is never closed")]
    #[diagnostic(
        code(ezcode::parse::unclosed_block),
        help("Every '{{' needs a matching '}}'")
    )]
    UnclosedBlock { line: usize },

    #[error("'{construct}' on line {line} has no body")]
    #[diagnostic(
        code(ezcode::parse::missing_body),
        help("Use ': <line>', a following line, or a '{{ }}' block")
    )]
    MissingBody { construct: String, line: usize },

    #[error("Expected '{{' to open the body of '{construct}' on line {line}")]
    #[diagnostic(code(ezcode::parse::expected_brace))]
    ExpectedBrace { construct: String, line: usize },

    #[error("'{keyword}' on line {line} requires a condition")]
    #[diagnostic(code(ezcode::parse::missing_condition))]
    MissingCondition { keyword: String, line: usize },

    #[error("Invalid parameter '{text}' on line {line}")]
    #[diagnostic(
        code(ezcode::parse::invalid_parameter),
        help("Parameters are 'name' or '@type : name', separated by commas")
    )]
    InvalidParameter { text: String, line: usize },

    #[error("Invalid property declaration '{text}' on line {line}")]
    #[diagnostic(
        code(ezcode::parse::invalid_property),
        help("Properties are '<Type> <name> new [: value]' or 'undefined <name>'")
    )]
    InvalidProperty { text: String, line: usize },

    #[error("'{text}' on line {line} is not a valid class member")]
    #[diagnostic(code(ezcode::parse::invalid_class_member))]
    InvalidClassMember { text: String, line: usize },

    #[error("Pattern rule on line {line} targets unknown method '{method}'")]
    #[diagnostic(
        code(ezcode::parse::unknown_pattern_method),
        help("Declare the method before the rule that binds to it")
    )]
    UnknownPatternMethod { method: String, line: usize },

    #[error("Invalid pattern '{pattern}' on line {line}: {message}")]
    #[diagnostic(code(ezcode::parse::invalid_pattern))]
    InvalidPattern {
        pattern: String,
        message: String,
        line: usize,
    },

    #[error("Container '{container}' on line {line} names unknown class '{name}'")]
    #[diagnostic(code(ezcode::parse::unknown_container_member))]
    UnknownContainerMember {
        container: String,
        name: String,
        line: usize,
    },

    #[error("Invalid macro on line {line}: {message}")]
    #[diagnostic(
        code(ezcode::parse::invalid_macro),
        help("Macros look like 'make <take> => <replace>'")
    )]
    InvalidMacro { message: String, line: usize },

    #[error("Invalid host call on line {line}: {message}")]
    #[diagnostic(
        code(ezcode::parse::invalid_host_call),
        help("Host calls look like 'runexec => Path.To.Function ~> arg, arg'")
    )]
    InvalidHostCall { message: String, line: usize },
}

impl ParseError {
    /// Line the error was raised on
    pub fn line(&self) -> usize {
        match self {
            ParseError::MissingName { line, .. }
            | ParseError::UnclosedBlock { line }
            | ParseError::MissingBody { line, .. }
            | ParseError::ExpectedBrace { line, .. }
            | ParseError::MissingCondition { line, .. }
            | ParseError::InvalidParameter { line, .. }
            | ParseError::InvalidProperty { line, .. }
            | ParseError::InvalidClassMember { line, .. }
            | ParseError::UnknownPatternMethod { line, .. }
            | ParseError::InvalidPattern { line, .. }
            | ParseError::UnknownContainerMember { line, .. }
            | ParseError::InvalidMacro { line, .. }
            | ParseError::InvalidHostCall { line, .. } => *line,
        }
    }

    pub fn missing_name(keyword: impl Into<String>, line: usize) -> Self {
        ParseError::MissingName {
            keyword: keyword.into(),
            line,
        }
    }

    pub fn missing_body(construct: impl Into<String>, line: usize) -> Self {
        ParseError::MissingBody {
            construct: construct.into(),
            line,
        }
    }

    pub fn expected_brace(construct: impl Into<String>, line: usize) -> Self {
        ParseError::ExpectedBrace {
            construct: construct.into(),
            line,
        }
    }

    pub fn invalid_parameter(text: impl Into<String>, line: usize) -> Self {
        ParseError::InvalidParameter {
            text: text.into(),
            line,
        }
    }

    pub fn invalid_property(text: impl Into<String>, line: usize) -> Self {
        ParseError::InvalidProperty {
            text: text.into(),
            line,
        }
    }

    pub fn invalid_pattern(
        pattern: impl Into<String>,
        message: impl Into<String>,
        line: usize,
    ) -> Self {
        ParseError::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
            line,
        }
    }

    pub fn invalid_macro(message: impl Into<String>, line: usize) -> Self {
        ParseError::InvalidMacro {
            message: message.into(),
            line,
        }
    }

    pub fn invalid_host_call(message: impl Into<String>, line: usize) -> Self {
        ParseError::InvalidHostCall {
            message: message.into(),
            line,
        }
    }
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;
