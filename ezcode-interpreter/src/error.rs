//! Runtime error types for the EZCode interpreter.
//!
//! Every construct handler wraps the errors of its inner lines with
//! [`RuntimeError::construct`], so a reported message reads outermost first.

use miette::Diagnostic;
use thiserror::Error;

/// Runtime errors that can occur during interpretation
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Could not find '{name}'")]
    #[diagnostic(
        code(ezcode::runtime::undefined_identifier),
        help("Declare variables with 'undefined <name>' before using them")
    )]
    UndefinedIdentifier { name: String },

    #[error("{message}")]
    #[diagnostic(code(ezcode::runtime::declaration))]
    Declaration { message: String },

    #[error("Method '{method}' expects between {min} and {max} arguments, found {found}")]
    #[diagnostic(
        code(ezcode::runtime::parameter_count),
        help("Optional parameters are marked with '?' in the method header")
    )]
    ParameterCount {
        method: String,
        min: usize,
        max: usize,
        found: usize,
    },

    #[error("Parameter '{param}' of '{method}' expects {expected}, found {found}")]
    #[diagnostic(code(ezcode::runtime::parameter_type))]
    ParameterType {
        method: String,
        param: String,
        expected: String,
        found: String,
    },

    #[error("'{owner}' has no method '{method}'")]
    #[diagnostic(code(ezcode::runtime::missing_method))]
    MissingMethod { owner: String, method: String },

    #[error("Could not convert '{value}' to {expected}")]
    #[diagnostic(code(ezcode::runtime::type_error))]
    TypeError { expected: String, value: String },

    #[error("Class '{class}' has no 'get' converter to {target}")]
    #[diagnostic(
        code(ezcode::runtime::missing_converter),
        help("Add 'get => @type' to the class to allow the conversion")
    )]
    MissingConverter { class: String, target: String },

    #[error("'{text}' is not a boolean value")]
    #[diagnostic(
        code(ezcode::runtime::not_boolean),
        help("Conditions accept true/false, yes/no, y/n and 1/0")
    )]
    NotBoolean { text: String },

    #[error("Host call '{path}' failed: {message}")]
    #[diagnostic(code(ezcode::runtime::host))]
    Host { path: String, message: String },

    #[error("{message}")]
    #[diagnostic(code(ezcode::runtime::syntax))]
    Syntax { message: String },

    #[error("Stack overflow: maximum call depth of {max_depth} exceeded")]
    #[diagnostic(code(ezcode::runtime::stack_overflow))]
    StackOverflow { max_depth: usize },

    #[error("{message}")]
    #[diagnostic(code(ezcode::runtime::control))]
    Control { message: String },

    #[error("Error with \"{construct}\", Error Message:\"{message}\"")]
    #[diagnostic(code(ezcode::runtime::construct))]
    Construct { construct: String, message: String },

    #[error("{message}")]
    #[diagnostic(code(ezcode::runtime::custom))]
    Custom { message: String },
}

impl RuntimeError {
    pub fn undefined(name: impl Into<String>) -> Self {
        RuntimeError::UndefinedIdentifier { name: name.into() }
    }

    pub fn declaration(message: impl Into<String>) -> Self {
        RuntimeError::Declaration {
            message: message.into(),
        }
    }

    pub fn type_error(expected: impl Into<String>, value: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            expected: expected.into(),
            value: value.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        RuntimeError::Syntax {
            message: message.into(),
        }
    }

    pub fn control(message: impl Into<String>) -> Self {
        RuntimeError::Control {
            message: message.into(),
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        RuntimeError::Custom {
            message: message.into(),
        }
    }

    /// Wrap an inner error with the construct it escaped from. Stack overflows pass through untouched.
    pub fn construct(construct: impl Into<String>, inner: RuntimeError) -> Self {
        match inner {
            RuntimeError::StackOverflow { .. } => inner,
            inner => RuntimeError::Construct {
                construct: construct.into(),
                message: inner.to_string(),
            },
        }
    }

    /// The innermost message, with construct wrapping removed
    pub fn root_message(&self) -> String {
        let mut message = self.to_string();
        while let Some(rest) = message.strip_prefix("Error with \"") {
            match rest.split_once("\", Error Message:\"") {
                Some((_, inner)) => {
                    message = inner.strip_suffix('"').unwrap_or(inner).to_string();
                }
                None => break,
            }
        }
        message
    }
}

/// Result type for interpreter operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
