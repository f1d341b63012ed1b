// EZCode Parser Diagnostics
// Warning types, severity levels and error collection for tolerant parsing

use crate::error::ParseError;
use miette::{Diagnostic, NamedSource};
use std::fmt;
use thiserror::Error;

/// Severity level for diagnostic messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The declaration was accepted but replaced an earlier one
    Warning,
    /// The construct was dropped
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Non-fatal findings. Later declarations replace earlier ones with the same name.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ParseWarning {
    #[error("Class '{name}' on line {line} replaces an earlier declaration")]
    #[diagnostic(code(ezcode::parse::duplicate_class), severity(Warning))]
    DuplicateClass { name: String, line: usize },

    #[error("Method '{name}' on line {line} replaces an earlier declaration")]
    #[diagnostic(code(ezcode::parse::duplicate_method), severity(Warning))]
    DuplicateMethod { name: String, line: usize },

    #[error("Container '{name}' on line {line} replaces an earlier declaration")]
    #[diagnostic(code(ezcode::parse::duplicate_container), severity(Warning))]
    DuplicateContainer { name: String, line: usize },
}

impl ParseWarning {
    pub fn line(&self) -> usize {
        match self {
            ParseWarning::DuplicateClass { line, .. }
            | ParseWarning::DuplicateMethod { line, .. }
            | ParseWarning::DuplicateContainer { line, .. } => *line,
        }
    }
}

/// Collects the errors and warnings of a tolerant parse
#[derive(Debug, Clone)]
pub struct DiagnosticCollector {
    source: String,
    errors: Vec<ParseError>,
    warnings: Vec<ParseWarning>,
}

impl DiagnosticCollector {
    pub fn new(source: String) -> Self {
        Self {
            source,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ParseWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Severity of every finding in source line order
    pub fn by_line(&self) -> Vec<(usize, Severity, String)> {
        let mut findings: Vec<(usize, Severity, String)> = self
            .errors
            .iter()
            .map(|error| (error.line(), Severity::Error, error.to_string()))
            .chain(
                self.warnings
                    .iter()
                    .map(|warning| (warning.line(), Severity::Warning, warning.to_string())),
            )
            .collect();
        findings.sort_by_key(|(line, severity, _)| (*line, std::cmp::Reverse(*severity)));
        findings
    }

    /// Create miette reports for every finding, attached to a named source
    pub fn create_reports_with_filename(&self, filename: &str) -> Vec<miette::Report> {
        let named_source = NamedSource::new(filename, self.source.clone());

        let errors = self
            .errors
            .iter()
            .map(|error| miette::Report::new(error.clone()).with_source_code(named_source.clone()));
        let warnings = self.warnings.iter().map(|warning| {
            miette::Report::new(warning.clone()).with_source_code(named_source.clone())
        });
        errors.chain(warnings).collect()
    }

    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary {
            errors: self.error_count(),
            warnings: self.warning_count(),
        }
    }
}

/// Summary of diagnostic counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
}

impl fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors == 0 && self.warnings == 0 {
            write!(f, "No diagnostics")
        } else {
            write!(f, "{} errors, {} warnings", self.errors, self.warnings)
        }
    }
}
