//! REPL (Read-Eval-Print Loop) for the EZCode interpreter
//!
//! Input goes through the same parser → interpreter pipeline as `ezcode run`,
//! but one session keeps its classes, methods, watch rules, macros and
//! variables across inputs. Features:
//! - Multi-line input until `{ }` braces balance
//! - REPL commands for inspecting the session
//! - History and line editing with rustyline

use ezcode_interpreter::{InterpreterSession, RuntimeError, TestHarnessError, Value};
use ezcode_parser::ParseError;
use miette::Diagnostic;
use rustyline::{DefaultEditor, error::ReadlineError};
use thiserror::Error;

/// Errors that can occur in the REPL
#[derive(Debug, Error, Diagnostic)]
pub enum ReplError {
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

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Readline error: {source}")]
    Readline {
        #[from]
        source: ReadlineError,
    },

    #[error("REPL command error: {message}")]
    Command { message: String },

    #[error("Internal REPL error: {message}")]
    Internal { message: String },
}

impl From<TestHarnessError> for ReplError {
    fn from(error: TestHarnessError) -> Self {
        match error {
            TestHarnessError::Parse { source } => ReplError::Parse { source },
            TestHarnessError::Runtime { source } => ReplError::Runtime { source },
            other => ReplError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// REPL session that maintains state across evaluations
pub struct ReplSession {
    /// Interactive line editor with history
    editor: DefaultEditor,

    /// Parser and interpreter state shared by every input
    session: InterpreterSession,

    config: ReplConfig,

    stats: ReplStats,
}

/// REPL configuration options
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Show the value type next to results
    pub show_types: bool,

    /// Show debug formatting for runtime errors
    pub verbose_errors: bool,

    pub prompt: String,

    pub persist_history: bool,

    pub history_file: Option<String>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            show_types: false,
            verbose_errors: false,
            prompt: "ezcode> ".to_string(),
            persist_history: true,
            history_file: Some(".ezcode_history".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplStats {
    pub inputs_evaluated: usize,
    pub errors_encountered: usize,
    pub commands_executed: usize,
}

/// Result of evaluating one input
#[derive(Debug)]
pub enum ReplResult {
    /// Code ran; `output` holds what it printed
    Value {
        value: Value,
        type_display: String,
        output: Vec<String>,
    },

    Command { message: String },

    /// Empty line or comment
    Empty,

    Exit,
}

impl ReplSession {
    pub fn new() -> Result<Self, ReplError> {
        Self::with_config(ReplConfig::default())
    }

    pub fn with_config(config: ReplConfig) -> Result<Self, ReplError> {
        let mut editor = DefaultEditor::new()?;

        if config.persist_history {
            if let Some(ref history_file) = config.history_file {
                let _ = editor.load_history(history_file); // missing on first use
            }
        }

        Ok(Self {
            editor,
            session: InterpreterSession::default(),
            config,
            stats: ReplStats::default(),
        })
    }

    /// Start the REPL main loop
    pub fn run(&mut self) -> Result<(), ReplError> {
        self.print_welcome();

        while let Some(input) = self.read_input()? {
            match self.evaluate_line(&input) {
                Ok(ReplResult::Exit) => break,
                Ok(result) => self.display_result(result),
                Err(error) => {
                    self.stats.errors_encountered += 1;
                    // flush output written before the error
                    for line in self.session.take_output() {
                        println!("{line}");
                    }
                    self.display_error(error);
                }
            }
        }

        println!("Goodbye!");
        self.save_history()
    }

    /// Read one input, continuing with `... ` prompts until braces balance
    fn read_input(&mut self) -> Result<Option<String>, ReplError> {
        let mut input = String::new();

        loop {
            let prompt = if input.is_empty() {
                self.config.prompt.as_str()
            } else {
                "... "
            };

            match self.editor.readline(prompt) {
                Ok(line) => {
                    if input.is_empty() && line.trim().is_empty() {
                        return Ok(Some(String::new()));
                    }
                    if !input.is_empty() {
                        input.push('\n');
                    }
                    input.push_str(&line);

                    if is_input_complete(&input) {
                        self.editor.add_history_entry(input.as_str())?;
                        return Ok(Some(input));
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    return Ok(Some(String::new()));
                }
                Err(ReadlineError::Eof) => return Ok(None),
                Err(err) => return Err(ReplError::Readline { source: err }),
            }
        }
    }

    /// Evaluate one complete input
    pub fn evaluate_line(&mut self, input: &str) -> Result<ReplResult, ReplError> {
        let trimmed = input.trim();

        if trimmed.is_empty() || trimmed.starts_with("//") {
            return Ok(ReplResult::Empty);
        }
        if trimmed.starts_with('/') {
            return self.execute_command(trimmed);
        }

        self.stats.inputs_evaluated += 1;
        let value = self.session.evaluate(input)?;
        Ok(ReplResult::Value {
            type_display: value.type_name(),
            value,
            output: self.session.take_output(),
        })
    }

    fn execute_command(&mut self, command: &str) -> Result<ReplResult, ReplError> {
        self.stats.commands_executed += 1;

        let parts: Vec<&str> = command.split_whitespace().collect();
        let Some(name) = parts.first() else {
            return Ok(ReplResult::Empty);
        };

        match *name {
            "/help" | "/h" => Ok(ReplResult::Command {
                message: help_message(),
            }),

            "/vars" | "/variables" => Ok(ReplResult::Command {
                message: self.format_variables(),
            }),

            "/classes" => Ok(ReplResult::Command {
                message: self.format_declarations(),
            }),

            "/clear" => {
                self.session.clear_variables();
                Ok(ReplResult::Command {
                    message: "Variables cleared".to_string(),
                })
            }

            "/reset" => {
                self.session = InterpreterSession::default();
                Ok(ReplResult::Command {
                    message: "Session reset".to_string(),
                })
            }

            "/stats" => Ok(ReplResult::Command {
                message: self.format_stats(),
            }),

            "/config" => Ok(ReplResult::Command {
                message: self.format_config(),
            }),

            "/quit" | "/q" | "/exit" => Ok(ReplResult::Exit),

            "/types" => match parts.get(1) {
                Some(&"on") => {
                    self.config.show_types = true;
                    Ok(ReplResult::Command {
                        message: "Type display enabled".to_string(),
                    })
                }
                Some(&"off") => {
                    self.config.show_types = false;
                    Ok(ReplResult::Command {
                        message: "Type display disabled".to_string(),
                    })
                }
                _ => Ok(ReplResult::Command {
                    message: format!(
                        "Type display is {}",
                        if self.config.show_types { "on" } else { "off" }
                    ),
                }),
            },

            unknown => Err(ReplError::Command {
                message: format!("Unknown command: {unknown}. Type /help for available commands."),
            }),
        }
    }

    fn display_result(&self, result: ReplResult) {
        match result {
            ReplResult::Value {
                value,
                type_display,
                output,
            } => {
                for line in output {
                    println!("{line}");
                }
                if value.is_empty() {
                    return;
                }
                if self.config.show_types {
                    println!("{value}: {type_display}");
                } else {
                    println!("{value}");
                }
            }
            ReplResult::Command { message } => println!("{message}"),
            ReplResult::Empty | ReplResult::Exit => {}
        }
    }

    fn display_error(&self, error: ReplError) {
        match error {
            ReplError::Parse { source } => {
                eprintln!("{:?}", miette::Report::new(source));
            }
            ReplError::Runtime { source } if self.config.verbose_errors => {
                eprintln!("{:?}", miette::Report::new(source));
            }
            ReplError::Runtime { source } => eprintln!("{source}"),
            error => eprintln!("{:?}", miette::Report::new(error)),
        }
    }

    fn print_welcome(&self) {
        println!("EZCode REPL v{}", env!("CARGO_PKG_VERSION"));
        println!("Type /help for commands, /quit to exit");
        println!();
    }

    fn save_history(&mut self) -> Result<(), ReplError> {
        if self.config.persist_history {
            if let Some(ref history_file) = self.config.history_file {
                self.editor.save_history(history_file)?;
            }
        }
        Ok(())
    }

    fn format_variables(&self) -> String {
        let globals = self.session.interpreter().environment().globals();
        if globals.is_empty() {
            return "No variables defined".to_string();
        }
        let mut lines = vec!["Variables:".to_string()];
        for binding in globals {
            if self.config.show_types {
                lines.push(format!(
                    "  {}: {} = {}",
                    binding.name,
                    binding.value.type_name(),
                    binding.value
                ));
            } else {
                lines.push(format!("  {} = {}", binding.name, binding.value));
            }
        }
        lines.join("\n")
    }

    fn format_declarations(&self) -> String {
        let interpreter = self.session.interpreter();
        let classes = interpreter.classes();
        let methods = interpreter.methods();
        if classes.is_empty() && methods.is_empty() {
            return "No classes or methods declared".to_string();
        }

        let mut lines = Vec::new();
        for class in classes.values() {
            let members = class.methods.keys().cloned().collect::<Vec<_>>().join(", ");
            lines.push(format!("  class {} [{members}]", class.name));
        }
        for method in methods.values() {
            lines.push(format!("  method {} ({} params)", method.name, method.params.len()));
        }
        lines.join("\n")
    }

    fn format_stats(&self) -> String {
        format!(
            r#"Session Statistics:
  Inputs evaluated: {}
  Errors encountered: {}
  Commands executed: {}"#,
            self.stats.inputs_evaluated, self.stats.errors_encountered, self.stats.commands_executed
        )
    }

    fn format_config(&self) -> String {
        format!(
            r#"REPL Configuration:
  Show types: {}
  Verbose errors: {}
  Prompt: "{}"
  Persist history: {}
  History file: {}"#,
            self.config.show_types,
            self.config.verbose_errors,
            self.config.prompt,
            self.config.persist_history,
            self.config.history_file.as_deref().unwrap_or("<none>")
        )
    }
}

/// Braces outside comments and escapes are balanced
fn is_input_complete(input: &str) -> bool {
    let mut depth: i32 = 0;
    for line in input.lines() {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                }
                '/' if chars.peek() == Some(&'/') => break,
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
    }
    depth <= 0
}

fn help_message() -> String {
    r#"EZCode REPL Commands:
  /help, /h           Show this help message
  /vars, /variables   List global variables
  /classes            List declared classes and methods
  /clear              Forget all variables
  /reset              Start a fresh session
  /stats              Show session statistics
  /config             Show current configuration
  /types [on|off]     Toggle type display
  /quit, /q, /exit    Exit the REPL

Examples:
  undefined x => 42                    Declare a variable
  runexec => EZCode.print ~> x         Call a host function
  method double : @int:n => @int {     Multi-line input continues
  return runexec => EZCode.multiply ~> n, 2
  }                                    until braces balance

Use Ctrl+C to cancel input, Ctrl+D to exit."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_repl() -> ReplSession {
        let config = ReplConfig {
            persist_history: false,
            history_file: None,
            ..Default::default()
        };
        ReplSession::with_config(config).expect("Failed to create test REPL")
    }

    #[test]
    fn test_repl_creation() {
        let repl = create_test_repl();
        assert_eq!(repl.stats.inputs_evaluated, 0);
        assert_eq!(repl.stats.errors_encountered, 0);
        assert!(repl.session.interpreter().environment().globals().is_empty());
    }

    #[test]
    fn test_declarations_persist_across_inputs() {
        let mut repl = create_test_repl();
        repl.evaluate_line("method double : @int:n => @int {\nreturn runexec => EZCode.multiply ~> n, 2\n}")
            .unwrap();
        repl.evaluate_line("undefined x => 21").unwrap();

        match repl.evaluate_line("double : x").unwrap() {
            ReplResult::Value {
                value,
                type_display,
                ..
            } => {
                assert_eq!(value, Value::Int(42));
                assert_eq!(type_display, "int");
            }
            other => panic!("Expected value, got {other:?}"),
        }
        assert_eq!(repl.stats.inputs_evaluated, 3);
    }

    #[test]
    fn test_output_is_returned_with_result() {
        let mut repl = create_test_repl();
        match repl.evaluate_line("runexec => EZCode.print ~> hi").unwrap() {
            ReplResult::Value { output, value, .. } => {
                assert_eq!(output, vec!["hi".to_string()]);
                assert!(value.is_empty());
            }
            other => panic!("Expected value, got {other:?}"),
        }
    }

    #[test]
    fn test_errors_are_classified() {
        let mut repl = create_test_repl();
        assert!(matches!(
            repl.evaluate_line("if {"),
            Err(ReplError::Parse { .. })
        ));
        assert!(matches!(
            repl.evaluate_line("nothing"),
            Err(ReplError::Runtime { .. })
        ));
    }

    #[test]
    fn test_empty_line_handling() {
        let mut repl = create_test_repl();
        assert!(matches!(repl.evaluate_line("").unwrap(), ReplResult::Empty));
        assert!(matches!(
            repl.evaluate_line("// comment").unwrap(),
            ReplResult::Empty
        ));
    }

    #[test]
    fn test_help_command() {
        let mut repl = create_test_repl();
        match repl.evaluate_line("/help").unwrap() {
            ReplResult::Command { message } => {
                assert!(message.contains("/help"));
                assert!(message.contains("/vars"));
                assert!(message.contains("/quit"));
            }
            other => panic!("Expected command result, got {other:?}"),
        }
    }

    #[test]
    fn test_vars_and_clear_commands() {
        let mut repl = create_test_repl();
        repl.evaluate_line("undefined name => ada").unwrap();
        match repl.evaluate_line("/vars").unwrap() {
            ReplResult::Command { message } => assert!(message.contains("name = ada")),
            other => panic!("Expected command result, got {other:?}"),
        }

        repl.evaluate_line("/clear").unwrap();
        match repl.evaluate_line("/vars").unwrap() {
            ReplResult::Command { message } => assert_eq!(message, "No variables defined"),
            other => panic!("Expected command result, got {other:?}"),
        }
    }

    #[test]
    fn test_classes_command() {
        let mut repl = create_test_repl();
        repl.evaluate_line("class Box {\nundefined item\nmethod open\nreturn item\n}")
            .unwrap();
        match repl.evaluate_line("/classes").unwrap() {
            ReplResult::Command { message } => assert!(message.contains("class Box [open]")),
            other => panic!("Expected command result, got {other:?}"),
        }
    }

    #[test]
    fn test_quit_command() {
        let mut repl = create_test_repl();
        assert!(matches!(repl.evaluate_line("/quit").unwrap(), ReplResult::Exit));
        assert!(matches!(repl.evaluate_line("/q").unwrap(), ReplResult::Exit));
        assert!(matches!(repl.evaluate_line("/exit").unwrap(), ReplResult::Exit));
    }

    #[test]
    fn test_types_command() {
        let mut repl = create_test_repl();
        repl.evaluate_line("/types on").unwrap();
        assert!(repl.config.show_types);
        repl.evaluate_line("/types off").unwrap();
        assert!(!repl.config.show_types);
    }

    #[test]
    fn test_unknown_command() {
        let mut repl = create_test_repl();
        match repl.evaluate_line("/unknown") {
            Err(ReplError::Command { message }) => assert!(message.contains("/unknown")),
            other => panic!("Expected command error, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_line_input_detection() {
        assert!(is_input_complete("undefined x => 1"));
        assert!(!is_input_complete("if x {"));
        assert!(!is_input_complete("class A {\nmethod f {"));
        assert!(is_input_complete("if x {\ny\n}"));
        assert!(is_input_complete("x // {"));
        assert!(!is_input_complete("if x { // }"));
        assert!(is_input_complete("print : \\{"));
    }
}
