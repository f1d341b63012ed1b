//! Core interpreter: executes parsed EZCode lines against the runtime state.
//!
//! Top-level lines are fault isolated. An error escaping a top-level line is
//! reported with its trace and execution moves on to the next line. Inside a
//! body the first error unwinds to the nearest `try` or to the top level.

use crate::call_stack::{CallStack, StackFrame, ensure_sufficient_stack};
use crate::context::{ChainState, Flow, InterpreterConfig, ReportedError, RunReport};
use crate::environment::{Environment, FrameKind};
use crate::error::{Result, RuntimeError};
use crate::host::{HostContext, HostRegistry};
use crate::value::{Binding, Value};
use ezcode_parser::{
    Class, Container, DataType, Method, Program, Statement, StatementKind, TokenKind, TokenLine,
    TokenValue, TypeTag,
};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

/// The main interpreter for running EZCode programs
#[derive(Debug)]
pub struct Interpreter {
    pub(crate) config: InterpreterConfig,
    pub(crate) classes: IndexMap<String, Rc<Class>>,
    pub(crate) methods: IndexMap<String, Rc<Method>>,
    pub(crate) containers: IndexMap<String, Rc<Container>>,
    pub(crate) env: Environment,
    pub(crate) stack: CallStack,
    pub(crate) host: HostRegistry,
    pub(crate) host_context: HostContext,
    pub(crate) output: Vec<String>,
    /// Line number of the innermost line being executed
    pub(crate) current_line: usize,
    errors: Vec<ReportedError>,
    /// Chain state of the top level, kept across `execute` calls
    chain: ChainState,
    /// Trace captured where the error currently unwinding was raised
    failure_trace: Option<Vec<String>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self::with_host(config, HostRegistry::with_standard_library())
    }

    pub fn with_host(config: InterpreterConfig, host: HostRegistry) -> Self {
        Self {
            stack: CallStack::new(config.max_call_depth),
            config,
            classes: IndexMap::new(),
            methods: IndexMap::new(),
            containers: IndexMap::new(),
            env: Environment::new(),
            host,
            host_context: HostContext::default(),
            output: Vec::new(),
            current_line: 0,
            errors: Vec::new(),
            chain: ChainState::default(),
            failure_trace: None,
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn host_mut(&mut self) -> &mut HostRegistry {
        &mut self.host
    }

    pub fn classes(&self) -> &IndexMap<String, Rc<Class>> {
        &self.classes
    }

    pub fn methods(&self) -> &IndexMap<String, Rc<Method>> {
        &self.methods
    }

    /// Current value of a visible variable
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.env.get(name).map(|binding| binding.value)
    }

    /// Merge the declaration tables of a program. Later declarations replace earlier ones.
    pub fn load(&mut self, program: &Program) {
        for (name, class) in &program.classes {
            self.classes.insert(name.clone(), class.clone());
        }
        for (name, method) in &program.methods {
            self.methods.insert(name.clone(), method.clone());
        }
        for (name, container) in &program.containers {
            self.containers.insert(name.clone(), container.clone());
        }
    }

    /// Run a whole program and produce its report.
    ///
    /// Every top-level line runs even when earlier ones fail. The output log
    /// ends with an empty line and the exit line.
    pub fn run(&mut self, program: &Program) -> RunReport {
        info!(
            file = %self.config.file_name,
            lines = program.lines.len(),
            "running program"
        );
        self.load(program);
        self.execute_isolated(&program.lines);

        self.output.push(String::new());
        self.output
            .push(format!("{}: Exited with code 0.", self.config.file_name));

        let report = RunReport {
            output: std::mem::take(&mut self.output),
            errors: std::mem::take(&mut self.errors),
            status: 0,
        };
        info!(errors = report.errors.len(), "program finished");
        report
    }

    /// Execute top-level lines, reporting each failing line and moving on
    pub fn execute_isolated(&mut self, lines: &[TokenLine]) -> Value {
        let mut chain = std::mem::take(&mut self.chain);
        let mut last = Value::Empty;
        for line in lines {
            self.failure_trace = None;
            match self.execute_line(line, &mut chain) {
                Ok(Flow::Normal(value)) | Ok(Flow::Return(value)) => last = value,
                Ok(Flow::Break) | Ok(Flow::YieldBreak) => {
                    self.report(RuntimeError::control("'break' used outside of a loop"));
                }
                Err(error) => self.report(error),
            }
        }
        self.chain = chain;
        last
    }

    /// Execute top-level lines, stopping at the first error
    pub fn execute(&mut self, lines: &[TokenLine]) -> Result<Value> {
        let mut chain = std::mem::take(&mut self.chain);
        let mut result = Ok(Value::Empty);
        for line in lines {
            self.failure_trace = None;
            match self.execute_line(line, &mut chain) {
                Ok(flow) => result = Ok(flow.value()),
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
        self.chain = chain;
        result
    }

    /// Drain the output log
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Drain the reported errors
    pub fn take_errors(&mut self) -> Vec<ReportedError> {
        std::mem::take(&mut self.errors)
    }

    /// Forget all variables and the top-level chain. Declarations stay loaded.
    pub fn reset_variables(&mut self) {
        self.env.clear();
        self.stack.clear();
        self.chain = ChainState::default();
    }

    fn report(&mut self, error: RuntimeError) {
        let trace = self
            .failure_trace
            .take()
            .unwrap_or_else(|| self.stack.trace());
        let reported = ReportedError::new(error, trace);
        warn!(file = %self.config.file_name, "{}", reported.error);
        if self.config.echo_errors {
            eprintln!("{}", reported.message);
        }
        self.output.push(reported.message.clone());
        self.errors.push(reported);
    }

    fn capture_trace(&mut self) {
        if self.failure_trace.is_none() {
            self.failure_trace = Some(self.stack.trace());
        }
    }

    /// Run `f` with `frame` on the call stack, capturing the trace if an error escapes
    pub(crate) fn with_frame<T>(
        &mut self,
        frame: StackFrame,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if let Err(error) = self.stack.push(frame) {
            self.capture_trace();
            return Err(error);
        }
        let result = f(self);
        if result.is_err() {
            self.capture_trace();
        }
        self.stack.pop();
        result
    }

    /// Run `f` inside a new environment frame that is popped however `f` exits
    pub(crate) fn with_scope<T>(
        &mut self,
        kind: FrameKind,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.env.push(kind);
        let result = f(self);
        self.env.pop()?;
        result
    }

    pub(crate) fn execute_line(&mut self, line: &TokenLine, chain: &mut ChainState) -> Result<Flow> {
        trace!(line = line.line.number, text = %line.line.text, "execute");
        let frame = StackFrame::CodeLine {
            text: line.line.text.clone(),
            file: self.config.file_name.clone(),
            line: line.line.number,
        };
        let previous = std::mem::replace(&mut self.current_line, line.line.number);
        let result = ensure_sufficient_stack(|| {
            self.with_frame(frame, |this| this.dispatch_line(line, chain))
        });
        self.current_line = previous;

        result.map_err(|error| match construct_name(line) {
            Some(construct) => RuntimeError::construct(construct, error),
            None => error,
        })
    }

    fn dispatch_line(&mut self, line: &TokenLine, chain: &mut ChainState) -> Result<Flow> {
        let tokens = &line.tokens;
        let Some(first) = tokens.first() else {
            return Ok(Flow::Normal(Value::Empty));
        };

        match (&first.value, first.kind) {
            (TokenValue::Statement(statement), _) => self.execute_statement(statement, chain),
            (TokenValue::Class(_) | TokenValue::Method(_) | TokenValue::Container(_), _) => {
                Ok(Flow::Normal(Value::Empty))
            }
            (_, TokenKind::Comment | TokenKind::Make | TokenKind::Null) => {
                Ok(Flow::Normal(Value::Empty))
            }
            (_, TokenKind::Undefined) => self.declare_variable(line).map(Flow::Normal),
            (_, TokenKind::Return) => {
                let value = self.evaluate_expression(&tokens[1..], None)?;
                Ok(Flow::Return(value))
            }
            (_, TokenKind::Break) if tokens.len() == 1 => Ok(Flow::Break),
            (_, TokenKind::Yield) => match &tokens[1..] {
                [next] if next.is(TokenKind::Break) => Ok(Flow::YieldBreak),
                _ => Err(RuntimeError::syntax("'yield' must be followed by 'break'")),
            },
            (_, TokenKind::Identifier) => self.execute_identifier_line(line).map(Flow::Normal),
            (_, TokenKind::Match | TokenKind::RunExec) => {
                self.evaluate_expression(tokens, None).map(Flow::Normal)
            }
            _ => Err(RuntimeError::syntax(format!("Unexpected '{first}'"))),
        }
    }

    fn execute_identifier_line(&mut self, line: &TokenLine) -> Result<Value> {
        let tokens = &line.tokens;
        let name = tokens[0].to_string();

        if let Some(binding) = self.env.get(&name) {
            return self.execute_variable_line(binding, line);
        }
        if let Some((method, instance)) = self.find_method(&name) {
            return self.call_method(&method, instance, &tokens[1..]);
        }
        if let Some(class) = self.classes.get(&name).cloned() {
            let init = initializer_text(&line.line.text);
            return self.class_line(class, &tokens[1..], init, line.line.number);
        }
        Err(RuntimeError::undefined(name))
    }

    /// `x`, `x => expr` or `x method : args`
    fn execute_variable_line(&mut self, binding: Binding, line: &TokenLine) -> Result<Value> {
        let tokens = &line.tokens;
        match tokens.get(1) {
            None => self.get_value(&binding, None),
            Some(token) if token.is(TokenKind::Arrow) => {
                let value = self.evaluate_expression(&tokens[2..], typed(&binding.data_type))?;
                let value = self.conform(&binding.data_type, value)?;
                self.env.assign(&binding.name, value.clone())?;
                Ok(value)
            }
            Some(token) => {
                let Some(instance) = binding.value.as_instance().cloned() else {
                    return Err(RuntimeError::syntax(format!(
                        "Unexpected '{token}' after '{}'",
                        binding.name
                    )));
                };
                let method_name = token.to_string();
                let class = instance.borrow().class.clone();
                let method = class.methods.get(&method_name).cloned().ok_or_else(|| {
                    RuntimeError::MissingMethod {
                        owner: class.name.clone(),
                        method: method_name.clone(),
                    }
                })?;
                self.call_method(&method, Some(instance), &tokens[2..])
            }
        }
    }

    /// `undefined name` or `undefined name => expr`
    fn declare_variable(&mut self, line: &TokenLine) -> Result<Value> {
        let tokens = &line.tokens;
        let name = match tokens.get(1) {
            Some(token) if token.is(TokenKind::Identifier) => token.to_string(),
            _ => {
                return Err(RuntimeError::declaration(
                    "Expected a variable name after 'undefined'",
                ));
            }
        };
        self.check_name_free(&name)?;

        let value = match tokens.get(2) {
            None => Value::Empty,
            Some(token) if token.is(TokenKind::Arrow) => {
                let value = self.evaluate_expression(&tokens[3..], None)?;
                if value.is_empty() {
                    return Err(RuntimeError::declaration(format!(
                        "'{name}' must be given a value"
                    )));
                }
                value
            }
            Some(token) => {
                return Err(RuntimeError::syntax(format!(
                    "Unexpected '{token}' in the declaration of '{name}'"
                )));
            }
        };

        debug!(name = %name, "declare variable");
        self.env.declare(Binding::new(
            name,
            value.clone(),
            DataType::UNTYPED,
            line.line.number,
        ))?;
        Ok(value)
    }

    /// Variables may not take the name of a method, a class or the `exception` slot
    pub(crate) fn check_name_free(&self, name: &str) -> Result<()> {
        if self.find_method(name).is_some() {
            return Err(RuntimeError::declaration(format!(
                "'{name}' is already the name of a method"
            )));
        }
        if self.classes.contains_key(name) {
            return Err(RuntimeError::declaration(format!(
                "'{name}' is already the name of a class"
            )));
        }
        if name == "exception" {
            return Err(RuntimeError::declaration(
                "'exception' is reserved for 'fail' bodies",
            ));
        }
        Ok(())
    }

    fn execute_statement(&mut self, statement: &Statement, chain: &mut ChainState) -> Result<Flow> {
        match statement.kind {
            StatementKind::If => self.conditional_branch(statement, chain),
            StatementKind::Elif => {
                if chain.last_branch_taken {
                    return Ok(Flow::Normal(Value::Empty));
                }
                self.conditional_branch(statement, chain)
            }
            StatementKind::Else => {
                let taken = !chain.last_branch_taken;
                chain.last_branch_taken = true;
                if taken {
                    self.run_block(&statement.body)
                } else {
                    Ok(Flow::Normal(Value::Empty))
                }
            }
            StatementKind::Loop => self.run_loop(statement),
            StatementKind::Try => {
                chain.pending_failure = None;
                match self.run_block(&statement.body) {
                    Ok(flow) => Ok(flow),
                    Err(error) => {
                        debug!(line = statement.line, "try caught: {error}");
                        chain.pending_failure = Some(error.to_string());
                        self.failure_trace = None;
                        Ok(Flow::Normal(Value::Empty))
                    }
                }
            }
            StatementKind::Fail => match chain.pending_failure.take() {
                Some(message) => self.with_scope(FrameKind::Block, |this| {
                    this.env.bind(Binding::new(
                        "exception",
                        Value::Text(message),
                        DataType::primitive(TypeTag::String),
                        statement.line,
                    ));
                    this.run_body(&statement.body)
                }),
                None => Ok(Flow::Normal(Value::Empty)),
            },
        }
    }

    fn conditional_branch(&mut self, statement: &Statement, chain: &mut ChainState) -> Result<Flow> {
        let condition = statement
            .condition
            .as_ref()
            .ok_or_else(|| RuntimeError::syntax(format!("'{}' needs a condition", statement.kind)))?;
        let taken = self.eval_condition(condition)?;
        chain.last_branch_taken = taken;
        if taken {
            self.run_block(&statement.body)
        } else {
            Ok(Flow::Normal(Value::Empty))
        }
    }

    /// `loop N` runs N passes; any other argument is re-evaluated as a condition before each pass
    fn run_loop(&mut self, statement: &Statement) -> Result<Flow> {
        let condition = statement
            .condition
            .as_ref()
            .ok_or_else(|| RuntimeError::syntax("'loop' needs a count or condition"))?;

        match self.loop_count(condition)? {
            Some(count) => {
                for _ in 0..count {
                    match self.run_block(&statement.body)? {
                        Flow::Normal(_) => {}
                        Flow::Break | Flow::YieldBreak => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }
            }
            None => {
                while self.eval_condition(condition)? {
                    match self.run_block(&statement.body)? {
                        Flow::Normal(_) => {}
                        Flow::Break | Flow::YieldBreak => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }
            }
        }
        Ok(Flow::Normal(Value::Empty))
    }

    pub(crate) fn run_block(&mut self, body: &[TokenLine]) -> Result<Flow> {
        self.with_scope(FrameKind::Block, |this| this.run_body(body))
    }

    /// Run the lines of a body in the current frame with a fresh chain
    pub(crate) fn run_body(&mut self, body: &[TokenLine]) -> Result<Flow> {
        let mut chain = ChainState::default();
        let mut last = Value::Empty;
        let mut yielded = false;
        for line in body {
            match self.execute_line(line, &mut chain)? {
                Flow::Normal(value) => last = value,
                Flow::YieldBreak => yielded = true,
                flow => return Ok(flow),
            }
        }
        Ok(if yielded {
            Flow::YieldBreak
        } else {
            Flow::Normal(last)
        })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// The construct an error escaping this line is attributed to
fn construct_name(line: &TokenLine) -> Option<String> {
    let first = line.tokens.first()?;
    match first.kind {
        TokenKind::Try => None,
        TokenKind::If
        | TokenKind::Elif
        | TokenKind::Else
        | TokenKind::Loop
        | TokenKind::Fail
        | TokenKind::Undefined
        | TokenKind::Return
        | TokenKind::Break
        | TokenKind::Yield => Some(format!("{first}")),
        TokenKind::RunExec => Some("runexec".to_string()),
        _ => Some(line.line.text.clone()),
    }
}

/// Raw text after the first `:` of a line, comment excluded
fn initializer_text(text: &str) -> Option<String> {
    let code = match text.find("//") {
        Some(index) => &text[..index],
        None => text,
    };
    let (_, rest) = code.split_once(':')?;
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// `Some(data_type)` unless it is untyped
pub(crate) fn typed(data_type: &DataType) -> Option<&DataType> {
    (!data_type.is_untyped()).then_some(data_type)
}
