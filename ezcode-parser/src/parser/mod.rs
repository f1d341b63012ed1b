// EZCode Structural Parser
// Consumes source lines front to back and builds statements, methods, classes and containers

mod classes;
mod containers;
mod methods;
mod statements;

use crate::ast::*;
use crate::diagnostics::{DiagnosticCollector, ParseWarning};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{split_parts, tokenize_code};
use crate::macros;
use indexmap::IndexMap;
use std::rc::Rc;

/// Parser state. The declaration tables persist across calls so a REPL can
/// keep feeding it input.
#[derive(Debug, Clone, Default)]
pub struct EzParser {
    pub classes: IndexMap<String, Rc<Class>>,
    pub methods: IndexMap<String, Rc<Method>>,
    pub containers: IndexMap<String, Rc<Container>>,
    warnings: Vec<ParseWarning>,
}

/// A `{ }` block located at the front of a line list
#[derive(Debug, Clone)]
pub(crate) struct Block {
    /// Header text before the opening brace
    pub prefix: String,
    pub body: Vec<Line>,
    /// Lines consumed, header and closing line included
    pub consumed: usize,
    /// Text after the closing brace, kept as a new line with the same number
    pub remainder: Option<Line>,
}

/// Split source text into trimmed, numbered, non-empty lines
pub fn split_lines(source: &str) -> Vec<Line> {
    source
        .lines()
        .enumerate()
        .map(|(index, text)| Line::new(text.trim(), index + 1))
        .filter(|line| !line.text.is_empty())
        .collect()
}

impl EzParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whole program, failing on the first structural error
    pub fn parse_program(&mut self, source: &str) -> ParseResult<Program> {
        let mut lines = split_lines(source);
        let mut output = Vec::new();
        while !lines.is_empty() {
            if let Some(line) = self.next_line(&mut lines)? {
                output.push(line);
            }
        }
        // replacement warnings are only reported through diagnostics
        self.warnings.clear();
        Ok(self.program(output))
    }

    /// Parse a whole program, dropping failing lines and collecting their errors
    pub fn parse_program_with_diagnostics(
        &mut self,
        source: &str,
    ) -> (Program, DiagnosticCollector) {
        let mut collector = DiagnosticCollector::new(source.to_string());
        let mut lines = split_lines(source);
        let mut output = Vec::new();

        while !lines.is_empty() {
            let before = lines.len();
            match self.next_line(&mut lines) {
                Ok(Some(line)) => output.push(line),
                Ok(None) => {}
                Err(error) => {
                    tracing::debug!("parse error: {error}");
                    // constructs that already claimed their lines have consumed them
                    if lines.len() == before {
                        lines.remove(0);
                    }
                    collector.add_error(error);
                }
            }
        }

        for warning in self.warnings.drain(..) {
            collector.add_warning(warning);
        }
        (self.program(output), collector)
    }

    fn program(&self, lines: Vec<TokenLine>) -> Program {
        Program {
            lines,
            classes: self.classes.clone(),
            methods: self.methods.clone(),
            containers: self.containers.clone(),
        }
    }

    /// Parse the lines of a body, propagating the first error
    pub(crate) fn parse_body(&mut self, mut lines: Vec<Line>) -> ParseResult<Vec<TokenLine>> {
        let mut output = Vec::new();
        while !lines.is_empty() {
            if let Some(line) = self.next_line(&mut lines)? {
                output.push(line);
            }
        }
        Ok(output)
    }

    /// Consume the construct at the front of `lines`
    pub(crate) fn next_line(&mut self, lines: &mut Vec<Line>) -> ParseResult<Option<TokenLine>> {
        let Some(header) = lines.first().cloned() else {
            return Ok(None);
        };
        let parts = split_parts(&header.text);
        let Some(first) = parts.first() else {
            lines.remove(0);
            return Ok(None);
        };

        if first == "make" {
            macros::expand(lines, 0)?;
            return Ok(None);
        }

        if let Some(kind) = StatementKind::from_keyword(first) {
            let statement = self.parse_statement(lines, kind)?;
            return Ok(Some(TokenLine::new(header, vec![Token::statement(statement)])));
        }

        if declares(&parts, "class", &["static", "semi", "ontop"]) {
            let class = self.parse_class(lines)?;
            self.register_class(class.clone());
            let token = Token::new(TokenKind::Class, TokenValue::Class(class));
            return Ok(Some(TokenLine::new(header, vec![token])));
        }

        if declares(&parts, "method", &["static", "nocol"]) {
            let method = Rc::new(self.parse_method(lines)?);
            self.register_method(method.clone());
            let token = Token::new(TokenKind::Method, TokenValue::Method(method));
            return Ok(Some(TokenLine::new(header, vec![token])));
        }

        if first == "container" {
            let container = Rc::new(self.parse_container(lines)?);
            if self
                .containers
                .insert(container.name.clone(), container.clone())
                .is_some()
            {
                self.warnings.push(ParseWarning::DuplicateContainer {
                    name: container.name.clone(),
                    line: container.line,
                });
            }
            let token = Token::new(TokenKind::Container, TokenValue::Container(container));
            return Ok(Some(TokenLine::new(header, vec![token])));
        }

        lines.remove(0);
        let tokens = self.build_tokens(&header.text, header.number)?;
        if tokens.is_empty() {
            return Ok(None);
        }
        tracing::trace!("line {}: {} token(s)", header.number, tokens.len());
        Ok(Some(TokenLine::new(header, tokens)))
    }

    /// Lex a line, folding a `runexec` tail into a host-call token and watch matches into bound calls
    pub(crate) fn build_tokens(&self, text: &str, line: usize) -> ParseResult<Vec<Token>> {
        let (code, host) = match find_word(text, "runexec") {
            Some(position) => {
                let call = parse_host_call_text(&text[position + "runexec".len()..], line)?;
                (&text[..position], Some(call))
            }
            None => (text, None),
        };

        let mut tokens = tokenize_code(code);
        for token in tokens.iter_mut() {
            if !token.is(TokenKind::Identifier) {
                continue;
            }
            let Some(word) = token.as_text() else {
                continue;
            };
            if let Some(call) = self.match_watch(word) {
                *token = Token::new(TokenKind::Match, TokenValue::Bound(call));
            }
        }

        if let Some(call) = host {
            tokens.push(Token::new(TokenKind::RunExec, TokenValue::HostCall(call)));
        }
        Ok(tokens)
    }

    /// First watch rule, in class declaration order, that matches the whole word
    pub fn match_watch(&self, word: &str) -> Option<BoundCall> {
        let resolve = |name: &str| self.lookup_type(name);
        self.classes.values().find_map(|class| {
            class.watch.iter().find_map(|rule| {
                rule.pattern.match_full(word).map(|found| BoundCall {
                    class_name: rule.class_name.clone(),
                    method: rule.method.clone(),
                    args: rule.bind(&found, &resolve),
                    source: word.to_string(),
                })
            })
        })
    }

    /// Resolve a type name (no `@`) against primitives, classes and containers
    pub fn lookup_type(&self, name: &str) -> Option<DataType> {
        let name = name.trim().trim_start_matches('@');
        if let Some(tag) = TypeTag::from_name(name) {
            return Some(DataType::primitive(tag));
        }
        if let Some(class) = self.classes.get(name) {
            return Some(class.instance_type());
        }
        if self.containers.contains_key(name) {
            return Some(DataType::container(name));
        }
        None
    }

    /// Resolve a written type, treating unknown names as forward class references
    pub fn data_type(&self, text: &str) -> DataType {
        let name = text.trim().trim_start_matches('@');
        if name.is_empty() {
            return DataType::UNTYPED;
        }
        self.lookup_type(name)
            .unwrap_or_else(|| DataType::class(TypeTag::Object, name))
    }

    pub(crate) fn register_class(&mut self, class: Rc<Class>) {
        tracing::debug!("class {} ({} lines)", class.name, class.length);
        if self
            .classes
            .insert(class.name.clone(), class.clone())
            .is_some()
        {
            self.warnings.push(ParseWarning::DuplicateClass {
                name: class.name.clone(),
                line: class.line,
            });
        }
    }

    pub(crate) fn register_method(&mut self, method: Rc<Method>) {
        tracing::debug!("method {} ({} params)", method.name, method.params.len());
        if self
            .methods
            .insert(method.name.clone(), method.clone())
            .is_some()
        {
            self.warnings.push(ParseWarning::DuplicateMethod {
                name: method.name.clone(),
                line: method.line,
            });
        }
    }

    pub(crate) fn push_warning(&mut self, warning: ParseWarning) {
        self.warnings.push(warning);
    }
}

/// True when `keyword` appears in `parts` preceded only by allowed modifiers
pub(crate) fn declares(parts: &[String], keyword: &str, modifiers: &[&str]) -> bool {
    for part in parts {
        if part == keyword {
            return true;
        }
        if !modifiers.contains(&part.as_str()) {
            return false;
        }
    }
    false
}

/// Byte position of `word` as a standalone word before any comment
pub(crate) fn find_word(text: &str, word: &str) -> Option<usize> {
    let limit = text.find("//").unwrap_or(text.len());
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    text[..limit].match_indices(word).map(|(at, _)| at).find(|&at| {
        let before = text[..at].chars().next_back();
        let after = text[at + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Parse the text after `runexec`: `=> path [~> arg, arg]`
pub(crate) fn parse_host_call_text(text: &str, line: usize) -> ParseResult<HostCall> {
    let Some(rest) = text.trim_start().strip_prefix("=>") else {
        return Err(ParseError::invalid_host_call(
            "expected '=>' after runexec",
            line,
        ));
    };
    let rest = match rest.find(" //") {
        Some(comment) => &rest[..comment],
        None => rest,
    };
    let (path, args) = match rest.split_once("~>") {
        Some((path, args)) => (path.trim(), args),
        None => (rest.trim(), ""),
    };
    if path.is_empty() {
        return Err(ParseError::invalid_host_call("missing host path", line));
    }

    Ok(HostCall {
        path: path.to_string(),
        args: args
            .split(',')
            .map(str::trim)
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect(),
        is_dynamic: path.contains('\''),
    })
}

/// Position of the first unescaped `{` outside a comment
fn find_open_brace(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((at, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '/' if chars.peek().is_some_and(|(_, next)| *next == '/') => return None,
            '{' => return Some(at),
            _ => {}
        }
    }
    None
}

/// Where a brace run starting at depth 1 closes within `text`, if it does
fn find_close(text: &str, depth: &mut usize) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((at, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '/' if chars.peek().is_some_and(|(_, next)| *next == '/') => return None,
            '{' => *depth += 1,
            '}' => {
                *depth -= 1;
                if *depth == 0 {
                    return Some(at);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate a brace-delimited block opened on the header line or on the line after it.
///
/// Nothing is removed from `lines`; see [`commit_block`].
pub(crate) fn find_block(lines: &[Line]) -> ParseResult<Option<Block>> {
    let Some(header) = lines.first() else {
        return Ok(None);
    };

    let (prefix, start_line, start_text) = match find_open_brace(&header.text) {
        Some(open) => (
            header.text[..open].to_string(),
            0,
            header.text[open + 1..].to_string(),
        ),
        None => match lines.get(1) {
            Some(next) if next.text.starts_with('{') => {
                (header.text.clone(), 1, next.text[1..].to_string())
            }
            _ => return Ok(None),
        },
    };

    let mut depth = 1;
    let mut body = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(start_line) {
        let text = if index == start_line {
            start_text.as_str()
        } else {
            line.text.as_str()
        };

        if let Some(close) = find_close(text, &mut depth) {
            let inside = text[..close].trim();
            if !inside.is_empty() {
                body.push(Line::new(inside, line.number));
            }
            let after = text[close + 1..].trim();
            return Ok(Some(Block {
                prefix: prefix.trim().to_string(),
                body,
                consumed: index + 1,
                remainder: (!after.is_empty()).then(|| Line::new(after, line.number)),
            }));
        }

        let text = text.trim();
        if !text.is_empty() {
            body.push(Line::new(text, line.number));
        }
    }

    Err(ParseError::UnclosedBlock {
        line: header.number,
    })
}

/// Remove a located block from `lines`, keeping any text after its closing brace
pub(crate) fn commit_block(lines: &mut Vec<Line>, block: &Block) {
    lines.drain(..block.consumed.min(lines.len()));
    if let Some(remainder) = &block.remainder {
        lines.insert(0, remainder.clone());
    }
}

/// Body of a construct without a trailing brace: a `{ }` block, or the line after the header
pub(crate) fn take_block_or_next_line(
    lines: &mut Vec<Line>,
    construct: &str,
) -> ParseResult<(String, Vec<Line>)> {
    if let Some(block) = find_block(lines)? {
        commit_block(lines, &block);
        return Ok((block.prefix, block.body));
    }
    if lines.len() < 2 {
        let line = lines.first().map(|line| line.number).unwrap_or_default();
        return Err(ParseError::missing_body(construct, line));
    }
    let body = lines.remove(1);
    let header = lines.remove(0);
    Ok((header.text, vec![body]))
}
