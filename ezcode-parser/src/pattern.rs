// EZCode Pattern Engine
// Compiles `{name}` placeholder templates into segment lists and matches them with backtracking

use crate::ast::{BoundArg, DataType, PatternRule};
use crate::error::{ParseError, ParseResult};
use indexmap::IndexMap;
use std::ops::Range;

/// Characters a capture is allowed to consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureClass {
    /// Alphanumerics and `_`, optionally written as `type:value`
    Word,
    /// Anything but whitespace
    NonSpace,
}

impl CaptureClass {
    fn admits(self, c: char) -> bool {
        match self {
            CaptureClass::Word => c.is_alphanumeric() || c == '_' || c == ':',
            CaptureClass::NonSpace => !c.is_whitespace(),
        }
    }

    fn accepts(self, text: &[char]) -> bool {
        match self {
            CaptureClass::NonSpace => !text.is_empty(),
            CaptureClass::Word => {
                let colons = text.iter().filter(|c| **c == ':').count();
                match colons {
                    0 => !text.is_empty(),
                    1 => text.first() != Some(&':') && text.last() != Some(&':'),
                    _ => false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(Vec<char>),
    Capture(String),
    /// A run of pattern whitespace; matches zero or more input whitespace
    Space,
}

/// A compiled placeholder template
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub source: String,
    pub class: CaptureClass,
    pub segments: Vec<Segment>,
    /// Capture name to its position among the captures
    pub slots: IndexMap<String, usize>,
}

/// One named capture of a successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Byte range of the match within the searched text
    pub range: Range<usize>,
    pub captures: Vec<Capture>,
}

impl PatternMatch {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|capture| capture.name == name)
            .map(|capture| capture.text.as_str())
    }
}

impl Pattern {
    pub fn compile(source: &str, class: CaptureClass, line: usize) -> ParseResult<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ParseError::invalid_pattern(source, "pattern is empty", line));
        }

        let mut segments = Vec::new();
        let mut slots = IndexMap::new();
        let mut literal = Vec::new();
        let mut chars = source.chars().peekable();

        let flush = |literal: &mut Vec<char>, segments: &mut Vec<Segment>| {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(literal)));
            }
        };

        while let Some(c) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some('{') | Some('}')) => {
                    if let Some(brace) = chars.next() {
                        literal.push(brace);
                    }
                }
                '{' => {
                    flush(&mut literal, &mut segments);
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    let name = name.trim().to_string();
                    if !closed {
                        return Err(ParseError::invalid_pattern(
                            source,
                            "unclosed placeholder",
                            line,
                        ));
                    }
                    if name.is_empty() {
                        return Err(ParseError::invalid_pattern(
                            source,
                            "placeholder without a name",
                            line,
                        ));
                    }
                    if let Some(Segment::Capture(_)) = segments.last() {
                        return Err(ParseError::invalid_pattern(
                            source,
                            "placeholders must be separated by text",
                            line,
                        ));
                    }
                    let slot = slots.len();
                    slots.entry(name.clone()).or_insert(slot);
                    segments.push(Segment::Capture(name));
                }
                c if c.is_whitespace() => {
                    flush(&mut literal, &mut segments);
                    while chars.peek().is_some_and(|c| c.is_whitespace()) {
                        chars.next();
                    }
                    segments.push(Segment::Space);
                }
                c => literal.push(c),
            }
        }
        flush(&mut literal, &mut segments);

        Ok(Self {
            source: source.to_string(),
            class,
            segments,
            slots,
        })
    }

    pub fn capture_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Capture(_)))
            .count()
    }

    /// Match the whole of `input` (surrounding whitespace ignored)
    pub fn match_full(&self, input: &str) -> Option<PatternMatch> {
        let trimmed = input.trim();
        let offset = input.len() - input.trim_start().len();
        let chars: Vec<char> = trimmed.chars().collect();
        let mut spans = Vec::new();
        let end = self.match_from(0, &chars, 0, true, &mut spans)?;
        Some(self.build_match(trimmed, &chars, offset, 0, end, &spans))
    }

    /// Leftmost match anywhere in `input`
    pub fn find(&self, input: &str) -> Option<PatternMatch> {
        let chars: Vec<char> = input.chars().collect();
        for start in 0..chars.len() {
            let mut spans = Vec::new();
            if let Some(end) = self.match_from(0, &chars, start, false, &mut spans) {
                if end > start {
                    return Some(self.build_match(input, &chars, 0, start, end, &spans));
                }
            }
        }
        None
    }

    fn match_from(
        &self,
        index: usize,
        chars: &[char],
        pos: usize,
        full: bool,
        spans: &mut Vec<Range<usize>>,
    ) -> Option<usize> {
        let Some(segment) = self.segments.get(index) else {
            return (!full || pos == chars.len()).then_some(pos);
        };

        match segment {
            Segment::Literal(text) => {
                let end = pos + text.len();
                if end <= chars.len() && &chars[pos..end] == text.as_slice() {
                    self.match_from(index + 1, chars, end, full, spans)
                } else {
                    None
                }
            }
            Segment::Space => {
                let mut run = pos;
                while run < chars.len() && chars[run].is_whitespace() {
                    run += 1;
                }
                (pos..=run)
                    .rev()
                    .find_map(|end| self.match_from(index + 1, chars, end, full, spans))
            }
            Segment::Capture(_) => {
                let mut run = pos;
                while run < chars.len() && self.class.admits(chars[run]) {
                    run += 1;
                }
                for end in (pos + 1..=run).rev() {
                    if !self.class.accepts(&chars[pos..end]) {
                        continue;
                    }
                    spans.push(pos..end);
                    if let Some(done) = self.match_from(index + 1, chars, end, full, spans) {
                        return Some(done);
                    }
                    spans.pop();
                }
                None
            }
        }
    }

    fn build_match(
        &self,
        text: &str,
        chars: &[char],
        offset: usize,
        start: usize,
        end: usize,
        spans: &[Range<usize>],
    ) -> PatternMatch {
        let byte_at = |index: usize| -> usize {
            chars[..index].iter().map(|c| c.len_utf8()).sum::<usize>()
        };
        let names = self.segments.iter().filter_map(|segment| match segment {
            Segment::Capture(name) => Some(name.clone()),
            _ => None,
        });
        let captures = names
            .zip(spans)
            .map(|(name, span)| Capture {
                name,
                text: text[byte_at(span.start)..byte_at(span.end)].to_string(),
            })
            .collect();

        PatternMatch {
            range: offset + byte_at(start)..offset + byte_at(end),
            captures,
        }
    }
}

impl PatternRule {
    /// Bind the captures of a match to this rule's variables.
    ///
    /// Capture `i` binds to variable `i`, or to its placeholder name when the
    /// rule lists fewer variables. `resolve_type` recognises the prefix of a
    /// `type:value` capture.
    pub fn bind(
        &self,
        found: &PatternMatch,
        resolve_type: &dyn Fn(&str) -> Option<DataType>,
    ) -> Vec<BoundArg> {
        found
            .captures
            .iter()
            .enumerate()
            .map(|(index, capture)| {
                let declared = self.vars.get(index);
                let name = declared
                    .map(|var| var.name.clone())
                    .unwrap_or_else(|| capture.name.clone());
                let mut data_type = declared
                    .map(|var| var.data_type.clone())
                    .unwrap_or_default();
                let mut text = capture.text.clone();

                if let Some((prefix, value)) = capture.text.split_once(':') {
                    if let Some(typed) = resolve_type(prefix) {
                        data_type = typed;
                        text = value.to_string();
                    }
                }

                BoundArg {
                    name,
                    text,
                    data_type,
                }
            })
            .collect()
    }
}
