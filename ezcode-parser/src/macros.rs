// EZCode Macro Rewrite
// `make <take> => <replace>` declarations rewrite the source lines that follow them

use crate::ast::Line;
use crate::error::{ParseError, ParseResult};
use crate::pattern::{CaptureClass, Pattern, PatternMatch};

/// A compiled `make` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct MacroRule {
    /// One pattern per take line
    pub take: Vec<Pattern>,
    /// Replacement template lines
    pub replace: Vec<String>,
    pub line: usize,
}

/// Read the `make` declaration starting at `index`, remove its lines and rewrite every later line
pub fn expand(lines: &mut Vec<Line>, index: usize) -> ParseResult<()> {
    let rule = read_declaration(lines, index)?;
    tracing::debug!(
        "macro on line {}: {} take line(s), {} replace line(s)",
        rule.line,
        rule.take.len(),
        rule.replace.len()
    );
    rule.apply(lines, index);
    Ok(())
}

fn read_declaration(lines: &mut Vec<Line>, index: usize) -> ParseResult<MacroRule> {
    let header = lines.remove(index);
    let number = header.number;
    let Some(rest) = header.text.trim().strip_prefix("make") else {
        return Err(ParseError::invalid_macro("expected 'make'", number));
    };
    let rest = rest.trim();

    let (take_lines, replace_text) = if rest == "{" {
        let mut take = Vec::new();
        loop {
            if index >= lines.len() {
                return Err(ParseError::UnclosedBlock { line: number });
            }
            let next = lines.remove(index);
            let text = next.text.trim();
            if let Some(closing) = text.strip_prefix('}') {
                let Some(replace) = closing.trim().strip_prefix("=>") else {
                    return Err(ParseError::invalid_macro(
                        "multi-line take must be closed by '} => <replace>'",
                        next.number,
                    ));
                };
                break (take, replace.trim().to_string());
            }
            take.push(text.to_string());
        }
    } else {
        let Some((take, replace)) = rest.split_once("=>") else {
            return Err(ParseError::invalid_macro("missing '=>'", number));
        };
        (vec![take.trim().to_string()], replace.trim().to_string())
    };

    if take_lines.is_empty() || take_lines.iter().any(|take| take.is_empty()) {
        return Err(ParseError::invalid_macro("take template is empty", number));
    }

    let replace = if replace_text == "{" {
        let mut replace = Vec::new();
        loop {
            if index >= lines.len() {
                return Err(ParseError::UnclosedBlock { line: number });
            }
            let next = lines.remove(index);
            if next.text.trim().starts_with('}') {
                break replace;
            }
            replace.push(next.text.trim().to_string());
        }
    } else {
        vec![replace_text]
    };

    let take = take_lines
        .iter()
        .map(|text| Pattern::compile(text, CaptureClass::NonSpace, number))
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(MacroRule {
        take,
        replace,
        line: number,
    })
}

impl MacroRule {
    /// Rewrite `lines[from..]` in place. A match advances past its replacement lines.
    pub fn apply(&self, lines: &mut Vec<Line>, from: usize) {
        let mut index = from;
        while index < lines.len() {
            let inserted = if self.take.len() == 1 {
                self.apply_single(lines, index)
            } else {
                self.apply_window(lines, index)
            };
            index += inserted.unwrap_or(1);
        }
    }

    fn apply_single(&self, lines: &mut Vec<Line>, index: usize) -> Option<usize> {
        let line = &lines[index];
        let found = self.take[0].find(&line.text)?;
        let prefix = &line.text[..found.range.start];
        let suffix = &line.text[found.range.end..];
        let filled = self.fill(&[found.clone()]);

        let last = filled.len().saturating_sub(1);
        let number = line.number;
        let remainder = format!("{prefix} {suffix}");
        let mut rewritten: Vec<Line> = filled
            .into_iter()
            .enumerate()
            .map(|(position, text)| {
                let mut text = text;
                if position == 0 {
                    text = format!("{prefix}{text}");
                }
                if position == last {
                    text.push_str(suffix);
                }
                Line::new(text.trim(), number)
            })
            .collect();
        if rewritten.is_empty() && !remainder.trim().is_empty() {
            rewritten.push(Line::new(remainder.trim(), number));
        }

        // an empty rewrite leaves `index` on the next unchecked line
        let count = rewritten.len();
        tracing::trace!("macro rewrote line {number}");
        lines.splice(index..=index, rewritten);
        Some(count)
    }

    fn apply_window(&self, lines: &mut Vec<Line>, index: usize) -> Option<usize> {
        let end = index + self.take.len();
        if end > lines.len() {
            return None;
        }
        let matches = self
            .take
            .iter()
            .zip(&lines[index..end])
            .map(|(pattern, line)| pattern.find(&line.text))
            .collect::<Option<Vec<_>>>()?;

        let number = lines[index].number;
        let rewritten: Vec<Line> = self
            .fill(&matches)
            .into_iter()
            .map(|text| Line::new(text.trim(), number))
            .collect();
        let count = rewritten.len();

        tracing::trace!("macro rewrote lines {number}..{}", lines[end - 1].number);
        lines.splice(index..end, rewritten);
        Some(count)
    }

    fn fill(&self, matches: &[PatternMatch]) -> Vec<String> {
        let lookup = |name: &str| matches.iter().find_map(|found| found.get(name));
        self.replace
            .iter()
            .map(|template| substitute(template, &lookup))
            .collect()
    }
}

/// Replace `{name}` placeholders and unescape `\{` and `\}`
fn substitute<'a>(template: &str, lookup: &dyn Fn(&str) -> Option<&'a str>) -> String {
    let mut output = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some('{') | Some('}')) => {
                if let Some(brace) = chars.next() {
                    output.push(brace);
                }
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                match lookup(name.trim()) {
                    Some(value) if closed => output.push_str(value),
                    _ => {
                        output.push('{');
                        output.push_str(&name);
                        if closed {
                            output.push('}');
                        }
                    }
                }
            }
            c => output.push(c),
        }
    }

    output
}
