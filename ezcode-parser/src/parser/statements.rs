// Statement parsing module
// if / elif / else / loop / try / fail headers with same-line, next-line or block bodies

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::parser::{commit_block, find_block, EzParser};

impl EzParser {
    pub(crate) fn parse_statement(
        &mut self,
        lines: &mut Vec<Line>,
        kind: StatementKind,
    ) -> ParseResult<Statement> {
        let header = lines[0].clone();
        let code = match header.text.find("//") {
            Some(comment) => &header.text[..comment],
            None => header.text.as_str(),
        };

        let (head, body) = if let Some(block) = find_block(lines)? {
            commit_block(lines, &block);
            (block.prefix, block.body)
        } else if let Some((head, body)) = code.split_once(':') {
            lines.remove(0);
            let body = body.trim();
            if body.is_empty() {
                return Err(ParseError::missing_body(kind.keyword(), header.number));
            }
            (head.to_string(), vec![Line::new(body, header.number)])
        } else if lines.len() > 1 {
            let body = lines.remove(1);
            lines.remove(0);
            (header.text.clone(), vec![body])
        } else {
            return Err(ParseError::missing_body(kind.keyword(), header.number));
        };

        let mut tokens = self.build_tokens(&head, header.number)?;
        if !tokens.is_empty() {
            tokens.remove(0);
        }

        let condition = if kind.is_conditional() {
            if tokens.is_empty() {
                return Err(ParseError::MissingCondition {
                    keyword: kind.keyword().to_string(),
                    line: header.number,
                });
            }
            Some(Condition::from_tokens(tokens))
        } else {
            None
        };

        let body = self.parse_body(body)?;
        tracing::debug!(
            "{} on line {} with {} body line(s)",
            kind,
            header.number,
            body.len()
        );

        Ok(Statement {
            kind,
            line: header.number,
            text: header.text,
            condition,
            body,
        })
    }
}
