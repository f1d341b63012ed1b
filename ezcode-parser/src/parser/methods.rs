// Method parsing module
// Handles method headers, modifiers, parameter lists and return types

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::lexer::tokenize_code;
use crate::parser::{take_block_or_next_line, EzParser};

impl EzParser {
    /// Parse `[static] [nocol] method <name> [: params] [=> @type]` and its body
    pub(crate) fn parse_method(&mut self, lines: &mut Vec<Line>) -> ParseResult<Method> {
        let number = lines[0].number;
        let (header, body) = take_block_or_next_line(lines, "method")?;
        let tokens = tokenize_code(&header);

        let mut settings = MethodSettings::default();
        let mut rest = tokens.as_slice();
        while let Some((token, tail)) = rest.split_first() {
            rest = tail;
            match token.kind {
                TokenKind::Static => settings.is_static = true,
                TokenKind::NoCol => settings.nocol = true,
                TokenKind::Method => break,
                _ => return Err(ParseError::missing_name("method", number)),
            }
        }

        let name = match rest.split_first() {
            Some((token, tail)) if token.is(TokenKind::Identifier) => {
                rest = tail;
                token.to_string()
            }
            _ => return Err(ParseError::missing_name("method", number)),
        };

        let (param_tokens, return_tokens) =
            match rest.iter().position(|token| token.is(TokenKind::Arrow)) {
                Some(arrow) => (&rest[..arrow], Some(&rest[arrow + 1..])),
                None => (rest, None),
            };

        let params = match param_tokens.split_first() {
            None => Vec::new(),
            Some((colon, params)) if colon.is(TokenKind::Colon) => {
                self.parse_params(params, number)?
            }
            Some(_) => {
                return Err(ParseError::invalid_parameter(
                    join_tokens(param_tokens),
                    number,
                ))
            }
        };

        let returns = match return_tokens {
            None => None,
            Some([token]) if matches!(token.kind, TokenKind::DataType | TokenKind::Identifier) => {
                Some(self.data_type(&token.to_string()))
            }
            Some(other) => {
                return Err(ParseError::invalid_parameter(
                    format!("=> {}", join_tokens(other)),
                    number,
                ))
            }
        };

        let body = self.parse_body(body)?;
        tracing::debug!("parsed method {name} on line {number}");

        Ok(Method {
            name,
            line: number,
            settings,
            params,
            returns,
            body,
        })
    }

    /// Parse comma-separated parameters. A `?` makes that parameter and every later one optional.
    pub(crate) fn parse_params(&self, tokens: &[Token], line: usize) -> ParseResult<Vec<Variable>> {
        let mut params = Vec::new();
        let mut optional = false;

        for group in tokens.split(|token| token.is(TokenKind::Comma)) {
            let mut group: Vec<&Token> = group.iter().collect();
            if group.is_empty() {
                return Err(ParseError::invalid_parameter(",", line));
            }
            while group
                .last()
                .is_some_and(|token| token.is(TokenKind::QuestionMark))
            {
                group.pop();
                optional = true;
            }

            let (data_type, name) = match group.as_slice() {
                [name] if name.is(TokenKind::Identifier) => (DataType::UNTYPED, name),
                [ty, name] if ty.is(TokenKind::DataType) && name.is(TokenKind::Identifier) => {
                    (self.data_type(&ty.to_string()), name)
                }
                [ty, colon, name]
                    if matches!(ty.kind, TokenKind::DataType | TokenKind::Identifier)
                        && colon.is(TokenKind::Colon)
                        && name.is(TokenKind::Identifier) =>
                {
                    (self.data_type(&ty.to_string()), name)
                }
                _ => {
                    let text = group
                        .iter()
                        .map(|token| token.to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    return Err(ParseError::invalid_parameter(text, line));
                }
            };

            let mut variable = Variable::new(name.to_string(), data_type, line);
            variable.required = !optional;
            params.push(variable);
        }

        Ok(params)
    }
}
