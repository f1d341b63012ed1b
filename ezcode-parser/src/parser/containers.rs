// Container parsing module

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::lexer::tokenize_code;
use crate::parser::{commit_block, find_block, EzParser};

impl EzParser {
    /// Parse `container <Name> {` whose body lines each name a registered class
    pub(crate) fn parse_container(&mut self, lines: &mut Vec<Line>) -> ParseResult<Container> {
        let number = lines[0].number;
        let Some(block) = find_block(lines)? else {
            return Err(ParseError::expected_brace("container", number));
        };
        commit_block(lines, &block);

        let tokens = tokenize_code(&block.prefix);
        let name = match tokens.as_slice() {
            [keyword, name] if keyword.is(TokenKind::Container) && name.is(TokenKind::Identifier) => {
                name.to_string()
            }
            _ => return Err(ParseError::missing_name("container", number)),
        };

        let mut classes = Vec::new();
        for line in &block.body {
            for member in tokenize_code(&line.text) {
                if member.is(TokenKind::Comma) {
                    continue;
                }
                let member = member.to_string();
                if !self.classes.contains_key(&member) {
                    return Err(ParseError::UnknownContainerMember {
                        container: name,
                        name: member,
                        line: line.number,
                    });
                }
                classes.push(member);
            }
        }

        tracing::debug!("container {name} with {} class(es)", classes.len());
        Ok(Container {
            name,
            line: number,
            classes,
        })
    }
}
