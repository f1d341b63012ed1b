// EZCode Line Lexer
// Splits a single source line into parts with the pest grammar and classifies each part

use crate::ast::{Token, TokenKind};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "ezcode.pest"]
pub struct LineLexer;

/// Split a line into its raw parts: words, punctuation, `=>`, type annotations and a trailing comment
pub fn split_parts(text: &str) -> Vec<String> {
    match LineLexer::parse(Rule::line, text) {
        Ok(mut pairs) => {
            let mut parts = Vec::new();
            let Some(line) = pairs.next() else {
                return parts;
            };
            for pair in line.into_inner() {
                match pair.as_rule() {
                    Rule::comment
                    | Rule::arrow
                    | Rule::data_type
                    | Rule::delimiter
                    | Rule::word => parts.push(pair.as_str().to_string()),
                    _ => {}
                }
            }
            parts
        }
        Err(error) => {
            tracing::trace!("line grammar rejected {text:?}, splitting on whitespace: {error}");
            text.split_whitespace().map(str::to_string).collect()
        }
    }
}

/// Classify one part. Never fails: unknown text is an identifier.
pub fn classify(part: &str) -> TokenKind {
    if let Some(kind) = TokenKind::from_keyword(part) {
        return kind;
    }
    if part.starts_with("//") {
        TokenKind::Comment
    } else if part.starts_with('@') {
        TokenKind::DataType
    } else {
        TokenKind::Identifier
    }
}

/// Lex a line into text tokens, comments included
pub fn tokenize_line(text: &str) -> Vec<Token> {
    split_parts(text)
        .into_iter()
        .map(|part| Token::text(classify(&part), part))
        .collect()
}

/// Lex a line into the tokens that matter at run time
pub fn tokenize_code(text: &str) -> Vec<Token> {
    tokenize_line(text)
        .into_iter()
        .filter(|token| !token.is(TokenKind::Comment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::join_tokens;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize_line(text).iter().map(|token| token.kind).collect()
    }

    #[test]
    fn test_split_on_delimiters() {
        assert_eq!(
            split_parts("method add : @int:a, b ? => @int {"),
            vec!["method", "add", ":", "@int", ":", "a", ",", "b", "?", "=>", "@int", "{"]
        );
    }

    #[test]
    fn test_comment_consumes_rest_of_line() {
        assert_eq!(
            split_parts("x => 5 // set x, then {"),
            vec!["x", "=>", "5", "// set x, then {"]
        );
    }

    #[test]
    fn test_keywords_and_operators() {
        assert_eq!(
            kinds("if not a && b || c"),
            vec![
                TokenKind::If,
                TokenKind::Not,
                TokenKind::Identifier,
                TokenKind::And,
                TokenKind::Identifier,
                TokenKind::Or,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(kinds("null"), vec![TokenKind::Null]);
        assert_eq!(kinds("yield break"), vec![TokenKind::Yield, TokenKind::Break]);
    }

    #[test]
    fn test_type_annotation_joins_word() {
        let tokens = tokenize_line("@string");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::DataType);
        assert_eq!(tokens[0].as_text(), Some("@string"));
    }

    #[test]
    fn test_relex_joined_tokens_is_stable() {
        let line = "Point p new : x:3, y:4 // origin";
        let tokens = tokenize_line(line);
        assert_eq!(tokenize_line(&join_tokens(&tokens)), tokens);
    }

    #[test]
    fn test_code_tokens_drop_comments() {
        assert_eq!(tokenize_code("// only a comment"), Vec::new());
    }
}
