// Class parsing module
// Class headers and members: properties, methods, nested classes, pattern rules and converters

use crate::ast::*;
use crate::diagnostics::ParseWarning;
use crate::error::{ParseError, ParseResult};
use crate::lexer::{split_parts, tokenize_code};
use crate::parser::{commit_block, declares, find_block, find_word, take_block_or_next_line, EzParser};
use crate::pattern::{CaptureClass, Pattern};
use indexmap::IndexMap;
use std::rc::Rc;

impl EzParser {
    /// Parse `[static|semi|ontop] class <Name> {` and its members
    pub(crate) fn parse_class(&mut self, lines: &mut Vec<Line>) -> ParseResult<Rc<Class>> {
        let number = lines[0].number;
        let Some(block) = find_block(lines)? else {
            return Err(ParseError::expected_brace("class", number));
        };
        commit_block(lines, &block);

        let tokens = tokenize_code(&block.prefix);
        let mut settings = ClassSettings::default();
        let mut rest = tokens.as_slice();
        while let Some((token, tail)) = rest.split_first() {
            rest = tail;
            match token.kind {
                TokenKind::Static => settings.is_static = true,
                TokenKind::Semi => settings.semi = true,
                TokenKind::Ontop => settings.ontop = true,
                TokenKind::Class => break,
                _ => return Err(ParseError::missing_name("class", number)),
            }
        }
        let name = match rest {
            [token] if token.is(TokenKind::Identifier) => token.to_string(),
            _ => return Err(ParseError::missing_name("class", number)),
        };

        let mut class = Class {
            name,
            line: number,
            settings,
            properties: Vec::new(),
            methods: IndexMap::new(),
            classes: Vec::new(),
            watch: Vec::new(),
            params: None,
            type_of: None,
            converters: Vec::new(),
            inside_of: Vec::new(),
            length: block.consumed,
        };

        let mut body = block.body;
        while !body.is_empty() {
            self.parse_class_member(&mut class, &mut body)?;
        }

        Ok(Rc::new(class))
    }

    fn parse_class_member(&mut self, class: &mut Class, body: &mut Vec<Line>) -> ParseResult<()> {
        let line = body[0].clone();
        let parts = split_parts(&line.text);
        let tokens = tokenize_code(&line.text);
        if tokens.is_empty() {
            body.remove(0);
            return Ok(());
        }

        if declares(&parts, "class", &["static", "semi", "ontop"]) {
            let nested = self.parse_class(body)?;
            self.register_class(nested.clone());
            class.classes.push(nested);
            return Ok(());
        }

        if declares(&parts, "method", &["static", "nocol"]) {
            let method = Rc::new(self.parse_method(body)?);
            tracing::debug!("method {}.{}", class.name, method.name);
            if class
                .methods
                .insert(method.name.clone(), method.clone())
                .is_some()
            {
                self.push_warning(ParseWarning::DuplicateMethod {
                    name: format!("{}.{}", class.name, method.name),
                    line: method.line,
                });
            }
            return Ok(());
        }

        match tokens[0].kind {
            TokenKind::Explicit => {
                body.remove(0);
                self.parse_explicit(class, &line, &tokens)
            }
            TokenKind::Get => {
                let converter = self.parse_converter(body)?;
                class.converters.push(converter);
                Ok(())
            }
            TokenKind::Undefined => {
                body.remove(0);
                match tokens.as_slice() {
                    [_, name] if name.is(TokenKind::Identifier) => {
                        let variable = Variable::new(name.to_string(), DataType::UNTYPED, line.number);
                        add_property(class, variable, &line)
                    }
                    _ => Err(ParseError::invalid_property(&line.text, line.number)),
                }
            }
            _ if tokens.get(2).is_some_and(|token| token.is(TokenKind::New)) => {
                body.remove(0);
                let variable = self.parse_property(&line, &tokens)?;
                add_property(class, variable, &line)
            }
            _ => Err(ParseError::InvalidClassMember {
                text: line.text.clone(),
                line: line.number,
            }),
        }
    }

    /// `<Type> <name> new [: default]`
    fn parse_property(&self, line: &Line, tokens: &[Token]) -> ParseResult<Variable> {
        let invalid = || ParseError::invalid_property(&line.text, line.number);
        let (ty, name) = match tokens {
            [ty, name, ..]
                if matches!(ty.kind, TokenKind::Identifier | TokenKind::DataType)
                    && name.is(TokenKind::Identifier) =>
            {
                (ty, name)
            }
            _ => return Err(invalid()),
        };

        let default = match tokens.get(3) {
            None => None,
            Some(colon) if colon.is(TokenKind::Colon) => {
                let value = line
                    .text
                    .split_once(':')
                    .map(|(_, value)| value.trim())
                    .unwrap_or_default();
                if value.is_empty() {
                    return Err(invalid());
                }
                Some(value.to_string())
            }
            Some(_) => return Err(invalid()),
        };

        let mut variable = Variable::new(name.to_string(), self.data_type(&ty.to_string()), line.number);
        variable.default = default;
        Ok(variable)
    }

    /// `explicit watch|params|typeof|insideof ...`
    fn parse_explicit(&self, class: &mut Class, line: &Line, tokens: &[Token]) -> ParseResult<()> {
        let invalid = || ParseError::InvalidClassMember {
            text: line.text.clone(),
            line: line.number,
        };
        let Some(kind) = tokens.get(1).map(|token| token.kind) else {
            return Err(invalid());
        };

        match kind {
            TokenKind::Watch => {
                let rule = self.parse_rule(class, line, "watch", false)?;
                tracing::debug!("watch rule {:?} on {}", rule.pattern.source, class.name);
                class.watch.push(rule);
                Ok(())
            }
            TokenKind::Params => {
                let is_override = tokens.get(2).is_some_and(|token| token.is(TokenKind::Override));
                let rule = self.parse_rule(class, line, "params", is_override)?;
                tracing::debug!("constructor rule {:?} on {}", rule.pattern.source, class.name);
                class.params = Some(rule);
                Ok(())
            }
            TokenKind::TypeOf => {
                let types = self.types_after_arrow(tokens).ok_or_else(invalid)?;
                match types.as_slice() {
                    [data_type] => {
                        class.type_of = Some(data_type.clone());
                        Ok(())
                    }
                    _ => Err(invalid()),
                }
            }
            TokenKind::InsideOf => {
                let types = self.types_after_arrow(tokens).ok_or_else(invalid)?;
                if types.is_empty() {
                    return Err(invalid());
                }
                class.inside_of.extend(types);
                Ok(())
            }
            _ => Err(invalid()),
        }
    }

    /// Comma-separated types after `=>`
    fn types_after_arrow(&self, tokens: &[Token]) -> Option<Vec<DataType>> {
        let arrow = tokens.iter().position(|token| token.is(TokenKind::Arrow))?;
        tokens[arrow + 1..]
            .iter()
            .filter(|token| !token.is(TokenKind::Comma))
            .map(|token| match token.kind {
                TokenKind::DataType | TokenKind::Identifier => Some(self.data_type(&token.to_string())),
                _ => None,
            })
            .collect()
    }

    /// `<pattern> => <method> [: vars]` following `keyword`
    fn parse_rule(
        &self,
        class: &Class,
        line: &Line,
        keyword: &str,
        is_override: bool,
    ) -> ParseResult<PatternRule> {
        let Some(position) = find_word(&line.text, keyword) else {
            return Err(ParseError::invalid_pattern(&line.text, "missing rule keyword", line.number));
        };
        let mut rest = line.text[position + keyword.len()..].trim();
        if is_override {
            rest = rest.strip_prefix("override").unwrap_or(rest).trim();
        }

        let Some((pattern, target)) = rest.rsplit_once("=>") else {
            return Err(ParseError::invalid_pattern(rest, "missing '=>' and target method", line.number));
        };
        let (method, vars) = match target.split_once(':') {
            Some((method, vars)) => (method.trim(), Some(vars)),
            None => (target.trim(), None),
        };
        if method.is_empty() {
            return Err(ParseError::missing_name("=>", line.number));
        }
        if !class.methods.contains_key(method) && !self.methods.contains_key(method) {
            return Err(ParseError::UnknownPatternMethod {
                method: method.to_string(),
                line: line.number,
            });
        }

        let vars = match vars {
            Some(vars) => self.parse_params(&tokenize_code(vars), line.number)?,
            None => Vec::new(),
        };

        Ok(PatternRule {
            pattern: Pattern::compile(pattern, CaptureClass::Word, line.number)?,
            class_name: class.name.clone(),
            method: method.to_string(),
            vars,
            is_override,
            line: line.number,
        })
    }

    /// `get => @type` with a block or next-line body
    fn parse_converter(&mut self, body: &mut Vec<Line>) -> ParseResult<TypeConverter> {
        let number = body[0].number;
        let (header, lines) = take_block_or_next_line(body, "get")?;
        let tokens = tokenize_code(&header);
        let data_type = match tokens.as_slice() {
            [get, arrow, ty]
                if get.is(TokenKind::Get)
                    && arrow.is(TokenKind::Arrow)
                    && matches!(ty.kind, TokenKind::DataType | TokenKind::Identifier) =>
            {
                self.data_type(&ty.to_string())
            }
            _ => {
                return Err(ParseError::InvalidClassMember {
                    text: header,
                    line: number,
                })
            }
        };

        let method = Method {
            name: format!("get {data_type}"),
            line: number,
            settings: MethodSettings::default(),
            params: Vec::new(),
            returns: Some(data_type.clone()),
            body: self.parse_body(lines)?,
        };

        Ok(TypeConverter {
            data_type,
            method: Rc::new(method),
        })
    }
}

fn add_property(class: &mut Class, variable: Variable, line: &Line) -> ParseResult<()> {
    if class.property(&variable.name).is_some() {
        return Err(ParseError::invalid_property(&line.text, line.number));
    }
    class.properties.push(variable);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::ParseError;
    use crate::parser::EzParser;

    const POINT: &str = "class Point {
        int x new : 0
        int y new
        undefined label
        method set : a, b {
            x => a
            y => b
        }
        explicit params {a}, {b} => set : int:a, int:b
        explicit watch {v}++ => set
    }";

    #[test]
    fn test_class_members() {
        let mut parser = EzParser::new();
        let program = parser.parse_program(POINT).unwrap();
        let class = program.classes.get("Point").unwrap();

        assert_eq!(class.properties.len(), 3);
        assert_eq!(class.properties[0].default.as_deref(), Some("0"));
        assert_eq!(class.properties[0].data_type, DataType::primitive(TypeTag::Int));
        assert!(class.properties[2].data_type.is_untyped());
        assert!(class.methods.contains_key("set"));

        let params = class.params.as_ref().unwrap();
        assert_eq!(params.method, "set");
        assert_eq!(params.vars.len(), 2);
        assert_eq!(params.vars[1].name, "b");
        assert_eq!(class.watch.len(), 1);
        assert_eq!(class.length, 11);
    }

    #[test]
    fn test_watch_rule_binds_identifiers_after_declaration() {
        let mut parser = EzParser::new();
        let program = parser.parse_program(&format!("{POINT}\ncounter++")).unwrap();
        let last = program.lines.last().unwrap();
        match &last.tokens[0].value {
            TokenValue::Bound(call) => {
                assert_eq!(call.class_name, "Point");
                assert_eq!(call.method, "set");
                assert_eq!(call.args[0].name, "v");
                assert_eq!(call.args[0].text, "counter");
            }
            other => panic!("Expected bound call, got {other:?}"),
        }
    }

    #[test]
    fn test_typeof_insideof_and_converter() {
        let source = "class Outer {\n}\nclass Num {\nexplicit typeof => @int\nexplicit insideof => @Outer\nundefined value\nget => @string {\nreturn value\n}\n}";
        let program = EzParser::new().parse_program(source).unwrap();
        let class = program.classes.get("Num").unwrap();
        assert_eq!(class.type_of, Some(DataType::primitive(TypeTag::Int)));
        assert_eq!(class.inside_of, vec![DataType::class(TypeTag::Object, "Outer")]);
        assert_eq!(class.converters.len(), 1);
        assert_eq!(class.instance_type(), DataType::class(TypeTag::Int, "Num"));
    }

    #[test]
    fn test_nested_classes_register_globally() {
        let source = "class Outer {\nclass Inner {\nundefined v\n}\n}";
        let program = EzParser::new().parse_program(source).unwrap();
        assert!(program.classes.contains_key("Inner"));
        assert_eq!(program.classes.get("Outer").unwrap().classes.len(), 1);
    }

    #[test]
    fn test_unknown_pattern_method() {
        let source = "class A {\nexplicit watch {x}! => missing\n}";
        match EzParser::new().parse_program(source) {
            Err(ParseError::UnknownPatternMethod { method, .. }) => assert_eq!(method, "missing"),
            other => panic!("Expected UnknownPatternMethod, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_member() {
        match EzParser::new().parse_program("class A {\nprint : hi\n}") {
            Err(ParseError::InvalidClassMember { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected InvalidClassMember, got {other:?}"),
        }
    }

    #[test]
    fn test_class_requires_brace() {
        match EzParser::new().parse_program("class A\nundefined x") {
            Err(ParseError::ExpectedBrace { .. }) => {}
            other => panic!("Expected ExpectedBrace, got {other:?}"),
        }
    }
}
