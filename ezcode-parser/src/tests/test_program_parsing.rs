use crate::{parse_host_call, parse_program, EzParser, TokenKind, TokenValue};
use pretty_assertions::assert_eq;

#[test]
fn test_lines_keep_source_numbers() {
    let program = parse_program("\n\nx => 1\n\n// note\nprint : x").unwrap();
    let numbers: Vec<usize> = program.lines.iter().map(|line| line.line.number).collect();
    assert_eq!(numbers, vec![3, 6]);
}

#[test]
fn test_declarations_become_structural_tokens() {
    let program = parse_program("method greet : name\nprint : name\nclass A {\n}").unwrap();
    assert_eq!(program.lines.len(), 2);
    assert_eq!(program.lines[0].first_kind(), Some(TokenKind::Method));
    assert_eq!(program.lines[1].first_kind(), Some(TokenKind::Class));
}

#[test]
fn test_host_call_token_takes_rest_of_line() {
    let program = parse_program("x => runexec => EZCode.add ~> 1, 2").unwrap();
    let tokens = &program.lines[0].tokens;
    assert_eq!(tokens.len(), 3);
    match &tokens[2].value {
        TokenValue::HostCall(call) => {
            assert_eq!(call.path, "EZCode.add");
            assert_eq!(call.args, vec!["1".to_string(), "2".to_string()]);
        }
        other => panic!("Expected host call, got {other:?}"),
    }
}

#[test]
fn test_parse_host_call_text() {
    let call = parse_host_call("runexec => EZCode.print ~> hi").unwrap();
    assert_eq!(call.path, "EZCode.print");
    let bare = parse_host_call("=> EZCode.print").unwrap();
    assert!(bare.args.is_empty());
    assert!(parse_host_call("print : hi").is_none());
}

#[test]
fn test_macro_rewrites_before_lexing() {
    let program = parse_program("make twice {x} => {x} {x}\nprint : twice hi").unwrap();
    assert_eq!(program.lines.len(), 1);
    assert_eq!(program.lines[0].line.text, "print : hi hi");
}

#[test]
fn test_nested_statements_in_method_body() {
    let source = "method check : n {\n  if n {\n    return yes\n  } else {\n    return no\n  }\n}";
    let program = parse_program(source).unwrap();
    let method = program.methods.get("check").unwrap();
    assert_eq!(method.body.len(), 2);
    assert_eq!(method.body[0].first_kind(), Some(TokenKind::If));
    assert_eq!(method.body[1].first_kind(), Some(TokenKind::Else));
}

#[test]
fn test_parser_tables_persist_between_inputs() {
    let mut parser = EzParser::new();
    parser.parse_program("class Box {\nundefined v\n}").unwrap();
    let program = parser.parse_program("Box b new").unwrap();
    assert!(program.classes.contains_key("Box"));
    assert_eq!(program.lines.len(), 1);
}
