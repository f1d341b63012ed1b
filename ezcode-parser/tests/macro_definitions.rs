use ezcode_parser::{parse_program, ParseError, StatementKind, TokenValue};

#[test]
fn test_macro_lines_produce_no_tokens() {
    let input = r#"
make greet {who} => print : hello {who}
"#;
    let result = parse_program(input).unwrap();
    assert!(result.lines.is_empty());
}

#[test]
fn test_macro_applies_to_every_following_line() {
    let input = r#"
make inc {v} => {v} => runexec => EZCode.add ~> {v}, 1
inc a
inc b
"#;
    let result = parse_program(input).unwrap();
    let texts: Vec<&str> = result.lines.iter().map(|line| line.line.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "a => runexec => EZCode.add ~> a, 1",
            "b => runexec => EZCode.add ~> b, 1",
        ]
    );
}

#[test]
fn test_empty_macro_removes_consecutive_matches() {
    let input = r#"
make drop {x} => {
}
drop a
drop b
print : end
"#;
    let result = parse_program(input).unwrap();
    let texts: Vec<&str> = result.lines.iter().map(|line| line.line.text.as_str()).collect();
    assert_eq!(texts, vec!["print : end"]);
}

#[test]
fn test_macro_does_not_touch_earlier_lines() {
    let input = r#"
shout x
make shout {v} => print : {v}
shout y
"#;
    let result = parse_program(input).unwrap();
    assert_eq!(result.lines[0].line.text, "shout x");
    assert_eq!(result.lines[1].line.text, "print : y");
}

#[test]
fn test_multi_line_take() {
    let input = r#"
make {
start {name}
finish
} => print : ran {name}
start job
finish
"#;
    let result = parse_program(input).unwrap();
    assert_eq!(result.lines.len(), 1);
    assert_eq!(result.lines[0].line.text, "print : ran job");
    assert_eq!(result.lines[0].line.number, 6);
}

#[test]
fn test_expanded_statement_is_parsed_structurally() {
    let input = r#"
make when {c} then {a} => if {c} : {a}
when ready then go
"#;
    let result = parse_program(input).unwrap();
    match &result.lines[0].tokens[0].value {
        TokenValue::Statement(statement) => {
            assert_eq!(statement.kind, StatementKind::If);
            assert_eq!(statement.condition.as_ref().unwrap().text, "ready");
            assert_eq!(statement.body[0].line.text, "go");
        }
        other => panic!("Expected statement, got {other:?}"),
    }
}

#[test]
fn test_macro_without_arrow() {
    match parse_program("make nothing") {
        Err(ParseError::InvalidMacro { line, .. }) => assert_eq!(line, 1),
        other => panic!("Expected InvalidMacro, got {other:?}"),
    }
}
