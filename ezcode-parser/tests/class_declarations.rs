use ezcode_parser::{parse_program, DataType, EzParser, TokenValue, TypeTag};
use pretty_assertions::assert_eq;

const SHAPES: &str = r#"
class Vec2 {
    float x new : 0
    float y new : 0
    method set : @float:a, @float:b {
        x => a
        y => b
    }
    explicit params {a}, {b} => set
}

ontop class Counter {
    int count new : 0
    nocol method bump {
        count => runexec => EZCode.add ~> count, 1
    }
    explicit watch {name}++ => bump
}

container Geometry {
    Vec2
    Counter
}
"#;

#[test]
fn test_classes_and_container_tables() {
    let program = parse_program(SHAPES).unwrap();
    assert_eq!(
        program.classes.keys().cloned().collect::<Vec<_>>(),
        vec!["Vec2".to_string(), "Counter".to_string()]
    );
    assert!(program.classes["Counter"].settings.ontop);
    assert_eq!(
        program.containers["Geometry"].classes,
        vec!["Vec2".to_string(), "Counter".to_string()]
    );
}

#[test]
fn test_constructor_rule_without_vars_uses_placeholder_names() {
    let program = parse_program(SHAPES).unwrap();
    let rule = program.classes["Vec2"].params.clone().unwrap();
    assert!(rule.vars.is_empty());
    assert!(!rule.is_override);

    let found = rule.pattern.match_full("3, 4").unwrap();
    let args = rule.bind(&found, &|_| None);
    assert_eq!(args[0].name, "a");
    assert_eq!(args[0].text, "3");
    assert_eq!(args[1].name, "b");
    assert_eq!(args[1].text, "4");
}

#[test]
fn test_typed_capture_prefix() {
    let program = parse_program(SHAPES).unwrap();
    let rule = program.classes["Vec2"].params.clone().unwrap();
    let found = rule.pattern.match_full("int:3, 4").unwrap();
    let args = rule.bind(&found, &|name| TypeTag::from_name(name).map(DataType::primitive));
    assert_eq!(args[0].text, "3");
    assert_eq!(args[0].data_type, DataType::primitive(TypeTag::Int));
    assert!(args[1].data_type.is_untyped());
}

#[test]
fn test_watch_rules_apply_to_later_lines_only() {
    let mut parser = EzParser::new();
    let program = parser.parse_program(&format!("clicks++\n{SHAPES}\nclicks++")).unwrap();
    let first = &program.lines[0].tokens[0];
    assert!(matches!(first.value, TokenValue::Text(_)));
    let last = &program.lines.last().unwrap().tokens[0];
    match &last.value {
        TokenValue::Bound(call) => {
            assert_eq!(call.class_name, "Counter");
            assert_eq!(call.method, "bump");
            assert_eq!(call.source, "clicks++");
        }
        other => panic!("Expected bound call, got {other:?}"),
    }
}

#[test]
fn test_override_constructor_rule() {
    let source = "class P {\nmethod make_it : v\nreturn v\nexplicit params override <{v}> => make_it\n}";
    let program = parse_program(source).unwrap();
    let rule = program.classes["P"].params.clone().unwrap();
    assert!(rule.is_override);
    assert_eq!(rule.pattern.source, "<{v}>");
}

#[test]
fn test_unknown_property_type_is_a_forward_class_reference() {
    let program = parse_program("class Node {\nNode next new\n}").unwrap();
    let property = program.classes["Node"].property("next").unwrap().clone();
    assert_eq!(property.data_type, DataType::class(TypeTag::Object, "Node"));
    assert_eq!(property.default, None);
}
