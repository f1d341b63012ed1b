use crate::tests::PRINT;
use crate::{InterpreterConfig, InterpreterSession, RuntimeError, TestHarnessError, Value};
use pretty_assertions::assert_eq;

const ADD: &str = r#"
method add : @int:a, @int:b => @int {
    return runexec => EZCode.add ~> a, b
}
"#;

fn session() -> InterpreterSession {
    let mut session = InterpreterSession::new().unwrap();
    session.evaluate(PRINT).unwrap();
    session
}

fn runtime_error(session: &mut InterpreterSession, code: &str) -> RuntimeError {
    match session.evaluate(code) {
        Err(TestHarnessError::Runtime { source }) => source,
        other => panic!("Expected Runtime error, got {other:?}"),
    }
}

#[test]
fn test_typed_method_returns_value() {
    let mut session = session();
    session.evaluate(ADD).unwrap();
    assert_eq!(session.evaluate("add : 2, 3").unwrap(), Value::Int(5));
    session
        .evaluate("undefined total => add : 10, 5")
        .unwrap();
    session.assert_evaluates_to_integer("total", 15).unwrap();
}

#[test]
fn test_argument_count_is_checked() {
    let mut session = session();
    session.evaluate(ADD).unwrap();
    let error = runtime_error(&mut session, "add : 1");
    assert_eq!(
        error.root_message(),
        "Method 'add' expects between 2 and 2 arguments, found 1"
    );
}

#[test]
fn test_argument_type_is_checked() {
    let mut session = session();
    session.evaluate(ADD).unwrap();
    let error = runtime_error(&mut session, "add : one, 2");
    assert_eq!(
        error.root_message(),
        "Parameter 'a' of 'add' expects @int, found string"
    );
}

#[test]
fn test_argument_tag_must_match_parameter_tag() {
    let mut session = session();
    session
        .evaluate("method st : @string:v\nreturn v\nmethod fl : @float:v\nreturn v\nmethod lg : @long:v\nreturn v")
        .unwrap();

    let error = runtime_error(&mut session, "st : 5");
    assert_eq!(
        error.root_message(),
        "Parameter 'v' of 'st' expects @string, found int"
    );
    let error = runtime_error(&mut session, "fl : 5");
    assert_eq!(
        error.root_message(),
        "Parameter 'v' of 'fl' expects @float, found int"
    );
    let error = runtime_error(&mut session, "lg : 5");
    assert_eq!(
        error.root_message(),
        "Parameter 'v' of 'lg' expects @long, found int"
    );

    session.assert_evaluates_to_text("st : five", "five").unwrap();
    assert_eq!(session.evaluate("fl : 2.5").unwrap(), Value::Float(2.5));
}

#[test]
fn test_untyped_parameters_accept_anything() {
    let mut session = session();
    session.evaluate("method echo : thing\nreturn thing").unwrap();
    session.assert_evaluates_to_text("echo : hello", "hello").unwrap();
    session.assert_evaluates_to_text("echo : 4.5", "4.5").unwrap();
}

#[test]
fn test_optional_parameters_bind_empty() {
    let mut session = session();
    session
        .evaluate("method greet : name, title ? {\nreturn runexec => EZCode.concat ~> name, title\n}")
        .unwrap();
    session.assert_evaluates_to_text("greet : Ann", "Ann").unwrap();
    session.assert_evaluates_to_text("greet : Ann, Dr", "AnnDr").unwrap();
}

#[test]
fn test_nocol_method_takes_arguments_directly() {
    let mut session = session();
    session
        .evaluate("nocol method shout : word\nreturn runexec => EZCode.concat ~> word, !")
        .unwrap();
    session.assert_evaluates_to_text("shout hey", "hey!").unwrap();
}

#[test]
fn test_colon_required_for_ordinary_methods() {
    let mut session = session();
    session.evaluate(ADD).unwrap();
    let error = runtime_error(&mut session, "add 1, 2");
    assert_eq!(error.root_message(), "Expected ':' after 'add', found '1'");
}

#[test]
fn test_return_stops_the_body() {
    let mut session = session();
    session
        .evaluate("method first {\nreturn early\nprint : never\n}")
        .unwrap();
    session.assert_evaluates_to_text("first", "early").unwrap();
    assert!(session.take_output().is_empty());
}

#[test]
fn test_return_from_inside_a_loop() {
    let mut session = session();
    session
        .evaluate("method find {\nloop 5 {\nreturn found\n}\nprint : never\n}")
        .unwrap();
    session.assert_evaluates_to_text("find", "found").unwrap();
    assert!(session.take_output().is_empty());
}

#[test]
fn test_parameters_do_not_leak() {
    let mut session = session();
    session.evaluate("method echo : thing\nreturn thing").unwrap();
    session.evaluate("echo : hi").unwrap();
    assert!(session.get_variable("thing").is_err());
}

#[test]
fn test_methods_see_globals() {
    let mut session = session();
    session
        .evaluate("undefined greeting => hello\nmethod speak\nprint : greeting")
        .unwrap();
    session.evaluate("speak").unwrap();
    assert_eq!(session.take_output(), vec!["hello"]);
}

#[test]
fn test_variable_cannot_shadow_method() {
    let mut session = session();
    let error = runtime_error(&mut session, "undefined print => 1");
    assert_eq!(error.root_message(), "'print' is already the name of a method");
}

#[test]
fn test_runaway_recursion_overflows() {
    let config = InterpreterConfig {
        max_call_depth: 8,
        ..InterpreterConfig::default()
    };
    let mut session = InterpreterSession::with_config(config);
    session.evaluate("method down : n\ndown : n").unwrap();
    match session.evaluate("down : 1") {
        Err(TestHarnessError::Runtime {
            source: RuntimeError::StackOverflow { max_depth },
        }) => assert_eq!(max_depth, 8),
        other => panic!("Expected StackOverflow, got {other:?}"),
    }
    assert_eq!(session.interpreter().stack.depth(), 0);
}
