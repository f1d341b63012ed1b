use crate::tests::PRINT;
use crate::{HostError, InterpreterSession, RuntimeError, TestHarnessError, Value};
use pretty_assertions::assert_eq;

fn runtime_error(session: &mut InterpreterSession, code: &str) -> RuntimeError {
    match session.evaluate(code) {
        Err(TestHarnessError::Runtime { source }) => source,
        other => panic!("Expected Runtime error, got {other:?}"),
    }
}

#[test]
fn test_print_through_method() {
    let mut session = InterpreterSession::new().unwrap();
    session.evaluate(PRINT).unwrap();
    session.evaluate("print : hello world").unwrap();
    assert_eq!(session.take_output(), vec!["hello world"]);
}

#[test]
fn test_host_arguments_read_variables() {
    let mut session = InterpreterSession::new().unwrap();
    session
        .evaluate("undefined a => 6\nundefined b => 7\nundefined c => runexec => EZCode.multiply ~> a, b")
        .unwrap();
    session.assert_evaluates_to_integer("c", 42).unwrap();
}

#[test]
fn test_unknown_host_path() {
    let mut session = InterpreterSession::new().unwrap();
    let error = runtime_error(&mut session, "runexec => Nowhere.call ~> 1");
    assert_eq!(
        error.root_message(),
        "Host call 'Nowhere.call' failed: Host function 'Nowhere.call' not found"
    );
}

#[test]
fn test_host_division_by_zero() {
    let mut session = InterpreterSession::new().unwrap();
    let error = runtime_error(&mut session, "runexec => EZCode.divide ~> 1, 0");
    assert_eq!(
        error.root_message(),
        "Host call 'EZCode.divide' failed: Division by zero"
    );
}

#[test]
fn test_host_division_overflow_is_reported() {
    let mut session = InterpreterSession::new().unwrap();
    let error = runtime_error(
        &mut session,
        "runexec => EZCode.divide ~> -2147483648, -1",
    );
    assert_eq!(
        error.root_message(),
        "Host call 'EZCode.divide' failed: Invalid operation: integer overflow in -2147483648 / -1"
    );
    session.assert_evaluates_to_integer("runexec => EZCode.divide ~> 8, 2", 4).unwrap();
}

#[test]
fn test_dynamic_host_call_through_variable() {
    let mut session = InterpreterSession::new().unwrap();
    session
        .evaluate("undefined target => => EZCode.print ~> dyn\nrunexec => 'target'")
        .unwrap();
    assert_eq!(session.take_output(), vec!["dyn"]);

    let error = runtime_error(&mut session, "undefined plain => hello\nrunexec => 'plain'");
    assert_eq!(
        error.root_message(),
        "Host call ''plain'' failed: 'hello' is not a host call"
    );
}

#[test]
fn test_registered_host_function() {
    let mut session = InterpreterSession::new().unwrap();
    session
        .interpreter_mut()
        .host_mut()
        .register("Test.double", Some(1), |_, args| {
            let n = args[0].as_i64().ok_or_else(|| HostError::TypeMismatch {
                expected: "int".to_string(),
                found: args[0].to_text(),
            })?;
            Ok(Value::Long(n * 2))
        });
    assert_eq!(
        session.evaluate("runexec => Test.double ~> 21").unwrap(),
        Value::Long(42)
    );
    let error = runtime_error(&mut session, "runexec => Test.double ~> 1, 2");
    assert_eq!(
        error.root_message(),
        "Host call 'Test.double' failed: 'Test.double' expects 1 argument(s), found 2"
    );
}
