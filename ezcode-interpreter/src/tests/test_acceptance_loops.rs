use crate::tests::PRINT;
use crate::{InterpreterSession, RuntimeError, TestHarnessError};
use pretty_assertions::assert_eq;

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
fn test_counted_loop() {
    let mut session = session();
    session.evaluate("loop 3 {\nprint : tick\n}").unwrap();
    assert_eq!(session.take_output(), vec!["tick", "tick", "tick"]);
}

#[test]
fn test_zero_count_never_runs() {
    let mut session = session();
    session.evaluate("loop 0 {\nprint : tick\n}").unwrap();
    assert!(session.take_output().is_empty());
}

#[test]
fn test_count_from_variable() {
    let mut session = session();
    session
        .evaluate("undefined n => 2\nloop n\nprint : again")
        .unwrap();
    assert_eq!(session.take_output(), vec!["again", "again"]);
}

#[test]
fn test_condition_loop_reevaluates() {
    let mut session = session();
    session
        .evaluate(
            r#"
undefined count => 0
undefined running => yes
loop running {
    count => runexec => EZCode.add ~> count, 1
    if runexec => EZCode.equals ~> count, 4 : running => no
}
"#,
        )
        .unwrap();
    session.assert_evaluates_to_integer("count", 4).unwrap();
}

#[test]
fn test_break_ends_loop_immediately() {
    let mut session = session();
    session
        .evaluate(
            r#"
undefined i => 0
loop 10 {
    i => runexec => EZCode.add ~> i, 1
    if runexec => EZCode.equals ~> i, 3 : break
    print : i
}
"#,
        )
        .unwrap();
    session.assert_evaluates_to_integer("i", 3).unwrap();
    assert_eq!(session.take_output(), vec!["1", "2"]);
}

#[test]
fn test_yield_break_finishes_the_pass() {
    let mut session = session();
    session
        .evaluate(
            r#"
undefined i => 0
loop 10 {
    if runexec => EZCode.equals ~> i, 2 : yield break
    i => runexec => EZCode.add ~> i, 1
}
"#,
        )
        .unwrap();
    session.assert_evaluates_to_integer("i", 3).unwrap();
}

#[test]
fn test_yield_requires_break() {
    let mut session = session();
    let error = runtime_error(&mut session, "loop 2 {\nyield\n}");
    assert_eq!(error.root_message(), "'yield' must be followed by 'break'");
}

#[test]
fn test_fractional_count_is_a_type_error() {
    let mut session = session();
    let error = runtime_error(&mut session, "loop 2.5 {\nprint : tick\n}");
    assert_eq!(error.root_message(), "Could not convert '2.5' to int");
    assert!(session.take_output().is_empty());
}

#[test]
fn test_non_boolean_loop_condition() {
    let mut session = session();
    let error = runtime_error(&mut session, "loop maybe {\nprint : tick\n}");
    assert_eq!(error.root_message(), "'maybe' is not a boolean value");
}

#[test]
fn test_loop_variables_are_scoped_to_the_pass() {
    let mut session = session();
    session
        .evaluate("loop 2 {\nundefined inner => 1\nprint : inner\n}")
        .unwrap();
    assert_eq!(session.take_output(), vec!["1", "1"]);
    assert!(session.get_variable("inner").is_err());
}

#[test]
fn test_break_outside_loop_is_reported() {
    let mut session = session();
    let report = session.run("break\nprint : after").unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0].error, RuntimeError::Control { .. }));
    assert!(report.output.contains(&"after".to_string()));
}
