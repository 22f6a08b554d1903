//! `describe` / `test` bindings
//!
//! `describe` only runs its body. `test` runs its body inside a catching
//! boundary and records one [`TestCaseResult`] per call; the marker is
//! cleared on entry and on exit so every test starts clean. Resource-limit
//! aborts are not caught here and end the whole run.

use tracing::debug;

use super::{report_value, TestCaseResult, TestRunner};
use crate::runtime::builtins::arg;
use crate::runtime::{EvalResult, Exception, Interpreter, Value};

/// Lines of an error's stack kept as `details` when it has none of its own
const STACK_LINES: usize = 3;

/// `describe(name, body)`
pub(crate) fn describe_function(interp: &Interpreter) -> Value {
    interp.native_function("describe", 2, |interp, _this, args| {
        let body = arg(args, 1);
        interp.call(&body, &Value::Undefined, &[])?;
        Ok(Value::Undefined)
    })
}

/// `test(name, body)`, also bound as `it`
pub(crate) fn test_function(runner: &TestRunner, interp: &Interpreter) -> Value {
    let runner = runner.clone();
    interp.native_function("test", 2, move |interp, _this, args| {
        let name = interp.to_string(&arg(args, 0))?.to_string();
        let body = arg(args, 1);

        runner.clear_marker();
        let outcome = interp.call(&body, &Value::Undefined, &[]);
        let result = match outcome {
            Ok(_) => passed(interp, &runner, &name),
            Err(Exception::Thrown(thrown)) => failed(interp, &name, &thrown),
            Err(abort) => Err(abort),
        };
        runner.clear_marker();

        let result = result?;
        debug!(test = %name, passed = result.passed, "test finished");
        runner.record(result);
        Ok(Value::Undefined)
    })
}

fn passed(interp: &mut Interpreter, runner: &TestRunner, name: &str) -> EvalResult<TestCaseResult> {
    let (actual, expected) = match runner.marker() {
        Some(marker) => {
            let actual = report_value(interp, &marker.actual)?;
            let expected = match &marker.expected {
                Some(expected) => report_value(interp, expected)?,
                None => None,
            };
            (actual, expected)
        }
        None => (None, None),
    };
    Ok(TestCaseResult::pass(name, actual, expected))
}

fn failed(interp: &mut Interpreter, name: &str, thrown: &Value) -> EvalResult<TestCaseResult> {
    // Only Error instances contribute a message.
    let message = match thrown {
        value if value.is_error() => match interp.get_property(value, "message") {
            Ok(Value::Undefined) | Err(Exception::Thrown(_)) => String::new(),
            Ok(message) => interp.to_string(&message)?.to_string(),
            Err(abort) => return Err(abort),
        },
        _ => "Test failed".to_string(),
    };

    let mut result = TestCaseResult::fail(name, message);
    if !matches!(thrown, Value::Object(_)) {
        return Ok(result);
    }

    if thrown.is_error() {
        if let Ok(Value::String(stack)) = interp.get_property(thrown, "stack") {
            let head: Vec<&str> = stack.lines().take(STACK_LINES).collect();
            result.details = Some(head.join("\n"));
        }
    }

    let actual = interp.get_property(thrown, "actual")?;
    if !actual.is_undefined() {
        result.actual = report_value(interp, &actual)?;
    }
    let expected = interp.get_property(thrown, "expected")?;
    if !expected.is_undefined() {
        result.expected = report_value(interp, &expected)?;
    }
    let details = interp.get_property(thrown, "details")?;
    if !details.is_undefined() {
        result.details = Some(interp.to_string(&details)?.to_string());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ResourceLimitKind};
    use crate::sandbox::{Sandbox, SandboxConfig};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(source: &str) -> Vec<TestCaseResult> {
        let runner = TestRunner::new();
        let mut sandbox = Sandbox::new(SandboxConfig::default());
        runner.install(&mut sandbox);
        sandbox.eval("tests", source).unwrap();
        runner.results()
    }

    #[test]
    fn test_passing_test_backfills_marker() {
        let results = run("test('sum', () => { expect(2 + 2).toBe(4) })");
        assert_eq!(results, vec![TestCaseResult::pass("sum", Some(json!(4)), Some(json!(4)))]);
    }

    #[test]
    fn test_passing_test_uses_last_expectation() {
        let results = run("test('two', () => { expect('a').toBe('a'); expect([1]).toEqual([1]) })");
        assert_eq!(results[0].actual, Some(json!([1])));
        assert_eq!(results[0].expected, Some(json!([1])));
    }

    #[test]
    fn test_failed_assertion_fields() {
        let results = run("test('bad', () => { expect(6).toBe(5) })");
        let result = &results[0];
        assert!(!result.passed);
        assert_eq!(result.error.as_deref(), Some("Expected 5, but got 6"));
        assert_eq!(result.actual, Some(json!(6)));
        assert_eq!(result.expected, Some(json!(5)));
    }

    #[test]
    fn test_thrown_values() {
        let results = run(
            "test('string', () => { throw 'plain words' });
             test('number', () => { throw 42 });
             test('type', () => { null.x });",
        );
        assert_eq!(results[0].error.as_deref(), Some("Test failed"));
        assert_eq!(results[0].details, None);
        assert_eq!(results[1].error.as_deref(), Some("Test failed"));
        assert_eq!(
            results[2].error.as_deref(),
            Some("Cannot read properties of null (reading 'x')")
        );
        assert!(results[2].details.as_deref().unwrap_or("").starts_with("TypeError:"));
    }

    #[test]
    fn test_custom_error_fields() {
        let results = run(
            "test('custom', () => {
                const e = new Error('nope');
                e.actual = { got: 1 };
                e.details = 'extra';
                throw e;
            })",
        );
        assert_eq!(results[0].actual, Some(json!({ "got": 1 })));
        assert_eq!(results[0].expected, None);
        assert_eq!(results[0].details.as_deref(), Some("extra"));
    }

    #[test]
    fn test_marker_cleared_between_tests() {
        let results = run(
            "test('first', () => { expect(1).toBe(2) });
             test('second', () => {});",
        );
        assert_eq!(results[1], TestCaseResult::pass("second", None, None));
    }

    #[test]
    fn test_describe_propagates_errors() {
        let runner = TestRunner::new();
        let mut sandbox = Sandbox::new(SandboxConfig::default());
        runner.install(&mut sandbox);
        let err = sandbox
            .eval("tests", "describe('suite', () => { missing() })")
            .unwrap_err();
        assert!(matches!(err, Error::Uncaught { ref name, .. } if name == "ReferenceError"));
        assert!(runner.results().is_empty());
    }

    #[test]
    fn test_limits_escape_test_boundary() {
        let runner = TestRunner::new();
        let mut sandbox = Sandbox::new(SandboxConfig {
            max_operations: 5_000,
            ..SandboxConfig::default()
        });
        runner.install(&mut sandbox);
        let err = sandbox
            .eval("tests", "test('spin', () => { for (;;) {} })")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimitError { kind: ResourceLimitKind::OperationLimit, .. }
        ));
        assert!(runner.results().is_empty());
    }
}
