//! `expect(actual)` and its matchers
//!
//! `expect` records `actual` in the run's marker and returns an object whose
//! methods are natives closed over `actual`. Matchers that compare against
//! an expected value write it to the marker before comparing. A failed
//! matcher throws an `Error` carrying own `actual`, `expected` and `details`
//! fields, which the `test` boundary copies into the result.
//!
//! Every expectation also has a `.not` property with the same matchers and
//! the pass condition inverted.

use std::rc::Rc;

use super::TestRunner;
use crate::error::ErrorKind;
use crate::runtime::builtins::{arg, json};
use crate::runtime::{EvalResult, Exception, Interpreter, Value};

/// Default number of decimals compared by `toBeCloseTo`
const DEFAULT_PRECISION: f64 = 2.0;

// ---------------------------------------------------------------------------
// Expectation
// ---------------------------------------------------------------------------

/// State shared by the matcher methods of one `expect(...)` result.
struct Expectation {
    runner: TestRunner,
    actual: Value,
    negated: bool,
}

/// Extra fields attached to a failure.
#[derive(Default)]
struct Payload {
    actual: Option<Value>,
    expected: Option<Value>,
    details: Option<String>,
}

impl Payload {
    fn values(actual: &Value, expected: &Value) -> Self {
        Self {
            actual: Some(actual.clone()),
            expected: Some(expected.clone()),
            details: None,
        }
    }
}

impl Expectation {
    /// Whether the assertion holds once `.not` is taken into account.
    fn holds(&self, pass: bool) -> bool {
        pass != self.negated
    }

    /// Pick the failure message for the current polarity.
    fn phrase(&self, positive: String, negative: impl FnOnce() -> String) -> String {
        if self.negated {
            negative()
        } else {
            positive
        }
    }

    fn expected(&self, expected: &Value) {
        self.runner.set_expected(expected.clone());
    }

    fn fail(&self, interp: &Interpreter, message: String, payload: Payload) -> Exception {
        let error = interp.create_error(ErrorKind::GenericError, &message);
        if let Value::Object(obj) = &error {
            let mut o = obj.borrow_mut();
            if let Some(actual) = payload.actual {
                o.properties.set("actual".into(), actual);
            }
            if let Some(expected) = payload.expected {
                o.properties.set("expected".into(), expected);
            }
            if let Some(details) = payload.details {
                o.properties.set("details".into(), Value::from(details));
            }
        }
        Exception::Thrown(error)
    }
}

/// `JSON.stringify(value)` as it reads inside a message
fn json_text(interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
    Ok(json::stringify(interp, value)?.unwrap_or_else(|| "undefined".to_string()))
}

/// `String(value)` as it reads inside a message
fn text(interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
    Ok(interp.to_string(value)?.to_string())
}

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

type Matcher = fn(&Expectation, &mut Interpreter, &[Value]) -> EvalResult<()>;

const MATCHERS: &[(&str, u32, Matcher)] = &[
    ("toBe", 1, to_be),
    ("toEqual", 1, to_equal),
    ("toBeCloseTo", 2, to_be_close_to),
    ("toBeUndefined", 0, to_be_undefined),
    ("toBeDefined", 0, to_be_defined),
    ("toBeNull", 0, to_be_null),
    ("toBeTruthy", 0, to_be_truthy),
    ("toBeFalsy", 0, to_be_falsy),
    ("toThrow", 0, to_throw),
    ("toHaveLength", 1, to_have_length),
    ("toContain", 1, to_contain),
    ("toBeGreaterThan", 1, to_be_greater_than),
    ("toBeGreaterThanOrEqual", 1, to_be_greater_than_or_equal),
    ("toBeLessThan", 1, to_be_less_than),
    ("toBeLessThanOrEqual", 1, to_be_less_than_or_equal),
];

fn to_be(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    let expected = arg(args, 0);
    exp.expected(&expected);
    if exp.holds(exp.actual.strict_equals(&expected)) {
        return Ok(());
    }
    let want = json_text(interp, &expected)?;
    let got = json_text(interp, &exp.actual)?;
    let message = exp.phrase(format!("Expected {}, but got {}", want, got), || {
        format!("Expected {} not to be {}", got, want)
    });
    Err(exp.fail(interp, message, Payload::values(&exp.actual, &expected)))
}

fn to_equal(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    let expected = arg(args, 0);
    exp.expected(&expected);
    let want = json::stringify(interp, &expected)?;
    let got = json::stringify(interp, &exp.actual)?;
    if exp.holds(want == got) {
        return Ok(());
    }
    let want = want.unwrap_or_else(|| "undefined".to_string());
    let got = got.unwrap_or_else(|| "undefined".to_string());
    let message = exp.phrase(format!("Expected {}, but got {}", want, got), || {
        format!("Expected {} not to equal {}", got, want)
    });
    Err(exp.fail(interp, message, Payload::values(&exp.actual, &expected)))
}

/// JavaScript `Math.round`
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn to_be_close_to(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    let expected = arg(args, 0);
    exp.expected(&expected);
    let precision = match arg(args, 1) {
        Value::Undefined => DEFAULT_PRECISION,
        other => interp.to_number(&other)?,
    };
    let factor = 10f64.powf(precision);
    let a = interp.to_number(&exp.actual)?;
    let e = interp.to_number(&expected)?;
    if exp.holds(round_half_up(a * factor) == round_half_up(e * factor)) {
        return Ok(());
    }
    let want = text(interp, &expected)?;
    let got = text(interp, &exp.actual)?;
    let digits = text(interp, &Value::Number(precision))?;
    let message = exp.phrase(
        format!("Expected {} (within {} decimals), but got {}", want, digits, got),
        || format!("Expected {} not to be close to {} (within {} decimals)", got, want, digits),
    );
    let mut payload = Payload::values(&exp.actual, &expected);
    payload.details = Some(format!("Precision: {} decimals", digits));
    Err(exp.fail(interp, message, payload))
}

fn to_be_undefined(exp: &Expectation, interp: &mut Interpreter, _args: &[Value]) -> EvalResult<()> {
    exp.expected(&Value::Undefined);
    if exp.holds(exp.actual.is_undefined()) {
        return Ok(());
    }
    let got = json_text(interp, &exp.actual)?;
    let message = exp.phrase(format!("Expected undefined, but got {}", got), || {
        "Expected value not to be undefined".to_string()
    });
    Err(exp.fail(interp, message, Payload::values(&exp.actual, &Value::Undefined)))
}

fn to_be_defined(exp: &Expectation, interp: &mut Interpreter, _args: &[Value]) -> EvalResult<()> {
    if exp.holds(!exp.actual.is_undefined()) {
        return Ok(());
    }
    let got = json_text(interp, &exp.actual)?;
    let message = exp.phrase("Expected value to be defined, but got undefined".to_string(), || {
        format!("Expected value to be undefined, but got {}", got)
    });
    let payload = Payload {
        actual: Some(exp.actual.clone()),
        ..Payload::default()
    };
    Err(exp.fail(interp, message, payload))
}

fn to_be_null(exp: &Expectation, interp: &mut Interpreter, _args: &[Value]) -> EvalResult<()> {
    exp.expected(&Value::Null);
    if exp.holds(matches!(exp.actual, Value::Null)) {
        return Ok(());
    }
    let got = json_text(interp, &exp.actual)?;
    let message = exp.phrase(format!("Expected null, but got {}", got), || {
        "Expected value not to be null".to_string()
    });
    Err(exp.fail(interp, message, Payload::values(&exp.actual, &Value::Null)))
}

fn truthiness(exp: &Expectation, interp: &mut Interpreter, truthy: bool) -> EvalResult<()> {
    if exp.holds(exp.actual.to_boolean() == truthy) {
        return Ok(());
    }
    let got = json_text(interp, &exp.actual)?;
    let (want, other) = if truthy { ("truthy", "falsy") } else { ("falsy", "truthy") };
    let message = exp.phrase(format!("Expected {} to be {}", got, want), || {
        format!("Expected {} to be {}", got, other)
    });
    let payload = Payload {
        actual: Some(exp.actual.clone()),
        ..Payload::default()
    };
    Err(exp.fail(interp, message, payload))
}

fn to_be_truthy(exp: &Expectation, interp: &mut Interpreter, _args: &[Value]) -> EvalResult<()> {
    truthiness(exp, interp, true)
}

fn to_be_falsy(exp: &Expectation, interp: &mut Interpreter, _args: &[Value]) -> EvalResult<()> {
    truthiness(exp, interp, false)
}

fn to_throw(exp: &Expectation, interp: &mut Interpreter, _args: &[Value]) -> EvalResult<()> {
    if !exp.actual.is_callable() {
        return Err(exp.fail(interp, "Expected a function".to_string(), Payload::default()));
    }
    let threw = match interp.call(&exp.actual, &Value::Undefined, &[]) {
        Ok(_) => false,
        Err(Exception::Thrown(_)) => true,
        Err(abort) => return Err(abort),
    };
    if exp.holds(threw) {
        return Ok(());
    }
    if exp.negated {
        let payload = Payload {
            details: Some("Function threw an error".to_string()),
            ..Payload::default()
        };
        return Err(exp.fail(interp, "Expected function not to throw".to_string(), payload));
    }
    let payload = Payload {
        details: Some("Function did not throw an error".to_string()),
        ..Payload::default()
    };
    Err(exp.fail(interp, "Expected function to throw".to_string(), payload))
}

fn to_have_length(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    let expected = arg(args, 0);
    exp.expected(&expected);
    let length = if exp.actual.is_nullish() {
        Value::Undefined
    } else {
        interp.get_property(&exp.actual, "length")?
    };
    if exp.holds(length.strict_equals(&expected)) {
        return Ok(());
    }
    let want = text(interp, &expected)?;
    let got = text(interp, &length)?;
    let message = exp.phrase(format!("Expected length {}, but got {}", want, got), || {
        format!("Expected length not to be {}", want)
    });
    let mut payload = Payload::values(&length, &expected);
    payload.details = Some(format!("Array/String has {} items/characters", got));
    Err(exp.fail(interp, message, payload))
}

fn to_contain(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    let item = arg(args, 0);
    exp.expected(&item);
    let found = match &exp.actual {
        Value::String(haystack) => {
            let needle = interp.to_string(&item)?;
            haystack.contains(&*needle)
        }
        other => interp
            .iterate(other)?
            .iter()
            .any(|element| element.strict_equals(&item)),
    };
    if exp.holds(found) {
        return Ok(());
    }
    let want = json_text(interp, &item)?;
    let got = json_text(interp, &exp.actual)?;
    let message = exp.phrase(format!("Expected {} to contain {}", got, want), || {
        format!("Expected {} not to contain {}", got, want)
    });
    Err(exp.fail(interp, message, Payload::values(&exp.actual, &item)))
}

fn compare(
    exp: &Expectation,
    interp: &mut Interpreter,
    args: &[Value],
    relation: &str,
    test: fn(f64, f64) -> bool,
) -> EvalResult<()> {
    let expected = arg(args, 0);
    exp.expected(&expected);
    let a = interp.to_number(&exp.actual)?;
    let e = interp.to_number(&expected)?;
    if exp.holds(test(a, e)) {
        return Ok(());
    }
    let want = text(interp, &expected)?;
    let got = text(interp, &exp.actual)?;
    let message = exp.phrase(format!("Expected {} to be {} {}", got, relation, want), || {
        format!("Expected {} not to be {} {}", got, relation, want)
    });
    Err(exp.fail(interp, message, Payload::values(&exp.actual, &expected)))
}

fn to_be_greater_than(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    compare(exp, interp, args, "greater than", |a, e| a > e)
}

fn to_be_greater_than_or_equal(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    compare(exp, interp, args, "greater than or equal to", |a, e| a >= e)
}

fn to_be_less_than(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    compare(exp, interp, args, "less than", |a, e| a < e)
}

fn to_be_less_than_or_equal(exp: &Expectation, interp: &mut Interpreter, args: &[Value]) -> EvalResult<()> {
    compare(exp, interp, args, "less than or equal to", |a, e| a <= e)
}

// ---------------------------------------------------------------------------
// expect
// ---------------------------------------------------------------------------

fn expectation_object(interp: &Interpreter, expectation: Rc<Expectation>) -> Value {
    let object = interp.new_object();
    for &(name, length, matcher) in MATCHERS {
        let exp = expectation.clone();
        let method = interp.native_function(name, length, move |interp, _this, args| {
            matcher(&exp, interp, args)?;
            Ok(Value::Undefined)
        });
        object.borrow_mut().properties.define(name.into(), method, false);
    }
    Value::Object(object)
}

/// `expect(actual)`
pub(crate) fn expect_function(runner: &TestRunner, interp: &Interpreter) -> Value {
    let runner = runner.clone();
    interp.native_function("expect", 1, move |interp, _this, args| {
        let actual = arg(args, 0);
        runner.set_actual(actual.clone());

        let positive = expectation_object(
            interp,
            Rc::new(Expectation {
                runner: runner.clone(),
                actual: actual.clone(),
                negated: false,
            }),
        );
        let negative = expectation_object(
            interp,
            Rc::new(Expectation {
                runner: runner.clone(),
                actual,
                negated: true,
            }),
        );
        if let Value::Object(obj) = &positive {
            obj.borrow_mut().properties.define("not".into(), negative, false);
        }
        Ok(positive)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{Sandbox, SandboxConfig};
    use crate::test_runner::TestCaseResult;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(source: &str) -> Vec<TestCaseResult> {
        let runner = TestRunner::new();
        let mut sandbox = Sandbox::new(SandboxConfig::default());
        runner.install(&mut sandbox);
        sandbox.eval("tests", source).unwrap();
        runner.results()
    }

    fn single(body: &str) -> TestCaseResult {
        let mut results = run(&format!("test('case', () => {{ {} }})", body));
        assert_eq!(results.len(), 1);
        results.remove(0)
    }

    fn passes(body: &str) -> bool {
        single(body).passed
    }

    #[test]
    fn test_to_be() {
        assert!(passes("expect(5).toBe(5)"));
        let result = single("expect(6).toBe(5)");
        assert_eq!(result.error.as_deref(), Some("Expected 5, but got 6"));
        assert_eq!((result.actual, result.expected), (Some(json!(6)), Some(json!(5))));
        assert!(!passes("expect({}).toBe({})"));
        assert!(passes("expect(NaN).not.toBe(NaN)"));
        assert_eq!(
            single("expect('a').toBe('b')").error.as_deref(),
            Some("Expected \"b\", but got \"a\"")
        );
    }

    #[test]
    fn test_to_equal() {
        assert!(passes("expect({ a: [1, 2] }).toEqual({ a: [1, 2] })"));
        assert!(passes("expect([1, undefined]).toEqual([1, null])"));
        let result = single("expect([2, 1]).toEqual([1, 2])");
        assert_eq!(result.error.as_deref(), Some("Expected [1,2], but got [2,1]"));
        assert_eq!(result.actual, Some(json!([2, 1])));
        assert!(!passes("expect({ a: 1, b: 2 }).toEqual({ b: 2, a: 1 })"));
    }

    #[test]
    fn test_to_equal_circular() {
        let result = single("const c = {}; c.c = c; expect(c).toEqual(c)");
        assert!(!result.passed);
        assert!(result.error.unwrap_or_default().contains("circular"));
    }

    #[test]
    fn test_to_be_close_to() {
        assert!(passes("expect(0.1 + 0.2).toBeCloseTo(0.3)"));
        assert!(passes("expect(3.14159).toBeCloseTo(3.14, 2)"));
        let result = single("expect(3.2).toBeCloseTo(3.14)");
        assert_eq!(result.error.as_deref(), Some("Expected 3.14 (within 2 decimals), but got 3.2"));
        assert_eq!(result.details.as_deref(), Some("Precision: 2 decimals"));
        assert_eq!(result.expected, Some(json!(3.14)));
    }

    #[test]
    fn test_to_be_undefined_and_friends() {
        assert!(passes("expect(undefined).toBeUndefined()"));
        let result = single("expect(0).toBeUndefined()");
        assert_eq!(result.error.as_deref(), Some("Expected undefined, but got 0"));
        assert_eq!(result.expected, None);
        assert!(passes("expect(null).toBeNull()"));
        assert!(passes("expect(0).toBeDefined()"));
        assert!(passes("expect('x').toBeTruthy()"));
        assert!(passes("expect('').toBeFalsy()"));
        assert!(!passes("expect([]).toBeFalsy()"));
    }

    #[test]
    fn test_to_throw() {
        assert!(passes("expect(() => { throw new Error() }).toThrow()"));
        let result = single("expect(() => 1).toThrow()");
        assert_eq!(result.error.as_deref(), Some("Expected function to throw"));
        assert_eq!(result.details.as_deref(), Some("Function did not throw an error"));
        assert_eq!(single("expect(1).toThrow()").error.as_deref(), Some("Expected a function"));
        assert!(passes("expect(() => 1).not.toThrow()"));
    }

    #[test]
    fn test_to_have_length() {
        assert!(passes("expect([1, 2, 3]).toHaveLength(3)"));
        assert!(passes("expect('héllo').toHaveLength(5)"));
        let result = single("expect([1]).toHaveLength(2)");
        assert_eq!(result.error.as_deref(), Some("Expected length 2, but got 1"));
        assert_eq!(result.actual, Some(json!(1)));
        assert_eq!(result.details.as_deref(), Some("Array/String has 1 items/characters"));
        let result = single("expect(null).toHaveLength(0)");
        assert_eq!(result.error.as_deref(), Some("Expected length 0, but got undefined"));
    }

    #[test]
    fn test_to_contain_and_comparisons() {
        assert!(passes("expect([1, 2, 3]).toContain(2)"));
        assert!(passes("expect('hello world').toContain('world')"));
        assert!(passes("expect(new Set(['a'])).toContain('a')"));
        assert!(!passes("expect([{ a: 1 }]).toContain({ a: 1 })"));
        assert!(passes("expect(10).toBeGreaterThan(9)"));
        assert!(passes("expect(10).toBeGreaterThanOrEqual(10)"));
        assert!(passes("expect(1).toBeLessThan(2)"));
        assert!(passes("expect(2).toBeLessThanOrEqual(2)"));
        assert_eq!(
            single("expect(1).toBeGreaterThan(2)").error.as_deref(),
            Some("Expected 1 to be greater than 2")
        );
    }

    #[test]
    fn test_not_messages() {
        assert_eq!(
            single("expect(3).not.toBe(3)").error.as_deref(),
            Some("Expected 3 not to be 3")
        );
        assert_eq!(
            single("expect([1]).not.toEqual([1])").error.as_deref(),
            Some("Expected [1] not to equal [1]")
        );
    }

    #[test]
    fn test_expect_records_marker_eagerly() {
        let results = run("test('only expect', () => { expect(7) })");
        assert_eq!(results[0], TestCaseResult::pass("only expect", Some(json!(7)), None));
    }
}
