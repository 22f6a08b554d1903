//! Matcher behavior as seen through full test runs

mod common;
use common::assertion;
use pretty_assertions::assert_eq;
use serde_json::json;

/// `(assertion that passes, assertion that fails)` for every matcher
const MATCHER_CASES: &[(&str, &str)] = &[
    ("expect(5).toBe(5)", "expect(6).toBe(5)"),
    ("expect({ a: [1, 2] }).toEqual({ a: [1, 2] })", "expect({ a: 1 }).toEqual({ a: 2 })"),
    ("expect(0.1 + 0.2).toBeCloseTo(0.3)", "expect(0.5).toBeCloseTo(0.3)"),
    ("expect(undefined).toBeUndefined()", "expect(0).toBeUndefined()"),
    ("expect(null).toBeDefined()", "expect(undefined).toBeDefined()"),
    ("expect(null).toBeNull()", "expect(undefined).toBeNull()"),
    ("expect('x').toBeTruthy()", "expect('').toBeTruthy()"),
    ("expect(0).toBeFalsy()", "expect([]).toBeFalsy()"),
    ("expect(() => { throw new Error('x') }).toThrow()", "expect(() => 1).toThrow()"),
    ("expect([1, 2, 3]).toHaveLength(3)", "expect('ab').toHaveLength(3)"),
    ("expect([1, 2, 3]).toContain(2)", "expect([1, 2, 3]).toContain('2')"),
    ("expect('hello').toContain('ell')", "expect('hello').toContain('z')"),
    ("expect(3).toBeGreaterThan(2)", "expect(2).toBeGreaterThan(2)"),
    ("expect(2).toBeGreaterThanOrEqual(2)", "expect(1).toBeGreaterThanOrEqual(2)"),
    ("expect(1).toBeLessThan(2)", "expect(2).toBeLessThan(2)"),
    ("expect(2).toBeLessThanOrEqual(2)", "expect(3).toBeLessThanOrEqual(2)"),
];

#[test]
fn test_every_matcher_passes_and_fails() {
    for (pass, fail) in MATCHER_CASES {
        let passed = assertion("", pass);
        assert!(passed.passed, "{} should pass: {:?}", pass, passed.error);
        let failed = assertion("", fail);
        assert!(!failed.passed, "{} should fail", fail);
        assert!(failed.error.is_some(), "{} has no message", fail);
    }
}

#[test]
fn test_negated_matchers_invert() {
    for (pass, fail) in MATCHER_CASES {
        let negated_pass = pass.replacen(").to", ").not.to", 1);
        let negated_fail = fail.replacen(").to", ").not.to", 1);
        assert!(!assertion("", &negated_pass).passed, "{} should fail", negated_pass);
        assert!(assertion("", &negated_fail).passed, "{} should pass", negated_fail);
    }
}

#[test]
fn test_to_be_failure_fields() {
    let result = assertion("", "expect(6).toBe(5)");
    assert_eq!(result.error.as_deref(), Some("Expected 5, but got 6"));
    assert_eq!(result.actual, Some(json!(6)));
    assert_eq!(result.expected, Some(json!(5)));
}

#[test]
fn test_to_be_is_identity_for_objects() {
    let result = assertion("", "expect([1]).toBe([1])");
    assert!(!result.passed);
    assert_eq!(result.error.as_deref(), Some("Expected [1], but got [1]"));
}

#[test]
fn test_to_equal_is_structural() {
    let result = assertion(
        "interface User { name: string; age: number }\nconst user: User = { name: 'Ada', age: 36 }",
        "expect(user).toEqual({ name: 'Ada', age: 36 })",
    );
    assert!(result.passed);
    assert_eq!(result.actual, Some(json!({ "name": "Ada", "age": 36 })));

    // Key order is part of the comparison.
    let reordered = assertion("", "expect({ a: 1, b: 2 }).toEqual({ b: 2, a: 1 })");
    assert!(!reordered.passed);
}

#[test]
fn test_to_be_close_to_precision() {
    assert!(assertion("", "expect(3.14159).toBeCloseTo(3.14, 2)").passed);
    let result = assertion("", "expect(3.14159).toBeCloseTo(3.15, 2)");
    assert_eq!(
        result.error.as_deref(),
        Some("Expected 3.15 (within 2 decimals), but got 3.14159")
    );
    assert_eq!(result.details.as_deref(), Some("Precision: 2 decimals"));
}

#[test]
fn test_to_have_length_details() {
    let result = assertion("", "expect([1, 2]).toHaveLength(3)");
    assert_eq!(result.error.as_deref(), Some("Expected length 3, but got 2"));
    assert_eq!(result.details.as_deref(), Some("Array/String has 2 items/characters"));
    assert_eq!(result.actual, Some(json!(2)));
    assert_eq!(result.expected, Some(json!(3)));
}

#[test]
fn test_to_throw_requires_function() {
    let result = assertion("", "expect(42).toThrow()");
    assert!(!result.passed);
    assert_eq!(result.error.as_deref(), Some("Expected a function"));
}

#[test]
fn test_first_failing_assertion_ends_the_test() {
    let result = assertion("", "expect(1).toBe(2); expect(3).toBe(3)");
    assert!(!result.passed);
    assert_eq!(result.actual, Some(json!(1)));
}

#[test]
fn test_last_expectation_backfills_success() {
    let result = assertion("", "expect(1).toBe(1); expect('last').toBe('last')");
    assert!(result.passed);
    assert_eq!(result.actual, Some(json!("last")));
    assert_eq!(result.expected, Some(json!("last")));
}

#[test]
fn test_only_errors_supply_messages() {
    let result = assertion("", "throw 'plain string'");
    assert_eq!(result.error.as_deref(), Some("Test failed"));
    assert_eq!(result.details, None);

    let result = assertion("", "throw new TypeError('bad input')");
    assert_eq!(result.error.as_deref(), Some("bad input"));

    let result = assertion("", "throw 42");
    assert_eq!(result.error.as_deref(), Some("Test failed"));

    let result = assertion("", "const failure = { message: 'not an error', actual: 1, details: 'shape' }; throw failure");
    assert_eq!(result.error.as_deref(), Some("Test failed"));
    assert_eq!(result.details.as_deref(), Some("shape"));
}
