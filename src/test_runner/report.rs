//! Test-run report types
//!
//! These are the JSON payloads handed back to callers. Field names are
//! camelCase and optional fields are omitted rather than serialized as
//! `null`, so an `undefined` script value simply does not appear.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sandbox::OutputEntry;

// ---------------------------------------------------------------------------
// TestCaseResult
// ---------------------------------------------------------------------------

/// Outcome of one `test(...)` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl TestCaseResult {
    /// A passing result carrying the last recorded expectation.
    pub fn pass(
        name: impl Into<String>,
        actual: Option<serde_json::Value>,
        expected: Option<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            actual,
            expected,
            details: None,
        }
    }

    /// A failing result with the thrown error's message.
    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            actual: None,
            expected: None,
            details: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TestRunReport
// ---------------------------------------------------------------------------

/// Aggregated outcome of one run of learner code against a test script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunReport {
    pub passed: bool,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub results: Vec<TestCaseResult>,
    /// Set only when the run aborted before the test list was complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub console: Vec<OutputEntry>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl TestRunReport {
    /// Aggregate a completed result list.
    /// `all_passed` is the run flag the shim clears on any failed test.
    pub fn from_results(results: Vec<TestCaseResult>, all_passed: bool) -> Self {
        let passed_tests = results.iter().filter(|r| r.passed).count();
        let failed_tests = results.len() - passed_tests;
        Self {
            passed: all_passed && failed_tests == 0,
            total_tests: results.len(),
            passed_tests,
            failed_tests,
            results,
            error: None,
            console: Vec::new(),
            duration_ms: 0,
        }
    }

    /// The report for a run that aborted: no results, zero counts.
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            total_tests: 0,
            passed_tests: 0,
            failed_tests: 0,
            results: Vec::new(),
            error: Some(error.into()),
            console: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn with_console(mut self, console: Vec<OutputEntry>) -> Self {
        self.console = console;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// `totalTests == passedTests + failedTests == results.len()` and
    /// `passed == (failedTests == 0 && error is absent)`.
    pub fn is_consistent(&self) -> bool {
        self.total_tests == self.passed_tests + self.failed_tests
            && self.total_tests == self.results.len()
            && self.passed == (self.failed_tests == 0 && self.error.is_none())
    }

    /// Serialize to the JSON shape returned to clients.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for TestRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Test Report")?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;

        if let Some(error) = &self.error {
            writeln!(f, "\n  ✗ Run aborted")?;
            writeln!(f, "      {}", error)?;
        }

        if !self.results.is_empty() {
            writeln!(f)?;
        }
        for result in &self.results {
            let icon = if result.passed { "✓" } else { "✗" };
            writeln!(f, "    {} {}", icon, result.name)?;
            if let Some(error) = &result.error {
                writeln!(f, "      {}", error)?;
            }
            if !result.passed {
                if let Some(expected) = &result.expected {
                    writeln!(f, "      expected: {}", expected)?;
                }
                if let Some(actual) = &result.actual {
                    writeln!(f, "      actual:   {}", actual)?;
                }
                if let Some(details) = &result.details {
                    for line in details.lines() {
                        writeln!(f, "      {}", line)?;
                    }
                }
            }
        }

        if !self.console.is_empty() {
            writeln!(f, "\n  Console")?;
            for entry in &self.console {
                writeln!(f, "    [{:?}] {}", entry.level, entry.message)?;
            }
        }

        writeln!(f, "\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "  Total: {}  Passed: {}  Failed: {}",
            self.total_tests, self.passed_tests, self.failed_tests
        )?;
        writeln!(f, "  Duration: {}ms", self.duration_ms)?;
        writeln!(f, "  Result: {}", if self.passed { "PASSED" } else { "FAILED" })?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_counts() {
        let report = TestRunReport::from_results(
            vec![
                TestCaseResult::pass("a", Some(json!(1)), Some(json!(1))),
                TestCaseResult::fail("b", "Expected 6, but got 0"),
            ],
            false,
        );
        assert_eq!(report.total_tests, 2);
        assert_eq!(report.passed_tests, 1);
        assert_eq!(report.failed_tests, 1);
        assert!(!report.passed);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_empty_run_passes() {
        let report = TestRunReport::from_results(Vec::new(), true);
        assert!(report.passed);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_aborted_report_json() {
        let report = TestRunReport::aborted("SyntaxError: Unexpected token");
        assert!(report.is_consistent());
        assert_eq!(
            report.to_json(),
            json!({
                "passed": false,
                "totalTests": 0,
                "passedTests": 0,
                "failedTests": 0,
                "results": [],
                "error": "SyntaxError: Unexpected token",
                "durationMs": 0
            })
        );
    }

    #[test]
    fn test_optional_fields_omitted() {
        let value = serde_json::to_value(TestCaseResult::pass("empty", None, None)).unwrap();
        assert_eq!(value, json!({ "name": "empty", "passed": true }));
    }

    #[test]
    fn test_display() {
        let mut failed = TestCaseResult::fail("sums", "Expected 6, but got 0");
        failed.actual = Some(json!(0));
        failed.expected = Some(json!(6));
        let report = TestRunReport::from_results(vec![TestCaseResult::pass("empty", None, None), failed], false);
        let text = report.to_string();
        assert!(text.contains("✓ empty"));
        assert!(text.contains("✗ sums"));
        assert!(text.contains("expected: 6"));
        assert!(text.contains("Total: 2  Passed: 1  Failed: 1"));
        assert!(text.contains("Result: FAILED"));
    }
}
