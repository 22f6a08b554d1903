//! Test runner for learner submissions
//!
//! A [`TestRunner`] owns everything one run accumulates: the flat list of
//! [`TestCaseResult`]s, the pass flag, and the last-expectation marker that
//! backfills `actual`/`expected` on passing tests. It is installed into a
//! single [`Sandbox`] as the `describe`, `test`, `it` and `expect` globals;
//! those bindings share the runner and nothing else does, so two runs can
//! never observe each other's marker.
//!
//! # Example
//!
//! ```no_run
//! use mission_runner::test_runner::run_tests;
//!
//! let report = run_tests(
//!     "export function add(a: number, b: number): number { return a + b }",
//!     "test('adds', () => { expect(add(1, 2)).toBe(3) })",
//! );
//! assert!(report.passed);
//! println!("{}", report);
//! ```

pub mod matchers;
pub mod orchestrator;
pub mod report;
pub mod shim;

pub use orchestrator::{run_tests, Orchestrator};
pub use report::{TestCaseResult, TestRunReport};

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::builtins::json;
use crate::runtime::{EvalResult, Exception, Interpreter, Value};
use crate::sandbox::Sandbox;

// ---------------------------------------------------------------------------
// Marker
// ---------------------------------------------------------------------------

/// The most recent `expect(actual)` call and the value its matcher compared
/// against, if the matcher had one.
#[derive(Debug, Clone)]
pub(crate) struct Marker {
    pub actual: Value,
    pub expected: Option<Value>,
}

#[derive(Debug)]
struct RunState {
    results: Vec<TestCaseResult>,
    marker: Option<Marker>,
    all_passed: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            marker: None,
            all_passed: true,
        }
    }
}

// ---------------------------------------------------------------------------
// TestRunner
// ---------------------------------------------------------------------------

/// Per-run test registry.
///
/// Cloning is cheap and yields a handle to the same run; the shim bindings
/// each hold one.
#[derive(Debug, Clone, Default)]
pub struct TestRunner {
    state: Rc<RefCell<RunState>>,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `describe`, `test`, `it` and `expect` in the sandbox.
    pub fn install(&self, sandbox: &mut Sandbox) {
        let interp = sandbox.interpreter();
        let describe = shim::describe_function(interp);
        let test = shim::test_function(self, interp);
        let expect = matchers::expect_function(self, interp);
        sandbox.define_global("describe", describe);
        sandbox.define_global("test", test.clone());
        sandbox.define_global("it", test);
        sandbox.define_global("expect", expect);
    }

    /// Results recorded so far, in call order.
    pub fn results(&self) -> Vec<TestCaseResult> {
        self.state.borrow().results.clone()
    }

    /// `false` once any test has failed.
    pub fn all_passed(&self) -> bool {
        self.state.borrow().all_passed
    }

    /// Aggregate the recorded results into a report.
    pub fn report(&self) -> TestRunReport {
        let state = self.state.borrow();
        TestRunReport::from_results(state.results.clone(), state.all_passed)
    }

    pub(crate) fn record(&self, result: TestCaseResult) {
        let mut state = self.state.borrow_mut();
        if !result.passed {
            state.all_passed = false;
        }
        state.results.push(result);
    }

    pub(crate) fn set_actual(&self, actual: Value) {
        self.state.borrow_mut().marker = Some(Marker {
            actual,
            expected: None,
        });
    }

    pub(crate) fn set_expected(&self, expected: Value) {
        if let Some(marker) = self.state.borrow_mut().marker.as_mut() {
            marker.expected = Some(expected);
        }
    }

    pub(crate) fn marker(&self) -> Option<Marker> {
        self.state.borrow().marker.clone()
    }

    pub(crate) fn clear_marker(&self) {
        self.state.borrow_mut().marker = None;
    }
}

/// A script value as it appears in a report: `JSON.stringify` semantics,
/// `None` for `undefined`, functions and values that cannot be serialized.
pub(crate) fn report_value(interp: &mut Interpreter, value: &Value) -> EvalResult<Option<serde_json::Value>> {
    match json::to_json_value(interp, value) {
        Ok(json) => Ok(json),
        Err(Exception::Thrown(_)) => Ok(None),
        Err(abort) => Err(abort),
    }
}
