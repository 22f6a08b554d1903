//! Test-run orchestration
//!
//! One run: strip both inputs, build a fresh [`Sandbox`] and [`TestRunner`]
//! on a dedicated worker thread, evaluate learner code, then test code, and
//! fold the recorded results into a [`TestRunReport`]. Any failure outside
//! a `test` body yields the degraded report instead of an error.

use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{TestRunReport, TestRunner};
use crate::error::{Error, Result};
use crate::sandbox::{Sandbox, SandboxConfig};
use crate::strip::{looks_like_typescript, StripRules, TypeStripper};

/// Run learner code against a test script with the default configuration.
pub fn run_tests(learner_code: &str, test_code: &str) -> TestRunReport {
    Orchestrator::default().run(learner_code, test_code)
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Reusable run settings; every [`run`](Orchestrator::run) still gets its
/// own sandbox.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: SandboxConfig,
    learner: TypeStripper,
    tests: TypeStripper,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

impl Orchestrator {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            learner: TypeStripper::learner(),
            tests: TypeStripper::test_code(),
        }
    }

    /// Replace the rewrite rules applied to each input.
    pub fn with_rules(mut self, learner: StripRules, tests: StripRules) -> Self {
        self.learner = TypeStripper::new(learner);
        self.tests = TypeStripper::new(tests);
        self
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Execute one test run. Never fails: problems are reported in the
    /// report's `error` field.
    pub fn run(&self, learner_code: &str, test_code: &str) -> TestRunReport {
        let start = Instant::now();
        info!(
            learner_bytes = learner_code.len(),
            test_bytes = test_code.len(),
            "starting test run"
        );

        let report = match self.prepare(learner_code, test_code) {
            Ok((learner, tests)) => self.spawn(learner, tests),
            Err(e) => TestRunReport::aborted(e.to_string()),
        };
        let report = report.with_duration(start.elapsed());

        match &report.error {
            Some(error) => warn!(duration_ms = report.duration_ms, "test run aborted: {}", error),
            None => info!(
                passed = report.passed,
                total = report.total_tests,
                failed = report.failed_tests,
                duration_ms = report.duration_ms,
                "test run finished"
            ),
        }
        report
    }

    fn prepare(&self, learner_code: &str, test_code: &str) -> Result<(String, String)> {
        if looks_like_typescript(learner_code) {
            debug!("learner code contains type syntax");
        }
        let learner = self.learner.strip(learner_code)?;
        let tests = self.tests.strip(test_code)?;
        debug!(code = %learner, "stripped learner code");
        debug!(code = %tests, "stripped test code");
        Ok((learner, tests))
    }

    fn spawn(&self, learner: String, tests: String) -> TestRunReport {
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name("mission-run".to_string())
            .stack_size(config.stack_size)
            .spawn(move || execute(config, &learner, &tests));
        match handle {
            Ok(handle) => handle
                .join()
                .unwrap_or_else(|_| TestRunReport::aborted("Test execution panicked")),
            Err(e) => TestRunReport::aborted(Error::from(e).to_string()),
        }
    }
}

/// Evaluate learner code, then test code, in one fresh sandbox.
fn execute(config: SandboxConfig, learner: &str, tests: &str) -> TestRunReport {
    let runner = TestRunner::new();
    let mut sandbox = Sandbox::new(config);
    runner.install(&mut sandbox);

    let outcome = sandbox
        .eval("learner code", learner)
        .and_then(|_| sandbox.eval("test code", tests));
    let console = sandbox.take_console_output();

    match outcome {
        Ok(_) => runner.report().with_console(console),
        Err(e) => TestRunReport::aborted(e.to_string()).with_console(console),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::OutputLevel;
    use serde_json::json;

    #[test]
    fn test_full_pass() {
        let report = run_tests(
            "export function sum(numbers: number[]): number { return numbers.reduce((a, n) => a + n, 0) }",
            "import { sum } from './sum';
             describe('sum', () => {
               test('adds numbers', () => { expect(sum([1, 2, 3, 4, 5])).toBe(15) });
               test('empty list', () => { expect(sum([])).toBe(0) });
             });",
        );
        assert!(report.passed, "{}", report);
        assert_eq!(report.total_tests, 2);
        assert_eq!(report.passed_tests, 2);
        assert_eq!(report.failed_tests, 0);
        assert_eq!(report.error, None);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_partial_failure() {
        let report = run_tests(
            "export function sum(numbers: number[]): number { return 0 }",
            "test('adds', () => { expect(sum([1, 2, 3])).toBe(6) })",
        );
        assert!(!report.passed);
        assert_eq!((report.total_tests, report.failed_tests), (1, 1));
        let result = &report.results[0];
        assert!(!result.passed);
        assert_eq!(result.actual, Some(json!(0)));
        assert_eq!(result.expected, Some(json!(6)));
    }

    #[test]
    fn test_execution_abort() {
        let report = run_tests(
            "export function sum(numbers: number[]): number { return 0 ",
            "test('adds', () => { expect(sum([1])).toBe(1) })",
        );
        assert!(!report.passed);
        assert_eq!((report.total_tests, report.passed_tests, report.failed_tests), (0, 0, 0));
        assert!(report.results.is_empty());
        assert!(!report.error.clone().unwrap_or_default().is_empty());
        assert!(report.is_consistent());
    }

    #[test]
    fn test_uncaught_test_code_error_aborts() {
        let report = run_tests("const x = 1;", "undefinedHelper();");
        assert_eq!(report.error.as_deref(), Some("ReferenceError: undefinedHelper is not defined"));
    }

    #[test]
    fn test_learner_code_runs_first() {
        let learner = "function double(n) { return n * 2 }";
        let tests = "test('double', () => { expect(double(2)).toBe(4) })";
        assert!(run_tests(learner, tests).passed);

        // evaluating the two scripts the other way round cannot resolve `double`
        let runner = TestRunner::new();
        let mut sandbox = Sandbox::new(SandboxConfig::default());
        runner.install(&mut sandbox);
        sandbox.eval("test code", tests).unwrap();
        sandbox.eval("learner code", learner).unwrap();
        let results = runner.results();
        assert!(!results[0].passed);
        assert_eq!(results[0].error.as_deref(), Some("double is not defined"));
    }

    #[test]
    fn test_zero_tests_pass() {
        let report = run_tests("const a = 1;", "");
        assert!(report.passed);
        assert_eq!(report.total_tests, 0);
    }

    #[test]
    fn test_console_is_captured() {
        let report = run_tests(
            "function greet(name: string) { console.log('hi', name); return name }",
            "test('greets', () => { expect(greet('ada')).toBe('ada') })",
        );
        assert_eq!(report.console.len(), 1);
        assert_eq!(report.console[0].level, OutputLevel::Log);
        assert_eq!(report.console[0].message, "hi ada");
    }

    #[test]
    fn test_infinite_loop_is_bounded() {
        let orchestrator = Orchestrator::new(SandboxConfig {
            max_operations: 100_000,
            ..SandboxConfig::default()
        });
        let report = orchestrator.run(
            "function spin() { while (true) {} }",
            "test('first', () => { expect(1).toBe(1) }); test('spins', () => { spin() })",
        );
        assert!(!report.passed);
        assert!(report.results.is_empty());
        assert!(report.error.unwrap_or_default().contains("OperationLimit"));
    }

    #[test]
    fn test_deep_recursion_is_bounded() {
        let report = run_tests(
            "function down(n) { return down(n + 1) }",
            "test('recurses', () => { down(0) })",
        );
        assert!(report.error.unwrap_or_default().contains("StackDepthLimit"));
    }

    #[test]
    fn test_runs_do_not_share_state() {
        let orchestrator = Orchestrator::default();
        let first = orchestrator.run("var counter = 41;", "test('a', () => { expect(++counter).toBe(42) })");
        let second = orchestrator.run("", "test('b', () => { expect(typeof counter).toBe('undefined') })");
        assert!(first.passed);
        assert!(second.passed, "{}", second);
    }
}
