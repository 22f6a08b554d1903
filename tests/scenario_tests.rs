//! End-to-end runs of learner code against mission test scripts

mod common;
use common::{run, SUM_SOLUTION};
use mission_runner::sandbox::OutputLevel;
use mission_runner::{Orchestrator, SandboxConfig};
use serde_json::json;

mod scenarios {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_pass() {
        let report = run(
            SUM_SOLUTION,
            "import { sum } from './solution'\n\
             test('sums numbers', () => { expect(sum([1, 2, 3, 4, 5])).toBe(15) })\n\
             test('empty array', () => { expect(sum([])).toBe(0) })",
        );
        let json = report.to_json();
        assert_eq!(json["passed"], json!(true));
        assert_eq!(json["totalTests"], json!(2));
        assert_eq!(json["passedTests"], json!(2));
        assert_eq!(json["failedTests"], json!(0));
        assert!(json.get("error").is_none());
        assert_eq!(json["results"][0]["name"], json!("sums numbers"));
        assert_eq!(json["results"][0]["actual"], json!(15));
        assert_eq!(json["results"][0]["expected"], json!(15));
    }

    #[test]
    fn test_partial_failure() {
        let report = run(
            "export function sum(numbers: number[]): number { return 0 }",
            "test('sums', () => { expect(sum([1, 2, 3])).toBe(6) })",
        );
        assert!(!report.passed);
        assert_eq!(report.total_tests, 1);
        assert_eq!(report.failed_tests, 1);
        let result = &report.results[0];
        assert!(!result.passed);
        assert_eq!(result.actual, Some(json!(0)));
        assert_eq!(result.expected, Some(json!(6)));
        assert_eq!(result.error.as_deref(), Some("Expected 6, but got 0"));
    }

    #[test]
    fn test_execution_abort() {
        let report = run(
            "export function sum(numbers: number[]): number { return numbers.length",
            "test('never registered', () => { expect(1).toBe(1) })",
        );
        assert!(!report.passed);
        assert_eq!(report.total_tests, 0);
        assert_eq!(report.passed_tests, 0);
        assert_eq!(report.failed_tests, 0);
        assert!(report.results.is_empty());
        assert!(!report.error.unwrap().is_empty());
    }

    #[test]
    fn test_to_throw() {
        let report = run(
            "",
            "test('throws', () => { expect(() => { throw new Error() }).toThrow() })\n\
             test('does not throw', () => { expect(() => 1).toThrow() })",
        );
        assert!(report.results[0].passed);
        assert!(!report.results[1].passed);
        assert_eq!(report.results[1].error.as_deref(), Some("Expected function to throw"));
        assert_eq!(
            report.results[1].details.as_deref(),
            Some("Function did not throw an error")
        );
    }

    #[test]
    fn test_describe_blocks_nest() {
        let report = run(
            SUM_SOLUTION,
            "describe('sum', () => {\n\
               describe('small inputs', () => {\n\
                 it('one item', () => { expect(sum([4])).toBe(4) })\n\
               })\n\
               test('negative', () => { expect(sum([-1, -2])).toBe(-3) })\n\
             })",
        );
        assert!(report.passed);
        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["one item", "negative"]);
    }
}

mod ordering {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_learner_bindings_visible_to_tests() {
        let report = run(
            "const factor: number = 3\nfunction scale(n: number) { return n * factor }",
            "test('scales', () => { expect(scale(2)).toBe(6) })",
        );
        assert!(report.passed);
    }

    #[test]
    fn test_swapped_order_breaks_resolution() {
        // The test script cannot define what the learner code expects.
        let report = run(
            "test('scales', () => { expect(scale(2)).toBe(6) })",
            "const factor: number = 3\nfunction scale(n: number) { return n * factor }",
        );
        assert!(!report.passed);
        assert_eq!(report.results.len(), 1);
        assert!(report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("scale is not defined"));
    }
}

mod isolation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_marker_does_not_leak_between_runs() {
        let first = run("", "test('records', () => { expect(111).toBe(111) })");
        assert_eq!(first.results[0].actual, Some(json!(111)));

        let second = run("", "test('asserts nothing', () => {})");
        assert!(second.results[0].passed);
        assert_eq!(second.results[0].actual, None);
        assert_eq!(second.results[0].expected, None);
    }

    #[test]
    fn test_marker_does_not_leak_between_tests() {
        let report = run(
            "",
            "test('first', () => { expect('a').toBe('a') })\n\
             test('second', () => { const x = 1 })",
        );
        assert_eq!(report.results[0].actual, Some(json!("a")));
        assert_eq!(report.results[1].actual, None);
    }

    #[test]
    fn test_globals_do_not_leak_between_runs() {
        let orchestrator = Orchestrator::default();
        let first = orchestrator.run("var leaked = 1", "test('a', () => {})");
        assert!(first.passed);
        let second = orchestrator.run("", "test('b', () => { expect(typeof leaked).toBe('undefined') })");
        assert!(second.passed);
    }

    #[test]
    fn test_no_host_access() {
        let report = run(
            "",
            "test('no require', () => { expect(typeof require).toBe('undefined') })\n\
             test('no process', () => { expect(typeof process).toBe('undefined') })\n\
             test('no fetch', () => { expect(typeof fetch).toBe('undefined') })",
        );
        assert!(report.passed, "{:#?}", report);
    }
}

mod invariants {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counts_hold_for_every_shape() {
        let cases = [
            ("", ""),
            ("", "test('a', () => {})"),
            ("", "test('a', () => { expect(1).toBe(2) })"),
            ("const x = 1", "test('a', () => {}); test('b', () => { throw 'no' })"),
            ("syntax error here (", "test('a', () => {})"),
            ("", "test('a', () => {}); missing()"),
            ("", "test('a', () => { expect(1).toBe(1) }); test('b', () => { expect([1]).toEqual([2]) })"),
        ];
        for (learner, tests) in cases {
            let report = run(learner, tests);
            assert_eq!(
                report.passed,
                report.failed_tests == 0 && report.error.is_none(),
                "{} / {}",
                learner,
                tests
            );
        }
    }

    #[test]
    fn test_failure_after_abort_keeps_no_partial_results() {
        let report = run("", "test('a', () => {})\nnotAFunction()");
        assert_eq!(report.total_tests, 0);
        assert_eq!(
            report.error.as_deref(),
            Some("ReferenceError: notAFunction is not defined")
        );
    }
}

mod limits {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_runaway_learner_code_is_stopped() {
        let orchestrator = Orchestrator::new(SandboxConfig {
            max_operations: 100_000,
            ..SandboxConfig::default()
        });
        let report = orchestrator.run("while (true) {}", "test('a', () => {})");
        assert!(!report.passed);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_runaway_test_body_aborts_the_run() {
        let orchestrator = Orchestrator::new(SandboxConfig {
            max_operations: 100_000,
            ..SandboxConfig::default()
        });
        let report = orchestrator.run(
            "",
            "test('fine', () => {})\ntest('spins', () => { try { for (;;) {} } catch (e) {} })",
        );
        assert!(!report.passed);
        assert_eq!(report.total_tests, 0);
        assert!(report.error.unwrap().contains("OperationLimit"));
    }

    #[test]
    fn test_bulk_string_building_counts_against_the_budget() {
        let orchestrator = Orchestrator::new(SandboxConfig {
            max_operations: 100_000,
            ..SandboxConfig::default()
        });
        let report = orchestrator.run(
            "export const banner = (): string => 'x'.repeat(2 ** 24)",
            "test('banner', () => { expect(banner().length).toBe(2 ** 24) })",
        );
        assert!(!report.passed);
        assert_eq!(report.total_tests, 0);
        assert!(report.error.unwrap().contains("OperationLimit"));
    }

    #[test]
    fn test_deeply_nested_submission_is_reported() {
        let depth = 20_000;
        let learner = format!("const x = {}1{};", "[".repeat(depth), "]".repeat(depth));
        let report = run(&learner, "test('t', () => { expect(1).toBe(1) })");
        assert!(!report.passed);
        assert_eq!(report.total_tests, 0);
        let error = report.error.unwrap();
        assert!(error.contains("Maximum nesting depth exceeded"), "{}", error);
    }

    #[test]
    fn test_long_expression_chain_is_reported() {
        let learner = format!("const total = 1{};", " + 1".repeat(50_000));
        let report = run(&learner, "test('t', () => { expect(total).toBe(50001) })");
        assert!(!report.passed);
        assert_eq!(report.total_tests, 0);
        let error = report.error.unwrap();
        assert!(error.contains("Maximum nesting depth exceeded"), "{}", error);
    }
}

mod console {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_console_output_is_reported() {
        let report = run(
            "console.log('loaded', 1 + 1)",
            "test('a', () => { console.warn({ x: 1 }) })",
        );
        assert_eq!(report.console.len(), 2);
        assert_eq!(report.console[0].level, OutputLevel::Log);
        assert_eq!(report.console[0].message, "loaded 2");
        assert_eq!(report.console[1].level, OutputLevel::Warn);
        assert_eq!(report.console[1].message, "{ x: 1 }");
    }
}
