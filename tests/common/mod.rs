//! Shared test helpers for integration tests

use mission_runner::service::{Catalog, MemoryStore, MissionService};
use mission_runner::{run_tests, Orchestrator, TestCaseResult, TestRunReport};
use std::sync::Arc;

/// Run learner code against a test script and check the report's counts.
#[allow(dead_code)]
pub fn run(learner: &str, tests: &str) -> TestRunReport {
    let report = run_tests(learner, tests);
    assert!(report.is_consistent(), "inconsistent report: {:#?}", report);
    report
}

/// Run a single assertion as the only test and return its result.
#[allow(dead_code)]
pub fn assertion(learner: &str, assertion: &str) -> TestCaseResult {
    let tests = format!("test('assertion', () => {{ {} }})", assertion);
    let report = run(learner, &tests);
    assert_eq!(report.error, None, "run aborted");
    assert_eq!(report.results.len(), 1);
    report.results.into_iter().next().unwrap()
}

/// Catalog with one course holding a published lesson, two missions and a
/// draft mission, plus a standalone mission.
#[allow(dead_code)]
pub const CATALOG: &str = r#"{
    "courses": [{ "id": "ts-basics", "title": "TypeScript Basics" }],
    "lessons": [{ "id": "types-101", "courseId": "ts-basics", "title": "Types 101" }],
    "missions": [
        {
            "id": "sum-array",
            "courseId": "ts-basics",
            "title": "Sum an array",
            "order": 1,
            "testCode": "import { sum } from './solution'\ndescribe('sum', () => {\n  test('adds numbers', () => { expect(sum([1, 2, 3])).toBe(6) })\n  test('empty is zero', () => { expect(sum([])).toBe(0) })\n})"
        },
        {
            "id": "greet",
            "courseId": "ts-basics",
            "title": "Greeting",
            "order": 2,
            "testCode": "test('greets', () => { expect(greet('Ada')).toBe('Hello, Ada!') })"
        },
        {
            "id": "draft",
            "courseId": "ts-basics",
            "title": "Unpublished",
            "isPublished": false,
            "testCode": "test('x', () => {})"
        },
        {
            "id": "standalone",
            "title": "No course",
            "testCode": "test('one', () => { expect(one()).toBe(1) })"
        }
    ]
}"#;

/// A service over [`CATALOG`] with default run settings.
#[allow(dead_code)]
pub fn catalog_service() -> MissionService<MemoryStore> {
    let catalog = Catalog::from_json(CATALOG).unwrap();
    MissionService::new(Arc::new(MemoryStore::from_catalog(catalog)), Orchestrator::default())
}

#[allow(dead_code)]
pub const SUM_SOLUTION: &str = "export function sum(numbers: number[]): number {\n  return numbers.reduce((a, n) => a + n, 0)\n}";

#[allow(dead_code)]
pub const GREET_SOLUTION: &str = "export const greet = (name: string): string => `Hello, ${name}!`";
