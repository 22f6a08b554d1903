//! The bundled demo catalog stays solvable

mod common;
use mission_runner::service::{Catalog, MemoryStore, MissionService, SubmitRequest};
use mission_runner::RunnerConfig;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn test_demo_solutions_pass_and_starters_fail() {
    let catalog = Catalog::load(demo("missions.json")).unwrap();
    let orchestrator = RunnerConfig::load(demo("runner.json")).unwrap().orchestrator();
    assert!(!catalog.missions.is_empty());

    for mission in &catalog.missions {
        let solution = mission.solution_code.as_deref().unwrap();
        let report = orchestrator.run(solution, &mission.test_code);
        assert!(report.passed, "{}: {:#?}", mission.id, report);
        assert!(report.total_tests > 0);

        let starter = orchestrator.run(&mission.starter_code, &mission.test_code);
        assert!(!starter.passed, "{} starter already passes", mission.id);
    }
}

#[test]
fn test_demo_course_completes() {
    let catalog = Catalog::load(demo("missions.json")).unwrap();
    let missions: Vec<_> = catalog.missions.clone();
    let store = Arc::new(MemoryStore::from_catalog(catalog));
    let svc = MissionService::new(store.clone(), Default::default());

    for lesson in ["ts-basics-types", "ts-basics-arrays"] {
        store.complete_lesson("ada", lesson).unwrap();
    }
    for mission in &missions {
        let code = SubmitRequest::new(mission.solution_code.clone().unwrap());
        let response = svc.submit_tests(Some("ada"), &mission.id, &code);
        assert_eq!(response.body["testResults"]["passed"], json!(true), "{}", mission.id);
    }
    let course = store.course_progress("ada", "ts-basics").unwrap();
    assert_eq!(course.progress_percent, 100);
}

#[test]
fn test_demo_files_run() {
    let learner = std::fs::read_to_string(demo("sum.ts")).unwrap();
    let tests = std::fs::read_to_string(demo("sum.test.ts")).unwrap();
    let report = common::run(&learner, &tests);
    assert!(report.passed, "{:#?}", report);
    assert_eq!(report.total_tests, 3);
    assert_eq!(report.console.len(), 3);
}
