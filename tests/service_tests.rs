//! Service handlers: status codes, progress records and code sync

mod common;
use common::{catalog_service, GREET_SOLUTION, SUM_SOLUTION};
use chrono::{DateTime, Utc};
use mission_runner::service::{
    ApiResponse, CourseProgress, Mission, MissionProgress, MissionService, MissionStatus,
    MissionStore, ProgressStore, SubmitRequest,
};
use mission_runner::{Error, Orchestrator, Result, TestRunReport};
use serde_json::json;
use std::sync::Arc;

mod submissions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_codes() {
        let svc = catalog_service();
        let code = SubmitRequest::new(SUM_SOLUTION);
        assert_eq!(svc.submit_tests(None, "sum-array", &code), ApiResponse::unauthorized());
        assert_eq!(
            svc.submit_tests(Some("ada"), "sum-array", &SubmitRequest::new("")),
            ApiResponse::error(400, "Code is required")
        );
        assert_eq!(
            svc.submit_tests(Some("ada"), "nope", &code),
            ApiResponse::error(404, "Mission not found")
        );
        assert_eq!(svc.submit_tests(Some("ada"), "sum-array", &code).status, 200);
    }

    #[test]
    fn test_response_shape() {
        let svc = catalog_service();
        let response = svc.submit_tests(Some("ada"), "sum-array", &SubmitRequest::new(SUM_SOLUTION));
        let body = &response.body;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["testResults"]["passed"], json!(true));
        assert_eq!(body["testResults"]["totalTests"], json!(2));
        assert_eq!(body["progress"]["userId"], json!("ada"));
        assert_eq!(body["progress"]["missionId"], json!("sum-array"));
        assert_eq!(body["progress"]["status"], json!("COMPLETED"));
        assert!(body["progress"]["completedAt"].is_string());

        let stored: TestRunReport =
            serde_json::from_str(body["progress"]["testResults"].as_str().unwrap()).unwrap();
        assert!(stored.passed);
    }

    #[test]
    fn test_attempts_accumulate() {
        let svc = catalog_service();
        let wrong = SubmitRequest::new("export function sum(xs: number[]): number { return 0 }");
        svc.submit_tests(Some("ada"), "sum-array", &wrong);
        svc.submit_tests(Some("ada"), "sum-array", &wrong);
        let last = svc.submit_tests(Some("ada"), "sum-array", &SubmitRequest::new(SUM_SOLUTION));
        assert_eq!(last.body["progress"]["attemptCount"], json!(3));

        let progress = svc.store().mission_progress("ada", "sum-array").unwrap();
        assert_eq!(progress.status, MissionStatus::Completed);
        assert!(progress.started_at <= progress.updated_at);

        // Other users start from scratch.
        let other = svc.submit_tests(Some("grace"), "sum-array", &wrong);
        assert_eq!(other.body["progress"]["attemptCount"], json!(1));
    }

    #[test]
    fn test_aborted_run_is_a_successful_request() {
        let svc = catalog_service();
        let response = svc.submit_tests(Some("ada"), "sum-array", &SubmitRequest::new("function sum( {"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body["testResults"]["totalTests"], json!(0));
        assert!(response.body["testResults"]["error"].is_string());
        assert_eq!(response.body["progress"]["status"], json!("IN_PROGRESS"));
    }
}

mod course_progress {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percent_counts_lessons_and_published_missions() {
        let svc = catalog_service();
        svc.submit_tests(Some("ada"), "sum-array", &SubmitRequest::new(SUM_SOLUTION));

        // one lesson + two published missions; the draft does not count
        let course = svc.store().course_progress("ada", "ts-basics").unwrap();
        assert_eq!(course.total_lessons, 1);
        assert_eq!(course.total_missions, 2);
        assert_eq!(course.completed_missions, 1);
        assert_eq!(course.completed_lessons, 0);
        assert_eq!(course.progress_percent, 33);
        assert_eq!(course.completed_at, None);

        svc.store().complete_lesson("ada", "types-101").unwrap();
        svc.submit_tests(Some("ada"), "greet", &SubmitRequest::new(GREET_SOLUTION));
        let course = svc.store().course_progress("ada", "ts-basics").unwrap();
        assert_eq!(course.progress_percent, 100);
        assert!(course.completed_at.is_some());
    }

    #[test]
    fn test_completion_time_is_set_when_record_is_updated() {
        let svc = catalog_service();
        svc.store().complete_lesson("ada", "types-101").unwrap();
        // recorded without a course recompute
        let passing = mission_runner::run_tests("", "test('ok', () => {})");
        svc.store()
            .upsert_mission_progress("ada", "greet", &passing, Utc::now())
            .unwrap();
        assert!(svc.store().course_progress("ada", "ts-basics").is_none());

        svc.submit_tests(Some("ada"), "sum-array", &SubmitRequest::new(SUM_SOLUTION));
        let created = svc.store().course_progress("ada", "ts-basics").unwrap();
        assert_eq!(created.progress_percent, 100);
        assert_eq!(created.completed_at, None);

        svc.submit_tests(Some("ada"), "sum-array", &SubmitRequest::new(SUM_SOLUTION));
        let updated = svc.store().course_progress("ada", "ts-basics").unwrap();
        assert!(updated.completed_at.is_some());
    }

    #[test]
    fn test_failed_runs_do_not_touch_course() {
        let svc = catalog_service();
        svc.submit_tests(Some("ada"), "greet", &SubmitRequest::new("const greet = () => 'hi'"));
        assert!(svc.store().course_progress("ada", "ts-basics").is_none());
    }

    #[test]
    fn test_missions_without_course() {
        let svc = catalog_service();
        let response = svc.submit_tests(Some("ada"), "standalone", &SubmitRequest::new("const one = (): number => 1"));
        assert_eq!(response.body["testResults"]["passed"], json!(true));
        assert!(svc.store().course_progress("ada", "ts-basics").is_none());
    }

    #[test]
    fn test_recompute_course_directly() {
        let svc = catalog_service();
        svc.store().complete_lesson("ada", "types-101").unwrap();
        let course = svc.recompute_course("ada", "ts-basics").unwrap();
        assert_eq!(course.completed_lessons, 1);
        assert_eq!(course.progress_percent, 33);
    }
}

mod missions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_mission_omits_test_code() {
        let svc = catalog_service();
        let response = svc.get_mission("greet");
        assert_eq!(response.status, 200);
        assert_eq!(response.body["mission"]["id"], json!("greet"));
        assert!(response.body["mission"].get("testCode").is_none());
        assert_eq!(svc.get_mission("missing"), ApiResponse::error(404, "Mission not found"));
    }
}

mod code_sync {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_and_isolation() {
        let svc = catalog_service();
        let saved = svc.sync_code(Some("ada"), "greet", &SubmitRequest::new("let draft = 1"));
        assert_eq!(saved.status, 200);
        assert!(saved.body["timestamp"].as_i64().unwrap() > 0);

        let fetched = svc.fetch_synced_code(Some("ada"), "greet");
        assert_eq!(fetched.body["code"], json!("let draft = 1"));

        let other_user = svc.fetch_synced_code(Some("grace"), "greet");
        assert_eq!(other_user.body, json!({ "code": null, "timestamp": null }));
        let other_mission = svc.fetch_synced_code(Some("ada"), "sum-array");
        assert_eq!(other_mission.body["code"], json!(null));
    }

    #[test]
    fn test_last_write_wins() {
        let svc = catalog_service();
        svc.sync_code(Some("ada"), "greet", &SubmitRequest::new("v1"));
        svc.sync_code(Some("ada"), "greet", &SubmitRequest::new("v2"));
        assert_eq!(svc.fetch_synced_code(Some("ada"), "greet").body["code"], json!("v2"));
    }

    #[test]
    fn test_requires_caller_and_code() {
        let svc = catalog_service();
        assert_eq!(svc.sync_code(None, "greet", &SubmitRequest::new("x")).status, 401);
        assert_eq!(svc.sync_code(Some("ada"), "greet", &SubmitRequest::default()).status, 400);
        assert_eq!(svc.fetch_synced_code(None, "greet").status, 401);
    }
}

mod storage_failures {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Serves one mission but fails every write.
    struct ReadOnlyStore {
        mission: Mission,
    }

    fn unavailable<T>() -> Result<T> {
        Err(Error::StorageError("database unavailable".into()))
    }

    impl MissionStore for ReadOnlyStore {
        fn find_mission(&self, mission_id: &str) -> Result<Option<Mission>> {
            Ok((mission_id == self.mission.id).then(|| self.mission.clone()))
        }
    }

    impl ProgressStore for ReadOnlyStore {
        fn upsert_mission_progress(
            &self,
            _user_id: &str,
            _mission_id: &str,
            _report: &TestRunReport,
            _now: DateTime<Utc>,
        ) -> Result<MissionProgress> {
            unavailable()
        }

        fn count_published_lessons(&self, _course_id: &str) -> Result<usize> {
            unavailable()
        }

        fn count_completed_lessons(&self, _user_id: &str, _course_id: &str) -> Result<usize> {
            unavailable()
        }

        fn count_published_missions(&self, _course_id: &str) -> Result<usize> {
            unavailable()
        }

        fn count_completed_missions(&self, _user_id: &str, _course_id: &str) -> Result<usize> {
            unavailable()
        }

        fn upsert_course_progress(&self, _progress: CourseProgress) -> Result<CourseProgress> {
            unavailable()
        }
    }

    /// Fails only on lookups.
    struct BrokenStore;

    impl MissionStore for BrokenStore {
        fn find_mission(&self, _mission_id: &str) -> Result<Option<Mission>> {
            unavailable()
        }
    }

    impl ProgressStore for BrokenStore {
        fn upsert_mission_progress(
            &self,
            _user_id: &str,
            _mission_id: &str,
            _report: &TestRunReport,
            _now: DateTime<Utc>,
        ) -> Result<MissionProgress> {
            unavailable()
        }

        fn count_published_lessons(&self, _course_id: &str) -> Result<usize> {
            Ok(0)
        }

        fn count_completed_lessons(&self, _user_id: &str, _course_id: &str) -> Result<usize> {
            Ok(0)
        }

        fn count_published_missions(&self, _course_id: &str) -> Result<usize> {
            Ok(0)
        }

        fn count_completed_missions(&self, _user_id: &str, _course_id: &str) -> Result<usize> {
            Ok(0)
        }

        fn upsert_course_progress(&self, progress: CourseProgress) -> Result<CourseProgress> {
            Ok(progress)
        }
    }

    fn mission() -> Mission {
        serde_json::from_value(json!({
            "id": "m",
            "title": "M",
            "testCode": "test('a', () => { expect(1).toBe(1) })"
        }))
        .unwrap()
    }

    #[test]
    fn test_write_failure_is_500() {
        let svc = MissionService::new(Arc::new(ReadOnlyStore { mission: mission() }), Orchestrator::default());
        let response = svc.submit_tests(Some("ada"), "m", &SubmitRequest::new("const x = 1"));
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], json!("Failed to execute tests"));
        assert_eq!(
            response.body["details"],
            json!("StorageError: database unavailable")
        );
        // validation still happens first
        assert_eq!(svc.submit_tests(Some("ada"), "other", &SubmitRequest::new("x")).status, 404);
    }

    #[test]
    fn test_lookup_failure_is_500() {
        let svc = MissionService::new(Arc::new(BrokenStore), Orchestrator::default());
        let response = svc.submit_tests(Some("ada"), "m", &SubmitRequest::new("const x = 1"));
        assert_eq!(response.status, 500);
        assert_eq!(
            svc.get_mission("m"),
            ApiResponse::error(500, "Failed to fetch mission")
        );
        // auth and input checks never reach the store
        assert_eq!(svc.submit_tests(None, "m", &SubmitRequest::new("x")).status, 401);
    }
}
