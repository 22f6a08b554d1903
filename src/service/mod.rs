//! Mission service
//!
//! Framework-free request handlers around the test runner. Each handler
//! takes the authenticated caller (if any) and returns an [`ApiResponse`]
//! with the HTTP status and JSON body a transport layer should send.
//! Failures of learner code never produce a 500: they are reported inside
//! a successful envelope. Only persistence failures do.

pub mod code_sync;
pub mod model;
pub mod store;

pub use code_sync::{CodeSyncStore, SyncedCode};
pub use model::{
    Catalog, Course, CourseProgress, Difficulty, Lesson, Mission, MissionProgress, MissionStatus,
    SubmitRequest,
};
pub use store::{MemoryStore, MissionStore, ProgressStore};

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::test_runner::{Orchestrator, TestRunReport};

// ---------------------------------------------------------------------------
// ApiResponse
// ---------------------------------------------------------------------------

/// Status code and JSON body of a handler result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    pub fn unauthorized() -> Self {
        Self::error(401, "Unauthorized")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ---------------------------------------------------------------------------
// MissionService
// ---------------------------------------------------------------------------

/// Request handlers over a store implementing both collaborator traits.
pub struct MissionService<S> {
    store: Arc<S>,
    orchestrator: Orchestrator,
    code_sync: CodeSyncStore,
}

impl<S: MissionStore + ProgressStore> MissionService<S> {
    pub fn new(store: Arc<S>, orchestrator: Orchestrator) -> Self {
        Self {
            store,
            orchestrator,
            code_sync: CodeSyncStore::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// `POST /missions/{id}/test`
    ///
    /// Checks run in order: caller, then code, then mission.
    pub fn submit_tests(&self, caller: Option<&str>, mission_id: &str, request: &SubmitRequest) -> ApiResponse {
        info!(mission = mission_id, "test submission");
        let Some(user_id) = caller else {
            return ApiResponse::unauthorized();
        };
        let Some(code) = request.code() else {
            return ApiResponse::error(400, "Code is required");
        };
        let mission = match self.store.find_mission(mission_id) {
            Ok(Some(mission)) => mission,
            Ok(None) => return ApiResponse::error(404, "Mission not found"),
            Err(e) => return Self::failed(e),
        };
        debug!(mission = %mission.title, code_bytes = code.len(), "running mission tests");

        let report = self.orchestrator.run(code, &mission.test_code);
        let progress = self
            .record(user_id, &mission, &report)
            .and_then(|progress| serde_json::to_value(progress).map_err(|e| Error::StorageError(e.to_string())));
        match progress {
            Ok(progress) => ApiResponse::ok(json!({
                "success": true,
                "testResults": report.to_json(),
                "progress": progress,
            })),
            Err(e) => Self::failed(e),
        }
    }

    fn failed(e: Error) -> ApiResponse {
        error!("test execution error: {}", e);
        ApiResponse {
            status: 500,
            body: json!({ "error": "Failed to execute tests", "details": e.to_string() }),
        }
    }

    /// Persist the run and, when it completed a course mission, the course
    /// aggregate.
    fn record(&self, user_id: &str, mission: &Mission, report: &TestRunReport) -> Result<MissionProgress> {
        let now = Utc::now();
        let progress = self
            .store
            .upsert_mission_progress(user_id, &mission.id, report, now)?;
        if let (true, Some(course_id)) = (report.passed, &mission.course_id) {
            let course = self.recompute_course(user_id, course_id)?;
            info!(
                course = %course_id,
                percent = course.progress_percent,
                "course progress updated"
            );
        }
        Ok(progress)
    }

    /// Recount a user's completed lessons and missions in a course.
    pub fn recompute_course(&self, user_id: &str, course_id: &str) -> Result<CourseProgress> {
        let total_lessons = self.store.count_published_lessons(course_id)?;
        let completed_lessons = self.store.count_completed_lessons(user_id, course_id)?;
        let total_missions = self.store.count_published_missions(course_id)?;
        let completed_missions = self.store.count_completed_missions(user_id, course_id)?;
        let progress_percent =
            CourseProgress::percent(completed_lessons + completed_missions, total_lessons + total_missions);
        let now = Utc::now();
        self.store.upsert_course_progress(CourseProgress {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            completed_lessons,
            total_lessons,
            completed_missions,
            total_missions,
            progress_percent,
            last_accessed_at: now,
            completed_at: (progress_percent == 100).then_some(now),
        })
    }

    /// `GET /missions/{id}`; the reference test script is not exposed.
    pub fn get_mission(&self, mission_id: &str) -> ApiResponse {
        match self.store.find_mission(mission_id) {
            Ok(Some(mission)) => match serde_json::to_value(&mission) {
                Ok(mut value) => {
                    if let Some(fields) = value.as_object_mut() {
                        fields.remove("testCode");
                    }
                    ApiResponse::ok(json!({ "mission": value }))
                }
                Err(e) => {
                    error!("cannot serialize mission: {}", e);
                    ApiResponse::error(500, "Failed to fetch mission")
                }
            },
            Ok(None) => ApiResponse::error(404, "Mission not found"),
            Err(e) => {
                error!("mission lookup failed: {}", e);
                ApiResponse::error(500, "Failed to fetch mission")
            }
        }
    }

    /// `POST /missions/{id}/code-sync`
    pub fn sync_code(&self, caller: Option<&str>, mission_id: &str, request: &SubmitRequest) -> ApiResponse {
        let Some(user_id) = caller else {
            return ApiResponse::unauthorized();
        };
        let Some(code) = request.code() else {
            return ApiResponse::error(400, "Code is required");
        };
        let timestamp = Utc::now().timestamp_millis();
        self.code_sync.put(user_id, mission_id, code, timestamp);
        debug!(mission = mission_id, timestamp, "code synced");
        ApiResponse::ok(json!({ "success": true, "timestamp": timestamp }))
    }

    /// `GET /missions/{id}/code-sync`
    pub fn fetch_synced_code(&self, caller: Option<&str>, mission_id: &str) -> ApiResponse {
        let Some(user_id) = caller else {
            return ApiResponse::unauthorized();
        };
        match self.code_sync.get(user_id, mission_id) {
            Some(synced) => ApiResponse::ok(json!({ "code": synced.code, "timestamp": synced.timestamp })),
            None => ApiResponse::ok(json!({ "code": null, "timestamp": null })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> MissionService<MemoryStore> {
        let catalog = Catalog::from_json(
            r#"{
                "courses": [{ "id": "c1", "title": "Course" }],
                "missions": [{
                    "id": "double",
                    "courseId": "c1",
                    "title": "Double",
                    "testCode": "import { double } from './main'\ntest('doubles', () => { expect(double(2)).toBe(4) })"
                }]
            }"#,
        )
        .unwrap();
        MissionService::new(Arc::new(MemoryStore::from_catalog(catalog)), Orchestrator::default())
    }

    #[test]
    fn test_check_order() {
        let svc = service();
        let empty = SubmitRequest::default();
        assert_eq!(svc.submit_tests(None, "missing", &empty).status, 401);
        assert_eq!(svc.submit_tests(Some("u"), "missing", &empty).status, 400);
        let response = svc.submit_tests(Some("u"), "missing", &SubmitRequest::new("x"));
        assert_eq!(response, ApiResponse::error(404, "Mission not found"));
    }

    #[test]
    fn test_passing_submission_updates_course() {
        let svc = service();
        let code = SubmitRequest::new("export const double = (n: number): number => n * 2;");
        let response = svc.submit_tests(Some("u"), "double", &code);
        assert_eq!(response.status, 200);
        assert_eq!(response.body["success"], json!(true));
        assert_eq!(response.body["testResults"]["passed"], json!(true));
        assert_eq!(response.body["progress"]["status"], json!("COMPLETED"));
        assert_eq!(response.body["progress"]["attemptCount"], json!(1));

        // The first course record is a create, which leaves completedAt unset.
        let course = svc.store().course_progress("u", "c1").unwrap();
        assert_eq!(course.progress_percent, 100);
        assert_eq!(course.completed_at, None);

        svc.submit_tests(Some("u"), "double", &code);
        let course = svc.store().course_progress("u", "c1").unwrap();
        assert!(course.completed_at.is_some());
    }

    #[test]
    fn test_failing_submission_is_still_200() {
        let svc = service();
        let response = svc.submit_tests(Some("u"), "double", &SubmitRequest::new("function double( {"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body["testResults"]["passed"], json!(false));
        assert!(response.body["testResults"]["error"].is_string());
        assert_eq!(response.body["progress"]["status"], json!("IN_PROGRESS"));
        assert!(svc.store().course_progress("u", "c1").is_none());
    }

    #[test]
    fn test_get_mission_hides_tests() {
        let svc = service();
        let response = svc.get_mission("double");
        assert_eq!(response.status, 200);
        assert_eq!(response.body["mission"]["title"], json!("Double"));
        assert!(response.body["mission"].get("testCode").is_none());
        assert_eq!(svc.get_mission("nope").status, 404);
    }

    #[test]
    fn test_code_sync_handlers() {
        let svc = service();
        assert_eq!(svc.sync_code(None, "double", &SubmitRequest::new("x")).status, 401);
        assert_eq!(
            svc.sync_code(Some("u"), "double", &SubmitRequest::default()),
            ApiResponse::error(400, "Code is required")
        );
        assert_eq!(
            svc.fetch_synced_code(Some("u"), "double").body,
            json!({ "code": null, "timestamp": null })
        );

        let saved = svc.sync_code(Some("u"), "double", &SubmitRequest::new("let a = 1"));
        assert_eq!(saved.body["success"], json!(true));
        let fetched = svc.fetch_synced_code(Some("u"), "double");
        assert_eq!(fetched.body["code"], json!("let a = 1"));
        assert_eq!(fetched.body["timestamp"], saved.body["timestamp"]);
        assert_eq!(svc.fetch_synced_code(None, "double").status, 401);
    }
}
