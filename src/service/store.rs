//! Persistence collaborators
//!
//! The service only needs a handful of lookups and upserts, expressed as two
//! traits. [`MemoryStore`] implements both and backs the CLI and the tests.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use super::model::{Catalog, Course, CourseProgress, Lesson, Mission, MissionProgress, MissionStatus};
use crate::error::{Error, Result};
use crate::test_runner::TestRunReport;

/// Read access to mission definitions
pub trait MissionStore: Send + Sync {
    fn find_mission(&self, mission_id: &str) -> Result<Option<Mission>>;
}

/// Per-user progress records
pub trait ProgressStore: Send + Sync {
    /// Create or update the user's record for a mission from a run report.
    fn upsert_mission_progress(
        &self,
        user_id: &str,
        mission_id: &str,
        report: &TestRunReport,
        now: DateTime<Utc>,
    ) -> Result<MissionProgress>;

    fn count_published_lessons(&self, course_id: &str) -> Result<usize>;

    fn count_completed_lessons(&self, user_id: &str, course_id: &str) -> Result<usize>;

    fn count_published_missions(&self, course_id: &str) -> Result<usize>;

    fn count_completed_missions(&self, user_id: &str, course_id: &str) -> Result<usize>;

    /// Create or update the user's record for a course. See
    /// [`next_course_progress`] for how an existing record is merged.
    fn upsert_course_progress(&self, progress: CourseProgress) -> Result<CourseProgress>;
}

/// Build the record a submission leaves behind.
///
/// `previous` is the existing record, if any: its start time is kept and its
/// attempt count incremented.
pub fn next_mission_progress(
    previous: Option<&MissionProgress>,
    user_id: &str,
    mission_id: &str,
    report: &TestRunReport,
    now: DateTime<Utc>,
) -> Result<MissionProgress> {
    let test_results = serde_json::to_string(report)
        .map_err(|e| Error::StorageError(format!("Cannot serialize report: {}", e)))?;
    let status = if report.passed {
        MissionStatus::Completed
    } else {
        MissionStatus::InProgress
    };
    Ok(MissionProgress {
        user_id: user_id.to_string(),
        mission_id: mission_id.to_string(),
        status,
        attempt_count: previous.map_or(1, |p| p.attempt_count + 1),
        completed_at: report.passed.then_some(now),
        test_results,
        started_at: previous.map_or(now, |p| p.started_at),
        updated_at: now,
    })
}

/// Merge freshly computed course totals into the stored record.
///
/// Only an update records `completed_at`; a newly created record starts
/// without one, even at 100%.
pub fn next_course_progress(previous: Option<&CourseProgress>, computed: CourseProgress) -> CourseProgress {
    match previous {
        Some(_) => computed,
        None => CourseProgress {
            completed_at: None,
            ..computed
        },
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

type UserKey = (String, String);

fn user_key(user_id: &str, id: &str) -> UserKey {
    (user_id.to_string(), id.to_string())
}

#[derive(Debug, Default)]
struct Tables {
    courses: FxHashMap<String, Course>,
    lessons: FxHashMap<String, Lesson>,
    missions: FxHashMap<String, Mission>,
    mission_progress: FxHashMap<UserKey, MissionProgress>,
    completed_lessons: FxHashSet<UserKey>,
    course_progress: FxHashMap<UserKey, CourseProgress>,
}

/// Thread-safe in-memory implementation of both store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write();
            for course in catalog.courses {
                tables.courses.insert(course.id.clone(), course);
            }
            for lesson in catalog.lessons {
                tables.lessons.insert(lesson.id.clone(), lesson);
            }
            for mission in catalog.missions {
                tables.missions.insert(mission.id.clone(), mission);
            }
        }
        store
    }

    pub fn insert_mission(&self, mission: Mission) {
        self.tables.write().missions.insert(mission.id.clone(), mission);
    }

    pub fn insert_lesson(&self, lesson: Lesson) {
        self.tables.write().lessons.insert(lesson.id.clone(), lesson);
    }

    pub fn course(&self, course_id: &str) -> Option<Course> {
        self.tables.read().courses.get(course_id).cloned()
    }

    /// Every mission, ordered by course then position.
    pub fn missions(&self) -> Vec<Mission> {
        let mut missions: Vec<Mission> = self.tables.read().missions.values().cloned().collect();
        missions.sort_by(|a, b| {
            (&a.course_id, a.order, &a.id).cmp(&(&b.course_id, b.order, &b.id))
        });
        missions
    }

    /// Mark a lesson as completed for a user.
    pub fn complete_lesson(&self, user_id: &str, lesson_id: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.lessons.contains_key(lesson_id) {
            return Err(Error::StorageError(format!("Unknown lesson '{}'", lesson_id)));
        }
        tables.completed_lessons.insert(user_key(user_id, lesson_id));
        Ok(())
    }

    pub fn mission_progress(&self, user_id: &str, mission_id: &str) -> Option<MissionProgress> {
        self.tables
            .read()
            .mission_progress
            .get(&user_key(user_id, mission_id))
            .cloned()
    }

    pub fn course_progress(&self, user_id: &str, course_id: &str) -> Option<CourseProgress> {
        self.tables
            .read()
            .course_progress
            .get(&user_key(user_id, course_id))
            .cloned()
    }
}

impl MissionStore for MemoryStore {
    fn find_mission(&self, mission_id: &str) -> Result<Option<Mission>> {
        Ok(self.tables.read().missions.get(mission_id).cloned())
    }
}

impl ProgressStore for MemoryStore {
    fn upsert_mission_progress(
        &self,
        user_id: &str,
        mission_id: &str,
        report: &TestRunReport,
        now: DateTime<Utc>,
    ) -> Result<MissionProgress> {
        let mut tables = self.tables.write();
        let key = user_key(user_id, mission_id);
        let progress = next_mission_progress(tables.mission_progress.get(&key), user_id, mission_id, report, now)?;
        tables.mission_progress.insert(key, progress.clone());
        Ok(progress)
    }

    fn count_published_lessons(&self, course_id: &str) -> Result<usize> {
        Ok(self
            .tables
            .read()
            .lessons
            .values()
            .filter(|l| l.course_id == course_id && l.is_published)
            .count())
    }

    fn count_completed_lessons(&self, user_id: &str, course_id: &str) -> Result<usize> {
        let tables = self.tables.read();
        Ok(tables
            .completed_lessons
            .iter()
            .filter(|(user, lesson)| {
                user == user_id
                    && tables
                        .lessons
                        .get(lesson)
                        .is_some_and(|l| l.course_id == course_id)
            })
            .count())
    }

    fn count_published_missions(&self, course_id: &str) -> Result<usize> {
        Ok(self
            .tables
            .read()
            .missions
            .values()
            .filter(|m| m.course_id.as_deref() == Some(course_id) && m.is_published)
            .count())
    }

    fn count_completed_missions(&self, user_id: &str, course_id: &str) -> Result<usize> {
        let tables = self.tables.read();
        Ok(tables
            .mission_progress
            .values()
            .filter(|p| {
                p.user_id == user_id
                    && p.status == MissionStatus::Completed
                    && tables
                        .missions
                        .get(&p.mission_id)
                        .is_some_and(|m| m.course_id.as_deref() == Some(course_id))
            })
            .count())
    }

    fn upsert_course_progress(&self, progress: CourseProgress) -> Result<CourseProgress> {
        let mut tables = self.tables.write();
        let key = user_key(&progress.user_id, &progress.course_id);
        let progress = next_course_progress(tables.course_progress.get(&key), progress);
        tables.course_progress.insert(key, progress.clone());
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_runner::TestCaseResult;

    fn catalog() -> Catalog {
        Catalog::from_json(
            r#"{
                "courses": [{ "id": "c1", "title": "Course" }, { "id": "c2", "title": "Other" }],
                "lessons": [
                    { "id": "l1", "courseId": "c1", "title": "One" },
                    { "id": "l2", "courseId": "c1", "title": "Draft", "isPublished": false },
                    { "id": "l3", "courseId": "c2", "title": "Elsewhere" }
                ],
                "missions": [
                    { "id": "m1", "courseId": "c1", "title": "M1", "testCode": "", "order": 2 },
                    { "id": "m2", "courseId": "c1", "title": "M2", "testCode": "", "order": 1 },
                    { "id": "free", "title": "Standalone", "testCode": "" }
                ]
            }"#,
        )
        .unwrap()
    }

    fn report(passed: bool) -> TestRunReport {
        let result = if passed {
            TestCaseResult::pass("t", None, None)
        } else {
            TestCaseResult::fail("t", "nope")
        };
        TestRunReport::from_results(vec![result], passed)
    }

    #[test]
    fn test_mission_progress_upsert() {
        let store = MemoryStore::from_catalog(catalog());
        let t0 = Utc::now();
        let first = store.upsert_mission_progress("u", "m1", &report(false), t0).unwrap();
        assert_eq!(first.status, MissionStatus::InProgress);
        assert_eq!(first.attempt_count, 1);
        assert_eq!(first.completed_at, None);
        assert_eq!(first.started_at, t0);

        let t1 = t0 + chrono::Duration::seconds(5);
        let second = store.upsert_mission_progress("u", "m1", &report(true), t1).unwrap();
        assert_eq!(second.status, MissionStatus::Completed);
        assert_eq!(second.attempt_count, 2);
        assert_eq!(second.completed_at, Some(t1));
        assert_eq!(second.started_at, t0);
        assert_eq!(second.updated_at, t1);

        let third = store.upsert_mission_progress("u", "m1", &report(false), t1).unwrap();
        assert_eq!(third.completed_at, None);
        assert_eq!(third.attempt_count, 3);

        let stored: TestRunReport = serde_json::from_str(&third.test_results).unwrap();
        assert_eq!(stored, report(false));
    }

    #[test]
    fn test_course_completion_is_recorded_on_update() {
        let store = MemoryStore::from_catalog(catalog());
        let t0 = Utc::now();
        let complete = |at| CourseProgress {
            user_id: "u".into(),
            course_id: "c1".into(),
            completed_lessons: 1,
            total_lessons: 1,
            completed_missions: 2,
            total_missions: 2,
            progress_percent: 100,
            last_accessed_at: at,
            completed_at: Some(at),
        };

        let created = store.upsert_course_progress(complete(t0)).unwrap();
        assert_eq!(created.progress_percent, 100);
        assert_eq!(created.completed_at, None);

        let t1 = t0 + chrono::Duration::seconds(5);
        let updated = store.upsert_course_progress(complete(t1)).unwrap();
        assert_eq!(updated.completed_at, Some(t1));
        assert_eq!(store.course_progress("u", "c1"), Some(updated));
    }

    #[test]
    fn test_counts() {
        let store = MemoryStore::from_catalog(catalog());
        assert_eq!(store.count_published_lessons("c1").unwrap(), 1);
        assert_eq!(store.count_published_missions("c1").unwrap(), 2);

        store.complete_lesson("u", "l1").unwrap();
        store.complete_lesson("u", "l3").unwrap();
        store.complete_lesson("other", "l1").unwrap();
        assert_eq!(store.count_completed_lessons("u", "c1").unwrap(), 1);
        assert!(store.complete_lesson("u", "missing").is_err());

        let now = Utc::now();
        store.upsert_mission_progress("u", "m1", &report(true), now).unwrap();
        store.upsert_mission_progress("u", "m2", &report(false), now).unwrap();
        store.upsert_mission_progress("u", "free", &report(true), now).unwrap();
        assert_eq!(store.count_completed_missions("u", "c1").unwrap(), 1);
        assert_eq!(store.count_completed_missions("other", "c1").unwrap(), 0);
    }

    #[test]
    fn test_missions_ordered() {
        let store = MemoryStore::from_catalog(catalog());
        let ids: Vec<String> = store.missions().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, ["free", "m2", "m1"]);
    }
}
