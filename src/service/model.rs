//! Records exchanged with the persistence collaborator

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Course and mission difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default = "published")]
    pub is_published: bool,
}

/// A coding exercise: starter code for the learner and the reference test
/// script their submission is run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    #[serde(default)]
    pub course_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub starter_code: String,
    pub test_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_code: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "published")]
    pub is_published: bool,
}

fn published() -> bool {
    true
}

/// Per-user state of one mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    InProgress,
    Completed,
}

/// Upserted after every submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionProgress {
    pub user_id: String,
    pub mission_id: String,
    pub status: MissionStatus,
    pub attempt_count: u32,
    pub completed_at: Option<DateTime<Utc>>,
    /// The last report, serialized as JSON text
    pub test_results: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate completion of one course for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub user_id: String,
    pub course_id: String,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub completed_missions: usize,
    pub total_missions: usize,
    pub progress_percent: u32,
    pub last_accessed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CourseProgress {
    /// `round(completed / total * 100)` over lessons and missions together,
    /// 0 when the course has nothing published.
    pub fn percent(completed: usize, total: usize) -> u32 {
        if total == 0 {
            return 0;
        }
        (completed as f64 / total as f64 * 100.0).round() as u32
    }
}

/// Body of a test submission or code sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub code: Option<String>,
}

impl SubmitRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
        }
    }

    /// The submitted code, unless it is missing or empty.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|code| !code.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// JSON description of the courses, lessons and missions a store serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub courses: Vec<Course>,
    pub lessons: Vec<Lesson>,
    pub missions: Vec<Mission>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("Invalid catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Every lesson and mission must point at a known course, and ids must
    /// be unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = rustc_hash::FxHashSet::default();
        for id in self
            .courses
            .iter()
            .map(|c| &c.id)
            .chain(self.lessons.iter().map(|l| &l.id))
            .chain(self.missions.iter().map(|m| &m.id))
        {
            if !seen.insert(id.as_str()) {
                return Err(Error::ConfigError(format!("Duplicate id '{}'", id)));
            }
        }
        let known = |course: &str| self.courses.iter().any(|c| c.id == course);
        for lesson in &self.lessons {
            if !known(&lesson.course_id) {
                return Err(Error::ConfigError(format!(
                    "Lesson '{}' references unknown course '{}'",
                    lesson.id, lesson.course_id
                )));
            }
        }
        for mission in &self.missions {
            if let Some(course) = &mission.course_id {
                if !known(course) {
                    return Err(Error::ConfigError(format!(
                        "Mission '{}' references unknown course '{}'",
                        mission.id, course
                    )));
                }
            }
        }
        Ok(())
    }
}
