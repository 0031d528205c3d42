// src/models/tryout.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{QuestionDef, QuestionDetail};

/// Exam category. Closed set: unknown values are rejected at
/// deserialization instead of being stored as free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Math,
    Science,
    Language,
    History,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Math => "Math",
            Category::Science => "Science",
            Category::Language => "Language",
            Category::History => "History",
            Category::General => "General",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Math" => Ok(Category::Math),
            "Science" => Ok(Category::Science),
            "Language" => Ok(Category::Language),
            "History" => Ok(Category::History),
            "General" => Ok(Category::General),
            _ => Err(()),
        }
    }
}

/// Represents the 'tryouts' table in the database.
///
/// `duration` is derived from `start_at` and `end_at` at creation time
/// (whole minutes) and never supplied directly by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tryout {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,

    /// Exam length in minutes.
    pub duration: i64,

    pub start_at: chrono::DateTime<chrono::Utc>,
    pub end_at: chrono::DateTime<chrono::Utc>,

    /// Author of the exam.
    pub user_id: Uuid,
}

/// Full tryout aggregate: the tryout plus its questions and their choices.
#[derive(Debug, Clone, Serialize)]
pub struct TryoutDetail {
    #[serde(flatten)]
    pub tryout: Tryout,
    pub questions: Vec<QuestionDetail>,
}

/// DTO for creating a new tryout, optionally with nested questions.
/// The author is taken from the authenticated caller, not the body.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTryoutRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: String,

    pub category: Category,

    pub start_at: chrono::DateTime<chrono::Utc>,
    pub end_at: chrono::DateTime<chrono::Utc>,

    #[serde(default)]
    pub questions: Vec<QuestionDef>,
}

/// DTO for updating tryout metadata. Only supplied fields are touched.
///
/// `end_at` is never accepted directly: it is recomputed from `start_at`
/// and `duration` so the exam length stays consistent.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTryoutRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    pub category: Option<Category>,

    /// New exam length in minutes. Must be positive when supplied.
    pub duration: Option<i64>,

    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
}
