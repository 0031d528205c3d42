// src/models/submission.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the 'submissions' table in the database.
///
/// At most one submission exists per (tryout_id, user_id) pair; the
/// storage layer enforces this with a unique constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub tryout_id: Uuid,
    pub user_id: Uuid,

    /// Aggregate score over the submission's answers.
    pub score: i32,

    /// Stamped whenever answers are submitted, re-stamped on finalize.
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Set once the submission is finalized; terminal, no further
    /// answer intake is accepted afterwards.
    pub finalized_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lifecycle state of a submission, derived from its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    Created,
    InProgress,
    Finalized,
}

impl Submission {
    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    pub fn status(&self, answer_count: usize) -> SubmissionStatus {
        if self.is_finalized() {
            SubmissionStatus::Finalized
        } else if answer_count > 0 {
            SubmissionStatus::InProgress
        } else {
            SubmissionStatus::Created
        }
    }
}

/// Represents the 'answers' table in the database.
/// One row per (submission, question) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub question_id: Uuid,

    /// Selected choice for MultipleChoice/TrueFalse questions.
    pub choice_id: Option<Uuid>,

    /// Free-text response for ShortAnswer questions.
    pub short_answer: Option<String>,

    /// Grading verdict, computed at intake.
    pub is_correct: bool,
}

/// Submission with its answers and derived status.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: Submission,
    pub status: SubmissionStatus,
    pub answers: Vec<Answer>,
}

/// DTO for opening a submission against a tryout.
/// The user is taken from the authenticated caller.
#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    pub tryout_id: Uuid,
}

/// One answer in a submit batch.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerDef {
    pub question_id: Uuid,
    pub choice_id: Option<Uuid>,
    pub short_answer: Option<String>,
}

/// DTO for submitting a batch of answers.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<AnswerDef>,
}
