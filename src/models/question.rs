// src/models/question.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Question type. Closed set with exhaustive matching in the validator
/// and the grading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "MultipleChoice",
            QuestionType::TrueFalse => "TrueFalse",
            QuestionType::ShortAnswer => "ShortAnswer",
        }
    }

    /// Whether answers to this question reference a choice row.
    pub fn is_choice_based(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

impl std::str::FromStr for QuestionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MultipleChoice" => Ok(QuestionType::MultipleChoice),
            "TrueFalse" => Ok(QuestionType::TrueFalse),
            "ShortAnswer" => Ok(QuestionType::ShortAnswer),
            _ => Err(()),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub tryout_id: Uuid,

    pub text: String,

    /// Points awarded for a correct answer. Always positive.
    pub score: i32,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// Expected answer for ShortAnswer questions, None for the others.
    pub correct_short_answer: Option<String>,
}

/// Represents the 'choices' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_answer: bool,
}

/// Question plus its choices (empty for ShortAnswer).
#[derive(Debug, Clone, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
}

impl QuestionDetail {
    pub fn find_choice(&self, id: Uuid) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// DTO for a choice within a question definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceDef {
    pub text: String,
    pub is_answer: bool,
}

/// DTO for defining a question, either nested in a tryout creation
/// request or standalone via the question endpoints.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionDef {
    #[validate(length(max = 2000, message = "Question text must be at most 2000 characters"))]
    pub text: String,

    pub score: i32,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    #[serde(default)]
    pub choices: Vec<ChoiceDef>,

    /// Correct answer, required for ShortAnswer questions.
    pub short_answer: Option<String>,
}

/// DTO for creating a standalone question against an existing tryout.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub tryout_id: Uuid,

    #[serde(flatten)]
    #[validate(nested)]
    pub question: QuestionDef,
}

/// A choice in an update payload. Choices carrying an id update the
/// existing row; choices without an id are inserted; existing choices
/// absent from the list are deleted.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceUpsert {
    pub id: Option<Uuid>,
    pub text: String,
    pub is_answer: bool,
}

/// DTO for updating a question. Only supplied fields are touched; the
/// validator runs against the post-update effective state.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(max = 2000))]
    pub text: Option<String>,

    pub score: Option<i32>,

    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,

    pub choices: Option<Vec<ChoiceUpsert>>,

    pub short_answer: Option<String>,
}
