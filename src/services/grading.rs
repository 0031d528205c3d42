// src/services/grading.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        question::{QuestionDetail, QuestionType},
        submission::{Answer, AnswerDef},
    },
};

/// Verdict for a single (question, answer) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Graded {
    pub is_correct: bool,
    pub score_contribution: i32,
}

/// Grades one answer against its question. Pure and deterministic: the
/// same inputs always produce the same verdict, no side effects.
pub fn grade(question: &QuestionDetail, answer: &AnswerDef) -> Result<Graded, AppError> {
    let q = &question.question;

    let is_correct = match q.question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            let choice_id = answer.choice_id.ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Choice ID is required for {} question",
                    q.question_type.as_str()
                ))
            })?;
            let choice = question.find_choice(choice_id).ok_or_else(|| {
                AppError::NotFound(format!(
                    "Choice with ID {choice_id} not found for this question"
                ))
            })?;
            choice.is_answer
        }
        QuestionType::ShortAnswer => {
            let given = answer
                .short_answer
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest(
                        "Short answer is required for ShortAnswer question".to_string(),
                    )
                })?;
            match q.correct_short_answer.as_deref() {
                Some(expected) => given.to_lowercase() == expected.trim().to_lowercase(),
                None => false,
            }
        }
    };

    Ok(Graded {
        is_correct,
        score_contribution: if is_correct { q.score } else { 0 },
    })
}

/// Aggregates the total score of a submission: the sum of the score of
/// every question answered correctly. Answers to questions outside the
/// supplied set contribute nothing.
pub fn aggregate_score(questions: &[QuestionDetail], answers: &[Answer]) -> i32 {
    let scores: HashMap<Uuid, i32> = questions
        .iter()
        .map(|q| (q.question.id, q.question.score))
        .collect();

    answers
        .iter()
        .filter(|a| a.is_correct)
        .filter_map(|a| scores.get(&a.question_id))
        .sum()
}
