// src/services/question.rs

use uuid::Uuid;

use crate::{
    error::AppError,
    models::question::{
        Choice, ChoiceDef, CreateQuestionRequest, Question, QuestionDetail, QuestionType,
        UpdateQuestionRequest,
    },
    repository::Repository,
};

/// The structural state of a question as it would exist after the
/// operation under validation. For updates this is the merge of the
/// patch with the existing row; `choices` is `None` when the payload
/// carries no choice list at all.
struct EffectiveQuestion<'a> {
    question_type: QuestionType,
    text: &'a str,
    score: i32,
    choice_answer_flags: Option<Vec<bool>>,
    correct_short_answer: Option<&'a str>,
}

/// Validates a question definition. Pure, no side effects; rules are
/// evaluated in a fixed order and the first violation wins.
fn validate_effective(eff: &EffectiveQuestion) -> Result<(), AppError> {
    // The type itself is a closed enum, so an unknown type can never
    // reach this point; it is rejected at deserialization.

    if eff.question_type.is_choice_based() {
        let flags = eff
            .choice_answer_flags
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Choices must be provided for {} questions",
                    eff.question_type.as_str()
                ))
            })?;

        if eff.question_type == QuestionType::TrueFalse && flags.len() != 2 {
            return Err(AppError::BadRequest(
                "True/False questions must have exactly 2 choices".to_string(),
            ));
        }

        if eff.question_type == QuestionType::MultipleChoice && !flags.iter().any(|f| *f) {
            return Err(AppError::BadRequest(
                "Multiple choice questions must have at least one correct answer".to_string(),
            ));
        }
    }

    if eff.question_type == QuestionType::ShortAnswer
        && eff
            .correct_short_answer
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .is_none()
    {
        return Err(AppError::BadRequest(
            "Short answer questions must have a correct answer".to_string(),
        ));
    }

    if eff.score <= 0 {
        return Err(AppError::BadRequest(
            "Question score must be a positive number".to_string(),
        ));
    }

    if eff.text.trim().is_empty() {
        return Err(AppError::BadRequest("Question text is required".to_string()));
    }

    Ok(())
}

/// Validates a standalone question definition (creation path).
pub fn validate_question_def(
    question_type: QuestionType,
    text: &str,
    score: i32,
    choices: &[ChoiceDef],
    short_answer: Option<&str>,
) -> Result<(), AppError> {
    validate_effective(&EffectiveQuestion {
        question_type,
        text,
        score,
        choice_answer_flags: Some(choices.iter().map(|c| c.is_answer).collect()),
        correct_short_answer: short_answer,
    })
}

/// Builds the persistent aggregate for a validated question definition.
/// Choice rows exist only for choice-based types; the correct short
/// answer is kept only for ShortAnswer.
pub fn build_question_detail(
    tryout_id: Uuid,
    def: &crate::models::question::QuestionDef,
) -> QuestionDetail {
    let question_id = Uuid::new_v4();

    let choices = if def.question_type.is_choice_based() {
        def.choices
            .iter()
            .map(|c| Choice {
                id: Uuid::new_v4(),
                question_id,
                text: c.text.trim().to_string(),
                is_answer: c.is_answer,
            })
            .collect()
    } else {
        Vec::new()
    };

    let correct_short_answer = if def.question_type == QuestionType::ShortAnswer {
        def.short_answer.as_deref().map(|s| s.trim().to_string())
    } else {
        None
    };

    QuestionDetail {
        question: Question {
            id: question_id,
            tryout_id,
            text: def.text.trim().to_string(),
            score: def.score,
            question_type: def.question_type,
            correct_short_answer,
        },
        choices,
    }
}

/// Creates a question against an existing tryout. The tryout must not
/// have submissions yet: a live exam is frozen to keep grading fair.
pub async fn create_question(
    repo: &dyn Repository,
    req: &CreateQuestionRequest,
) -> Result<QuestionDetail, AppError> {
    let def = &req.question;

    repo.get_tryout(req.tryout_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tryout with ID {} not found", req.tryout_id)))?;

    if repo.count_submissions(req.tryout_id).await? > 0 {
        return Err(AppError::Locked(
            "Cannot modify tryout with existing submissions".to_string(),
        ));
    }

    validate_question_def(
        def.question_type,
        &def.text,
        def.score,
        &def.choices,
        def.short_answer.as_deref(),
    )?;

    let detail = build_question_detail(req.tryout_id, def);
    repo.create_question(&detail).await?;

    repo.get_question(detail.question.id).await?.ok_or_else(|| {
        AppError::InternalServerError("Question vanished after creation".to_string())
    })
}

/// Updates a question. Only supplied fields change; validation runs
/// against the post-update effective state (new type if supplied, else
/// the existing one). A supplied choice list replaces the existing set:
/// rows with a known id are updated, new rows inserted, the rest
/// deleted.
pub async fn update_question(
    repo: &dyn Repository,
    id: Uuid,
    req: &UpdateQuestionRequest,
) -> Result<QuestionDetail, AppError> {
    let existing = repo
        .get_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question with ID {id} not found")))?;

    if repo.count_submissions(existing.question.tryout_id).await? > 0 {
        return Err(AppError::Locked(
            "Cannot modify tryout with existing submissions".to_string(),
        ));
    }

    let question_type = req.question_type.unwrap_or(existing.question.question_type);
    let text = req.text.as_deref().unwrap_or(&existing.question.text);
    let score = req.score.unwrap_or(existing.question.score);
    let short_answer = req
        .short_answer
        .as_deref()
        .or(existing.question.correct_short_answer.as_deref());

    validate_effective(&EffectiveQuestion {
        question_type,
        text,
        score,
        choice_answer_flags: req
            .choices
            .as_ref()
            .map(|cs| cs.iter().map(|c| c.is_answer).collect()),
        correct_short_answer: short_answer,
    })?;

    let choices: Option<Vec<Choice>> = match &req.choices {
        Some(upserts) => {
            let mut rows = Vec::with_capacity(upserts.len());
            for c in upserts {
                if let Some(choice_id) = c.id
                    && existing.find_choice(choice_id).is_none()
                {
                    return Err(AppError::NotFound(format!(
                        "Choice with ID {choice_id} not found for this question"
                    )));
                }
                rows.push(Choice {
                    id: c.id.unwrap_or_else(Uuid::new_v4),
                    question_id: id,
                    text: c.text.trim().to_string(),
                    is_answer: c.is_answer,
                });
            }
            Some(rows)
        }
        None => None,
    };

    let updated = Question {
        id,
        tryout_id: existing.question.tryout_id,
        text: text.trim().to_string(),
        score,
        question_type,
        correct_short_answer: if question_type == QuestionType::ShortAnswer {
            short_answer.map(|s| s.trim().to_string())
        } else {
            None
        },
    };

    repo.update_question(&updated, choices.as_deref()).await?;

    repo.get_question(id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Question vanished after update".to_string()))
}

/// Deletes a question and its choices. Rejected once the owning tryout
/// has submissions.
pub async fn delete_question(repo: &dyn Repository, id: Uuid) -> Result<(), AppError> {
    let existing = repo
        .get_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question with ID {id} not found")))?;

    if repo.count_submissions(existing.question.tryout_id).await? > 0 {
        return Err(AppError::Locked(
            "Cannot modify tryout with existing submissions".to_string(),
        ));
    }

    repo.delete_question(id).await
}
