// tests/service_tests.rs
//
// Exercises the core services directly against the in-memory
// repository: validation rules, grading, and the submission lifecycle.

use uuid::Uuid;

use tryout_backend::{
    error::AppError,
    models::{
        question::{Choice, ChoiceDef, Question, QuestionDef, QuestionDetail, QuestionType},
        submission::{Answer, AnswerDef},
        tryout::{Category, CreateTryoutRequest, TryoutDetail, UpdateTryoutRequest},
        user::User,
    },
    repository::{Repository, memory::MemoryRepository},
    services::{grading, question, submission, tryout},
};

fn sample_user() -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", Uuid::new_v4()),
        username: format!("u_{}", &Uuid::new_v4().to_string()[..8]),
        password: "not-a-real-hash".to_string(),
        created_at: chrono::Utc::now(),
    }
}

fn true_false_def(score: i32) -> QuestionDef {
    QuestionDef {
        text: "The sky is blue.".to_string(),
        score,
        question_type: QuestionType::TrueFalse,
        choices: vec![
            ChoiceDef {
                text: "True".to_string(),
                is_answer: true,
            },
            ChoiceDef {
                text: "False".to_string(),
                is_answer: false,
            },
        ],
        short_answer: None,
    }
}

fn short_answer_def(expected: &str, score: i32) -> QuestionDef {
    QuestionDef {
        text: "Capital of France?".to_string(),
        score,
        question_type: QuestionType::ShortAnswer,
        choices: vec![],
        short_answer: Some(expected.to_string()),
    }
}

fn create_request(questions: Vec<QuestionDef>) -> CreateTryoutRequest {
    CreateTryoutRequest {
        title: "Midterm practice".to_string(),
        description: "Covers the first half of the course".to_string(),
        category: Category::Science,
        start_at: "2026-09-01T09:00:00Z".parse().unwrap(),
        end_at: "2026-09-01T10:30:00Z".parse().unwrap(),
        questions,
    }
}

async fn seed_tryout(
    repo: &MemoryRepository,
    questions: Vec<QuestionDef>,
) -> (Uuid, TryoutDetail) {
    let user = sample_user();
    repo.create_user(&user).await.unwrap();
    let detail = tryout::create_tryout(repo, user.id, &create_request(questions))
        .await
        .unwrap();
    (user.id, detail)
}

fn validate(def: &QuestionDef) -> Result<(), AppError> {
    question::validate_question_def(
        def.question_type,
        &def.text,
        def.score,
        &def.choices,
        def.short_answer.as_deref(),
    )
}

// ---- Question Validator ----

#[test]
fn true_false_valid_iff_exactly_two_choices() {
    for count in 0..4 {
        let def = QuestionDef {
            choices: (0..count)
                .map(|i| ChoiceDef {
                    text: format!("Choice {i}"),
                    is_answer: i == 0,
                })
                .collect(),
            ..true_false_def(10)
        };
        assert_eq!(validate(&def).is_ok(), count == 2, "count = {count}");
    }
}

#[test]
fn multiple_choice_valid_iff_some_correct_answer() {
    for has_correct in [false, true] {
        let def = QuestionDef {
            text: "Pick one".to_string(),
            score: 10,
            question_type: QuestionType::MultipleChoice,
            choices: vec![
                ChoiceDef {
                    text: "A".to_string(),
                    is_answer: has_correct,
                },
                ChoiceDef {
                    text: "B".to_string(),
                    is_answer: false,
                },
            ],
            short_answer: None,
        };
        assert_eq!(validate(&def).is_ok(), has_correct);
    }
}

#[test]
fn choice_based_questions_require_choices() {
    let def = QuestionDef {
        choices: vec![],
        ..true_false_def(10)
    };
    assert!(matches!(validate(&def), Err(AppError::BadRequest(_))));
}

#[test]
fn short_answer_requires_expected_answer() {
    assert!(validate(&short_answer_def("Paris", 5)).is_ok());
    assert!(validate(&short_answer_def("   ", 5)).is_err());

    let mut def = short_answer_def("Paris", 5);
    def.short_answer = None;
    assert!(validate(&def).is_err());
}

#[test]
fn score_must_be_positive_and_text_non_empty() {
    assert!(validate(&true_false_def(0)).is_err());
    assert!(validate(&true_false_def(-3)).is_err());

    let def = QuestionDef {
        text: "   ".to_string(),
        ..true_false_def(10)
    };
    assert!(validate(&def).is_err());
}

// ---- Grading Engine ----

fn true_false_detail(score: i32) -> QuestionDetail {
    let question_id = Uuid::new_v4();
    QuestionDetail {
        question: Question {
            id: question_id,
            tryout_id: Uuid::new_v4(),
            text: "The sky is blue.".to_string(),
            score,
            question_type: QuestionType::TrueFalse,
            correct_short_answer: None,
        },
        choices: vec![
            Choice {
                id: Uuid::new_v4(),
                question_id,
                text: "True".to_string(),
                is_answer: true,
            },
            Choice {
                id: Uuid::new_v4(),
                question_id,
                text: "False".to_string(),
                is_answer: false,
            },
        ],
    }
}

#[test]
fn grading_is_deterministic() {
    let detail = true_false_detail(10);
    let answer = AnswerDef {
        question_id: detail.question.id,
        choice_id: Some(detail.choices[0].id),
        short_answer: None,
    };

    let first = grading::grade(&detail, &answer).unwrap();
    let second = grading::grade(&detail, &answer).unwrap();
    assert_eq!(first, second);
    assert!(first.is_correct);
    assert_eq!(first.score_contribution, 10);
}

#[test]
fn wrong_choice_scores_zero() {
    let detail = true_false_detail(10);
    let answer = AnswerDef {
        question_id: detail.question.id,
        choice_id: Some(detail.choices[1].id),
        short_answer: None,
    };

    let graded = grading::grade(&detail, &answer).unwrap();
    assert!(!graded.is_correct);
    assert_eq!(graded.score_contribution, 0);
}

#[test]
fn choice_from_another_question_is_rejected() {
    let detail = true_false_detail(10);
    let answer = AnswerDef {
        question_id: detail.question.id,
        choice_id: Some(Uuid::new_v4()),
        short_answer: None,
    };

    assert!(matches!(
        grading::grade(&detail, &answer),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn missing_choice_id_is_rejected() {
    let detail = true_false_detail(10);
    let answer = AnswerDef {
        question_id: detail.question.id,
        choice_id: None,
        short_answer: None,
    };

    assert!(matches!(
        grading::grade(&detail, &answer),
        Err(AppError::BadRequest(_))
    ));
}

// ---- Tryout Assembler ----

#[tokio::test]
async fn create_rejects_unknown_author() {
    let repo = MemoryRepository::new();
    let result = tryout::create_tryout(&repo, Uuid::new_v4(), &create_request(vec![])).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn duration_is_derived_from_the_date_range() {
    let repo = MemoryRepository::new();
    let (_, detail) = seed_tryout(&repo, vec![]).await;
    assert_eq!(detail.tryout.duration, 90);
}

#[tokio::test]
async fn invalid_nested_question_aborts_whole_creation() {
    let repo = MemoryRepository::new();
    let user = sample_user();
    repo.create_user(&user).await.unwrap();

    let questions = vec![true_false_def(10), short_answer_def("   ", 5)];
    let result = tryout::create_tryout(&repo, user.id, &create_request(questions)).await;
    assert!(result.is_err());

    // All-or-nothing: the valid sibling question must not survive.
    assert!(repo.list_tryouts().await.unwrap().is_empty());
}

#[tokio::test]
async fn moving_start_preserves_exam_length() {
    let repo = MemoryRepository::new();
    let (_, detail) = seed_tryout(&repo, vec![]).await;

    let new_start = "2026-10-01T12:00:00Z".parse().unwrap();
    let patch = UpdateTryoutRequest {
        title: None,
        description: None,
        category: None,
        duration: None,
        start_at: Some(new_start),
    };
    let updated = tryout::update_tryout(&repo, detail.tryout.id, &patch)
        .await
        .unwrap();

    assert_eq!(updated.tryout.start_at, new_start);
    assert_eq!(updated.tryout.duration, 90);
    assert_eq!(
        updated.tryout.end_at,
        new_start + chrono::Duration::minutes(90)
    );
}

#[tokio::test]
async fn supplying_duration_recomputes_end() {
    let repo = MemoryRepository::new();
    let (_, detail) = seed_tryout(&repo, vec![]).await;

    let patch = UpdateTryoutRequest {
        title: None,
        description: None,
        category: None,
        duration: Some(30),
        start_at: None,
    };
    let updated = tryout::update_tryout(&repo, detail.tryout.id, &patch)
        .await
        .unwrap();

    assert_eq!(updated.tryout.duration, 30);
    assert_eq!(
        updated.tryout.end_at,
        updated.tryout.start_at + chrono::Duration::minutes(30)
    );
}

#[tokio::test]
async fn delete_cascades_questions_and_choices() {
    let repo = MemoryRepository::new();
    let (_, detail) = seed_tryout(&repo, vec![true_false_def(10)]).await;
    let question_id = detail.questions[0].question.id;

    tryout::delete_tryout(&repo, detail.tryout.id).await.unwrap();

    assert!(repo.get_tryout(detail.tryout.id).await.unwrap().is_none());
    assert!(repo.get_question(question_id).await.unwrap().is_none());
}

#[tokio::test]
async fn locked_tryout_rejects_update_delete_and_question_changes() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(&repo, vec![true_false_def(10)]).await;
    let tryout_id = detail.tryout.id;

    submission::create_submission(&repo, tryout_id, user_id)
        .await
        .unwrap();

    let patch = UpdateTryoutRequest {
        title: Some("New title".to_string()),
        description: None,
        category: None,
        duration: None,
        start_at: None,
    };
    assert!(matches!(
        tryout::update_tryout(&repo, tryout_id, &patch).await,
        Err(AppError::Locked(_))
    ));
    assert!(matches!(
        tryout::delete_tryout(&repo, tryout_id).await,
        Err(AppError::Locked(_))
    ));
    assert!(matches!(
        question::delete_question(&repo, detail.questions[0].question.id).await,
        Err(AppError::Locked(_))
    ));
}

// ---- Submission Lifecycle ----

#[tokio::test]
async fn create_submission_twice_returns_same_row() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(&repo, vec![]).await;

    let first = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();
    let second = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(
        repo.list_submissions_by_tryout(detail.tryout.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn concurrent_creates_yield_one_submission() {
    let repo = std::sync::Arc::new(MemoryRepository::new());
    let (user_id, detail) = seed_tryout(&repo, vec![]).await;
    let tryout_id = detail.tryout.id;

    let a = {
        let repo = repo.clone();
        tokio::spawn(async move { submission::create_submission(repo.as_ref(), tryout_id, user_id).await })
    };
    let b = {
        let repo = repo.clone();
        tokio::spawn(async move { submission::create_submission(repo.as_ref(), tryout_id, user_id).await })
    };

    let first = a.await.unwrap().unwrap();
    let second = b.await.unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(
        repo.list_submissions_by_tryout(tryout_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn answer_to_foreign_question_is_rejected() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(&repo, vec![true_false_def(10)]).await;
    let sub = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    let answers = vec![AnswerDef {
        question_id: Uuid::new_v4(),
        choice_id: None,
        short_answer: Some("whatever".to_string()),
    }];
    assert!(matches!(
        submission::submit_answers(&repo, sub.id, &answers).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn resubmission_replaces_prior_answer_instead_of_accumulating() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(&repo, vec![short_answer_def("Paris", 5)]).await;
    let question_id = detail.questions[0].question.id;
    let sub = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    let wrong = vec![AnswerDef {
        question_id,
        choice_id: None,
        short_answer: Some("London".to_string()),
    }];
    let graded = submission::submit_answers(&repo, sub.id, &wrong).await.unwrap();
    assert_eq!(graded.submission.score, 0);
    assert_eq!(graded.answers.len(), 1);

    let right = vec![AnswerDef {
        question_id,
        choice_id: None,
        short_answer: Some("Paris".to_string()),
    }];
    let graded = submission::submit_answers(&repo, sub.id, &right).await.unwrap();
    assert_eq!(graded.submission.score, 5);
    // Still one answer row for the pair, not two.
    assert_eq!(graded.answers.len(), 1);
    assert!(graded.answers[0].is_correct);
}

#[tokio::test]
async fn score_aggregates_across_batches() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(
        &repo,
        vec![true_false_def(10), short_answer_def("Paris", 5)],
    )
    .await;
    let tf = detail
        .questions
        .iter()
        .find(|q| q.question.question_type == QuestionType::TrueFalse)
        .unwrap();
    let sa = detail
        .questions
        .iter()
        .find(|q| q.question.question_type == QuestionType::ShortAnswer)
        .unwrap();
    let correct_choice = tf.choices.iter().find(|c| c.is_answer).unwrap();
    let sub = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    let first_batch = vec![AnswerDef {
        question_id: tf.question.id,
        choice_id: Some(correct_choice.id),
        short_answer: None,
    }];
    let graded = submission::submit_answers(&repo, sub.id, &first_batch)
        .await
        .unwrap();
    assert_eq!(graded.submission.score, 10);

    let second_batch = vec![AnswerDef {
        question_id: sa.question.id,
        choice_id: None,
        short_answer: Some("paris".to_string()),
    }];
    let graded = submission::submit_answers(&repo, sub.id, &second_batch)
        .await
        .unwrap();
    assert_eq!(graded.submission.score, 15);
    assert_eq!(graded.answers.len(), 2);
}

#[tokio::test]
async fn duplicate_questions_in_one_batch_conflict() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(&repo, vec![short_answer_def("Paris", 5)]).await;
    let question_id = detail.questions[0].question.id;
    let sub = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    let answers = vec![
        AnswerDef {
            question_id,
            choice_id: None,
            short_answer: Some("Paris".to_string()),
        },
        AnswerDef {
            question_id,
            choice_id: None,
            short_answer: Some("London".to_string()),
        },
    ];
    assert!(matches!(
        submission::submit_answers(&repo, sub.id, &answers).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn replace_answers_scores_the_full_answer_set() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(
        &repo,
        vec![true_false_def(10), short_answer_def("Paris", 5)],
    )
    .await;
    let tf = detail
        .questions
        .iter()
        .find(|q| q.question.question_type == QuestionType::TrueFalse)
        .unwrap();
    let sa = detail
        .questions
        .iter()
        .find(|q| q.question.question_type == QuestionType::ShortAnswer)
        .unwrap();
    let correct_choice = tf.choices.iter().find(|c| c.is_answer).unwrap();
    let sub = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    let batch_a = vec![Answer {
        id: Uuid::new_v4(),
        submission_id: sub.id,
        question_id: tf.question.id,
        choice_id: Some(correct_choice.id),
        short_answer: None,
        is_correct: true,
    }];
    repo.replace_answers(sub.id, &batch_a, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(repo.get_submission(sub.id).await.unwrap().unwrap().score, 10);

    // The second batch covers a different question; the stored score
    // must account for both rows, not just the batch that wrote last.
    let batch_b = vec![Answer {
        id: Uuid::new_v4(),
        submission_id: sub.id,
        question_id: sa.question.id,
        choice_id: None,
        short_answer: Some("Paris".to_string()),
        is_correct: true,
    }];
    repo.replace_answers(sub.id, &batch_b, chrono::Utc::now())
        .await
        .unwrap();

    let stored = repo.get_submission(sub.id).await.unwrap().unwrap();
    let rows = repo.list_answers(sub.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(stored.score, 15);
}

#[tokio::test]
async fn concurrent_answer_batches_keep_score_consistent() {
    let repo = std::sync::Arc::new(MemoryRepository::new());
    let (user_id, detail) = seed_tryout(
        &repo,
        vec![true_false_def(10), short_answer_def("Paris", 5)],
    )
    .await;
    let tf = detail
        .questions
        .iter()
        .find(|q| q.question.question_type == QuestionType::TrueFalse)
        .unwrap();
    let sa = detail
        .questions
        .iter()
        .find(|q| q.question.question_type == QuestionType::ShortAnswer)
        .unwrap();
    let correct_choice = tf.choices.iter().find(|c| c.is_answer).unwrap();
    let sub = submission::create_submission(repo.as_ref(), detail.tryout.id, user_id)
        .await
        .unwrap();

    let a = {
        let repo = repo.clone();
        let sub_id = sub.id;
        let answers = vec![AnswerDef {
            question_id: tf.question.id,
            choice_id: Some(correct_choice.id),
            short_answer: None,
        }];
        tokio::spawn(
            async move { submission::submit_answers(repo.as_ref(), sub_id, &answers).await },
        )
    };
    let b = {
        let repo = repo.clone();
        let sub_id = sub.id;
        let answers = vec![AnswerDef {
            question_id: sa.question.id,
            choice_id: None,
            short_answer: Some("paris".to_string()),
        }];
        tokio::spawn(
            async move { submission::submit_answers(repo.as_ref(), sub_id, &answers).await },
        )
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Whichever batch committed last, the stored score covers both.
    let stored = repo.get_submission(sub.id).await.unwrap().unwrap();
    let rows = repo.list_answers(sub.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(stored.score, 15);
}

#[tokio::test]
async fn finalize_wins_over_in_flight_answer_batch() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(&repo, vec![short_answer_def("Paris", 5)]).await;
    let sub = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    // A batch that passed the service's finalized check but reaches the
    // storage layer after a finalize must still be rejected there.
    repo.finalize_submission(sub.id, chrono::Utc::now())
        .await
        .unwrap();

    let late_batch = vec![Answer {
        id: Uuid::new_v4(),
        submission_id: sub.id,
        question_id: detail.questions[0].question.id,
        choice_id: None,
        short_answer: Some("Paris".to_string()),
        is_correct: true,
    }];
    assert!(matches!(
        repo.replace_answers(sub.id, &late_batch, chrono::Utc::now())
            .await,
        Err(AppError::Locked(_))
    ));
    assert!(repo.list_answers(sub.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_blacklist_entries_stop_blocking() {
    let repo = MemoryRepository::new();

    repo.blacklist_token("stale", chrono::Utc::now() - chrono::Duration::seconds(1))
        .await
        .unwrap();
    repo.blacklist_token("live", chrono::Utc::now() + chrono::Duration::seconds(600))
        .await
        .unwrap();

    assert!(!repo.is_token_blacklisted("stale").await.unwrap());
    assert!(repo.is_token_blacklisted("live").await.unwrap());
}

#[tokio::test]
async fn finalize_is_idempotent_and_locks_answer_intake() {
    let repo = MemoryRepository::new();
    let (user_id, detail) = seed_tryout(&repo, vec![short_answer_def("Paris", 5)]).await;
    let question_id = detail.questions[0].question.id;
    let sub = submission::create_submission(&repo, detail.tryout.id, user_id)
        .await
        .unwrap();

    let finalized = submission::finalize_submission(&repo, sub.id).await.unwrap();
    assert!(finalized.is_finalized());

    let again = submission::finalize_submission(&repo, sub.id).await.unwrap();
    assert_eq!(again.finalized_at, finalized.finalized_at);

    let answers = vec![AnswerDef {
        question_id,
        choice_id: None,
        short_answer: Some("Paris".to_string()),
    }];
    assert!(matches!(
        submission::submit_answers(&repo, sub.id, &answers).await,
        Err(AppError::Locked(_))
    ));
}
