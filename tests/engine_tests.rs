// tests/engine_tests.rs

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use quiz_engine::{
    admin::QuizAdmin,
    engine::{QuizEngine, SessionStatus, SessionTimings},
    error::AppError,
    models::{
        attempt::{NavigateRequest, NewAttempt, QuizAttempt},
        question::{CreateQuestionRequest, QuestionOption, QuestionType},
        quiz::{CreateQuizRequest, Quiz, QuizFilter, QuizScope, QuizType, ScopeInput, UpdateQuizRequest},
    },
    store::{AttemptLedger, MemoryStore},
};

const LEARNER: i64 = 101;

/// Ledger whose writes can be switched to fail, to simulate an unreachable store.
struct FlakyLedger {
    inner: Arc<MemoryStore>,
    failing: AtomicBool,
}

#[async_trait]
impl AttemptLedger for FlakyLedger {
    async fn list_attempts(
        &self,
        quiz_id: i64,
        learner_id: i64,
    ) -> Result<Vec<QuizAttempt>, AppError> {
        self.inner.list_attempts(quiz_id, learner_id).await
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("connection refused".to_string()));
        }
        self.inner.create_attempt(attempt).await
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    ledger: Arc<FlakyLedger>,
    admin: QuizAdmin,
    engine: QuizEngine,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(FlakyLedger {
        inner: store.clone(),
        failing: AtomicBool::new(false),
    });
    Harness {
        admin: QuizAdmin::new(store.clone()),
        engine: QuizEngine::new(store.clone(), ledger.clone(), SessionTimings::default()),
        store,
        ledger,
    }
}

fn quiz_request(time_limit: Option<i32>, passing_score: i32, max_attempts: i32) -> CreateQuizRequest {
    CreateQuizRequest {
        title: "Life of Christ".to_string(),
        description: None,
        instructions: Some("Answer every question.".to_string()),
        time_limit,
        passing_score,
        max_attempts,
        is_active: true,
        scope: ScopeInput {
            quiz_type: QuizType::Course,
            course_id: Some(12),
            program_id: None,
            bible_school_context: None,
        },
    }
}

fn multiple_choice(text: &str, correct: &str, points: i32) -> CreateQuestionRequest {
    CreateQuestionRequest {
        question_text: text.to_string(),
        question_type: QuestionType::MultipleChoice,
        options: ["Bethlehem", "Nazareth", "Capernaum"]
            .iter()
            .map(|o| QuestionOption {
                text: o.to_string(),
                correct: *o == correct,
            })
            .collect(),
        correct_answer: None,
        points,
        order_index: None,
    }
}

fn keyed(question_type: QuestionType, key: Option<&str>, points: i32) -> CreateQuestionRequest {
    CreateQuestionRequest {
        question_text: format!("A {} question", question_type),
        question_type,
        options: Vec::new(),
        correct_answer: key.map(str::to_string),
        points,
        order_index: None,
    }
}

/// Quiz with two 2-point multiple-choice questions.
async fn two_question_quiz(h: &Harness, time_limit: Option<i32>, max_attempts: i32) -> (Quiz, Vec<i64>) {
    let quiz = h
        .admin
        .create_quiz(quiz_request(time_limit, 50, max_attempts))
        .await
        .unwrap();
    let q1 = h
        .admin
        .add_question(quiz.id, multiple_choice("Where was Jesus born?", "Bethlehem", 2))
        .await
        .unwrap();
    let q2 = h
        .admin
        .add_question(quiz.id, multiple_choice("Where did Jesus grow up?", "Nazareth", 2))
        .await
        .unwrap();
    (quiz, vec![q1.id, q2.id])
}

async fn attempt_count(h: &Harness, quiz_id: i64) -> usize {
    h.store.list_attempts(quiz_id, LEARNER).await.unwrap().len()
}

#[tokio::test(start_paused = true)]
async fn half_correct_untimed_quiz_passes_at_fifty() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, None, 3).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.answer(ids[0], "Bethlehem".to_string()).await.unwrap();
    session.answer(ids[1], "Capernaum".to_string()).await.unwrap();

    let attempt = session.submit().await.unwrap();
    assert_eq!(attempt.score, 2);
    assert_eq!(attempt.total_points, 4);
    assert_eq!(attempt.percentage, 50);
    assert!(attempt.passed);
    assert!(!attempt.needs_review);

    let view = session.view().await.unwrap();
    assert_eq!(view.status, SessionStatus::Completed);
    assert_eq!(view.attempt.map(|a| a.id), Some(attempt.id));
}

#[tokio::test(start_paused = true)]
async fn untimed_session_has_no_countdown() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, None, 1).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    let view = session.view().await.unwrap();
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!(view.remaining_seconds, None);
    assert_eq!(attempt_count(&h, quiz.id).await, 0);
}

#[tokio::test(start_paused = true)]
async fn expired_timer_submits_exactly_once() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, Some(1), 3).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    assert_eq!(session.view().await.unwrap().remaining_seconds, Some(60));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let view = session.view().await.unwrap();
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!(view.remaining_seconds, Some(30));

    tokio::time::sleep(Duration::from_secs(31)).await;
    session.completed().await.unwrap();

    let attempts = h.store.list_attempts(quiz.id, LEARNER).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].percentage, 0);
    assert!(!attempts[0].passed);
    assert_eq!(attempts[0].time_taken, 60);

    // The countdown is gone; nothing else gets written later.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(attempt_count(&h, quiz.id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn double_submit_persists_one_attempt() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, None, 3).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.answer(ids[0], "Bethlehem".to_string()).await.unwrap();

    let (first, second) = tokio::join!(session.submit(), session.submit());
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.id, second.id);
    assert_eq!(attempt_count(&h, quiz.id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn manual_submit_racing_the_timer_persists_one_attempt() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, Some(1), 3).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.answer(ids[1], "Nazareth".to_string()).await.unwrap();

    // Both the learner and the countdown fire at the 60 second mark.
    tokio::time::sleep(Duration::from_secs(60)).await;
    let attempt = session.submit().await.unwrap();

    assert_eq!(attempt.percentage, 50);
    assert_eq!(attempt_count(&h, quiz.id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn manual_submit_stops_the_countdown() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, Some(2), 3).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let attempt = session.submit().await.unwrap();
    assert_eq!(attempt.time_taken, 10);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(attempt_count(&h, quiz.id).await, 1);
    assert_eq!(session.status(), SessionStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn attempt_limit_refuses_new_sessions() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, None, 2).await;

    for _ in 0..2 {
        let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
        session.submit().await.unwrap();
    }

    let err = h.engine.start_session(quiz.id, LEARNER).await.err().unwrap();
    assert_eq!(
        err,
        AppError::AttemptLimitExceeded {
            quiz_id: quiz.id,
            attempts: 2,
            max_attempts: 2,
        }
    );

    let results = h.engine.results(quiz.id, LEARNER).await.unwrap();
    assert_eq!(results.attempts_used, 2);
    assert_eq!(results.attempts_remaining, 0);
    assert!(!results.can_retake);

    // Another learner is unaffected.
    assert!(h.engine.start_session(quiz.id, LEARNER + 1).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn raising_max_attempts_reopens_the_quiz() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, None, 1).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.submit().await.unwrap();
    assert!(h.engine.start_session(quiz.id, LEARNER).await.is_err());

    h.admin
        .update_quiz(
            quiz.id,
            UpdateQuizRequest {
                max_attempts: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(h.engine.start_session(quiz.id, LEARNER).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn starting_twice_resumes_the_unfinished_session() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, None, 1).await;

    let first = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    first.answer(ids[0], "Nazareth".to_string()).await.unwrap();

    let second = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    assert_eq!(first.id(), second.id());
    let view = second.view().await.unwrap();
    assert_eq!(view.answers.get(&ids[0]).map(String::as_str), Some("Nazareth"));
}

#[tokio::test(start_paused = true)]
async fn navigation_is_free_and_does_not_require_answers() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, None, 1).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    let view = session.navigate(NavigateRequest::Index(1)).await.unwrap();
    assert_eq!(view.current_index, 1);
    assert_eq!(view.current_question.map(|q| q.id), Some(ids[1]));

    let view = session.navigate(NavigateRequest::Previous).await.unwrap();
    assert_eq!(view.current_index, 0);

    let err = session.navigate(NavigateRequest::Index(5)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_keeps_answers_and_allows_retry() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, None, 1).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.answer(ids[0], "Bethlehem".to_string()).await.unwrap();
    session.answer(ids[1], "Nazareth".to_string()).await.unwrap();

    h.ledger.failing.store(true, Ordering::SeqCst);
    let err = session.submit().await.unwrap_err();
    assert!(err.is_retryable());

    let view = session.view().await.unwrap();
    assert_eq!(view.status, SessionStatus::Submitting);
    assert_eq!(view.answers.len(), 2);
    assert!(view.last_error.is_some());
    assert!(matches!(
        session.answer(ids[0], "Nazareth".to_string()).await,
        Err(AppError::InvalidState(_))
    ));
    assert_eq!(attempt_count(&h, quiz.id).await, 0);

    h.ledger.failing.store(false, Ordering::SeqCst);
    let attempt = session.submit().await.unwrap();
    assert_eq!(attempt.percentage, 100);
    assert_eq!(attempt_count(&h, quiz.id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn timer_expiry_during_outage_waits_for_retry() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, Some(1), 1).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    h.ledger.failing.store(true, Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(session.status(), SessionStatus::Submitting);
    assert_eq!(attempt_count(&h, quiz.id).await, 0);

    h.ledger.failing.store(false, Ordering::SeqCst);
    let attempt = session.submit().await.unwrap();
    assert_eq!(attempt.time_taken, 60);
    assert_eq!(attempt_count(&h, quiz.id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn long_answer_contributes_nothing_automatically() {
    let h = harness();
    let quiz = h
        .admin
        .create_quiz(quiz_request(None, 60, 1))
        .await
        .unwrap();
    let essay = h
        .admin
        .add_question(quiz.id, keyed(QuestionType::LongAnswer, None, 10))
        .await
        .unwrap();
    let statement = h
        .admin
        .add_question(quiz.id, keyed(QuestionType::TrueFalse, Some("true"), 10))
        .await
        .unwrap();

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session
        .answer(essay.id, "Grace is unmerited favour.".to_string())
        .await
        .unwrap();
    session.answer(statement.id, "true".to_string()).await.unwrap();

    let attempt = session.submit().await.unwrap();
    assert_eq!(attempt.score, 10);
    assert_eq!(attempt.total_points, 20);
    assert_eq!(attempt.percentage, 50);
    assert!(!attempt.passed);
    assert!(attempt.needs_review);
}

#[tokio::test(start_paused = true)]
async fn short_answers_ignore_case_and_surrounding_space() {
    let h = harness();
    let quiz = h
        .admin
        .create_quiz(quiz_request(None, 100, 3))
        .await
        .unwrap();
    let question = h
        .admin
        .add_question(quiz.id, keyed(QuestionType::ShortAnswer, Some("grace"), 1))
        .await
        .unwrap();

    for (answer, expected) in [(" GRACE ", 100), ("graace", 0)] {
        let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
        session.answer(question.id, answer.to_string()).await.unwrap();
        assert_eq!(session.submit().await.unwrap().percentage, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn best_attempt_is_the_highest_percentage() {
    let h = harness();
    let quiz = h
        .admin
        .create_quiz(quiz_request(None, 70, 5))
        .await
        .unwrap();
    for _ in 0..5 {
        h.admin
            .add_question(quiz.id, keyed(QuestionType::TrueFalse, Some("true"), 1))
            .await
            .unwrap();
    }
    let ids: Vec<i64> = h
        .admin
        .questions(quiz.id)
        .await
        .unwrap()
        .iter()
        .map(|q| q.id)
        .collect();

    // 2/5 = 40, 4/5 = 80, 3/5 = 60
    for correct in [2, 4, 3] {
        let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
        for id in &ids[..correct] {
            session.answer(*id, "true".to_string()).await.unwrap();
        }
        session.submit().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let results = h.engine.results(quiz.id, LEARNER).await.unwrap();
    let percentages: Vec<i32> = results.attempts.iter().map(|a| a.percentage).collect();
    assert_eq!(percentages, vec![60, 80, 40]);
    assert_eq!(results.best_attempt.map(|a| a.percentage), Some(80));
    assert_eq!(results.attempts_remaining, 2);
}

#[tokio::test(start_paused = true)]
async fn unavailable_quizzes_do_not_start() {
    let h = harness();

    let missing = h.engine.start_session(999, LEARNER).await.err().unwrap();
    assert!(matches!(missing, AppError::NotFound(_)));

    let empty = h
        .admin
        .create_quiz(quiz_request(None, 50, 1))
        .await
        .unwrap();
    let err = h.engine.start_session(empty.id, LEARNER).await.err().unwrap();
    assert!(matches!(err, AppError::NotFound(_)));

    let (inactive, _) = two_question_quiz(&h, None, 1).await;
    h.admin
        .update_quiz(
            inactive.id,
            UpdateQuizRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = h.engine.start_session(inactive.id, LEARNER).await.err().unwrap();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn sessions_belong_to_their_learner() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, None, 1).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    assert!(h.engine.session(session.id(), LEARNER).await.is_ok());
    assert!(matches!(
        h.engine.session(session.id(), LEARNER + 1).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn deleting_a_quiz_keeps_attempt_history() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, None, 1).await;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.submit().await.unwrap();

    h.admin.delete_quiz(quiz.id).await.unwrap();
    assert!(h.admin.questions(quiz.id).await.is_err());
    assert_eq!(attempt_count(&h, quiz.id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_right_after_submit_sees_the_completed_session() {
    let h = harness();
    let (limited, _) = two_question_quiz(&h, None, 1).await;
    let (open, _) = two_question_quiz(&h, None, 1000).await;

    for learner in 0..300 {
        let session = h.engine.start_session(limited.id, learner).await.unwrap();
        session.submit().await.unwrap();
        let err = h.engine.start_session(limited.id, learner).await.err().unwrap();
        assert!(matches!(err, AppError::AttemptLimitExceeded { .. }));
    }

    for _ in 0..300 {
        let session = h.engine.start_session(open.id, LEARNER).await.unwrap();
        session.submit().await.unwrap();
        let next = h.engine.start_session(open.id, LEARNER).await.unwrap();
        assert_ne!(next.id(), session.id());
        next.submit().await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn completed_sessions_leave_the_registry() {
    let h = harness();
    let (quiz, _) = two_question_quiz(&h, None, 1).await;
    let linger = SessionTimings::default().linger;

    let mut sessions = Vec::new();
    for learner in 0..50 {
        let session = h.engine.start_session(quiz.id, learner).await.unwrap();
        session.submit().await.unwrap();
        sessions.push(session);
    }
    assert_eq!(h.engine.sessions().len().await, 50);

    // Still reachable for a repeat submit within the linger period.
    tokio::time::sleep(linger / 2).await;
    let again = h.engine.session(sessions[0].id(), 0).await.unwrap();
    assert_eq!(again.submit().await.unwrap().learner_id, 0);

    tokio::time::sleep(linger + Duration::from_secs(1)).await;
    assert_eq!(h.engine.sessions().len().await, 0);
    assert!(matches!(
        sessions[1].view().await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(h.store.list_attempts(quiz.id, 0).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn idle_untimed_session_is_dropped_without_an_attempt() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, None, 1).await;
    let idle = SessionTimings::default().idle;

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.answer(ids[0], "Bethlehem".to_string()).await.unwrap();

    tokio::time::sleep(idle + Duration::from_secs(1)).await;
    assert_eq!(h.engine.sessions().len().await, 0);
    assert!(matches!(
        h.engine.session(session.id(), LEARNER).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(attempt_count(&h, quiz.id).await, 0);

    // The abandoned session used no attempt.
    let fresh = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    assert_ne!(fresh.id(), session.id());
}

#[tokio::test(start_paused = true)]
async fn idle_session_with_pending_attempt_is_written_before_dropping() {
    let h = harness();
    let (quiz, ids) = two_question_quiz(&h, None, 1).await;
    let timings = SessionTimings::default();

    let session = h.engine.start_session(quiz.id, LEARNER).await.unwrap();
    session.answer(ids[1], "Nazareth".to_string()).await.unwrap();
    h.ledger.failing.store(true, Ordering::SeqCst);
    assert!(session.submit().await.is_err());
    h.ledger.failing.store(false, Ordering::SeqCst);

    tokio::time::sleep(timings.idle + Duration::from_secs(1)).await;
    let attempts = h.store.list_attempts(quiz.id, LEARNER).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].percentage, 50);
    assert_eq!(session.status(), SessionStatus::Completed);

    tokio::time::sleep(timings.linger + Duration::from_secs(1)).await;
    assert_eq!(h.engine.sessions().len().await, 0);
}

#[tokio::test]
async fn curriculum_tag_with_markup_characters_still_matches() {
    let h = harness();
    let mut request = quiz_request(None, 50, 1);
    request.scope = ScopeInput {
        quiz_type: QuizType::BibleSchool,
        course_id: None,
        program_id: None,
        bible_school_context: Some("  Year 1 & 2 <intro>  ".to_string()),
    };
    let quiz = h.admin.create_quiz(request).await.unwrap();
    assert_eq!(
        quiz.scope,
        QuizScope::BibleSchool {
            bible_school_context: "Year 1 & 2 <intro>".to_string()
        }
    );

    let found = h
        .engine
        .available_quizzes(QuizFilter {
            context: Some("Year 1 & 2 <intro>".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.iter().map(|q| q.id).collect::<Vec<_>>(), vec![quiz.id]);
}
