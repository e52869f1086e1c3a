// src/engine/mod.rs

pub mod policy;
pub mod registry;
pub mod scoring;
pub mod session;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::QuizResults,
        question::QuizQuestion,
        quiz::{Quiz, QuizFilter},
    },
    store::{AttemptLedger, QuestionBank},
};

pub use registry::SessionRegistry;
pub use session::{QuizSession, SessionHandle, SessionStatus, SessionTimings, SessionView};

/// A quiz as a learner sees it before starting, with their results so far.
#[derive(Debug, Clone, Serialize)]
pub struct QuizOverview {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub question_count: usize,
    pub total_points: i32,
    pub results: QuizResults,
}

/// Entry point for everything a learner does with quizzes.
#[derive(Clone)]
pub struct QuizEngine {
    bank: Arc<dyn QuestionBank>,
    ledger: Arc<dyn AttemptLedger>,
    sessions: SessionRegistry,
    timings: SessionTimings,
}

impl QuizEngine {
    pub fn new(
        bank: Arc<dyn QuestionBank>,
        ledger: Arc<dyn AttemptLedger>,
        timings: SessionTimings,
    ) -> Self {
        Self {
            bank,
            ledger,
            sessions: SessionRegistry::new(),
            timings,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Active quizzes for a course, program or curriculum context.
    pub async fn available_quizzes(&self, mut filter: QuizFilter) -> Result<Vec<Quiz>, AppError> {
        filter.include_inactive = false;
        self.bank.list_quizzes(&filter).await
    }

    /// An active quiz the learner can see.
    pub async fn quiz(&self, quiz_id: i64) -> Result<Quiz, AppError> {
        match self.bank.get_quiz(quiz_id).await? {
            Some(quiz) if quiz.is_active => Ok(quiz),
            _ => Err(AppError::NotFound("Quiz not found".to_string())),
        }
    }

    /// Loads a quiz and its ordered questions for a session.
    pub async fn load(&self, quiz_id: i64) -> Result<(Quiz, Vec<QuizQuestion>), AppError> {
        let quiz = self.quiz(quiz_id).await?;
        let questions = self.bank.list_questions(quiz_id).await?;
        if questions.is_empty() {
            return Err(AppError::NotFound("Quiz has no questions".to_string()));
        }
        Ok((quiz, questions))
    }

    /// Starts a session, or resumes the learner's unfinished one.
    ///
    /// Refused with `AttemptLimitExceeded` once `max_attempts` attempts exist.
    pub async fn start_session(
        &self,
        quiz_id: i64,
        learner_id: i64,
    ) -> Result<SessionHandle, AppError> {
        if let Some(handle) = self.sessions.unfinished(quiz_id, learner_id).await {
            tracing::debug!(session_id = %handle.id(), "Resuming unfinished session");
            return Ok(handle);
        }

        let (quiz, questions) = self.load(quiz_id).await?;

        let attempts = self.ledger.list_attempts(quiz_id, learner_id).await?;
        if let Err(e) = policy::check_attempt_limit(&quiz, &attempts) {
            tracing::warn!(quiz_id, learner_id, "Refusing new session: {}", e);
            return Err(e);
        }

        let mut session = QuizSession::new(learner_id, quiz, questions)?;
        session.begin(tokio::time::Instant::now())?;
        let session_id = session.id();
        let timed = session.is_timed();

        let handle = SessionHandle::spawn(session, self.ledger.clone(), self.timings);
        let handle = self.sessions.insert(handle).await;

        if handle.id() == session_id {
            tracing::info!(%session_id, quiz_id, learner_id, timed, "Quiz session started");
        }
        Ok(handle)
    }

    /// A session owned by `learner_id`. Other learners get `NotFound`.
    pub async fn session(&self, session_id: Uuid, learner_id: i64) -> Result<SessionHandle, AppError> {
        self.sessions
            .get(session_id)
            .await
            .filter(|h| h.learner_id() == learner_id)
            .ok_or(AppError::NotFound("Session not found".to_string()))
    }

    pub async fn overview(&self, quiz_id: i64, learner_id: i64) -> Result<QuizOverview, AppError> {
        let quiz = self.quiz(quiz_id).await?;
        let questions = self.bank.list_questions(quiz_id).await?;
        let attempts = self.ledger.list_attempts(quiz_id, learner_id).await?;
        let results = policy::summarize(&quiz, attempts);

        Ok(QuizOverview {
            question_count: questions.len(),
            total_points: questions.iter().map(|q| q.points).sum(),
            quiz,
            results,
        })
    }

    /// Past attempts, best attempt and remaining attempts of one learner.
    pub async fn results(&self, quiz_id: i64, learner_id: i64) -> Result<QuizResults, AppError> {
        let quiz = self
            .bank
            .get_quiz(quiz_id)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
        let attempts = self.ledger.list_attempts(quiz_id, learner_id).await?;
        Ok(policy::summarize(&quiz, attempts))
    }
}
