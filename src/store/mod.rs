// src/store/mod.rs

//! Collaborators the engine talks to. The engine owns none of the data: it
//! reads quiz definitions from a [`QuestionBank`], appends finished attempts
//! to an [`AttemptLedger`], and the admin surface edits definitions through
//! a [`QuizCatalog`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::{NewAttempt, QuizAttempt},
        question::{QuestionDefinition, QuizQuestion},
        quiz::{Quiz, QuizDefinition, QuizFilter},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read side of quiz definitions.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError>;

    /// Questions of a quiz, ascending `order_index`.
    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<QuizQuestion>, AppError>;

    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, AppError>;
}

/// Append-only record of finished attempts.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    /// Most recent first.
    async fn list_attempts(&self, quiz_id: i64, learner_id: i64)
    -> Result<Vec<QuizAttempt>, AppError>;

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, AppError>;
}

/// Write side of quiz definitions, used by administrators.
#[async_trait]
pub trait QuizCatalog: QuestionBank {
    async fn create_quiz(&self, definition: QuizDefinition) -> Result<Quiz, AppError>;

    async fn update_quiz(&self, quiz_id: i64, definition: QuizDefinition)
    -> Result<Quiz, AppError>;

    /// Removes the quiz and its questions. Attempts are kept as history.
    async fn delete_quiz(&self, quiz_id: i64) -> Result<(), AppError>;

    async fn get_question(&self, question_id: i64) -> Result<Option<QuizQuestion>, AppError>;

    async fn create_question(
        &self,
        quiz_id: i64,
        definition: QuestionDefinition,
    ) -> Result<QuizQuestion, AppError>;

    async fn update_question(
        &self,
        question_id: i64,
        definition: QuestionDefinition,
    ) -> Result<QuizQuestion, AppError>;

    async fn delete_question(&self, question_id: i64) -> Result<(), AppError>;

    /// Rewrites `order_index` of every question of the quiz to match `question_ids`.
    async fn reorder_questions(
        &self,
        quiz_id: i64,
        question_ids: &[i64],
    ) -> Result<Vec<QuizQuestion>, AppError>;
}
