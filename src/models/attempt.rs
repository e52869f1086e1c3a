// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// A learner's finished, scored submission. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub learner_id: i64,
    /// Key: Question ID. Value: the submitted answer as entered.
    pub answers: HashMap<i64, String>,
    /// Sum of earned points.
    pub score: i32,
    pub total_points: i32,
    /// Rounded, 0 to 100.
    pub percentage: i32,
    pub passed: bool,
    /// The quiz has long-answer items awaiting manual review, so the score is provisional.
    pub needs_review: bool,
    /// Seconds.
    pub time_taken: i32,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

/// An attempt that has been scored but not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub learner_id: i64,
    pub answers: HashMap<i64, String>,
    pub score: i32,
    pub total_points: i32,
    pub percentage: i32,
    pub passed: bool,
    pub needs_review: bool,
    pub time_taken: i32,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

impl NewAttempt {
    pub fn with_id(self, id: i64) -> QuizAttempt {
        QuizAttempt {
            id,
            quiz_id: self.quiz_id,
            learner_id: self.learner_id,
            answers: self.answers,
            score: self.score,
            total_points: self.total_points,
            percentage: self.percentage,
            passed: self.passed,
            needs_review: self.needs_review,
            time_taken: self.time_taken,
            started_at: self.started_at,
            submitted_at: self.submitted_at,
        }
    }
}

/// Represents the 'quiz_attempts' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    pub id: i64,
    pub quiz_id: i64,
    pub learner_id: i64,
    pub answers: Json<HashMap<i64, String>>,
    pub score: i32,
    pub total_points: i32,
    pub percentage: i32,
    pub passed: bool,
    pub needs_review: bool,
    pub time_taken: i32,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

impl From<AttemptRow> for QuizAttempt {
    fn from(row: AttemptRow) -> Self {
        QuizAttempt {
            id: row.id,
            quiz_id: row.quiz_id,
            learner_id: row.learner_id,
            answers: row.answers.0,
            score: row.score,
            total_points: row.total_points,
            percentage: row.percentage,
            passed: row.passed,
            needs_review: row.needs_review,
            time_taken: row.time_taken,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
        }
    }
}

/// Results view of one learner on one quiz.
#[derive(Debug, Clone, Serialize)]
pub struct QuizResults {
    pub quiz_id: i64,
    /// Most recent first.
    pub attempts: Vec<QuizAttempt>,
    pub best_attempt: Option<QuizAttempt>,
    pub attempts_used: usize,
    pub attempts_remaining: usize,
    pub can_retake: bool,
}

/// DTO for the answer endpoint.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub value: String,
}

/// DTO for the navigate endpoint. Either an absolute index or a relative move.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigateRequest {
    Index(usize),
    Next,
    Previous,
}
