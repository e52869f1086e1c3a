// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::error::AppError;

/// Answer format of a question. Decides which scoring rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    /// Free text, graded by a person. Scores 0 automatically.
    LongAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::LongAnswer => "long_answer",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "long_answer" => Ok(QuestionType::LongAnswer),
            other => Err(AppError::BadRequest(format!(
                "Unknown question type '{}'",
                other
            ))),
        }
    }
}

/// One choice of a multiple_choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

/// A single item of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Populated only for multiple_choice.
    pub options: Vec<QuestionOption>,
    /// Populated only for true_false and short_answer.
    pub correct_answer: Option<String>,
    pub points: i32,
    pub order_index: i32,
}

impl QuizQuestion {
    /// The option flagged correct, if the data has one.
    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.correct)
    }
}

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: String,
    /// Stored as a JSON array of `{text, correct}` objects.
    pub options: Json<Vec<QuestionOption>>,
    pub correct_answer: Option<String>,
    pub points: i32,
    pub order_index: i32,
}

impl TryFrom<QuestionRow> for QuizQuestion {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let question_type = row
            .question_type
            .parse::<QuestionType>()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(QuizQuestion {
            id: row.id,
            quiz_id: row.quiz_id,
            question_text: row.question_text,
            question_type,
            options: row.options.0,
            correct_answer: row.correct_answer,
            points: row.points,
            order_index: row.order_index,
        })
    }
}

/// DTO for sending a question to a learner (no answer key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub points: i32,
    pub order_index: i32,
}

impl From<&QuizQuestion> for PublicQuestion {
    fn from(q: &QuizQuestion) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text.clone(),
            question_type: q.question_type,
            options: q.options.iter().map(|o| o.text.clone()).collect(),
            points: q.points,
            order_index: q.order_index,
        }
    }
}

/// A validated question ready to be written. `order_index` of `None` means
/// "append after the last question".
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDefinition {
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<QuestionOption>,
    pub correct_answer: Option<String>,
    pub points: i32,
    pub order_index: Option<i32>,
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuestionOption>,
    #[validate(length(max = 500))]
    pub correct_answer: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub points: i32,
    #[validate(range(min = 0))]
    pub order_index: Option<i32>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<QuestionOption>>,
    #[validate(length(max = 500))]
    pub correct_answer: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub points: Option<i32>,
    #[validate(range(min = 0))]
    pub order_index: Option<i32>,
}

/// DTO for rewriting the order of every question of a quiz.
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderQuestionsRequest {
    /// Question ids in their new display order.
    pub question_ids: Vec<i64>,
}

fn validate_options(options: &[QuestionOption]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.text.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.text.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
