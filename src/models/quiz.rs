// src/models/quiz.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// The four contexts a quiz can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    Course,
    Program,
    BibleSchool,
    General,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::Course => "course",
            QuizType::Program => "program",
            QuizType::BibleSchool => "bible_school",
            QuizType::General => "general",
        }
    }
}

impl fmt::Display for QuizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(QuizType::Course),
            "program" => Ok(QuizType::Program),
            "bible_school" => Ok(QuizType::BibleSchool),
            "general" => Ok(QuizType::General),
            other => Err(AppError::BadRequest(format!("Unknown quiz type '{}'", other))),
        }
    }
}

/// Scoping of a quiz. Exactly one variant applies, so a course quiz without
/// a course or a general quiz with a program cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "quiz_type", rename_all = "snake_case")]
pub enum QuizScope {
    Course {
        course_id: i64,
    },
    /// A program quiz, optionally narrowed to one course of that program.
    Program {
        program_id: i64,
        course_id: Option<i64>,
    },
    BibleSchool {
        bible_school_context: String,
    },
    General,
}

/// Flat column view of a scope, as stored in the `quizzes` table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeColumns {
    pub course_id: Option<i64>,
    pub program_id: Option<i64>,
    pub bible_school_context: Option<String>,
}

impl QuizScope {
    pub fn quiz_type(&self) -> QuizType {
        match self {
            QuizScope::Course { .. } => QuizType::Course,
            QuizScope::Program { .. } => QuizType::Program,
            QuizScope::BibleSchool { .. } => QuizType::BibleSchool,
            QuizScope::General => QuizType::General,
        }
    }

    pub fn columns(&self) -> ScopeColumns {
        match self {
            QuizScope::Course { course_id } => ScopeColumns {
                course_id: Some(*course_id),
                ..Default::default()
            },
            QuizScope::Program {
                program_id,
                course_id,
            } => ScopeColumns {
                course_id: *course_id,
                program_id: Some(*program_id),
                ..Default::default()
            },
            QuizScope::BibleSchool {
                bible_school_context,
            } => ScopeColumns {
                bible_school_context: Some(bible_school_context.clone()),
                ..Default::default()
            },
            QuizScope::General => ScopeColumns::default(),
        }
    }

    /// Rebuilds a scope from stored columns. Rejects rows that violate the
    /// scoping invariant instead of guessing.
    pub fn from_columns(quiz_type: QuizType, columns: ScopeColumns) -> Result<Self, AppError> {
        let ScopeColumns {
            course_id,
            program_id,
            bible_school_context,
        } = columns;

        let scope = match (quiz_type, course_id, program_id, bible_school_context) {
            (QuizType::Course, Some(course_id), None, None) => QuizScope::Course { course_id },
            (QuizType::Program, course_id, Some(program_id), None) => QuizScope::Program {
                program_id,
                course_id,
            },
            (QuizType::BibleSchool, None, None, Some(bible_school_context)) => {
                QuizScope::BibleSchool {
                    bible_school_context,
                }
            }
            (QuizType::General, None, None, None) => QuizScope::General,
            (quiz_type, ..) => {
                return Err(AppError::InternalServerError(format!(
                    "Stored {} quiz has inconsistent scope columns",
                    quiz_type
                )));
            }
        };
        Ok(scope)
    }
}

/// An administrator-defined assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    /// Minutes. `None` means untimed.
    pub time_limit: Option<i32>,
    /// Percentage, 0 to 100.
    pub passing_score: i32,
    pub max_attempts: i32,
    pub is_active: bool,
    #[serde(flatten)]
    pub scope: QuizScope,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Quiz {
    /// Countdown length in seconds, if the quiz is timed.
    pub fn total_seconds(&self) -> Option<i64> {
        self.time_limit.map(|minutes| i64::from(minutes) * 60)
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuizRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub time_limit: Option<i32>,
    pub passing_score: i32,
    pub max_attempts: i32,
    pub is_active: bool,
    pub quiz_type: String,
    pub course_id: Option<i64>,
    pub program_id: Option<i64>,
    pub bible_school_context: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = AppError;

    fn try_from(row: QuizRow) -> Result<Self, Self::Error> {
        let quiz_type = row
            .quiz_type
            .parse::<QuizType>()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        let scope = QuizScope::from_columns(
            quiz_type,
            ScopeColumns {
                course_id: row.course_id,
                program_id: row.program_id,
                bible_school_context: row.bible_school_context,
            },
        )?;

        Ok(Quiz {
            id: row.id,
            title: row.title,
            description: row.description,
            instructions: row.instructions,
            time_limit: row.time_limit,
            passing_score: row.passing_score,
            max_attempts: row.max_attempts,
            is_active: row.is_active,
            scope,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything needed to insert or fully rewrite a quiz, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizDefinition {
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub time_limit: Option<i32>,
    pub passing_score: i32,
    pub max_attempts: i32,
    pub is_active: bool,
    pub scope: QuizScope,
}

impl From<&Quiz> for QuizDefinition {
    fn from(quiz: &Quiz) -> Self {
        QuizDefinition {
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            instructions: quiz.instructions.clone(),
            time_limit: quiz.time_limit,
            passing_score: quiz.passing_score,
            max_attempts: quiz.max_attempts,
            is_active: quiz.is_active,
            scope: quiz.scope.clone(),
        }
    }
}

/// Scope fields as submitted by the admin form. Which of them survive is
/// decided by `quiz_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeInput {
    pub quiz_type: QuizType,
    pub course_id: Option<i64>,
    pub program_id: Option<i64>,
    pub bible_school_context: Option<String>,
}

/// DTO for creating a quiz.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    #[validate(range(min = 1))]
    pub max_attempts: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(flatten)]
    pub scope: ScopeInput,
}

fn default_active() -> bool {
    true
}

/// DTO for updating a quiz. Fields are optional.
///
/// `time_limit` distinguishes "leave as is" (absent) from "make untimed" (`null`).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub time_limit: Option<Option<i32>>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    pub is_active: Option<bool>,
    pub scope: Option<ScopeInput>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

/// Query parameters for listing quizzes by context.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizFilter {
    pub quiz_type: Option<QuizType>,
    /// Matches course quizzes and program quizzes narrowed to this course.
    pub course_id: Option<i64>,
    pub program_id: Option<i64>,
    /// Curriculum track tag of bible_school quizzes.
    pub context: Option<String>,
    #[serde(skip)]
    pub include_inactive: bool,
}

impl QuizFilter {
    pub fn matches(&self, quiz: &Quiz) -> bool {
        if !self.include_inactive && !quiz.is_active {
            return false;
        }
        if let Some(quiz_type) = self.quiz_type {
            if quiz.scope.quiz_type() != quiz_type {
                return false;
            }
        }

        let columns = quiz.scope.columns();
        if self.course_id.is_some() && columns.course_id != self.course_id {
            return false;
        }
        if self.program_id.is_some() && columns.program_id != self.program_id {
            return false;
        }
        if self.context.is_some() && columns.bible_school_context != self.context {
            return false;
        }
        true
    }
}
