// src/admin.rs

//! Quiz definition management for administrators.
//!
//! Requests are validated and normalized here before they reach the catalog:
//! scope fields are derived from `quiz_type`, and question fields that do not
//! apply to the question type are cleared.

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{
            CreateQuestionRequest, QuestionDefinition, QuestionType, QuizQuestion,
            UpdateQuestionRequest,
        },
        quiz::{
            CreateQuizRequest, Quiz, QuizDefinition, QuizFilter, QuizScope, QuizType, ScopeInput,
            UpdateQuizRequest,
        },
    },
    store::QuizCatalog,
    utils::html::clean_html,
};

const MAX_CONTEXT_LEN: usize = 200;

/// Builds the scope for the selected `quiz_type`, dropping fields that belong
/// to other types.
pub fn resolve_scope(input: &ScopeInput) -> Result<QuizScope, AppError> {
    let missing = |field: &str| {
        AppError::BadRequest(format!(
            "{} is required for {} quizzes",
            field, input.quiz_type
        ))
    };

    let scope = match input.quiz_type {
        QuizType::Course => QuizScope::Course {
            course_id: input.course_id.ok_or_else(|| missing("course_id"))?,
        },
        QuizType::Program => QuizScope::Program {
            program_id: input.program_id.ok_or_else(|| missing("program_id"))?,
            course_id: input.course_id,
        },
        QuizType::BibleSchool => {
            let context = input
                .bible_school_context
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| missing("bible_school_context"))?;
            // Compared verbatim against the learner's filter, so never escaped.
            if context.chars().count() > MAX_CONTEXT_LEN {
                return Err(AppError::BadRequest(format!(
                    "bible_school_context must be at most {} characters",
                    MAX_CONTEXT_LEN
                )));
            }
            QuizScope::BibleSchool {
                bible_school_context: context.to_string(),
            }
        }
        QuizType::General => QuizScope::General,
    };
    Ok(scope)
}

fn clean_text(text: &str) -> String {
    clean_html(text).trim().to_string()
}

fn clean_optional(text: Option<String>) -> Option<String> {
    text.map(|t| clean_text(&t)).filter(|t| !t.is_empty())
}

fn check_time_limit(time_limit: Option<i32>) -> Result<(), AppError> {
    match time_limit {
        Some(minutes) if !(1..=1440).contains(&minutes) => Err(AppError::BadRequest(
            "time_limit must be between 1 and 1440 minutes".to_string(),
        )),
        _ => Ok(()),
    }
}

pub fn quiz_definition(req: CreateQuizRequest) -> Result<QuizDefinition, AppError> {
    req.validate()?;

    let title = clean_text(&req.title);
    if title.is_empty() {
        return Err(AppError::BadRequest("title cannot be empty".to_string()));
    }

    Ok(QuizDefinition {
        title,
        description: clean_optional(req.description),
        instructions: clean_optional(req.instructions),
        time_limit: req.time_limit,
        passing_score: req.passing_score,
        max_attempts: req.max_attempts,
        is_active: req.is_active,
        scope: resolve_scope(&req.scope)?,
    })
}

/// Merges a partial update over the current quiz.
pub fn apply_quiz_update(current: &Quiz, req: UpdateQuizRequest) -> Result<QuizDefinition, AppError> {
    req.validate()?;

    let mut definition = QuizDefinition::from(current);

    if let Some(title) = req.title {
        definition.title = clean_text(&title);
        if definition.title.is_empty() {
            return Err(AppError::BadRequest("title cannot be empty".to_string()));
        }
    }
    if let Some(description) = req.description {
        definition.description = clean_optional(Some(description));
    }
    if let Some(instructions) = req.instructions {
        definition.instructions = clean_optional(Some(instructions));
    }
    if let Some(time_limit) = req.time_limit {
        check_time_limit(time_limit)?;
        definition.time_limit = time_limit;
    }
    if let Some(passing_score) = req.passing_score {
        definition.passing_score = passing_score;
    }
    if let Some(max_attempts) = req.max_attempts {
        definition.max_attempts = max_attempts;
    }
    if let Some(is_active) = req.is_active {
        definition.is_active = is_active;
    }
    if let Some(scope) = req.scope {
        definition.scope = resolve_scope(&scope)?;
    }

    Ok(definition)
}

/// Enforces the per-type shape of a question.
pub fn normalize_question(mut def: QuestionDefinition) -> Result<QuestionDefinition, AppError> {
    def.question_text = clean_text(&def.question_text);
    if def.question_text.is_empty() {
        return Err(AppError::BadRequest("question_text cannot be empty".to_string()));
    }
    if def.points < 1 {
        return Err(AppError::BadRequest("points must be at least 1".to_string()));
    }

    match def.question_type {
        QuestionType::MultipleChoice => {
            def.correct_answer = None;
            for opt in &mut def.options {
                opt.text = opt.text.trim().to_string();
            }
            if def.options.len() < 2 {
                return Err(AppError::BadRequest(
                    "multiple_choice questions need at least two options".to_string(),
                ));
            }
            let correct = def.options.iter().filter(|o| o.correct).count();
            if correct != 1 {
                return Err(AppError::BadRequest(format!(
                    "multiple_choice questions need exactly one correct option, found {}",
                    correct
                )));
            }
        }
        QuestionType::TrueFalse => {
            def.options.clear();
            let key = def
                .correct_answer
                .as_deref()
                .map(|a| a.trim().to_lowercase());
            match key.as_deref() {
                Some("true") | Some("false") => def.correct_answer = key,
                _ => {
                    return Err(AppError::BadRequest(
                        "true_false questions need correct_answer \"true\" or \"false\"".to_string(),
                    ));
                }
            }
        }
        QuestionType::ShortAnswer => {
            def.options.clear();
            let key = def
                .correct_answer
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string);
            if key.is_none() {
                return Err(AppError::BadRequest(
                    "short_answer questions need a correct_answer".to_string(),
                ));
            }
            def.correct_answer = key;
        }
        QuestionType::LongAnswer => {
            def.options.clear();
            def.correct_answer = None;
        }
    }

    Ok(def)
}

pub fn question_definition(req: CreateQuestionRequest) -> Result<QuestionDefinition, AppError> {
    req.validate()?;
    normalize_question(QuestionDefinition {
        question_text: req.question_text,
        question_type: req.question_type,
        options: req.options,
        correct_answer: req.correct_answer,
        points: req.points,
        order_index: req.order_index,
    })
}

/// Merges a partial update over the current question, then re-normalizes, so
/// switching the type clears keys that no longer apply.
pub fn apply_question_update(
    current: &QuizQuestion,
    req: UpdateQuestionRequest,
) -> Result<QuestionDefinition, AppError> {
    req.validate()?;
    normalize_question(QuestionDefinition {
        question_text: req.question_text.unwrap_or_else(|| current.question_text.clone()),
        question_type: req.question_type.unwrap_or(current.question_type),
        options: req.options.unwrap_or_else(|| current.options.clone()),
        correct_answer: req.correct_answer.or_else(|| current.correct_answer.clone()),
        points: req.points.unwrap_or(current.points),
        order_index: req.order_index,
    })
}

/// A quiz with all of its questions, answer keys included.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuizQuestion>,
    pub total_points: i32,
}

/// Administrative CRUD over quizzes and their questions.
#[derive(Clone)]
pub struct QuizAdmin {
    catalog: Arc<dyn QuizCatalog>,
}

impl QuizAdmin {
    pub fn new(catalog: Arc<dyn QuizCatalog>) -> Self {
        Self { catalog }
    }

    /// Every quiz matching the filter, inactive ones included.
    pub async fn list_quizzes(&self, mut filter: QuizFilter) -> Result<Vec<Quiz>, AppError> {
        filter.include_inactive = true;
        self.catalog.list_quizzes(&filter).await
    }

    pub async fn quiz(&self, quiz_id: i64) -> Result<QuizDetail, AppError> {
        let quiz = self
            .catalog
            .get_quiz(quiz_id)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
        let questions = self.catalog.list_questions(quiz_id).await?;
        let total_points = questions.iter().map(|q| q.points).sum();
        Ok(QuizDetail {
            quiz,
            questions,
            total_points,
        })
    }

    pub async fn create_quiz(&self, req: CreateQuizRequest) -> Result<Quiz, AppError> {
        let definition = quiz_definition(req)?;
        let quiz = self.catalog.create_quiz(definition).await?;
        tracing::info!(quiz_id = quiz.id, quiz_type = %quiz.scope.quiz_type(), "Quiz created");
        Ok(quiz)
    }

    pub async fn update_quiz(&self, quiz_id: i64, req: UpdateQuizRequest) -> Result<Quiz, AppError> {
        let current = self
            .catalog
            .get_quiz(quiz_id)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
        let definition = apply_quiz_update(&current, req)?;
        self.catalog.update_quiz(quiz_id, definition).await
    }

    /// Deletes the quiz and its questions; recorded attempts stay.
    pub async fn delete_quiz(&self, quiz_id: i64) -> Result<(), AppError> {
        self.catalog.delete_quiz(quiz_id).await?;
        tracing::info!(quiz_id, "Quiz deleted");
        Ok(())
    }

    pub async fn questions(&self, quiz_id: i64) -> Result<Vec<QuizQuestion>, AppError> {
        if self.catalog.get_quiz(quiz_id).await?.is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        self.catalog.list_questions(quiz_id).await
    }

    pub async fn add_question(
        &self,
        quiz_id: i64,
        req: CreateQuestionRequest,
    ) -> Result<QuizQuestion, AppError> {
        let definition = question_definition(req)?;
        self.catalog.create_question(quiz_id, definition).await
    }

    pub async fn update_question(
        &self,
        question_id: i64,
        req: UpdateQuestionRequest,
    ) -> Result<QuizQuestion, AppError> {
        let current = self
            .catalog
            .get_question(question_id)
            .await?
            .ok_or(AppError::NotFound("Question not found".to_string()))?;
        let definition = apply_question_update(&current, req)?;
        self.catalog.update_question(question_id, definition).await
    }

    pub async fn delete_question(&self, question_id: i64) -> Result<(), AppError> {
        self.catalog.delete_question(question_id).await
    }

    pub async fn reorder_questions(
        &self,
        quiz_id: i64,
        question_ids: &[i64],
    ) -> Result<Vec<QuizQuestion>, AppError> {
        self.catalog.reorder_questions(quiz_id, question_ids).await
    }
}
