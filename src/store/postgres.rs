// src/store/postgres.rs

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use super::{AttemptLedger, QuestionBank, QuizCatalog};
use crate::{
    error::AppError,
    models::{
        attempt::{AttemptRow, NewAttempt, QuizAttempt},
        question::{QuestionDefinition, QuestionRow, QuizQuestion},
        quiz::{Quiz, QuizDefinition, QuizFilter, QuizRow},
    },
};

const QUIZ_COLUMNS: &str = "id, title, description, instructions, time_limit, passing_score, \
     max_attempts, is_active, quiz_type, course_id, program_id, bible_school_context, \
     created_at, updated_at";

const QUESTION_COLUMNS: &str =
    "id, quiz_id, question_text, question_type, options, correct_answer, points, order_index";

const ATTEMPT_COLUMNS: &str = "id, quiz_id, learner_id, answers, score, total_points, percentage, \
     passed, needs_review, time_taken, started_at, submitted_at";

/// PostgreSQL implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE id = $1",
            QUIZ_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch quiz {}: {:?}", quiz_id, e);
            AppError::from(e)
        })?;

        row.map(Quiz::try_from).transpose()
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<QuizQuestion>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM quiz_questions WHERE quiz_id = $1 ORDER BY order_index ASC",
            QUESTION_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions of quiz {}: {:?}", quiz_id, e);
            AppError::from(e)
        })?;

        rows.into_iter().map(QuizQuestion::try_from).collect()
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM quizzes WHERE TRUE", QUIZ_COLUMNS));

        if !filter.include_inactive {
            builder.push(" AND is_active");
        }
        if let Some(quiz_type) = filter.quiz_type {
            builder.push(" AND quiz_type = ");
            builder.push_bind(quiz_type.as_str());
        }
        if let Some(course_id) = filter.course_id {
            builder.push(" AND course_id = ");
            builder.push_bind(course_id);
        }
        if let Some(program_id) = filter.program_id {
            builder.push(" AND program_id = ");
            builder.push_bind(program_id);
        }
        if let Some(context) = &filter.context {
            builder.push(" AND bible_school_context = ");
            builder.push_bind(context.clone());
        }
        builder.push(" ORDER BY id DESC");

        let rows: Vec<QuizRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list quizzes: {:?}", e);
                AppError::from(e)
            })?;

        rows.into_iter().map(Quiz::try_from).collect()
    }
}

#[async_trait]
impl AttemptLedger for PgStore {
    async fn list_attempts(
        &self,
        quiz_id: i64,
        learner_id: i64,
    ) -> Result<Vec<QuizAttempt>, AppError> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            SELECT {} FROM quiz_attempts
            WHERE quiz_id = $1 AND learner_id = $2
            ORDER BY submitted_at DESC, id DESC
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_id)
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list attempts: {:?}", e);
            AppError::from(e)
        })?;

        Ok(rows.into_iter().map(QuizAttempt::from).collect())
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            INSERT INTO quiz_attempts
            (quiz_id, learner_id, answers, score, total_points, percentage,
             passed, needs_review, time_taken, started_at, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.quiz_id)
        .bind(attempt.learner_id)
        .bind(Json(&attempt.answers))
        .bind(attempt.score)
        .bind(attempt.total_points)
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(attempt.needs_review)
        .bind(attempt.time_taken)
        .bind(attempt.started_at)
        .bind(attempt.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert quiz attempt: {:?}", e);
            AppError::Persistence(e.to_string())
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl QuizCatalog for PgStore {
    async fn create_quiz(&self, definition: QuizDefinition) -> Result<Quiz, AppError> {
        let columns = definition.scope.columns();
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            r#"
            INSERT INTO quizzes
            (title, description, instructions, time_limit, passing_score, max_attempts,
             is_active, quiz_type, course_id, program_id, bible_school_context)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(definition.title)
        .bind(definition.description)
        .bind(definition.instructions)
        .bind(definition.time_limit)
        .bind(definition.passing_score)
        .bind(definition.max_attempts)
        .bind(definition.is_active)
        .bind(definition.scope.quiz_type().as_str())
        .bind(columns.course_id)
        .bind(columns.program_id)
        .bind(columns.bible_school_context)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz: {:?}", e);
            AppError::from(e)
        })?;

        Quiz::try_from(row)
    }

    async fn update_quiz(
        &self,
        quiz_id: i64,
        definition: QuizDefinition,
    ) -> Result<Quiz, AppError> {
        let columns = definition.scope.columns();
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            r#"
            UPDATE quizzes SET
                title = $1, description = $2, instructions = $3, time_limit = $4,
                passing_score = $5, max_attempts = $6, is_active = $7, quiz_type = $8,
                course_id = $9, program_id = $10, bible_school_context = $11,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $12
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(definition.title)
        .bind(definition.description)
        .bind(definition.instructions)
        .bind(definition.time_limit)
        .bind(definition.passing_score)
        .bind(definition.max_attempts)
        .bind(definition.is_active)
        .bind(definition.scope.quiz_type().as_str())
        .bind(columns.course_id)
        .bind(columns.program_id)
        .bind(columns.bible_school_context)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update quiz {}: {:?}", quiz_id, e);
            AppError::from(e)
        })?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

        Quiz::try_from(row)
    }

    async fn delete_quiz(&self, quiz_id: i64) -> Result<(), AppError> {
        // quiz_questions cascade through the foreign key.
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete quiz {}: {:?}", quiz_id, e);
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        Ok(())
    }

    async fn get_question(&self, question_id: i64) -> Result<Option<QuizQuestion>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM quiz_questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QuizQuestion::try_from).transpose()
    }

    async fn create_question(
        &self,
        quiz_id: i64,
        definition: QuestionDefinition,
    ) -> Result<QuizQuestion, AppError> {
        let exists = sqlx::query("SELECT id FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            INSERT INTO quiz_questions
            (quiz_id, question_text, question_type, options, correct_answer, points, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7,
                (SELECT COALESCE(MAX(order_index) + 1, 0) FROM quiz_questions WHERE quiz_id = $1)))
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        ))
        .bind(quiz_id)
        .bind(definition.question_text)
        .bind(definition.question_type.as_str())
        .bind(Json(definition.options))
        .bind(definition.correct_answer)
        .bind(definition.points)
        .bind(definition.order_index)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::from(e)
        })?;

        QuizQuestion::try_from(row)
    }

    async fn update_question(
        &self,
        question_id: i64,
        definition: QuestionDefinition,
    ) -> Result<QuizQuestion, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            UPDATE quiz_questions SET
                question_text = $1, question_type = $2, options = $3,
                correct_answer = $4, points = $5, order_index = COALESCE($6, order_index)
            WHERE id = $7
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        ))
        .bind(definition.question_text)
        .bind(definition.question_type.as_str())
        .bind(Json(definition.options))
        .bind(definition.correct_answer)
        .bind(definition.points)
        .bind(definition.order_index)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question {}: {:?}", question_id, e);
            AppError::from(e)
        })?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

        QuizQuestion::try_from(row)
    }

    async fn delete_question(&self, question_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
            .bind(question_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete question {}: {:?}", question_id, e);
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }
        Ok(())
    }

    async fn reorder_questions(
        &self,
        quiz_id: i64,
        question_ids: &[i64],
    ) -> Result<Vec<QuizQuestion>, AppError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT id FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let current: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM quiz_questions WHERE quiz_id = $1 FOR UPDATE")
                .bind(quiz_id)
                .fetch_all(&mut *tx)
                .await?;
        let current: HashSet<i64> = current.into_iter().map(|(id,)| id).collect();
        let requested: HashSet<i64> = question_ids.iter().copied().collect();
        if requested.len() != question_ids.len() || requested != current {
            return Err(AppError::BadRequest(
                "question_ids must list every question of the quiz exactly once".to_string(),
            ));
        }

        // The (quiz_id, order_index) constraint is deferrable; check it at commit.
        sqlx::query("SET CONSTRAINTS quiz_questions_order_unique DEFERRED")
            .execute(&mut *tx)
            .await?;

        for (index, id) in question_ids.iter().enumerate() {
            sqlx::query("UPDATE quiz_questions SET order_index = $1 WHERE id = $2")
                .bind(index as i32)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.list_questions(quiz_id).await
    }
}
