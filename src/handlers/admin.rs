// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    admin::QuizAdmin,
    error::AppError,
    models::{
        question::{CreateQuestionRequest, ReorderQuestionsRequest, UpdateQuestionRequest},
        quiz::{CreateQuizRequest, QuizFilter, UpdateQuizRequest},
    },
};

/// Lists quizzes, inactive ones included.
/// Admin only.
pub async fn list_quizzes(
    State(admin): State<QuizAdmin>,
    Query(filter): Query<QuizFilter>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(admin.list_quizzes(filter).await?))
}

/// Creates a quiz. Scope fields not used by `quiz_type` are discarded.
/// Admin only.
pub async fn create_quiz(
    State(admin): State<QuizAdmin>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = admin.create_quiz(payload).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Quiz with every question and answer key.
/// Admin only.
pub async fn get_quiz(
    State(admin): State<QuizAdmin>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(admin.quiz(id).await?))
}

/// Updates a quiz. Fields are optional; a new `scope` replaces the old one entirely.
/// Admin only.
pub async fn update_quiz(
    State(admin): State<QuizAdmin>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(admin.update_quiz(id, payload).await?))
}

/// Deletes a quiz and its questions. Attempts are kept.
/// Admin only.
pub async fn delete_quiz(
    State(admin): State<QuizAdmin>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    admin.delete_quiz(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admin only.
pub async fn list_questions(
    State(admin): State<QuizAdmin>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(admin.questions(quiz_id).await?))
}

/// Adds a question; without `order_index` it goes last.
/// Admin only.
pub async fn create_question(
    State(admin): State<QuizAdmin>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = admin.add_question(quiz_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Admin only.
pub async fn reorder_questions(
    State(admin): State<QuizAdmin>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<ReorderQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        admin
            .reorder_questions(quiz_id, &payload.question_ids)
            .await?,
    ))
}

/// Updates a question. Fields are optional.
/// Admin only.
pub async fn update_question(
    State(admin): State<QuizAdmin>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(admin.update_question(id, payload).await?))
}

/// Admin only.
pub async fn delete_question(
    State(admin): State<QuizAdmin>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    admin.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
