// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{engine::QuizEngine, error::AppError, models::quiz::QuizFilter, utils::jwt::Claims};

/// Lists active quizzes for a context.
///
/// `?course_id=` also returns program quizzes narrowed to that course.
pub async fn list_quizzes(
    State(engine): State<QuizEngine>,
    Query(filter): Query<QuizFilter>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = engine.available_quizzes(filter).await?;
    Ok(Json(quizzes))
}

/// Quiz detail for the current learner: question count, points and results so far.
pub async fn get_quiz(
    State(engine): State<QuizEngine>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = claims.learner_id()?;
    let overview = engine.overview(quiz_id, learner_id).await?;
    Ok(Json(overview))
}

/// Results view: past attempts (most recent first), best attempt, attempts left.
pub async fn list_attempts(
    State(engine): State<QuizEngine>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = claims.learner_id()?;
    let results = engine.results(quiz_id, learner_id).await?;
    Ok(Json(results))
}

/// Starts a timed or untimed session, or resumes the unfinished one.
///
/// Refused with 409 and a `results_url` once the attempt limit is reached.
pub async fn start_session(
    State(engine): State<QuizEngine>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = claims.learner_id()?;
    let handle = engine.start_session(quiz_id, learner_id).await?;
    let view = handle.view().await?;
    Ok((StatusCode::CREATED, Json(view)))
}
