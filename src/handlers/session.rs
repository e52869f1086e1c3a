// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    engine::QuizEngine,
    error::AppError,
    models::attempt::{AnswerRequest, NavigateRequest},
    utils::jwt::Claims,
};

/// Current snapshot of a session, including remaining seconds when timed.
pub async fn get_session(
    State(engine): State<QuizEngine>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = engine.session(session_id, claims.learner_id()?).await?;
    Ok(Json(handle.view().await?))
}

/// Records or replaces the answer to one question.
pub async fn answer_question(
    State(engine): State<QuizEngine>,
    Extension(claims): Extension<Claims>,
    Path((session_id, question_id)): Path<(Uuid, i64)>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = engine.session(session_id, claims.learner_id()?).await?;
    let view = handle.answer(question_id, req.value).await?;
    Ok(Json(view))
}

/// Jumps to any question, or to the next/previous one.
pub async fn navigate(
    State(engine): State<QuizEngine>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = engine.session(session_id, claims.learner_id()?).await?;
    let view = handle.navigate(req).await?;
    Ok(Json(view))
}

/// Submits the session.
///
/// * Safe to repeat: once completed, the stored attempt is returned again.
/// * On a storage failure answers are kept and the call can be retried (503).
pub async fn submit_session(
    State(engine): State<QuizEngine>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = engine.session(session_id, claims.learner_id()?).await?;
    handle.submit().await?;
    Ok(Json(handle.view().await?))
}
