// src/engine/scoring.rs

//! Scoring rules, one per question type.
//!
//! Everything here is pure: no clock, no store. A question without a submitted
//! answer simply earns 0.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::question::{QuestionType, QuizQuestion};

/// Outcome for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub earned: i32,
    pub possible: i32,
    pub answered: bool,
    /// Long answers wait for a person; their 0 is not a verdict.
    pub needs_review: bool,
}

/// Aggregate outcome over a whole quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub earned: i32,
    pub total_possible: i32,
    pub percentage: i32,
    pub passed: bool,
    pub needs_review: bool,
    pub breakdown: Vec<QuestionResult>,
}

/// Points earned by `submitted` on `question`.
pub fn score_question(question: &QuizQuestion, submitted: Option<&str>) -> i32 {
    let Some(submitted) = submitted else {
        return 0;
    };

    let correct = match question.question_type {
        // No option flagged correct means the question can never score.
        QuestionType::MultipleChoice => question
            .correct_option()
            .is_some_and(|opt| opt.text == submitted),
        QuestionType::TrueFalse => question.correct_answer.as_deref() == Some(submitted),
        QuestionType::ShortAnswer => question
            .correct_answer
            .as_deref()
            .is_some_and(|expected| normalize(expected) == normalize(submitted)),
        QuestionType::LongAnswer => false,
    };

    if correct { question.points } else { 0 }
}

/// Case-folded and trimmed form used for short answers.
fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// `round(earned / total * 100)`, with an empty quiz scoring 0.
pub fn percentage(earned: i32, total_possible: i32) -> i32 {
    if total_possible <= 0 {
        return 0;
    }
    (f64::from(earned) / f64::from(total_possible) * 100.0).round() as i32
}

/// Scores every question against the answer map.
pub fn grade(
    questions: &[QuizQuestion],
    answers: &HashMap<i64, String>,
    passing_score: i32,
) -> Grade {
    let breakdown: Vec<QuestionResult> = questions
        .iter()
        .map(|q| {
            let submitted = answers.get(&q.id).map(String::as_str);
            QuestionResult {
                question_id: q.id,
                earned: score_question(q, submitted),
                possible: q.points,
                answered: submitted.is_some_and(|s| !s.trim().is_empty()),
                needs_review: q.question_type == QuestionType::LongAnswer,
            }
        })
        .collect();

    let earned = breakdown.iter().map(|r| r.earned).sum();
    let total_possible = questions.iter().map(|q| q.points).sum();
    let percentage = percentage(earned, total_possible);

    Grade {
        earned,
        total_possible,
        percentage,
        passed: percentage >= passing_score,
        needs_review: breakdown.iter().any(|r| r.needs_review),
        breakdown,
    }
}
