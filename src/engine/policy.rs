// src/engine/policy.rs

use crate::{
    error::AppError,
    models::{
        attempt::{QuizAttempt, QuizResults},
        quiz::Quiz,
    },
};

/// Refuses a new session once the learner has used every attempt.
pub fn check_attempt_limit(quiz: &Quiz, attempts: &[QuizAttempt]) -> Result<(), AppError> {
    if attempts_remaining(quiz, attempts) == 0 {
        return Err(AppError::AttemptLimitExceeded {
            quiz_id: quiz.id,
            attempts: attempts.len(),
            max_attempts: quiz.max_attempts,
        });
    }
    Ok(())
}

pub fn attempts_remaining(quiz: &Quiz, attempts: &[QuizAttempt]) -> usize {
    let max = usize::try_from(quiz.max_attempts).unwrap_or(0);
    max.saturating_sub(attempts.len())
}

/// Highest percentage wins; on a tie the earlier submission is kept.
pub fn best_attempt(attempts: &[QuizAttempt]) -> Option<&QuizAttempt> {
    attempts.iter().reduce(|best, candidate| {
        let better = candidate.percentage > best.percentage
            || (candidate.percentage == best.percentage
                && candidate.submitted_at < best.submitted_at);
        if better { candidate } else { best }
    })
}

/// Builds the results view. `attempts` is expected most recent first.
pub fn summarize(quiz: &Quiz, attempts: Vec<QuizAttempt>) -> QuizResults {
    let remaining = attempts_remaining(quiz, &attempts);
    let best = best_attempt(&attempts).cloned();

    QuizResults {
        quiz_id: quiz.id,
        attempts_used: attempts.len(),
        attempts_remaining: remaining,
        can_retake: quiz.is_active && remaining > 0,
        best_attempt: best,
        attempts,
    }
}
