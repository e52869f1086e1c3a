// src/store/memory.rs

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{AttemptLedger, QuestionBank, QuizCatalog};
use crate::{
    error::AppError,
    models::{
        attempt::{NewAttempt, QuizAttempt},
        question::{QuestionDefinition, QuizQuestion},
        quiz::{Quiz, QuizDefinition, QuizFilter},
    },
};

#[derive(Default)]
struct Tables {
    quizzes: BTreeMap<i64, Quiz>,
    questions: BTreeMap<i64, QuizQuestion>,
    attempts: Vec<QuizAttempt>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn questions_of(&self, quiz_id: i64) -> Vec<QuizQuestion> {
        let mut questions: Vec<QuizQuestion> = self
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order_index);
        questions
    }

    fn order_taken(&self, quiz_id: i64, order_index: i32, except: Option<i64>) -> bool {
        self.questions.values().any(|q| {
            q.quiz_id == quiz_id && q.order_index == order_index && Some(q.id) != except
        })
    }
}

/// Process-local implementation of every store trait.
///
/// Used by the `memory` storage backend and by tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.tables.read().await.quizzes.get(&quiz_id).cloned())
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<QuizQuestion>, AppError> {
        Ok(self.tables.read().await.questions_of(quiz_id))
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .quizzes
            .values()
            .rev()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AttemptLedger for MemoryStore {
    async fn list_attempts(
        &self,
        quiz_id: i64,
        learner_id: i64,
    ) -> Result<Vec<QuizAttempt>, AppError> {
        let tables = self.tables.read().await;
        let mut attempts: Vec<QuizAttempt> = tables
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id && a.learner_id == learner_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(attempts)
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, AppError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let attempt = attempt.with_id(id);
        tables.attempts.push(attempt.clone());
        Ok(attempt)
    }
}

#[async_trait]
impl QuizCatalog for MemoryStore {
    async fn create_quiz(&self, definition: QuizDefinition) -> Result<Quiz, AppError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = Utc::now();
        let quiz = Quiz {
            id,
            title: definition.title,
            description: definition.description,
            instructions: definition.instructions,
            time_limit: definition.time_limit,
            passing_score: definition.passing_score,
            max_attempts: definition.max_attempts,
            is_active: definition.is_active,
            scope: definition.scope,
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.quizzes.insert(id, quiz.clone());
        Ok(quiz)
    }

    async fn update_quiz(
        &self,
        quiz_id: i64,
        definition: QuizDefinition,
    ) -> Result<Quiz, AppError> {
        let mut tables = self.tables.write().await;
        let quiz = tables
            .quizzes
            .get_mut(&quiz_id)
            .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

        quiz.title = definition.title;
        quiz.description = definition.description;
        quiz.instructions = definition.instructions;
        quiz.time_limit = definition.time_limit;
        quiz.passing_score = definition.passing_score;
        quiz.max_attempts = definition.max_attempts;
        quiz.is_active = definition.is_active;
        quiz.scope = definition.scope;
        quiz.updated_at = Some(Utc::now());

        Ok(quiz.clone())
    }

    async fn delete_quiz(&self, quiz_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.quizzes.remove(&quiz_id).is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        tables.questions.retain(|_, q| q.quiz_id != quiz_id);
        Ok(())
    }

    async fn get_question(&self, question_id: i64) -> Result<Option<QuizQuestion>, AppError> {
        Ok(self.tables.read().await.questions.get(&question_id).cloned())
    }

    async fn create_question(
        &self,
        quiz_id: i64,
        definition: QuestionDefinition,
    ) -> Result<QuizQuestion, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.quizzes.contains_key(&quiz_id) {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let order_index = match definition.order_index {
            Some(index) if tables.order_taken(quiz_id, index, None) => {
                return Err(AppError::Conflict(format!(
                    "order_index {} is already used in this quiz",
                    index
                )));
            }
            Some(index) => index,
            None => tables
                .questions_of(quiz_id)
                .last()
                .map_or(0, |q| q.order_index + 1),
        };

        let id = tables.next_id();
        let question = QuizQuestion {
            id,
            quiz_id,
            question_text: definition.question_text,
            question_type: definition.question_type,
            options: definition.options,
            correct_answer: definition.correct_answer,
            points: definition.points,
            order_index,
        };
        tables.questions.insert(id, question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        question_id: i64,
        definition: QuestionDefinition,
    ) -> Result<QuizQuestion, AppError> {
        let mut tables = self.tables.write().await;
        let quiz_id = tables
            .questions
            .get(&question_id)
            .map(|q| q.quiz_id)
            .ok_or(AppError::NotFound("Question not found".to_string()))?;

        if let Some(index) = definition.order_index {
            if tables.order_taken(quiz_id, index, Some(question_id)) {
                return Err(AppError::Conflict(format!(
                    "order_index {} is already used in this quiz",
                    index
                )));
            }
        }

        let question = tables
            .questions
            .get_mut(&question_id)
            .ok_or(AppError::NotFound("Question not found".to_string()))?;
        question.question_text = definition.question_text;
        question.question_type = definition.question_type;
        question.options = definition.options;
        question.correct_answer = definition.correct_answer;
        question.points = definition.points;
        if let Some(index) = definition.order_index {
            question.order_index = index;
        }
        Ok(question.clone())
    }

    async fn delete_question(&self, question_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables
            .questions
            .remove(&question_id)
            .map(|_| ())
            .ok_or(AppError::NotFound("Question not found".to_string()))
    }

    async fn reorder_questions(
        &self,
        quiz_id: i64,
        question_ids: &[i64],
    ) -> Result<Vec<QuizQuestion>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.quizzes.contains_key(&quiz_id) {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let current: HashSet<i64> = tables.questions_of(quiz_id).iter().map(|q| q.id).collect();
        let requested: HashSet<i64> = question_ids.iter().copied().collect();
        if requested.len() != question_ids.len() || requested != current {
            return Err(AppError::BadRequest(
                "question_ids must list every question of the quiz exactly once".to_string(),
            ));
        }

        for (index, id) in question_ids.iter().enumerate() {
            if let Some(question) = tables.questions.get_mut(id) {
                question.order_index = index as i32;
            }
        }
        Ok(tables.questions_of(quiz_id))
    }
}
