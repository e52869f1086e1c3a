// src/engine/session.rs

//! The per-learner session state machine and the task that drives it.
//!
//! `Loading -> InProgress -> Submitting -> Completed`. Answers and navigation
//! happen inside `InProgress`. The task owns the state and processes one
//! message at a time, so a learner's submit and the countdown expiring both
//! go through the same `submit` handler and cannot interleave.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, Interval, MissedTickBehavior},
};
use uuid::Uuid;

use super::scoring::{self, Grade};
use crate::{
    error::AppError,
    models::{
        attempt::{NavigateRequest, NewAttempt, QuizAttempt},
        question::{PublicQuestion, QuizQuestion},
        quiz::Quiz,
    },
    store::AttemptLedger,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    InProgress,
    Submitting,
    Completed,
}

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Learner,
    TimeExpired,
    /// Last write attempt before an idle session with a pending attempt is dropped.
    Abandoned,
}

/// How a session task paces itself and when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Countdown tick period.
    pub tick: Duration,
    /// An unfinished session without a running countdown stops after this long without requests.
    pub idle: Duration,
    /// A completed session stays reachable this long after its last request.
    pub linger: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            idle: Duration::from_secs(2 * 60 * 60),
            linger: Duration::from_secs(5 * 60),
        }
    }
}

/// Next step after asking the machine to submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStep {
    /// Write this attempt to the ledger, then report back with `finish_submit`.
    Persist(NewAttempt),
    /// Already completed; nothing to write.
    Done(QuizAttempt),
}

/// Learner-facing picture of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub quiz_id: i64,
    pub title: String,
    pub instructions: Option<String>,
    pub status: SessionStatus,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_question: Option<PublicQuestion>,
    pub questions: Vec<PublicQuestion>,
    pub answers: HashMap<i64, String>,
    pub started_at: Option<DateTime<Utc>>,
    pub time_limit_seconds: Option<i64>,
    pub remaining_seconds: Option<i64>,
    pub attempt: Option<QuizAttempt>,
    pub grade: Option<Grade>,
    /// Set while a failed write waits for the learner to retry.
    pub last_error: Option<String>,
}

/// In-memory state of one learner working through one quiz.
#[derive(Debug)]
pub struct QuizSession {
    id: Uuid,
    learner_id: i64,
    quiz: Quiz,
    questions: Vec<QuizQuestion>,
    status: SessionStatus,
    current: usize,
    answers: HashMap<i64, String>,
    total_seconds: Option<i64>,
    started_at: Option<DateTime<Utc>>,
    clock_start: Option<Instant>,
    pending: Option<NewAttempt>,
    grade: Option<Grade>,
    attempt: Option<QuizAttempt>,
    last_error: Option<AppError>,
}

impl QuizSession {
    /// Wraps a loaded quiz. Fails when there is nothing to answer.
    pub fn new(
        learner_id: i64,
        quiz: Quiz,
        mut questions: Vec<QuizQuestion>,
    ) -> Result<Self, AppError> {
        if questions.is_empty() {
            return Err(AppError::NotFound(format!(
                "Quiz {} has no questions",
                quiz.id
            )));
        }
        questions.sort_by_key(|q| q.order_index);

        Ok(Self {
            id: Uuid::new_v4(),
            learner_id,
            total_seconds: quiz.total_seconds(),
            quiz,
            questions,
            status: SessionStatus::Loading,
            current: 0,
            answers: HashMap::new(),
            started_at: None,
            clock_start: None,
            pending: None,
            grade: None,
            attempt: None,
            last_error: None,
        })
    }

    /// `Loading -> InProgress`; starts the clock.
    pub fn begin(&mut self, now: Instant) -> Result<(), AppError> {
        if self.status != SessionStatus::Loading {
            return Err(self.invalid("start"));
        }
        self.status = SessionStatus::InProgress;
        self.started_at = Some(Utc::now());
        self.clock_start = Some(now);
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn learner_id(&self) -> i64 {
        self.learner_id
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn answers(&self) -> &HashMap<i64, String> {
        &self.answers
    }

    pub fn is_timed(&self) -> bool {
        self.total_seconds.is_some()
    }

    fn invalid(&self, action: &str) -> AppError {
        AppError::InvalidState(format!(
            "Cannot {} while the session is {:?}",
            action, self.status
        ))
    }

    /// Records or replaces the answer to one question. Correctness is not checked here.
    pub fn answer(&mut self, question_id: i64, value: String) -> Result<(), AppError> {
        if self.status != SessionStatus::InProgress {
            return Err(self.invalid("answer"));
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(AppError::NotFound(format!(
                "Question {} is not part of this quiz",
                question_id
            )));
        }
        self.answers.insert(question_id, value);
        Ok(())
    }

    /// Moves the pointer to any question, answered or not.
    pub fn navigate(&mut self, to: &NavigateRequest) -> Result<usize, AppError> {
        if self.status != SessionStatus::InProgress {
            return Err(self.invalid("navigate"));
        }
        let last = self.questions.len() - 1;
        let target = match to {
            NavigateRequest::Index(index) => *index,
            NavigateRequest::Next => (self.current + 1).min(last),
            NavigateRequest::Previous => self.current.saturating_sub(1),
        };
        if target > last {
            return Err(AppError::BadRequest(format!(
                "Question index {} is out of range (0..={})",
                target, last
            )));
        }
        self.current = target;
        Ok(target)
    }

    pub fn elapsed_seconds(&self, now: Instant) -> i64 {
        self.clock_start
            .map(|start| now.saturating_duration_since(start).as_secs() as i64)
            .unwrap_or(0)
    }

    /// `total_seconds - elapsed`, floored at 0. `None` for untimed quizzes.
    pub fn remaining_seconds(&self, now: Instant) -> Option<i64> {
        self.total_seconds
            .map(|total| (total - self.elapsed_seconds(now)).max(0))
    }

    /// Countdown step. Returns true when time is up and a forced submit is due.
    pub fn tick(&self, now: Instant) -> bool {
        self.status == SessionStatus::InProgress
            && self
                .total_seconds
                .is_some_and(|total| total - self.elapsed_seconds(now) <= 0)
    }

    /// First half of submission: score and freeze the answers.
    ///
    /// Repeating it after completion is a no-op that returns the stored attempt.
    /// After a failed write it hands back the same scored attempt for a retry.
    pub fn begin_submit(&mut self, now: Instant) -> Result<SubmitStep, AppError> {
        match self.status {
            SessionStatus::Loading => Err(self.invalid("submit")),
            SessionStatus::Completed => self
                .attempt
                .clone()
                .map(SubmitStep::Done)
                .ok_or_else(|| AppError::InternalServerError("completed without attempt".into())),
            SessionStatus::Submitting => self
                .pending
                .clone()
                .map(SubmitStep::Persist)
                .ok_or_else(|| self.invalid("submit")),
            SessionStatus::InProgress => {
                let grade = scoring::grade(&self.questions, &self.answers, self.quiz.passing_score);
                let mut time_taken = self.elapsed_seconds(now);
                if let Some(total) = self.total_seconds {
                    time_taken = time_taken.min(total);
                }

                let attempt = NewAttempt {
                    quiz_id: self.quiz.id,
                    learner_id: self.learner_id,
                    answers: self.answers.clone(),
                    score: grade.earned,
                    total_points: grade.total_possible,
                    percentage: grade.percentage,
                    passed: grade.passed,
                    needs_review: grade.needs_review,
                    time_taken: i32::try_from(time_taken).unwrap_or(i32::MAX),
                    started_at: self.started_at.unwrap_or_else(Utc::now),
                    submitted_at: Utc::now(),
                };

                self.status = SessionStatus::Submitting;
                self.grade = Some(grade);
                self.pending = Some(attempt.clone());
                Ok(SubmitStep::Persist(attempt))
            }
        }
    }

    /// Second half of submission: record the ledger's answer.
    /// On failure the session stays in `Submitting` with its answers intact.
    pub fn finish_submit(
        &mut self,
        result: Result<QuizAttempt, AppError>,
    ) -> Result<QuizAttempt, AppError> {
        if self.status != SessionStatus::Submitting {
            return Err(self.invalid("finish submitting"));
        }
        match result {
            Ok(attempt) => {
                self.status = SessionStatus::Completed;
                self.pending = None;
                self.last_error = None;
                self.attempt = Some(attempt.clone());
                Ok(attempt)
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn view(&self, now: Instant) -> SessionView {
        let questions: Vec<PublicQuestion> = self.questions.iter().map(PublicQuestion::from).collect();
        SessionView {
            session_id: self.id,
            quiz_id: self.quiz.id,
            title: self.quiz.title.clone(),
            instructions: self.quiz.instructions.clone(),
            status: self.status,
            current_index: self.current,
            total_questions: questions.len(),
            current_question: questions.get(self.current).cloned(),
            questions,
            answers: self.answers.clone(),
            started_at: self.started_at,
            time_limit_seconds: self.total_seconds,
            remaining_seconds: match self.status {
                SessionStatus::InProgress => self.remaining_seconds(now),
                _ => None,
            },
            attempt: self.attempt.clone(),
            grade: match self.status {
                SessionStatus::Completed => self.grade.clone(),
                _ => None,
            },
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, AppError>>;

enum Command {
    Answer {
        question_id: i64,
        value: String,
        reply: Reply<SessionView>,
    },
    Navigate {
        to: NavigateRequest,
        reply: Reply<SessionView>,
    },
    View {
        reply: oneshot::Sender<SessionView>,
    },
    Submit {
        reply: Reply<QuizAttempt>,
    },
}

/// Cloneable address of a running session task.
///
/// The task stops once every handle is dropped, or on its own after the idle
/// or linger period of its `SessionTimings`.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    quiz_id: i64,
    learner_id: i64,
    tx: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Moves `session` into its own task.
    pub fn spawn(
        session: QuizSession,
        ledger: Arc<dyn AttemptLedger>,
        timings: SessionTimings,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(session.status());
        let handle = SessionHandle {
            id: session.id(),
            quiz_id: session.quiz().id,
            learner_id: session.learner_id(),
            tx,
            status: status_rx,
        };

        tokio::spawn(run(session, ledger, rx, status_tx, timings));
        handle
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn quiz_id(&self) -> i64 {
        self.quiz_id
    }

    pub fn learner_id(&self) -> i64 {
        self.learner_id
    }

    /// Last status published by the task.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Resolves once the session reaches `Completed`.
    pub async fn completed(&self) -> Result<(), AppError> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|s| *s == SessionStatus::Completed)
            .await
            .map(|_| ());
        reached.map_err(|_| gone())
    }

    /// Resolves once the session task has stopped. Holds no sender, so
    /// awaiting it does not keep the task alive.
    pub fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut status = self.status.clone();
        async move { while status.changed().await.is_ok() {} }
    }

    pub async fn answer(&self, question_id: i64, value: String) -> Result<SessionView, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Answer {
            question_id,
            value,
            reply,
        })
        .await?;
        rx.await.map_err(|_| gone())?
    }

    pub async fn navigate(&self, to: NavigateRequest) -> Result<SessionView, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Navigate { to, reply }).await?;
        rx.await.map_err(|_| gone())?
    }

    pub async fn view(&self) -> Result<SessionView, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::View { reply }).await?;
        rx.await.map_err(|_| gone())
    }

    pub async fn submit(&self) -> Result<QuizAttempt, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit { reply }).await?;
        rx.await.map_err(|_| gone())?
    }

    async fn send(&self, command: Command) -> Result<(), AppError> {
        self.tx.send(command).await.map_err(|_| gone())
    }
}

fn gone() -> AppError {
    AppError::NotFound("Session has ended".to_string())
}

async fn run(
    mut session: QuizSession,
    ledger: Arc<dyn AttemptLedger>,
    mut rx: mpsc::Receiver<Command>,
    status_tx: watch::Sender<SessionStatus>,
    timings: SessionTimings,
) {
    let mut ticker = session.is_timed().then(|| {
        let mut interval = tokio::time::interval(timings.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    let mut last_request = Instant::now();

    loop {
        let deadline = expiry(&session, last_request, &timings);

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else { break };
                handle(&mut session, &ledger, &status_tx, command).await;
                last_request = Instant::now();
            }
            _ = next_tick(&mut ticker) => {
                if session.tick(Instant::now()) {
                    tracing::warn!(
                        session_id = %session.id(),
                        quiz_id = session.quiz().id,
                        "Time limit reached, submitting automatically"
                    );
                    if let Err(e) =
                        submit(&mut session, &ledger, &status_tx, SubmitTrigger::TimeExpired).await
                    {
                        tracing::debug!(session_id = %session.id(), "Forced submit pending retry: {}", e);
                    }
                    last_request = Instant::now();
                }
            }
            _ = sleep_until(deadline) => {
                if !expire(&mut session, &ledger, &status_tx).await {
                    break;
                }
                last_request = Instant::now();
            }
        }

        // No countdown outside InProgress, so no stray forced submit later.
        if session.status() != SessionStatus::InProgress {
            ticker = None;
        }
    }

    tracing::debug!(session_id = %session.id(), status = ?session.status(), "Session task stopped");
}

/// When the task stops on its own, given the time of the last request.
/// A running countdown ends the session by itself, so it has no idle limit.
fn expiry(session: &QuizSession, last_request: Instant, timings: &SessionTimings) -> Option<Instant> {
    match session.status() {
        SessionStatus::Completed => Some(last_request + timings.linger),
        SessionStatus::InProgress if session.is_timed() => None,
        _ => Some(last_request + timings.idle),
    }
}

/// Handles a reached deadline. Returns whether the task keeps running.
async fn expire(
    session: &mut QuizSession,
    ledger: &Arc<dyn AttemptLedger>,
    status_tx: &watch::Sender<SessionStatus>,
) -> bool {
    match session.status() {
        SessionStatus::Submitting => {
            // The attempt is already scored; one more try before giving up on it.
            submit(session, ledger, status_tx, SubmitTrigger::Abandoned)
                .await
                .is_ok()
        }
        SessionStatus::Completed => false,
        status => {
            tracing::info!(
                session_id = %session.id(),
                quiz_id = session.quiz().id,
                learner_id = session.learner_id(),
                ?status,
                "Dropping idle session without an attempt"
            );
            false
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn handle(
    session: &mut QuizSession,
    ledger: &Arc<dyn AttemptLedger>,
    status_tx: &watch::Sender<SessionStatus>,
    command: Command,
) {
    let now = Instant::now();
    match command {
        Command::Answer {
            question_id,
            value,
            reply,
        } => {
            let result = session
                .answer(question_id, value)
                .map(|_| session.view(now));
            let _ = reply.send(result);
        }
        Command::Navigate { to, reply } => {
            let result = session.navigate(&to).map(|_| session.view(now));
            let _ = reply.send(result);
        }
        Command::View { reply } => {
            let _ = reply.send(session.view(now));
        }
        Command::Submit { reply } => {
            let result = submit(session, ledger, status_tx, SubmitTrigger::Learner).await;
            let _ = reply.send(result);
        }
    }
}

/// Publishes the current status. Runs before any reply goes out, so whoever
/// receives the reply sees the status it produced.
fn publish(session: &QuizSession, status_tx: &watch::Sender<SessionStatus>) {
    status_tx.send_if_modified(|status| {
        let changed = *status != session.status();
        *status = session.status();
        changed
    });
}

async fn submit(
    session: &mut QuizSession,
    ledger: &Arc<dyn AttemptLedger>,
    status_tx: &watch::Sender<SessionStatus>,
    trigger: SubmitTrigger,
) -> Result<QuizAttempt, AppError> {
    let attempt = match session.begin_submit(Instant::now())? {
        SubmitStep::Done(attempt) => return Ok(attempt),
        SubmitStep::Persist(attempt) => attempt,
    };
    publish(session, status_tx);

    let result = ledger.create_attempt(attempt).await;
    let result = session.finish_submit(result);
    publish(session, status_tx);

    match &result {
        Ok(attempt) => tracing::info!(
            session_id = %session.id(),
            quiz_id = attempt.quiz_id,
            learner_id = attempt.learner_id,
            percentage = attempt.percentage,
            passed = attempt.passed,
            ?trigger,
            "Quiz attempt recorded"
        ),
        Err(e) => tracing::error!(
            session_id = %session.id(),
            ?trigger,
            "Failed to record quiz attempt, answers kept for retry: {}",
            e
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        question::{QuestionOption, QuestionType},
        quiz::QuizScope,
    };

    fn quiz(time_limit: Option<i32>) -> Quiz {
        Quiz {
            id: 3,
            title: "Epistles".to_string(),
            description: None,
            instructions: None,
            time_limit,
            passing_score: 50,
            max_attempts: 2,
            is_active: true,
            scope: QuizScope::General,
            created_at: None,
            updated_at: None,
        }
    }

    fn questions() -> Vec<QuizQuestion> {
        vec![
            QuizQuestion {
                id: 11,
                quiz_id: 3,
                question_text: "Who wrote Romans?".to_string(),
                question_type: QuestionType::MultipleChoice,
                options: vec![
                    QuestionOption {
                        text: "Paul".to_string(),
                        correct: true,
                    },
                    QuestionOption {
                        text: "Peter".to_string(),
                        correct: false,
                    },
                ],
                correct_answer: None,
                points: 2,
                order_index: 1,
            },
            QuizQuestion {
                id: 10,
                quiz_id: 3,
                question_text: "Hebrews names its author.".to_string(),
                question_type: QuestionType::TrueFalse,
                options: Vec::new(),
                correct_answer: Some("false".to_string()),
                points: 2,
                order_index: 0,
            },
        ]
    }

    fn started(time_limit: Option<i32>) -> (QuizSession, Instant) {
        let now = Instant::now();
        let mut session = QuizSession::new(1, quiz(time_limit), questions()).unwrap();
        session.begin(now).unwrap();
        (session, now)
    }

    fn persisted(attempt: NewAttempt) -> Result<QuizAttempt, AppError> {
        Ok(attempt.with_id(99))
    }

    #[test]
    fn test_empty_quiz_does_not_load() {
        let err = QuizSession::new(1, quiz(None), Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_questions_follow_order_index() {
        let (session, now) = started(None);
        let view = session.view(now);
        assert_eq!(view.current_question.map(|q| q.id), Some(10));
        assert_eq!(view.questions[1].id, 11);
    }

    #[test]
    fn test_begin_only_from_loading() {
        let (mut session, now) = started(None);
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert!(matches!(session.begin(now), Err(AppError::InvalidState(_))));
    }

    #[test]
    fn test_answer_upserts() {
        let (mut session, _) = started(None);
        session.answer(11, "Peter".to_string()).unwrap();
        session.answer(11, "Paul".to_string()).unwrap();
        assert_eq!(session.answers().get(&11).map(String::as_str), Some("Paul"));
        assert!(matches!(
            session.answer(404, "x".to_string()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_navigate_is_free() {
        let (mut session, _) = started(None);
        assert_eq!(session.navigate(&NavigateRequest::Index(1)).unwrap(), 1);
        assert_eq!(session.navigate(&NavigateRequest::Index(0)).unwrap(), 0);
        assert_eq!(session.navigate(&NavigateRequest::Previous).unwrap(), 0);
        assert_eq!(session.navigate(&NavigateRequest::Next).unwrap(), 1);
        assert_eq!(session.navigate(&NavigateRequest::Next).unwrap(), 1);
        assert!(matches!(
            session.navigate(&NavigateRequest::Index(2)),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn test_remaining_and_tick() {
        let (session, start) = started(Some(1));
        assert_eq!(session.remaining_seconds(start), Some(60));
        assert!(!session.tick(start + Duration::from_secs(59)));
        assert_eq!(session.remaining_seconds(start + Duration::from_secs(59)), Some(1));
        assert!(session.tick(start + Duration::from_secs(60)));
        assert_eq!(session.remaining_seconds(start + Duration::from_secs(90)), Some(0));
    }

    #[test]
    fn test_untimed_never_expires() {
        let (session, start) = started(None);
        assert!(!session.is_timed());
        assert_eq!(session.remaining_seconds(start), None);
        assert!(!session.tick(start + Duration::from_secs(86_400)));
    }

    #[test]
    fn test_submit_twice_persists_once() {
        let (mut session, now) = started(None);
        session.answer(11, "Paul".to_string()).unwrap();

        let SubmitStep::Persist(attempt) = session.begin_submit(now).unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(attempt.score, 2);
        assert_eq!(attempt.percentage, 50);
        assert!(attempt.passed);
        session.finish_submit(persisted(attempt)).unwrap();
        assert_eq!(session.status(), SessionStatus::Completed);

        match session.begin_submit(now).unwrap() {
            SubmitStep::Done(attempt) => assert_eq!(attempt.id, 99),
            other => panic!("expected no-op, got {:?}", other),
        }
        assert!(matches!(
            session.answer(10, "true".to_string()),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_failed_write_keeps_answers_for_retry() {
        let (mut session, now) = started(None);
        session.answer(10, "false".to_string()).unwrap();

        let SubmitStep::Persist(first) = session.begin_submit(now).unwrap() else {
            panic!("expected a write");
        };
        let err = session
            .finish_submit(Err(AppError::Persistence("connection reset".to_string())))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.status(), SessionStatus::Submitting);
        assert!(session.view(now).last_error.is_some());

        let SubmitStep::Persist(retry) = session.begin_submit(now).unwrap() else {
            panic!("expected the same write again");
        };
        assert_eq!(retry, first);
        assert_eq!(retry.answers.get(&10).map(String::as_str), Some("false"));

        session.finish_submit(persisted(retry)).unwrap();
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(session.view(now).last_error.is_none());
    }

    #[test]
    fn test_time_taken_capped_at_limit() {
        let (mut session, start) = started(Some(1));
        let SubmitStep::Persist(attempt) = session
            .begin_submit(start + Duration::from_secs(75))
            .unwrap()
        else {
            panic!("expected a write");
        };
        assert_eq!(attempt.time_taken, 60);
    }

    #[test]
    fn test_view_hides_answer_keys_and_grade_until_completed() {
        let (mut session, now) = started(None);
        let view = serde_json::to_value(session.view(now)).unwrap();
        assert!(view["questions"][1]["options"][0].is_string());
        assert!(view.get("grade").unwrap().is_null());

        let SubmitStep::Persist(attempt) = session.begin_submit(now).unwrap() else {
            panic!("expected a write");
        };
        session.finish_submit(persisted(attempt)).unwrap();
        let view = session.view(now);
        assert_eq!(view.status, SessionStatus::Completed);
        assert!(view.grade.is_some());
        assert_eq!(view.remaining_seconds, None);
    }

    #[test]
    fn test_expiry_by_status() {
        let timings = SessionTimings::default();

        let (timed, now) = started(Some(1));
        assert_eq!(expiry(&timed, now, &timings), None);

        let (mut untimed, now) = started(None);
        assert_eq!(expiry(&untimed, now, &timings), Some(now + timings.idle));

        let SubmitStep::Persist(attempt) = untimed.begin_submit(now).unwrap() else {
            panic!("expected a pending attempt");
        };
        assert_eq!(expiry(&untimed, now, &timings), Some(now + timings.idle));

        untimed.finish_submit(persisted(attempt)).unwrap();
        assert_eq!(expiry(&untimed, now, &timings), Some(now + timings.linger));
    }
}
