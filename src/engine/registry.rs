// src/engine/registry.rs

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use uuid::Uuid;

use super::session::{SessionHandle, SessionStatus};

/// Live sessions, at most one per (quiz, learner) pair.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: Uuid) -> Option<SessionHandle> {
        self.inner.read().await.get(&session_id).cloned()
    }

    /// The session of this learner on this quiz that is not completed yet.
    pub async fn unfinished(&self, quiz_id: i64, learner_id: i64) -> Option<SessionHandle> {
        self.inner
            .read()
            .await
            .values()
            .find(|h| {
                h.quiz_id() == quiz_id
                    && h.learner_id() == learner_id
                    && h.status() != SessionStatus::Completed
            })
            .cloned()
    }

    /// Registers `handle` unless another unfinished session for the same pair
    /// won the race, in which case that one is returned instead. Completed
    /// sessions of the pair are dropped, which stops their tasks.
    ///
    /// The entry is removed again once the session task stops.
    pub async fn insert(&self, handle: SessionHandle) -> SessionHandle {
        let mut sessions = self.inner.write().await;

        let same_pair =
            |h: &SessionHandle| h.quiz_id() == handle.quiz_id() && h.learner_id() == handle.learner_id();

        if let Some(existing) = sessions
            .values()
            .find(|h| same_pair(*h) && h.status() != SessionStatus::Completed)
        {
            return existing.clone();
        }

        sessions.retain(|_, h| !same_pair(&*h));
        sessions.insert(handle.id(), handle.clone());

        let registry = self.clone();
        let session_id = handle.id();
        let stopped = handle.stopped();
        tokio::spawn(async move {
            stopped.await;
            registry.remove(session_id).await;
        });

        handle
    }

    pub async fn remove(&self, session_id: Uuid) -> Option<SessionHandle> {
        self.inner.write().await.remove(&session_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
