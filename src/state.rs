// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    admin::QuizAdmin,
    config::Config,
    engine::QuizEngine,
    store::{AttemptLedger, QuestionBank, QuizCatalog},
};

#[derive(Clone)]
pub struct AppState {
    pub engine: QuizEngine,
    pub admin: QuizAdmin,
    pub config: Config,
}

impl AppState {
    /// State backed by one store serving every collaborator role.
    pub fn new<S>(store: Arc<S>, config: Config) -> Self
    where
        S: QuizCatalog + AttemptLedger + 'static,
    {
        Self::with_stores(store.clone(), store.clone(), store, config)
    }

    pub fn with_stores(
        bank: Arc<dyn QuestionBank>,
        ledger: Arc<dyn AttemptLedger>,
        catalog: Arc<dyn QuizCatalog>,
        config: Config,
    ) -> Self {
        Self {
            engine: QuizEngine::new(bank, ledger, config.session_timings()),
            admin: QuizAdmin::new(catalog),
            config,
        }
    }
}

impl FromRef<AppState> for QuizEngine {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for QuizAdmin {
    fn from_ref(state: &AppState) -> Self {
        state.admin.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
