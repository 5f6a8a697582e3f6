//! Application state: the store, the exercise engine, and the chat controller on top.
//!
//! Startup order:
//!   - open the database and apply the schema
//!   - seed the topic catalog (built-ins plus configured JSON files)
//!   - build the OpenAI backend (works without a key; calls then fail as not configured)

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::backend::LanguageBackend;
use crate::bot::ChatBot;
use crate::config::{AppConfig, LearnerDefaults};
use crate::db::Store;
use crate::engine::ExerciseEngine;
use crate::openai::OpenAI;
use crate::seeds::{seed_catalog, SeedError};
use crate::session::ChatSessions;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot open database: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("cannot seed topic catalog: {0}")]
    Seed(#[from] SeedError),
}

pub struct AppState {
    pub store: Store,
    pub engine: Arc<ExerciseEngine>,
    pub bot: ChatBot,
    pub backend_configured: bool,
}

impl AppState {
    /// Build state from config: open storage, seed the catalog, init OpenAI.
    #[instrument(level = "info", skip_all, fields(database_url = %config.database_url))]
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let store = Store::connect(&config.database_url).await?;
        seed_catalog(&store, &config.agent.catalog).await?;

        let openai = OpenAI::from_env(config.agent.prompts.clone());
        let backend_configured = openai.is_available();
        if backend_configured {
            info!(target: "lalang_backend", base_url = %openai.base_url, fast_model = %openai.fast_model, strong_model = %openai.strong_model, "OpenAI enabled.");
        } else {
            warn!(target: "lalang_backend", "OpenAI disabled (no OPENAI_API_KEY). Exercise requests will fail until it is set.");
        }

        Ok(Self::from_parts(store, Arc::new(openai), config.agent.defaults.clone(), backend_configured))
    }

    /// Wire state around an already prepared store and backend.
    pub fn from_parts(
        store: Store,
        backend: Arc<dyn LanguageBackend>,
        defaults: LearnerDefaults,
        backend_configured: bool,
    ) -> Self {
        Self::with_engine(Arc::new(ExerciseEngine::new(store, backend, defaults)), backend_configured)
    }

    pub fn with_engine(engine: Arc<ExerciseEngine>, backend_configured: bool) -> Self {
        let bot = ChatBot::new(ChatSessions::new(engine.clone()));
        Self { store: engine.store().clone(), engine, bot, backend_configured }
    }
}
