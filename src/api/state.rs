use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{PreferenceCheck, Session, UserPreferences},
    services::Recommender,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<RwLock<AppStateInner>>,
    /// Live collaborators, or why they could not be built
    recommender: Result<Arc<Recommender>, String>,
}

/// Inner state that can be modified
#[derive(Default)]
pub struct AppStateInner {
    pub sessions: HashMap<Uuid, Session>,
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {} not found", id))
}

fn session_changed(id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "Session {} changed while the request was running; please retry",
        id
    ))
}

impl AppState {
    pub fn new(recommender: Result<Arc<Recommender>, String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppStateInner::default())),
            recommender,
        }
    }

    pub fn with_recommender(recommender: Recommender) -> Self {
        Self::new(Ok(Arc::new(recommender)))
    }

    /// Missing credentials leave the server up; runs and chat then report
    /// a configuration error
    pub fn from_config(config: &Config) -> Self {
        let recommender = Recommender::from_config(config).map(Arc::new).map_err(|e| {
            tracing::warn!(error = %e, "Recommendations disabled until configuration is fixed");
            match e {
                AppError::Configuration(reason) => reason,
                other => other.to_string(),
            }
        });
        Self::new(recommender)
    }

    fn recommender(&self) -> AppResult<Arc<Recommender>> {
        self.recommender
            .as_ref()
            .map(Arc::clone)
            .map_err(|reason| AppError::Configuration(reason.clone()))
    }

    pub async fn create_session(&self) -> Session {
        let session = Session::new();
        let mut inner = self.inner.write().await;
        inner.sessions.insert(session.id, session.clone());
        tracing::info!(session_id = %session.id, "Session created");
        session
    }

    pub async fn session(&self, id: Uuid) -> AppResult<Session> {
        let inner = self.inner.read().await;
        inner.sessions.get(&id).cloned().ok_or_else(|| session_not_found(id))
    }

    pub async fn remove_session(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.sessions.remove(&id).is_none() {
            return Err(session_not_found(id));
        }
        tracing::info!(session_id = %id, "Session ended");
        Ok(())
    }

    pub async fn submit_preferences(
        &self,
        id: Uuid,
        preferences: UserPreferences,
    ) -> AppResult<PreferenceCheck> {
        let mut inner = self.inner.write().await;
        let session = inner.sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
        Ok(session.submit_preferences(preferences))
    }

    /// Appends a user turn and the assistant reply to the session
    ///
    /// Only the two new turns are written back, so replies finishing in any
    /// order all land in the history. A reset during the call wins.
    pub async fn chat(&self, id: Uuid, text: &str) -> AppResult<String> {
        let recommender = self.recommender()?;
        let snapshot = self.session(id).await?;
        let mut conversation = snapshot.conversation.clone();
        let known_turns = conversation.len();

        let reply = recommender
            .chat_reply(&snapshot.preferences, &mut conversation, text)
            .instrument(tracing::info_span!("chat", session_id = %id))
            .await;

        let mut inner = self.inner.write().await;
        let session = inner.sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
        if session.generation != snapshot.generation {
            tracing::info!(session_id = %id, "Session reset during chat; reply dropped");
            return Err(session_changed(id));
        }
        session
            .conversation
            .extend(conversation.turns()[known_turns..].iter().cloned());
        Ok(reply)
    }

    /// Runs the pipeline with the session's current seed
    pub async fn run(&self, id: Uuid) -> AppResult<Session> {
        let recommender = self.recommender()?;
        let seed = self.session(id).await?.reroll_seed;
        self.run_with_seed(&recommender, id, seed).await
    }

    /// Advances the seed by one and runs again over unchanged inputs
    pub async fn reroll(&self, id: Uuid) -> AppResult<Session> {
        let recommender = self.recommender()?;
        let seed = {
            let mut inner = self.inner.write().await;
            let session = inner.sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
            if session.last_result.is_none() {
                return Err(AppError::Validation(
                    "Run a recommendation before rerolling".to_string(),
                ));
            }
            session.advance_seed()
        };
        self.run_with_seed(&recommender, id, seed).await
    }

    async fn run_with_seed(
        &self,
        recommender: &Recommender,
        id: Uuid,
        seed: u64,
    ) -> AppResult<Session> {
        let snapshot = self.session(id).await?;

        let result = recommender
            .recommend(&snapshot.preferences, &snapshot.conversation, seed)
            .instrument(tracing::info_span!("recommendation", session_id = %id, seed = seed))
            .await?;

        let mut inner = self.inner.write().await;
        let session = inner.sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
        if !session.accepts_result_from(&snapshot, seed) {
            tracing::info!(
                session_id = %id,
                seed = seed,
                current_seed = session.reroll_seed,
                "Session changed during the run; result dropped"
            );
            return Err(session_changed(id));
        }
        session.store_result(result);
        Ok(session.clone())
    }

    /// Clears conversation, result and seed; keeps the id and survey answers
    pub async fn reset(&self, id: Uuid) -> AppResult<Session> {
        let mut inner = self.inner.write().await;
        let session = inner.sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
        session.reset();
        tracing::info!(session_id = %id, "Session reset");
        Ok(session.clone())
    }
}
