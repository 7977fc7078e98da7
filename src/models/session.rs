use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ConversationContext, PreferenceCheck, RecommendationResult, UserPreferences};

/// State owned by one user session
///
/// Created on session start and cleared only by an explicit reset. The reroll
/// seed only ever moves forward by one per reroll.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub preferences: UserPreferences,
    pub conversation: ConversationContext,
    pub reroll_seed: u64,
    pub last_result: Option<RecommendationResult>,
    /// Bumped by every reset; work started under an older value is stale
    #[serde(skip)]
    pub generation: u64,
    pub created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            preferences: UserPreferences::new(),
            conversation: ConversationContext::new(),
            reroll_seed: 0,
            last_result: None,
            generation: 0,
            created_at: Utc::now(),
        }
    }

    /// Stores the survey answers and reports whether a run is allowed
    pub fn submit_preferences(&mut self, preferences: UserPreferences) -> PreferenceCheck {
        self.preferences = preferences;
        self.preferences.check()
    }

    /// Advances the reroll seed and returns the new value
    pub fn advance_seed(&mut self) -> u64 {
        self.reroll_seed += 1;
        self.reroll_seed
    }

    pub fn store_result(&mut self, result: RecommendationResult) {
        self.last_result = Some(result);
    }

    /// Clears conversation, result and seed. Survey answers and the id stay.
    pub fn reset(&mut self) {
        self.conversation = ConversationContext::new();
        self.reroll_seed = 0;
        self.last_result = None;
        self.generation += 1;
    }

    /// Whether a run started from `snapshot` with `seed` may still write back
    pub fn accepts_result_from(&self, snapshot: &Session, seed: u64) -> bool {
        self.generation == snapshot.generation && self.reroll_seed == seed
    }
}
