use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Display};

pub mod conversation;
pub mod session;
pub mod spot;
pub mod user_preferences;

pub use conversation::{ChatTurn, ConversationContext, Role};
pub use session::Session;
pub use spot::{CatalogItem, Coordinates, MapLinks, ScoredCandidate};
pub use user_preferences::{
    Activity, Companion, CrowdPreference, FacetTag, PreferenceCheck, Purpose, RequiredFacet,
    Scenery, TripLength, Transport, UserPreferences,
};

// ============================================================================
// Planning
// ============================================================================

/// A catalog region to search, as proposed by the planner
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegionCandidate {
    pub name: String,
    /// TourAPI `areaCode`
    #[serde(rename = "regionCode")]
    pub region_code: u32,
}

impl RegionCandidate {
    pub fn new(name: impl Into<String>, region_code: u32) -> Self {
        Self {
            name: name.into(),
            region_code,
        }
    }
}

/// Structured search plan produced by the planner (or its fallback)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TravelPlan {
    pub areas: Vec<RegionCandidate>,
    pub keywords: Vec<String>,
    pub style_summary: String,
}

// ============================================================================
// Results
// ============================================================================

/// Informational notice attached to a result when a stage degraded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// The model plan was unusable; rule-based regions were searched
    PlannerFallback,
    /// At least one reason was written from the template
    ReasonFallback,
    /// The strict scenery cut left too few candidates and was relaxed
    PoolRelaxed,
    /// Some regions could not be fetched
    PartialCatalog,
}

/// Stages of one recommendation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Planning,
    Fetching,
    Filtering,
    Scoring,
    Sampling,
    Explaining,
    Ready,
}

impl Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Planning => "planning",
            RunStage::Fetching => "fetching",
            RunStage::Filtering => "filtering",
            RunStage::Scoring => "scoring",
            RunStage::Sampling => "sampling",
            RunStage::Explaining => "explaining",
            RunStage::Ready => "ready",
        };
        write!(f, "{}", name)
    }
}

/// Up to three picked spots plus one reason per spot id
///
/// Replaced wholesale on every run or reroll, never patched.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationResult {
    pub items: Vec<CatalogItem>,
    pub reasons: HashMap<String, String>,
    pub plan: TravelPlan,
    pub seed: u64,
    pub notices: Vec<Notice>,
    pub generated_at: DateTime<Utc>,
}

const DEFAULT_REASON: &str = "선호도와 입력한 조건에 잘 맞는 장소예요!";

impl RecommendationResult {
    pub fn reason_for(&self, item_id: &str) -> &str {
        self.reasons
            .get(item_id)
            .map(String::as_str)
            .unwrap_or(DEFAULT_REASON)
    }
}
