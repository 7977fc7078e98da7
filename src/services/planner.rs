//! Selection planner
//!
//! Asks the model for a small set of regions to search and always ends with a
//! usable plan: anything the model gets wrong is corrected in code, and any
//! failure falls back to a fixed region set keyed off the primary scenery.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    models::{ConversationContext, RegionCandidate, Scenery, TravelPlan, UserPreferences},
    services::{
        constraints::region_reachable,
        llm::{complete_with_retry, ChatMessage, CompletionRequest, LanguageModel},
        retry::RetryPolicy,
    },
};

/// TourAPI area codes
pub const KNOWN_REGIONS: &[(u32, &str)] = &[
    (1, "서울"),
    (2, "인천"),
    (3, "대전"),
    (4, "대구"),
    (5, "광주"),
    (6, "부산"),
    (7, "울산"),
    (8, "세종"),
    (31, "경기"),
    (32, "강원"),
    (33, "충북"),
    (34, "충남"),
    (35, "경북"),
    (36, "경남"),
    (37, "전북"),
    (38, "전남"),
    (39, "제주"),
];

pub const MIN_REGIONS: usize = 3;

const PLANNING_TEMPERATURE: f32 = 0.2;
const FALLBACK_STYLE_SUMMARY: &str = "선호 풍경 중심 추천";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanParseError {
    #[error("no JSON object in model output")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("plan has no usable areas")]
    MissingAreas,
}

/// Plan plus whether it came from the rule-based fallback
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub plan: TravelPlan,
    pub used_fallback: bool,
}

fn region(code: u32) -> RegionCandidate {
    let name = KNOWN_REGIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| *n)
        .unwrap_or_default();
    RegionCandidate::new(name, code)
}

/// Fixed regions for the primary scenery; all reachable by ground
pub fn fallback_regions(scenery: Option<Scenery>) -> Vec<RegionCandidate> {
    let codes: &[u32] = match scenery {
        Some(Scenery::Sea) => &[6, 32, 36, 38],
        Some(Scenery::Mountain) => &[32, 35, 37, 33],
        Some(Scenery::City) => &[1, 6, 4, 2],
        None => &[6, 32, 36],
    };
    codes.iter().copied().map(region).collect()
}

pub fn fallback_plan(preferences: &UserPreferences) -> TravelPlan {
    TravelPlan {
        areas: fallback_regions(preferences.primary_scenery()),
        keywords: preferences
            .scenery
            .iter()
            .map(|s| s.label().to_string())
            .collect(),
        style_summary: FALLBACK_STYLE_SUMMARY.to_string(),
    }
}

/// Decodes a plan from free-form model text
///
/// Takes the substring from the first `{` to the last `}` so prose or code
/// fences around the object are ignored. Area codes may be numbers or numeric
/// strings, under `regionCode` or `areaCode`.
pub fn parse_structured_plan(text: &str) -> Result<TravelPlan, PlanParseError> {
    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => return Err(PlanParseError::NoJsonObject),
    };

    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|e| PlanParseError::InvalidJson(e.to_string()))?;

    let areas: Vec<RegionCandidate> = value
        .get("areas")
        .and_then(Value::as_array)
        .ok_or(PlanParseError::MissingAreas)?
        .iter()
        .filter_map(parse_area)
        .collect();

    if areas.is_empty() {
        return Err(PlanParseError::MissingAreas);
    }

    let keywords = value
        .get("keywords")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let style_summary = value
        .get("style_summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(TravelPlan {
        areas,
        keywords,
        style_summary,
    })
}

fn parse_area(entry: &Value) -> Option<RegionCandidate> {
    let code = ["regionCode", "areaCode", "region_code"]
        .iter()
        .find_map(|key| match entry.get(*key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })?;
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(RegionCandidate::new(name, u32::try_from(code).ok()?))
}

/// Makes a plan safe to execute
///
/// Drops unknown area codes and regions the transport cannot reach, collapses
/// duplicates, caps the list at `max_regions` and pads it to three from the
/// fallback set.
pub fn enforce_plan(
    mut plan: TravelPlan,
    preferences: &UserPreferences,
    max_regions: usize,
) -> TravelPlan {
    let mut seen = HashSet::new();
    let mut areas: Vec<RegionCandidate> = plan
        .areas
        .into_iter()
        .filter(|r| KNOWN_REGIONS.iter().any(|(code, _)| *code == r.region_code))
        .filter(|r| region_reachable(r, preferences))
        .filter(|r| seen.insert(r.region_code))
        .map(|r| {
            if r.name.trim().is_empty() {
                region(r.region_code)
            } else {
                r
            }
        })
        .collect();
    areas.truncate(max_regions);

    for extra in fallback_regions(preferences.primary_scenery()) {
        if areas.len() >= MIN_REGIONS {
            break;
        }
        if seen.insert(extra.region_code) {
            areas.push(extra);
        }
    }

    if plan.style_summary.trim().is_empty() {
        plan.style_summary = FALLBACK_STYLE_SUMMARY.to_string();
    }

    TravelPlan {
        areas,
        keywords: plan.keywords,
        style_summary: plan.style_summary,
    }
}

fn planning_instruction(max_regions: usize) -> String {
    let region_table = KNOWN_REGIONS
        .iter()
        .map(|(code, name)| format!("{code} {name}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You plan domestic travel recommendations in Korea.
From the user's survey answers and chat, output catalog search conditions as JSON only.

Priorities, in this order. Never reorder them:
1) preferred scenery / environment
2) transport (hard constraint)
3) trip length
4) everything else (activities, crowd, companion, purpose)

Scenery rules:
- "바다" (sea): favour beaches, coast and harbours; avoid mountain-centred areas.
- "산" (mountain): favour mountains, valleys, forests and trekking; avoid beach-centred areas.
- "도시" (city): favour downtown, culture, exhibitions and streets.

Transport rules:
- Never assume a transport mode the user did not choose (flight, ferry, rental car).
- If the user travels by train or express bus without flight, never propose islands that need a boat (Ulleungdo, Baengnyeongdo, ...) or Jeju.

Format (no explanation, no code fences):
{{"areas": [{{"name": "부산", "regionCode": 6}}, {{"name": "강원", "regionCode": 32}}, {{"name": "경남", "regionCode": 36}}], "keywords": ["바다", "해변", "카페"], "style_summary": "짧은 바다 힐링 여행"}}

Rules:
- areas: 3 to {max_regions} entries; regionCode must be one of: {region_table}
- keywords: 5 to 8, always including the chosen scenery
- style_summary: one short line in Korean"#
    )
}

pub struct Planner {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    max_regions: usize,
}

impl Planner {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy, max_regions: usize) -> Self {
        Self {
            model,
            retry,
            max_regions,
        }
    }

    fn build_request(
        &self,
        preferences: &UserPreferences,
        conversation: &ConversationContext,
    ) -> CompletionRequest {
        let mut messages = vec![
            ChatMessage::system(planning_instruction(self.max_regions)),
            ChatMessage::system(preferences.survey_context()),
        ];
        messages.extend(
            conversation
                .turns()
                .iter()
                .map(|t| ChatMessage::from_turn(t.role, t.text.clone())),
        );

        CompletionRequest {
            messages,
            temperature: PLANNING_TEMPERATURE,
        }
    }

    /// Proposes 3 to `max_regions` regions; never fails
    pub async fn plan_regions(
        &self,
        preferences: &UserPreferences,
        conversation: &ConversationContext,
    ) -> PlanOutcome {
        let request = self.build_request(preferences, conversation);

        let parsed = match complete_with_retry(self.model.as_ref(), request, self.retry, "plan")
            .await
        {
            Ok(text) => parse_structured_plan(&text).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match parsed {
            Ok(plan) => {
                let plan = enforce_plan(plan, preferences, self.max_regions);
                tracing::info!(
                    regions = ?plan.areas.iter().map(|r| r.region_code).collect::<Vec<_>>(),
                    style = %plan.style_summary,
                    "Model plan accepted"
                );
                PlanOutcome {
                    plan,
                    used_fallback: false,
                }
            }
            Err(reason) => {
                let plan = enforce_plan(fallback_plan(preferences), preferences, self.max_regions);
                tracing::warn!(
                    reason = %reason,
                    regions = ?plan.areas.iter().map(|r| r.region_code).collect::<Vec<_>>(),
                    "Planner fell back to rule-based regions"
                );
                PlanOutcome {
                    plan,
                    used_fallback: true,
                }
            }
        }
    }
}
