use std::collections::BTreeSet;

use crate::models::{
    Activity, CatalogItem, Purpose, Scenery, ScoredCandidate, UserPreferences,
};

pub const SEA_HINTS: &[&str] = &[
    "해변", "바다", "해수욕장", "항", "포구", "등대", "섬", "해안", "갯벌", "선착장", "바닷길",
    "해안도로",
];
pub const MOUNTAIN_HINTS: &[&str] = &[
    "산", "등산", "트레킹", "케이블카", "계곡", "정상", "국립공원", "숲", "오름",
];
pub const CITY_HINTS: &[&str] = &[
    "도심", "시내", "거리", "광장", "전망대", "타워", "야경", "시장", "쇼핑", "문화", "전시",
    "뮤지엄",
];

const SEA_ADDRESS_HINTS: &[&str] = &["해변", "항", "포구", "해수욕장", "해안"];
const MOUNTAIN_ADDRESS_HINTS: &[&str] = &["산", "계곡", "국립공원", "숲"];

/// City names that contain 산 without meaning "mountain"
const MOUNTAIN_FALSE_FRIENDS: &[&str] = &[
    "부산", "울산", "군산", "서산", "아산", "익산", "경산", "양산", "오산", "산업",
];

const SEA_WEIGHT: u32 = 4;
const MOUNTAIN_WEIGHT: u32 = 4;
const CITY_WEIGHT: u32 = 3;
const ADDRESS_BONUS: u32 = 6;

/// Multiplier applied to the scenery score in the total
pub const SCENERY_DOMINANCE: u32 = 20;
/// Flat bonus per distinct activity/purpose keyword hit
pub const SECONDARY_BONUS: u32 = 2;
/// Secondary bonuses stay strictly below one unit of scenery score
pub const SECONDARY_CAP: u32 = SCENERY_DOMINANCE - SECONDARY_BONUS;

/// How the total score is composed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    /// Add activity/purpose bonuses; they can only reorder items whose
    /// scenery score is equal
    pub secondary_tiebreak: bool,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            secondary_tiebreak: true,
        }
    }
}

fn activity_keywords(activity: Activity) -> &'static [&'static str] {
    match activity {
        Activity::FoodTour => &["맛집", "시장", "먹거리", "음식"],
        Activity::CafeTour => &["카페", "커피"],
        Activity::PhotoSpot => &["전망대", "포토", "야경", "스카이워크", "출렁다리"],
        Activity::HotSpring => &["온천", "스파", "찜질"],
        Activity::HistoryCulture => &["궁", "향교", "서원", "성곽", "유적", "한옥", "고택", "역사"],
        Activity::ExhibitionMuseum => &["박물관", "미술관", "전시", "기념관", "뮤지엄", "과학관"],
        Activity::ThemePark => &["테마파크", "랜드", "월드", "놀이", "아쿠아리움"],
    }
}

fn purpose_keywords(purpose: Purpose) -> &'static [&'static str] {
    match purpose {
        Purpose::Healing => &["수목원", "휴양림", "숲", "정원", "공원"],
        Purpose::Relaxation => &["리조트", "휴양", "해수욕장", "온천"],
        Purpose::Activity => &["레일바이크", "짚라인", "체험", "레저", "서핑", "케이블카"],
        Purpose::Sightseeing => &["관광", "명소", "거리", "마을"],
    }
}

fn count_hits(text: &str, hints: &[&str]) -> u32 {
    hints.iter().filter(|h| text.contains(*h)).count() as u32
}

fn without_false_friends(text: &str) -> String {
    MOUNTAIN_FALSE_FRIENDS
        .iter()
        .fold(text.to_string(), |acc, name| acc.replace(name, " "))
}

/// Scenery affinity of one item: weighted keyword hits over title + address,
/// plus an address bonus for coastal and mountain addresses
pub fn scenery_score(item: &CatalogItem, scenery: &BTreeSet<Scenery>) -> u32 {
    let text = item.search_text();
    let mut score = 0;

    if scenery.contains(&Scenery::Sea) {
        score += count_hits(&text, SEA_HINTS) * SEA_WEIGHT;
        if SEA_ADDRESS_HINTS.iter().any(|h| item.address.contains(h)) {
            score += ADDRESS_BONUS;
        }
    }

    if scenery.contains(&Scenery::Mountain) {
        score += count_hits(&without_false_friends(&text), MOUNTAIN_HINTS) * MOUNTAIN_WEIGHT;
        let address = without_false_friends(&item.address);
        if MOUNTAIN_ADDRESS_HINTS.iter().any(|h| address.contains(h)) {
            score += ADDRESS_BONUS;
        }
    }

    if scenery.contains(&Scenery::City) {
        score += count_hits(&text, CITY_HINTS) * CITY_WEIGHT;
    }

    score
}

/// `SECONDARY_BONUS` per distinct activity/purpose keyword found, capped
pub fn secondary_bonus(item: &CatalogItem, preferences: &UserPreferences) -> u32 {
    let text = item.search_text();
    let keywords: BTreeSet<&str> = preferences
        .activities
        .iter()
        .flat_map(|a| activity_keywords(*a).iter().copied())
        .chain(
            preferences
                .purpose
                .iter()
                .flat_map(|p| purpose_keywords(*p).iter().copied()),
        )
        .collect();

    let hits = keywords.iter().filter(|k| text.contains(*k)).count() as u32;
    (hits * SECONDARY_BONUS).min(SECONDARY_CAP)
}

pub fn total_score(item: &CatalogItem, preferences: &UserPreferences, policy: ScoringPolicy) -> u32 {
    let scenery = scenery_score(item, &preferences.scenery) * SCENERY_DOMINANCE;
    if policy.secondary_tiebreak {
        scenery + secondary_bonus(item, preferences)
    } else {
        scenery
    }
}

/// True when a total score includes at least one scenery match
pub fn has_scenery_match(candidate: &ScoredCandidate) -> bool {
    candidate.score >= SCENERY_DOMINANCE
}

/// Scores every item and sorts by total score, highest first (stable)
pub fn sort_by_score(
    items: Vec<CatalogItem>,
    preferences: &UserPreferences,
    policy: ScoringPolicy,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = items
        .into_iter()
        .map(|item| ScoredCandidate {
            score: total_score(&item, preferences, policy),
            item,
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// Strict scenery ranking with a sparse-signal fallback
///
/// Keeps only scenery-matching items when at least `min_matches` of them
/// exist; otherwise keeps the best items regardless, so thin catalog text
/// never starves the user. Either way at most `limit` items are returned.
pub fn rank_by_scenery(
    items: Vec<CatalogItem>,
    preferences: &UserPreferences,
    policy: ScoringPolicy,
    limit: usize,
    min_matches: usize,
) -> Vec<ScoredCandidate> {
    let scored = sort_by_score(items, preferences, policy);
    let matches = scored.iter().filter(|c| has_scenery_match(c)).count();

    if matches >= min_matches {
        scored
            .into_iter()
            .filter(has_scenery_match)
            .take(limit)
            .collect()
    } else {
        tracing::debug!(
            matches = matches,
            min_matches = min_matches,
            "Sparse scenery signal, keeping top items regardless of score"
        );
        scored.into_iter().take(limit).collect()
    }
}
