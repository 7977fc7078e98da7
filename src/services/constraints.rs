use crate::models::{CatalogItem, RegionCandidate, UserPreferences};

/// Destinations that need a boat to reach (Ulleungdo, Baengnyeongdo, ...)
pub const ISLAND_KEYWORDS: &[&str] = &[
    "울릉", "독도", "백령", "연평", "가파", "마라도", "추자", "흑산", "홍도", "비양", "청산도",
    "거문도", "울릉군", "옹진군",
];

/// TourAPI area code of Jeju, reachable only by flight or ferry
pub const JEJU_REGION_CODE: u32 = 39;

/// True when the item's text names a boat-dependent island
pub fn is_boat_only(item: &CatalogItem) -> bool {
    let text = item.search_text();
    ISLAND_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Hard transport exclusion
///
/// With ground-only transport every boat-dependent island is removed. This is
/// an exclusion, not a penalty: nothing downstream may re-admit these items.
pub fn apply_transport_constraint(
    items: Vec<CatalogItem>,
    preferences: &UserPreferences,
) -> Vec<CatalogItem> {
    if !preferences.is_ground_only() {
        return items;
    }

    let before = items.len();
    let kept: Vec<CatalogItem> = items.into_iter().filter(|i| !is_boat_only(i)).collect();

    if kept.len() < before {
        tracing::debug!(
            removed = before - kept.len(),
            kept = kept.len(),
            "Removed boat-only destinations for ground-only transport"
        );
    }

    kept
}

/// Whether the user can reach a whole region with the chosen transport
pub fn region_reachable(region: &RegionCandidate, preferences: &UserPreferences) -> bool {
    !(preferences.is_ground_only() && region.region_code == JEJU_REGION_CODE)
}
