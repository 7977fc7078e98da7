//! Catalog gateway
//!
//! Sources return the raw response body; the gateway is the boundary where
//! the loosely-shaped catalog JSON (a list, a bare object for a single match,
//! an empty string when nothing matched) becomes a typed `Vec<CatalogItem>`.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogItem, Coordinates, RegionCandidate},
};

pub mod tour_api;

pub use tour_api::TourApiSource;

/// One `areaBasedList` page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaQuery {
    pub region_code: u32,
    pub page_size: u32,
    pub page_number: u32,
}

/// Raw access to the external catalog
///
/// Implementations only fail when the catalog is unreachable or answers with
/// an error status. A body that is not JSON should come back as `Value::Null`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Popular attractions in one region, most popular first
    async fn area_based_list(&self, query: AreaQuery) -> AppResult<Value>;

    /// Source name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Candidates fetched for one planned region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPool {
    pub region: RegionCandidate,
    pub items: Vec<CatalogItem>,
}

/// Result of fetching every planned region
#[derive(Debug, Clone, PartialEq)]
pub struct GatherOutcome {
    pub pools: Vec<RegionPool>,
    pub failed_regions: usize,
}

#[derive(Clone)]
pub struct CatalogGateway {
    source: Arc<dyn CatalogSource>,
}

impl CatalogGateway {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }

    /// Displayable candidates for one region, at most `max_count`
    pub async fn fetch_candidates(
        &self,
        region_code: u32,
        max_count: u32,
    ) -> AppResult<Vec<CatalogItem>> {
        let body = self
            .source
            .area_based_list(AreaQuery {
                region_code,
                page_size: max_count,
                page_number: 1,
            })
            .await?;

        let mut items = extract_items(&body);
        let total = items.len();
        items.retain(CatalogItem::has_image);
        items.truncate(max_count as usize);

        tracing::debug!(
            region_code = region_code,
            fetched = total,
            displayable = items.len(),
            source = self.source.name(),
            "Region candidates fetched"
        );

        Ok(items)
    }

    /// Fetches each region in order, one call at a time
    ///
    /// A region that fails is logged and skipped. Only when every region
    /// fails does the whole fetch fail.
    pub async fn gather(
        &self,
        regions: &[RegionCandidate],
        max_count: u32,
    ) -> AppResult<GatherOutcome> {
        let mut pools = Vec::new();
        let mut errors = Vec::new();

        for region in regions {
            match self.fetch_candidates(region.region_code, max_count).await {
                Ok(items) => pools.push(RegionPool {
                    region: region.clone(),
                    items,
                }),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        region = %region.name,
                        region_code = region.region_code,
                        "Catalog fetch failed for region"
                    );
                    errors.push(e);
                }
            }
        }

        if !errors.is_empty() {
            tracing::warn!(
                success_count = pools.len(),
                error_count = errors.len(),
                "Partial catalog fetch failure"
            );
        }

        if pools.is_empty() && !errors.is_empty() {
            return Err(AppError::UpstreamUnavailable(format!(
                "Failed to fetch any region ({} attempted)",
                errors.len()
            )));
        }

        Ok(GatherOutcome {
            pools,
            failed_regions: errors.len(),
        })
    }
}

/// Concatenates item lists keeping the first occurrence of each id
pub fn dedup_by_id<I>(lists: I) -> Vec<CatalogItem>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = CatalogItem>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for item in lists.into_iter().flatten() {
        if seen.insert(item.id.clone()) {
            merged.push(item);
        }
    }
    merged
}

/// Pulls `response.body.items.item` out of a catalog body
///
/// Missing or malformed nesting yields an empty list; a bare object is a
/// one-element list.
pub fn extract_items(body: &Value) -> Vec<CatalogItem> {
    let node = &body["response"]["body"]["items"]["item"];
    match node {
        Value::Array(entries) => entries.iter().filter_map(parse_item).collect(),
        Value::Object(_) => parse_item(node).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn parse_item(entry: &Value) -> Option<CatalogItem> {
    let id = field_str(entry, "contentid")?;
    let title = field_str(entry, "title").unwrap_or_default();
    let address = field_str(entry, "addr1").unwrap_or_default();
    let image_url = field_str(entry, "firstimage").or_else(|| field_str(entry, "firstimage2"));

    let coordinates = match (field_f64(entry, "mapy"), field_f64(entry, "mapx")) {
        (Some(latitude), Some(longitude)) if latitude != 0.0 && longitude != 0.0 => {
            Some(Coordinates {
                latitude,
                longitude,
            })
        }
        _ => None,
    };

    Some(CatalogItem {
        id,
        title,
        address,
        image_url,
        coordinates,
    })
}

/// Non-empty string field; numbers are accepted and stringified
fn field_str(entry: &Value, key: &str) -> Option<String> {
    let text = match entry.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn field_f64(entry: &Value, key: &str) -> Option<f64> {
    match entry.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
