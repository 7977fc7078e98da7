use reqwest::Url;
use serde::{Deserialize, Serialize};

/// WGS84 position as reported by the catalog (`mapy`/`mapx`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A tourist spot returned by the catalog
///
/// `id` is the catalog's content id and the dedup key across regions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub address: String,
    pub image_url: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            address: address.into(),
            image_url: None,
            coordinates: None,
        }
    }

    /// `title + " " + address`, the only text available for matching
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.address)
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

/// Candidate with its affinity score; recomputed every run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item: CatalogItem,
    pub score: u32,
}

/// Map search links shown on a result card
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapLinks {
    pub kakao: String,
    pub naver: String,
    pub google: String,
}

impl MapLinks {
    pub fn for_item(item: &CatalogItem) -> Self {
        let google_query = match item.coordinates {
            Some(c) => format!("{},{}", c.latitude, c.longitude),
            None => item.title.clone(),
        };

        Self {
            kakao: search_path_link("https://map.kakao.com/link/search/", &item.title),
            naver: search_path_link("https://map.naver.com/v5/search/", &item.title),
            google: Url::parse_with_params(
                "https://www.google.com/maps/search/",
                &[("api", "1"), ("query", google_query.as_str())],
            )
            .map(String::from)
            .unwrap_or_default(),
        }
    }
}

/// Appends `query` as a percent-encoded final path segment
fn search_path_link(base: &str, query: &str) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return String::new();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(query);
    }
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_text_joins_title_and_address() {
        let item = CatalogItem::new("126508", "해운대해수욕장", "부산광역시 해운대구 우동");
        assert_eq!(item.search_text(), "해운대해수욕장 부산광역시 해운대구 우동");
    }

    #[test]
    fn test_blank_image_is_not_displayable() {
        let mut item = CatalogItem::new("1", "a", "b");
        assert!(!item.has_image());
        item.image_url = Some("  ".to_string());
        assert!(!item.has_image());
        item.image_url = Some("http://tong.visitkorea.or.kr/a.jpg".to_string());
        assert!(item.has_image());
    }

    #[test]
    fn test_map_links_encode_title() {
        let item = CatalogItem::new("1", "감천 문화마을", "부산");
        let links = MapLinks::for_item(&item);
        assert!(links.kakao.starts_with("https://map.kakao.com/link/search/"));
        assert!(!links.kakao.contains(' '));
        assert!(links.naver.starts_with("https://map.naver.com/v5/search/"));
        assert!(links.google.contains("api=1"));
        assert!(links.google.contains("query="));
    }

    #[test]
    fn test_google_link_prefers_coordinates() {
        let mut item = CatalogItem::new("1", "해동용궁사", "부산");
        item.coordinates = Some(Coordinates {
            latitude: 35.188,
            longitude: 129.223,
        });
        let links = MapLinks::for_item(&item);
        assert!(links.google.contains("35.188%2C129.223"));
    }
}
