//! Korea Tourism Organization TourAPI (KorService2) source
//!
//! Only `areaBasedList2` is used: attractions (content type 12) in one area
//! code, sorted by popularity.

use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

use super::{AreaQuery, CatalogSource};
use crate::error::{AppError, AppResult};

/// `contentTypeId` of tourist attractions
const CONTENT_TYPE_ATTRACTION: &str = "12";
/// `arrange` value for popularity order
const SORT_BY_POPULARITY: &str = "P";

#[derive(Clone)]
pub struct TourApiSource {
    http_client: HttpClient,
    service_key: String,
    api_url: String,
    app_name: String,
}

impl TourApiSource {
    pub fn new(
        service_key: impl Into<String>,
        api_url: impl Into<String>,
        app_name: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            service_key: service_key.into(),
            api_url: api_url.into(),
            app_name: app_name.into(),
        })
    }

    fn query_params(&self, query: &AreaQuery) -> Vec<(&'static str, String)> {
        vec![
            ("serviceKey", self.service_key.clone()),
            ("MobileOS", "ETC".to_string()),
            ("MobileApp", self.app_name.clone()),
            ("_type", "json".to_string()),
            ("areaCode", query.region_code.to_string()),
            ("contentTypeId", CONTENT_TYPE_ATTRACTION.to_string()),
            ("numOfRows", query.page_size.to_string()),
            ("pageNo", query.page_number.to_string()),
            ("arrange", SORT_BY_POPULARITY.to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl CatalogSource for TourApiSource {
    async fn area_based_list(&self, query: AreaQuery) -> AppResult<Value> {
        let url = format!("{}/areaBasedList2", self.api_url.trim_end_matches('/'));

        let response = self
            .http_client
            .get(&url)
            .query(&self.query_params(&query))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "TourAPI returned status {}: {}",
                status, body
            )));
        }

        let response_text = response.text().await?;

        match serde_json::from_str::<Value>(&response_text) {
            Ok(body) => Ok(body),
            Err(e) => {
                // Key or quota problems come back as an XML envelope with 200
                tracing::warn!(
                    error = %e,
                    region_code = query.region_code,
                    body_prefix = %response_text.chars().take(200).collect::<String>(),
                    "TourAPI body is not JSON, treating as empty"
                );
                Ok(Value::Null)
            }
        }
    }

    fn name(&self) -> &'static str {
        "tour_api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_source() -> TourApiSource {
        TourApiSource::new(
            "test_key",
            "http://test.local/B551011/KorService2/",
            "SpotPick",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_query_params() {
        let source = create_test_source();
        let params = source.query_params(&AreaQuery {
            region_code: 32,
            page_size: 120,
            page_number: 1,
        });

        let lookup = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(lookup("serviceKey").as_deref(), Some("test_key"));
        assert_eq!(lookup("areaCode").as_deref(), Some("32"));
        assert_eq!(lookup("contentTypeId").as_deref(), Some("12"));
        assert_eq!(lookup("numOfRows").as_deref(), Some("120"));
        assert_eq!(lookup("arrange").as_deref(), Some("P"));
        assert_eq!(lookup("_type").as_deref(), Some("json"));
    }

    #[test]
    fn test_source_name() {
        assert_eq!(create_test_source().name(), "tour_api");
    }
}
