use serde::Deserialize;
use std::time::Duration;

use crate::services::{recommender::PipelineSettings, retry::RetryPolicy};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Chat-completions API key; runs and chat turns fail fast without it
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Chat-completions API base URL
    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// TourAPI service key; runs fail fast without it
    #[serde(default)]
    pub tour_api_key: Option<String>,

    /// TourAPI (KorService2) base URL
    #[serde(default = "default_tour_api_url")]
    pub tour_api_url: String,

    /// Value sent as the `MobileApp` parameter
    #[serde(default = "default_tour_api_app_name")]
    pub tour_api_app_name: String,

    /// Timeout applied to every outbound call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Minimum viable pool size, also the minimum count of positive scores
    /// before the ranker stops requiring a scenery match
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: usize,

    /// Per-region cut applied by the strict scenery ranking
    #[serde(default = "default_rank_limit")]
    pub rank_limit: usize,

    /// Top slice of the ranked pool the sampler draws from
    #[serde(default = "default_sample_slice")]
    pub sample_slice: usize,

    /// `numOfRows` requested per region
    #[serde(default = "default_catalog_page_size")]
    pub catalog_page_size: u32,

    #[serde(default = "default_max_regions")]
    pub max_regions: usize,

    /// Add activity/purpose bonuses on top of the scenery score
    #[serde(default = "default_secondary_tiebreak")]
    pub secondary_tiebreak: bool,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_tour_api_url() -> String {
    "https://apis.data.go.kr/B551011/KorService2".to_string()
}

fn default_tour_api_app_name() -> String {
    "SpotPick".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_min_pool_size() -> usize {
    10
}

fn default_rank_limit() -> usize {
    60
}

fn default_sample_slice() -> usize {
    60
}

fn default_catalog_page_size() -> u32 {
    120
}

fn default_max_regions() -> usize {
    5
}

fn default_secondary_tiebreak() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1200
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Pipeline thresholds, clamped to values the pipeline can honor
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            min_pool_size: self.min_pool_size.max(1),
            rank_limit: self.rank_limit.max(3),
            sample_slice: self.sample_slice.max(3),
            catalog_page_size: self.catalog_page_size.max(1),
            max_regions: self.max_regions.clamp(3, 6),
            secondary_tiebreak: self.secondary_tiebreak,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}
