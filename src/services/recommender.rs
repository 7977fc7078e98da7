use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        CatalogItem, ConversationContext, Notice, RecommendationResult, RunStage, UserPreferences,
    },
    services::{
        catalog::{dedup_by_id, CatalogGateway, CatalogSource, TourApiSource},
        chat::ChatAssistant,
        constraints::{apply_transport_constraint, region_reachable},
        justifier::Justifier,
        llm::{LanguageModel, OpenAiModel},
        planner::{fallback_regions, PlanOutcome, Planner},
        retry::RetryPolicy,
        sampler::pick_three,
        scoring::{rank_by_scenery, sort_by_score, ScoringPolicy},
    },
};

/// Thresholds of one recommendation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Smallest pool the run accepts before relaxing
    pub min_pool_size: usize,
    /// Per-region cut of the strict scenery ranking
    pub rank_limit: usize,
    /// Top slice the sampler draws from
    pub sample_slice: usize,
    pub catalog_page_size: u32,
    pub max_regions: usize,
    pub secondary_tiebreak: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_pool_size: 10,
            rank_limit: 60,
            sample_slice: 60,
            catalog_page_size: 120,
            max_regions: 5,
            secondary_tiebreak: true,
        }
    }
}

fn enter(stage: RunStage, seed: u64) {
    tracing::info!(stage = %stage, seed = seed, "Recommendation stage");
}

fn note(notices: &mut Vec<Notice>, notice: Notice) {
    if !notices.contains(&notice) {
        notices.push(notice);
    }
}

/// Runs the plan, fetch, filter, score, sample and explain pipeline
pub struct Recommender {
    gateway: CatalogGateway,
    planner: Planner,
    justifier: Justifier,
    assistant: ChatAssistant,
    settings: PipelineSettings,
}

impl Recommender {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        model: Arc<dyn LanguageModel>,
        settings: PipelineSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway: CatalogGateway::new(source),
            planner: Planner::new(model.clone(), retry, settings.max_regions),
            justifier: Justifier::new(model.clone(), retry),
            assistant: ChatAssistant::new(model, retry),
            settings,
        }
    }

    /// Builds the live collaborators; both API keys are required
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let openai_api_key = config
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Configuration("OPENAI_API_KEY is not set".to_string()))?;
        let tour_api_key = config
            .tour_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Configuration("TOUR_API_KEY is not set".to_string()))?;

        let model = OpenAiModel::new(
            openai_api_key,
            &config.openai_api_url,
            &config.openai_model,
            config.request_timeout(),
        )?;
        let source = TourApiSource::new(
            tour_api_key,
            &config.tour_api_url,
            &config.tour_api_app_name,
            config.request_timeout(),
        )?;

        Ok(Self::new(
            Arc::new(source),
            Arc::new(model),
            config.pipeline_settings(),
            config.retry_policy(),
        ))
    }

    fn scoring_policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            secondary_tiebreak: self.settings.secondary_tiebreak,
        }
    }

    /// Appends a user turn and the assistant's reply
    pub async fn chat_reply(
        &self,
        preferences: &UserPreferences,
        conversation: &mut ConversationContext,
        text: &str,
    ) -> String {
        self.assistant.reply(preferences, conversation, text).await
    }

    /// Runs the full pipeline for one seed
    ///
    /// Planning and explaining degrade to fallbacks. Only an unreachable
    /// catalog or an empty final pool fail the run.
    pub async fn recommend(
        &self,
        preferences: &UserPreferences,
        conversation: &ConversationContext,
        seed: u64,
    ) -> AppResult<RecommendationResult> {
        preferences.validate().map_err(AppError::Validation)?;

        let settings = self.settings;
        let policy = self.scoring_policy();
        let mut notices = Vec::new();

        enter(RunStage::Planning, seed);
        let PlanOutcome {
            plan,
            used_fallback,
        } = self.planner.plan_regions(preferences, conversation).await;
        if used_fallback {
            note(&mut notices, Notice::PlannerFallback);
        }

        enter(RunStage::Fetching, seed);
        let gathered = self
            .gateway
            .gather(&plan.areas, settings.catalog_page_size)
            .await?;
        if gathered.failed_regions > 0 {
            note(&mut notices, Notice::PartialCatalog);
        }

        enter(RunStage::Filtering, seed);
        let filtered: Vec<Vec<CatalogItem>> = gathered
            .pools
            .into_iter()
            .map(|pool| apply_transport_constraint(pool.items, preferences))
            .collect();

        enter(RunStage::Scoring, seed);
        let mut pool = dedup_by_id(filtered.iter().map(|items| {
            rank_by_scenery(
                items.clone(),
                preferences,
                policy,
                settings.rank_limit,
                settings.min_pool_size,
            )
            .into_iter()
            .map(|candidate| candidate.item)
        }));

        if pool.len() < settings.min_pool_size {
            let relaxed = dedup_by_id(filtered);
            tracing::info!(
                strict = pool.len(),
                relaxed = relaxed.len(),
                min_pool_size = settings.min_pool_size,
                "Pool below minimum, dropping per-region scenery cut"
            );
            if relaxed.len() > pool.len() {
                note(&mut notices, Notice::PoolRelaxed);
            }
            pool = relaxed;
        }

        if pool.len() < settings.min_pool_size {
            let extra: Vec<_> = fallback_regions(preferences.primary_scenery())
                .into_iter()
                .filter(|r| region_reachable(r, preferences))
                .filter(|r| !plan.areas.iter().any(|a| a.region_code == r.region_code))
                .collect();

            if !extra.is_empty() {
                tracing::info!(
                    pool = pool.len(),
                    regions = ?extra.iter().map(|r| r.region_code).collect::<Vec<_>>(),
                    "Widening search to fallback regions"
                );
                match self.gateway.gather(&extra, settings.catalog_page_size).await {
                    Ok(widened) => {
                        if widened.failed_regions > 0 {
                            note(&mut notices, Notice::PartialCatalog);
                        }
                        let before = pool.len();
                        let added = widened
                            .pools
                            .into_iter()
                            .map(|p| apply_transport_constraint(p.items, preferences));
                        pool = dedup_by_id(std::iter::once(pool).chain(added));
                        if pool.len() > before {
                            note(&mut notices, Notice::PoolRelaxed);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Fallback regions unavailable");
                        note(&mut notices, Notice::PartialCatalog);
                    }
                }
            }
        }

        let ranked = sort_by_score(pool, preferences, policy);
        if ranked.is_empty() {
            tracing::warn!(seed = seed, "No candidates left after filtering");
            return Err(AppError::EmptyPool);
        }

        enter(RunStage::Sampling, seed);
        let items = pick_three(&ranked, seed, settings.sample_slice);
        tracing::info!(
            pool = ranked.len(),
            picked = ?items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            "Sampled results"
        );

        enter(RunStage::Explaining, seed);
        let summary = conversation.summary();
        let mut reasons = HashMap::new();
        for item in &items {
            let reason = self.justifier.explain(item, preferences, &summary).await;
            if reason.from_template {
                note(&mut notices, Notice::ReasonFallback);
            }
            reasons.insert(item.id.clone(), reason.text);
        }

        enter(RunStage::Ready, seed);
        Ok(RecommendationResult {
            items,
            reasons,
            plan,
            seed,
            notices,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Scenery, Transport, TripLength};
    use crate::services::catalog::{AreaQuery, MockCatalogSource};
    use crate::services::constraints::is_boat_only;
    use crate::services::llm::{CompletionRequest, MockLanguageModel, ModelError};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio_test::assert_ok;

    const PLAN_BUSAN_GANGWON_GYEONGNAM: &str = r#"{"areas": [{"name": "부산", "regionCode": 6}, {"name": "강원", "regionCode": 32}, {"name": "경남", "regionCode": 36}], "keywords": ["바다", "해변"], "style_summary": "바다 여행"}"#;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            sample_slice: 20,
            ..PipelineSettings::default()
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    fn sea_by_train() -> UserPreferences {
        UserPreferences {
            scenery: [Scenery::Sea].into(),
            transport: [Transport::Train].into(),
            trip_length: [TripLength::OneNight].into(),
            ..UserPreferences::default()
        }
    }

    fn raw(id: &str, title: &str, address: &str) -> Value {
        json!({
            "contentid": id,
            "title": title,
            "addr1": address,
            "firstimage": format!("http://img/{id}.jpg"),
        })
    }

    fn body(items: Vec<Value>) -> Value {
        json!({"response": {"body": {"items": {"item": items}}}})
    }

    fn sea_items(prefix: &str, count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| raw(&format!("{prefix}-sea-{i}"), &format!("해수욕장 {i}"), "부산광역시 해운대구"))
            .collect()
    }

    fn plain_items(prefix: &str, count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| raw(&format!("{prefix}-plain-{i}"), &format!("박물관 {i}"), "부산광역시 중구"))
            .collect()
    }

    /// 20 sea spots, 5 boat-only islands and 25 unrelated spots in Busan
    fn busan_catalog() -> Vec<Value> {
        let mut items = sea_items("b", 20);
        items.extend((0..5).map(|i| {
            raw(&format!("island-{i}"), &format!("울릉도 해안 {i}"), "경상북도 울릉군 울릉읍")
        }));
        items.extend(plain_items("b", 25));
        items
    }

    fn source_with<F>(catalog: F) -> MockCatalogSource
    where
        F: Fn(u32) -> AppResult<Value> + Send + Sync + 'static,
    {
        let mut source = MockCatalogSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_area_based_list()
            .returning(move |query: AreaQuery| catalog(query.region_code));
        source
    }

    fn spot_name(request: &CompletionRequest) -> Option<String> {
        request
            .messages
            .iter()
            .flat_map(|m| m.content.lines())
            .find_map(|line| line.strip_prefix("Spot name: "))
            .map(str::to_string)
    }

    /// Plans with `plan` and writes a reason naming the spot
    fn model_with_plan(plan: &'static str) -> MockLanguageModel {
        let mut model = MockLanguageModel::new();
        model.expect_complete().returning(move |request| match spot_name(&request) {
            Some(name) => Ok(format!("{name}은 기차로 가기 좋은 바다 명소예요.")),
            None => Ok(plan.to_string()),
        });
        model
    }

    fn recommender(source: MockCatalogSource, model: MockLanguageModel, settings: PipelineSettings) -> Recommender {
        Recommender::new(Arc::new(source), Arc::new(model), settings, fast_policy())
    }

    fn ids(result: &RecommendationResult) -> Vec<String> {
        result.items.iter().map(|i| i.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_sea_by_train_end_to_end() {
        let source = source_with(|code| match code {
            6 => Ok(body(busan_catalog())),
            _ => Ok(body(vec![])),
        });
        let recommender = recommender(source, model_with_plan(PLAN_BUSAN_GANGWON_GYEONGNAM), settings());
        let prefs = sea_by_train();
        let conversation = ConversationContext::new();

        for seed in 0..10 {
            let result = recommender.recommend(&prefs, &conversation, seed).await.unwrap();

            assert_eq!(result.items.len(), 3);
            assert_eq!(result.seed, seed);
            let unique: HashSet<String> = ids(&result).into_iter().collect();
            assert_eq!(unique.len(), 3);
            for item in &result.items {
                assert!(!is_boat_only(item), "seed {seed} picked island {}", item.id);
                assert!(item.id.starts_with("b-sea-"), "seed {seed} picked {}", item.id);
                assert!(result.reason_for(&item.id).contains(&item.title));
            }
            assert!(result.notices.is_empty());
        }
    }

    #[tokio::test]
    async fn test_same_seed_reproduces_selection() {
        let source = source_with(|code| match code {
            6 => Ok(body(busan_catalog())),
            _ => Ok(body(vec![])),
        });
        let recommender = recommender(source, model_with_plan(PLAN_BUSAN_GANGWON_GYEONGNAM), settings());
        let prefs = sea_by_train();
        let conversation = ConversationContext::new();

        let first = assert_ok!(recommender.recommend(&prefs, &conversation, 4).await);
        let second = assert_ok!(recommender.recommend(&prefs, &conversation, 4).await);
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.reasons, second.reasons);
    }

    #[tokio::test]
    async fn test_invalid_preferences_make_no_calls() {
        let recommender = recommender(MockCatalogSource::new(), MockLanguageModel::new(), settings());
        let prefs = UserPreferences {
            scenery: [Scenery::Sea].into(),
            ..UserPreferences::default()
        };

        let result = recommender
            .recommend(&prefs, &ConversationContext::new(), 0)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_relaxes_per_region_cut_when_pool_is_small() {
        let source = source_with(|code| match code {
            6 => {
                let mut items = sea_items("b", 4);
                items.extend(plain_items("b", 8));
                Ok(body(items))
            }
            _ => Ok(body(vec![])),
        });
        let settings = PipelineSettings {
            rank_limit: 5,
            ..settings()
        };
        let recommender = recommender(source, model_with_plan(PLAN_BUSAN_GANGWON_GYEONGNAM), settings);

        let result = recommender
            .recommend(&sea_by_train(), &ConversationContext::new(), 1)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 3);
        assert!(result.notices.contains(&Notice::PoolRelaxed));
    }

    #[tokio::test]
    async fn test_widens_to_fallback_regions() {
        let source = source_with(|code| match code {
            6 => Ok(body(sea_items("b", 2))),
            38 => Ok(body(sea_items("jn", 10))),
            _ => Ok(body(vec![])),
        });
        let recommender = recommender(source, model_with_plan(PLAN_BUSAN_GANGWON_GYEONGNAM), settings());

        let result = recommender
            .recommend(&sea_by_train(), &ConversationContext::new(), 2)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 3);
        assert!(result.notices.contains(&Notice::PoolRelaxed));
        assert_eq!(result.plan.areas.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_pool_is_reported() {
        let source = source_with(|_| Ok(body(vec![])));
        let recommender = recommender(source, model_with_plan(PLAN_BUSAN_GANGWON_GYEONGNAM), settings());

        let result = recommender
            .recommend(&sea_by_train(), &ConversationContext::new(), 0)
            .await;
        assert!(matches!(result, Err(AppError::EmptyPool)));
    }

    #[tokio::test]
    async fn test_only_islands_left_is_an_empty_pool() {
        let source = source_with(|_| {
            Ok(body(vec![raw("island", "독도 전망대", "경상북도 울릉군 울릉읍 독도리")]))
        });
        let recommender = recommender(source, model_with_plan(PLAN_BUSAN_GANGWON_GYEONGNAM), settings());

        let result = recommender
            .recommend(&sea_by_train(), &ConversationContext::new(), 0)
            .await;
        assert!(matches!(result, Err(AppError::EmptyPool)));
    }

    #[tokio::test]
    async fn test_unreachable_catalog_aborts_before_explaining() {
        let source =
            source_with(|_| Err(AppError::UpstreamUnavailable("connection refused".to_string())));
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .times(1)
            .returning(|_| Ok(PLAN_BUSAN_GANGWON_GYEONGNAM.to_string()));
        let recommender = recommender(source, model, settings());

        let result = recommender
            .recommend(&sea_by_train(), &ConversationContext::new(), 0)
            .await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_model_outage_degrades_to_fallbacks() {
        let source = source_with(|code| match code {
            6 => Ok(body(busan_catalog())),
            _ => Ok(body(vec![])),
        });
        let mut model = MockLanguageModel::new();
        model.expect_complete().returning(|_| {
            Err(ModelError::Transport {
                message: "connection reset".into(),
                retryable: true,
            })
        });
        let recommender = recommender(source, model, settings());
        let prefs = sea_by_train();

        let result = recommender
            .recommend(&prefs, &ConversationContext::new(), 3)
            .await
            .unwrap();

        assert_eq!(result.items.len(), 3);
        assert!(result.notices.contains(&Notice::PlannerFallback));
        assert!(result.notices.contains(&Notice::ReasonFallback));
        assert_eq!(result.plan.style_summary, "선호 풍경 중심 추천");
        for item in &result.items {
            assert!(result.reason_for(&item.id).starts_with(&item.title));
        }
    }

    #[tokio::test]
    async fn test_partial_catalog_notice() {
        let source = source_with(|code| match code {
            6 => Ok(body(busan_catalog())),
            _ => Err(AppError::UpstreamUnavailable("timeout".to_string())),
        });
        let recommender = recommender(source, model_with_plan(PLAN_BUSAN_GANGWON_GYEONGNAM), settings());

        let result = assert_ok!(
            recommender
                .recommend(&sea_by_train(), &ConversationContext::new(), 0)
                .await
        );
        assert_eq!(result.notices, vec![Notice::PartialCatalog]);
    }

    #[test]
    fn test_from_config_requires_keys() {
        let config: Config = envy::from_iter::<_, Config>(vec![(
            "TOUR_API_KEY".to_string(),
            "tour".to_string(),
        )])
        .unwrap();
        assert!(matches!(
            Recommender::from_config(&config),
            Err(AppError::Configuration(_))
        ));

        let config: Config = envy::from_iter::<_, Config>(vec![
            ("TOUR_API_KEY".to_string(), "tour".to_string()),
            ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
        ])
        .unwrap();
        assert!(Recommender::from_config(&config).is_ok());
    }
}
