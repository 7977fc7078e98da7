use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        CatalogItem, ChatTurn, FacetTag, MapLinks, Notice, PreferenceCheck, RecommendationResult,
        Session, TravelPlan, UserPreferences,
    },
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// One result card
#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub item: CatalogItem,
    pub reason: String,
    pub map_links: MapLinks,
    /// Chosen options grouped by facet
    pub tags: Vec<FacetTag>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub seed: u64,
    pub cards: Vec<CardResponse>,
    pub plan: TravelPlan,
    pub notices: Vec<Notice>,
    pub generated_at: DateTime<Utc>,
}

impl RecommendationResponse {
    fn new(result: &RecommendationResult, preferences: &UserPreferences) -> Self {
        let tags = preferences.tags();
        let cards = result
            .items
            .iter()
            .map(|item| CardResponse {
                item: item.clone(),
                reason: result.reason_for(&item.id).to_string(),
                map_links: MapLinks::for_item(item),
                tags: tags.clone(),
            })
            .collect();

        Self {
            seed: result.seed,
            cards,
            plan: result.plan.clone(),
            notices: result.notices.clone(),
            generated_at: result.generated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub preferences: UserPreferences,
    pub ready: bool,
    pub conversation: Vec<ChatTurn>,
    pub reroll_seed: u64,
    pub last_result: Option<RecommendationResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            preferences: session.preferences.clone(),
            ready: session.preferences.check().ready,
            conversation: session.conversation.turns().to_vec(),
            reroll_seed: session.reroll_seed,
            last_result: session
                .last_result
                .as_ref()
                .map(|r| RecommendationResponse::new(r, &session.preferences)),
            created_at: session.created_at,
        }
    }
}

fn latest_result(session: &Session) -> AppResult<Json<RecommendationResponse>> {
    session
        .last_result
        .as_ref()
        .map(|r| Json(RecommendationResponse::new(r, &session.preferences)))
        .ok_or_else(|| AppError::Internal("run finished without a stored result".to_string()))
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let session = state.create_session().await;
    (StatusCode::CREATED, Json(SessionResponse::from(&session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.session(id).await?;
    Ok(Json(SessionResponse::from(&session)))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.remove_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stores survey answers; an incomplete survey is reported, not rejected
pub async fn submit_preferences(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UserPreferences>, JsonRejection>,
) -> AppResult<Json<PreferenceCheck>> {
    let Json(preferences) = payload?;
    let check = state.submit_preferences(id, preferences).await?;
    Ok(Json(check))
}

pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let Json(request) = payload?;
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Message text is empty".to_string()));
    }

    let reply = state.chat(id, text).await?;
    Ok(Json(ChatResponse { reply }))
}

pub async fn run_recommendation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecommendationResponse>> {
    let session = state.run(id).await?;
    latest_result(&session)
}

pub async fn reroll(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecommendationResponse>> {
    let session = state.reroll(id).await?;
    latest_result(&session)
}

pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.reset(id).await?;
    Ok(Json(SessionResponse::from(&session)))
}
