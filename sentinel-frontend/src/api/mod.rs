//! Local control API: health, manual refresh, maintenance and rating
//! registration.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sentinel_backend::rating::RatingLedger;
use sentinel_backend::scheduled::{CycleReport, StatusScheduler};
use sentinel_backend::surface::{best_effort, ReactionSurface};
use sentinel_common::RatingValue;

/// Shared handler state
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<StatusScheduler>,
    pub ledger: Option<Arc<RatingLedger>>,
    pub reactions: Arc<dyn ReactionSurface>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    maintenance: bool,
    status_message_id: Option<String>,
    tracked_messages: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(default)]
    force_new: bool,
}

#[derive(Deserialize, Debug)]
struct MaintenanceRequest {
    enabled: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    channel_id: String,
    message_id: String,
    item_id: String,
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default = "default_add_reactions")]
    add_reactions: bool,
}

fn default_add_reactions() -> bool {
    true
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CycleResponse {
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence: Option<&'static str>,
}

fn cycle_response(report: CycleReport) -> Response {
    let (status, body) = match report {
        CycleReport::SkippedMaintenance => (
            StatusCode::OK,
            CycleResponse {
                result: "skippedMaintenance",
                action: None,
                presence: None,
            },
        ),
        CycleReport::Busy => (
            StatusCode::CONFLICT,
            CycleResponse {
                result: "busy",
                action: None,
                presence: None,
            },
        ),
        CycleReport::Completed { action, presence } => (
            StatusCode::OK,
            CycleResponse {
                result: "completed",
                action: Some(action.as_str()),
                presence: Some(presence.as_str()),
            },
        ),
    };
    (status, Json(body)).into_response()
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let tracked_messages = match &state.ledger {
        Some(ledger) => Some(ledger.tracked_count().await),
        None => None,
    };
    Json(HealthResponse {
        status: "ok",
        maintenance: state.scheduler.is_maintenance(),
        status_message_id: state.scheduler.status_message_id().await,
        tracked_messages,
    })
}

async fn refresh(State(state): State<ApiState>, body: Option<Json<RefreshRequest>>) -> Response {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    tracing::info!("Manual status refresh (forceNew: {})", request.force_new);
    cycle_response(state.scheduler.run_cycle(request.force_new).await)
}

async fn maintenance(State(state): State<ApiState>, Json(request): Json<MaintenanceRequest>) -> Response {
    cycle_response(state.scheduler.set_maintenance(request.enabled).await)
}

async fn register_rating(State(state): State<ApiState>, Json(request): Json<RegisterRequest>) -> Response {
    let Some(ledger) = &state.ledger else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Rating is not configured").into_response();
    };

    if request.add_reactions {
        for value in RatingValue::ALL {
            best_effort(
                "Rating reaction",
                state
                    .reactions
                    .add_reaction(&request.channel_id, &request.message_id, value.emoji()),
            )
            .await;
        }
    }

    ledger
        .register(
            &request.message_id,
            &request.item_id,
            request.correlation_id.as_deref(),
        )
        .await;

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "messageId": request.message_id, "itemId": request.item_id })),
    )
        .into_response()
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status/refresh", post(refresh))
        .route("/status/maintenance", post(maintenance))
        .route("/ratings/register", post(register_rating))
        .with_state(state)
}

pub async fn serve(state: ApiState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Control API listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
