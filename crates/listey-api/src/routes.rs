use std::hash::{Hash, Hasher};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use listey_core::ListNode;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::lists::{ListService, SyncResponse};
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    lists: Arc<ListService>,
    endpoint_rate_limiter: Arc<EndpointRateLimiter>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            lists: Arc::new(ListService::new()),
            endpoint_rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let list_routes = Router::new()
        .route("/users/{user_id}/lists/sync", post(sync_list))
        .route("/users/{user_id}/lists/{list_id}", get(fetch_list));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", list_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.endpoint_rate_limiter.metrics_snapshot(),
    })
}

async fn fetch_list(
    State(state): State<AppState>,
    Path((user_id, list_id)): Path<(String, String)>,
) -> Result<Json<ListNode>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::ListFetch, &user_id)
        .await?;

    let list = state
        .lists
        .fetch(&user_id, &list_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("list {list_id}")))?;
    tracing::info!(
        endpoint = "list_fetch",
        user = %user_tag(&user_id),
        items = list.items.len(),
        "Served stored list"
    );
    Ok(Json(list))
}

async fn sync_list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<ListNode>, JsonRejection>,
) -> Result<Json<SyncResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::ListSync, &user_id)
        .await?;
    let Json(client) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let user = user_tag(&user_id);
    let timeout = state.config.sync_timeout;
    let response = tokio::time::timeout(timeout, state.lists.sync(&user_id, client))
        .await
        .map_err(|_| {
            tracing::warn!(
                endpoint = "list_sync",
                user = %user,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "List sync timed out"
            );
            AppError::timeout("list sync did not finish in time")
        })??;

    tracing::info!(
        endpoint = "list_sync",
        user = %user,
        changed_on_server = response.changed_on_server.len(),
        persisted = response.persisted,
        deleted = response.deleted,
        "Reconciled list"
    );
    Ok(Json(response))
}

/// Stable stand-in for a user id in logs
pub(crate) fn user_tag(user_id: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
