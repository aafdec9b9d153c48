//! Axum HTTP handlers.
//!
//! The webhook boundary is deliberately forgiving: the upstream bot has no
//! retry or backoff awareness, so unparsable and non-donation payloads are
//! acknowledged with 200 all the same.  Only a failed durable write turns
//! into a 500, since the sender must not believe a lost mutation
//! succeeded.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::ingest;
use crate::notify::Notifier;
use crate::parse::LabelPriority;
use crate::store::{AggregateStore, UserTable};

pub struct ApiState {
    pub store: Arc<AggregateStore>,
    pub notifier: Arc<dyn Notifier>,
    pub admin_secret: Option<String>,
    pub label_priority: LabelPriority,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsResponse {
    pub id: String,
    pub this_week: f64,
    pub previous_week: f64,
}

#[derive(Serialize)]
pub struct TopResponse {
    pub top: Vec<UserStatsResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub ok: bool,
    pub previous_week_snapshot: UserTable,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
pub struct TopParams {
    /// Kept as a raw string so garbage input falls back to the default
    /// count instead of a 400 rejection.
    pub n: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /syn-county`
///
/// The inbound donation webhook.  The body is read as a raw string and
/// parsed leniently inside the pipeline.
pub async fn receive_webhook(State(state): State<Arc<ApiState>>, body: String) -> StatusCode {
    match ingest::handle_inbound_payload(
        &state.store,
        state.notifier.as_ref(),
        state.label_priority,
        &body,
    )
    .await
    {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            error!("Failed to process webhook: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /stats/user/:id`
pub async fn user_stats(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let totals = state.store.totals(&id).await;
    Json(UserStatsResponse {
        id,
        this_week: totals.this_week,
        previous_week: totals.previous_week,
    })
}

/// `GET /stats/top?n=10`
pub async fn top_stats(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<TopParams>,
) -> impl IntoResponse {
    let n = params.n.as_deref().and_then(|s| s.parse::<i64>().ok());
    let top = state
        .store
        .top(n)
        .await
        .into_iter()
        .map(|(id, account)| UserStatsResponse {
            id,
            this_week: account.this_week,
            previous_week: account.previous_week,
        })
        .collect();
    Json(TopResponse { top })
}

/// `POST /admin/reset`
///
/// Forced rollover, guarded by the `x-admin-secret` header.  Returns the
/// pre-rollover snapshot.  With no secret configured the route always
/// refuses.
pub async fn admin_reset(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let presented = headers
        .get("x-admin-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !authorized(presented, state.admin_secret.as_deref()) {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Forbidden".to_string(),
            }),
        )
            .into_response();
    }

    match state.store.rollover().await {
        Ok(snapshot) => Json(ResetResponse {
            ok: true,
            previous_week_snapshot: snapshot,
        })
        .into_response(),
        Err(e) => {
            error!("Forced rollover failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn authorized(presented: &str, configured: Option<&str>) -> bool {
    match configured {
        Some(secret) => !secret.is_empty() && presented == secret,
        None => false,
    }
}
