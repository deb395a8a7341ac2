//! HTTP facade over the store
//!
//! A loopback-only JSON API: one route per store operation, no business
//! logic beyond parameter binding and redaction. Writes ensure the
//! session row exists first, so plugin adapters never have to order
//! their calls.

use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{EngramError, Result};
use crate::redact::strip_private_tags;
use crate::storage::{
    add_observation, add_prompt, create_session, end_session, format_context, get_observation,
    recent_sessions, search, search_prompts, stats, timeline, Storage,
};
use crate::types::{AddObservationParams, AddPromptParams, ObservationId, SearchOptions};
use crate::VERSION;

struct ApiError(EngramError);

impl From<EngramError> for ApiError {
    fn from(err: EngramError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            EngramError::NotFound(_) => StatusCode::NOT_FOUND,
            EngramError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult = std::result::Result<Json<serde_json::Value>, ApiError>;

/// Build the API router
pub fn router(storage: Storage) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}/end", post(end_session_handler))
        .route("/sessions/recent", get(recent_sessions_handler))
        .route("/observations", post(add_observation_handler))
        .route("/observations/{id}", get(get_observation_handler))
        .route("/prompts", post(add_prompt_handler))
        .route("/context", get(context_handler))
        .route("/search", get(search_handler))
        .route("/search/prompts", get(search_prompts_handler))
        .route("/timeline/{id}", get(timeline_handler))
        .route("/stats", get(stats_handler))
        .with_state(storage)
}

/// Serve the API on the loopback interface until the process is signaled
pub async fn serve(storage: Storage, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let app = router(storage);

    tracing::info!("HTTP API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "version": VERSION}))
}

#[derive(Deserialize)]
struct CreateSessionBody {
    id: String,
    #[serde(default)]
    project: String,
    #[serde(default)]
    directory: String,
}

async fn create_session_handler(
    State(storage): State<Storage>,
    Json(body): Json<CreateSessionBody>,
) -> ApiResult {
    storage.with_connection(|conn| {
        create_session(conn, &body.id, &body.project, &body.directory)?;
        Ok(())
    })?;
    Ok(Json(json!({"id": body.id})))
}

#[derive(Deserialize)]
struct EndSessionBody {
    #[serde(default)]
    summary: String,
}

async fn end_session_handler(
    State(storage): State<Storage>,
    Path(id): Path<String>,
    Json(body): Json<EndSessionBody>,
) -> ApiResult {
    let summary = strip_private_tags(&body.summary);
    storage.with_connection(|conn| {
        end_session(conn, &id, &summary)?;
        Ok(())
    })?;
    Ok(Json(json!({"id": id, "ended": true})))
}

#[derive(Deserialize)]
struct RecentParams {
    project: Option<String>,
    limit: Option<i64>,
}

async fn recent_sessions_handler(
    State(storage): State<Storage>,
    Query(params): Query<RecentParams>,
) -> ApiResult {
    let sessions = storage.with_connection(|conn| {
        recent_sessions(conn, params.project.as_deref(), params.limit.unwrap_or(0))
    })?;
    Ok(Json(json!({"sessions": sessions})))
}

#[derive(Deserialize)]
struct ObservationBody {
    session_id: String,
    #[serde(rename = "type", default)]
    observation_type: Option<String>,
    title: String,
    content: String,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    project: Option<String>,
}

async fn add_observation_handler(
    State(storage): State<Storage>,
    Json(body): Json<ObservationBody>,
) -> ApiResult {
    let input = AddObservationParams {
        session_id: body.session_id.clone(),
        observation_type: body.observation_type.unwrap_or_else(|| "manual".into()),
        title: strip_private_tags(&body.title),
        content: strip_private_tags(&body.content),
        tool_name: body.tool_name,
        project: body.project.clone(),
    };

    let id = storage.with_connection(|conn| {
        create_session(
            conn,
            &body.session_id,
            body.project.as_deref().unwrap_or(""),
            "",
        )?;
        add_observation(conn, storage.config(), &input)
    })?;
    Ok(Json(json!({"id": id})))
}

#[derive(Deserialize)]
struct PromptBody {
    session_id: String,
    content: String,
    #[serde(default)]
    project: Option<String>,
}

async fn add_prompt_handler(
    State(storage): State<Storage>,
    Json(body): Json<PromptBody>,
) -> ApiResult {
    let input = AddPromptParams {
        session_id: body.session_id.clone(),
        content: strip_private_tags(&body.content),
        project: body.project.clone(),
    };

    let id = storage.with_connection(|conn| {
        create_session(
            conn,
            &body.session_id,
            body.project.as_deref().unwrap_or(""),
            "",
        )?;
        add_prompt(conn, storage.config(), &input)
    })?;
    Ok(Json(json!({"id": id})))
}

#[derive(Deserialize)]
struct ContextParams {
    project: Option<String>,
}

async fn context_handler(
    State(storage): State<Storage>,
    Query(params): Query<ContextParams>,
) -> ApiResult {
    let context = storage.with_connection(|conn| {
        format_context(conn, storage.config(), params.project.as_deref())
    })?;
    Ok(Json(json!({"context": context})))
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(rename = "type")]
    observation_type: Option<String>,
    project: Option<String>,
    limit: Option<i64>,
}

async fn search_handler(
    State(storage): State<Storage>,
    Query(params): Query<SearchParams>,
) -> ApiResult {
    let opts = SearchOptions {
        observation_type: params.observation_type,
        project: params.project,
        limit: params.limit,
    };
    let results =
        storage.with_connection(|conn| search(conn, storage.config(), &params.q, &opts))?;
    Ok(Json(json!({"results": results})))
}

async fn search_prompts_handler(
    State(storage): State<Storage>,
    Query(params): Query<SearchParams>,
) -> ApiResult {
    let results = storage.with_connection(|conn| {
        search_prompts(
            conn,
            &params.q,
            params.project.as_deref(),
            params.limit.unwrap_or(0),
        )
    })?;
    Ok(Json(json!({"results": results})))
}

#[derive(Deserialize)]
struct TimelineParams {
    before: Option<i64>,
    after: Option<i64>,
}

async fn timeline_handler(
    State(storage): State<Storage>,
    Path(id): Path<ObservationId>,
    Query(params): Query<TimelineParams>,
) -> ApiResult {
    let result = storage.with_connection(|conn| {
        timeline(
            conn,
            id,
            params.before.unwrap_or(0),
            params.after.unwrap_or(0),
        )
    })?;
    Ok(Json(json!(result)))
}

async fn get_observation_handler(
    State(storage): State<Storage>,
    Path(id): Path<ObservationId>,
) -> ApiResult {
    let obs = storage.with_connection(|conn| get_observation(conn, id))?;
    Ok(Json(json!(obs)))
}

async fn stats_handler(State(storage): State<Storage>) -> ApiResult {
    let s = storage.with_connection(stats)?;
    Ok(Json(json!(s)))
}
