//! HTTP surface of the coordinator.
//!
//! Route and header names follow the conventional coordinator wire
//! contract: LRAs are started with `POST /lra-coordinator/start` and a
//! participant enlists by `PUT`ting its callback links to the LRA URI.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use lra_common::{ClientId, LraError, LraId, RecoveryToken};
use lra_protocol::{endpoints_from_link_header, JoinRequest, LRA_CONTEXT_HEADER, LRA_RECOVERY_HEADER};

use crate::coordinator::Coordinator;
use crate::recovery::RecoveryEngine;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Coordinator>,
    recovery: Arc<RecoveryEngine>,
    /// External base URL under which LRA URIs are minted.
    base_url: String,
}

/// Build the coordinator router.
pub fn router(
    coordinator: Arc<Coordinator>,
    recovery: Arc<RecoveryEngine>,
    base_url: String,
) -> Router {
    let state = AppState {
        coordinator,
        recovery,
        base_url,
    };

    Router::new()
        .route("/lra-coordinator/", get(list_lras))
        .route("/lra-coordinator/start", post(start_lra))
        .route("/lra-coordinator/recovery", get(trigger_recovery))
        .route("/lra-coordinator/{lra_id}", get(get_lra).put(join_lra))
        .route("/lra-coordinator/{lra_id}/close", put(close_lra))
        .route("/lra-coordinator/{lra_id}/cancel", put(cancel_lra))
        .route("/lra-coordinator/{lra_id}/status", get(lra_status))
        .route("/lra-coordinator/{lra_id}/remove", put(leave_lra))
        .route("/lra-coordinator/{lra_id}/renew", put(renew_deadline))
        .route("/lra-coordinator/{lra_id}/{token}", put(update_participant))
        .with_state(state)
}

/// Caller-facing error wrapper mapping typed errors onto status codes.
struct ApiError(LraError);

impl From<LraError> for ApiError {
    fn from(e: LraError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LraError::NotFound(_) | LraError::ParticipantNotFound { .. } => StatusCode::NOT_FOUND,
            LraError::PreconditionFailed { .. }
            | LraError::InvalidLraTransition(_)
            | LraError::InvalidParticipantTransition(_) => StatusCode::PRECONDITION_FAILED,
            LraError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        debug!(code = self.0.error_code(), error = %self.0, "request rejected");
        let body = Json(json!({
            "code": self.0.error_code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

fn parse_lra_id(raw: &str) -> Result<LraId, ApiError> {
    LraId::parse(raw)
        .map_err(|_| LraError::InvalidInput(format!("malformed LRA id: {raw}")).into())
}

fn parse_token(raw: &str) -> Result<RecoveryToken, ApiError> {
    RecoveryToken::parse(raw)
        .map_err(|_| LraError::InvalidInput(format!("malformed recovery token: {raw}")).into())
}

#[derive(Debug, Deserialize)]
struct StartParams {
    #[serde(rename = "ClientID")]
    client_id: Option<String>,
    #[serde(rename = "TimeLimit")]
    time_limit: Option<u64>,
    #[serde(rename = "ParentLRA")]
    parent_lra: Option<String>,
}

async fn start_lra(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
) -> Result<Response, ApiError> {
    let parent = params
        .parent_lra
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_lra_id)
        .transpose()?;
    let client_id = ClientId::new(params.client_id.unwrap_or_default());

    let id = state
        .coordinator
        .start(parent, client_id, params.time_limit.unwrap_or(0))?;
    let uri = id.to_uri(&state.base_url);

    Ok((
        StatusCode::CREATED,
        [(LRA_CONTEXT_HEADER, uri.clone())],
        uri,
    )
        .into_response())
}

async fn list_lras(State(state): State<AppState>) -> Response {
    Json(state.coordinator.registry().snapshot()).into_response()
}

async fn get_lra(
    State(state): State<AppState>,
    Path(lra_id): Path<String>,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;
    let lra = state.coordinator.registry().get(&lra_id)?;
    Ok(Json(lra).into_response())
}

async fn lra_status(
    State(state): State<AppState>,
    Path(lra_id): Path<String>,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;
    let status = state.coordinator.status(lra_id)?;
    Ok(status.to_string().into_response())
}

async fn close_lra(
    State(state): State<AppState>,
    Path(lra_id): Path<String>,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;
    let status = state.coordinator.close(lra_id).await?;
    Ok(status.to_string().into_response())
}

async fn cancel_lra(
    State(state): State<AppState>,
    Path(lra_id): Path<String>,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;
    let status = state.coordinator.cancel(lra_id).await?;
    Ok(status.to_string().into_response())
}

/// Enlist a participant. Callback addresses arrive either as a `Link`
/// header or as a JSON body; any non-JSON body alongside a `Link` header
/// is kept as opaque user data.
async fn join_lra(
    State(state): State<AppState>,
    Path(lra_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;

    let (endpoints, time_limit_ms, user_data) = if let Some(link) = headers.get(header::LINK) {
        let link = link
            .to_str()
            .map_err(|_| LraError::InvalidInput("non-ASCII Link header".to_string()))?;
        let endpoints = endpoints_from_link_header(link)
            .map_err(|e| LraError::InvalidInput(e.to_string()))?;
        let user_data = (!body.is_empty()).then(|| body.to_vec());
        (endpoints, None, user_data)
    } else {
        let request: JoinRequest = serde_json::from_slice(&body)
            .map_err(|e| LraError::InvalidInput(format!("malformed join body: {e}")))?;
        let time_limit_ms = request.compensate_time_limit_ms;
        let user_data = request.user_data.clone().map(String::into_bytes);
        let endpoints = request
            .into_endpoints()
            .map_err(|e| LraError::InvalidInput(e.to_string()))?;
        (endpoints, time_limit_ms, user_data)
    };

    let compensate_time_limit =
        time_limit_ms.and_then(lra_common::time::deadline_from_millis);
    let token = state
        .coordinator
        .join(lra_id, endpoints, compensate_time_limit, user_data)?;

    let recovery_url = format!(
        "{}/{}/{}",
        state.base_url.trim_end_matches('/'),
        lra_id,
        token
    );
    Ok((
        StatusCode::OK,
        [(LRA_RECOVERY_HEADER, recovery_url.clone())],
        recovery_url,
    )
        .into_response())
}

/// Replace an enlistment's callback addresses.
async fn update_participant(
    State(state): State<AppState>,
    Path((lra_id, token)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;
    let token = parse_token(&token)?;

    let endpoints = if let Some(link) = headers.get(header::LINK) {
        let link = link
            .to_str()
            .map_err(|_| LraError::InvalidInput("non-ASCII Link header".to_string()))?;
        endpoints_from_link_header(link).map_err(|e| LraError::InvalidInput(e.to_string()))?
    } else {
        let request: JoinRequest = serde_json::from_slice(&body)
            .map_err(|e| LraError::InvalidInput(format!("malformed join body: {e}")))?;
        request
            .into_endpoints()
            .map_err(|e| LraError::InvalidInput(e.to_string()))?
    };

    state.coordinator.update_participant(lra_id, token, endpoints)?;

    let recovery_url = format!(
        "{}/{}/{}",
        state.base_url.trim_end_matches('/'),
        lra_id,
        token
    );
    Ok(recovery_url.into_response())
}

/// Deregister a participant. The recovery token arrives in the recovery
/// header or, failing that, as the request body.
async fn leave_lra(
    State(state): State<AppState>,
    Path(lra_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;

    let raw = match headers.get(LRA_RECOVERY_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| LraError::InvalidInput("non-ASCII recovery header".to_string()))?
            .to_string(),
        None => String::from_utf8(body.to_vec())
            .map_err(|_| LraError::InvalidInput("non-UTF-8 leave body".to_string()))?,
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LraError::InvalidInput("missing recovery token".to_string()).into());
    }
    let token = parse_token(raw)?;

    state.coordinator.leave(lra_id, token)?;
    Ok(StatusCode::OK.into_response())
}

#[derive(Debug, Deserialize)]
struct RenewParams {
    #[serde(rename = "TimeLimit")]
    time_limit: Option<u64>,
}

async fn renew_deadline(
    State(state): State<AppState>,
    Path(lra_id): Path<String>,
    Query(params): Query<RenewParams>,
) -> Result<Response, ApiError> {
    let lra_id = parse_lra_id(&lra_id)?;
    state
        .coordinator
        .renew_deadline(lra_id, params.time_limit.unwrap_or(0))?;
    Ok(StatusCode::OK.into_response())
}

async fn trigger_recovery(State(state): State<AppState>) -> Response {
    let stats = state.recovery.run_sweep().await;
    Json(stats).into_response()
}
