//! Registry endpoints and the dispatcher.
//!
//! - `POST /register` records a heartbeat.
//! - `POST /forward` resolves an executor and proxies a prompt to its
//!   `/execute` endpoint, relaying status and body unchanged.
//! - `GET /list_agents` lists executors inside the liveness window.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use xconnect_core::{ExecutorRegistry, config::parse_address};

use crate::{
    client::ForwardClient,
    error::ApiError,
    protocol::{
        AgentInfo, AgentListing, ForwardRequest, HeartbeatRequest, HeartbeatResponse,
        PromptRequest,
    },
};

/// Broker state shared across handlers.
#[derive(Clone)]
pub struct BrokerState {
    pub registry: Arc<dyn ExecutorRegistry>,
    pub client: ForwardClient,
}

impl BrokerState {
    #[must_use]
    pub fn new(registry: Arc<dyn ExecutorRegistry>, client: ForwardClient) -> Self {
        Self { registry, client }
    }
}

/// Router serving the registry and dispatcher endpoints.
pub fn router(state: BrokerState) -> Router {
    Router::new()
        .route("/register", post(register_handler))
        .route("/forward", post(forward_handler))
        .route("/list_agents", get(list_handler))
        .with_state(state)
}

async fn register_handler(
    State(state): State<BrokerState>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(agent_id), Some(address)) = (
        request.agent_id.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        request
            .agent_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::invalid(
            "Registration requires 'agent_id' and 'agent_address'",
        ));
    };

    parse_address(address)
        .map_err(|reason| ApiError::invalid(format!("Invalid 'agent_address': {reason}")))?;

    state.registry.upsert(agent_id, address).await;
    Ok(Json(HeartbeatResponse::ok(agent_id)))
}

async fn forward_handler(
    State(state): State<BrokerState>,
    payload: Result<Json<ForwardRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let (Some(agent_id), Some(prompt)) = (
        request.agent_id.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        request.prompt.as_deref().filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(ApiError::invalid(
            "Request must include 'agent_id' and 'prompt'",
        ));
    };

    let address = state.registry.resolve(agent_id).await.inspect_err(|e| {
        tracing::warn!(agent_id, error = %e, "Agent unavailable");
    })?;

    tracing::info!(agent_id, address = %address, prompt, "Forwarding prompt to agent");
    let relayed = state
        .client
        .post_json(&address, "/execute", &PromptRequest::new(prompt))
        .await
        .map_err(|source| {
            tracing::warn!(agent_id, error = %source, "Agent unreachable");
            ApiError::Unreachable {
                agent_id: agent_id.to_string(),
                source,
            }
        })?;

    let status =
        StatusCode::from_u16(relayed.status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(relayed.body)).into_response())
}

async fn list_handler(State(state): State<BrokerState>) -> Json<AgentListing> {
    let listing = state
        .registry
        .list_active()
        .await
        .into_iter()
        .map(|agent| {
            (
                agent.id,
                AgentInfo {
                    address: agent.address,
                    last_seen_ago: agent.age.as_secs(),
                },
            )
        })
        .collect();
    Json(listing)
}
