//! Executor command intake.
//!
//! Wraps a [`ShellSession`] behind `POST /execute`. The session holds the
//! current environment snapshot and threads it through consecutive requests.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use xconnect_core::Executor;
use xconnect_session::ShellSession;

use crate::{
    error::ApiError,
    protocol::{ExecuteResponse, PromptRequest},
};

/// Router serving `POST /execute`.
pub fn router<E>(session: Arc<ShellSession<E>>) -> Router
where
    E: Executor + 'static,
{
    Router::new()
        .route("/execute", post(execute_handler::<E>))
        .with_state(session)
}

async fn execute_handler<E>(
    State(session): State<Arc<ShellSession<E>>>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, ApiError>
where
    E: Executor + 'static,
{
    let Json(request) = payload?;
    let prompt = request
        .non_empty_prompt()
        .ok_or_else(|| ApiError::invalid("No prompt provided"))?;

    tracing::info!(prompt, "Agent received prompt");
    let result = session.execute(prompt).await?;
    Ok(Json(result.into()))
}
