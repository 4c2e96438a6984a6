//! Peer-capable intake with `alias@command` routing.
//!
//! A prompt prefixed with this node's alias runs locally; one prefixed with a
//! known peer's alias is forwarded to that peer exactly once. Forwarded
//! requests are marked so the receiving node never forwards them again.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;
use xconnect_core::{ErrorKind, Executor, PeerConfig, config::is_valid_alias};
use xconnect_session::{LocalOutcome, SessionError, ShellSession};

use crate::{
    client::ForwardClient,
    error::ApiError,
    protocol::{PeerResponse, PromptRequest},
};

/// Peer router state.
pub struct PeerState<E>
where
    E: Executor,
{
    pub session: Arc<ShellSession<E>>,
    pub config: PeerConfig,
    pub client: ForwardClient,
}

impl<E> PeerState<E>
where
    E: Executor,
{
    #[must_use]
    pub fn new(session: Arc<ShellSession<E>>, config: PeerConfig, client: ForwardClient) -> Self {
        Self {
            session,
            config,
            client,
        }
    }
}

/// Router serving `POST /echo`.
pub fn router<E>(state: PeerState<E>) -> Router
where
    E: Executor + 'static,
{
    Router::new()
        .route("/echo", post(echo_handler::<E>))
        .with_state(Arc::new(state))
}

/// Split `alias@rest`, or `None` when the prompt carries no alias prefix.
#[must_use]
pub fn split_alias(prompt: &str) -> Option<(&str, &str)> {
    let (alias, rest) = prompt.trim().split_once('@')?;
    is_valid_alias(alias).then(|| (alias, rest.trim()))
}

async fn echo_handler<E>(
    State(state): State<Arc<PeerState<E>>>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    E: Executor + 'static,
{
    let Json(request) = payload?;
    let prompt = request
        .non_empty_prompt()
        .ok_or_else(|| ApiError::invalid("No prompt provided in JSON payload"))?;

    let Some((alias, rest)) = split_alias(prompt) else {
        return Ok(run_local(&state.session, prompt).await);
    };

    if rest.is_empty() {
        return Ok(p2p_error(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidInput,
            format!("No command given for peer '{alias}'"),
        ));
    }

    if alias == state.config.alias {
        tracing::info!(peer = %alias, command = rest, "Executing locally");
        return Ok(run_local(&state.session, rest).await);
    }

    if request.forwarded {
        tracing::warn!(peer = %alias, "Refusing to forward an already forwarded prompt");
        return Ok(p2p_error(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidInput,
            format!("Multi-hop forwarding is not allowed (peer '{alias}')"),
        ));
    }

    let Some(address) = state.config.peers.get(alias) else {
        tracing::warn!(peer = %alias, "Unknown peer alias");
        return Ok(p2p_error(
            StatusCode::NOT_FOUND,
            ErrorKind::UnknownTarget,
            format!("Unknown peer alias: '{alias}'"),
        ));
    };

    tracing::info!(peer = %alias, address = %address, command = rest, "Forwarding to peer");
    match state
        .client
        .post_json(address.as_str(), "/echo", &PromptRequest::forwarded(rest))
        .await
    {
        Ok(relayed) => {
            let status = StatusCode::from_u16(relayed.status.as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            Ok(relay(status, relayed.body))
        }
        Err(e) => {
            tracing::warn!(peer = %alias, error = %e, "Peer unreachable");
            Ok(p2p_error(
                StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::Unreachable,
                format!("Failed to connect to peer '{alias}': {e}"),
            ))
        }
    }
}

async fn run_local<E>(session: &ShellSession<E>, prompt: &str) -> Response
where
    E: Executor,
{
    let command = prompt.trim();
    match session.run_local(command).await {
        Ok(LocalOutcome::Indirect(text)) => respond(StatusCode::OK, PeerResponse::indirect(&text)),
        Ok(LocalOutcome::ChangedDir(path)) => respond(
            StatusCode::OK,
            PeerResponse::output(
                command,
                format!("Changed directory to: {}", path.display()),
            ),
        ),
        Ok(LocalOutcome::Ran(result)) if result.success() => {
            respond(StatusCode::OK, PeerResponse::output(command, result.stdout))
        }
        Ok(LocalOutcome::Ran(result)) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            PeerResponse::DirectCommandOutput {
                command: command.to_string(),
                output: Some(result.stdout),
                error: Some(result.stderr),
                return_code: Some(result.exit_code),
                kind: Some(ErrorKind::CommandFailure),
            },
        ),
        Err(SessionError::Direct(e)) => {
            let kind = e.kind();
            let status = match kind {
                ErrorKind::SecurityRejection => StatusCode::BAD_REQUEST,
                ErrorKind::DirectoryNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            respond(status, PeerResponse::rejected(command, kind, e.to_string()))
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn respond(status: StatusCode, body: PeerResponse) -> Response {
    (status, Json(body)).into_response()
}

fn relay(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn p2p_error(status: StatusCode, kind: ErrorKind, error: String) -> Response {
    respond(status, PeerResponse::p2p_error(kind, error))
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use xconnect_core::{EnvironmentSnapshot, ExecutionContext, PeerTable};
    use xconnect_executor::StatefulExecutor;
    use xconnect_shell::UnixShell;

    use super::*;

    fn app(dir: &std::path::Path, peers: PeerTable) -> Router {
        let profile = dir.join("agentrc");
        std::fs::write(&profile, "").unwrap();
        let shell = UnixShell::Sh(PathBuf::from("/bin/sh"));
        let session = ShellSession::new(
            StatefulExecutor::new(shell.clone(), profile),
            shell,
            ExecutionContext::new(dir.to_path_buf(), EnvironmentSnapshot::from_process()),
        );
        let config = PeerConfig::new("nodeA", peers).unwrap();
        let client = ForwardClient::new(Duration::from_secs(2)).unwrap();
        router(PeerState::new(Arc::new(session), config, client))
    }

    async fn echo(app: Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post("/echo")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_split_alias() {
        assert_eq!(split_alias("nodeB@pwd"), Some(("nodeB", "pwd")));
        assert_eq!(split_alias(" nodeB@ ls -la "), Some(("nodeB", "ls -la")));
        assert_eq!(split_alias("pwd"), None);
        assert_eq!(split_alias("echo user@host"), None);
        assert_eq!(split_alias("@pwd"), None);
    }

    #[tokio::test]
    async fn test_missing_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = echo(app(dir.path(), PeerTable::new()), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No prompt provided in JSON payload");
    }

    #[tokio::test]
    async fn test_indirect_prompt_is_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = echo(
            app(dir.path(), PeerTable::new()),
            json!({"prompt": "summarize the logs"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "indirect_prompt");
        assert_eq!(body["message"], "Indirect prompt received: summarize the logs");
    }

    #[tokio::test]
    async fn test_own_alias_runs_locally() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = echo(
            app(dir.path(), PeerTable::new()),
            json!({"prompt": "nodeA@echo hi"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "direct_command_output");
        assert_eq!(body["command"], "echo hi");
        assert_eq!(body["output"], "hi");
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = echo(
            app(dir.path(), PeerTable::new()),
            json!({"prompt": "nodeZ@pwd"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "p2p_error");
        assert_eq!(body["kind"], "unknown_target");
        assert_eq!(body["error"], "Unknown peer alias: 'nodeZ'");
    }

    #[tokio::test]
    async fn test_forwarded_prompt_is_not_forwarded_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut peers = PeerTable::new();
        peers.insert("nodeB", "http://127.0.0.1:9").unwrap();
        let (status, body) = echo(
            app(dir.path(), peers),
            json!({"prompt": "nodeB@pwd", "forwarded": true}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "p2p_error");
        assert_eq!(body["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = echo(
            app(dir.path(), PeerTable::new()),
            json!({"prompt": "cd ../etc"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "direct_command_output");
        assert_eq!(body["kind"], "security_rejection");
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = echo(
            app(dir.path(), PeerTable::new()),
            json!({"prompt": "cd nowhere"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "directory_not_found");
    }

    #[tokio::test]
    async fn test_failing_direct_command_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = echo(
            app(dir.path(), PeerTable::new()),
            json!({"prompt": "cat does-not-exist"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "command_failure");
        assert_ne!(body["return_code"], 0);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }
}
