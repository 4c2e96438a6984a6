//! JSON error responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use xconnect_core::{ErrorKind, ExecutorError, RegistryError};
use xconnect_session::SessionError;

use crate::{client::ClientError, protocol::ErrorBody};

/// Error returned by a handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("Could not connect to agent '{agent_id}'")]
    Unreachable {
        agent_id: String,
        #[source]
        source: ClientError,
    },
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Configuration(_) => ErrorKind::ConfigurationError,
            Self::Registry(RegistryError::NotFound(_)) => ErrorKind::UnknownTarget,
            Self::Registry(RegistryError::Stale { .. }) => ErrorKind::StaleTarget,
            Self::Unreachable { .. } => ErrorKind::Unreachable,
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Registry(_) => StatusCode::NOT_FOUND,
            Self::Unreachable {
                source: ClientError::InvalidResponse(_),
                ..
            } => StatusCode::BAD_GATEWAY,
            Self::Unreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(format!("Invalid JSON payload: {}", rejection.body_text()))
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::EmptyPrompt | SessionError::Executor(ExecutorError::EmptyPrompt) => {
                Self::invalid("No prompt provided")
            }
            SessionError::Executor(e @ ExecutorError::ProfileNotFound(_)) => {
                Self::Configuration(e.to_string())
            }
            other => Self::Configuration(format!("Agent execution failed: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            Self::Unreachable { source, .. } => Some(source.to_string()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::invalid("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(RegistryError::NotFound("a".into())).status(),
            StatusCode::NOT_FOUND
        );
        let stale = ApiError::from(RegistryError::Stale {
            id: "a".into(),
            age: Duration::from_secs(120),
        });
        assert_eq!(stale.status(), StatusCode::NOT_FOUND);
        assert_eq!(stale.kind(), ErrorKind::StaleTarget);

        let down = ApiError::Unreachable {
            agent_id: "a".into(),
            source: ClientError::Unreachable("refused".into()),
        };
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.kind(), ErrorKind::Unreachable);
    }

    #[test]
    fn test_session_errors() {
        let err = ApiError::from(SessionError::EmptyPrompt);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = ApiError::from(SessionError::Executor(ExecutorError::EmptyPrompt));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = ApiError::from(SessionError::Executor(ExecutorError::ProfileNotFound(
            "/missing/agentrc".into(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert_eq!(err.to_string(), "Agent profile '/missing/agentrc' not found");
    }
}
