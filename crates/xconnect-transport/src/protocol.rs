//! Wire protocol for the HTTP endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xconnect_core::{ErrorKind, ExecutionResult};

/// Body of `POST /execute` and `POST /echo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Set by a peer that already spent the single forwarding hop.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forwarded: bool,
}

impl PromptRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            forwarded: false,
        }
    }

    #[must_use]
    pub fn forwarded(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            forwarded: true,
        }
    }

    /// The prompt, if present and not blank.
    #[must_use]
    pub fn non_empty_prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Response of `POST /execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub output: String,
    pub error: String,
    pub return_code: i32,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            output: result.stdout,
            error: result.stderr,
            return_code: result.exit_code,
        }
    }
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_address: Option<String>,
}

/// Response of `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: String,
    pub message: String,
}

impl HeartbeatResponse {
    #[must_use]
    pub fn ok(agent_id: &str) -> Self {
        Self {
            status: "ok".to_string(),
            message: format!("Agent '{agent_id}' registered/updated."),
        }
    }
}

/// Body of `POST /forward`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// One entry of `GET /list_agents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub address: String,
    /// Whole seconds since the last heartbeat.
    pub last_seen_ago: u64,
}

/// Response of `GET /list_agents`: live agents keyed by id.
pub type AgentListing = BTreeMap<String, AgentInfo>;

/// JSON error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Response of the peer-capable intake `POST /echo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerResponse {
    /// A direct command ran, or was rejected.
    DirectCommandOutput {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<ErrorKind>,
    },
    /// Input outside the direct command set, echoed back.
    IndirectPrompt { message: String },
    /// Routing failure.
    P2pError { error: String, kind: ErrorKind },
}

impl PeerResponse {
    #[must_use]
    pub fn indirect(prompt: &str) -> Self {
        Self::IndirectPrompt {
            message: format!("Indirect prompt received: {prompt}"),
        }
    }

    #[must_use]
    pub fn p2p_error(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self::P2pError {
            error: error.into(),
            kind,
        }
    }

    #[must_use]
    pub fn output(command: &str, output: impl Into<String>) -> Self {
        Self::DirectCommandOutput {
            command: command.to_string(),
            output: Some(output.into()),
            error: None,
            return_code: None,
            kind: None,
        }
    }

    #[must_use]
    pub fn rejected(command: &str, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self::DirectCommandOutput {
            command: command.to_string(),
            output: None,
            error: Some(error.into()),
            return_code: None,
            kind: Some(kind),
        }
    }
}
