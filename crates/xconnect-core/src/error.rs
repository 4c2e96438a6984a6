//! Failure taxonomy shared by every component.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of failure, as reported to callers in JSON error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required local artifact is missing. Fatal, never retried.
    ConfigurationError,
    /// The user's command exited nonzero. Reported as data.
    CommandFailure,
    /// Unregistered executor id or unknown peer alias.
    UnknownTarget,
    /// Registered executor whose last heartbeat is past the liveness window.
    StaleTarget,
    /// Network failure or timeout contacting a resolved target.
    Unreachable,
    /// Missing or empty command, malformed request.
    InvalidInput,
    /// Directory traversal attempt.
    SecurityRejection,
    /// Directory change to a path that does not exist.
    DirectoryNotFound,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::CommandFailure => "command_failure",
            Self::UnknownTarget => "unknown_target",
            Self::StaleTarget => "stale_target",
            Self::Unreachable => "unreachable",
            Self::InvalidInput => "invalid_input",
            Self::SecurityRejection => "security_rejection",
            Self::DirectoryNotFound => "directory_not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
