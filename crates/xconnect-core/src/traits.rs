//! Core traits for execution and executor registration.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::{EnvironmentSnapshot, ExecutionContext};

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Command output, trimmed of surrounding whitespace.
    pub stdout: String,
    /// Captured standard error, trimmed.
    pub stderr: String,
    /// Exit status of the user's command. `-1` when killed by a signal.
    pub exit_code: i32,
}

impl ExecutionResult {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// What an executor hands back: the result plus the environment the command
/// left behind.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub result: ExecutionResult,
    /// Resulting environment, or `None` when the shell exited before the
    /// dump step ran.
    pub snapshot: Option<EnvironmentSnapshot>,
}

/// Executor error.
///
/// A failing user command is not an executor error; it is reported in the
/// [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Agent profile '{}' not found", .0.display())]
    ProfileNotFound(PathBuf),
    #[error("No prompt provided")]
    EmptyPrompt,
    #[error("Failed to run shell: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for shell executors.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `prompt` starting from `ctx` and recover the resulting environment.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        prompt: &str,
    ) -> Result<ExecutionOutcome, ExecutorError>;
}

/// Registry entry for one executor.
#[derive(Debug, Clone)]
pub struct ExecutorRecord {
    pub id: String,
    pub address: String,
    pub last_seen: Instant,
}

impl ExecutorRecord {
    /// Time since the last heartbeat.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.last_seen.elapsed()
    }
}

/// Executor that passed the freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveExecutor {
    pub id: String,
    pub address: String,
    pub age: Duration,
}

/// Registry lookup error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Agent '{0}' not found or is offline.")]
    NotFound(String),
    #[error("Agent '{id}' is stale. Last seen {}s ago.", .age.as_secs())]
    Stale { id: String, age: Duration },
}

/// Trait for heartbeat-based executor registries.
///
/// Staleness is a read-time filter: entries are never evicted, only hidden
/// from [`resolve`](Self::resolve) and [`list_active`](Self::list_active)
/// once their last heartbeat is older than the liveness window.
#[async_trait]
pub trait ExecutorRegistry: Send + Sync {
    /// Record a heartbeat for `id`, overwriting any previous entry.
    async fn upsert(&self, id: &str, address: &str);

    /// Address of a live executor.
    async fn resolve(&self, id: &str) -> Result<String, RegistryError>;

    /// All live executors, ordered by id.
    async fn list_active(&self) -> Vec<ActiveExecutor>;
}
