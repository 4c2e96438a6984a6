//! Core abstractions for stateful remote shell sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `EnvironmentSnapshot` - Shell state carried between commands
//! - `ExecutionContext` - Starting state of one command
//! - `Executor` and `ExecutorRegistry` traits
//! - `PeerTable` and node configuration
//! - `ErrorKind` - Failure taxonomy reported to callers

pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod traits;

pub use config::{ConfigError, PeerConfig, PeerTable};
pub use context::ExecutionContext;
pub use env::EnvironmentSnapshot;
pub use error::ErrorKind;
pub use traits::{
    ActiveExecutor, ExecutionOutcome, ExecutionResult, Executor, ExecutorError, ExecutorRecord,
    ExecutorRegistry, RegistryError,
};
