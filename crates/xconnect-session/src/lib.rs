//! Session state and executor registry for xconnect nodes.
//!
//! Provides:
//! - `ShellSession` - The adapter's current environment and working directory
//! - Registry implementations (memory)

pub mod manager;
pub mod storage;

pub use manager::{LocalOutcome, SessionError, ShellSession};
