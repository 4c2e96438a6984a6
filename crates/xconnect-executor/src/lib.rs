//! Environment-carrying shell executor.
//!
//! Provides:
//! - Invocation building and sentinel post-processing
//! - `StatefulExecutor` - runs a command and recovers the resulting environment
//! - `LocalCommand` - the closed set of direct commands and their execution

pub mod command;
pub mod direct;
pub mod process;
pub mod stateful;

pub use command::{ShellInvocation, SplitOutput, split_output};
pub use direct::{DirectCommand, DirectCommandError, DirectOutcome, LocalCommand, ShellCommandKind};
pub use stateful::StatefulExecutor;
