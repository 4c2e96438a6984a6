//! Shell detection and invocation helpers.
//!
//! Provides:
//! - `UnixShell` - Detected shell flavour with its script prelude
//! - Shell and executable resolution

pub mod shell;

pub use shell::{ShellError, UnixShell, resolve_executable_path, resolve_shell};
