//! HTTP transport for xconnect nodes.
//!
//! Provides:
//! - Wire protocol (JSON)
//! - Forwarding client and heartbeat emitter
//! - Executor intake, broker and peer routers (feature: server)

pub mod client;
pub mod heartbeat;
pub mod protocol;

#[cfg(feature = "server")]
pub mod agent;

#[cfg(feature = "server")]
pub mod broker;

#[cfg(feature = "server")]
pub mod error;

#[cfg(feature = "server")]
pub mod peer;

pub use client::{ClientError, ForwardClient, Relayed};
pub use heartbeat::HeartbeatEmitter;
pub use protocol::{ExecuteResponse, PeerResponse, PromptRequest};

#[cfg(feature = "server")]
pub use broker::BrokerState;
#[cfg(feature = "server")]
pub use error::ApiError;
#[cfg(feature = "server")]
pub use peer::PeerState;
