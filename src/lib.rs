//! acp-bridge - Session orchestration between an editor client and a coding-agent runtime
//!
//! The bridge translates bidirectionally between a session-oriented client
//! protocol and an agent runtime's internal event stream: it serializes
//! prompt turns per session, reduces the runtime's partially duplicated
//! event stream into ordered client notifications, correlates tool-call
//! lifecycles across two independent channels, gates tool execution behind
//! permission modes, and reroutes on-disk file edits through a
//! client-mediated review path.
//!
//! Wire transport on both sides is out of scope; callers provide the
//! [`Client`] and [`AgentRuntime`] boundaries.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod client;
pub mod error;
pub mod intercept;
pub mod permissions;
pub mod protocol;
pub mod runtime;
pub mod session;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export commonly used types
pub use client::Client;
pub use error::{BridgeError, Result};
pub use intercept::{EditInterceptor, InterceptedEdit};
pub use permissions::{BridgeConfig, PermissionGate};
pub use protocol::{
    PermissionDecision, PermissionMode, PermissionOutcome, PermissionRequest, PromptOutcome,
    SessionUpdate,
};
pub use runtime::{parse_event, AgentRuntime, HookEvent, RuntimeEvent, RuntimeInput};
pub use session::{Session, SessionManager};
