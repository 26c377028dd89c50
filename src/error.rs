//! Error taxonomy for the bridge core
//!
//! Every failure surfaced to a caller is one of these variants, so the
//! transport layer can map them to distinct client-visible error codes
//! (`SessionNotFound` → not-found, `AuthRequired` → login flow, and so on).
//! A single session's failure is never fatal to the process.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by session orchestration, translation, and gating.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The caller referenced a session id that was never created or has
    /// already been torn down.
    #[error("unknown session '{0}'")]
    SessionNotFound(Uuid),

    /// The caller referenced a session option (model, mode, ...) this
    /// bridge does not know about.
    #[error("unknown session option '{option}': no such {kind}")]
    UnknownOption {
        /// The option value the caller sent.
        option: String,
        /// What kind of option was being set ("model", "mode", ...).
        kind: &'static str,
    },

    /// A terminal runtime event reported success but its content indicates
    /// the runtime is not authenticated. Distinguished from [`Self::Internal`]
    /// so clients can trigger a login flow.
    #[error("agent runtime requires authentication: {0}")]
    AuthRequired(String),

    /// A permission round-trip was cancelled or rejected mid-flight. Fails
    /// the tool invocation, not the whole turn.
    #[error("tool use aborted for '{tool_name}'")]
    ToolUseAborted {
        /// Name of the tool whose authorization was aborted.
        tool_name: String,
    },

    /// A terminal runtime event was flagged as an error without a more
    /// specific classification. Carries the runtime's diagnostic text.
    #[error("agent runtime error: {0}")]
    Internal(String),

    /// A client round-trip (notification, permission, file read/write)
    /// failed. The client-protocol layer is out of scope, so its errors are
    /// opaque.
    #[error("client request failed: {0}")]
    Client(#[source] anyhow::Error),

    /// Submitting input to or interrupting the runtime failed.
    #[error("runtime request failed: {0}")]
    Runtime(#[source] anyhow::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Wrap a client-boundary failure.
    #[must_use]
    pub fn client(source: anyhow::Error) -> Self {
        Self::Client(source)
    }

    /// Wrap a runtime-boundary failure.
    #[must_use]
    pub fn runtime(source: anyhow::Error) -> Self {
        Self::Runtime(source)
    }

    /// Build an unknown-option rejection for a given option kind.
    #[must_use]
    pub fn unknown_option(option: impl Into<String>, kind: &'static str) -> Self {
        Self::UnknownOption {
            option: option.into(),
            kind,
        }
    }
}
