//! Permission modes and round-trip payloads
//!
//! The finite mode set governing tool authorization, plus the request and
//! outcome types exchanged with the client when a decision cannot be
//! short-circuited by the current mode.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default behavior for tool authorization within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask the client for every decision not covered by a stored rule.
    Default,
    /// Auto-allow edit-class tools; ask for everything else.
    AcceptEdits,
    /// Auto-allow everything. Only available when the startup configuration
    /// explicitly enables it.
    BypassPermissions,
    /// Deny anything not pre-approved instead of asking.
    DontAsk,
    /// No tool execution; the exit-plan tool triggers a mode transition.
    Plan,
}

impl PermissionMode {
    /// All modes, in the order clients should present them.
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::AcceptEdits,
        Self::BypassPermissions,
        Self::DontAsk,
        Self::Plan,
    ];

    /// The wire identifier of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::DontAsk => "dontAsk",
            Self::Plan => "plan",
        }
    }

    /// Parse a wire identifier. Returns `None` for unknown mode ids so the
    /// caller can surface a not-found rejection.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
    }
}

/// A permission question escalated to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// Session the tool call belongs to.
    pub session_id: Uuid,
    /// Invocation identifier of the tool call awaiting authorization.
    pub tool_call_id: String,
    /// Name of the tool requesting execution.
    pub tool_name: String,
    /// The tool's proposed input.
    pub input: Value,
}

/// The client's answer to a [`PermissionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    /// Allow this invocation only.
    AllowOnce {
        /// Replacement input, when the user amended it before approving.
        #[serde(skip_serializing_if = "Option::is_none")]
        updated_input: Option<Value>,
    },
    /// Allow this invocation and persist a session-scoped rule for the tool.
    AllowAlways {
        /// Replacement input, when the user amended it before approving.
        #[serde(skip_serializing_if = "Option::is_none")]
        updated_input: Option<Value>,
    },
    /// Reject this invocation.
    Reject,
    /// The round-trip was cancelled before the user answered.
    Aborted,
}

impl PermissionOutcome {
    /// A plain allow-once answer with the input unchanged.
    #[must_use]
    pub const fn allow_once() -> Self {
        Self::AllowOnce {
            updated_input: None,
        }
    }

    /// A plain allow-always answer with the input unchanged.
    #[must_use]
    pub const fn allow_always() -> Self {
        Self::AllowAlways {
            updated_input: None,
        }
    }
}

/// The gate's resolution of a tool authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// Execute the tool, optionally with rewritten input.
    Allow {
        /// Replacement input, when the decision modified it.
        updated_input: Option<Value>,
    },
    /// Do not execute the tool.
    Deny {
        /// True when denial came from cancellation rather than an explicit
        /// rejection; callers treat both as denial but may report them
        /// differently.
        interrupted: bool,
    },
}
