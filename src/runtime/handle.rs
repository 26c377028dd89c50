//! Runtime control surface
//!
//! The trait the session layer drives: pull the next event, push user
//! input, interrupt the current turn, select model and permission mode.
//! The runtime also fires post-execution hooks for built-in tools on a
//! side channel, independent of the main event stream.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::protocol::{PermissionDecision, PermissionMode};

use super::event::RuntimeEvent;

/// A user turn submitted into the runtime's input channel.
///
/// While a turn is in flight, queued follow-ups carry a correlation token;
/// the runtime replays the token on the matching user message when the
/// queued turn becomes active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInput {
    /// The prompt text.
    pub text: String,
    /// Correlation token for queued follow-up turns.
    pub correlation: Option<Uuid>,
}

impl RuntimeInput {
    /// An immediate (non-queued) user turn.
    #[must_use]
    pub const fn new(text: String) -> Self {
        Self {
            text,
            correlation: None,
        }
    }

    /// A queued follow-up turn tagged with a correlation token.
    #[must_use]
    pub const fn queued(text: String, correlation: Uuid) -> Self {
        Self {
            text,
            correlation: Some(correlation),
        }
    }
}

/// Out-of-band callback payload fired after a built-in tool physically
/// executes, independent of the main event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    /// Invocation identifier of the tool that executed.
    pub tool_use_id: String,
    /// Name of the tool that executed.
    pub tool_name: String,
    /// The input the tool executed with.
    pub input: Value,
    /// The tool's response payload.
    pub response: Value,
}

/// Handle to a live runtime turn processor.
///
/// One handle per session; the session layer guarantees a single driver
/// consumes `next_event` at any instant.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Pull the next event, or `None` when the stream has terminated.
    async fn next_event(&self) -> Option<RuntimeEvent>;

    /// Push a user turn into the runtime's input channel. The runtime
    /// accepts queued follow-ups while a turn is executing.
    async fn submit(&self, input: RuntimeInput) -> anyhow::Result<()>;

    /// Answer a pending approval request. The runtime unblocks the tool
    /// invocation named by `tool_use_id` with the given decision.
    async fn resolve_permission(
        &self,
        tool_use_id: &str,
        decision: PermissionDecision,
    ) -> anyhow::Result<()>;

    /// Ask the runtime to interrupt its current turn.
    async fn interrupt(&self) -> anyhow::Result<()>;

    /// Switch the model for subsequent turns.
    async fn set_model(&self, model: &str) -> anyhow::Result<()>;

    /// Switch the runtime's own permission mode.
    async fn set_permission_mode(&self, mode: PermissionMode) -> anyhow::Result<()>;
}
