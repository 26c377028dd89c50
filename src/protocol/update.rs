//! Session update notifications
//!
//! The outbound variants the translator produces for the client's
//! `session/update` notification sink. Each update is idempotent from the
//! client's point of view: a tool call is created exactly once and then
//! only ever patched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::permission::PermissionMode;

/// Terminal outcome of one prompt call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOutcome {
    /// The turn ran to completion and the runtime ended it normally.
    EndTurn,
    /// The runtime stopped because it hit its turn limit.
    MaxTurns,
    /// The session was cancelled before or during this prompt's turn.
    Cancelled,
}

/// UI category for a tool call, used by clients to pick an icon and layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Reads file or directory contents.
    Read,
    /// Mutates files in the workspace.
    Edit,
    /// Searches file contents or paths.
    Search,
    /// Executes a command.
    Execute,
    /// Pure reasoning, no side effects.
    Think,
    /// Talks to the network.
    Fetch,
    /// Switches the session's permission mode.
    SwitchMode,
    /// Anything else, including extension tools.
    Other,
}

/// Lifecycle state of a tool call as shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Observed but not yet authorized or running.
    Pending,
    /// Authorized and executing.
    InProgress,
    /// Finished without a tool-level error.
    Completed,
    /// Finished with an error reported by the tool.
    Failed,
}

/// Rich content attached to a tool call update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallContent {
    /// Plain output text.
    Text {
        /// The output text.
        text: String,
    },
    /// A reviewable file diff produced by edit interception.
    Diff {
        /// Absolute path of the edited file.
        path: String,
        /// Content before the edit, when known.
        old_text: Option<String>,
        /// Content after the edit.
        new_text: String,
    },
}

/// A newly created tool call (first observation of its invocation id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallView {
    /// Opaque invocation identifier from the runtime.
    pub id: String,
    /// Human-readable title (tool name, possibly decorated).
    pub title: String,
    /// UI category.
    pub kind: ToolKind,
    /// Initial lifecycle status.
    pub status: ToolCallStatus,
    /// Raw tool input as first observed (may be partial for streamed calls).
    pub raw_input: Value,
    /// Terminal handle for interactive command tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
}

/// A patch to an already-created tool call. Only populated fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallPatch {
    /// Invocation identifier of the tool call being patched.
    pub id: String,
    /// New lifecycle status, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    /// Complete input, available once the full-message replay arrives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    /// Result or diff content to attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ToolCallContent>>,
}

/// Priority of a plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPriority {
    /// Must happen for the turn to succeed.
    High,
    /// Default priority.
    Medium,
    /// Nice to have.
    Low,
}

/// Status of a plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryStatus {
    /// Not started.
    Pending,
    /// Currently being worked on.
    InProgress,
    /// Done.
    Completed,
}

/// One entry of the agent's structured plan/checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// What this step does, in the agent's words.
    pub content: String,
    /// Priority bucket.
    pub priority: PlanPriority,
    /// Current status.
    pub status: PlanEntryStatus,
}

/// Token usage snapshot emitted after usage-bearing runtime events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageUpdate {
    /// Input tokens consumed so far in this prompt call.
    pub input_tokens: u64,
    /// Output tokens produced so far in this prompt call.
    pub output_tokens: u64,
    /// Tokens served from prompt cache.
    pub cache_read_tokens: u64,
    /// Tokens written to prompt cache.
    pub cache_write_tokens: u64,
    /// Estimated context window of the most constrained model used.
    pub context_window: u64,
}

/// A slash command the runtime makes available to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableCommand {
    /// Command name without the leading slash.
    pub name: String,
    /// One-line description for the client's command palette.
    pub description: String,
}

/// One outbound notification for the client's session update sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// Incremental assistant text.
    AgentMessageChunk {
        /// The text fragment.
        text: String,
    },
    /// Incremental assistant reasoning text.
    AgentThoughtChunk {
        /// The reasoning fragment.
        text: String,
    },
    /// A tool call was observed for the first time.
    ToolCall(ToolCallView),
    /// An already-created tool call changed (refined input, status, content).
    ToolCallUpdate(ToolCallPatch),
    /// The agent published or revised its plan.
    Plan {
        /// Ordered plan entries.
        entries: Vec<PlanEntry>,
    },
    /// Accumulated token usage changed.
    Usage(UsageUpdate),
    /// The session's permission mode changed.
    CurrentModeUpdate {
        /// The mode now in effect.
        mode: PermissionMode,
    },
    /// The runtime announced its available slash commands.
    AvailableCommandsUpdate {
        /// Commands the client may offer.
        commands: Vec<AvailableCommand>,
    },
}

/// Map a built-in tool name to its UI category.
///
/// Unrecognized names (extension and server-side tools) fall back to
/// [`ToolKind::Other`].
#[must_use]
pub fn tool_kind_for(name: &str) -> ToolKind {
    match name {
        "Read" | "Glob" | "LS" | "NotebookRead" => ToolKind::Read,
        "Edit" | "Write" | "MultiEdit" | "NotebookEdit" => ToolKind::Edit,
        "Grep" | "WebSearch" => ToolKind::Search,
        "Bash" | "KillShell" => ToolKind::Execute,
        "TodoWrite" | "Task" => ToolKind::Think,
        "WebFetch" => ToolKind::Fetch,
        "ExitPlanMode" => ToolKind::SwitchMode,
        _ => ToolKind::Other,
    }
}

/// Whether a tool mutates workspace files (the edit class used by the
/// `acceptEdits` permission mode and the edit interceptor).
#[must_use]
pub fn is_edit_tool(name: &str) -> bool {
    matches!(tool_kind_for(name), ToolKind::Edit)
}
