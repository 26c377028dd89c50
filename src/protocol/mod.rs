//! Client-facing protocol vocabulary
//!
//! Types produced by the bridge and consumed by the client-protocol layer:
//! session update notifications, tool-call views, plan entries, permission
//! modes, and permission round-trip payloads. Wire framing is out of scope;
//! everything here is plain serde-serializable data.

pub mod permission;
pub mod update;

pub use permission::{PermissionDecision, PermissionMode, PermissionOutcome, PermissionRequest};
pub use update::{
    is_edit_tool, tool_kind_for, AvailableCommand, PlanEntry, PlanEntryStatus, PlanPriority,
    PromptOutcome, SessionUpdate, ToolCallContent, ToolCallPatch, ToolCallStatus, ToolCallView,
    ToolKind, UsageUpdate,
};
