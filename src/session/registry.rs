//! Tool-call correlation registry
//!
//! Single source of truth mapping an opaque invocation identifier to its
//! declared tool name and input. Two independent channels consult it: the
//! main event stream (to render tool calls and match results) and the
//! post-execution hook side channel (to fire edit interception). The `seen`
//! flag distinguishes the first (streaming) observation of an id from its
//! later full-message replay.

use std::collections::HashMap;

use serde_json::Value;

use crate::protocol::{tool_kind_for, ToolKind};

/// Metadata recorded for one tool invocation identifier.
#[derive(Debug, Clone)]
pub struct ToolUseRecord {
    /// Declared tool name.
    pub name: String,
    /// Tool input as most recently observed.
    pub input: Value,
    /// UI category derived from the name.
    pub kind: ToolKind,
    /// True once the id has been observed a second time via replay.
    pub seen: bool,
    /// True once a completion handler has been registered for the id.
    hook_registered: bool,
}

/// Keyed store correlating invocation identifiers to tool metadata and
/// lifecycle state. Private to one session; never shared across sessions.
#[derive(Debug, Default)]
pub struct ToolCallRegistry {
    records: HashMap<String, ToolUseRecord>,
}

impl ToolCallRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool invocation on first observation. Returns `false` if the
    /// id was already known (the caller should treat the observation as a
    /// replay, not a new call).
    pub fn record(&mut self, id: &str, name: &str, input: Value) -> bool {
        if self.records.contains_key(id) {
            return false;
        }
        self.records.insert(
            id.to_string(),
            ToolUseRecord {
                name: name.to_string(),
                input,
                kind: tool_kind_for(name),
                seen: false,
                hook_registered: false,
            },
        );
        true
    }

    /// Look up the record for an invocation identifier.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&ToolUseRecord> {
        self.records.get(id)
    }

    /// Mark an id as seen via full-message replay, refreshing its input with
    /// the now-complete payload. Returns `false` for unknown ids.
    pub fn mark_seen(&mut self, id: &str, input: Value) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.seen = true;
                record.input = input;
                true
            }
            None => false,
        }
    }

    /// Register the completion handler for an id at most once. Returns
    /// `true` only on the first registration; duplicate attempts (possible
    /// under dual delivery) are ignored.
    pub fn register_hook(&mut self, id: &str) -> bool {
        match self.records.get_mut(id) {
            Some(record) if !record.hook_registered => {
                record.hook_registered = true;
                true
            }
            Some(_) => {
                tracing::debug!(tool_use_id = id, "duplicate hook registration ignored");
                false
            }
            None => false,
        }
    }

    /// Number of recorded invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
