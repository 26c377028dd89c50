//! Streaming event translator
//!
//! Reduces the runtime's heterogeneous event stream into ordered client
//! notifications. Two delivery shapes carry the same logical content: the
//! streaming path (block starts and deltas) is authoritative for live
//! rendering, and the later full-message replay is a refinement. The
//! translator keeps a per-session [`ToolCallRegistry`] so a tool invocation
//! observed twice yields exactly one creation followed by at most one
//! refinement, and so results can be matched back to their calls.

use serde_json::Value;
use uuid::Uuid;

use crate::protocol::{
    PlanEntry, PlanEntryStatus, PlanPriority, SessionUpdate, ToolCallContent, ToolCallPatch,
    ToolCallStatus, ToolCallView,
};
use crate::runtime::{ContentBlock, RuntimeEvent, TurnResult};

use super::registry::ToolCallRegistry;
use super::usage::AccumulatedUsage;

/// The structured plan/checklist tool, projected into plan notifications.
pub const PLAN_TOOL: &str = "TodoWrite";

/// The interactive command tool that gets a companion terminal handle.
pub const TERMINAL_TOOL: &str = "Bash";

/// Everything the drive loop needs from translating one event.
#[derive(Debug, Default)]
pub struct Translated {
    /// Ordered notifications for the client.
    pub updates: Vec<SessionUpdate>,
    /// Correlation token of a queued prompt the runtime just replayed as
    /// the active turn's user message.
    pub replayed_correlation: Option<Uuid>,
    /// Terminal result of the turn, when this event carried one.
    pub terminal: Option<TurnResult>,
}

/// Per-session translation state: the tool-call registry plus one-shot
/// session bookkeeping (commands announcement).
#[derive(Debug, Default)]
pub struct Translator {
    registry: ToolCallRegistry,
    commands_announced: bool,
}

impl Translator {
    /// Create a translator with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The tool-call registry, shared with the hook bridge.
    pub fn registry_mut(&mut self) -> &mut ToolCallRegistry {
        &mut self.registry
    }

    /// Read access to the registry.
    #[must_use]
    pub const fn registry(&self) -> &ToolCallRegistry {
        &self.registry
    }

    /// Translate one runtime event into zero or more client notifications.
    ///
    /// Events carrying a foreign task correlation marker (background or
    /// subagent turns) are drained: the registry still records their tool
    /// calls so hook events can be matched, but no notifications surface.
    pub fn translate(&mut self, event: &RuntimeEvent, usage: &mut AccumulatedUsage) -> Translated {
        let mut out = Translated::default();

        if let Some(parent_id) = event.parent_id() {
            self.drain_background(event, parent_id);
            return out;
        }

        match event {
            RuntimeEvent::Init { commands, .. } => {
                if !self.commands_announced && !commands.is_empty() {
                    self.commands_announced = true;
                    out.updates.push(SessionUpdate::AvailableCommandsUpdate {
                        commands: commands.clone(),
                    });
                }
            }
            RuntimeEvent::TextDelta { text, .. } => {
                out.updates
                    .push(SessionUpdate::AgentMessageChunk { text: text.clone() });
            }
            RuntimeEvent::ThoughtDelta { text, .. } => {
                out.updates
                    .push(SessionUpdate::AgentThoughtChunk { text: text.clone() });
            }
            RuntimeEvent::BlockStart { block, .. } => {
                self.translate_block_start(block, &mut out);
            }
            RuntimeEvent::AssistantReplay { blocks, .. } => {
                for block in blocks {
                    self.translate_replayed_block(block, &mut out);
                }
            }
            RuntimeEvent::UserReplay {
                correlation,
                blocks,
                ..
            } => {
                out.replayed_correlation = *correlation;
                for block in blocks {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        is_error,
                        content,
                    } = block
                    {
                        self.translate_tool_result(tool_use_id, *is_error, content, &mut out);
                    }
                }
            }
            // Approval requests are answered by the drive loop, not surfaced
            // as session updates.
            RuntimeEvent::ApprovalRequest { .. } => {}
            RuntimeEvent::Result(result) => {
                usage.add_turn(&result.usage);
                out.updates.push(SessionUpdate::Usage(usage.snapshot()));
                out.terminal = Some(result.clone());
            }
            RuntimeEvent::Unknown { event_type } => {
                tracing::warn!(event_type, "dropping unrecognized runtime event");
                debug_assert!(false, "unrecognized runtime event type: {event_type}");
            }
        }

        out
    }

    /// Streaming-path first observation of a content block.
    fn translate_block_start(&mut self, block: &ContentBlock, out: &mut Translated) {
        match block {
            ContentBlock::Text { text } => {
                if !text.is_empty() {
                    out.updates
                        .push(SessionUpdate::AgentMessageChunk { text: text.clone() });
                }
            }
            ContentBlock::Thinking { text } => {
                if !text.is_empty() {
                    out.updates
                        .push(SessionUpdate::AgentThoughtChunk { text: text.clone() });
                }
            }
            ContentBlock::ToolUse { id, name, input } => {
                if self.registry.record(id, name, input.clone()) {
                    self.emit_tool_call_created(id, name, input, out);
                }
            }
            // Tool results never arrive on the streaming path.
            ContentBlock::ToolResult { .. } => {}
        }
    }

    /// Full-message replay of a block already delivered via streaming.
    /// Text and thinking are suppressed; tool uses become refinements.
    fn translate_replayed_block(&mut self, block: &ContentBlock, out: &mut Translated) {
        match block {
            ContentBlock::Text { .. } | ContentBlock::Thinking { .. } => {}
            ContentBlock::ToolUse { id, name, input } => {
                if self.registry.lookup(id).is_some() {
                    self.registry.mark_seen(id, input.clone());
                    if name == PLAN_TOOL {
                        if let Some(entries) = project_plan(input) {
                            out.updates.push(SessionUpdate::Plan { entries });
                        }
                        return;
                    }
                    out.updates.push(SessionUpdate::ToolCallUpdate(ToolCallPatch {
                        id: id.clone(),
                        raw_input: Some(input.clone()),
                        ..Default::default()
                    }));
                } else {
                    // The streaming delivery was lost; treat the replay as
                    // the first observation.
                    self.registry.record(id, name, input.clone());
                    self.emit_tool_call_created(id, name, input, out);
                }
            }
            ContentBlock::ToolResult {
                tool_use_id,
                is_error,
                content,
            } => {
                self.translate_tool_result(tool_use_id, *is_error, content, out);
            }
        }
    }

    fn emit_tool_call_created(&self, id: &str, name: &str, input: &Value, out: &mut Translated) {
        if name == PLAN_TOOL {
            if let Some(entries) = project_plan(input) {
                out.updates.push(SessionUpdate::Plan { entries });
            }
            return;
        }

        let terminal_id = (name == TERMINAL_TOOL).then(|| format!("terminal:{id}"));
        out.updates.push(SessionUpdate::ToolCall(ToolCallView {
            id: id.to_string(),
            title: name.to_string(),
            kind: crate::protocol::tool_kind_for(name),
            status: ToolCallStatus::Pending,
            raw_input: input.clone(),
            terminal_id,
        }));
    }

    fn translate_tool_result(
        &mut self,
        tool_use_id: &str,
        is_error: bool,
        content: &Value,
        out: &mut Translated,
    ) {
        let Some(record) = self.registry.lookup(tool_use_id) else {
            tracing::warn!(tool_use_id, "dropping result for unobserved tool call");
            return;
        };

        let status = if is_error {
            ToolCallStatus::Failed
        } else {
            ToolCallStatus::Completed
        };
        let text = result_text(content);

        if record.name == TERMINAL_TOOL && !text.is_empty() {
            // Command output streams as its own update so clients can show
            // it before the completion status lands.
            out.updates.push(SessionUpdate::ToolCallUpdate(ToolCallPatch {
                id: tool_use_id.to_string(),
                content: Some(vec![ToolCallContent::Text { text }]),
                ..Default::default()
            }));
            out.updates.push(SessionUpdate::ToolCallUpdate(ToolCallPatch {
                id: tool_use_id.to_string(),
                status: Some(status),
                ..Default::default()
            }));
            return;
        }

        let content = (!text.is_empty()).then(|| vec![ToolCallContent::Text { text }]);
        out.updates.push(SessionUpdate::ToolCallUpdate(ToolCallPatch {
            id: tool_use_id.to_string(),
            status: Some(status),
            content,
            ..Default::default()
        }));
    }

    /// Bookkeeping-only processing for background/subagent events.
    fn drain_background(&mut self, event: &RuntimeEvent, parent_id: &str) {
        tracing::trace!(parent_id, "draining background turn event");
        let blocks = match event {
            RuntimeEvent::BlockStart { block, .. } => std::slice::from_ref(block),
            RuntimeEvent::AssistantReplay { blocks, .. }
            | RuntimeEvent::UserReplay { blocks, .. } => blocks.as_slice(),
            _ => &[],
        };
        for block in blocks {
            if let ContentBlock::ToolUse { id, name, input } = block {
                self.registry.record(id, name, input.clone());
            }
        }
    }
}

/// Project the plan tool's input into ordered plan entries.
///
/// Returns `None` when the input has no parseable entries (streamed tool
/// inputs may still be partial).
#[must_use]
pub fn project_plan(input: &Value) -> Option<Vec<PlanEntry>> {
    let todos = input.get("todos")?.as_array()?;

    let entries: Vec<PlanEntry> = todos
        .iter()
        .filter_map(|todo| {
            let content = todo.get("content")?.as_str()?.to_string();
            let status = match todo.get("status").and_then(Value::as_str) {
                Some("in_progress") => PlanEntryStatus::InProgress,
                Some("completed") => PlanEntryStatus::Completed,
                _ => PlanEntryStatus::Pending,
            };
            let priority = match todo.get("priority").and_then(Value::as_str) {
                Some("high") => PlanPriority::High,
                Some("low") => PlanPriority::Low,
                _ => PlanPriority::Medium,
            };
            Some(PlanEntry {
                content,
                priority,
                status,
            })
        })
        .collect();

    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

/// Flatten a tool-result payload into display text.
///
/// The runtime delivers either a plain string or an array of typed blocks;
/// only text blocks contribute.
#[must_use]
pub fn result_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| {
                (block.get("type")?.as_str()? == "text")
                    .then(|| block.get("text")?.as_str().map(String::from))?
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }

    fn translate(translator: &mut Translator, event: &RuntimeEvent) -> Translated {
        let mut usage = AccumulatedUsage::new();
        translator.translate(event, &mut usage)
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_unknown_event_is_dropped_in_release_builds() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::Unknown {
                event_type: "heartbeat".to_string(),
            },
        );
        assert!(out.updates.is_empty());
        assert!(out.terminal.is_none());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unrecognized runtime event type")]
    fn test_unknown_event_panics_in_debug_builds() {
        let mut translator = Translator::new();
        let _ = translate(
            &mut translator,
            &RuntimeEvent::Unknown {
                event_type: "heartbeat".to_string(),
            },
        );
    }

    #[test]
    fn test_text_delta_streams_as_message_chunk() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::TextDelta {
                parent_id: None,
                text: "Hello".to_string(),
            },
        );
        assert_eq!(
            out.updates,
            vec![SessionUpdate::AgentMessageChunk {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn test_thought_delta_streams_as_thought_chunk() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::ThoughtDelta {
                parent_id: None,
                text: "hmm".to_string(),
            },
        );
        assert!(matches!(
            &out.updates[0],
            SessionUpdate::AgentThoughtChunk { text } if text == "hmm"
        ));
    }

    #[test]
    fn test_tool_use_observed_twice_creates_once_then_refines() {
        let mut translator = Translator::new();

        let out = translate(
            &mut translator,
            &RuntimeEvent::BlockStart {
                parent_id: None,
                block: tool_use("toolu_01", "Bash", json!({})),
            },
        );
        assert_eq!(out.updates.len(), 1);
        let SessionUpdate::ToolCall(view) = &out.updates[0] else {
            panic!("Expected ToolCall, got {:?}", out.updates[0]);
        };
        assert_eq!(view.id, "toolu_01");
        assert_eq!(view.status, ToolCallStatus::Pending);
        assert_eq!(view.terminal_id.as_deref(), Some("terminal:toolu_01"));

        // Full-message replay of the same id refines instead of duplicating.
        let out = translate(
            &mut translator,
            &RuntimeEvent::AssistantReplay {
                parent_id: None,
                blocks: vec![tool_use("toolu_01", "Bash", json!({"command": "ls"}))],
            },
        );
        assert_eq!(out.updates.len(), 1);
        let SessionUpdate::ToolCallUpdate(patch) = &out.updates[0] else {
            panic!("Expected ToolCallUpdate, got {:?}", out.updates[0]);
        };
        assert_eq!(patch.id, "toolu_01");
        assert_eq!(patch.raw_input, Some(json!({"command": "ls"})));
        assert!(patch.status.is_none());
    }

    #[test]
    fn test_replay_without_prior_stream_creates_the_call() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::AssistantReplay {
                parent_id: None,
                blocks: vec![tool_use("toolu_01", "Read", json!({"file_path": "a.rs"}))],
            },
        );
        assert!(matches!(&out.updates[0], SessionUpdate::ToolCall(_)));
    }

    #[test]
    fn test_replay_text_blocks_are_suppressed() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::AssistantReplay {
                parent_id: None,
                blocks: vec![
                    ContentBlock::Text {
                        text: "already streamed".to_string(),
                    },
                    ContentBlock::Thinking {
                        text: "already streamed".to_string(),
                    },
                ],
            },
        );
        assert!(out.updates.is_empty());
    }

    #[test]
    fn test_plan_tool_projects_to_plan_notification() {
        let mut translator = Translator::new();
        let input = json!({"todos": [
            {"content": "write tests", "status": "in_progress", "priority": "high"},
            {"content": "refactor", "status": "pending"},
        ]});
        let out = translate(
            &mut translator,
            &RuntimeEvent::BlockStart {
                parent_id: None,
                block: tool_use("toolu_plan", PLAN_TOOL, input),
            },
        );

        assert_eq!(out.updates.len(), 1);
        let SessionUpdate::Plan { entries } = &out.updates[0] else {
            panic!("Expected Plan, got {:?}", out.updates[0]);
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "write tests");
        assert_eq!(entries[0].status, PlanEntryStatus::InProgress);
        assert_eq!(entries[0].priority, PlanPriority::High);
        assert_eq!(entries[1].priority, PlanPriority::Medium);
    }

    #[test]
    fn test_plan_tool_with_partial_input_emits_nothing() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::BlockStart {
                parent_id: None,
                block: tool_use("toolu_plan", PLAN_TOOL, json!({})),
            },
        );
        assert!(out.updates.is_empty());
    }

    #[test]
    fn test_matched_result_closes_lifecycle() {
        let mut translator = Translator::new();
        translate(
            &mut translator,
            &RuntimeEvent::BlockStart {
                parent_id: None,
                block: tool_use("toolu_01", "Read", json!({})),
            },
        );

        let out = translate(
            &mut translator,
            &RuntimeEvent::UserReplay {
                parent_id: None,
                correlation: None,
                blocks: vec![ContentBlock::ToolResult {
                    tool_use_id: "toolu_01".to_string(),
                    is_error: false,
                    content: json!("file contents"),
                }],
            },
        );

        assert_eq!(out.updates.len(), 1);
        let SessionUpdate::ToolCallUpdate(patch) = &out.updates[0] else {
            panic!("Expected ToolCallUpdate, got {:?}", out.updates[0]);
        };
        assert_eq!(patch.status, Some(ToolCallStatus::Completed));
        assert_eq!(
            patch.content,
            Some(vec![ToolCallContent::Text {
                text: "file contents".to_string()
            }])
        );
    }

    #[test]
    fn test_error_result_marks_failed() {
        let mut translator = Translator::new();
        translate(
            &mut translator,
            &RuntimeEvent::BlockStart {
                parent_id: None,
                block: tool_use("toolu_01", "Read", json!({})),
            },
        );
        let out = translate(
            &mut translator,
            &RuntimeEvent::UserReplay {
                parent_id: None,
                correlation: None,
                blocks: vec![ContentBlock::ToolResult {
                    tool_use_id: "toolu_01".to_string(),
                    is_error: true,
                    content: json!("no such file"),
                }],
            },
        );
        let SessionUpdate::ToolCallUpdate(patch) = &out.updates[0] else {
            panic!("Expected ToolCallUpdate, got {:?}", out.updates[0]);
        };
        assert_eq!(patch.status, Some(ToolCallStatus::Failed));
    }

    #[test]
    fn test_unmatched_result_is_dropped_without_panic() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::UserReplay {
                parent_id: None,
                correlation: None,
                blocks: vec![ContentBlock::ToolResult {
                    tool_use_id: "toolu_ghost".to_string(),
                    is_error: false,
                    content: json!("orphan"),
                }],
            },
        );
        assert!(out.updates.is_empty());
    }

    #[test]
    fn test_command_result_splits_output_and_completion() {
        let mut translator = Translator::new();
        translate(
            &mut translator,
            &RuntimeEvent::BlockStart {
                parent_id: None,
                block: tool_use("toolu_01", "Bash", json!({"command": "ls"})),
            },
        );
        let out = translate(
            &mut translator,
            &RuntimeEvent::UserReplay {
                parent_id: None,
                correlation: None,
                blocks: vec![ContentBlock::ToolResult {
                    tool_use_id: "toolu_01".to_string(),
                    is_error: false,
                    content: json!("Cargo.toml\nsrc"),
                }],
            },
        );

        assert_eq!(out.updates.len(), 2);
        let SessionUpdate::ToolCallUpdate(output) = &out.updates[0] else {
            panic!("Expected output update, got {:?}", out.updates[0]);
        };
        assert!(output.status.is_none());
        assert!(output.content.is_some());
        let SessionUpdate::ToolCallUpdate(done) = &out.updates[1] else {
            panic!("Expected completion update, got {:?}", out.updates[1]);
        };
        assert_eq!(done.status, Some(ToolCallStatus::Completed));
    }

    #[test]
    fn test_background_events_are_drained_with_bookkeeping() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::BlockStart {
                parent_id: Some("toolu_task".to_string()),
                block: tool_use("toolu_sub", "Read", json!({})),
            },
        );

        assert!(out.updates.is_empty(), "background events surface nothing");
        assert!(
            translator.registry().lookup("toolu_sub").is_some(),
            "registry bookkeeping still happens"
        );
    }

    #[test]
    fn test_background_text_deltas_surface_nothing() {
        let mut translator = Translator::new();
        let out = translate(
            &mut translator,
            &RuntimeEvent::TextDelta {
                parent_id: Some("toolu_task".to_string()),
                text: "subagent chatter".to_string(),
            },
        );
        assert!(out.updates.is_empty());
    }

    #[test]
    fn test_user_replay_surfaces_correlation_token() {
        let mut translator = Translator::new();
        let token = Uuid::new_v4();
        let out = translate(
            &mut translator,
            &RuntimeEvent::UserReplay {
                parent_id: None,
                correlation: Some(token),
                blocks: vec![],
            },
        );
        assert_eq!(out.replayed_correlation, Some(token));
    }

    #[test]
    fn test_result_event_updates_usage_and_emits_snapshot() {
        let mut translator = Translator::new();
        let mut usage = AccumulatedUsage::new();
        let mut result = TurnResult {
            subtype: "success".to_string(),
            is_error: false,
            text: "done".to_string(),
            usage: std::collections::HashMap::new(),
        };
        result.usage.insert(
            "sonnet".to_string(),
            crate::runtime::ModelUsage {
                input_tokens: 10,
                output_tokens: 5,
                cache_read_tokens: 0,
                cache_write_tokens: 0,
                context_window: Some(100_000),
            },
        );

        let out = translator.translate(&RuntimeEvent::Result(result), &mut usage);
        assert!(out.terminal.is_some());
        let SessionUpdate::Usage(snapshot) = &out.updates[0] else {
            panic!("Expected Usage, got {:?}", out.updates[0]);
        };
        assert_eq!(snapshot.input_tokens, 10);
        assert_eq!(snapshot.context_window, 100_000);
    }

    #[test]
    fn test_commands_announced_once_per_session() {
        let mut translator = Translator::new();
        let init = RuntimeEvent::Init {
            model: "sonnet".to_string(),
            commands: vec![crate::protocol::AvailableCommand {
                name: "compact".to_string(),
                description: String::new(),
            }],
        };

        let first = translate(&mut translator, &init);
        assert_eq!(first.updates.len(), 1);

        let second = translate(&mut translator, &init);
        assert!(second.updates.is_empty());
    }

    #[test]
    fn test_result_text_flattens_block_arrays() {
        let content = json!([
            {"type": "text", "text": "line one"},
            {"type": "image", "source": "..."},
            {"type": "text", "text": "line two"},
        ]);
        assert_eq!(result_text(&content), "line one\nline two");
        assert_eq!(result_text(&json!("plain")), "plain");
        assert_eq!(result_text(&json!(null)), "");
    }
}
