//! Runtime event model
//!
//! Typed representation of the agent runtime's heterogeneous event stream:
//! fine-grained streaming deltas, coarse full-message replays that duplicate
//! already-streamed content, and per-turn terminal results. `parse` decodes
//! the runtime's loosely structured JSON records into these variants for
//! transports that receive the stream as newline-delimited JSON.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::protocol::AvailableCommand;

/// One content block inside an assistant or user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain assistant text.
    Text {
        /// The text content.
        text: String,
    },
    /// Assistant reasoning text.
    Thinking {
        /// The reasoning content.
        text: String,
    },
    /// A tool invocation request.
    ToolUse {
        /// Opaque invocation identifier, stable across dual delivery.
        id: String,
        /// Declared tool name.
        name: String,
        /// Structured tool input.
        input: Value,
    },
    /// The result of a prior tool invocation.
    ToolResult {
        /// Invocation identifier this result answers.
        tool_use_id: String,
        /// Whether the tool reported an error.
        is_error: bool,
        /// Result payload (string or structured blocks).
        content: Value,
    },
}

/// Token usage reported for one model within a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelUsage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens produced.
    pub output_tokens: u64,
    /// Tokens read from prompt cache.
    pub cache_read_tokens: u64,
    /// Tokens written to prompt cache.
    pub cache_write_tokens: u64,
    /// The model's declared context window, when reported.
    pub context_window: Option<u64>,
}

/// Terminal event of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    /// Result subtype as declared by the runtime (e.g. `success`,
    /// `error_during_execution`, `error_max_turns`).
    pub subtype: String,
    /// Whether the runtime flagged the turn as failed.
    pub is_error: bool,
    /// Human-readable result text.
    pub text: String,
    /// Per-model usage for the turn, keyed by model identifier.
    pub usage: HashMap<String, ModelUsage>,
}

/// One event pulled from the runtime's stream.
///
/// `parent_id` carries the runtime's task correlation marker: events that
/// belong to a background/subagent task carry the spawning tool invocation's
/// id there, while the client's active turn reports `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// Session initialization: model, available slash commands.
    Init {
        /// The model the runtime selected.
        model: String,
        /// Slash commands the runtime exposes.
        commands: Vec<AvailableCommand>,
    },
    /// A content block opened on the streaming path.
    BlockStart {
        /// Task correlation marker (subagent events carry one).
        parent_id: Option<String>,
        /// The block as first observed (tool inputs may be partial).
        block: ContentBlock,
    },
    /// Incremental assistant text on the streaming path.
    TextDelta {
        /// Task correlation marker.
        parent_id: Option<String>,
        /// The text fragment.
        text: String,
    },
    /// Incremental reasoning text on the streaming path.
    ThoughtDelta {
        /// Task correlation marker.
        parent_id: Option<String>,
        /// The reasoning fragment.
        text: String,
    },
    /// Full-message replay of an assistant message already delivered as
    /// deltas. A refinement, not a duplicate.
    AssistantReplay {
        /// Task correlation marker.
        parent_id: Option<String>,
        /// The complete content blocks.
        blocks: Vec<ContentBlock>,
    },
    /// Replay of a user message, including queued follow-up prompts (tagged
    /// with their correlation token) and tool-result blocks.
    UserReplay {
        /// Task correlation marker.
        parent_id: Option<String>,
        /// Correlation token of a queued prompt now becoming the active
        /// turn, when present.
        correlation: Option<Uuid>,
        /// The message's content blocks.
        blocks: Vec<ContentBlock>,
    },
    /// The runtime is asking whether a tool invocation may execute. The
    /// answer goes back through [`crate::runtime::AgentRuntime::resolve_permission`].
    ApprovalRequest {
        /// Invocation identifier awaiting authorization.
        tool_use_id: String,
        /// Name of the tool requesting execution.
        tool_name: String,
        /// The tool's proposed input.
        input: Value,
    },
    /// Terminal event of the current turn.
    Result(TurnResult),
    /// Unrecognized event type, preserved for logging.
    Unknown {
        /// The raw event type string.
        event_type: String,
    },
}

impl RuntimeEvent {
    /// The task correlation marker of this event, when it has one.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Self::BlockStart { parent_id, .. }
            | Self::TextDelta { parent_id, .. }
            | Self::ThoughtDelta { parent_id, .. }
            | Self::AssistantReplay { parent_id, .. }
            | Self::UserReplay { parent_id, .. } => parent_id.as_deref(),
            Self::Init { .. }
            | Self::ApprovalRequest { .. }
            | Self::Result(_)
            | Self::Unknown { .. } => None,
        }
    }
}

/// Parse a single runtime JSON record into a [`RuntimeEvent`].
///
/// Returns `None` for empty or non-JSON lines. Unrecognized event types
/// yield [`RuntimeEvent::Unknown`] so callers can log the drift instead of
/// crashing the session.
#[must_use]
pub fn parse_event(line: &str) -> Option<RuntimeEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(line).ok()?;
    let event_type = value.get("type")?.as_str()?;

    match event_type {
        "system" => Some(parse_init(&value)),
        "stream_event" => parse_stream_event(&value),
        "assistant" => Some(RuntimeEvent::AssistantReplay {
            parent_id: parent_id_of(&value),
            blocks: parse_blocks(&value),
        }),
        "user" => Some(RuntimeEvent::UserReplay {
            parent_id: parent_id_of(&value),
            correlation: value
                .get("correlation_id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok()),
            blocks: parse_blocks(&value),
        }),
        "permission_request" => Some(RuntimeEvent::ApprovalRequest {
            tool_use_id: value.get("tool_use_id")?.as_str()?.to_string(),
            tool_name: value
                .get("tool_name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            input: value.get("input").cloned().unwrap_or(Value::Null),
        }),
        "result" => Some(RuntimeEvent::Result(parse_result(&value))),
        other => Some(RuntimeEvent::Unknown {
            event_type: other.to_string(),
        }),
    }
}

fn parent_id_of(value: &Value) -> Option<String> {
    value
        .get("parent_tool_use_id")
        .and_then(Value::as_str)
        .map(String::from)
}

fn parse_init(value: &Value) -> RuntimeEvent {
    let model = value
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let commands = value
        .get("slash_commands")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|cmd| {
                    let name = cmd.as_str()?.to_string();
                    Some(AvailableCommand {
                        name,
                        description: String::new(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    RuntimeEvent::Init { model, commands }
}

fn parse_stream_event(value: &Value) -> Option<RuntimeEvent> {
    let parent_id = parent_id_of(value);
    let inner = value.get("event")?;
    let inner_type = inner.get("type")?.as_str()?;

    match inner_type {
        "content_block_start" => {
            let block = parse_block(inner.get("content_block")?)?;
            Some(RuntimeEvent::BlockStart { parent_id, block })
        }
        "content_block_delta" => {
            let delta = inner.get("delta")?;
            match delta.get("type")?.as_str()? {
                "text_delta" => Some(RuntimeEvent::TextDelta {
                    parent_id,
                    text: delta.get("text")?.as_str()?.to_string(),
                }),
                "thinking_delta" => Some(RuntimeEvent::ThoughtDelta {
                    parent_id,
                    text: delta.get("thinking")?.as_str()?.to_string(),
                }),
                // Partial tool-input JSON deltas carry no renderable content.
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_blocks(value: &Value) -> Vec<ContentBlock> {
    value
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_array)
        .map(|blocks| blocks.iter().filter_map(parse_block).collect())
        .unwrap_or_default()
}

fn parse_block(block: &Value) -> Option<ContentBlock> {
    match block.get("type")?.as_str()? {
        "text" => Some(ContentBlock::Text {
            text: block.get("text")?.as_str()?.to_string(),
        }),
        "thinking" => Some(ContentBlock::Thinking {
            text: block.get("thinking")?.as_str()?.to_string(),
        }),
        "tool_use" => Some(ContentBlock::ToolUse {
            id: block.get("id")?.as_str()?.to_string(),
            name: block
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        }),
        "tool_result" => Some(ContentBlock::ToolResult {
            tool_use_id: block.get("tool_use_id")?.as_str()?.to_string(),
            is_error: block
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            content: block.get("content").cloned().unwrap_or(Value::Null),
        }),
        _ => None,
    }
}

fn parse_result(value: &Value) -> TurnResult {
    let subtype = value
        .get("subtype")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let is_error = value
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let text = value
        .get("result")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let usage = value
        .get("modelUsage")
        .and_then(Value::as_object)
        .map(|models| {
            models
                .iter()
                .map(|(model, usage)| (model.clone(), parse_usage(usage)))
                .collect()
        })
        .unwrap_or_default();

    TurnResult {
        subtype,
        is_error,
        text,
        usage,
    }
}

fn parse_usage(value: &Value) -> ModelUsage {
    let field = |name: &str| value.get(name).and_then(Value::as_u64).unwrap_or(0);
    ModelUsage {
        input_tokens: field("inputTokens"),
        output_tokens: field("outputTokens"),
        cache_read_tokens: field("cacheReadInputTokens"),
        cache_write_tokens: field("cacheCreationInputTokens"),
        context_window: value.get("contextWindow").and_then(Value::as_u64),
    }
}
