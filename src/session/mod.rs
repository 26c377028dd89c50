//! Session orchestration
//!
//! This module owns the per-session state machine: prompt admission and the
//! pending-prompt queue, the single drive loop that pulls runtime events,
//! the merge of the side-channel hook stream, permission round-trips, and
//! session option changes (model, permission mode).
//!
//! Invariant: at most one caller drives the runtime per session at any
//! instant. Prompt calls that arrive while a turn is in flight queue their
//! input into the runtime and suspend until the drive is handed to them.

pub mod queue;
pub mod registry;
pub mod translate;
pub mod usage;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::Client;
use crate::error::{BridgeError, Result};
use crate::intercept::EditInterceptor;
use crate::permissions::{BridgeConfig, PermissionGate, EXIT_PLAN_TOOL};
use crate::protocol::{
    is_edit_tool, PermissionDecision, PermissionMode, PermissionRequest, PromptOutcome,
    SessionUpdate, ToolCallContent, ToolCallPatch, ToolCallStatus,
};
use crate::runtime::{AgentRuntime, HookEvent, RuntimeEvent, RuntimeInput, TurnResult};

use queue::{PendingResolution, PromptQueue};
use translate::Translator;
use usage::AccumulatedUsage;

/// Model identifiers a session accepts for [`SessionManager::set_session_model`].
pub const AVAILABLE_MODELS: &[&str] = &["default", "sonnet", "opus", "haiku"];

/// The file-reading built-in whose completed reads seed the edit
/// interceptor's cache.
const READ_TOOL: &str = "Read";

/// Mutable per-session state. Held behind a [`Mutex`] and never locked
/// across an await point.
#[derive(Debug)]
struct SessionState {
    cancel: CancellationToken,
    mode: PermissionMode,
    model: String,
    turn_active: bool,
    queue: PromptQueue,
    translator: Translator,
    usage: AccumulatedUsage,
}

impl SessionState {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            mode: PermissionMode::Default,
            model: "default".to_string(),
            turn_active: false,
            queue: PromptQueue::new(),
            translator: Translator::new(),
            usage: AccumulatedUsage::new(),
        }
    }
}

/// How a drive ended, before it is reported to the prompt caller.
enum DriveEnd {
    /// The turn reached a terminal outcome; the drive slot is free.
    Outcome(PromptOutcome),
    /// The runtime rolled straight into a queued prompt's turn; the drive
    /// was handed to that prompt's suspended caller.
    Handoff,
}

/// One logical conversation between a client and an agent runtime.
///
/// Shared as `Arc<Session>`; every public operation takes `&self` and
/// serializes through the interior locks.
pub struct Session {
    id: Uuid,
    runtime: Arc<dyn AgentRuntime>,
    state: Mutex<SessionState>,
    gate: Mutex<PermissionGate>,
    interceptor: Mutex<EditInterceptor>,
    hooks: Mutex<mpsc::UnboundedReceiver<HookEvent>>,
}

impl Session {
    fn new(id: Uuid, runtime: Arc<dyn AgentRuntime>, hooks: mpsc::UnboundedReceiver<HookEvent>) -> Self {
        Self {
            id,
            runtime,
            state: Mutex::new(SessionState::new()),
            gate: Mutex::new(PermissionGate::new()),
            interceptor: Mutex::new(EditInterceptor::new()),
            hooks: Mutex::new(hooks),
        }
    }

    /// This session's identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Submit one user prompt and block until its turn reaches an outcome.
    ///
    /// When the session is idle the calling task becomes the driver
    /// directly. When a turn is already in flight the prompt is pushed into
    /// the runtime's input channel tagged with a correlation token, and the
    /// call suspends until an earlier drive hands over or cancellation
    /// short-circuits the wait.
    pub async fn prompt(
        &self,
        content: &str,
        client: &dyn Client,
        config: BridgeConfig,
    ) -> Result<PromptOutcome> {
        let waiter = {
            let mut state = self.state.lock().await;
            if state.turn_active {
                let correlation = Uuid::new_v4();
                Some((correlation, state.queue.register(correlation)))
            } else {
                state.turn_active = true;
                state.usage.reset();
                if state.cancel.is_cancelled() {
                    state.cancel = CancellationToken::new();
                }
                None
            }
        };

        let Some((correlation, resolved)) = waiter else {
            if let Err(err) = self.runtime.submit(RuntimeInput::new(content.to_string())).await {
                let mut state = self.state.lock().await;
                if !state.queue.resolve_next() {
                    state.turn_active = false;
                }
                return Err(BridgeError::runtime(err));
            }
            return self.drive(client, config).await;
        };

        if let Err(err) = self
            .runtime
            .submit(RuntimeInput::queued(content.to_string(), correlation))
            .await
        {
            // Drop the stale entry so a later defensive resolution cannot
            // be absorbed by a caller that already failed.
            self.state.lock().await.queue.resolve_matching(correlation);
            return Err(BridgeError::runtime(err));
        }

        match resolved.await {
            Ok(PendingResolution::PreviousTurnEnded) => {
                // The previous drive ended or rolled into this prompt's
                // turn; the input is already queued in the runtime, so this
                // caller only has to take over driving.
                {
                    let mut state = self.state.lock().await;
                    state.turn_active = true;
                    state.usage.reset();
                    if state.cancel.is_cancelled() {
                        state.cancel = CancellationToken::new();
                    }
                }
                self.drive(client, config).await
            }
            Ok(PendingResolution::Cancelled) | Err(_) => Ok(PromptOutcome::Cancelled),
        }
    }

    /// Cancel the in-flight turn, if any, and fail every queued prompt.
    pub async fn cancel(&self) -> Result<()> {
        let interrupt = {
            let mut state = self.state.lock().await;
            state.queue.cancel_all();
            state.cancel.cancel();
            state.turn_active
        };
        if interrupt {
            self.runtime.interrupt().await.map_err(BridgeError::runtime)?;
        }
        Ok(())
    }

    /// Switch the session's permission mode and notify the client.
    pub async fn set_mode(&self, mode: &str, client: &dyn Client) -> Result<()> {
        let mode = PermissionMode::parse(mode)
            .ok_or_else(|| BridgeError::unknown_option(mode, "mode"))?;
        self.transition_mode(mode, client).await
    }

    /// Switch the model used for subsequent turns.
    pub async fn set_model(&self, model: &str) -> Result<()> {
        if !AVAILABLE_MODELS.contains(&model) {
            return Err(BridgeError::unknown_option(model, "model"));
        }
        self.runtime
            .set_model(model)
            .await
            .map_err(BridgeError::runtime)?;
        self.state.lock().await.model = model.to_string();
        Ok(())
    }

    async fn transition_mode(&self, mode: PermissionMode, client: &dyn Client) -> Result<()> {
        self.runtime
            .set_permission_mode(mode)
            .await
            .map_err(BridgeError::runtime)?;
        self.state.lock().await.mode = mode;
        client
            .session_update(self.id, SessionUpdate::CurrentModeUpdate { mode })
            .await
            .map_err(BridgeError::client)
    }

    /// Drive the runtime until the active turn ends, handing off to a
    /// queued prompt when the runtime rolls straight into its turn.
    async fn drive(&self, client: &dyn Client, config: BridgeConfig) -> Result<PromptOutcome> {
        let end = self.drive_inner(client, config).await;

        // Exit bookkeeping runs on every path so no pending caller hangs:
        // the lowest-order pending prompt inherits the drive slot, or the
        // session goes idle.
        let handed_off = matches!(end, Ok(DriveEnd::Handoff));
        if !handed_off {
            let mut state = self.state.lock().await;
            if !state.queue.resolve_next() {
                state.turn_active = false;
            }
        }

        match end {
            Ok(DriveEnd::Outcome(outcome)) => Ok(outcome),
            Ok(DriveEnd::Handoff) => Ok(PromptOutcome::EndTurn),
            Err(err) => Err(err),
        }
    }

    async fn drive_inner(&self, client: &dyn Client, config: BridgeConfig) -> Result<DriveEnd> {
        let cancel = self.state.lock().await.cancel.clone();
        let mut hooks = self.hooks.lock().await;
        let mut hooks_open = true;

        loop {
            if cancel.is_cancelled() {
                return Ok(DriveEnd::Outcome(PromptOutcome::Cancelled));
            }

            // Biased so pending hooks are drained before the next runtime
            // event; otherwise a turn result could race ahead of the edit
            // interception its tool call triggered.
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(DriveEnd::Outcome(PromptOutcome::Cancelled));
                }
                hook = hooks.recv(), if hooks_open => {
                    match hook {
                        Some(hook) => {
                            self.handle_hook(hook, client).await?;
                        }
                        None => hooks_open = false,
                    }
                    continue;
                }
                event = self.runtime.next_event() => event,
            };

            let Some(event) = event else {
                return Err(BridgeError::Internal(
                    "runtime event stream ended mid-turn".to_string(),
                ));
            };

            if let RuntimeEvent::ApprovalRequest {
                tool_use_id,
                tool_name,
                input,
            } = &event
            {
                self.handle_approval(tool_use_id, tool_name, input, client, config, &cancel)
                    .await?;
                continue;
            }

            let translated = {
                let mut state = self.state.lock().await;
                let state = &mut *state;
                state.translator.translate(&event, &mut state.usage)
            };

            for update in translated.updates {
                client
                    .session_update(self.id, update)
                    .await
                    .map_err(BridgeError::client)?;
            }

            if let Some(correlation) = translated.replayed_correlation {
                if self.state.lock().await.queue.resolve_matching(correlation) {
                    // The runtime consumed a queued prompt inside this
                    // stream; its caller takes over from here.
                    return Ok(DriveEnd::Handoff);
                }
            }

            if let Some(result) = translated.terminal {
                return compute_outcome(&result, &cancel).map(DriveEnd::Outcome);
            }
        }
    }

    /// Answer a runtime approval request through the permission gate,
    /// applying the plan-exit mode transition when the client allows it.
    async fn handle_approval(
        &self,
        tool_use_id: &str,
        tool_name: &str,
        input: &Value,
        client: &dyn Client,
        config: BridgeConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mode = self.state.lock().await.mode;
        let request = PermissionRequest {
            session_id: self.id,
            tool_call_id: tool_use_id.to_string(),
            tool_name: tool_name.to_string(),
            input: input.clone(),
        };

        let decision = {
            let mut gate = self.gate.lock().await;
            gate.decide(mode, config, request, client, cancel).await?
        };

        if mode == PermissionMode::Plan
            && tool_name == EXIT_PLAN_TOOL
            && matches!(decision, PermissionDecision::Allow { .. })
        {
            self.transition_mode(PermissionMode::AcceptEdits, client)
                .await?;
        }

        if matches!(decision, PermissionDecision::Deny { interrupted: true }) {
            // The round-trip was aborted; fail the tool invocation visibly
            // without failing the turn.
            let err = BridgeError::ToolUseAborted {
                tool_name: tool_name.to_string(),
            };
            tracing::warn!(tool_use_id, "{err}");
            client
                .session_update(
                    self.id,
                    SessionUpdate::ToolCallUpdate(ToolCallPatch {
                        id: tool_use_id.to_string(),
                        status: Some(ToolCallStatus::Failed),
                        content: Some(vec![ToolCallContent::Text {
                            text: err.to_string(),
                        }]),
                        ..Default::default()
                    }),
                )
                .await
                .map_err(BridgeError::client)?;
        }

        self.runtime
            .resolve_permission(tool_use_id, decision)
            .await
            .map_err(BridgeError::runtime)
    }

    /// Process one side-channel hook event: registry bookkeeping, read
    /// caching, and edit interception.
    async fn handle_hook(&self, hook: HookEvent, client: &dyn Client) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let registry = state.translator.registry_mut();
            registry.record(&hook.tool_use_id, &hook.tool_name, hook.input.clone());
            if !registry.register_hook(&hook.tool_use_id) {
                return Ok(());
            }
        }

        if hook.tool_name == READ_TOOL {
            if let Some(path) = hook.input.get("file_path").and_then(Value::as_str) {
                // Prefer reading back through the client so unsaved editor
                // buffers are observed; the hook's response payload is the
                // fallback when the client cannot serve the path.
                let content = match client.read_text_file(Path::new(path)).await {
                    Ok(content) => Some(content),
                    Err(err) => {
                        tracing::debug!(path, "client read failed, using hook payload: {err}");
                        hook_read_content(&hook.response)
                    }
                };
                if let Some(content) = content {
                    self.interceptor
                        .lock()
                        .await
                        .on_file_read(Path::new(path), content);
                }
            }
            return Ok(());
        }

        if !is_edit_tool(&hook.tool_name) || hook_reported_failure(&hook.response) {
            return Ok(());
        }

        let intercepted = self
            .interceptor
            .lock()
            .await
            .intercept(&hook.tool_name, &hook.input, client)
            .await
            .map_err(BridgeError::client)?;

        if let Some(edit) = intercepted {
            client
                .session_update(
                    self.id,
                    SessionUpdate::ToolCallUpdate(ToolCallPatch {
                        id: hook.tool_use_id.clone(),
                        content: Some(vec![ToolCallContent::Diff {
                            path: edit.path.to_string_lossy().into_owned(),
                            old_text: edit.old_text,
                            new_text: edit.new_text,
                        }]),
                        ..Default::default()
                    }),
                )
                .await
                .map_err(BridgeError::client)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Classify a turn's terminal result.
///
/// A success-shaped result whose text carries an authentication marker is
/// re-signaled as [`BridgeError::AuthRequired`] so clients can start a
/// login flow instead of showing an opaque failure.
fn compute_outcome(result: &TurnResult, cancel: &CancellationToken) -> Result<PromptOutcome> {
    if cancel.is_cancelled() {
        return Ok(PromptOutcome::Cancelled);
    }

    match (result.subtype.as_str(), result.is_error) {
        ("success", false) => {
            if auth_failure(&result.text) {
                return Err(BridgeError::AuthRequired(result.text.clone()));
            }
            Ok(PromptOutcome::EndTurn)
        }
        ("error_max_turns", _) => Ok(PromptOutcome::MaxTurns),
        ("success", true) | ("error_during_execution", _) => {
            if auth_failure(&result.text) {
                Err(BridgeError::AuthRequired(result.text.clone()))
            } else {
                Err(BridgeError::Internal(result.text.clone()))
            }
        }
        (subtype, is_error) => {
            tracing::error!(subtype, "unrecognized terminal result subtype");
            debug_assert!(false, "unrecognized terminal result subtype: {subtype}");
            if is_error {
                Err(BridgeError::Internal(result.text.clone()))
            } else {
                Ok(PromptOutcome::EndTurn)
            }
        }
    }
}

/// Whether a terminal result's text indicates the runtime lost its
/// credentials.
fn auth_failure(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("invalid api key") || lowered.contains("please run /login")
}

/// The file content a completed read hook observed, when present.
fn hook_read_content(response: &Value) -> Option<String> {
    if let Some(content) = response
        .get("file")
        .and_then(|file| file.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    response.as_str().map(String::from)
}

/// Whether the hook's response payload marks the execution as failed.
fn hook_reported_failure(response: &Value) -> bool {
    response
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Process-wide session table and the entry point for every client-facing
/// session operation.
pub struct SessionManager {
    client: Arc<dyn Client>,
    config: BridgeConfig,
    sessions: std::sync::Mutex<HashMap<Uuid, Arc<Session>>>,
}

impl SessionManager {
    /// Create a manager speaking to the given client under the given
    /// startup configuration.
    #[must_use]
    pub fn new(client: Arc<dyn Client>, config: BridgeConfig) -> Self {
        Self {
            client,
            config,
            sessions: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Establish a new session around a live runtime handle and its hook
    /// channel. Returns the session id the client uses from here on.
    pub fn create_session(
        &self,
        runtime: Arc<dyn AgentRuntime>,
        hooks: mpsc::UnboundedReceiver<HookEvent>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, runtime, hooks));
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .insert(id, session);
        id
    }

    /// Tear down a session. In-flight prompt calls on it observe
    /// cancellation through their own paths; this only drops the table
    /// entry.
    pub fn remove_session(&self, session_id: Uuid) -> Result<()> {
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .remove(&session_id)
            .map(|_| ())
            .ok_or(BridgeError::SessionNotFound(session_id))
    }

    /// Submit a prompt into a session and wait for its turn's outcome.
    pub async fn submit_prompt(&self, session_id: Uuid, content: &str) -> Result<PromptOutcome> {
        let session = self.session(session_id)?;
        session.prompt(content, self.client.as_ref(), self.config).await
    }

    /// Cancel a session's in-flight turn and queued prompts.
    pub async fn cancel(&self, session_id: Uuid) -> Result<()> {
        self.session(session_id)?.cancel().await
    }

    /// Change a session's permission mode by wire identifier.
    pub async fn set_session_mode(&self, session_id: Uuid, mode: &str) -> Result<()> {
        self.session(session_id)?
            .set_mode(mode, self.client.as_ref())
            .await
    }

    /// Change the model a session uses for subsequent turns.
    pub async fn set_session_model(&self, session_id: Uuid, model: &str) -> Result<()> {
        self.session(session_id)?.set_model(model).await
    }

    /// Look up a session, rejecting unknown ids.
    pub fn session(&self, session_id: Uuid) -> Result<Arc<Session>> {
        self.sessions
            .lock()
            .expect("session map lock poisoned")
            .get(&session_id)
            .cloned()
            .ok_or(BridgeError::SessionNotFound(session_id))
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(subtype: &str, is_error: bool, text: &str) -> TurnResult {
        TurnResult {
            subtype: subtype.to_string(),
            is_error,
            text: text.to_string(),
            usage: HashMap::new(),
        }
    }

    #[test]
    fn test_success_result_is_end_turn() {
        let cancel = CancellationToken::new();
        let outcome = compute_outcome(&result("success", false, "done"), &cancel).unwrap();
        assert_eq!(outcome, PromptOutcome::EndTurn);
    }

    #[test]
    fn test_max_turns_result_maps_to_outcome_not_error() {
        let cancel = CancellationToken::new();
        let outcome = compute_outcome(&result("error_max_turns", true, ""), &cancel).unwrap();
        assert_eq!(outcome, PromptOutcome::MaxTurns);
    }

    #[test]
    fn test_cancelled_token_wins_over_success() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = compute_outcome(&result("success", false, "done"), &cancel).unwrap();
        assert_eq!(outcome, PromptOutcome::Cancelled);
    }

    #[test]
    fn test_auth_marker_in_success_text_is_auth_required() {
        let cancel = CancellationToken::new();
        let err = compute_outcome(
            &result("success", false, "Invalid API key. Please run /login."),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::AuthRequired(_)));
    }

    #[test]
    fn test_error_result_without_auth_marker_is_internal() {
        let cancel = CancellationToken::new();
        let err = compute_outcome(
            &result("error_during_execution", true, "tool crashed"),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::Internal(_)));
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_unknown_subtype_without_error_flag_is_tolerated() {
        let cancel = CancellationToken::new();
        let outcome =
            compute_outcome(&result("success_with_extras", false, "ok"), &cancel).unwrap();
        assert_eq!(outcome, PromptOutcome::EndTurn);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unrecognized terminal result subtype")]
    fn test_unknown_subtype_panics_in_debug_builds() {
        let cancel = CancellationToken::new();
        let _ = compute_outcome(&result("success_with_extras", false, "ok"), &cancel);
    }

    #[test]
    fn test_hook_read_content_prefers_file_object() {
        let response = serde_json::json!({"file": {"filePath": "/a", "content": "body"}});
        assert_eq!(hook_read_content(&response).as_deref(), Some("body"));
        assert_eq!(
            hook_read_content(&Value::String("plain".to_string())).as_deref(),
            Some("plain")
        );
        assert!(hook_read_content(&serde_json::json!({})).is_none());
    }

    #[test]
    fn test_hook_reported_failure_reads_flag() {
        assert!(hook_reported_failure(&serde_json::json!({"is_error": true})));
        assert!(!hook_reported_failure(&serde_json::json!({"is_error": false})));
        assert!(!hook_reported_failure(&serde_json::json!({})));
    }
}
