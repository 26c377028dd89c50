//! Shared test utilities
//!
//! Mock implementations of the client and runtime boundaries, used by unit
//! tests and the integration suite. Not part of the supported API surface.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::client::Client;
use crate::protocol::{
    PermissionDecision, PermissionMode, PermissionOutcome, PermissionRequest, SessionUpdate,
};
use crate::runtime::{AgentRuntime, RuntimeEvent, RuntimeInput};

/// A scripted client: records every call and answers permission requests
/// with a configured outcome.
#[derive(Debug)]
pub struct MockClient {
    permission_outcome: PermissionOutcome,
    fail_writes: bool,
    permission_count: AtomicUsize,
    updates: Mutex<Vec<SessionUpdate>>,
    written: Mutex<Vec<(PathBuf, String)>>,
    files: Mutex<HashMap<PathBuf, String>>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self {
            permission_outcome: PermissionOutcome::allow_once(),
            fail_writes: false,
            permission_count: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
        }
    }
}

impl MockClient {
    /// A client that allows every permission request once.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer permission requests with the given outcome.
    #[must_use]
    pub fn with_permission_outcome(mut self, outcome: PermissionOutcome) -> Self {
        self.permission_outcome = outcome;
        self
    }

    /// Fail every `write_text_file` call.
    #[must_use]
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Pre-seed a file served by `read_text_file`.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.to_string());
        self
    }

    /// How many permission requests reached this client.
    #[must_use]
    pub fn permission_requests(&self) -> usize {
        self.permission_count.load(Ordering::SeqCst)
    }

    /// Every session update delivered so far, in order.
    #[must_use]
    pub fn updates(&self) -> Vec<SessionUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Every `write_text_file` call delivered so far, in order.
    #[must_use]
    pub fn written_files(&self) -> Vec<(PathBuf, String)> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl Client for MockClient {
    async fn session_update(&self, _session_id: Uuid, update: SessionUpdate) -> anyhow::Result<()> {
        self.updates.lock().unwrap().push(update);
        Ok(())
    }

    async fn request_permission(
        &self,
        _request: PermissionRequest,
    ) -> anyhow::Result<PermissionOutcome> {
        self.permission_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.permission_outcome.clone())
    }

    async fn read_text_file(&self, path: &Path) -> anyhow::Result<String> {
        if let Some(content) = self.files.lock().unwrap().get(path) {
            return Ok(content.clone());
        }
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write_text_file(&self, path: &Path, content: &str) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("write rejected by test configuration");
        }
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), content.to_string()));
        Ok(())
    }
}

/// A scripted runtime: events are pushed by the test and pulled by the
/// session's drive loop; every control call is recorded.
#[derive(Debug, Default)]
pub struct MockRuntime {
    events: Mutex<VecDeque<RuntimeEvent>>,
    closed: AtomicBool,
    wakeup: Notify,
    submitted: Mutex<Vec<RuntimeInput>>,
    interrupts: AtomicUsize,
    resolutions: Mutex<Vec<(String, PermissionDecision)>>,
    modes: Mutex<Vec<PermissionMode>>,
    models: Mutex<Vec<String>>,
}

impl MockRuntime {
    /// A runtime with an empty event script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event to the script and wake the drive loop.
    pub fn push_event(&self, event: RuntimeEvent) {
        self.events.lock().unwrap().push_back(event);
        self.wakeup.notify_one();
    }

    /// Append several events in order.
    pub fn push_events(&self, events: impl IntoIterator<Item = RuntimeEvent>) {
        {
            let mut queue = self.events.lock().unwrap();
            queue.extend(events);
        }
        self.wakeup.notify_one();
    }

    /// End the event stream: once the script drains, `next_event` returns
    /// `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.wakeup.notify_one();
    }

    /// Every input submitted so far, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<RuntimeInput> {
        self.submitted.lock().unwrap().clone()
    }

    /// How many interrupt calls were issued.
    #[must_use]
    pub fn interrupt_count(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }

    /// Every permission resolution delivered so far, in order.
    #[must_use]
    pub fn resolutions(&self) -> Vec<(String, PermissionDecision)> {
        self.resolutions.lock().unwrap().clone()
    }

    /// Every permission-mode selection delivered so far, in order.
    #[must_use]
    pub fn mode_changes(&self) -> Vec<PermissionMode> {
        self.modes.lock().unwrap().clone()
    }

    /// Every model selection delivered so far, in order.
    #[must_use]
    pub fn model_changes(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for MockRuntime {
    async fn next_event(&self) -> Option<RuntimeEvent> {
        loop {
            let notified = self.wakeup.notified();
            {
                let mut queue = self.events.lock().unwrap();
                if let Some(event) = queue.pop_front() {
                    // Leave a wakeup behind for the next pull.
                    if !queue.is_empty() {
                        self.wakeup.notify_one();
                    }
                    return Some(event);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    async fn submit(&self, input: RuntimeInput) -> anyhow::Result<()> {
        self.submitted.lock().unwrap().push(input);
        Ok(())
    }

    async fn resolve_permission(
        &self,
        tool_use_id: &str,
        decision: PermissionDecision,
    ) -> anyhow::Result<()> {
        self.resolutions
            .lock()
            .unwrap()
            .push((tool_use_id.to_string(), decision));
        Ok(())
    }

    async fn interrupt(&self) -> anyhow::Result<()> {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_model(&self, model: &str) -> anyhow::Result<()> {
        self.models.lock().unwrap().push(model.to_string());
        Ok(())
    }

    async fn set_permission_mode(&self, mode: PermissionMode) -> anyhow::Result<()> {
        self.modes.lock().unwrap().push(mode);
        Ok(())
    }
}

/// Build a plain assistant text turn ending in a successful result.
#[must_use]
pub fn text_turn(text: &str) -> Vec<RuntimeEvent> {
    vec![
        RuntimeEvent::TextDelta {
            parent_id: None,
            text: text.to_string(),
        },
        success_result(),
    ]
}

/// A successful terminal result with empty usage.
#[must_use]
pub fn success_result() -> RuntimeEvent {
    RuntimeEvent::Result(crate::runtime::TurnResult {
        subtype: "success".to_string(),
        is_error: false,
        text: String::new(),
        usage: HashMap::new(),
    })
}
