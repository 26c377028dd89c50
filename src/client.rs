//! Client-protocol boundary
//!
//! The capabilities the bridge needs from the editor-side client: a session
//! update sink, a synchronous permission round-trip, and file read/write
//! round-trips used by edit interception. Wire framing and transport are the
//! caller's concern; errors crossing this boundary are opaque.

use std::path::Path;

use async_trait::async_trait;

use crate::protocol::{PermissionOutcome, PermissionRequest, SessionUpdate};

/// Capabilities provided by the connected client.
#[async_trait]
pub trait Client: Send + Sync {
    /// Deliver one session update notification.
    async fn session_update(&self, session_id: uuid::Uuid, update: SessionUpdate)
        -> anyhow::Result<()>;

    /// Ask the user to authorize a tool call. Blocks until the user answers
    /// or the round-trip is aborted.
    async fn request_permission(
        &self,
        request: PermissionRequest,
    ) -> anyhow::Result<PermissionOutcome>;

    /// Read a text file through the client so unsaved editor buffers are
    /// observed.
    async fn read_text_file(&self, path: &Path) -> anyhow::Result<String>;

    /// Write a text file through the client so the edit lands in the
    /// editor's review path instead of silently on disk.
    async fn write_text_file(&self, path: &Path, content: &str) -> anyhow::Result<()>;
}
