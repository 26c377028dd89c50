//! Edit interception
//!
//! Lets built-in edit/write tools execute against local storage exactly as
//! they normally would (preserving the runtime's own collision checks), then
//! transparently reverts the physical write and reissues the resulting
//! content through the client's write path, so the client can present a
//! review/diff experience instead of a silent disk mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use crate::client::Client;

/// A completed interception, carrying the data needed for a diff view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedEdit {
    /// The file the tool edited.
    pub path: PathBuf,
    /// Content before the edit, when a prior read or interception cached it.
    pub old_text: Option<String>,
    /// Content after the edit, as reissued through the client.
    pub new_text: String,
}

/// Reroutes built-in file mutations through the client's write path.
///
/// Maintains a path → content cache populated on read completion and
/// refreshed after every successful interception, so a second edit to the
/// same path needs no intervening read.
#[derive(Debug, Default)]
pub struct EditInterceptor {
    cache: HashMap<PathBuf, String>,
}

impl EditInterceptor {
    /// Create an interceptor with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the content observed by a completed file read.
    pub fn on_file_read(&mut self, path: &Path, content: String) {
        self.cache.insert(path.to_path_buf(), content);
    }

    /// The last known content for a path, if any.
    #[must_use]
    pub fn cached(&self, path: &Path) -> Option<&str> {
        self.cache.get(path).map(String::as_str)
    }

    /// Intercept a successful edit-class tool execution.
    ///
    /// Determines the tool's resulting content (whole-file writes carry it
    /// in their input; in-place edits are re-read from storage), reverts the
    /// on-disk file to the cached pre-edit content when one is known, then
    /// reissues the new content through [`Client::write_text_file`]. Returns
    /// `None` when the input names no file path.
    pub async fn intercept(
        &mut self,
        tool_name: &str,
        input: &Value,
        client: &dyn Client,
    ) -> anyhow::Result<Option<InterceptedEdit>> {
        let Some(path) = input.get("file_path").and_then(Value::as_str) else {
            return Ok(None);
        };
        let path = PathBuf::from(path);

        let new_text = if tool_name == "Write" {
            input
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        } else {
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read edited file {}", path.display()))?
        };

        let old_text = self.cache.get(&path).cloned();
        if let Some(previous) = &old_text {
            // Revert step: restore the pre-edit content before the client
            // write, so the only durable mutation goes through the client.
            tokio::fs::write(&path, previous)
                .await
                .with_context(|| format!("failed to revert {}", path.display()))?;
        }

        client.write_text_file(&path, &new_text).await?;
        self.cache.insert(path.clone(), new_text.clone());

        Ok(Some(InterceptedEdit {
            path,
            old_text,
            new_text,
        }))
    }
}
