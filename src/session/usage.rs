//! Per-session token usage accounting
//!
//! Accumulates usage across the terminal events of one prompt call. Totals
//! are additive and never reset mid-turn; `reset` runs at the start of each
//! new prompt call. The context-window estimate is the minimum declared
//! window across all models used, with a fixed fallback when no model
//! reports one.

use std::collections::HashMap;

use crate::protocol::UsageUpdate;
use crate::runtime::ModelUsage;

/// Context window assumed when no model usage declares one.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Running token-usage totals for one prompt call's accumulation window.
#[derive(Debug, Default)]
pub struct AccumulatedUsage {
    input_tokens: u64,
    output_tokens: u64,
    cache_read_tokens: u64,
    cache_write_tokens: u64,
    context_window: Option<u64>,
}

impl AccumulatedUsage {
    /// Create a zeroed accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all counters at the start of a new prompt call.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold a terminal event's per-model usage map into the totals.
    pub fn add_turn(&mut self, usage: &HashMap<String, ModelUsage>) {
        for model_usage in usage.values() {
            self.input_tokens += model_usage.input_tokens;
            self.output_tokens += model_usage.output_tokens;
            self.cache_read_tokens += model_usage.cache_read_tokens;
            self.cache_write_tokens += model_usage.cache_write_tokens;
            if let Some(window) = model_usage.context_window {
                self.context_window = Some(match self.context_window {
                    Some(current) => current.min(window),
                    None => window,
                });
            }
        }
    }

    /// Current totals as a client-facing snapshot.
    #[must_use]
    pub fn snapshot(&self) -> UsageUpdate {
        UsageUpdate {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cache_read_tokens: self.cache_read_tokens,
            cache_write_tokens: self.cache_write_tokens,
            context_window: self.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW),
        }
    }
}
