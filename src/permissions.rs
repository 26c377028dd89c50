//! Permission gate
//!
//! Resolves tool-use authorization requests from the runtime. The session's
//! current mode short-circuits most decisions; everything else escalates to
//! a synchronous client round-trip offering allow-once, allow-always, and
//! reject. Allow-always answers persist as session-scoped rules, merged
//! additively and deduplicated.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::{BridgeError, Result};
use crate::protocol::{
    is_edit_tool, PermissionDecision, PermissionMode, PermissionOutcome, PermissionRequest,
};

/// The distinguished tool that requests leaving plan mode.
pub const EXIT_PLAN_TOOL: &str = "ExitPlanMode";

/// Startup configuration threaded through construction instead of being
/// read from ambient global state.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeConfig {
    /// Whether `bypassPermissions` mode is available. Callers must leave
    /// this off when the process runs privileged and unsandboxed.
    pub allow_bypass: bool,
}

/// Session-scoped authorization state: stored allow-always rules plus the
/// decision procedure over the current mode.
#[derive(Debug, Default)]
pub struct PermissionGate {
    allowed_tools: HashSet<String>,
}

impl PermissionGate {
    /// Create a gate with no stored rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a session-scoped allow-always rule for a tool.
    pub fn allow_always(&mut self, tool_name: &str) {
        self.allowed_tools.insert(tool_name.to_string());
    }

    /// Whether a stored rule pre-approves this tool.
    #[must_use]
    pub fn is_pre_approved(&self, tool_name: &str) -> bool {
        self.allowed_tools.contains(tool_name)
    }

    /// Decide whether a tool invocation may execute.
    ///
    /// Mode short-circuits are applied first; unresolved decisions escalate
    /// to the client. Cancellation observed at any point is treated as
    /// denial with the interrupt flag set.
    pub async fn decide(
        &mut self,
        mode: PermissionMode,
        config: BridgeConfig,
        request: PermissionRequest,
        client: &dyn Client,
        cancel: &CancellationToken,
    ) -> Result<PermissionDecision> {
        if cancel.is_cancelled() {
            return Ok(PermissionDecision::Deny { interrupted: true });
        }

        if self.is_pre_approved(&request.tool_name) {
            return Ok(PermissionDecision::Allow {
                updated_input: None,
            });
        }

        match mode {
            PermissionMode::BypassPermissions if config.allow_bypass => {
                return Ok(PermissionDecision::Allow {
                    updated_input: None,
                });
            }
            PermissionMode::AcceptEdits if is_edit_tool(&request.tool_name) => {
                return Ok(PermissionDecision::Allow {
                    updated_input: None,
                });
            }
            PermissionMode::DontAsk => {
                return Ok(PermissionDecision::Deny { interrupted: false });
            }
            PermissionMode::Plan if request.tool_name != EXIT_PLAN_TOOL => {
                // Plan mode executes nothing; only the exit-plan tool may
                // reach the client as a mode-transition prompt.
                return Ok(PermissionDecision::Deny { interrupted: false });
            }
            _ => {}
        }

        self.escalate(request, client, cancel).await
    }

    async fn escalate(
        &mut self,
        request: PermissionRequest,
        client: &dyn Client,
        cancel: &CancellationToken,
    ) -> Result<PermissionDecision> {
        let tool_name = request.tool_name.clone();
        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                return Ok(PermissionDecision::Deny { interrupted: true });
            }
            outcome = client.request_permission(request) => {
                outcome.map_err(BridgeError::client)?
            }
        };

        match outcome {
            PermissionOutcome::AllowOnce { updated_input } => {
                Ok(PermissionDecision::Allow { updated_input })
            }
            PermissionOutcome::AllowAlways { updated_input } => {
                self.allow_always(&tool_name);
                Ok(PermissionDecision::Allow { updated_input })
            }
            PermissionOutcome::Reject => Ok(PermissionDecision::Deny { interrupted: false }),
            PermissionOutcome::Aborted => Ok(PermissionDecision::Deny { interrupted: true }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockClient;
    use serde_json::json;
    use uuid::Uuid;

    fn request(tool_name: &str) -> PermissionRequest {
        PermissionRequest {
            session_id: Uuid::new_v4(),
            tool_call_id: "toolu_01".to_string(),
            tool_name: tool_name.to_string(),
            input: json!({}),
        }
    }

    fn allowed(decision: &PermissionDecision) -> bool {
        matches!(decision, PermissionDecision::Allow { .. })
    }

    #[tokio::test]
    async fn test_accept_edits_short_circuits_edit_class_only() {
        let mut gate = PermissionGate::new();
        let client = MockClient::new().with_permission_outcome(PermissionOutcome::Reject);
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::AcceptEdits,
                BridgeConfig::default(),
                request("Edit"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(allowed(&decision));
        assert_eq!(client.permission_requests(), 0, "edit must not ask");

        let decision = gate
            .decide(
                PermissionMode::AcceptEdits,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(!allowed(&decision), "non-edit tools still escalate");
        assert_eq!(client.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_bypass_requires_explicit_config() {
        let mut gate = PermissionGate::new();
        let client = MockClient::new().with_permission_outcome(PermissionOutcome::Reject);
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::BypassPermissions,
                BridgeConfig { allow_bypass: true },
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(allowed(&decision));

        // Without the startup flag, bypass degrades to asking.
        let decision = gate
            .decide(
                PermissionMode::BypassPermissions,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(!allowed(&decision));
        assert_eq!(client.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_dont_ask_denies_without_round_trip() {
        let mut gate = PermissionGate::new();
        let client = MockClient::new();
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::DontAsk,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(decision, PermissionDecision::Deny { interrupted: false });
        assert_eq!(client.permission_requests(), 0);
    }

    #[tokio::test]
    async fn test_dont_ask_honors_stored_rules() {
        let mut gate = PermissionGate::new();
        gate.allow_always("Bash");
        let client = MockClient::new();
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::DontAsk,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(allowed(&decision));
    }

    #[tokio::test]
    async fn test_plan_mode_blocks_everything_but_exit_plan() {
        let mut gate = PermissionGate::new();
        let client = MockClient::new().with_permission_outcome(PermissionOutcome::allow_once());
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::Plan,
                BridgeConfig::default(),
                request("Edit"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(decision, PermissionDecision::Deny { interrupted: false });

        let decision = gate
            .decide(
                PermissionMode::Plan,
                BridgeConfig::default(),
                request(EXIT_PLAN_TOOL),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(allowed(&decision), "exit-plan escalates as a mode prompt");
        assert_eq!(client.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_allow_always_persists_a_session_rule() {
        let mut gate = PermissionGate::new();
        let client = MockClient::new().with_permission_outcome(PermissionOutcome::allow_always());
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::Default,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(allowed(&decision));
        assert_eq!(client.permission_requests(), 1);

        // Second call short-circuits on the stored rule.
        let decision = gate
            .decide(
                PermissionMode::Default,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert!(allowed(&decision));
        assert_eq!(client.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_amended_input_flows_into_the_allow_decision() {
        let mut gate = PermissionGate::new();
        let amended = json!({"command": "ls -la"});
        let client = MockClient::new().with_permission_outcome(PermissionOutcome::AllowOnce {
            updated_input: Some(amended.clone()),
        });
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::Default,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(
            decision,
            PermissionDecision::Allow {
                updated_input: Some(amended)
            }
        );
    }

    #[tokio::test]
    async fn test_abort_outcome_is_denial_with_interrupt() {
        let mut gate = PermissionGate::new();
        let client = MockClient::new().with_permission_outcome(PermissionOutcome::Aborted);
        let cancel = CancellationToken::new();

        let decision = gate
            .decide(
                PermissionMode::Default,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(decision, PermissionDecision::Deny { interrupted: true });
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_denies_immediately() {
        let mut gate = PermissionGate::new();
        let client = MockClient::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let decision = gate
            .decide(
                PermissionMode::Default,
                BridgeConfig::default(),
                request("Bash"),
                &client,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(decision, PermissionDecision::Deny { interrupted: true });
        assert_eq!(client.permission_requests(), 0);
    }
}
