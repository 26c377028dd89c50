//! Pending prompt queue
//!
//! Prompt calls that arrive while a turn is in flight suspend on a oneshot
//! until a different code path resolves them: the translator observing the
//! runtime replay their correlation token, the finishing driver resolving
//! the lowest-order entry defensively, or cancellation short-circuiting the
//! whole queue. Resolution order follows submission order.

use tokio::sync::oneshot;
use uuid::Uuid;

/// How a pending prompt was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingResolution {
    /// The previous turn ended; this caller may begin driving.
    PreviousTurnEnded,
    /// The session was cancelled before the prompt was serviced.
    Cancelled,
}

/// One prompt call waiting for its turn.
#[derive(Debug)]
struct PendingPrompt {
    order: u64,
    correlation: Uuid,
    resolve: oneshot::Sender<PendingResolution>,
}

/// FIFO queue of prompt calls submitted while a turn was in flight.
#[derive(Debug, Default)]
pub struct PromptQueue {
    pending: Vec<PendingPrompt>,
    next_order: u64,
}

impl PromptQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending prompt tagged with its correlation token and
    /// return the receiver its `submit_prompt` call suspends on.
    pub fn register(&mut self, correlation: Uuid) -> oneshot::Receiver<PendingResolution> {
        let (resolve, rx) = oneshot::channel();
        let order = self.next_order;
        self.next_order += 1;
        self.pending.push(PendingPrompt {
            order,
            correlation,
            resolve,
        });
        rx
    }

    /// Resolve the pending prompt matching a replayed correlation token.
    /// Returns `true` when a match was found and resolved.
    pub fn resolve_matching(&mut self, correlation: Uuid) -> bool {
        let Some(position) = self
            .pending
            .iter()
            .position(|entry| entry.correlation == correlation)
        else {
            return false;
        };
        let entry = self.pending.remove(position);
        let _ = entry.resolve.send(PendingResolution::PreviousTurnEnded);
        true
    }

    /// Defensively resolve the lowest-order pending prompt, if any. Called
    /// when a drive completes so no caller hangs if the runtime's replay
    /// signal was lost.
    pub fn resolve_next(&mut self) -> bool {
        let Some(position) = self
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.order)
            .map(|(position, _)| position)
        else {
            return false;
        };
        let entry = self.pending.remove(position);
        let _ = entry.resolve.send(PendingResolution::PreviousTurnEnded);
        true
    }

    /// Resolve every pending prompt as cancelled and clear the queue.
    pub fn cancel_all(&mut self) {
        for entry in self.pending.drain(..) {
            let _ = entry.resolve.send(PendingResolution::Cancelled);
        }
    }

    /// Number of prompts waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no prompts are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_queue_is_empty() {
        let queue = PromptQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn test_resolve_matching_wakes_the_right_caller() {
        let mut queue = PromptQueue::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rx1 = queue.register(first);
        let rx2 = queue.register(second);

        assert!(queue.resolve_matching(second));
        assert_eq!(rx2.await.unwrap(), PendingResolution::PreviousTurnEnded);

        // The other entry is untouched.
        assert_eq!(queue.len(), 1);
        drop(rx1);
    }

    #[test]
    fn test_resolve_matching_unknown_token_returns_false() {
        let mut queue = PromptQueue::new();
        let _rx = queue.register(Uuid::new_v4());
        assert!(!queue.resolve_matching(Uuid::new_v4()));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_next_is_fifo_by_submission_order() {
        let mut queue = PromptQueue::new();
        let rx1 = queue.register(Uuid::new_v4());
        let rx2 = queue.register(Uuid::new_v4());

        assert!(queue.resolve_next());
        assert_eq!(rx1.await.unwrap(), PendingResolution::PreviousTurnEnded);

        assert!(queue.resolve_next());
        assert_eq!(rx2.await.unwrap(), PendingResolution::PreviousTurnEnded);

        assert!(!queue.resolve_next());
    }

    #[tokio::test]
    async fn test_cancel_all_resolves_everything_cancelled() {
        let mut queue = PromptQueue::new();
        let rx1 = queue.register(Uuid::new_v4());
        let rx2 = queue.register(Uuid::new_v4());

        queue.cancel_all();
        assert!(queue.is_empty());
        assert_eq!(rx1.await.unwrap(), PendingResolution::Cancelled);
        assert_eq!(rx2.await.unwrap(), PendingResolution::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_poison_the_queue() {
        let mut queue = PromptQueue::new();
        let token = Uuid::new_v4();
        drop(queue.register(token));

        // Resolution against a dropped receiver is a no-op, not a panic.
        assert!(queue.resolve_matching(token));
        assert!(queue.is_empty());
    }
}
