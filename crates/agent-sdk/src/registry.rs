//! Live-task registry.
//!
//! Maps task ids to the cancellation token of the matching in-flight
//! handler, so `cancel_task` frames arriving on the read loop can reach
//! tasks running on their own tokio tasks. Entries are added at dispatch
//! and removed the moment a terminal outcome is claimed, which makes a
//! late cancel for a finished task a clean no-op.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Concurrency-safe map from task id to cancellation token. Cloning is
/// cheap and all clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task's token. Registering the same id again replaces the
    /// previous entry, so a redispatched id can never be shadowed by a
    /// stale token.
    pub fn register(&self, task_id: &str, token: CancellationToken) {
        self.inner.lock().insert(task_id.to_owned(), token);
    }

    /// Signal cancellation for a task. Returns whether a live entry was
    /// found; unknown or already-finished ids are ignored.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.inner.lock().get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a task's entry. Idempotent.
    pub fn remove(&self, task_id: &str) {
        self.inner.lock().remove(task_id);
    }

    /// Whether the task is registered and has not reported a terminal
    /// outcome yet.
    pub fn is_active(&self, task_id: &str) -> bool {
        self.inner.lock().contains_key(task_id)
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_cancel_fires_token() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        registry.register("t1", token.clone());

        assert!(!token.is_cancelled());
        assert!(registry.cancel("t1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_unknown_task_returns_false() {
        let registry = TaskRegistry::new();
        assert!(!registry.cancel("nope"));
    }

    #[test]
    fn cancel_after_remove_is_a_noop() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        registry.register("t1", token.clone());
        registry.remove("t1");

        assert!(!registry.cancel("t1"));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = TaskRegistry::new();
        registry.register("t1", CancellationToken::new());
        registry.remove("t1");
        registry.remove("t1");
        assert!(registry.is_empty());
    }

    #[test]
    fn repeated_cancel_is_harmless() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        registry.register("t1", token.clone());

        assert!(registry.cancel("t1"));
        assert!(registry.cancel("t1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn reregistering_replaces_the_token() {
        let registry = TaskRegistry::new();
        let stale = CancellationToken::new();
        let fresh = CancellationToken::new();
        registry.register("t1", stale.clone());
        registry.register("t1", fresh.clone());

        registry.cancel("t1");
        assert!(!stale.is_cancelled());
        assert!(fresh.is_cancelled());
    }

    #[test]
    fn tracks_active_tasks() {
        let registry = TaskRegistry::new();
        assert!(!registry.is_active("t1"));

        registry.register("t1", CancellationToken::new());
        registry.register("t2", CancellationToken::new());
        assert!(registry.is_active("t1"));
        assert_eq!(registry.len(), 2);

        registry.remove("t1");
        assert!(!registry.is_active("t1"));
        assert!(registry.is_active("t2"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let registry = TaskRegistry::new();
        let clone = registry.clone();
        let token = CancellationToken::new();

        registry.register("t1", token.clone());
        assert!(clone.is_active("t1"));
        assert!(clone.cancel("t1"));
        assert!(token.is_cancelled());
    }
}
