//! The process-wide supervisor: tracks in-flight source-manager operations by `(name,
//! type)`, and provides the "conjoined context" merging the caller's cancellation
//! signal with the supervisor's own lifetime signal.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// The kind of operation an in-flight entry represents, for diagnostics and for callers
/// that want to distinguish e.g. a checkout from a version listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Fetch,
    Checkout,
    ListVersions,
    ListPackages,
    DeriveManifest,
    Export,
}

/// Tracks in-flight operations by `(source name, operation kind)` and exposes the
/// process's overall lifetime cancellation token.
pub struct Supervisor {
    lifetime: CancellationToken,
    in_flight: Mutex<HashMap<(String, OperationKind), usize>>,
    idle: Notify,
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        Self { lifetime: CancellationToken::new(), in_flight: Mutex::new(HashMap::new()), idle: Notify::new() }
    }

    /// Returns a token that fires when either `caller_token` or the supervisor's own
    /// lifetime token fires — the "conjoined context" every gateway subprocess races its
    /// wait against.
    #[must_use]
    pub fn child_token(&self, caller_token: &CancellationToken) -> CancellationToken {
        let merged = CancellationToken::new();
        let merged_for_lifetime = merged.clone();
        let lifetime = self.lifetime.clone();
        tokio::spawn(async move {
            lifetime.cancelled().await;
            merged_for_lifetime.cancel();
        });
        let merged_for_caller = merged.clone();
        let caller_token = caller_token.clone();
        tokio::spawn(async move {
            caller_token.cancelled().await;
            merged_for_caller.cancel();
        });
        merged
    }

    /// Records the start of an operation against `source_name`, returning a guard that
    /// decrements the counter (and notifies any [`Self::wait`] caller) on drop.
    pub fn begin(&self, source_name: impl Into<String>, kind: OperationKind) -> OperationGuard<'_> {
        let key = (source_name.into(), kind);
        {
            let mut guard = self.in_flight.lock().expect("supervisor mutex poisoned");
            *guard.entry(key.clone()).or_insert(0) += 1;
        }
        OperationGuard { supervisor: self, key }
    }

    /// Blocks until every tracked operation has completed.
    pub async fn wait(&self) {
        loop {
            let empty = {
                let guard = self.in_flight.lock().expect("supervisor mutex poisoned");
                guard.values().all(|count| *count == 0)
            };
            if empty {
                return;
            }
            self.idle.notified().await;
        }
    }

    /// Cancels the supervisor's lifetime token, propagating to every child token in use.
    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard decrementing a supervisor's in-flight counter on drop.
pub struct OperationGuard<'a> {
    supervisor: &'a Supervisor,
    key: (String, OperationKind),
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.supervisor.in_flight.lock().expect("supervisor mutex poisoned");
        if let Some(count) = guard.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
        drop(guard);
        self.supervisor.idle.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_with_nothing_in_flight() {
        let supervisor = Supervisor::new();
        supervisor.wait().await;
    }

    #[tokio::test]
    async fn wait_blocks_until_guard_drops() {
        let supervisor = Supervisor::new();
        let guard = supervisor.begin("source-a", OperationKind::Fetch);
        let supervisor_ref = &supervisor;
        let waiter = async {
            supervisor_ref.wait().await;
        };
        drop(guard);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await.expect("wait should complete after guard drops");
    }

    #[tokio::test]
    async fn child_token_fires_when_lifetime_cancelled() {
        let supervisor = Supervisor::new();
        let caller_token = CancellationToken::new();
        let child = supervisor.child_token(&caller_token);
        supervisor.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), child.cancelled()).await.expect("child token should fire");
    }

    #[tokio::test]
    async fn child_token_fires_when_caller_cancels() {
        let supervisor = Supervisor::new();
        let caller_token = CancellationToken::new();
        let child = supervisor.child_token(&caller_token);
        caller_token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), child.cancelled()).await.expect("child token should fire");
    }
}
