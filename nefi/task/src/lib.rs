//! Cancellation and ordered shutdown, used by every long-running task in
//! the agent and the collector (spec §5).
//!
//! `Shutdown` plays the role `linkerd2-task`/`linkerd2-drain` play in the
//! proxy: a cloneable signal every task polls alongside its normal I/O, so
//! cancellation never requires tearing down a task from the outside.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A cloneable cancellation signal. Cloning shares the same underlying
/// token: cancelling any clone cancels all of them.
#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Releases a list of named resources in the order they were registered,
/// logging each step. Long-running components push their releasable
/// resources (links, readers, streams, channels) onto this as they acquire
/// them, then call [`DrainGuard::release_all`] on cancellation so teardown
/// always runs in reverse-acquisition order (spec §5).
#[derive(Default)]
pub struct DrainGuard {
    steps: Vec<(&'static str, Box<dyn FnOnce() + Send>)>,
}

impl DrainGuard {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn on_release(&mut self, name: &'static str, f: impl FnOnce() + Send + 'static) {
        self.steps.push((name, Box::new(f)));
    }

    /// Runs release steps in reverse order of registration.
    pub fn release_all(self) {
        for (name, step) in self.steps.into_iter().rev() {
            tracing::debug!(resource = name, "releasing");
            step();
        }
    }
}

/// Runs `flush` with a short deadline, as every component attempts one
/// final flush on cancellation before releasing resources.
pub async fn final_flush<F, Fut>(deadline: Duration, flush: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    if tokio::time::timeout(deadline, flush()).await.is_err() {
        tracing::warn!(?deadline, "final flush on shutdown did not complete in time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelling_a_clone_cancels_the_original() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        clone.cancel();
        assert!(shutdown.is_cancelled());
        shutdown.cancelled().await;
    }

    #[test]
    fn drain_guard_releases_in_reverse_order() {
        use std::sync::{Arc, Mutex};
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut guard = DrainGuard::new();
        for name in ["links", "readers", "collections", "event_channel"] {
            let order = order.clone();
            guard.on_release(name, move || order.lock().unwrap().push(name));
        }
        guard.release_all();
        let order = order.lock().unwrap();
        assert_eq!(*order, vec!["event_channel", "collections", "readers", "links"]);
    }
}
