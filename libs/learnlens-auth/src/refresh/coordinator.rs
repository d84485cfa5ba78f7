use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::RefreshError;
use crate::secret::SecretString;

/// Result every participant of one refresh cycle observes.
pub type RefreshOutcome = Result<SecretString, Arc<RefreshError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshState {
    Idle,
    Refreshing,
}

/// A caller parked behind the in-flight refresh.
struct PendingTicket {
    tx: oneshot::Sender<RefreshOutcome>,
}

struct Inner {
    state: RefreshState,
    queue: Vec<PendingTicket>,
}

/// Single-flight coordinator for access-token refreshes.
///
/// The first caller of [`run`](Self::run) while `Idle` becomes the leader and
/// executes the refresh; callers arriving while it is in flight are queued
/// and receive the leader's outcome. The state lock is never held across an
/// `.await`.
///
/// Clones share state; one coordinator belongs to one API client.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Mutex<Inner>>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RefreshCoordinator")
            .field("state", &inner.state)
            .field("pending", &inner.queue.len())
            .finish()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: RefreshState::Idle,
                queue: Vec::new(),
            })),
        }
    }

    /// `true` while a refresh is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock().state == RefreshState::Refreshing
    }

    /// Number of callers waiting for the in-flight refresh.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Join the current refresh cycle, starting one if none is in flight.
    ///
    /// `refresh` is only invoked when this caller becomes the leader. If the
    /// leader is dropped before it settles, the coordinator returns to idle
    /// and the queued callers rejoin, so one of them leads the next attempt.
    /// [`RefreshError::Abandoned`] is never returned from here.
    ///
    /// # Errors
    ///
    /// Returns the shared refresh failure of this cycle.
    pub async fn run<F, Fut>(&self, refresh: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SecretString, RefreshError>>,
    {
        loop {
            let waiter = {
                let mut inner = self.inner.lock();
                match inner.state {
                    RefreshState::Refreshing => {
                        let (tx, rx) = oneshot::channel();
                        inner.queue.push(PendingTicket { tx });
                        tracing::debug!(
                            pending = inner.queue.len(),
                            "token refresh in flight; request queued"
                        );
                        rx
                    }
                    RefreshState::Idle => {
                        inner.state = RefreshState::Refreshing;
                        break;
                    }
                }
            };

            match waiter.await {
                Ok(Err(e)) if matches!(*e, RefreshError::Abandoned) => {
                    tracing::debug!("token refresh abandoned by its leader; rejoining");
                }
                Ok(outcome) => return outcome,
                Err(_) => tracing::debug!("refresh ticket dropped unsettled; rejoining"),
            }
        }

        tracing::debug!("starting token refresh");
        let guard = LeaderGuard {
            coordinator: self,
            settled: false,
        };
        let outcome = refresh().await.map_err(Arc::new);
        guard.settle(&outcome);
        outcome
    }

    /// Return to idle, then hand `outcome` to every queued caller.
    fn settle(&self, outcome: &RefreshOutcome) {
        let queue = {
            let mut inner = self.inner.lock();
            inner.state = RefreshState::Idle;
            std::mem::take(&mut inner.queue)
        };

        if !queue.is_empty() {
            tracing::debug!(
                pending = queue.len(),
                ok = outcome.is_ok(),
                "releasing queued requests"
            );
        }
        for ticket in queue {
            // The waiter may have been dropped
            _ = ticket.tx.send(outcome.clone());
        }
    }
}

/// Settles the cycle as abandoned if the leader never reaches `settle`.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("token refresh dropped before completion");
            self.coordinator
                .settle(&Err(Arc::new(RefreshError::Abandoned)));
        }
    }
}
