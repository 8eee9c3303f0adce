//! Single-flight access token renewal.
//!
//! When several requests hit `401` at once only the first one (the leader)
//! calls the refresh endpoint. Everyone else parks a continuation in a FIFO
//! queue and is woken with the leader's outcome. The flag check-and-set and
//! the queue push share one lock, and settling drains the queue and clears
//! the flag under that same lock, so no request can enqueue behind a refresh
//! that has already finished.
//!
//! Every settled refresh bumps a generation counter. A caller that captured
//! the generation before sending its request and sees it changed by the time
//! its `401` arrives belongs to a storm that was already handled: it reuses
//! the stored token (or gives up if the session was ended) instead of
//! starting another refresh.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::navigator::Navigator;
use crate::storage::Session;
use crate::types::Credential;

/// Default bound on a single refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

type Waiter = oneshot::Sender<Result<String, Error>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    generation: u64,
    queue: VecDeque<Waiter>,
}

/// Owns refresh state for one client.
///
/// Create one per [`ApiClient`](crate::ApiClient); coordinators never share
/// state with each other.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    session: Session,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    timeout: Duration,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("queued", &state.queue.len())
            .field("generation", &state.generation)
            .field("login_path", &self.login_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

enum Turn {
    Leader,
    Follower(oneshot::Receiver<Result<String, Error>>),
    Settled,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(session: Session, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            session,
            navigator,
            login_path: "/login".into(),
            timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Number of callers parked behind the in-flight refresh.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Number of refresh cycles settled so far, plus explicit session ends.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Obtain a fresh access token, joining an in-flight refresh if one exists.
    ///
    /// `refresh` is only invoked when this caller becomes the leader; it
    /// receives the stored refresh token and must exchange it for a new
    /// [`Credential`].
    ///
    /// # Errors
    ///
    /// The leader gets [`Error::MissingRefreshToken`], [`Error::Timeout`] or
    /// whatever `refresh` returned. Followers get [`Error::SessionExpired`].
    /// In every failure case the session has been cleared and the navigator
    /// has been asked to show the login page exactly once per refresh cycle.
    pub async fn renew<F, Fut>(&self, refresh: F) -> Result<String, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Credential, Error>>,
    {
        let generation = self.generation();
        self.renew_since(generation, refresh).await
    }

    /// Like [`renew`](Self::renew), for a token rejected by a request sent
    /// while the coordinator was at `generation`.
    ///
    /// If a refresh has settled since then, no new refresh is started: the
    /// currently stored access token is returned, or
    /// [`Error::SessionExpired`] if the session has been ended in between.
    ///
    /// # Errors
    ///
    /// As for [`renew`](Self::renew).
    pub async fn renew_since<F, Fut>(&self, generation: u64, refresh: F) -> Result<String, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Credential, Error>>,
    {
        match self.join(generation) {
            Turn::Settled => {
                debug!("Refresh already settled for this request");
                self.session.access_token().ok_or(Error::SessionExpired)
            }
            Turn::Follower(rx) => {
                debug!("Refresh in flight, waiting in queue");
                rx.await.unwrap_or(Err(Error::SessionExpired))
            }
            Turn::Leader => {
                let guard = SettleGuard { coordinator: self };
                let outcome = self.lead(refresh).await;
                guard.settle(outcome)
            }
        }
    }

    fn join(&self, seen: u64) -> Turn {
        let mut state = self.state.lock();
        if state.generation != seen {
            Turn::Settled
        } else if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(tx);
            Turn::Follower(rx)
        } else {
            state.refreshing = true;
            Turn::Leader
        }
    }

    async fn lead<F, Fut>(&self, refresh: F) -> Result<String, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Credential, Error>>,
    {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or(Error::MissingRefreshToken)?;

        let credential = tokio::time::timeout(self.timeout, refresh(refresh_token))
            .await
            .map_err(|_| Error::Timeout {
                operation: "token refresh",
                after: self.timeout,
            })??;

        self.session.store_credential(&credential)?;
        Ok(credential.access_token)
    }

    /// Drain the queue in FIFO order and return to idle.
    fn finish(&self, outcome: &Result<String, Error>) {
        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            state.generation += 1;
            std::mem::take(&mut state.queue)
        };

        match outcome {
            Ok(token) => {
                info!(resumed = waiters.len(), "Access token refreshed");
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
            }
            Err(e) => {
                warn!(error = %e, rejected = waiters.len(), "Token refresh failed, ending session");
                for waiter in waiters {
                    let _ = waiter.send(Err(Error::SessionExpired));
                }
                self.clear_and_redirect();
            }
        }
    }

    /// Clear persisted credentials and send the user to the login page.
    ///
    /// Requests already in flight that come back `401` afterwards fail
    /// without another refresh or redirect.
    pub fn end_session(&self) {
        self.state.lock().generation += 1;
        self.clear_and_redirect();
    }

    fn clear_and_redirect(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
        }
        self.navigator.redirect(&self.login_path);
    }
}

/// Settles the refresh even if the leader's future is dropped mid-flight.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
}

impl SettleGuard<'_> {
    fn settle(self, outcome: Result<String, Error>) -> Result<String, Error> {
        self.coordinator.finish(&outcome);
        std::mem::forget(self);
        outcome
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        // Leader cancelled: wake followers with an error but keep the session,
        // since nothing proved the refresh token invalid.
        let waiters = {
            let mut state = self.coordinator.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };
        debug!(rejected = waiters.len(), "Refresh leader dropped");
        for waiter in waiters {
            let _ = waiter.send(Err(Error::SessionExpired));
        }
    }
}
