//! Cancellable wait scopes.
//!
//! A [`WaitScope`] bounds how long an operation may wait for a lock or for
//! backend I/O. It combines an optional deadline with a
//! [`CancellationToken`]; whichever fires first ends the wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A cancellable, optionally time-bounded wait scope.
///
/// Cloning a scope shares its token: cancelling any clone cancels all of
/// them. Use [`WaitScope::child`] for a scope that can be cancelled on its
/// own while still following its parent.
#[derive(Clone, Debug, Default)]
pub struct WaitScope {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl WaitScope {
    /// A scope that only ends on explicit cancellation.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A scope that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// A scope driven by an externally owned token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            token,
        }
    }

    /// Tighten this scope with an additional timeout. The earlier of the
    /// existing deadline and `now + timeout` wins.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        });
        self
    }

    /// A scope cancelled together with this one, but cancellable separately.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    /// Cancel this scope and every clone and child of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns `true` once the scope can no longer be waited on.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Drive `fut` to completion unless the scope ends first.
    ///
    /// Returns `None` when the scope is cancelled or its deadline passes
    /// before `fut` resolves. A scope that is already done never polls `fut`.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_done() {
            return None;
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => None,
                    _ = tokio::time::sleep_until(deadline) => None,
                    out = fut => Some(out),
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => None,
                    out = fut => Some(out),
                }
            }
        }
    }
}
