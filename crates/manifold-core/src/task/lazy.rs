//! Lazily-started, memoized async tasks.

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use std::future::Future;

/// The shared handle returned by [`LazyTask::request`].
pub type SharedTask<T> = Shared<BoxFuture<'static, T>>;

/// Wraps a zero-argument async producer so it executes at most once and its
/// result is shared by every requester.
///
/// The producer does not run at construction, nor when [`request`] is
/// called — only when a returned handle is first polled. Concurrent and
/// later requesters all receive clones of the same underlying future, so an
/// expensive or rate-limited call is made only if some downstream consumer
/// actually awaits it, and never more than once.
///
/// The output type must be `Clone`; wrap non-cloneable results in `Arc`.
///
/// [`request`]: LazyTask::request
pub struct LazyTask<T: Clone> {
    future: SharedTask<T>,
}

impl<T> LazyTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wraps `producer` without invoking it.
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        // The async block defers the producer call until first poll.
        let future = async move { producer().await }.boxed().shared();
        Self { future }
    }

    /// Returns the shared future. Every call, concurrent or not, returns a
    /// handle to the same underlying execution.
    #[must_use]
    pub fn request(&self) -> SharedTask<T> {
        self.future.clone()
    }
}
