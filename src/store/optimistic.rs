/// Optimistic apply with snapshot rollback
///
/// A mutation is applied to the in-memory state first, so readers see it
/// immediately, and only then is the durable write awaited. If the write
/// fails the exact pre-mutation state is put back and the error returned.

use std::future::Future;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct OptimisticCache<S> {
    state: RwLock<S>,
}

impl<S: Clone> OptimisticCache<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    /// Read the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn snapshot(&self) -> S {
        self.read(S::clone)
    }

    /// Swap in a freshly loaded state
    pub fn replace(&self, next: S) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Apply `apply` now, then await `write`; restore the snapshot on failure
    ///
    /// The lock is never held across the await. Overlapping mutations on the
    /// same cache must be serialized by the caller.
    pub async fn mutate<T, E, Fut>(&self, apply: impl FnOnce(&mut S), write: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let before = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = guard.clone();
            apply(&mut guard);
            before
        };

        match write.await {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::debug!("Durable write failed; restoring cached state");
                self.replace(before);
                Err(err)
            }
        }
    }
}
