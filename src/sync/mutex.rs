//! FIFO async lock used to serialize module compilation and shared instances

use futures::future::BoxFuture;
use tokio::sync::{Mutex, MutexGuard};

/// Guard returned by [`AsyncMutex::acquire`]; the lock is released on drop
pub type AsyncMutexGuard<'a, T> = MutexGuard<'a, T>;

/// Single-owner async lock with first-come first-served hand-off.
///
/// Waiters are woken in the order they called [`acquire`](Self::acquire),
/// so a slow holder never lets a later caller overtake an earlier one.
/// Only tasks that share a slot (one asset's compile cache, one shared
/// instance) ever contend; independently owned engines are never locked.
#[derive(Debug, Default)]
pub struct AsyncMutex<T = ()> {
    inner: Mutex<T>,
}

impl<T> AsyncMutex<T> {
    /// Create a lock guarding `value`
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Wait until every earlier holder has released, then take ownership
    pub async fn acquire(&self) -> AsyncMutexGuard<'_, T> {
        self.inner.lock().await
    }

    /// Take ownership only if nobody holds or waits for the lock
    pub fn try_acquire(&self) -> Option<AsyncMutexGuard<'_, T>> {
        self.inner.try_lock().ok()
    }

    /// Run `f` while holding the lock.
    ///
    /// The guard is dropped when `f`'s future completes, fails or is
    /// abandoned, so no exit path leaves the lock held.
    pub async fn dispatch<R, F>(&self, f: F) -> R
    where
        F: for<'a> FnOnce(&'a mut T) -> BoxFuture<'a, R>,
    {
        let mut guard = self.acquire().await;
        f(&mut guard).await
    }

    /// Consume the lock, returning the guarded value
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_is_fifo() {
        let mutex = Arc::new(AsyncMutex::new(Vec::new()));
        let guard = mutex.acquire().await;

        let mut tasks = Vec::new();
        for id in 0..5 {
            let mutex = Arc::clone(&mutex);
            tasks.push(tokio::spawn(async move {
                mutex.acquire().await.push(id);
            }));
            // Let the task enqueue before spawning the next one
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(guard);
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*mutex.acquire().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_dispatch_releases_on_error() {
        let mutex = AsyncMutex::new(0u32);

        let result: Result<(), &str> = mutex
            .dispatch(|value| {
                async move {
                    *value += 1;
                    Err("boom")
                }
                .boxed()
            })
            .await;
        assert!(result.is_err());

        let guard = mutex.try_acquire().expect("lock released after failure");
        assert_eq!(*guard, 1);
    }

    #[tokio::test]
    async fn test_dispatch_serializes_holders() {
        let mutex = Arc::new(AsyncMutex::new(Vec::<(u32, bool)>::new()));

        let tasks: Vec<_> = (0..4)
            .map(|id| {
                let mutex = Arc::clone(&mutex);
                tokio::spawn(async move {
                    mutex
                        .dispatch(move |log| {
                            async move {
                                log.push((id, true));
                                tokio::task::yield_now().await;
                                log.push((id, false));
                            }
                            .boxed()
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        // Enter and exit events of one holder are always adjacent
        let log = Arc::try_unwrap(mutex).unwrap().into_inner();
        assert_eq!(log.len(), 8);
        for pair in log.chunks(2) {
            assert_eq!(pair[0].0, pair[1].0);
            assert!(pair[0].1 && !pair[1].1);
        }
    }

    #[test]
    fn test_dropped_waiter_does_not_block() {
        tokio_test::block_on(async {
            let mutex = AsyncMutex::new(());
            let guard = mutex.acquire().await;
            {
                let waiter = mutex.acquire();
                futures::pin_mut!(waiter);
                assert!(futures::poll!(waiter.as_mut()).is_pending());
            }
            drop(guard);
            assert!(mutex.try_acquire().is_some());
        });
    }
}
