use std::future::Future;
use std::sync::LazyLock;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{internal_error, BridgeResult};

static BACKGROUND_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("analytics-bridge-worker")
        .enable_all()
        .build()
        .expect("failed to build background tokio runtime")
});

/// Shared pool that runs the handlers flagged as background work.
///
/// The bridge never creates threads per call; everything goes through the runtime behind this
/// handle.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    handle: Handle,
}

impl WorkerPool {
    /// Uses the runtime supplied by the host.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the ambient tokio runtime when called from one, otherwise a lazily started shared
    /// runtime.
    pub fn current() -> Self {
        match Handle::try_current() {
            Ok(handle) => Self::new(handle),
            Err(_) => Self::new(BACKGROUND_RUNTIME.handle().clone()),
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a detached task.
    ///
    /// When the runtime has already shut down the future is dropped without being polled, so
    /// callers that must answer someone do it from a drop guard inside the future.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let _ = self.handle.spawn(future);
    }

    /// Runs blocking SDK work on the runtime's blocking threads and waits for it.
    ///
    /// A panic inside `work` is reported as an internal error.
    pub async fn run_blocking<F, T>(&self, work: F) -> BridgeResult<T>
    where
        F: FnOnce() -> BridgeResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match self.handle.spawn_blocking(work).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(internal_error("background handler panicked")),
            Err(err) => Err(internal_error(format!("background handler did not complete: {err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;

    #[tokio::test(flavor = "current_thread")]
    async fn current_prefers_the_ambient_runtime() {
        let pool = WorkerPool::current();
        let (tx, rx) = oneshot::channel();
        pool.spawn(async move {
            let _ = tx.send(7);
        });
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[test]
    fn current_falls_back_to_the_shared_runtime() {
        let pool = WorkerPool::current();
        let (tx, rx) = oneshot::channel();
        pool.spawn(async move {
            let _ = tx.send("done");
        });
        assert_eq!(futures::executor::block_on(rx).unwrap(), "done");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blocking_panics_become_internal_errors() {
        let pool = WorkerPool::current();
        let err = pool
            .run_blocking::<_, ()>(|| panic!("sdk exploded"))
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "bridge/internal");
        assert_eq!(pool.run_blocking(|| Ok(3)).await.unwrap(), 3);
    }
}
