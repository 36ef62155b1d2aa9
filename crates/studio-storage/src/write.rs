//! Handles for durable writes.

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{Result, StorageError};

enum Inner {
    Done(Result<()>),
    Running(JoinHandle<Result<()>>),
}

/// A durable write that has been scheduled.
///
/// Dropping the handle lets the write finish in the background. Awaiting it
/// yields the outcome of the write.
#[must_use = "drop the handle to ignore the write, or await it for the result"]
pub struct PendingWrite {
    inner: Inner,
}

impl std::fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl PendingWrite {
    /// Run `write` on the blocking pool, or inline when there is no runtime.
    pub(crate) fn spawn<F>(write: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let logged = move || {
            let result = write();
            if let Err(ref e) = result {
                warn!("Durable write failed: {}", e);
            }
            result
        };

        let inner = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Inner::Running(handle.spawn_blocking(logged)),
            Err(_) => Inner::Done(logged()),
        };
        Self { inner }
    }

    /// A write that was not needed.
    pub(crate) fn skipped() -> Self {
        Self {
            inner: Inner::Done(Ok(())),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Done(_) => true,
            Inner::Running(handle) => handle.is_finished(),
        }
    }
}

impl IntoFuture for PendingWrite {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            match self.inner {
                Inner::Done(result) => result,
                Inner::Running(handle) => handle
                    .await
                    .map_err(|e| StorageError::Task(e.to_string()))?,
            }
        })
    }
}
