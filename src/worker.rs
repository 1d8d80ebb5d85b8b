//! Running loads off the caller's thread.
//!
//! A UI thread submits a directory and gets a [`LoadHandle`] back
//! immediately. It can poll the handle from its event loop, await it, or
//! cancel it. Cancellation is cooperative: the loader checks the token
//! between files and between pipeline stages.
//!
//! Dropping the [`LoadWorker`] cancels every load it started and returns
//! without waiting for them, so it may happen on an async thread.

use crate::volume_loader::{LoadOptions, LoadedVolume, VolumeLoader, VolumeLoaderError};

use futures::channel::oneshot;
use std::{
    io,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Shared between the caller and a running load.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is also cancelled when `self` is. Cancelling the child
    /// leaves `self` alone. Only the direct parent is tracked.
    pub fn child_token(&self) -> Self {
        Self {
            cancelled: Arc::default(),
            parent: Some(Arc::clone(&self.cancelled)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.load(Ordering::SeqCst))
    }
}

pub type LoadResult = Result<LoadedVolume, VolumeLoaderError>;

/// Background executor for volume loads.
pub struct LoadWorker {
    // Only `None` while dropping.
    runtime: Option<Runtime>,
    shutdown: CancellationToken,
}

impl LoadWorker {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("dicom-stack-loader")
            .build()?;
        Ok(Self {
            runtime: Some(runtime),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start loading `dir`. Returns at once.
    pub fn submit(&self, dir: impl Into<PathBuf>, options: LoadOptions) -> LoadHandle {
        let dir = dir.into();
        let (sender, receiver) = oneshot::channel();
        let token = self.shutdown.child_token();
        let task_token = token.clone();

        let Some(runtime) = &self.runtime else {
            // The dropped sender reads as `WorkerGone`.
            return LoadHandle { receiver, token };
        };
        runtime.spawn_blocking(move || {
            let result = if task_token.is_cancelled() {
                Err(VolumeLoaderError::Cancelled)
            } else {
                VolumeLoader::load_from_directory_cancellable(&dir, &options, &task_token)
            };
            if sender.send(result).is_err() {
                debug!(dir = %dir.display(), "load finished after its handle was dropped");
            }
        });

        LoadHandle { receiver, token }
    }
}

impl Drop for LoadWorker {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(runtime) = self.runtime.take() {
            // Running loads see the cancellation and finish on their own
            // threads. Queued ones are discarded.
            runtime.shutdown_background();
        }
        debug!("load worker shut down");
    }
}

/// The pending result of one submitted load.
pub struct LoadHandle {
    receiver: oneshot::Receiver<LoadResult>,
    token: CancellationToken,
}

impl LoadHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Non-blocking poll for event loops. `None` while still running.
    pub fn try_take(&mut self) -> Option<LoadResult> {
        match self.receiver.try_recv() {
            Ok(result) => result,
            Err(oneshot::Canceled) => Some(Err(VolumeLoaderError::WorkerGone)),
        }
    }

    pub async fn wait(self) -> LoadResult {
        self.receiver
            .await
            .unwrap_or(Err(VolumeLoaderError::WorkerGone))
    }

    /// Block the current thread until the load is done.
    pub fn blocking_wait(self) -> LoadResult {
        futures::executor::block_on(self.wait())
    }
}
