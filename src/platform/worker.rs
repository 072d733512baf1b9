use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::{Result, SyncError};

pub fn run_blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}

/// Runs at most one background job at a time. Starting a job while another
/// is running fails with [`SyncError::Busy`].
#[derive(Debug, Clone, Default)]
pub struct SerialWorker {
    busy: Arc<AtomicBool>,
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SerialWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SyncError::Busy)?;
        Ok(BusyGuard(Arc::clone(&self.busy)))
    }

    /// Runs `job` on a fresh thread. The busy flag clears when the job
    /// returns or panics.
    pub fn spawn<F, T>(&self, job: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.acquire()?;
        debug!("background job started");
        Ok(thread::spawn(move || {
            let _guard = guard;
            job()
        }))
    }

    /// Runs `job` on the calling thread under the same busy rule.
    pub fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T,
    {
        let _guard = self.acquire()?;
        Ok(run_blocking(job))
    }
}
