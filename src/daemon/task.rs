//! Supervised background task owning the daemon process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::error::DaemonError;
use crate::adb::{AdbBridge, AdbError, DaemonLaunch};

/// Handle to the worker running the on-device daemon.
///
/// The worker blocks inside [`AdbBridge::run_daemon`] on the tokio blocking
/// pool. The handle is the only way the orchestration side talks to it.
/// Dropping the handle raises the stop flag.
pub struct AgentTask {
    handle: Option<JoinHandle<Result<(), AdbError>>>,
    stop: Arc<AtomicBool>,
}

impl AgentTask {
    /// Launch the daemon on `serial` and return immediately.
    pub fn spawn<A: AdbBridge>(adb: Arc<A>, serial: String, launch: DaemonLaunch) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let handle = tokio::task::spawn_blocking(move || {
            tracing::debug!("Daemon worker started for {} on port {}", serial, launch.port);
            adb.run_daemon(&serial, &launch, &flag)
        });

        Self {
            handle: Some(handle),
            stop,
        }
    }

    /// Whether the worker is still running.
    pub fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Ask the worker to stop the daemon process.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait for the worker to finish.
    ///
    /// With `timeout = None` this waits unconditionally. A worker that
    /// panicked, got cancelled or outlived the timeout is reported as
    /// [`DaemonError::Join`]. A daemon that exited abnormally surfaces its
    /// [`AdbError`].
    pub async fn join(&mut self, timeout: Option<Duration>) -> Result<(), DaemonError> {
        let handle = match self.handle.as_mut() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        let joined = match timeout {
            Some(limit) => tokio::time::timeout(limit, handle).await.map_err(|_| {
                DaemonError::Join(format!("daemon task still running after {:?}", limit))
            })?,
            None => handle.await,
        };
        self.handle = None;

        match joined {
            Ok(outcome) => Ok(outcome?),
            Err(e) => Err(DaemonError::Join(e.to_string())),
        }
    }
}

/// Run one blocking bridge call on the tokio blocking pool.
///
/// The `adb` tool is driven through `std::process`, which must stay off the
/// runtime threads.
pub(crate) async fn run_blocking<A, T, F>(adb: &Arc<A>, call: F) -> Result<T, DaemonError>
where
    A: AdbBridge,
    T: Send + 'static,
    F: FnOnce(&A) -> Result<T, AdbError> + Send + 'static,
{
    let adb = adb.clone();
    let outcome = tokio::task::spawn_blocking(move || call(adb.as_ref()))
        .await
        .map_err(|e| DaemonError::Join(format!("adb worker failed: {}", e)))?;
    Ok(outcome?)
}

impl Drop for AgentTask {
    fn drop(&mut self) {
        if self.is_alive() {
            self.signal_stop();
        }
    }
}
