//! Device-level errors.

use std::time::Duration;

use thiserror::Error;

use super::client::DaemonState;
use crate::adb::AdbError;

/// Errors raised while starting, querying or stopping the daemon.
///
/// All of them are fatal to the current exploration run.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Message encoding failed: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Frame of {0} bytes exceeds the size limit")]
    FrameTooLarge(usize),
    #[error("Connection closed after {received} of {expected} payload bytes")]
    Truncated { expected: usize, received: usize },
    #[error("No response from daemon within {0:?}")]
    Timeout(Duration),
    #[error("Daemon startup failed: {0}")]
    Startup(String),
    #[error("Daemon is {actual:?}, expected {expected:?}")]
    InvalidState {
        actual: DaemonState,
        expected: DaemonState,
    },
    #[error("Waiting for the daemon task failed: {0}")]
    Join(String),
    #[error("Daemon reported failure: {0}")]
    Remote(String),
    #[error("Unexpected daemon response: {0}")]
    UnexpectedResponse(String),
    #[error(transparent)]
    Adb(#[from] AdbError),
}
