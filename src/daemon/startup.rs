//! Startup confirmation through the device log.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::error::DaemonError;
use super::task::run_blocking;
use crate::adb::AdbBridge;

/// Log tag under which the daemon announces it is serving.
pub const SERVER_START_TAG: &str = "uiadaemon_server_start";

/// Message the daemon logs once its server socket is open.
pub const SERVER_START_MSG: &str = "UIAutomation daemon server started.";

/// Printed on some vendor builds where verbose logging is switched off.
/// It arrives with one more benign line ahead of the start message.
pub const LOG_SWITCH_OFF_NOTE: &str =
    "Note: log switch off, only log_main and log_events will have logs!";

/// Poll the device log until at least `min_count` lines with `tag` appear.
///
/// # Arguments
/// * `adb` - Device bridge.
/// * `serial` - Device serial number.
/// * `tag` - Log tag to filter on.
/// * `min_count` - Number of lines to wait for.
/// * `timeout` - Upper bound for the whole wait.
/// * `poll_interval` - Delay between two reads of the log.
pub async fn wait_for_messages<A: AdbBridge>(
    adb: &Arc<A>,
    serial: &str,
    tag: &str,
    min_count: usize,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<String>, DaemonError> {
    let deadline = Instant::now() + timeout;

    loop {
        let (device, filter) = (serial.to_string(), tag.to_string());
        let messages = run_blocking(adb, move |adb| adb.read_logcat(&device, &filter)).await?;
        if messages.len() >= min_count {
            return Ok(messages);
        }

        if Instant::now() >= deadline {
            return Err(DaemonError::Startup(format!(
                "expected {} message(s) with tag {} within {:?}, got {}",
                min_count,
                tag,
                timeout,
                messages.len()
            )));
        }

        sleep(poll_interval).await;
    }
}

/// Check the lines collected while waiting for the daemon to start.
///
/// Exactly one confirmation line is expected. On devices printing
/// [`LOG_SWITCH_OFF_NOTE`], exactly three lines are accepted instead. In both
/// cases the last line must carry [`SERVER_START_MSG`].
pub fn validate_startup_messages(messages: &[String]) -> Result<(), DaemonError> {
    if messages.is_empty() {
        return Err(DaemonError::Startup(format!(
            "no message with tag {} confirming the daemon server start",
            SERVER_START_TAG
        )));
    }

    let expected = if messages.iter().any(|m| m.contains(LOG_SWITCH_OFF_NOTE)) {
        3
    } else {
        1
    };

    if messages.len() != expected {
        return Err(DaemonError::Startup(format!(
            "expected exactly {} message(s) confirming that the daemon server started, got {}:\n{}",
            expected,
            messages.len(),
            messages.join("\n")
        )));
    }

    match messages.last() {
        Some(last) if last.contains(SERVER_START_MSG) => Ok(()),
        _ => Err(DaemonError::Startup(format!(
            "last startup message does not contain \"{}\":\n{}",
            SERVER_START_MSG,
            messages.join("\n")
        ))),
    }
}
