//! ADB process bridge used by the daemon client.

use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Interval at which a running daemon process is checked for exit or stop.
const DAEMON_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Daemon process exited abnormally: {0}")]
    DaemonExited(String),
}

/// Information about a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    pub status: String,
    pub model: Option<String>,
}

/// How the on-device daemon is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonLaunch {
    /// Port the daemon listens on, on both ends of the forward.
    pub port: u16,
    /// Instrumentation component, as `<package>/<runner class>`.
    pub runner: String,
}

/// Operations the daemon client needs from the device bridge.
///
/// Implementations must be usable from a blocking worker thread.
pub trait AdbBridge: Send + Sync + 'static {
    /// Forward a host TCP port to the same device port.
    fn forward_port(&self, serial: &str, port: u16) -> Result<(), AdbError>;

    /// Drop everything currently buffered in the device log.
    fn clear_logcat(&self, serial: &str) -> Result<(), AdbError>;

    /// Read, without blocking, all buffered log lines carrying `tag`.
    fn read_logcat(&self, serial: &str, tag: &str) -> Result<Vec<String>, AdbError>;

    /// Run the daemon until it exits or `stop` is raised.
    ///
    /// Blocks for the lifetime of the daemon. When `stop` is observed the
    /// daemon process is killed and the call returns `Ok`.
    fn run_daemon(&self, serial: &str, launch: &DaemonLaunch, stop: &AtomicBool)
        -> Result<(), AdbError>;

    /// List all connected devices.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError>;
}

/// [`AdbBridge`] backed by the `adb` command line tool.
///
/// # Example
/// ```rust,no_run
/// use droid_explorer::adb::{AdbBridge, AdbConnection};
///
/// let adb = AdbConnection::new();
/// let devices = adb.list_devices();
/// ```
#[derive(Debug, Clone)]
pub struct AdbConnection {
    adb_path: String,
}

impl Default for AdbConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbConnection {
    /// Create a new ADB bridge with the default `adb` on `PATH`.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
        }
    }

    /// Create a new ADB bridge with a custom ADB path.
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    fn command(&self, serial: &str) -> Command {
        let prefix = get_adb_prefix(&self.adb_path, Some(serial));
        let mut cmd = Command::new(&prefix[0]);
        cmd.args(&prefix[1..]);
        cmd
    }

    fn run(&self, serial: &str, args: &[&str]) -> Result<Output, AdbError> {
        let output = self
            .command(serial)
            .args(args)
            .output()
            .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not found") {
                return Err(AdbError::DeviceNotFound(serial.to_string()));
            }
            return Err(AdbError::CommandFailed(format!(
                "adb {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(output)
    }
}

impl AdbBridge for AdbConnection {
    fn forward_port(&self, serial: &str, port: u16) -> Result<(), AdbError> {
        let spec = format!("tcp:{}", port);
        self.run(serial, &["forward", &spec, &spec])?;
        Ok(())
    }

    fn clear_logcat(&self, serial: &str) -> Result<(), AdbError> {
        self.run(serial, &["logcat", "-c"])?;
        Ok(())
    }

    fn read_logcat(&self, serial: &str, tag: &str) -> Result<Vec<String>, AdbError> {
        let filter = format!("{}:V", tag);
        let output = self.run(serial, &["logcat", "-d", "-v", "raw", "-s", &filter])?;
        Ok(parse_logcat_lines(&String::from_utf8_lossy(&output.stdout)))
    }

    fn run_daemon(
        &self,
        serial: &str,
        launch: &DaemonLaunch,
        stop: &AtomicBool,
    ) -> Result<(), AdbError> {
        let port = launch.port.to_string();
        let mut child = self
            .command(serial)
            .args(["shell", "am", "instrument", "-w", "-r"])
            .args(["-e", "port", &port])
            .arg(&launch.runner)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| AdbError::CommandFailed(e.to_string()))?
            {
                return if status.success() {
                    Ok(())
                } else {
                    Err(AdbError::DaemonExited(status.to_string()))
                };
            }

            if stop.load(Ordering::SeqCst) {
                tracing::debug!("Stop requested, killing daemon process on {}", serial);
                return stop_child(&mut child);
            }

            thread::sleep(DAEMON_POLL_INTERVAL);
        }
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let output = Command::new(&self.adb_path)
            .args(["devices", "-l"])
            .output()
            .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Kill a child process and reap it.
///
/// A child that already exited on its own is not an error.
fn stop_child(child: &mut Child) -> Result<(), AdbError> {
    if let Err(e) = child.kill() {
        let exited = child
            .try_wait()
            .map_err(|e| AdbError::CommandFailed(e.to_string()))?
            .is_some();
        if !exited {
            return Err(AdbError::CommandFailed(format!(
                "failed to kill daemon process: {}",
                e
            )));
        }
    }

    child
        .wait()
        .map_err(|e| AdbError::CommandFailed(format!("failed to reap daemon process: {}", e)))?;
    Ok(())
}

/// Get ADB command prefix with optional device specifier.
pub(crate) fn get_adb_prefix(adb_path: &str, serial: Option<&str>) -> Vec<String> {
    match serial {
        Some(id) => vec![adb_path.to_string(), "-s".to_string(), id.to_string()],
        None => vec![adb_path.to_string()],
    }
}

fn parse_logcat_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--------- beginning of"))
        .map(str::to_string)
        .collect()
}

fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for line in stdout.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 {
            let model = parts
                .iter()
                .find(|p| p.starts_with("model:"))
                .map(|m| m.trim_start_matches("model:").to_string());

            devices.push(DeviceInfo {
                serial: parts[0].to_string(),
                status: parts[1].to_string(),
                model,
            });
        }
    }

    devices
}
