//! Client for the on-device instrumentation daemon.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use super::error::DaemonError;
use super::protocol::{receive_message, send_message, DeviceCommand, DeviceResponse};
use super::startup::{validate_startup_messages, wait_for_messages, SERVER_START_TAG};
use super::task::{run_blocking, AgentTask};
use crate::adb::{AdbBridge, DaemonLaunch};

/// Default port the daemon listens on.
pub const DEFAULT_DAEMON_PORT: u16 = 59800;

/// Default instrumentation component of the daemon.
pub const DEFAULT_DAEMON_RUNNER: &str =
    "org.uiautomator.daemon.test/android.support.test.runner.AndroidJUnitRunner";

/// Lifecycle of a daemon client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotStarted,
    Starting,
    Ready,
    Closing,
    Closed,
}

/// Configuration for the daemon client.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Serial number of the target device.
    pub serial: String,
    /// Host the forwarded port is reachable on.
    pub host: String,
    /// Forwarded port, identical on host and device.
    pub port: u16,
    /// Instrumentation component that runs the daemon.
    pub runner: String,
    /// Bound for one request/response round trip.
    pub socket_timeout: Duration,
    /// Bound for the startup confirmation to appear in the log.
    pub server_start_timeout: Duration,
    /// Delay between two reads of the log during startup.
    pub server_start_query_delay: Duration,
    /// Bound for the daemon task to finish on close; `None` waits forever.
    pub close_timeout: Option<Duration>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            serial: String::new(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_DAEMON_PORT,
            runner: DEFAULT_DAEMON_RUNNER.to_string(),
            socket_timeout: Duration::from_secs(60),
            server_start_timeout: Duration::from_secs(20),
            server_start_query_delay: Duration::from_millis(2000),
            close_timeout: None,
        }
    }
}

impl DaemonConfig {
    /// Set the device serial number.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Set the forwarded port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the instrumentation component.
    pub fn with_runner(mut self, runner: impl Into<String>) -> Self {
        self.runner = runner.into();
        self
    }

    /// Set the round-trip timeout.
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Set the startup confirmation timeout and poll interval.
    pub fn with_server_start(mut self, timeout: Duration, query_delay: Duration) -> Self {
        self.server_start_timeout = timeout;
        self.server_start_query_delay = query_delay;
        self
    }

    /// Bound the wait for the daemon task on close.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = Some(timeout);
        self
    }
}

/// Owns the daemon lifecycle and the request/response channel to it.
///
/// Requests are strictly sequential: `query` takes `&mut self`, so the
/// response to one command is fully consumed before the next is sent.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use droid_explorer::adb::AdbConnection;
/// use droid_explorer::daemon::{DaemonClient, DaemonConfig, DeviceCommand};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = DaemonConfig::default().with_serial("emulator-5554");
///     let mut client = DaemonClient::new(Arc::new(AdbConnection::new()), config);
///
///     client.start().await?;
///     let response = client.query(&DeviceCommand::FetchGuiState).await?;
///     println!("{:?}", response);
///     client.close().await?;
///     Ok(())
/// }
/// ```
pub struct DaemonClient<A: AdbBridge> {
    adb: Arc<A>,
    config: DaemonConfig,
    state: DaemonState,
    task: Option<AgentTask>,
    stream: Option<TcpStream>,
}

impl<A: AdbBridge> DaemonClient<A> {
    /// Create a client; nothing is launched until [`Self::start`].
    pub fn new(adb: Arc<A>, config: DaemonConfig) -> Self {
        Self {
            adb,
            config,
            state: DaemonState::NotStarted,
            task: None,
            stream: None,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Whether the daemon task is running.
    pub fn is_alive(&self) -> bool {
        self.task.as_ref().map(AgentTask::is_alive).unwrap_or(false)
    }

    /// Forward the daemon port from the host to the device.
    pub async fn forward_port(&self) -> Result<(), DaemonError> {
        let (serial, port) = (self.config.serial.clone(), self.config.port);
        run_blocking(&self.adb, move |adb| adb.forward_port(&serial, port)).await
    }

    /// Launch the daemon and wait until it confirms it is serving.
    pub async fn start(&mut self) -> Result<(), DaemonError> {
        self.expect_state(DaemonState::NotStarted)?;
        self.state = DaemonState::Starting;

        tracing::info!(
            "Starting daemon on {} (port {})",
            self.config.serial,
            self.config.port
        );

        if let Err(e) = self.launch().await {
            tracing::error!("Daemon startup failed: {}", e);
            if let Some(mut task) = self.task.take() {
                task.signal_stop();
                if let Err(join_err) = task.join(self.config.close_timeout).await {
                    tracing::warn!("Daemon task failed after aborted startup: {}", join_err);
                }
            }
            self.state = DaemonState::Closed;
            return Err(e);
        }

        self.state = DaemonState::Ready;
        tracing::info!("Daemon ready on {}", self.config.serial);
        Ok(())
    }

    async fn launch(&mut self) -> Result<(), DaemonError> {
        self.forward_port().await?;
        let serial = self.config.serial.clone();
        run_blocking(&self.adb, move |adb| adb.clear_logcat(&serial)).await?;

        self.task = Some(AgentTask::spawn(
            self.adb.clone(),
            self.config.serial.clone(),
            DaemonLaunch {
                port: self.config.port,
                runner: self.config.runner.clone(),
            },
        ));

        let messages = wait_for_messages(
            &self.adb,
            &self.config.serial,
            SERVER_START_TAG,
            1,
            self.config.server_start_timeout,
            self.config.server_start_query_delay,
        )
        .await?;
        validate_startup_messages(&messages)?;

        if !self.is_alive() {
            return Err(DaemonError::Startup(
                "daemon task is not running after confirming startup".to_string(),
            ));
        }

        Ok(())
    }

    /// Send one command and wait for its response.
    ///
    /// A timeout or socket failure is a device-level error; the connection is
    /// dropped and not retried here.
    pub async fn query(&mut self, command: &DeviceCommand) -> Result<DeviceResponse, DaemonError> {
        self.expect_state(DaemonState::Ready)?;
        self.exchange(command).await
    }

    async fn exchange(&mut self, command: &DeviceCommand) -> Result<DeviceResponse, DaemonError> {
        let limit = self.config.socket_timeout;

        match tokio::time::timeout(limit, self.round_trip(command)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                self.stream = None;
                Err(e)
            }
            Err(_) => {
                self.stream = None;
                Err(DaemonError::Timeout(limit))
            }
        }
    }

    async fn round_trip(&mut self, command: &DeviceCommand) -> Result<DeviceResponse, DaemonError> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream =
                    TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
                stream.set_nodelay(true)?;
                stream
            }
        };
        let stream = self.stream.insert(stream);

        tracing::debug!("-> {:?}", command);
        send_message(stream, command).await?;
        let response: DeviceResponse = receive_message(stream).await?;
        Ok(response)
    }

    /// Stop the daemon and wait for its task to finish.
    pub async fn close(&mut self) -> Result<(), DaemonError> {
        self.expect_state(DaemonState::Ready)?;
        self.state = DaemonState::Closing;
        tracing::info!("Stopping daemon on {}", self.config.serial);

        if let Err(e) = self.exchange(&DeviceCommand::StopDaemon).await {
            tracing::warn!("Daemon did not acknowledge stop: {}", e);
        }
        self.stream = None;

        let mut task = self
            .task
            .take()
            .ok_or_else(|| DaemonError::Join("no daemon task to wait for".to_string()))?;
        task.signal_stop();

        let joined = task.join(self.config.close_timeout).await;
        self.state = DaemonState::Closed;
        joined?;

        if task.is_alive() {
            return Err(DaemonError::Join(
                "daemon task still alive after join".to_string(),
            ));
        }

        tracing::info!("Daemon on {} closed", self.config.serial);
        Ok(())
    }

    fn expect_state(&self, expected: DaemonState) -> Result<(), DaemonError> {
        if self.state != expected {
            return Err(DaemonError::InvalidState {
                actual: self.state,
                expected,
            });
        }
        Ok(())
    }
}
