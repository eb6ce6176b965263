//! The observe/decide/act loop driving one exploration run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::actions::{ActionHandler, ExplorationAction};
use crate::adb::AdbBridge;
use crate::daemon::{DaemonClient, DaemonError, DeviceCommand, DeviceResponse, GuiSnapshot};
use crate::model::ScreenContext;
use crate::store::{ActionTrace, CoverageMonitor, ModelStore, StoreError};
use crate::strategy::{EngineError, ExplorationEngine};

/// File name of the recorded action trace in the output directory.
pub const TRACE_FILE_NAME: &str = "trace.json";

/// File name of the model snapshot in the output directory.
pub const MODEL_FILE_NAME: &str = "model.json";

/// Exploration errors.
#[derive(Error, Debug)]
pub enum ExplorationError {
    #[error("Device error: {0}")]
    Daemon(#[from] DaemonError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Observation failed: {0}")]
    Observation(String),
}

/// Configuration for an exploration run.
#[derive(Debug, Clone, Default)]
pub struct ExplorationConfig {
    /// Package of the app under exploration.
    pub app_package: String,
    /// Where the action trace and model snapshot are written, if anywhere.
    pub output_dir: Option<PathBuf>,
}

impl ExplorationConfig {
    pub fn new(app_package: impl Into<String>) -> Self {
        Self {
            app_package: app_package.into(),
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorationSummary {
    /// Actions issued, the final Terminate included.
    pub actions: usize,
    /// Distinct screens observed.
    pub distinct_screens: usize,
    pub termination_reason: Option<String>,
    /// Statement coverage, when monitored.
    pub coverage: Option<f64>,
    pub duration: Duration,
}

/// Drives the daemon with the actions the engine decides.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use droid_explorer::adb::AdbConnection;
/// use droid_explorer::daemon::{DaemonClient, DaemonConfig};
/// use droid_explorer::exploration::{ExplorationConfig, Explorer};
/// use droid_explorer::strategy::{
///     EngineConfig, Explore, ExplorationEngine, GuiFullyExploredBack, ResetOnLeave, Terminate,
/// };
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = DaemonClient::new(
///         Arc::new(AdbConnection::new()),
///         DaemonConfig::default().with_serial("emulator-5554"),
///     );
///     let engine = ExplorationEngine::new(
///         EngineConfig::default(),
///         vec![
///             Explore::new().into(),
///             GuiFullyExploredBack::new(1).into(),
///             ResetOnLeave::new().into(),
///             Terminate::action_budget(100).into(),
///         ],
///     );
///
///     let mut explorer = Explorer::new(client, engine, ExplorationConfig::new("com.example.app"));
///     let summary = explorer.explore().await?;
///     println!("{:?}", summary);
///     Ok(())
/// }
/// ```
pub struct Explorer<A: AdbBridge> {
    client: DaemonClient<A>,
    engine: ExplorationEngine,
    store: Arc<ModelStore>,
    handler: ActionHandler,
    trace: ActionTrace,
    coverage: Option<CoverageMonitor>,
    config: ExplorationConfig,
}

impl<A: AdbBridge> Explorer<A> {
    pub fn new(client: DaemonClient<A>, engine: ExplorationEngine, config: ExplorationConfig) -> Self {
        Self {
            client,
            engine,
            store: Arc::new(ModelStore::new()),
            handler: ActionHandler::new(config.app_package.clone()),
            trace: ActionTrace::new(config.app_package.clone()),
            coverage: None,
            config,
        }
    }

    /// Monitor statement coverage after every action.
    pub fn with_coverage(mut self, monitor: CoverageMonitor) -> Self {
        self.coverage = Some(monitor);
        self
    }

    /// Shared handle to the model store, readable while and after running.
    pub fn store(&self) -> Arc<ModelStore> {
        self.store.clone()
    }

    pub fn trace(&self) -> &ActionTrace {
        &self.trace
    }

    pub fn client(&self) -> &DaemonClient<A> {
        &self.client
    }

    /// Start the daemon, run until terminated, and stop the daemon.
    ///
    /// The daemon is stopped even when the run fails; the run's error wins
    /// over a failure to stop.
    pub async fn explore(&mut self) -> Result<ExplorationSummary, ExplorationError> {
        self.client.start().await?;

        let outcome = self.run().await;
        let closed = self.client.close().await;

        match (outcome, closed) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!("Failed to stop daemon after error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Run the loop on a started daemon until a Terminate is issued.
    ///
    /// Whatever was recorded is persisted even when the run fails.
    pub async fn run(&mut self) -> Result<ExplorationSummary, ExplorationError> {
        let started = Instant::now();
        let outcome = self.run_loop(started).await;

        match outcome {
            Ok(()) => {
                self.persist()?;
                Ok(self.summary(started.elapsed()))
            }
            Err(e) => {
                tracing::error!("Exploration halted: {}", e);
                if let Err(persist_err) = self.persist() {
                    tracing::warn!("Failed to persist partial results: {}", persist_err);
                }
                Err(e)
            }
        }
    }

    async fn run_loop(&mut self, started: Instant) -> Result<(), ExplorationError> {
        loop {
            let snapshot = self.fetch_snapshot().await?;
            let screen = self.observe(snapshot).await?;

            let action = self.engine.decide(
                &self.store,
                screen.clone(),
                started.elapsed(),
                &self.config.app_package,
            )?;
            tracing::info!("Action #{}: {}", self.engine.action_count(), action);

            self.execute(&action).await?;
            self.trace.record(action.clone(), &screen);

            if let Some(monitor) = &self.coverage {
                monitor.update();
            }

            if action.is_terminate() {
                return Ok(());
            }
        }
    }

    async fn fetch_snapshot(&mut self) -> Result<GuiSnapshot, DaemonError> {
        match self.client.query(&DeviceCommand::FetchGuiState).await? {
            DeviceResponse::GuiState(snapshot) => Ok(snapshot),
            DeviceResponse::Failure { message } => Err(DaemonError::Remote(message)),
            other => Err(DaemonError::UnexpectedResponse(format!("{:?}", other))),
        }
    }

    /// Turn a snapshot into a screen and record it.
    ///
    /// Decoding and identity hashing run on the blocking pool, where widget
    /// identities are hashed in parallel before the screen identity joins them.
    async fn observe(&self, snapshot: GuiSnapshot) -> Result<Arc<ScreenContext>, ExplorationError> {
        let top_package = snapshot.top_package.clone();
        let screen = tokio::task::spawn_blocking(move || {
            let image = match snapshot.decode_screenshot() {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!("Undecodable screen capture, identities fall back to content: {}", e);
                    None
                }
            };
            ScreenContext::from_snapshot(snapshot.widgets, image.as_ref())
        })
        .await
        .map_err(|e| ExplorationError::Observation(e.to_string()))?;

        tracing::debug!(
            "Observed screen {} with {} widgets in {}",
            screen.uid(),
            screen.widgets().len(),
            top_package
        );
        Ok(self.store.record_observation(screen))
    }

    async fn execute(&mut self, action: &ExplorationAction) -> Result<(), DaemonError> {
        let command = self.handler.command_for(action);
        let response = self.client.query(&command).await?;
        self.handler.check_response(action, response)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let dir = match &self.config.output_dir {
            Some(dir) => dir,
            None => return Ok(()),
        };

        self.trace.save(dir.join(TRACE_FILE_NAME))?;
        self.store.snapshot().save(dir.join(MODEL_FILE_NAME))?;
        tracing::info!("Exploration results written to {}", dir.display());
        Ok(())
    }

    fn summary(&self, duration: Duration) -> ExplorationSummary {
        ExplorationSummary {
            actions: self.engine.action_count(),
            distinct_screens: self.store.screen_count(),
            termination_reason: self.engine.termination_reason().map(str::to_string),
            coverage: self.coverage.as_ref().map(CoverageMonitor::current_coverage),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::{spawn_fake_daemon, test_config, DaemonState, FakeAdb};
    use crate::model::{button, Bounds};
    use crate::playback::MemoryPlayback;
    use crate::store::{ModelSnapshot, StatementRecord};
    use crate::strategy::{EngineConfig, Explore, ResetOnLeave, Strategy, Terminate};
    use std::collections::HashMap;
    use uuid::Uuid;

    const APP: &str = "com.example.app";

    fn app_snapshot() -> GuiSnapshot {
        GuiSnapshot {
            widgets: vec![
                button("A", "a", Bounds::new(0, 0, 100, 40)),
                button("B", "b", Bounds::new(0, 50, 100, 40)),
            ],
            screenshot: None,
            top_package: APP.to_string(),
        }
    }

    fn budget_pool(budget: usize) -> Vec<Strategy> {
        vec![
            Explore::new().into(),
            ResetOnLeave::new().into(),
            Terminate::action_budget(budget).into(),
        ]
    }

    async fn explorer(
        pool: Vec<Strategy>,
        config: ExplorationConfig,
    ) -> (Explorer<FakeAdb>, Arc<std::sync::Mutex<Vec<DeviceCommand>>>) {
        let (port, received) = spawn_fake_daemon(vec![app_snapshot()]).await;
        let client = DaemonClient::new(Arc::new(FakeAdb::confirming()), test_config(port));
        let engine = ExplorationEngine::new(EngineConfig::default(), pool);
        (Explorer::new(client, engine, config), received)
    }

    #[tokio::test]
    async fn test_explore_until_budget() {
        let (mut explorer, received) =
            explorer(budget_pool(3), ExplorationConfig::new(APP)).await;

        let summary = explorer.explore().await.unwrap();
        assert_eq!(summary.actions, 4);
        assert_eq!(summary.distinct_screens, 1);
        assert!(summary.termination_reason.unwrap().contains("action budget"));
        assert_eq!(summary.coverage, None);
        assert_eq!(explorer.client().state(), DaemonState::Closed);

        let commands = received.lock().unwrap().clone();
        assert_eq!(
            commands,
            vec![
                DeviceCommand::FetchGuiState,
                DeviceCommand::LaunchApp {
                    package: APP.to_string()
                },
                DeviceCommand::FetchGuiState,
                DeviceCommand::Perform {
                    gesture: crate::actions::GestureKind::Click,
                    x: 50,
                    y: 20
                },
                DeviceCommand::FetchGuiState,
                DeviceCommand::Perform {
                    gesture: crate::actions::GestureKind::Click,
                    x: 50,
                    y: 70
                },
                DeviceCommand::FetchGuiState,
                DeviceCommand::Terminate,
                DeviceCommand::StopDaemon,
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_run_still_stops_daemon_and_persists() {
        let dir = std::env::temp_dir().join(format!("exploration_{}", Uuid::new_v4()));
        let pool = vec![Terminate::action_budget(10).into()];
        let (mut explorer, received) =
            explorer(pool, ExplorationConfig::new(APP).with_output_dir(&dir)).await;

        let err = explorer.explore().await.unwrap_err();
        assert!(matches!(
            err,
            ExplorationError::Engine(EngineError::NoApplicableStrategy(_))
        ));
        assert_eq!(explorer.client().state(), DaemonState::Closed);
        assert_eq!(
            received.lock().unwrap().last(),
            Some(&DeviceCommand::StopDaemon)
        );

        let model = ModelSnapshot::load(dir.join(MODEL_FILE_NAME)).unwrap();
        assert_eq!(model.observations.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_rejected_action_is_not_recorded() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                while let Ok(command) = crate::daemon::receive_message::<_, DeviceCommand>(&mut socket).await {
                    let response = match command {
                        DeviceCommand::FetchGuiState => DeviceResponse::GuiState(app_snapshot()),
                        DeviceCommand::Perform { .. } => DeviceResponse::Failure {
                            message: "widget vanished".to_string(),
                        },
                        _ => DeviceResponse::Ack,
                    };
                    if crate::daemon::send_message(&mut socket, &response).await.is_err() {
                        break;
                    }
                }
            }
        });

        let dir = std::env::temp_dir().join(format!("exploration_{}", Uuid::new_v4()));
        let client = DaemonClient::new(Arc::new(FakeAdb::confirming()), test_config(port));
        let engine = ExplorationEngine::new(EngineConfig::default(), budget_pool(10));
        let mut explorer =
            Explorer::new(client, engine, ExplorationConfig::new(APP).with_output_dir(&dir));

        let err = explorer.explore().await.unwrap_err();
        assert!(matches!(err, ExplorationError::Daemon(DaemonError::Remote(_))));

        let trace = ActionTrace::load(dir.join(TRACE_FILE_NAME)).unwrap();
        assert_eq!(trace.len(), 1);
        assert!(matches!(trace.records[0].action, ExplorationAction::Reset));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_recorded_run_replays() {
        let dir = std::env::temp_dir().join(format!("exploration_{}", Uuid::new_v4()));
        let (mut recording, _) =
            explorer(budget_pool(3), ExplorationConfig::new(APP).with_output_dir(&dir)).await;
        recording.explore().await.unwrap();

        let trace = ActionTrace::load(dir.join(TRACE_FILE_NAME)).unwrap();
        assert_eq!(trace.len(), 4);

        let playback = MemoryPlayback::from_trace(&trace);
        let (mut replay, received) =
            explorer(vec![playback.into()], ExplorationConfig::new(APP)).await;
        let summary = replay.explore().await.unwrap();

        assert_eq!(summary.actions, 4);
        let replayed: Vec<_> = received
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c != DeviceCommand::FetchGuiState)
            .cloned()
            .collect();
        assert_eq!(replayed.len(), 5);
        assert_eq!(replayed[3], DeviceCommand::Terminate);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_coverage_is_reported() {
        let monitor = CoverageMonitor::new(
            HashMap::from([
                ("1".to_string(), "void a() dmid=1".to_string()),
                ("2".to_string(), "void b() dmid=2".to_string()),
            ]),
            Box::new(|| vec![StatementRecord::new("2024-01-01 10:00:00.000", "1")]),
        );
        let (explorer, _) = explorer(budget_pool(1), ExplorationConfig::new(APP)).await;
        let mut explorer = explorer.with_coverage(monitor);

        let summary = explorer.explore().await.unwrap();
        assert_eq!(summary.coverage, Some(0.5));
    }
}
