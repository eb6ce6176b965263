//! Persisted explorer settings.
//! Stored in the platform-specific config directory via `directories::ProjectDirs`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::daemon::{DaemonConfig, DEFAULT_DAEMON_PORT, DEFAULT_DAEMON_RUNNER};
use crate::exploration::ExplorationConfig;
use crate::playback::MemoryPlayback;
use crate::store::{ActionTrace, StoreError};
use crate::strategy::{
    AllowRuntimePermission, EngineConfig, Explore, GuiFullyExploredBack, ResetOnLeave, Strategy,
    Terminate, DEFAULT_EXHAUSTION_THRESHOLD,
};

/// Explorer settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerSettings {
    /// ADB device serial number
    pub device_serial: String,
    /// Package of the app under exploration
    pub app_package: String,
    /// Path to the adb executable
    pub adb_path: String,
    /// Port forwarded to the daemon
    pub daemon_port: u16,
    /// Instrumentation component running the daemon
    pub daemon_runner: String,
    /// Round-trip timeout in milliseconds
    pub socket_timeout_ms: u64,
    /// Startup confirmation timeout in milliseconds
    pub server_start_timeout_ms: u64,
    /// Delay between startup log polls in milliseconds
    pub server_start_query_delay_ms: u64,
    /// Bound for stopping the daemon in milliseconds (0 waits forever)
    pub close_timeout_ms: u64,
    /// Number of actions after which the run ends (0 disables)
    pub action_limit: usize,
    /// Run time after which the run ends, in seconds (0 disables)
    pub time_limit_secs: u64,
    /// Actions per widget before a screen counts as explored
    pub widget_exhaustion_threshold: u32,
    /// Recorded trace to replay instead of exploring (empty disables)
    pub playback_trace: String,
    /// Directory with instrumentation files (empty disables coverage)
    pub coverage_dir: String,
    /// Device log tag carrying executed statements as `<id>;<timestamp>`
    pub coverage_log_tag: String,
    /// Directory for the trace and model dumps (empty disables)
    pub output_dir: String,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            device_serial: String::new(),
            app_package: String::new(),
            adb_path: "adb".to_string(),
            daemon_port: DEFAULT_DAEMON_PORT,
            daemon_runner: DEFAULT_DAEMON_RUNNER.to_string(),
            socket_timeout_ms: 60_000,
            server_start_timeout_ms: 20_000,
            server_start_query_delay_ms: 2_000,
            close_timeout_ms: 0,
            action_limit: 100,
            time_limit_secs: 0,
            widget_exhaustion_threshold: DEFAULT_EXHAUSTION_THRESHOLD,
            playback_trace: String::new(),
            coverage_dir: String::new(),
            coverage_log_tag: "ExecutedStatements".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

impl ExplorerSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "moderras", "droid-explorer")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file.
    pub fn load() -> Self {
        let loaded: Self = Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        loaded.backfilled()
    }

    /// Replace values older config files left empty with the defaults.
    fn backfilled(mut self) -> Self {
        let defaults = Self::default();

        if self.adb_path.is_empty() {
            self.adb_path = defaults.adb_path;
        }
        if self.daemon_runner.is_empty() {
            self.daemon_runner = defaults.daemon_runner;
        }
        if self.coverage_log_tag.is_empty() {
            self.coverage_log_tag = defaults.coverage_log_tag;
        }
        if self.daemon_port == 0 {
            self.daemon_port = defaults.daemon_port;
        }
        if self.socket_timeout_ms == 0 {
            self.socket_timeout_ms = defaults.socket_timeout_ms;
        }
        if self.server_start_timeout_ms == 0 {
            self.server_start_timeout_ms = defaults.server_start_timeout_ms;
        }
        if self.server_start_query_delay_ms == 0 {
            self.server_start_query_delay_ms = defaults.server_start_query_delay_ms;
        }

        self
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir().ok_or("Cannot determine config directory")?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let path = dir.join("settings.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(&path, content)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Override settings from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override settings from `lookup`, keyed by environment variable name.
    ///
    /// Unparsable numbers are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    tracing::warn!("Ignoring invalid value {:?} for {}", value, key);
                    None
                }
            }
        }

        if let Some(value) = lookup("DEVICE_SERIAL") {
            self.device_serial = value;
        }
        if let Some(value) = lookup("APP_PACKAGE") {
            self.app_package = value;
        }
        if let Some(value) = lookup("ADB_PATH") {
            self.adb_path = value;
        }
        if let Some(value) = lookup("PLAYBACK_TRACE") {
            self.playback_trace = value;
        }
        if let Some(value) = lookup("COVERAGE_DIR") {
            self.coverage_dir = value;
        }
        if let Some(value) = lookup("COVERAGE_LOG_TAG") {
            self.coverage_log_tag = value;
        }
        if let Some(value) = lookup("OUTPUT_DIR") {
            self.output_dir = value;
        }
        if let Some(value) = parsed("DAEMON_PORT", lookup("DAEMON_PORT")) {
            self.daemon_port = value;
        }
        if let Some(value) = parsed("SOCKET_TIMEOUT_MS", lookup("SOCKET_TIMEOUT_MS")) {
            self.socket_timeout_ms = value;
        }
        if let Some(value) = parsed("SERVER_START_TIMEOUT_MS", lookup("SERVER_START_TIMEOUT_MS")) {
            self.server_start_timeout_ms = value;
        }
        if let Some(value) = parsed("SERVER_START_QUERY_DELAY_MS", lookup("SERVER_START_QUERY_DELAY_MS")) {
            self.server_start_query_delay_ms = value;
        }
        if let Some(value) = parsed("ACTION_LIMIT", lookup("ACTION_LIMIT")) {
            self.action_limit = value;
        }
        if let Some(value) = parsed("TIME_LIMIT_SECS", lookup("TIME_LIMIT_SECS")) {
            self.time_limit_secs = value;
        }
        if let Some(value) = parsed("WIDGET_EXHAUSTION_THRESHOLD", lookup("WIDGET_EXHAUSTION_THRESHOLD")) {
            self.widget_exhaustion_threshold = value;
        }
    }

    /// Daemon client configuration.
    pub fn daemon_config(&self) -> DaemonConfig {
        let mut config = DaemonConfig::default()
            .with_serial(&self.device_serial)
            .with_port(self.daemon_port)
            .with_runner(&self.daemon_runner)
            .with_socket_timeout(Duration::from_millis(self.socket_timeout_ms))
            .with_server_start(
                Duration::from_millis(self.server_start_timeout_ms),
                Duration::from_millis(self.server_start_query_delay_ms),
            );
        if self.close_timeout_ms > 0 {
            config = config.with_close_timeout(Duration::from_millis(self.close_timeout_ms));
        }
        config
    }

    /// Engine configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_exhaustion_threshold(self.widget_exhaustion_threshold)
    }

    /// Orchestration configuration.
    pub fn exploration_config(&self) -> ExplorationConfig {
        let config = ExplorationConfig::new(&self.app_package);
        if self.output_dir.is_empty() {
            config
        } else {
            config.with_output_dir(&self.output_dir)
        }
    }

    /// Strategies in registration order.
    ///
    /// With a playback trace configured, the run replays it; otherwise it
    /// explores. Budgets are registered first so they win ties.
    pub fn strategy_pool(&self) -> Result<Vec<Strategy>, StoreError> {
        let mut pool: Vec<Strategy> = Vec::new();

        if self.action_limit > 0 {
            pool.push(Terminate::action_budget(self.action_limit).into());
        }
        if self.time_limit_secs > 0 {
            pool.push(Terminate::time_budget(Duration::from_secs(self.time_limit_secs)).into());
        }

        if !self.playback_trace.is_empty() {
            let trace = ActionTrace::load(&self.playback_trace)?;
            pool.push(MemoryPlayback::from_trace(&trace).into());
            return Ok(pool);
        }

        pool.push(ResetOnLeave::new().into());
        pool.push(AllowRuntimePermission::new().into());
        pool.push(GuiFullyExploredBack::new(self.widget_exhaustion_threshold).into());
        pool.push(Explore::new().into());
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ExplorationStrategy;
    use std::collections::HashMap;

    #[test]
    fn test_backfill_of_old_config() {
        let loaded: ExplorerSettings =
            serde_json::from_str(r#"{"app_package": "com.example.app", "adb_path": ""}"#).unwrap();
        let settings = loaded.backfilled();

        assert_eq!(settings.app_package, "com.example.app");
        assert_eq!(settings.adb_path, "adb");
        assert_eq!(settings.daemon_port, DEFAULT_DAEMON_PORT);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DEVICE_SERIAL", "emulator-5554"),
            ("DAEMON_PORT", "6100"),
            ("ACTION_LIMIT", "not-a-number"),
            ("TIME_LIMIT_SECS", " 300 "),
        ]);
        let mut settings = ExplorerSettings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.device_serial, "emulator-5554");
        assert_eq!(settings.daemon_port, 6100);
        assert_eq!(settings.action_limit, 100);
        assert_eq!(settings.time_limit_secs, 300);
    }

    #[test]
    fn test_derived_configs() {
        let settings = ExplorerSettings {
            device_serial: "emulator-5554".to_string(),
            app_package: "com.example.app".to_string(),
            close_timeout_ms: 1500,
            ..ExplorerSettings::default()
        };

        let daemon = settings.daemon_config();
        assert_eq!(daemon.serial, "emulator-5554");
        assert_eq!(daemon.close_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(
            settings.exploration_config().output_dir,
            Some(PathBuf::from("output"))
        );
    }

    #[test]
    fn test_strategy_pool() {
        let settings = ExplorerSettings {
            time_limit_secs: 60,
            ..ExplorerSettings::default()
        };
        let names: Vec<_> = settings
            .strategy_pool()
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();

        assert_eq!(
            names,
            vec![
                "Terminate",
                "Terminate",
                "Reset",
                "AllowRuntimePermission",
                "GuiFullyExploredBack",
                "Explore"
            ]
        );

        let missing = ExplorerSettings {
            playback_trace: "/nonexistent/trace.json".to_string(),
            ..ExplorerSettings::default()
        };
        assert!(missing.strategy_pool().is_err());
    }
}
