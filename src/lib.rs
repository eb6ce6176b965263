// Copyright 2025 ModerRAS
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Droid Explorer
//!
//! Automated GUI exploration of Android apps.
//!
//! The explorer repeatedly observes the current screen through an on-device
//! instrumentation daemon, lets a pool of strategies decide the next action,
//! and sends that action back to the daemon. Widgets and screens get stable,
//! content-derived identities so revisited screens are recognised and
//! already-exercised widgets are not acted upon again and again.
//!
//! ## Exploring an app
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use droid_explorer::{AdbConnection, DaemonClient, ExplorerSettings, ExplorationEngine, Explorer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut settings = ExplorerSettings::load();
//!     settings.app_package = "com.example.app".to_string();
//!
//!     let client = DaemonClient::new(Arc::new(AdbConnection::new()), settings.daemon_config());
//!     let engine = ExplorationEngine::new(settings.engine_config(), settings.strategy_pool()?);
//!
//!     let mut explorer = Explorer::new(client, engine, settings.exploration_config());
//!     let summary = explorer.explore().await?;
//!
//!     println!("{} actions on {} screens", summary.actions, summary.distinct_screens);
//!     Ok(())
//! }
//! ```
//!
//! ## Replaying a recorded run
//!
//! ```rust,no_run
//! use droid_explorer::playback::MemoryPlayback;
//! use droid_explorer::store::ActionTrace;
//! use droid_explorer::strategy::{EngineConfig, ExplorationEngine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let trace = ActionTrace::load("output/trace.json")?;
//! let engine = ExplorationEngine::new(
//!     EngineConfig::default(),
//!     vec![MemoryPlayback::from_trace(&trace).into()],
//! );
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod adb;
pub mod daemon;
pub mod exploration;
pub mod model;
pub mod playback;
pub mod settings;
pub mod store;
pub mod strategy;

pub use actions::{ActionHandler, ExplorationAction, GestureKind};
pub use adb::{AdbBridge, AdbConnection, AdbError};
pub use daemon::{DaemonClient, DaemonConfig, DaemonError, DaemonState, DeviceCommand, DeviceResponse};
pub use exploration::{ExplorationConfig, ExplorationError, ExplorationSummary, Explorer};
pub use model::{ScreenContext, Widget, WidgetData};
pub use playback::{MemoryPlayback, PlaybackTrace};
pub use settings::ExplorerSettings;
pub use store::{ActionTrace, CoverageMonitor, ModelStore};
pub use strategy::{
    EngineConfig, EngineError, ExplorationEngine, ExplorationStrategy, Priority, Strategy,
    StrategyError,
};
