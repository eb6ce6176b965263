//! Priority-based arbitration between strategies.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
use super::pool::Strategy;
use crate::actions::ExplorationAction;
use crate::model::ScreenContext;
use crate::store::ModelStore;

/// Default number of actions per widget before a screen counts as exhausted.
pub const DEFAULT_EXHAUSTION_THRESHOLD: u32 = 1;

/// Engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No strategy is applicable on screen {0}")]
    NoApplicableStrategy(uuid::Uuid),
    #[error("Exploration already terminated")]
    Terminated,
    #[error("No strategies registered")]
    EmptyPool,
    #[error("Strategy {strategy} failed: {source}")]
    Strategy {
        strategy: &'static str,
        #[source]
        source: StrategyError,
    },
}

/// Called with the current screen when all its widgets are exhausted.
pub type ExhaustionCallback = Box<dyn Fn(&ScreenContext) + Send + Sync>;

/// Configuration for the exploration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// A screen is exhausted once every actionable widget was acted upon
    /// more than this many times.
    pub exhaustion_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exhaustion_threshold: DEFAULT_EXHAUSTION_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn with_exhaustion_threshold(mut self, threshold: u32) -> Self {
        self.exhaustion_threshold = threshold;
        self
    }
}

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Terminated,
}

/// Chooses the next action by letting registered strategies compete.
///
/// Each step the strategy with the strictly highest [`Priority`] decides.
/// Among equal priorities the one registered first wins, which makes the
/// outcome depend only on the screen, the counters and registration order.
pub struct ExplorationEngine {
    config: EngineConfig,
    strategies: Vec<Strategy>,
    state: EngineState,
    listeners: Vec<ExhaustionCallback>,
    last_action: Option<ExplorationAction>,
    last_screen: Option<Arc<ScreenContext>>,
    action_count: usize,
    termination_reason: Option<String>,
}

impl ExplorationEngine {
    /// Create an engine over `strategies`, in registration order.
    pub fn new(config: EngineConfig, strategies: Vec<Strategy>) -> Self {
        Self {
            config,
            strategies,
            state: EngineState::Running,
            listeners: Vec::new(),
            last_action: None,
            last_screen: None,
            action_count: 0,
            termination_reason: None,
        }
    }

    /// Register one more strategy after the existing ones.
    pub fn register(&mut self, strategy: impl Into<Strategy>) {
        self.strategies.push(strategy.into());
    }

    /// Notify `callback` whenever a screen is found exhausted.
    pub fn on_exhausted(&mut self, callback: ExhaustionCallback) {
        self.listeners.push(callback);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    pub fn last_action(&self) -> Option<&ExplorationAction> {
        self.last_action.as_ref()
    }

    /// Why the run ended, once terminated.
    pub fn termination_reason(&self) -> Option<&str> {
        self.termination_reason.as_deref()
    }

    /// Decide the next action on `screen`.
    ///
    /// The previous widget action is counted against the screen it was
    /// decided on before the strategies are consulted.
    ///
    /// # Arguments
    /// * `store` - Model store holding the observed screens and counters.
    /// * `screen` - The current screen.
    /// * `elapsed` - Time since the run started.
    /// * `app_package` - Package of the app under exploration.
    pub fn decide(
        &mut self,
        store: &ModelStore,
        screen: Arc<ScreenContext>,
        elapsed: Duration,
        app_package: &str,
    ) -> Result<ExplorationAction, EngineError> {
        if self.state == EngineState::Terminated {
            return Err(EngineError::Terminated);
        }
        if self.strategies.is_empty() {
            return Err(EngineError::EmptyPool);
        }

        let context = self.update_context(store, screen, elapsed, app_package);

        let mut winner: Option<(usize, Priority)> = None;
        for (index, strategy) in self.strategies.iter().enumerate() {
            let priority = strategy
                .fitness(&context)
                .map_err(|source| EngineError::Strategy {
                    strategy: strategy.name(),
                    source,
                })?;

            match winner {
                Some((_, best)) if priority <= best => {}
                _ => winner = Some((index, priority)),
            }
        }

        let index = match winner {
            Some((index, priority)) if priority > Priority::None => index,
            _ => return Err(EngineError::NoApplicableStrategy(context.screen.uid())),
        };

        let strategy = &mut self.strategies[index];
        let name = strategy.name();
        tracing::debug!("Strategy {} selected on screen {}", name, context.screen.uid());

        let action = strategy
            .decide(&context)
            .map_err(|source| EngineError::Strategy {
                strategy: name,
                source,
            })?;

        if action.is_terminate() {
            let reason = strategy.termination_reason(&context);
            tracing::info!("Exploration terminated by {}: {}", name, reason);
            self.termination_reason = Some(reason);
            self.state = EngineState::Terminated;
        }

        self.last_action = Some(action.clone());
        self.last_screen = Some(context.screen);
        self.action_count += 1;

        Ok(action)
    }

    fn update_context(
        &mut self,
        store: &ModelStore,
        screen: Arc<ScreenContext>,
        elapsed: Duration,
        app_package: &str,
    ) -> StrategyContext {
        if let (Some(previous), Some(widget)) = (
            self.last_screen.as_ref(),
            self.last_action.as_ref().and_then(ExplorationAction::widget),
        ) {
            store.increment_acted(previous.uid(), widget.uid());
        }

        let mut widgets = store.widgets_of(screen.uid());
        if widgets.is_empty() && !screen.is_empty() {
            widgets = StrategyContext::new(screen.clone(), app_package).widgets;
        }

        let context = StrategyContext::new(screen, app_package)
            .with_widgets(widgets)
            .with_action_count(self.action_count)
            .with_elapsed(elapsed)
            .with_last_action(self.last_action.clone());

        if context.actionable().next().is_some()
            && context.all_widgets_exhausted(self.config.exhaustion_threshold)
        {
            tracing::info!("All widgets exhausted on screen {}", context.screen.uid());
            for listener in &self.listeners {
                listener(&context.screen);
            }
        }

        context
    }
}
