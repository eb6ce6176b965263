//! The closed set of strategies the engine arbitrates between.

use super::back::GuiFullyExploredBack;
use super::base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
use super::explore::Explore;
use super::permission::AllowRuntimePermission;
use super::reset::ResetOnLeave;
use super::terminate::Terminate;
use crate::actions::ExplorationAction;
use crate::playback::MemoryPlayback;

/// Any strategy the engine can hold.
#[derive(Debug)]
pub enum Strategy {
    Explore(Explore),
    Back(GuiFullyExploredBack),
    Reset(ResetOnLeave),
    AllowPermission(AllowRuntimePermission),
    Playback(MemoryPlayback),
    Terminate(Terminate),
}

impl Strategy {
    fn inner(&self) -> &dyn ExplorationStrategy {
        match self {
            Self::Explore(s) => s,
            Self::Back(s) => s,
            Self::Reset(s) => s,
            Self::AllowPermission(s) => s,
            Self::Playback(s) => s,
            Self::Terminate(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ExplorationStrategy {
        match self {
            Self::Explore(s) => s,
            Self::Back(s) => s,
            Self::Reset(s) => s,
            Self::AllowPermission(s) => s,
            Self::Playback(s) => s,
            Self::Terminate(s) => s,
        }
    }
}

impl ExplorationStrategy for Strategy {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fitness(&self, context: &StrategyContext) -> Result<Priority, StrategyError> {
        self.inner().fitness(context)
    }

    fn decide(&mut self, context: &StrategyContext) -> Result<ExplorationAction, StrategyError> {
        self.inner_mut().decide(context)
    }

    fn termination_reason(&self, context: &StrategyContext) -> String {
        self.inner().termination_reason(context)
    }
}

impl From<Explore> for Strategy {
    fn from(s: Explore) -> Self {
        Self::Explore(s)
    }
}

impl From<GuiFullyExploredBack> for Strategy {
    fn from(s: GuiFullyExploredBack) -> Self {
        Self::Back(s)
    }
}

impl From<ResetOnLeave> for Strategy {
    fn from(s: ResetOnLeave) -> Self {
        Self::Reset(s)
    }
}

impl From<AllowRuntimePermission> for Strategy {
    fn from(s: AllowRuntimePermission) -> Self {
        Self::AllowPermission(s)
    }
}

impl From<MemoryPlayback> for Strategy {
    fn from(s: MemoryPlayback) -> Self {
        Self::Playback(s)
    }
}

impl From<Terminate> for Strategy {
    fn from(s: Terminate) -> Self {
        Self::Terminate(s)
    }
}
