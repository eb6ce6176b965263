//! Exploration actions and their translation to daemon commands.

mod action;
mod handler;

pub use action::{ExplorationAction, GestureKind};
pub use handler::ActionHandler;
