//! Translation of exploration actions into daemon commands.

use crate::daemon::{DaemonError, DeviceCommand, DeviceResponse};

use super::action::ExplorationAction;

/// Maps decided actions to the commands the daemon understands.
#[derive(Debug, Clone)]
pub struct ActionHandler {
    /// Package of the app under exploration, launched on reset.
    package: String,
}

impl ActionHandler {
    /// Create a new ActionHandler for the given app.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Wire representation of `action`.
    ///
    /// Every action kind has exactly one command kind. Widget actions are
    /// dispatched at the centre of the widget's bounds.
    pub fn command_for(&self, action: &ExplorationAction) -> DeviceCommand {
        match action {
            ExplorationAction::Reset => DeviceCommand::LaunchApp {
                package: self.package.clone(),
            },
            ExplorationAction::Terminate => DeviceCommand::Terminate,
            ExplorationAction::PressBack => DeviceCommand::PressBack,
            ExplorationAction::WidgetAction { widget, gesture } => {
                let (x, y) = widget.bounds().center();
                DeviceCommand::Perform {
                    gesture: *gesture,
                    x,
                    y,
                }
            }
            ExplorationAction::Empty => DeviceCommand::FetchGuiState,
        }
    }

    /// Check the daemon's reply to an action command.
    pub fn check_response(
        &self,
        action: &ExplorationAction,
        response: DeviceResponse,
    ) -> Result<(), DaemonError> {
        match response {
            DeviceResponse::Ack | DeviceResponse::GuiState(_) => Ok(()),
            DeviceResponse::Failure { message } => {
                tracing::error!("Daemon failed to execute {}: {}", action, message);
                Err(DaemonError::Remote(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::GestureKind;
    use crate::model::{button, Bounds, Widget};

    #[test]
    fn test_command_mapping_is_total() {
        let handler = ActionHandler::new("com.example.app");
        let widget = Widget::new(button("OK", "ok", Bounds::new(10, 20, 100, 40)));

        assert_eq!(
            handler.command_for(&ExplorationAction::Reset),
            DeviceCommand::LaunchApp {
                package: "com.example.app".to_string()
            }
        );
        assert_eq!(
            handler.command_for(&ExplorationAction::Terminate),
            DeviceCommand::Terminate
        );
        assert_eq!(
            handler.command_for(&ExplorationAction::PressBack),
            DeviceCommand::PressBack
        );
        assert_eq!(
            handler.command_for(&ExplorationAction::Empty),
            DeviceCommand::FetchGuiState
        );
        assert_eq!(
            handler.command_for(&ExplorationAction::click(widget)),
            DeviceCommand::Perform {
                gesture: GestureKind::Click,
                x: 60,
                y: 40
            }
        );
    }

    #[test]
    fn test_check_response() {
        let handler = ActionHandler::new("com.example.app");
        assert!(handler
            .check_response(&ExplorationAction::PressBack, DeviceResponse::Ack)
            .is_ok());

        let err = handler
            .check_response(
                &ExplorationAction::PressBack,
                DeviceResponse::Failure {
                    message: "no window".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, DaemonError::Remote(m) if m == "no window"));
    }
}
