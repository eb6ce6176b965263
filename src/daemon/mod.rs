//! Client side of the on-device instrumentation daemon.

mod client;
mod error;
mod protocol;
mod startup;
mod task;

pub use client::{
    DaemonClient, DaemonConfig, DaemonState, DEFAULT_DAEMON_PORT, DEFAULT_DAEMON_RUNNER,
};
pub use error::DaemonError;
pub use protocol::{
    decode, encode, read_frame, receive_message, send_message, write_frame, DeviceCommand,
    DeviceResponse, GuiSnapshot, MAX_FRAME_LEN,
};
pub use startup::{
    validate_startup_messages, wait_for_messages, LOG_SWITCH_OFF_NOTE, SERVER_START_MSG,
    SERVER_START_TAG,
};
pub use task::AgentTask;

#[cfg(test)]
pub(crate) use client::tests::{spawn_fake_daemon, test_config, FakeAdb};
