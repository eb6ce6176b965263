//! ADB (Android Debug Bridge) module for device interaction.

mod connection;

pub use connection::{AdbBridge, AdbConnection, AdbError, DaemonLaunch, DeviceInfo};
