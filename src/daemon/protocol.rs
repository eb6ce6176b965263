//! Wire protocol between the host and the on-device daemon.
//!
//! Every message is framed as a 4-byte big-endian payload length followed by
//! the payload, a bincode encoding of [`DeviceCommand`] or [`DeviceResponse`].

use image::RgbaImage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::DaemonError;
use crate::actions::GestureKind;
use crate::model::WidgetData;

/// Largest payload accepted from the daemon.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

const READ_CHUNK: usize = 16 * 1024;

/// Request sent to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceCommand {
    /// Report the current UI tree and a screen capture.
    FetchGuiState,
    /// (Re)start the app's launchable activity from a clean state.
    LaunchApp { package: String },
    PressBack,
    PressHome,
    /// Dispatch a gesture at a screen coordinate.
    Perform { gesture: GestureKind, x: i32, y: i32 },
    /// Leave the app; the daemon keeps serving.
    Terminate,
    /// Shut the daemon down.
    StopDaemon,
}

/// Reply from the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceResponse {
    GuiState(GuiSnapshot),
    Ack,
    Failure { message: String },
}

/// UI-tree snapshot as captured on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuiSnapshot {
    /// Widget records in tree order.
    pub widgets: Vec<WidgetData>,
    /// PNG-encoded screen capture, absent when capturing failed.
    pub screenshot: Option<Vec<u8>>,
    /// Package in the foreground.
    pub top_package: String,
}

impl GuiSnapshot {
    /// Decode the screen capture.
    pub fn decode_screenshot(&self) -> Result<Option<RgbaImage>, image::ImageError> {
        self.screenshot
            .as_deref()
            .map(|png| image::load_from_memory(png).map(|img| img.to_rgba8()))
            .transpose()
    }
}

/// Encode a message payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, DaemonError> {
    Ok(bincode::serialize(message)?)
}

/// Decode a message payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DaemonError> {
    Ok(bincode::deserialize(payload)?)
}

/// Write one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or(DaemonError::FrameTooLarge(payload.len()))?;

    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// A single read is not assumed to return the whole payload; chunks are
/// appended until exactly `len` bytes were consumed.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, DaemonError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(DaemonError::FrameTooLarge(len as usize));
    }

    let expected = len as usize;
    let mut buffer = Vec::with_capacity(expected);
    let mut chunk = [0u8; READ_CHUNK];

    while buffer.len() < expected {
        let want = (expected - buffer.len()).min(READ_CHUNK);
        let read = reader.read(&mut chunk[..want]).await?;
        if read == 0 {
            return Err(DaemonError::Truncated {
                expected,
                received: buffer.len(),
            });
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    Ok(buffer)
}

/// Encode and send a message as one frame.
pub async fn send_message<W, T>(writer: &mut W, message: &T) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = encode(message)?;
    write_frame(writer, &payload).await
}

/// Receive one frame and decode it.
pub async fn receive_message<R, T>(reader: &mut R) -> Result<T, DaemonError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = read_frame(reader).await?;
    decode(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bounds;
    use std::io::Cursor;

    fn all_commands() -> Vec<DeviceCommand> {
        vec![
            DeviceCommand::FetchGuiState,
            DeviceCommand::LaunchApp {
                package: "com.example.app".to_string(),
            },
            DeviceCommand::PressBack,
            DeviceCommand::PressHome,
            DeviceCommand::Perform {
                gesture: GestureKind::LongClick,
                x: 120,
                y: -4,
            },
            DeviceCommand::Terminate,
            DeviceCommand::StopDaemon,
        ]
    }

    #[tokio::test]
    async fn test_framed_command_round_trip() {
        for command in all_commands() {
            let mut wire = Vec::new();
            send_message(&mut wire, &command).await.unwrap();

            let len = u32::from_be_bytes([wire[0], wire[1], wire[2], wire[3]]) as usize;
            assert_eq!(len, wire.len() - 4);

            let mut reader = Cursor::new(wire);
            let decoded: DeviceCommand = receive_message(&mut reader).await.unwrap();
            assert_eq!(decoded, command);
        }
    }

    #[tokio::test]
    async fn test_snapshot_response_round_trip() {
        let response = DeviceResponse::GuiState(GuiSnapshot {
            widgets: vec![WidgetData {
                text: "OK".to_string(),
                bounds: Bounds::new(1, 2, 3, 4),
                checked: Some(true),
                parent_xpath: Some("/hierarchy".to_string()),
                ..WidgetData::default()
            }],
            screenshot: Some(vec![1, 2, 3]),
            top_package: "com.example.app".to_string(),
        });

        let mut wire = Vec::new();
        send_message(&mut wire, &response).await.unwrap();
        let decoded: DeviceResponse = receive_message(&mut Cursor::new(wire)).await.unwrap();
        assert_eq!(decoded, response);
    }

    #[tokio::test]
    async fn test_reader_reassembles_split_payload() {
        let payload = encode(&DeviceCommand::LaunchApp {
            package: "x".repeat(40_000),
        })
        .unwrap();

        let (mut client, mut server) = tokio::io::duplex(64);
        let writer_payload = payload.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut client, &writer_payload).await.unwrap();
        });

        let frame = read_frame(&mut server).await.unwrap();
        writer.await.unwrap();
        assert_eq!(frame, payload);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_error() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&10u32.to_be_bytes());
        wire.extend_from_slice(&[1, 2, 3]);

        let err = read_frame(&mut Cursor::new(wire)).await.unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Truncated {
                expected: 10,
                received: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let wire = (MAX_FRAME_LEN + 1).to_be_bytes().to_vec();
        let err = read_frame(&mut Cursor::new(wire)).await.unwrap_err();
        assert!(matches!(err, DaemonError::FrameTooLarge(_)));
    }

    #[test]
    fn test_decode_missing_screenshot() {
        let snapshot = GuiSnapshot::default();
        assert!(snapshot.decode_screenshot().unwrap().is_none());
    }
}
