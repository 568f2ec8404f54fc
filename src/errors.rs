use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera initialization error: {0}")]
    InitializationError(String),
    #[error("Camera connection error: {0}")]
    ConnectError(String),
    #[error("Preview error: {0}")]
    PreviewError(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Camera control error: {0}")]
    ControlError(String),
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Why a session became unusable. Carried by every [`CameraException`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    /// The hardware handle could not be acquired.
    FailedToConnect,
    /// Attaching the presentation output or starting preview failed.
    FailedToStartPreview,
    /// The handle was evicted by another client.
    Disconnected,
    Unknown,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            ErrorReason::FailedToConnect => "failed to connect",
            ErrorReason::FailedToStartPreview => "failed to start preview",
            ErrorReason::Disconnected => "disconnected",
            ErrorReason::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Error surfaced to listeners through `on_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("camera exception ({reason}): {error}")]
pub struct CameraException {
    pub reason: ErrorReason,
    #[source]
    pub error: CameraError,
}

impl CameraException {
    pub fn new(reason: ErrorReason, error: CameraError) -> Self {
        Self { reason, error }
    }

    pub fn failed_to_connect(message: impl Into<String>) -> Self {
        Self::new(
            ErrorReason::FailedToConnect,
            CameraError::ConnectError(message.into()),
        )
    }

    pub fn failed_to_start_preview(message: impl Into<String>) -> Self {
        Self::new(
            ErrorReason::FailedToStartPreview,
            CameraError::PreviewError(message.into()),
        )
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(
            ErrorReason::Disconnected,
            CameraError::ConnectError(message.into()),
        )
    }

    pub fn unknown(error: CameraError) -> Self {
        Self::new(ErrorReason::Unknown, error)
    }

    /// Misuse of the controller (e.g. a still capture in video mode).
    pub fn programmer_error(message: impl Into<String>) -> Self {
        Self::new(
            ErrorReason::Unknown,
            CameraError::InvalidState(message.into()),
        )
    }

    pub fn is_programmer_error(&self) -> bool {
        matches!(self.error, CameraError::InvalidState(_))
    }
}
