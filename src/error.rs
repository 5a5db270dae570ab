//! Error kinds of the voice client.

use thiserror::Error;

use crate::proto::TrackSid;

/// Failure reported by the external media platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The user or the browser policy refused the request.
    #[error("not allowed: {0}")]
    NotAllowed(String),

    /// Requested device doesn't exist.
    #[error("device not found: {0}")]
    NotFound(String),

    /// Device exists but couldn't be opened or read.
    #[error("device failure: {0}")]
    Device(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Terminal failure of the local microphone capture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("microphone device error: {0}")]
    DeviceError(String),

    /// Capability was enabled, but no track is attached to the published
    /// microphone output.
    #[error("microphone track was not published")]
    PublicationIncomplete,
}

impl From<PlatformError> for CaptureError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::NotAllowed(msg) => {
                CaptureError::PermissionDenied(msg)
            }
            PlatformError::NotFound(msg)
            | PlatformError::Device(msg)
            | PlatformError::Transport(msg) => CaptureError::DeviceError(msg),
        }
    }
}

/// Rejection of a playback start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Platform autoplay policy refused to start playback without a user
    /// gesture.
    #[error("autoplay blocked: {0}")]
    AutoplayBlocked(String),

    #[error("playback failed: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("autoplay blocked for track {track_sid}: {reason}")]
    AutoplayBlocked { track_sid: TrackSid, reason: String },

    #[error("failed to connect: {0}")]
    Connect(#[from] PlatformError),

    /// Notification subscriptions outlived the components owning them.
    #[error("{0} notification subscriptions leaked after teardown")]
    SubscriptionCallbackLeak(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
