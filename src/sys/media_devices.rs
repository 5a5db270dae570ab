use futures::future::LocalBoxFuture;

use crate::error::PlatformError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaDeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: MediaDeviceKind,
    pub label: String,
}

pub trait MediaDevices {
    fn enumerate_devices(
        &self,
    ) -> LocalBoxFuture<'_, Result<Vec<MediaDeviceInfo>, PlatformError>>;
}
