//! Interfaces of the real-time media platform.

mod audio_element;
mod local_participant;
mod media_devices;
mod media_stream_track;
pub mod sim;
mod transport;

pub use self::{
    audio_element::{AudioOutput, AudioSink, SinkId},
    local_participant::{LocalParticipant, LocalPublication},
    media_devices::{MediaDeviceInfo, MediaDeviceKind, MediaDevices},
    media_stream_track::MediaStreamTrack,
    transport::{Connection, Transport},
};
