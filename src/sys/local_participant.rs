use std::rc::Rc;

use futures::future::LocalBoxFuture;

use super::MediaStreamTrack;
use crate::{
    error::PlatformError,
    proto::{TrackKind, TrackSid, TrackSource},
};

/// Publication of the local participant.
#[derive(Clone)]
pub struct LocalPublication {
    pub sid: TrackSid,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub is_muted: bool,
    pub track: Option<Rc<dyn MediaStreamTrack>>,
}

/// Local side of the shared session.
pub trait LocalParticipant {
    fn identity(&self) -> String;

    /// Asks for the microphone capability and publishes it.
    fn set_microphone_enabled(
        &self,
        enabled: bool,
    ) -> LocalBoxFuture<'_, Result<(), PlatformError>>;

    fn is_microphone_enabled(&self) -> bool;

    fn publication(&self, source: TrackSource) -> Option<LocalPublication>;
}
