//! Notifications delivered by the real-time media session.

use std::{fmt, rc::Rc};

use crate::sys::MediaStreamTrack;

/// Unique identifier of a published track.
pub type TrackSid = String;

/// Identity of a session participant.
pub type ParticipantIdentity = String;

#[derive(Clone)]
pub enum Event {
    Connected,

    Disconnected { reason: Option<String> },

    /// Session-level error which doesn't end the session by itself.
    Error(String),

    ParticipantConnected { identity: ParticipantIdentity },

    ParticipantDisconnected { identity: ParticipantIdentity },

    TrackPublished {
        participant: ParticipantIdentity,
        publication: Publication,
    },

    TrackUnpublished {
        participant: ParticipantIdentity,
        sid: TrackSid,
    },

    TrackSubscribed {
        participant: ParticipantIdentity,
        sid: TrackSid,
        track: Rc<dyn MediaStreamTrack>,
    },

    TrackUnsubscribed {
        participant: ParticipantIdentity,
        sid: TrackSid,
    },

    TrackMuted {
        participant: ParticipantIdentity,
        sid: TrackSid,
    },

    TrackUnmuted {
        participant: ParticipantIdentity,
        sid: TrackSid,
    },

    LocalTrackPublished { sid: TrackSid, source: TrackSource },

    LocalTrackUnpublished { sid: TrackSid },
}

impl Event {
    /// Returns `true` if this notification may change the set of tracks.
    pub fn changes_tracks(&self) -> bool {
        matches!(
            self,
            Event::TrackPublished { .. }
                | Event::TrackUnpublished { .. }
                | Event::TrackSubscribed { .. }
                | Event::TrackUnsubscribed { .. }
                | Event::TrackMuted { .. }
                | Event::TrackUnmuted { .. }
                | Event::LocalTrackPublished { .. }
                | Event::LocalTrackUnpublished { .. }
                | Event::ParticipantDisconnected { .. }
                | Event::Disconnected { .. }
        )
    }

    /// Returns `true` if this notification may change the roster or the
    /// local microphone flag.
    ///
    /// Track notifications are included, as they implicitly add
    /// participants not announced before.
    pub fn changes_roster(&self) -> bool {
        matches!(
            self,
            Event::ParticipantConnected { .. }
                | Event::ParticipantDisconnected { .. }
                | Event::Disconnected { .. }
                | Event::TrackPublished { .. }
                | Event::TrackSubscribed { .. }
                | Event::LocalTrackPublished { .. }
                | Event::LocalTrackUnpublished { .. }
        )
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Connected => f.write_str("Connected"),
            Event::Disconnected { reason } => {
                write!(f, "Disconnected({:?})", reason)
            }
            Event::Error(e) => write!(f, "Error({})", e),
            Event::ParticipantConnected { identity } => {
                write!(f, "ParticipantConnected({})", identity)
            }
            Event::ParticipantDisconnected { identity } => {
                write!(f, "ParticipantDisconnected({})", identity)
            }
            Event::TrackPublished {
                participant,
                publication,
            } => {
                write!(f, "TrackPublished({}, {:?})", participant, publication)
            }
            Event::TrackUnpublished { participant, sid } => {
                write!(f, "TrackUnpublished({}, {})", participant, sid)
            }
            Event::TrackSubscribed {
                participant, sid, ..
            } => write!(f, "TrackSubscribed({}, {})", participant, sid),
            Event::TrackUnsubscribed { participant, sid } => {
                write!(f, "TrackUnsubscribed({}, {})", participant, sid)
            }
            Event::TrackMuted { participant, sid } => {
                write!(f, "TrackMuted({}, {})", participant, sid)
            }
            Event::TrackUnmuted { participant, sid } => {
                write!(f, "TrackUnmuted({}, {})", participant, sid)
            }
            Event::LocalTrackPublished { sid, source } => {
                write!(f, "LocalTrackPublished({}, {})", sid, source)
            }
            Event::LocalTrackUnpublished { sid } => {
                write!(f, "LocalTrackUnpublished({})", sid)
            }
        }
    }
}

/// Metadata of a remote publication as announced by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    pub sid: TrackSid,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub is_muted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
    Unknown,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
            TrackKind::Unknown => "unknown",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackSource {
    Microphone,
    Camera,
    ScreenShare,
    ScreenShareAudio,
    Unknown,
}

impl TrackSource {
    /// Sources which make it into the observed track set.
    pub fn is_observed(self) -> bool {
        matches!(self, TrackSource::Microphone | TrackSource::Unknown)
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackSource::Microphone => "Microphone",
            TrackSource::Camera => "Camera",
            TrackSource::ScreenShare => "ScreenShare",
            TrackSource::ScreenShareAudio => "ScreenShareAudio",
            TrackSource::Unknown => "Unknown",
        })
    }
}
