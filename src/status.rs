//! Diagnostic status surface.

use std::{collections::BTreeMap, fmt};

use crate::{
    component::{
        CaptureState, ConnectionStatus, ParticipantSnapshot, PlaybackState,
        TrackSummary,
    },
    error::Error,
    proto::TrackSid,
};

/// Hint shown alongside autoplay advisories.
pub const AUTOPLAY_HINT: &str =
    "click anywhere on the page to allow audio playback";

/// Point-in-time summary of the client for operators and developers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub connection: ConnectionStatus,
    pub capture: Option<CaptureState>,
    pub participants: Option<ParticipantSnapshot>,
    pub tracks: Vec<TrackSummary>,
    pub playback: BTreeMap<TrackSid, PlaybackState>,
}

impl StatusReport {
    /// Recoverable conditions worth surfacing to the user.
    pub fn advisories(&self) -> Vec<Error> {
        self.playback
            .iter()
            .filter_map(|(sid, state)| match state {
                PlaybackState::Blocked(reason) => Some(Error::AutoplayBlocked {
                    track_sid: sid.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connection = match self.connection {
            ConnectionStatus::AwaitingCredential => "fetching token...",
            ConnectionStatus::Connecting => "connecting...",
            ConnectionStatus::Connected => "connected, start talking",
            ConnectionStatus::Disconnected => "disconnected",
        };
        writeln!(f, "Connection: {}", connection)?;

        if let Some(participants) = &self.participants {
            writeln!(f, "Local user: {}", participants.local_identity)?;
            write!(f, "Remote participants: {}", participants.remote_count)?;
            if !participants.remote_identities.is_empty() {
                write!(f, " ({})", participants.remote_identities.join(", "))?;
            }
            writeln!(f)?;
        }

        match &self.capture {
            None => (),
            Some(CaptureState::Idle) => writeln!(f, "Microphone: idle")?,
            Some(CaptureState::RequestingPermission) => {
                writeln!(f, "Microphone: enabling...")?
            }
            Some(CaptureState::Enabled) => writeln!(f, "Microphone: enabled")?,
            Some(CaptureState::Failed(e)) => {
                writeln!(f, "Microphone: failed ({})", e)?
            }
        }

        writeln!(f, "{} audio tracks", self.tracks.len())?;
        for track in &self.tracks {
            writeln!(
                f,
                "  * {} - {} - {} ({})",
                track.participant,
                track.source,
                track.kind,
                if track.is_local { "local" } else { "remote" },
            )?;
        }

        for advisory in self.advisories() {
            writeln!(f, "Advisory: {}; {}", advisory, AUTOPLAY_HINT)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CaptureError,
        proto::{TrackKind, TrackSource},
    };

    fn report() -> StatusReport {
        StatusReport {
            connection: ConnectionStatus::Connected,
            capture: Some(CaptureState::Enabled),
            participants: Some(ParticipantSnapshot {
                remote_count: 1,
                remote_identities: vec!["agent".into()],
                local_identity: "user-web-client".into(),
                local_microphone_enabled: true,
            }),
            tracks: Vec::new(),
            playback: BTreeMap::new(),
        }
    }

    #[test]
    fn renders_empty_track_set() {
        let rendered = report().to_string();
        assert!(rendered.contains("0 audio tracks"));
        assert!(rendered.contains("Remote participants: 1 (agent)"));
        assert!(rendered.contains("Local user: user-web-client"));
        assert!(!rendered.contains("Advisory"));
    }

    #[test]
    fn renders_tracks_and_autoplay_advisory() {
        let mut report = report();
        report.tracks = vec![
            TrackSummary {
                sid: "TR_1".into(),
                participant: "agent".into(),
                source: TrackSource::Microphone,
                kind: TrackKind::Audio,
                is_local: false,
            },
            TrackSummary {
                sid: "TR_2".into(),
                participant: "user-web-client".into(),
                source: TrackSource::Microphone,
                kind: TrackKind::Audio,
                is_local: true,
            },
        ];
        report
            .playback
            .insert("TR_1".into(), PlaybackState::Blocked("no gesture".into()));

        let rendered = report.to_string();
        assert!(rendered.contains("2 audio tracks"));
        assert!(rendered.contains("agent - Microphone - audio (remote)"));
        assert!(rendered.contains("user-web-client - Microphone - audio (local)"));
        assert!(rendered.contains("autoplay blocked for track TR_1"));
        assert!(rendered.contains(AUTOPLAY_HINT));
        assert!(matches!(
            &report.advisories()[..],
            [Error::AutoplayBlocked { track_sid, .. }] if track_sid == "TR_1"
        ));
    }

    #[test]
    fn renders_capture_failure() {
        let mut report = report();
        report.capture = Some(CaptureState::Failed(
            CaptureError::PublicationIncomplete,
        ));
        assert!(report
            .to_string()
            .contains("Microphone: failed (microphone track was not published)"));
    }
}
