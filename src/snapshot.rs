//! Client-side mirror of the shared session.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use futures::channel::mpsc;
use tracing::{debug, warn};

use crate::{
    proto::{
        Event, ParticipantIdentity, Publication, TrackKind, TrackSid,
        TrackSource,
    },
    sys::{LocalParticipant, MediaStreamTrack},
};

/// One published media track as seen at the moment of the snapshot.
#[derive(Clone)]
pub struct TrackRef {
    pub sid: TrackSid,
    pub participant: ParticipantIdentity,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub is_local: bool,
    pub is_muted: bool,
    pub is_subscribed: bool,
    pub track: Option<Rc<dyn MediaStreamTrack>>,
}

impl fmt::Debug for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackRef")
            .field("sid", &self.sid)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("participant", &self.participant)
            .field("is_local", &self.is_local)
            .field("is_muted", &self.is_muted)
            .field("is_subscribed", &self.is_subscribed)
            .finish()
    }
}

/// Immutable set of tracks, recomputed wholesale on every change.
pub type TrackSet = Rc<[TrackRef]>;

/// Stream of notifications owned by a single subscriber.
pub type EventStream = mpsc::UnboundedReceiver<Event>;

/// Registration of a notification subscriber.
///
/// Dropping it deregisters the subscriber and ends its [`EventStream`].
pub struct Subscription {
    id: u64,
    room: Weak<Room>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(room) = self.room.upgrade() {
            room.unsubscribe(self.id);
        }
    }
}

struct RemotePublication {
    info: Publication,
    track: Option<Rc<dyn MediaStreamTrack>>,
}

struct RemoteParticipant {
    identity: ParticipantIdentity,
    publications: Vec<RemotePublication>,
}

pub struct Room {
    local: Rc<dyn LocalParticipant>,
    participants: RefCell<Vec<RemoteParticipant>>,
    subscribers: RefCell<Vec<(u64, mpsc::UnboundedSender<Event>)>>,
    next_subscriber: Cell<u64>,
}

impl Room {
    pub fn new(local: Rc<dyn LocalParticipant>) -> Rc<Self> {
        Rc::new(Self {
            local,
            participants: RefCell::default(),
            subscribers: RefCell::default(),
            next_subscriber: Cell::new(0),
        })
    }

    pub fn local(&self) -> &Rc<dyn LocalParticipant> {
        &self.local
    }

    pub fn subscribe(self: &Rc<Self>) -> (Subscription, EventStream) {
        let id = self.next_subscriber.get();
        self.next_subscriber.set(id + 1);
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.borrow_mut().push((id, tx));

        let subscription = Subscription {
            id,
            room: Rc::downgrade(self),
        };
        (subscription, rx)
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.borrow_mut().retain(|(i, _)| *i != id);
    }

    /// Number of live subscriber registrations.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Applies `event` to the mirror and then delivers it to every
    /// subscriber.
    pub fn apply(&self, event: Event) {
        self.update(&event);
        self.subscribers
            .borrow_mut()
            .retain(|(_, tx)| tx.unbounded_send(event.clone()).is_ok());
    }

    fn update(&self, event: &Event) {
        let mut participants = self.participants.borrow_mut();
        match event {
            Event::Connected | Event::Error(_) => (),
            Event::Disconnected { .. } => participants.clear(),
            Event::ParticipantConnected { identity } => {
                if !participants.iter().any(|p| &p.identity == identity) {
                    participants.push(RemoteParticipant {
                        identity: identity.clone(),
                        publications: Vec::new(),
                    });
                }
            }
            Event::ParticipantDisconnected { identity } => {
                participants.retain(|p| &p.identity != identity);
            }
            Event::TrackPublished {
                participant,
                publication,
            } => {
                let participant =
                    participant_entry(&mut participants, participant);
                match participant
                    .publications
                    .iter_mut()
                    .find(|p| p.info.sid == publication.sid)
                {
                    Some(existing) => existing.info = publication.clone(),
                    None => participant.publications.push(RemotePublication {
                        info: publication.clone(),
                        track: None,
                    }),
                }
            }
            Event::TrackUnpublished { participant, sid } => {
                if let Some(p) =
                    participants.iter_mut().find(|p| &p.identity == participant)
                {
                    p.publications.retain(|p| &p.info.sid != sid);
                }
            }
            Event::TrackSubscribed {
                participant,
                sid,
                track,
            } => {
                let participant =
                    participant_entry(&mut participants, participant);
                match participant
                    .publications
                    .iter_mut()
                    .find(|p| &p.info.sid == sid)
                {
                    Some(publication) => {
                        publication.track = Some(Rc::clone(track));
                    }
                    None => {
                        warn!(
                            "Track {} subscribed before being published",
                            sid,
                        );
                        participant.publications.push(RemotePublication {
                            info: Publication {
                                sid: sid.clone(),
                                kind: TrackKind::Unknown,
                                source: TrackSource::Unknown,
                                is_muted: false,
                            },
                            track: Some(Rc::clone(track)),
                        });
                    }
                }
            }
            Event::TrackUnsubscribed { participant, sid } => {
                if let Some(publication) =
                    find_publication(&mut participants, participant, sid)
                {
                    publication.track = None;
                }
            }
            Event::TrackMuted { participant, sid }
            | Event::TrackUnmuted { participant, sid } => {
                let muted = matches!(event, Event::TrackMuted { .. });
                if let Some(publication) =
                    find_publication(&mut participants, participant, sid)
                {
                    publication.info.is_muted = muted;
                }
            }
            Event::LocalTrackPublished { .. }
            | Event::LocalTrackUnpublished { .. } => {
                debug!("Local publication changed: {:?}", event);
            }
        }
    }

    /// Current set of microphone and unknown-source tracks, local ones
    /// included.
    pub fn tracks(&self) -> TrackSet {
        let mut tracks = Vec::new();

        let local_identity = self.local.identity();
        for source in [TrackSource::Microphone, TrackSource::Unknown] {
            if let Some(publication) = self.local.publication(source) {
                tracks.push(TrackRef {
                    sid: publication.sid,
                    participant: local_identity.clone(),
                    kind: publication.kind,
                    source: publication.source,
                    is_local: true,
                    is_muted: publication.is_muted,
                    is_subscribed: publication.track.is_some(),
                    track: publication.track,
                });
            }
        }

        for participant in self.participants.borrow().iter() {
            tracks.extend(
                participant
                    .publications
                    .iter()
                    .filter(|p| p.info.source.is_observed())
                    .map(|p| TrackRef {
                        sid: p.info.sid.clone(),
                        participant: participant.identity.clone(),
                        kind: p.info.kind,
                        source: p.info.source,
                        is_local: false,
                        is_muted: p.info.is_muted,
                        is_subscribed: p.track.is_some(),
                        track: p.track.clone(),
                    }),
            );
        }

        tracks.into()
    }

    pub fn remote_identities(&self) -> Vec<ParticipantIdentity> {
        self.participants
            .borrow()
            .iter()
            .map(|p| p.identity.clone())
            .collect()
    }

    pub fn remote_count(&self) -> usize {
        self.participants.borrow().len()
    }

    pub fn local_identity(&self) -> ParticipantIdentity {
        self.local.identity()
    }

    pub fn is_microphone_enabled(&self) -> bool {
        self.local.is_microphone_enabled()
    }
}

fn participant_entry<'a>(
    participants: &'a mut Vec<RemoteParticipant>,
    identity: &ParticipantIdentity,
) -> &'a mut RemoteParticipant {
    let idx = match participants.iter().position(|p| &p.identity == identity)
    {
        Some(idx) => idx,
        None => {
            warn!("Participant {} has tracks before joining", identity);
            participants.push(RemoteParticipant {
                identity: identity.clone(),
                publications: Vec::new(),
            });
            participants.len() - 1
        }
    };
    &mut participants[idx]
}

fn find_publication<'a>(
    participants: &'a mut [RemoteParticipant],
    identity: &ParticipantIdentity,
    sid: &TrackSid,
) -> Option<&'a mut RemotePublication> {
    participants
        .iter_mut()
        .find(|p| &p.identity == identity)?
        .publications
        .iter_mut()
        .find(|p| &p.info.sid == sid)
}
