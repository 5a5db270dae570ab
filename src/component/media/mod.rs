//! Rendering of remote audio tracks.
//!
//! [`AudioRenderer`] keeps one playback sink per live remote audio track.
//! Every track-set notification triggers a full reconciliation pass over
//! the current [`TrackSet`] of the session:
//!
//! 1. Sinks whose track is gone (unpublished, unsubscribed, owner left)
//!    are detached and released.
//! 2. Every remote audio track with a live media track gets a sink, which
//!    is registered before the track is attached to it.
//! 3. Playback is started for new attachments, and started again for
//!    sinks whose previous start was rejected.
//!
//! Local and non-audio tracks never get a sink.

mod registry;

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use futures::StreamExt as _;
use futures_signals::signal::Mutable;
use tracing::{debug, info, warn};

use self::registry::{SinkEntry, SinkRegistry};
use super::TaskHandle;
use crate::{
    error::PlaybackError,
    proto::{ParticipantIdentity, TrackKind, TrackSid, TrackSource},
    snapshot::{self, Subscription, TrackRef, TrackSet},
    sys::AudioOutput,
};

/// Playback state of a registered sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// Playback start is in flight.
    Starting,
    Playing,
    /// Autoplay policy rejected the start. Recoverable by a user gesture
    /// and a later pass.
    Blocked(String),
    Failed(String),
}

impl PlaybackState {
    fn needs_start(&self) -> bool {
        matches!(self, PlaybackState::Blocked(_) | PlaybackState::Failed(_))
    }
}

/// Diagnostic summary of an observed track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackSummary {
    pub sid: TrackSid,
    pub participant: ParticipantIdentity,
    pub source: TrackSource,
    pub kind: TrackKind,
    pub is_local: bool,
}

impl From<&TrackRef> for TrackSummary {
    fn from(track: &TrackRef) -> Self {
        Self {
            sid: track.sid.clone(),
            participant: track.participant.clone(),
            source: track.source,
            kind: track.kind,
            is_local: track.is_local,
        }
    }
}

/// Exclusive owner of the sink registry.
struct Reconciler {
    output: Rc<dyn AudioOutput>,
    registry: RefCell<SinkRegistry>,
    tracks: Mutable<Vec<TrackSummary>>,
    playback: Mutable<BTreeMap<TrackSid, PlaybackState>>,
}

impl Reconciler {
    fn reconcile(&self, tracks: &TrackSet) {
        debug!("Detected {} tracks", tracks.len());
        let mut registry = self.registry.borrow_mut();

        let removed = registry.retain(|sid| {
            tracks.iter().any(|t| t.sid == sid && is_rendered(t))
        });
        if !removed.is_empty() {
            let mut playback = self.playback.lock_mut();
            for sid in &removed {
                info!("Cleaned up audio sink of track {}", sid);
                playback.remove(sid);
            }
        }

        for track in tracks.iter() {
            debug!("Track info: {:?}", track);

            if track.is_local {
                debug!("Skipping local track {} (own voice)", track.sid);
                continue;
            }
            if track.kind != TrackKind::Audio {
                debug!("Skipping {} track {}", track.kind, track.sid);
                continue;
            }
            let Some(live) = &track.track else {
                warn!("Track {} has no live media track", track.sid);
                continue;
            };

            let (entry, created) =
                registry.get_or_create(&track.sid, &*self.output);
            if created {
                info!(
                    "Created audio sink {} for track {}",
                    entry.sink().id(),
                    track.sid,
                );
            }
            let attached = entry.attach(live);

            let needs_start = attached
                || self
                    .playback
                    .lock_ref()
                    .get(&track.sid)
                    .map_or(true, PlaybackState::needs_start);
            if needs_start {
                self.start_playback(&track.sid, entry);
            }
        }

        let summaries: Vec<_> = tracks.iter().map(TrackSummary::from).collect();
        self.tracks.set_neq(summaries);
    }

    fn start_playback(&self, sid: &TrackSid, entry: &mut SinkEntry) {
        self.playback
            .lock_mut()
            .insert(sid.clone(), PlaybackState::Starting);

        let play = entry.sink().play();
        let playback = self.playback.clone();
        let sid = sid.clone();
        entry.set_start(TaskHandle::spawn(async move {
            let result = play.await;
            let mut playback = playback.lock_mut();
            let Some(state) = playback.get_mut(&sid) else {
                return;
            };
            *state = match result {
                Ok(()) => {
                    info!("Audio playback started for track {}", sid);
                    PlaybackState::Playing
                }
                Err(PlaybackError::AutoplayBlocked(reason)) => {
                    warn!("Autoplay blocked for track {}: {}", sid, reason);
                    info!("Click anywhere on the page to allow audio playback");
                    PlaybackState::Blocked(reason)
                }
                Err(PlaybackError::Other(reason)) => {
                    warn!("Playback of track {} failed: {}", sid, reason);
                    PlaybackState::Failed(reason)
                }
            };
        }));
    }

    fn release_all(&self) -> usize {
        let released = self.registry.borrow_mut().clear();
        self.playback.lock_mut().clear();
        released
    }
}

/// Whether `track` should have a sink.
fn is_rendered(track: &TrackRef) -> bool {
    !track.is_local && track.kind == TrackKind::Audio && track.track.is_some()
}

/// Track reconciliation engine.
///
/// All sinks are released once this component is unmounted or dropped.
pub struct AudioRenderer {
    inner: Rc<Reconciler>,
    _task: TaskHandle,
    _subscription: Subscription,
}

impl AudioRenderer {
    pub fn mount(
        room: Rc<snapshot::Room>,
        output: Rc<dyn AudioOutput>,
    ) -> Self {
        let inner = Rc::new(Reconciler {
            output,
            registry: RefCell::default(),
            tracks: Mutable::new(Vec::new()),
            playback: Mutable::new(BTreeMap::new()),
        });
        inner.reconcile(&room.tracks());

        let (subscription, mut events) = room.subscribe();
        let task = TaskHandle::spawn({
            let inner = Rc::clone(&inner);
            async move {
                while let Some(event) = events.next().await {
                    if event.changes_tracks() {
                        inner.reconcile(&room.tracks());
                    }
                }
            }
        });

        Self {
            inner,
            _task: task,
            _subscription: subscription,
        }
    }

    /// Runs a reconciliation pass against `tracks`.
    pub fn reconcile(&self, tracks: &TrackSet) {
        self.inner.reconcile(tracks);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Sids having a registered sink, sorted.
    pub fn registered(&self) -> Vec<TrackSid> {
        self.inner.registry.borrow().sids()
    }

    /// Tracks observed during the last pass.
    pub fn tracks(&self) -> Vec<TrackSummary> {
        self.inner.tracks.get_cloned()
    }

    pub fn tracks_mutable(&self) -> Mutable<Vec<TrackSummary>> {
        self.inner.tracks.clone()
    }

    pub fn playback(&self) -> BTreeMap<TrackSid, PlaybackState> {
        self.inner.playback.get_cloned()
    }

    pub fn playback_mutable(
        &self,
    ) -> Mutable<BTreeMap<TrackSid, PlaybackState>> {
        self.inner.playback.clone()
    }

    pub fn unmount(self) {
        debug!("Unmounting audio renderer");
    }
}

impl Drop for AudioRenderer {
    fn drop(&mut self) {
        let released = self.inner.release_all();
        info!("Released {} audio sinks", released);
    }
}
