//! In-process simulation of the real-time media platform.
//!
//! Every platform call is counted in [`Counts`], so the simulation doubles
//! as an instrumented fake for tests.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use futures::{
    channel::mpsc, future::LocalBoxFuture, FutureExt as _, StreamExt as _,
};
use tokio::time::sleep;
use tracing::debug;

use super::{
    AudioOutput, AudioSink, Connection, LocalParticipant, LocalPublication,
    MediaDeviceInfo, MediaDeviceKind, MediaDevices, MediaStreamTrack, SinkId,
    Transport,
};
use crate::{
    error::{PlatformError, PlaybackError},
    proto::{Event, Publication, TrackKind, TrackSource},
};

/// Time the simulated platform takes to open and publish the microphone.
pub const MICROPHONE_LATENCY: Duration = Duration::from_millis(200);

/// Sid of the simulated local microphone publication.
pub const LOCAL_MICROPHONE_SID: &str = "TR_local_microphone";

/// Number of platform calls performed so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub sinks_created: usize,
    pub sinks_released: usize,
    pub attaches: usize,
    pub detaches: usize,
    pub plays: usize,
}

#[derive(Default)]
struct Stats(Cell<Counts>);

impl Stats {
    fn bump(&self, f: impl FnOnce(&mut Counts)) {
        let mut counts = self.0.get();
        f(&mut counts);
        self.0.set(counts);
    }
}

/// What happens when the microphone is requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MicrophoneOutcome {
    Publish,
    Deny(String),
    DeviceFailure(String),
    /// Capability is granted, but no track ends up in the publication.
    PublishWithoutTrack,
}

/// Whole simulated platform sharing one set of [`Counts`].
pub struct SimPlatform {
    pub transport: Rc<SimTransport>,
    pub session: SimSession,
    pub output: Rc<SimAudioOutput>,
    pub devices: Rc<SimMediaDevices>,
    stats: Rc<Stats>,
}

impl SimPlatform {
    pub fn new(
        local_identity: impl Into<String>,
        microphone: MicrophoneOutcome,
    ) -> Self {
        let stats = Rc::new(Stats::default());
        let (tx, rx) = mpsc::unbounded();
        let local = Rc::new(SimLocalParticipant {
            identity: local_identity.into(),
            outcome: microphone,
            enabled: Cell::new(false),
            publication: RefCell::new(None),
            events: tx.clone(),
            stats: Rc::clone(&stats),
        });

        Self {
            transport: Rc::new(SimTransport {
                local: Rc::clone(&local),
                events: RefCell::new(Some(rx)),
                loopback: tx.clone(),
                refuse: RefCell::new(None),
            }),
            session: SimSession {
                events: tx,
                local,
                stats: Rc::clone(&stats),
            },
            output: Rc::new(SimAudioOutput {
                stats: Rc::clone(&stats),
                next_id: Cell::new(1),
                autoplay_blocked: Rc::new(Cell::new(false)),
                sinks: RefCell::default(),
            }),
            devices: Rc::new(SimMediaDevices::default()),
            stats,
        }
    }

    pub fn counts(&self) -> Counts {
        self.stats.0.get()
    }
}

/// Script handle emitting notifications on behalf of remote participants.
pub struct SimSession {
    events: mpsc::UnboundedSender<Event>,
    local: Rc<SimLocalParticipant>,
    stats: Rc<Stats>,
}

impl SimSession {
    pub fn local(&self) -> Rc<SimLocalParticipant> {
        Rc::clone(&self.local)
    }

    pub fn emit(&self, event: Event) {
        debug!("Sim emits {:?}", event);
        let _ = self.events.unbounded_send(event);
    }

    pub fn disconnect(&self, reason: impl Into<String>) {
        self.emit(Event::Disconnected {
            reason: Some(reason.into()),
        });
    }

    pub fn participant_connected(&self, identity: &str) {
        self.emit(Event::ParticipantConnected {
            identity: identity.to_owned(),
        });
    }

    pub fn participant_disconnected(&self, identity: &str) {
        self.emit(Event::ParticipantDisconnected {
            identity: identity.to_owned(),
        });
    }

    /// Announces a publication without subscribing to it.
    pub fn publish(
        &self,
        identity: &str,
        sid: &str,
        kind: TrackKind,
        source: TrackSource,
    ) {
        self.emit(Event::TrackPublished {
            participant: identity.to_owned(),
            publication: Publication {
                sid: sid.to_owned(),
                kind,
                source,
                is_muted: false,
            },
        });
    }

    /// Delivers a fresh live track for an announced publication.
    pub fn subscribe(&self, identity: &str, sid: &str) -> Rc<SimTrack> {
        let track = self.new_track(sid);
        self.emit(Event::TrackSubscribed {
            participant: identity.to_owned(),
            sid: sid.to_owned(),
            track: Rc::clone(&track) as Rc<dyn MediaStreamTrack>,
        });
        track
    }

    /// Publishes a microphone track of a remote participant and subscribes
    /// to it.
    pub fn publish_audio(&self, identity: &str, sid: &str) -> Rc<SimTrack> {
        self.publish(identity, sid, TrackKind::Audio, TrackSource::Microphone);
        self.subscribe(identity, sid)
    }

    pub fn unsubscribe(&self, identity: &str, sid: &str) {
        self.emit(Event::TrackUnsubscribed {
            participant: identity.to_owned(),
            sid: sid.to_owned(),
        });
    }

    pub fn unpublish(&self, identity: &str, sid: &str) {
        self.emit(Event::TrackUnpublished {
            participant: identity.to_owned(),
            sid: sid.to_owned(),
        });
    }

    pub fn new_track(&self, sid: &str) -> Rc<SimTrack> {
        Rc::new(SimTrack {
            sid: sid.to_owned(),
            attached: RefCell::default(),
            stats: Rc::clone(&self.stats),
        })
    }
}

pub struct SimTransport {
    local: Rc<SimLocalParticipant>,
    events: RefCell<Option<mpsc::UnboundedReceiver<Event>>>,
    loopback: mpsc::UnboundedSender<Event>,
    refuse: RefCell<Option<PlatformError>>,
}

impl SimTransport {
    /// Makes the next [`Transport::connect`] fail with `err`.
    pub fn refuse_with(&self, err: PlatformError) {
        *self.refuse.borrow_mut() = Some(err);
    }
}

impl Transport for SimTransport {
    fn connect(
        &self,
        url: &str,
        _: &str,
    ) -> LocalBoxFuture<'_, Result<Connection, PlatformError>> {
        let url = url.to_owned();
        async move {
            sleep(Duration::from_millis(50)).await;
            if let Some(err) = self.refuse.borrow_mut().take() {
                return Err(err);
            }
            let events = self.events.borrow_mut().take().ok_or_else(|| {
                PlatformError::Transport("already connected".into())
            })?;
            debug!("Sim connected to {}", url);
            let _ = self.loopback.unbounded_send(Event::Connected);

            Ok(Connection {
                local: Rc::clone(&self.local) as Rc<dyn LocalParticipant>,
                events: events.boxed_local(),
            })
        }
        .boxed_local()
    }
}

pub struct SimLocalParticipant {
    identity: String,
    outcome: MicrophoneOutcome,
    enabled: Cell<bool>,
    publication: RefCell<Option<LocalPublication>>,
    events: mpsc::UnboundedSender<Event>,
    stats: Rc<Stats>,
}

impl LocalParticipant for SimLocalParticipant {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn set_microphone_enabled(
        &self,
        enabled: bool,
    ) -> LocalBoxFuture<'_, Result<(), PlatformError>> {
        async move {
            sleep(MICROPHONE_LATENCY).await;
            if !enabled {
                self.enabled.set(false);
                if self.publication.borrow_mut().take().is_some() {
                    let _ = self.events.unbounded_send(
                        Event::LocalTrackUnpublished {
                            sid: LOCAL_MICROPHONE_SID.into(),
                        },
                    );
                }
                return Ok(());
            }

            let track = match &self.outcome {
                MicrophoneOutcome::Deny(msg) => {
                    return Err(PlatformError::NotAllowed(msg.clone()));
                }
                MicrophoneOutcome::DeviceFailure(msg) => {
                    return Err(PlatformError::Device(msg.clone()));
                }
                MicrophoneOutcome::PublishWithoutTrack => None,
                MicrophoneOutcome::Publish => Some(Rc::new(SimTrack {
                    sid: LOCAL_MICROPHONE_SID.into(),
                    attached: RefCell::default(),
                    stats: Rc::clone(&self.stats),
                })
                    as Rc<dyn MediaStreamTrack>),
            };
            let published = track.is_some();
            self.enabled.set(true);
            *self.publication.borrow_mut() = Some(LocalPublication {
                sid: LOCAL_MICROPHONE_SID.into(),
                kind: TrackKind::Audio,
                source: TrackSource::Microphone,
                is_muted: false,
                track,
            });
            if published {
                let _ = self.events.unbounded_send(Event::LocalTrackPublished {
                    sid: LOCAL_MICROPHONE_SID.into(),
                    source: TrackSource::Microphone,
                });
            }
            Ok(())
        }
        .boxed_local()
    }

    fn is_microphone_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn publication(&self, source: TrackSource) -> Option<LocalPublication> {
        self.publication
            .borrow()
            .as_ref()
            .filter(|p| p.source == source)
            .cloned()
    }
}

pub struct SimTrack {
    sid: String,
    attached: RefCell<Vec<SinkId>>,
    stats: Rc<Stats>,
}

impl MediaStreamTrack for SimTrack {
    fn sid(&self) -> &str {
        &self.sid
    }

    fn attach(&self, sink: &dyn AudioSink) {
        self.stats.bump(|c| c.attaches += 1);
        let mut attached = self.attached.borrow_mut();
        if !attached.contains(&sink.id()) {
            attached.push(sink.id());
        }
    }

    fn detach(&self, sink: &dyn AudioSink) {
        self.stats.bump(|c| c.detaches += 1);
        self.attached.borrow_mut().retain(|id| *id != sink.id());
    }

    fn attached_sinks(&self) -> Vec<SinkId> {
        self.attached.borrow().clone()
    }
}

pub struct SimAudioOutput {
    stats: Rc<Stats>,
    next_id: Cell<SinkId>,
    autoplay_blocked: Rc<Cell<bool>>,
    sinks: RefCell<Vec<Rc<SimAudioSink>>>,
}

impl SimAudioOutput {
    /// Makes every following playback start fail as if the page had no
    /// user gesture yet.
    pub fn set_autoplay_blocked(&self, blocked: bool) {
        self.autoplay_blocked.set(blocked);
    }

    /// All sinks ever created, released ones included.
    pub fn sinks(&self) -> Vec<Rc<SimAudioSink>> {
        self.sinks.borrow().clone()
    }
}

impl AudioOutput for SimAudioOutput {
    fn create_sink(&self) -> Rc<dyn AudioSink> {
        self.stats.bump(|c| c.sinks_created += 1);
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let sink = Rc::new(SimAudioSink {
            id,
            autoplay: Cell::new(false),
            plays_inline: Cell::new(false),
            volume: Cell::new(0.0),
            released: Cell::new(false),
            autoplay_blocked: Rc::clone(&self.autoplay_blocked),
            stats: Rc::clone(&self.stats),
        });
        self.sinks.borrow_mut().push(Rc::clone(&sink));
        sink
    }
}

pub struct SimAudioSink {
    id: SinkId,
    autoplay: Cell<bool>,
    plays_inline: Cell<bool>,
    volume: Cell<f64>,
    released: Cell<bool>,
    autoplay_blocked: Rc<Cell<bool>>,
    stats: Rc<Stats>,
}

impl SimAudioSink {
    pub fn autoplay(&self) -> bool {
        self.autoplay.get()
    }

    pub fn plays_inline(&self) -> bool {
        self.plays_inline.get()
    }

    pub fn volume(&self) -> f64 {
        self.volume.get()
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

impl AudioSink for SimAudioSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn set_autoplay(&self, autoplay: bool) {
        self.autoplay.set(autoplay);
    }

    fn set_plays_inline(&self, plays_inline: bool) {
        self.plays_inline.set(plays_inline);
    }

    fn set_volume(&self, volume: f64) {
        self.volume.set(volume);
    }

    fn play(&self) -> LocalBoxFuture<'static, Result<(), PlaybackError>> {
        self.stats.bump(|c| c.plays += 1);
        let blocked = self.autoplay_blocked.get();
        let released = self.released.get();
        async move {
            tokio::task::yield_now().await;
            if released {
                Err(PlaybackError::Other("sink was released".into()))
            } else if blocked {
                Err(PlaybackError::AutoplayBlocked(
                    "play() failed because the user didn't interact with \
                     the document first"
                        .into(),
                ))
            } else {
                Ok(())
            }
        }
        .boxed_local()
    }

    fn release(&self) {
        self.stats.bump(|c| c.sinks_released += 1);
        self.released.set(true);
    }
}

pub struct SimMediaDevices {
    devices: Vec<MediaDeviceInfo>,
    failure: RefCell<Option<PlatformError>>,
}

impl SimMediaDevices {
    /// Makes the next enumeration fail with `err`.
    pub fn fail_with(&self, err: PlatformError) {
        *self.failure.borrow_mut() = Some(err);
    }
}

impl Default for SimMediaDevices {
    fn default() -> Self {
        Self {
            devices: vec![
                MediaDeviceInfo {
                    device_id: "default".into(),
                    kind: MediaDeviceKind::AudioInput,
                    label: "Default Microphone".into(),
                },
                MediaDeviceInfo {
                    device_id: "speakers".into(),
                    kind: MediaDeviceKind::AudioOutput,
                    label: "Speakers".into(),
                },
                MediaDeviceInfo {
                    device_id: "webcam".into(),
                    kind: MediaDeviceKind::VideoInput,
                    label: "Webcam".into(),
                },
            ],
            failure: RefCell::new(None),
        }
    }
}

impl MediaDevices for SimMediaDevices {
    fn enumerate_devices(
        &self,
    ) -> LocalBoxFuture<'_, Result<Vec<MediaDeviceInfo>, PlatformError>> {
        async move {
            match self.failure.borrow_mut().take() {
                Some(err) => Err(err),
                None => Ok(self.devices.clone()),
            }
        }
        .boxed_local()
    }
}
