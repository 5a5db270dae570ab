use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    future::Future,
    rc::Rc,
    time::Duration,
};

use futures::{stream::LocalBoxStream, StreamExt as _};
use futures_signals::signal::Mutable;
use tracing::{debug, error, info, warn};

use super::{
    capture::DEFAULT_SETTLE_DELAY, media::TrackSummary, AudioRenderer,
    CaptureState, LocalCapture, ParticipantSnapshot, PlaybackState, Roster,
    TaskHandle,
};
use crate::{
    credential::Credential,
    error::{Error, Result},
    proto::{Event, TrackSid},
    snapshot,
    status::StatusReport,
    sys::{AudioOutput, MediaDevices, Transport},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    AwaitingCredential,
    Connecting,
    Connected,
    Disconnected,
}

/// Handles of the external media platform.
#[derive(Clone)]
pub struct Platform {
    pub transport: Rc<dyn Transport>,
    pub devices: Rc<dyn MediaDevices>,
    pub output: Rc<dyn AudioOutput>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Session server URL used unless the credential names another one.
    pub server_url: String,

    /// Upper bound of the wait for the microphone publication.
    pub publication_settle: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:7880".into(),
            publication_settle: DEFAULT_SETTLE_DELAY,
        }
    }
}

struct Mounted {
    session: Rc<snapshot::Room>,
    capture: LocalCapture,
    roster: Roster,
    renderer: AudioRenderer,
    pump: TaskHandle,
}

/// Session shell composing capture, roster and audio rendering over one
/// shared session.
pub struct Room {
    settings: Settings,
    platform: Platform,
    status: Mutable<ConnectionStatus>,
    mounted: RefCell<Option<Mounted>>,

    /// Bumped by every [`Room::leave`], so a `join` outliving it doesn't
    /// mount anything.
    generation: Cell<u64>,
}

impl Room {
    pub fn new(settings: Settings, platform: Platform) -> Rc<Self> {
        Rc::new(Self {
            settings,
            platform,
            status: Mutable::new(ConnectionStatus::AwaitingCredential),
            mounted: RefCell::new(None),
            generation: Cell::new(0),
        })
    }

    /// Connects with the `credential` and mounts all the components.
    ///
    /// A failed connection leaves the room [`ConnectionStatus::Disconnected`].
    pub async fn join(&self, credential: &Credential) -> Result<()> {
        if self.mounted.borrow().is_some() {
            warn!("Room is already joined");
            return Ok(());
        }
        if self.status.get() == ConnectionStatus::Connecting {
            warn!("Room is already connecting");
            return Ok(());
        }

        let generation = self.generation.get();
        self.status.set_neq(ConnectionStatus::Connecting);
        let url = credential
            .url
            .as_deref()
            .unwrap_or(&self.settings.server_url);
        info!("Connecting to {}", url);

        let connection =
            match self.platform.transport.connect(url, &credential.token).await
            {
                Ok(connection) => connection,
                Err(e) => {
                    error!("Connection error: {}", e);
                    self.status.set_neq(ConnectionStatus::Disconnected);
                    return Err(e.into());
                }
            };
        if self.generation.get() != generation {
            info!("Room was left while connecting, dropping the connection");
            return Ok(());
        }

        let session = snapshot::Room::new(connection.local);
        let capture = LocalCapture::mount(
            Rc::clone(&session),
            Rc::clone(&self.platform.devices),
            self.settings.publication_settle,
        );
        let roster = Roster::mount(Rc::clone(&session));
        let renderer = AudioRenderer::mount(
            Rc::clone(&session),
            Rc::clone(&self.platform.output),
        );
        let pump = TaskHandle::spawn(pump_events(
            Rc::clone(&session),
            connection.events,
            self.status.clone(),
        ));

        *self.mounted.borrow_mut() = Some(Mounted {
            session,
            capture,
            roster,
            renderer,
            pump,
        });
        Ok(())
    }

    /// Unmounts all the components and releases every audio sink.
    pub fn leave(&self) -> Result<()> {
        self.generation.set(self.generation.get() + 1);
        let Some(mounted) = self.mounted.borrow_mut().take() else {
            if self.status.get() == ConnectionStatus::Connecting {
                info!("Left the room before the connection was established");
                self.status.set_neq(ConnectionStatus::Disconnected);
            }
            return Ok(());
        };
        let Mounted {
            session,
            capture,
            roster,
            renderer,
            pump,
        } = mounted;

        drop(pump);
        capture.unmount();
        roster.unmount();
        renderer.unmount();
        self.status.set_neq(ConnectionStatus::Disconnected);
        info!("Left the room");

        let leaked = session.subscriber_count();
        if leaked > 0 {
            error!("{} session subscriptions outlived the room", leaked);
            return Err(Error::SubscriptionCallbackLeak(leaked));
        }
        Ok(())
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    pub fn status_mutable(&self) -> Mutable<ConnectionStatus> {
        self.status.clone()
    }

    pub fn capture_state(&self) -> Option<CaptureState> {
        self.with_mounted(|m| m.capture.state())
    }

    /// Resolves with the settled capture state, if the room is joined.
    pub fn when_capture_settled(
        &self,
    ) -> Option<impl Future<Output = CaptureState> + 'static> {
        self.with_mounted(|m| m.capture.when_settled())
    }

    pub fn participants(&self) -> Option<ParticipantSnapshot> {
        self.with_mounted(|m| m.roster.snapshot())
    }

    pub fn tracks(&self) -> Vec<TrackSummary> {
        self.with_mounted(|m| m.renderer.tracks()).unwrap_or_default()
    }

    pub fn playback(&self) -> BTreeMap<TrackSid, PlaybackState> {
        self.with_mounted(|m| m.renderer.playback())
            .unwrap_or_default()
    }

    pub fn sink_count(&self) -> usize {
        self.with_mounted(|m| m.renderer.sink_count()).unwrap_or(0)
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            connection: self.status(),
            capture: self.capture_state(),
            participants: self.participants(),
            tracks: self.tracks(),
            playback: self.playback(),
        }
    }

    fn with_mounted<T>(&self, f: impl FnOnce(&Mounted) -> T) -> Option<T> {
        self.mounted.borrow().as_ref().map(f)
    }
}

/// Delivers session notifications to the mirror in order.
async fn pump_events(
    session: Rc<snapshot::Room>,
    mut events: LocalBoxStream<'static, Event>,
    status: Mutable<ConnectionStatus>,
) {
    while let Some(event) = events.next().await {
        match &event {
            Event::Connected => {
                info!("Connected to room");
                status.set_neq(ConnectionStatus::Connected);
            }
            Event::Disconnected { reason } => {
                info!("Disconnected from room: {:?}", reason);
                status.set_neq(ConnectionStatus::Disconnected);
            }
            Event::Error(e) => error!("Session error: {}", e),
            _ => (),
        }
        session.apply(event);
    }
    debug!("Session notifications ended");
    status.set_neq(ConnectionStatus::Disconnected);
}
