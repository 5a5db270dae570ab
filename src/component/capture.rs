//! Local microphone capture.

use std::{future::Future, rc::Rc, time::Duration};

use futures::StreamExt as _;
use futures_signals::signal::{Mutable, SignalExt as _};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::TaskHandle;
use crate::{
    error::CaptureError,
    proto::{Event, TrackSource},
    snapshot::{self, EventStream, Subscription},
    sys::{MediaDeviceKind, MediaDevices},
};

/// Nominal time given to the microphone publication to propagate.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    RequestingPermission,
    Enabled,
    /// Terminal until the component is mounted again.
    Failed(CaptureError),
}

impl CaptureState {
    /// Only forward transitions are allowed.
    pub fn can_advance_to(&self, next: &CaptureState) -> bool {
        use CaptureState as S;

        matches!(
            (self, next),
            (S::Idle, S::RequestingPermission)
                | (S::Idle, S::Failed(_))
                | (S::RequestingPermission, S::Enabled)
                | (S::RequestingPermission, S::Failed(_))
        )
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, CaptureState::Enabled | CaptureState::Failed(_))
    }
}

/// Requests the microphone once on mount and publishes it to the session.
///
/// Never retries: a failure stays in [`CaptureState::Failed`] for the
/// lifetime of this component.
pub struct LocalCapture {
    state: Mutable<CaptureState>,
    _task: TaskHandle,
    _subscription: Subscription,
}

impl LocalCapture {
    pub fn mount(
        room: Rc<snapshot::Room>,
        devices: Rc<dyn MediaDevices>,
        settle: Duration,
    ) -> Self {
        let state = Mutable::new(CaptureState::Idle);
        // Subscribe before enabling, so the publication notification
        // can't be missed.
        let (subscription, events) = room.subscribe();

        let task = TaskHandle::spawn({
            let state = state.clone();
            async move {
                let result = publish_microphone(
                    &room, &*devices, events, settle, &state,
                )
                .await;
                match result {
                    Ok(()) => {
                        info!("Microphone track published");
                        advance(&state, CaptureState::Enabled);
                    }
                    Err(e) => {
                        error!("Failed to publish microphone: {}", e);
                        advance(&state, CaptureState::Failed(e));
                    }
                }
            }
        });

        Self {
            state,
            _task: task,
            _subscription: subscription,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state.get_cloned()
    }

    pub fn state_mutable(&self) -> Mutable<CaptureState> {
        self.state.clone()
    }

    /// Resolves with the first settled [`CaptureState`].
    pub fn when_settled(&self) -> impl Future<Output = CaptureState> + 'static {
        let mut states = Box::pin(self.state.signal_cloned().to_stream());
        async move {
            let mut last = CaptureState::Idle;
            while let Some(state) = states.next().await {
                if state.is_settled() {
                    return state;
                }
                last = state;
            }
            last
        }
    }

    pub fn unmount(self) {
        debug!("Unmounting local capture in state {:?}", self.state());
    }
}

fn advance(state: &Mutable<CaptureState>, next: CaptureState) {
    let mut current = state.lock_mut();
    if current.can_advance_to(&next) {
        *current = next;
    } else {
        warn!("Ignoring capture transition {:?} -> {:?}", *current, next);
    }
}

async fn publish_microphone(
    room: &snapshot::Room,
    devices: &dyn MediaDevices,
    mut events: EventStream,
    settle: Duration,
    state: &Mutable<CaptureState>,
) -> Result<(), CaptureError> {
    info!("Requesting microphone permission");
    advance(state, CaptureState::RequestingPermission);

    match devices.enumerate_devices().await {
        Ok(devices) => {
            let inputs: Vec<_> = devices
                .iter()
                .filter(|d| d.kind == MediaDeviceKind::AudioInput)
                .map(|d| d.label.as_str())
                .collect();
            debug!("Available audio inputs: {:?}", inputs);
        }
        Err(e) => warn!("Failed to enumerate media devices: {}", e),
    }

    room.local().set_microphone_enabled(true).await?;
    info!("Microphone enabled");

    let confirmation = async {
        while let Some(event) = events.next().await {
            if let Event::LocalTrackPublished {
                source: TrackSource::Microphone,
                ..
            } = event
            {
                return true;
            }
        }
        false
    };
    let confirmed = timeout(settle, confirmation).await.unwrap_or(false);
    debug!("Microphone publication confirmed by session: {}", confirmed);

    let publication = room.local().publication(TrackSource::Microphone);
    match publication {
        Some(p) if p.track.is_some() => {
            debug!(
                "Microphone publication: sid = {}, muted = {}",
                p.sid, p.is_muted,
            );
            Ok(())
        }
        _ => Err(CaptureError::PublicationIncomplete),
    }
}
