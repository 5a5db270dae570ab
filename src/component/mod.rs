pub mod capture;
pub mod media;
pub mod roster;
pub mod room;

use std::future::Future;

use tokio::task::{spawn_local, JoinHandle};

pub use self::{
    capture::{CaptureState, LocalCapture},
    media::{AudioRenderer, PlaybackState, TrackSummary},
    roster::{ParticipantSnapshot, Roster},
    room::{ConnectionStatus, Platform, Room, Settings},
};

/// Spawned local task which is aborted once its handle is dropped.
pub(crate) struct TaskHandle(JoinHandle<()>);

impl TaskHandle {
    pub(crate) fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self(spawn_local(task))
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
