use futures::future::LocalBoxFuture;

use crate::error::PlaybackError;

pub type SinkId = u64;

/// Playback resource rendering the audio of an attached track.
pub trait AudioSink {
    fn id(&self) -> SinkId;

    fn set_autoplay(&self, autoplay: bool);

    fn set_plays_inline(&self, plays_inline: bool);

    fn set_volume(&self, volume: f64);

    /// Starts playback.
    ///
    /// Resolves with [`PlaybackError::AutoplayBlocked`] if the platform
    /// requires a user gesture first.
    fn play(&self) -> LocalBoxFuture<'static, Result<(), PlaybackError>>;

    /// Frees the underlying output resource. The sink is unusable
    /// afterwards.
    fn release(&self);
}

/// Allocator of [`AudioSink`]s.
pub trait AudioOutput {
    fn create_sink(&self) -> std::rc::Rc<dyn AudioSink>;
}
