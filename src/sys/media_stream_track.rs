use super::{AudioSink, SinkId};

/// Live media track which can be rendered by an [`AudioSink`].
pub trait MediaStreamTrack {
    fn sid(&self) -> &str;

    /// Routes this track into the `sink`.
    ///
    /// Attaching a track to a sink it's already attached to is a no-op.
    fn attach(&self, sink: &dyn AudioSink);

    fn detach(&self, sink: &dyn AudioSink);

    /// Sinks this track is currently attached to.
    fn attached_sinks(&self) -> Vec<SinkId>;
}
