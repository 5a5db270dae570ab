use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use crate::{
    component::TaskHandle,
    proto::TrackSid,
    sys::{AudioOutput, AudioSink, MediaStreamTrack},
};

/// Playback sink owned by one track sid.
///
/// Dropping an entry detaches its track, releases the sink and aborts a
/// playback start still in flight.
pub(super) struct SinkEntry {
    sink: Rc<dyn AudioSink>,
    track: Option<Rc<dyn MediaStreamTrack>>,
    start: Option<TaskHandle>,
}

impl SinkEntry {
    fn new(output: &dyn AudioOutput) -> Self {
        let sink = output.create_sink();
        sink.set_autoplay(true);
        sink.set_plays_inline(true);
        sink.set_volume(1.0);
        Self {
            sink,
            track: None,
            start: None,
        }
    }

    pub(super) fn sink(&self) -> &Rc<dyn AudioSink> {
        &self.sink
    }

    /// Attaches `track` unless it's already the attached one.
    ///
    /// Returns `true` if an attach happened.
    pub(super) fn attach(&mut self, track: &Rc<dyn MediaStreamTrack>) -> bool {
        if let Some(current) = &self.track {
            if Rc::ptr_eq(current, track) {
                return false;
            }
            current.detach(&*self.sink);
        }
        track.attach(&*self.sink);
        self.track = Some(Rc::clone(track));
        true
    }

    pub(super) fn set_start(&mut self, start: TaskHandle) {
        self.start = Some(start);
    }
}

impl Drop for SinkEntry {
    fn drop(&mut self) {
        drop(self.start.take());
        if let Some(track) = self.track.take() {
            track.detach(&*self.sink);
        }
        self.sink.release();
    }
}

/// Track sid to playback sink mapping. At most one sink per sid.
#[derive(Default)]
pub(super) struct SinkRegistry {
    entries: HashMap<TrackSid, SinkEntry>,
}

impl SinkRegistry {
    /// Returns the sink of `sid`, registering a new one first if there is
    /// none yet. The flag is `true` for a freshly created sink.
    pub(super) fn get_or_create(
        &mut self,
        sid: &str,
        output: &dyn AudioOutput,
    ) -> (&mut SinkEntry, bool) {
        let created = !self.entries.contains_key(sid);
        let entry = self
            .entries
            .entry(sid.to_owned())
            .or_insert_with(|| SinkEntry::new(output));
        (entry, created)
    }

    /// Drops every entry whose sid doesn't satisfy `keep`, returning the
    /// dropped sids.
    pub(super) fn retain<F>(&mut self, mut keep: F) -> Vec<TrackSid>
    where
        F: FnMut(&str) -> bool,
    {
        let mut removed = Vec::new();
        self.entries.retain(|sid, _| {
            let retained = keep(sid.as_str());
            if !retained {
                debug!("Releasing audio sink of track {}", sid);
                removed.push(sid.clone());
            }
            retained
        });
        removed
    }

    /// Drops every entry, returning how many there were.
    pub(super) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn sids(&self) -> Vec<TrackSid> {
        let mut sids: Vec<_> = self.entries.keys().cloned().collect();
        sids.sort();
        sids
    }
}
