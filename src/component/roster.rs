//! Remote participants roster.

use std::rc::Rc;

use futures::StreamExt as _;
use futures_signals::signal::Mutable;
use tracing::{debug, info};

use super::TaskHandle;
use crate::{
    proto::{Event, ParticipantIdentity},
    snapshot::{self, Subscription},
};

/// Derived view of the session participants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticipantSnapshot {
    pub remote_count: usize,
    pub remote_identities: Vec<ParticipantIdentity>,
    pub local_identity: ParticipantIdentity,
    pub local_microphone_enabled: bool,
}

impl ParticipantSnapshot {
    fn collect(room: &snapshot::Room) -> Self {
        Self {
            remote_count: room.remote_count(),
            remote_identities: room.remote_identities(),
            local_identity: room.local_identity(),
            local_microphone_enabled: room.is_microphone_enabled(),
        }
    }
}

/// Recomputes [`ParticipantSnapshot`] on every roster notification.
pub struct Roster {
    snapshot: Mutable<ParticipantSnapshot>,
    _task: TaskHandle,
    _subscription: Subscription,
}

impl Roster {
    pub fn mount(room: Rc<snapshot::Room>) -> Self {
        let snapshot = Mutable::new(ParticipantSnapshot::default());
        recompute(&room, &snapshot);

        let (subscription, mut events) = room.subscribe();
        let task = TaskHandle::spawn({
            let snapshot = snapshot.clone();
            async move {
                while let Some(event) = events.next().await {
                    match &event {
                        Event::ParticipantConnected { identity } => {
                            info!("Participant joined: {}", identity);
                        }
                        Event::ParticipantDisconnected { identity } => {
                            info!("Participant left: {}", identity);
                        }
                        _ => (),
                    }
                    if event.changes_roster() {
                        recompute(&room, &snapshot);
                    }
                }
            }
        });

        Self {
            snapshot,
            _task: task,
            _subscription: subscription,
        }
    }

    pub fn snapshot(&self) -> ParticipantSnapshot {
        self.snapshot.get_cloned()
    }

    pub fn snapshot_mutable(&self) -> Mutable<ParticipantSnapshot> {
        self.snapshot.clone()
    }

    pub fn unmount(self) {
        debug!("Unmounting roster");
    }
}

fn recompute(room: &snapshot::Room, snapshot: &Mutable<ParticipantSnapshot>) {
    let current = ParticipantSnapshot::collect(room);
    if *snapshot.lock_ref() == current {
        return;
    }
    info!("Remote participants: {}", current.remote_count);
    info!("Local microphone enabled: {}", current.local_microphone_enabled);
    for identity in &current.remote_identities {
        info!("Remote participant: {}", identity);
    }
    snapshot.set_neq(current);
}

#[cfg(test)]
mod tests {
    use futures::future;
    use futures_signals::signal::SignalExt as _;
    use tokio::task::LocalSet;

    use super::*;
    use crate::{
        proto::{Publication, TrackKind, TrackSource},
        sys::sim::{MicrophoneOutcome, SimPlatform},
    };

    async fn next_count(
        roster: &Roster,
        expected: usize,
    ) -> ParticipantSnapshot {
        let mut snapshots = Box::pin(
            roster
                .snapshot_mutable()
                .signal_cloned()
                .to_stream()
                .filter(|s| future::ready(s.remote_count == expected)),
        );
        snapshots.next().await.unwrap()
    }

    #[tokio::test]
    async fn counts_remote_participants() {
        LocalSet::new()
            .run_until(async {
                let platform = SimPlatform::new("me", MicrophoneOutcome::Publish);
                let room = snapshot::Room::new(platform.session.local());
                let roster = Roster::mount(Rc::clone(&room));

                let initial = roster.snapshot();
                assert_eq!(initial.remote_count, 0);
                assert_eq!(initial.local_identity, "me");
                assert!(!initial.local_microphone_enabled);

                room.apply(Event::ParticipantConnected {
                    identity: "agent".into(),
                });
                room.apply(Event::ParticipantConnected {
                    identity: "bob".into(),
                });
                let two = next_count(&roster, 2).await;
                assert_eq!(two.remote_identities, ["agent", "bob"]);

                room.apply(Event::ParticipantDisconnected {
                    identity: "agent".into(),
                });
                let one = next_count(&roster, 1).await;
                assert_eq!(one.remote_identities, ["bob"]);
            })
            .await;
    }

    #[tokio::test]
    async fn counts_participants_known_only_by_their_tracks() {
        LocalSet::new()
            .run_until(async {
                let platform =
                    SimPlatform::new("me", MicrophoneOutcome::Publish);
                let room = snapshot::Room::new(platform.session.local());
                let roster = Roster::mount(Rc::clone(&room));

                room.apply(Event::TrackPublished {
                    participant: "agent".into(),
                    publication: Publication {
                        sid: "TR_1".into(),
                        kind: TrackKind::Audio,
                        source: TrackSource::Microphone,
                        is_muted: false,
                    },
                });
                let one = next_count(&roster, 1).await;
                assert_eq!(one.remote_identities, ["agent"]);
                assert_eq!(room.remote_count(), one.remote_count);
            })
            .await;
    }

    #[tokio::test]
    async fn unmount_deregisters_subscription() {
        LocalSet::new()
            .run_until(async {
                let platform = SimPlatform::new("me", MicrophoneOutcome::Publish);
                let room = snapshot::Room::new(platform.session.local());
                let roster = Roster::mount(Rc::clone(&room));
                assert_eq!(room.subscriber_count(), 1);

                roster.unmount();
                assert_eq!(room.subscriber_count(), 0);
            })
            .await;
    }
}
