use std::{rc::Rc, time::Duration};

use tokio::{task::LocalSet, time::sleep};

use voice_client::{
    component::{CaptureState, PlaybackState},
    error::{CaptureError, PlatformError},
    proto::Event,
    sys::sim::{MicrophoneOutcome, SimPlatform},
    ConnectionStatus, Credential, Error, Platform, Room, Settings,
};

fn room(sim: &SimPlatform) -> Rc<Room> {
    Room::new(
        Settings::default(),
        Platform {
            transport: sim.transport.clone(),
            devices: sim.devices.clone(),
            output: sim.output.clone(),
        },
    )
}

async fn joined(sim: &SimPlatform) -> Rc<Room> {
    let room = room(sim);
    room.join(&Credential::from_token("token")).await.unwrap();
    drain().await;
    room
}

/// Lets every pending notification and playback start run to completion.
async fn drain() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn reports_awaiting_credential_before_join() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = room(&sim);

            assert_eq!(room.status(), ConnectionStatus::AwaitingCredential);
            let report = room.status_report().to_string();
            assert!(report.contains("Connection: fetching token..."));
            assert!(report.contains("0 audio tracks"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn empty_session_has_no_sinks() {
    LocalSet::new()
        .run_until(async {
            let sim =
                SimPlatform::new("me", MicrophoneOutcome::Deny("nope".into()));
            let room = joined(&sim).await;

            assert_eq!(room.status(), ConnectionStatus::Connected);
            assert_eq!(
                room.when_capture_settled().unwrap().await,
                CaptureState::Failed(CaptureError::PermissionDenied(
                    "nope".into()
                )),
            );
            assert_eq!(room.sink_count(), 0);
            assert!(room.status_report().to_string().contains("0 audio tracks"));
            assert_eq!(sim.counts().sinks_created, 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn published_remote_audio_is_played_and_cleaned_up() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;

            sim.session.participant_connected("agent");
            sim.session.publish_audio("agent", "TR_1");
            drain().await;

            assert_eq!(room.sink_count(), 1);
            assert_eq!(
                room.playback().get("TR_1"),
                Some(&PlaybackState::Playing),
            );
            let counts = sim.counts();
            assert_eq!(counts.sinks_created, 1);
            assert_eq!(counts.attaches, 1);
            assert_eq!(counts.plays, 1);

            sim.session.unpublish("agent", "TR_1");
            drain().await;

            assert_eq!(room.sink_count(), 0);
            assert!(room.playback().is_empty());
            let counts = sim.counts();
            assert_eq!(counts.detaches, 1);
            assert_eq!(counts.sinks_released, 1);
            assert!(sim.output.sinks()[0].is_released());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn own_microphone_never_gets_a_sink() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;

            assert_eq!(
                room.when_capture_settled().unwrap().await,
                CaptureState::Enabled,
            );
            drain().await;

            let tracks = room.tracks();
            assert_eq!(tracks.len(), 1);
            assert!(tracks[0].is_local);
            assert_eq!(room.sink_count(), 0);
            assert_eq!(sim.counts().sinks_created, 0);
            assert!(room
                .status_report()
                .to_string()
                .contains("me - Microphone - audio (local)"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn roster_follows_local_microphone() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;
            assert!(!room.participants().unwrap().local_microphone_enabled);

            assert_eq!(
                room.when_capture_settled().unwrap().await,
                CaptureState::Enabled,
            );
            drain().await;

            let participants = room.participants().unwrap();
            assert!(participants.local_microphone_enabled);
            assert_eq!(participants.remote_count, 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn blocked_autoplay_keeps_sink_and_recovers() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            sim.output.set_autoplay_blocked(true);
            let room = joined(&sim).await;

            sim.session.publish_audio("agent", "TR_1");
            drain().await;

            assert_eq!(room.sink_count(), 1);
            assert!(matches!(
                room.playback().get("TR_1"),
                Some(PlaybackState::Blocked(_)),
            ));
            let report = room.status_report();
            assert!(matches!(
                &report.advisories()[..],
                [Error::AutoplayBlocked { track_sid, .. }] if track_sid == "TR_1"
            ));
            assert!(report
                .to_string()
                .contains("autoplay blocked for track TR_1"));

            sim.output.set_autoplay_blocked(false);
            sim.session.emit(Event::TrackMuted {
                participant: "agent".into(),
                sid: "TR_1".into(),
            });
            drain().await;

            assert_eq!(
                room.playback().get("TR_1"),
                Some(&PlaybackState::Playing),
            );
            let counts = sim.counts();
            assert_eq!(counts.sinks_created, 1);
            assert_eq!(counts.attaches, 1);
            assert_eq!(counts.plays, 2);
            assert!(room.status_report().advisories().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn repeated_passes_change_nothing() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;

            sim.session.publish_audio("agent", "TR_1");
            drain().await;
            let before = sim.counts();

            for _ in 0..3 {
                sim.session.emit(Event::TrackMuted {
                    participant: "agent".into(),
                    sid: "TR_1".into(),
                });
                sim.session.emit(Event::TrackUnmuted {
                    participant: "agent".into(),
                    sid: "TR_1".into(),
                });
            }
            drain().await;

            assert_eq!(sim.counts(), before);
            assert_eq!(room.sink_count(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn registry_follows_track_churn() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;

            sim.session.participant_connected("alice");
            sim.session.publish_audio("alice", "TR_1");
            sim.session.publish_audio("alice", "TR_2");
            drain().await;
            assert_eq!(room.sink_count(), 2);

            sim.session.unsubscribe("alice", "TR_1");
            drain().await;
            assert_eq!(room.sink_count(), 1);

            sim.session.subscribe("alice", "TR_1");
            drain().await;
            assert_eq!(room.sink_count(), 2);

            sim.session.participant_connected("bob");
            sim.session.publish_audio("bob", "TR_3");
            drain().await;
            assert_eq!(room.sink_count(), 3);

            sim.session.participant_disconnected("alice");
            drain().await;
            assert_eq!(room.sink_count(), 1);
            assert_eq!(
                room.participants().unwrap().remote_identities,
                ["bob"],
            );

            let counts = sim.counts();
            assert_eq!(counts.sinks_created, 4);
            assert_eq!(counts.sinks_released, 3);
            assert_eq!(counts.attaches, 4);
            assert_eq!(counts.detaches, 3);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn leave_releases_everything() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;

            for sid in ["TR_1", "TR_2", "TR_3"] {
                sim.session.publish_audio("agent", sid);
            }
            drain().await;
            assert_eq!(room.sink_count(), 3);

            room.leave().unwrap();

            assert_eq!(room.status(), ConnectionStatus::Disconnected);
            assert_eq!(room.sink_count(), 0);
            assert!(room.participants().is_none());
            let counts = sim.counts();
            assert_eq!(counts.sinks_created, 3);
            assert_eq!(counts.sinks_released, 3);
            assert_eq!(counts.detaches, 3);
            assert!(sim.output.sinks().iter().all(|s| s.is_released()));

            room.leave().unwrap();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn notifications_after_leave_are_ignored() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;
            room.leave().unwrap();

            sim.session.publish_audio("agent", "TR_1");
            drain().await;

            assert_eq!(sim.counts().sinks_created, 0);
            assert!(room.tracks().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn leave_while_connecting_mounts_nothing() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = room(&sim);

            let join = tokio::task::spawn_local({
                let room = Rc::clone(&room);
                async move { room.join(&Credential::from_token("token")).await }
            });
            drain().await;
            assert_eq!(room.status(), ConnectionStatus::Connecting);

            room.leave().unwrap();
            assert_eq!(room.status(), ConnectionStatus::Disconnected);

            join.await.unwrap().unwrap();
            sim.session.participant_connected("agent");
            sim.session.publish_audio("agent", "TR_1");
            drain().await;

            assert_eq!(room.status(), ConnectionStatus::Disconnected);
            assert!(room.capture_state().is_none());
            assert!(room.participants().is_none());
            assert_eq!(room.sink_count(), 0);
            assert_eq!(sim.counts().sinks_created, 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn refused_connection_leaves_room_disconnected() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            sim.transport
                .refuse_with(PlatformError::Transport("unreachable".into()));
            let room = room(&sim);

            let err = room
                .join(&Credential::from_token("token"))
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Connect(_)));
            assert_eq!(room.status(), ConnectionStatus::Disconnected);
            assert!(room.capture_state().is_none());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn server_disconnect_releases_sinks() {
    LocalSet::new()
        .run_until(async {
            let sim = SimPlatform::new("me", MicrophoneOutcome::Publish);
            let room = joined(&sim).await;

            sim.session.participant_connected("agent");
            sim.session.publish_audio("agent", "TR_1");
            drain().await;
            assert_eq!(room.sink_count(), 1);

            sim.session.disconnect("server shutdown");
            drain().await;

            assert_eq!(room.status(), ConnectionStatus::Disconnected);
            assert_eq!(room.sink_count(), 0);
            assert_eq!(room.participants().unwrap().remote_count, 0);
            assert_eq!(sim.counts().sinks_released, 1);
            room.leave().unwrap();
        })
        .await;
}
