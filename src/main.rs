use std::time::Duration;

use anyhow::Context as _;
use clap::Parser as _;
use tokio::{task, time::sleep};
use tracing::{error, info, warn};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use voice_client::{
    config::Args,
    credential::{self, Credential},
    proto::{TrackKind, TrackSource},
    sys::sim::{MicrophoneOutcome, SimPlatform},
    Platform, Room,
};

const AGENT: &str = "voice-agent";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("voice_client=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting voice-client {}", env!("CARGO_PKG_VERSION"));

    task::LocalSet::new().run_until(run(args)).await
}

async fn run(args: Args) -> anyhow::Result<()> {
    let sim =
        SimPlatform::new(args.identity.clone(), MicrophoneOutcome::Publish);
    sim.output.set_autoplay_blocked(args.autoplay_blocked);
    let room = Room::new(
        args.settings(),
        Platform {
            transport: sim.transport.clone(),
            devices: sim.devices.clone(),
            output: sim.output.clone(),
        },
    );

    let credential = match &args.token {
        Some(token) => Credential::from_token(token.clone()),
        None => match credential::fetch(&args.backend_url).await {
            Ok(credential) => credential,
            Err(e) => {
                error!("{}", e);
                print!("{}", room.status_report());
                info!("Waiting for Ctrl-C");
                tokio::signal::ctrl_c()
                    .await
                    .context("failed to listen for Ctrl-C")?;
                return Ok(());
            }
        },
    };

    room.join(&credential)
        .await
        .context("failed to join the room")?;
    if let Some(settled) = room.when_capture_settled() {
        info!("Microphone settled: {:?}", settled.await);
    }

    sim.session.participant_connected(AGENT);
    sim.session.publish_audio(AGENT, "TR_agent_voice");
    sim.session.publish(
        AGENT,
        "TR_agent_camera",
        TrackKind::Video,
        TrackSource::Camera,
    );
    sim.session.publish(
        AGENT,
        "TR_agent_mystery",
        TrackKind::Unknown,
        TrackSource::Unknown,
    );
    sim.session.subscribe(AGENT, "TR_agent_mystery");
    sleep(Duration::from_millis(100)).await;
    print!("{}", room.status_report());

    sim.session.unpublish(AGENT, "TR_agent_voice");
    sim.session.participant_disconnected(AGENT);
    sleep(Duration::from_millis(100)).await;
    print!("{}", room.status_report());

    if let Err(e) = room.leave() {
        warn!("Room teardown was incomplete: {}", e);
        return Err(e.into());
    }
    let counts = sim.counts();
    info!(
        "Sinks created: {}, released: {}",
        counts.sinks_created, counts.sinks_released,
    );
    Ok(())
}
