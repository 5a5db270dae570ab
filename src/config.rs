//! Command-line configuration.

use std::time::Duration;

use clap::Parser;

use crate::component::Settings;

/// Joins a voice room and plays back the audio of remote participants
#[derive(Parser, Debug)]
#[command(name = "voice-client")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Session server URL
    #[arg(
        long,
        env = "VOICE_CLIENT_SERVER_URL",
        default_value = "ws://localhost:7880"
    )]
    pub server_url: String,

    /// Base URL of the token endpoint
    #[arg(
        long,
        env = "VOICE_CLIENT_BACKEND_URL",
        default_value = "http://localhost:8000"
    )]
    pub backend_url: String,

    /// Pre-issued session token, skips the token endpoint
    #[arg(long, env = "VOICE_CLIENT_TOKEN")]
    pub token: Option<String>,

    /// Identity of the local participant in the simulated session
    #[arg(long, default_value = "user-web-client")]
    pub identity: String,

    /// Upper bound of the wait for the microphone publication, in ms
    #[arg(long, default_value_t = 1000)]
    pub publication_settle_ms: u64,

    /// Simulate a browser which blocks autoplay
    #[arg(long)]
    pub autoplay_blocked: bool,
}

impl Args {
    pub fn settings(&self) -> Settings {
        Settings {
            server_url: self.server_url.clone(),
            publication_settle: Duration::from_millis(
                self.publication_settle_ms,
            ),
        }
    }
}
