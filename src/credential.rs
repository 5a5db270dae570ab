//! Session credential endpoint client.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Credential issued by the token endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub token: String,

    /// Session server URL, if the endpoint names one.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub room: Option<String>,
}

impl Credential {
    /// Credential issued out of band.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            url: None,
            room: None,
        }
    }

    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| Error::CredentialUnavailable(e.to_string()))
    }
}

/// Fetches a credential with `GET {backend_url}/token`. Never retries.
pub async fn fetch(backend_url: &str) -> Result<Credential> {
    let endpoint = format!("{}/token", backend_url.trim_end_matches('/'));
    debug!("Requesting session token from {}", endpoint);

    let unavailable =
        |e: reqwest::Error| Error::CredentialUnavailable(e.to_string());
    let body = reqwest::get(&endpoint)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(unavailable)?
        .text()
        .await
        .map_err(unavailable)?;

    let credential = Credential::parse(&body)?;
    info!("Got session token for room {:?}", credential.room);
    Ok(credential)
}
