//! Voice room client keeping remote audio playback in sync with the
//! published tracks of a session.

pub mod component;
pub mod config;
pub mod credential;
pub mod error;
pub mod proto;
pub mod snapshot;
pub mod status;
pub mod sys;

pub use self::{
    component::{ConnectionStatus, Platform, Room, Settings},
    credential::Credential,
    error::{Error, Result},
    status::StatusReport,
};
