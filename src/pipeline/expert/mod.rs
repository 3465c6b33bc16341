//! Remote expert model: the hosted, higher-accuracy classifier.
//!
//! Called only for capture events, never from the live loop. Every failure
//! surfaces as `RemoteUnavailable` so the escalation policy can fall back.

pub mod client;
pub mod types;

pub use client::{ExpertClient, HttpExpertClient};
pub use types::ExpertResponse;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteUnavailable {
    #[error("Cannot reach expert model: {0}")]
    Connection(String),

    #[error("Expert request timed out after {0}s")]
    Timeout(u64),

    #[error("Expert model error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed expert response: {0}")]
    MalformedResponse(String),

    #[error("Expert returned unknown class '{0}'")]
    UnknownLabel(String),

    #[error("Expert confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),
}
