//! The narrow remote surface the batch logic depends on.
//!
//! `MonitorApi` is implemented by the Uptime Kuma Socket.IO client and by the
//! in-memory fake used in tests.

use crate::monitor::{Monitor, MonitorId, Tag};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Login credentials for the monitoring server.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Optional operations a client may or may not offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// A dedicated resume call exists.
    pub resume: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { resume: true }
    }
}

/// Faults raised by the remote API or the transport beneath it.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server could not be reached or the WebSocket failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected the credentials.
    #[error("login failed: {0}")]
    Login(String),

    /// The server answered a request with `ok: false`.
    #[error("{operation} rejected by server: {message}")]
    Rejected { operation: String, message: String },

    /// The server's reply did not have the expected shape.
    #[error("unexpected response to {operation}: {detail}")]
    Protocol { operation: String, detail: String },

    /// No reply arrived within the configured timeout.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The client does not offer the requested operation.
    #[error("operation not supported by this client: {0}")]
    Unsupported(&'static str),

    /// The session was used before login or after disconnect.
    #[error("not connected")]
    NotConnected,
}

impl ApiError {
    pub fn protocol(operation: &str, detail: impl Into<String>) -> Self {
        ApiError::Protocol {
            operation: operation.to_string(),
            detail: detail.into(),
        }
    }
}

/// Operations against a monitoring server.
///
/// A session is stateful (one authenticated connection), so every call takes
/// `&mut self` and calls are made strictly one after another.
#[async_trait]
pub trait MonitorApi: Send {
    /// Authenticate the session.
    async fn login(&mut self, credentials: &Credentials) -> Result<(), ApiError>;

    /// Fetch every monitor visible to the logged-in user, in server order.
    async fn list_monitors(&mut self) -> Result<Vec<Monitor>, ApiError>;

    /// Fetch the tags attached to one monitor.
    async fn tags_for_monitor(&mut self, id: MonitorId) -> Result<Vec<Tag>, ApiError>;

    async fn pause_monitor(&mut self, id: MonitorId) -> Result<(), ApiError>;

    /// Optional operations this client offers. Callers must consult this
    /// before relying on `resume_monitor`.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Dedicated resume call. Clients without one keep the default, which
    /// reports the operation as unsupported.
    async fn resume_monitor(&mut self, _id: MonitorId) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("resume_monitor"))
    }

    /// Re-submit a monitor's fields.
    async fn edit_monitor(&mut self, monitor: &Monitor) -> Result<(), ApiError>;

    /// Close the session. Must be safe to call on a session that never
    /// logged in.
    async fn disconnect(&mut self) -> Result<(), ApiError>;
}
