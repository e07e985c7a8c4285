//! Backend session handles and the connector that produces them.
//!
//! The connector is the only place that knows what a valid connection needs
//! (platform, runtime markers, executable). Stages only ever see a handle.
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod mumps;

/// Identity of one connection; distinct for every successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait Session {
    fn id(&self) -> SessionId;
}

/// Opens backend sessions on demand.
///
/// Each call yields an independent handle; prior handles are neither reused
/// nor validated.
pub trait Connector {
    type Session: Session;

    fn connect(&mut self, log: &Path) -> Result<Self::Session, ConnectError>;
}

/// How an issued command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The command returned and the session is still usable.
    Returned,
    /// The backend ended the session while (or after) running the command.
    Halted,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("backend runtime not configured: {0}")]
    Environment(String),
    #[error("open session log {}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("spawn backend {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backend session not ready")]
    NotReady(#[source] SessionError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
    #[error("backend error: {0}")]
    Backend(String),
    #[error("session i/o")]
    Io(#[from] std::io::Error),
}
