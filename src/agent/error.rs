use std::time::Duration;

use thiserror::Error;

/// A single device-level failure (capture or action injection).
#[derive(Debug, Error)]
pub enum DeviceFault {
    /// adb could not be spawned at all
    #[error("failed to spawn `{program}` (is adb installed?): {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("malformed capture: {0}")]
    Capture(String),

    #[error("no device attached")]
    NoDevice,

    #[error("device fault: {0}")]
    Other(String),
}

/// Failure of the external reasoning service call.
#[derive(Debug, Error)]
pub enum ServiceFault {
    #[error("inference request timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference transport error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("inference service returned no choices")]
    EmptyReply,

    #[error("could not prepare screenshot: {0}")]
    Image(String),
}

impl ServiceFault {
    /// Failure on this side of the wire, before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(self, ServiceFault::Image(_))
    }
}

impl From<reqwest::Error> for ServiceFault {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not expose the configured duration
            ServiceFault::Timeout(Duration::ZERO)
        } else {
            ServiceFault::Http(e)
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Device(#[from] DeviceFault),

    #[error(transparent)]
    Service(#[from] ServiceFault),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
