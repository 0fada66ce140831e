use crate::model::PayloadError;
use std::error::Error as _;
use std::io;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Tasks,
    Logs,
}

impl FetchKind {
    pub fn label(&self) -> &'static str {
        match self {
            FetchKind::Tasks => "tasks",
            FetchKind::Logs => "logs",
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("no {} URL configured", .0.label())]
    NotConfigured(FetchKind),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Transport(String),
    #[error("invalid JSON: {0}")]
    Parse(String),
    #[error("invalid data: {0}")]
    Schema(String),
    #[error("sample data unavailable: {0}")]
    Sample(String),
}

impl FetchError {
    /// Failures that mean the network itself is unreachable rather than the
    /// source misbehaving.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

impl From<PayloadError> for FetchError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Parse(msg) => FetchError::Parse(msg),
            PayloadError::Schema(msg) => FetchError::Schema(msg),
        }
    }
}

/// Blocking GET returning the response body. Implementations run on worker
/// threads, so they must be shareable.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(10))
                .user_agent(concat!("taskwatch/", env!("CARGO_PKG_VERSION")))
                .build(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        HttpTransport::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let resp = self
            .agent
            .get(url)
            .timeout(timeout)
            .call()
            .map_err(classify)?;
        resp.into_string().map_err(|e| io_error(&e))
    }
}

fn classify(err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Status(code, _) => FetchError::Http(code),
        ureq::Error::Transport(transport) => {
            let timed_out = transport
                .source()
                .and_then(|src| src.downcast_ref::<io::Error>())
                .map(|e| matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock))
                .unwrap_or(false);
            if timed_out {
                FetchError::Timeout
            } else {
                FetchError::Transport(transport.to_string())
            }
        }
    }
}

fn io_error(err: &io::Error) -> FetchError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FetchError::Timeout,
        _ => FetchError::Transport(err.to_string()),
    }
}
