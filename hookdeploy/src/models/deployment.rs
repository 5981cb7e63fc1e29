//! Deployment request models

use axum::body::Bytes;

/// Event kind announced by the trigger source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Ping,
    Push,
    Other(String),
}

impl EventKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "ping" => EventKind::Ping,
            "push" => EventKind::Push,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Ping => "ping",
            EventKind::Push => "push",
            EventKind::Other(other) => other,
        }
    }
}

/// A single incoming trigger, alive for the duration of one request
#[derive(Debug, Clone, Default)]
pub struct DeploymentRequest {
    /// Value of the event-type header, if any
    pub event: Option<String>,

    /// Value of the signature header, if any
    pub signature: Option<String>,

    /// `token` query parameter, if any
    pub token: Option<String>,

    /// Why the query string could not be parsed, if it could not
    pub query_error: Option<String>,

    /// Raw request body, exactly as received
    pub body: Bytes,
}

impl DeploymentRequest {
    /// Parsed event kind. Empty header values count as missing.
    pub fn event_kind(&self) -> Option<EventKind> {
        self.event
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(EventKind::parse)
    }
}
