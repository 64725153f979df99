use serde::Deserialize;

/// Coarse classification used for diagnostics and failure counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// No response was obtained at all.
    TransportFailure,
    /// A response arrived but could not be accepted.
    ApplicationFailure,
    /// The surrounding page did not provide what the flow needs.
    Ui,
}

impl RequestErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransportFailure => "transport_failure",
            Self::ApplicationFailure => "application_failure",
            Self::Ui => "ui",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request transport failed: {message}")]
    Transport { message: String },
    #[error("request failed with status {status}{}", detail_suffix(.message.as_deref()))]
    Application {
        status: u16,
        message: Option<String>,
    },
    #[error("failed to decode response (status {status}): {message}")]
    Decode { status: u16, message: String },
    #[error("element `{id}` not found")]
    ElementNotFound { id: String },
    #[error("control `{id}` is busy")]
    ControlBusy { id: String },
}

fn detail_suffix(message: Option<&str>) -> String {
    message.map(|message| format!(": {message}")).unwrap_or_default()
}

impl RequestError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Builds an application failure, keeping the server's envelope message when
    /// the body carries one.
    pub fn from_status(status: u16, raw_body: &str) -> Self {
        Self::Application {
            status,
            message: envelope_message(raw_body),
        }
    }

    pub fn decode(status: u16, raw_body: &str, error: &serde_json::Error) -> Self {
        let message = match envelope_message(raw_body) {
            Some(server_message) => format!("{error} (server said: {server_message})"),
            None => error.to_string(),
        };
        Self::Decode { status, message }
    }

    #[must_use]
    pub fn kind(&self) -> RequestErrorKind {
        match self {
            Self::Transport { .. } => RequestErrorKind::TransportFailure,
            Self::Application { .. } | Self::Decode { .. } => RequestErrorKind::ApplicationFailure,
            Self::ElementNotFound { .. } | Self::ControlBusy { .. } => RequestErrorKind::Ui,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::ControlBusy { .. })
    }
}

/// `{"ok":0,"message":"No such user"}` as answered by the mailer service.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    message: Option<String>,
}

fn envelope_message(raw_body: &str) -> Option<String> {
    serde_json::from_str::<ApiEnvelope>(raw_body)
        .ok()
        .and_then(|envelope| envelope.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}
