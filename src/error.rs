// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
    /// Slack answered `ok: false`; carries the provider error code.
    #[error("slack api error: {0}")]
    Slack(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),
}

impl RelayError {
    /// Short label for metrics and log fields.
    pub fn code(&self) -> &str {
        match self {
            RelayError::Http(_) => "transport",
            RelayError::Status { .. } => "status",
            RelayError::Slack(code) => code.as_str(),
            RelayError::Json(_) => "json",
            RelayError::Io(_) => "io",
            RelayError::WebSocket(_) => "websocket",
            RelayError::Url(_) => "url",
        }
    }
}
