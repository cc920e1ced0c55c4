use thiserror::Error;

/// Inline text shown when a request failed for lack of a network.
pub const OFFLINE_MESSAGE: &str = "You appear to be offline";

#[derive(Error, Debug)]
pub enum BroadsheetError {
    /// The caller withdrew interest; never shown to the user.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Server responded with HTTP {status}")]
    Remote { status: u16 },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl BroadsheetError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BroadsheetError::Cancelled)
    }

    /// Text for the inline message shown in the affected view.
    pub fn user_message(&self) -> String {
        match self {
            BroadsheetError::Cancelled => String::new(),
            BroadsheetError::Remote { status: 404 } => {
                "Not found on the server".to_string()
            }
            BroadsheetError::Remote { .. } | BroadsheetError::Decode(_) => {
                "The news service returned an unexpected response".to_string()
            }
            BroadsheetError::Network(_) => OFFLINE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BroadsheetError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            BroadsheetError::Remote {
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            BroadsheetError::Decode(e.to_string())
        } else {
            BroadsheetError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for BroadsheetError {
    fn from(e: serde_json::Error) -> Self {
        BroadsheetError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BroadsheetError>;
