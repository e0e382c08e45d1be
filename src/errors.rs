use thiserror::Error;

/// Errors produced while talking to the backend or the local state directory.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status or `success: false`.
    #[error("server error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    /// The bearer credential was missing, invalid or expired.
    #[error("authentication rejected: {}", .message.as_deref().unwrap_or("no message"))]
    Unauthorized { message: Option<String> },

    /// The response body did not match the expected envelope.
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Input was rejected before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// Reading or writing persisted client state failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),
}

/// Coarse classification of an [`ApiError`], cheap to copy into outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Server,
    Unauthorized,
    Decode,
    Validation,
    Persistence,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) => ErrorKind::Transport,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Message to show a person: the server's own text when it sent one,
    /// otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Server { message: Some(m), .. }
            | ApiError::Unauthorized { message: Some(m) }
                if !m.trim().is_empty() =>
            {
                m.clone()
            }
            ApiError::Validation(m) => m.clone(),
            _ => fallback.to_string(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_wins_over_fallback() {
        let err = ApiError::Server {
            status: 400,
            message: Some("Title is required".into()),
        };
        assert_eq!(err.user_message("Failed to fetch"), "Title is required");
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[test]
    fn blank_or_missing_message_uses_fallback() {
        let blank = ApiError::Unauthorized {
            message: Some("   ".into()),
        };
        let missing = ApiError::Server {
            status: 502,
            message: None,
        };
        assert_eq!(blank.user_message("Failed to fetch"), "Failed to fetch");
        assert_eq!(missing.user_message("Failed to fetch"), "Failed to fetch");
        assert!(blank.is_unauthorized());
    }

    #[test]
    fn io_errors_are_persistence_errors() {
        let err: ApiError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.user_message("Could not save"), "Could not save");
    }
}
