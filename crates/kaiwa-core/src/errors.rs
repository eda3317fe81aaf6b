use std::time::Duration;

/// Typed error hierarchy for collaborator (generative model / speech) calls.
/// Classifies errors as fatal (don't retry), retryable, or operational.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CollaboratorError {
    // Fatal — don't retry
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Retryable
    #[error("model returned no usable output")]
    EmptyOutput,
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("service overloaded")]
    Overloaded,
    #[error("network error: {0}")]
    NetworkError(String),

    // Operational
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl CollaboratorError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmptyOutput
                | Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::Overloaded
                | Self::NetworkError(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::InvalidRequest(_))
    }

    pub fn suggested_delay(&self) -> Option<Duration> {
        if let Self::RateLimited { retry_after } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Short classification string for logging and client-facing labels.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::EmptyOutput => "empty_output",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::Overloaded => "overloaded",
            Self::NetworkError(_) => "network_error",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 => Self::InvalidRequest(body),
            429 => Self::RateLimited { retry_after: None },
            529 => Self::Overloaded,
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

/// Errors raised while orchestrating a dialogue turn.
///
/// Recovery and collaborator failures degrade to a `status = ERROR` turn at
/// the driver; `EmptyHistory` is a caller contract violation and is rejected
/// before any collaborator call.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TurnError {
    #[error("no JSON object found in model output")]
    NoJsonFound,
    #[error("model signaled an error turn")]
    ModelSignaledError,
    #[error("collaborator unavailable: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error("history is empty; the latest user turn is required")]
    EmptyHistory,
}

impl TurnError {
    /// Whether the driver can degrade this into an ERROR turn rather than
    /// rejecting the request outright.
    pub fn is_degradable(&self) -> bool {
        !matches!(self, Self::EmptyHistory)
    }

    /// Coarse category label — the only error detail exposed to callers.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NoJsonFound => "no_json_found",
            Self::ModelSignaledError => "model_signaled_error",
            Self::Collaborator(_) => "collaborator_unavailable",
            Self::EmptyHistory => "empty_history",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CollaboratorError::EmptyOutput.is_retryable());
        assert!(CollaboratorError::RateLimited { retry_after: None }.is_retryable());
        assert!(CollaboratorError::ServerError { status: 500, body: "err".into() }.is_retryable());
        assert!(CollaboratorError::Overloaded.is_retryable());
        assert!(CollaboratorError::NetworkError("tcp".into()).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(CollaboratorError::AuthenticationFailed("bad key".into()).is_fatal());
        assert!(CollaboratorError::InvalidRequest("bad".into()).is_fatal());
        assert!(!CollaboratorError::Timeout(Duration::from_secs(30)).is_fatal());
        assert!(!CollaboratorError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn suggested_delay_only_for_rate_limit() {
        let rl = CollaboratorError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(rl.suggested_delay(), Some(Duration::from_secs(5)));
        assert_eq!(CollaboratorError::Overloaded.suggested_delay(), None);
    }

    #[test]
    fn from_status_mapping() {
        assert!(CollaboratorError::from_status(401, "unauthorized".into()).is_fatal());
        assert!(CollaboratorError::from_status(400, "bad request".into()).is_fatal());
        assert!(CollaboratorError::from_status(429, "rate limited".into()).is_retryable());
        assert!(CollaboratorError::from_status(529, "overloaded".into()).is_retryable());
        assert!(CollaboratorError::from_status(503, "unavailable".into()).is_retryable());
    }

    #[test]
    fn turn_error_degradable() {
        assert!(TurnError::NoJsonFound.is_degradable());
        assert!(TurnError::ModelSignaledError.is_degradable());
        assert!(TurnError::Collaborator(CollaboratorError::EmptyOutput).is_degradable());
        assert!(!TurnError::EmptyHistory.is_degradable());
    }

    #[test]
    fn turn_error_kind_labels() {
        assert_eq!(TurnError::NoJsonFound.error_kind(), "no_json_found");
        assert_eq!(TurnError::EmptyHistory.error_kind(), "empty_history");
        let wrapped: TurnError = CollaboratorError::Overloaded.into();
        assert_eq!(wrapped.error_kind(), "collaborator_unavailable");
    }
}
