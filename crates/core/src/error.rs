//! Error types for the call orchestrator

/// Result type alias using the call orchestrator Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a call
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local media capture was denied
    #[error("Media capture denied: {0}")]
    Permission(String),

    /// Offer/answer handshake failure
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// A connectivity candidate could not be applied
    #[error("Candidate apply error: {0}")]
    CandidateApply(String),

    /// Outbound send attempted while the signaling pipe is not open
    #[error("Signaling channel unavailable")]
    ChannelUnavailable,

    /// A second call attempt while one is already in flight
    #[error("A call is already in progress")]
    CallInProgress,

    /// Wire message could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Media transport session error
    #[error("Transport error: {0}")]
    Transport(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error collapses the call to `Ended`
    ///
    /// Candidate-apply failures and dropped outbound messages are
    /// best-effort and never terminate a call.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::CandidateApply(_) | Error::ChannelUnavailable | Error::CallInProgress
        )
    }

    /// Check if this error means local capture was denied
    pub fn is_permission(&self) -> bool {
        matches!(self, Error::Permission(_))
    }

    /// Check if this error is a negotiation failure
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Error::Negotiation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("test".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: test");

        let err = Error::ChannelUnavailable;
        assert_eq!(err.to_string(), "Signaling channel unavailable");
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::Negotiation("test".to_string()).is_fatal());
        assert!(Error::Permission("denied".to_string()).is_fatal());
        assert!(!Error::CandidateApply("test".to_string()).is_fatal());
        assert!(!Error::ChannelUnavailable.is_fatal());
    }

    #[test]
    fn test_error_is_permission() {
        assert!(Error::Permission("denied".to_string()).is_permission());
        assert!(!Error::Negotiation("test".to_string()).is_permission());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}
