//! Error types shared across the Tally crates.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty address")] Empty,
    #[error("unsupported address format: {0}")] UnsupportedFormat(String),
    #[error("unsupported script: {0}")] UnsupportedScript(String),
    #[error("invalid script hex: {0}")] InvalidScriptHex(String),
}

/// Failure talking to a chain data backend.
///
/// `Clone` so that every waiter on a coalesced request observes the same
/// failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("transport: {0}")] Transport(String),
    #[error("http status {status}: {body}")] Status { status: u16, body: String },
    #[error("decode: {0}")] Decode(String),
    #[error("timeout")] Timeout,
    #[error("malformed response: {0}")] Malformed(String),
}

impl NetworkError {
    /// Whether a caller may reasonably retry the request. Retries are always
    /// the caller's decision; nothing in the engine retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Malformed(_) => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credentials unavailable: {0}")] Unavailable(String),
    #[error("credentials locked")] Locked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_address_errors() {
        assert_eq!(AddressError::Empty.to_string(), "empty address");
        assert_eq!(
            AddressError::UnsupportedFormat("xyz".into()).to_string(),
            "unsupported address format: xyz"
        );
    }

    #[test]
    fn display_network_status() {
        let e = NetworkError::Status { status: 503, body: "busy".into() };
        assert_eq!(e.to_string(), "http status 503: busy");
    }

    #[test]
    fn retryable_classification() {
        assert!(NetworkError::Timeout.is_retryable());
        assert!(NetworkError::Transport("reset".into()).is_retryable());
        assert!(NetworkError::Status { status: 502, body: String::new() }.is_retryable());
        assert!(NetworkError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!NetworkError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!NetworkError::Decode("eof".into()).is_retryable());
        assert!(!NetworkError::Malformed("hash".into()).is_retryable());
    }

    #[test]
    fn clone_and_eq() {
        let e1 = NetworkError::Transport("refused".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
