use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

/// Failure of a request to the remote API.
///
/// Cloneable so one failed fetch can be handed to every caller that joined it
/// and recorded on the cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never completed (offline, refused, timed out).
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-2xx status or `success: false`.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },
    /// The response body was not a valid envelope or payload.
    #[error("decode error: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Reads are retried only when the request never reached the server.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(TransportError::network("offline").is_retryable());
        assert!(!TransportError::server(500, "boom").is_retryable());
        assert!(!TransportError::decode("bad json").is_retryable());
    }

    #[test]
    fn server_error_display_carries_status() {
        let err = TransportError::server(404, "habit not found");
        assert_eq!(
            err.to_string(),
            "server error (status 404): habit not found"
        );
    }
}
