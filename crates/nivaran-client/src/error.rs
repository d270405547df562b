use thiserror::Error;

use nivaran_gateway::GatewayError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Network or backend outage. Reads degrade instead of returning this
    /// where they can.
    #[error("temporarily unavailable: {0}")]
    TransientUnavailable(String),

    /// Rejected before any network call, or by a backend constraint.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientUnavailable(_))
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(m) => Self::NotFound(m),
            GatewayError::Unauthorized(m) => Self::Unauthorized(m),
            GatewayError::Unavailable(m) => Self::TransientUnavailable(m),
            GatewayError::Rejected(m) | GatewayError::Conflict(m) => Self::ValidationFailed(m),
        }
    }
}
