use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Referenced row or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is not signed in, or row-level policy denies the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Write violates a constraint (missing field, wrong type, too large).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Unique key already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend could not be reached or failed internally. Retryable.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Maps a database failure: constraint violations are the caller's fault,
    /// everything else is treated as a backend outage.
    pub fn from_db(err: anyhow::Error) -> Self {
        if let Some(rusqlite::Error::SqliteFailure(e, msg)) = err.downcast_ref::<rusqlite::Error>() {
            if e.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = msg.clone().unwrap_or_else(|| e.to_string());
                if detail.contains("UNIQUE") || detail.contains("PRIMARY KEY") {
                    return Self::Conflict(detail);
                }
                return Self::Rejected(detail);
            }
        }
        Self::Unavailable(err.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}
