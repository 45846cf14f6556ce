use std::fmt;

/// Classified errors for the warehouse core.
///
/// Each variant corresponds to an error class the HTTP boundary maps to a
/// status code; services raise the class, the edge converts it.
#[derive(Debug, Clone, PartialEq)]
pub enum WmsError {
    InvalidInput(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    DatabaseError(String),
    ConfigurationError(String),
    MessagingError(String),
    EventError(String),
    Internal(String),
}

impl fmt::Display for WmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WmsError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            WmsError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            WmsError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            WmsError::NotFound(msg) => write!(f, "Not found: {msg}"),
            WmsError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            WmsError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            WmsError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            WmsError::MessagingError(msg) => write!(f, "Messaging error: {msg}"),
            WmsError::EventError(msg) => write!(f, "Event error: {msg}"),
            WmsError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for WmsError {}

impl From<sqlx::Error> for WmsError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => WmsError::NotFound("row not found".to_string()),
            other => WmsError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WmsError {
    fn from(error: serde_json::Error) -> Self {
        WmsError::InvalidInput(format!("JSON error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, WmsError>;

impl WmsError {
    /// Whether the client can recover by correcting the request.
    pub fn is_client_recoverable(&self) -> bool {
        matches!(self, WmsError::InvalidInput(_) | WmsError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_class_prefix() {
        let err = WmsError::Conflict("version mismatch".to_string());
        assert_eq!(err.to_string(), "Conflict: version mismatch");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: WmsError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, WmsError::NotFound(_)));
    }

    #[test]
    fn recoverable_classes() {
        assert!(WmsError::InvalidInput("x".into()).is_client_recoverable());
        assert!(WmsError::Conflict("x".into()).is_client_recoverable());
        assert!(!WmsError::Internal("x".into()).is_client_recoverable());
    }
}
