use std::time::Duration;

use thiserror::Error;

use crate::infrastructure::bluetooth::protocol::TelemetryField;

/// Failures raised while acquiring telemetry.
///
/// None of these ever reach a caller of `DeviceSession::refresh`; they are
/// logged at the session boundary and the cached snapshot is returned instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("read of {field} characteristic failed: {message}")]
    Read {
        field: TelemetryField,
        message: String,
    },

    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("malformed {field} payload: expected at least {expected} bytes, got {actual}")]
    MalformedPayload {
        field: TelemetryField,
        expected: usize,
        actual: usize,
    },

    #[error("not connected")]
    NotConnected,
}

impl TelemetryError {
    pub fn read(field: TelemetryField, err: impl std::fmt::Display) -> Self {
        Self::Read {
            field,
            message: err.to_string(),
        }
    }

    /// Whether the link should be considered unusable after this error.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout { .. } | Self::NotConnected
        )
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_error_display() {
        let err = TelemetryError::MalformedPayload {
            field: TelemetryField::Sector,
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "malformed sector payload: expected at least 2 bytes, got 1"
        );

        let err = TelemetryError::read(TelemetryField::Battery, "gatt error");
        assert_eq!(
            err.to_string(),
            "read of battery characteristic failed: gatt error"
        );

        let err = TelemetryError::Timeout {
            operation: "characteristic reads".to_string(),
            duration: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "characteristic reads timed out after 5s");
    }

    #[test]
    fn test_link_failure_classification() {
        assert!(TelemetryError::Connection("refused".into()).is_link_failure());
        assert!(TelemetryError::NotConnected.is_link_failure());
        assert!(!TelemetryError::read(TelemetryField::Time, "x").is_link_failure());
    }
}
