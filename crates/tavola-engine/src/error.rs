//! # Engine Error Type
//!
//! Unified error type for engine operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tavola                                 │
//! │                                                                         │
//! │  Caller (POS, QR page, kitchen display)                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  OrderManager / TableManager                                     │  │
//! │  │  Result<T, EngineError>                                          │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Capability missing? ─── PermissionDenied ─────────┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Rule violated? ──────── CoreError ──────────── EngineError ───►│  │
//! │  │         │                                          ▲            │  │
//! │  │         ▼                                          │            │  │
//! │  │  Database failed? ────── DbError ─────────────────┘            │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  err.kind()   → ErrorKind (retry / refetch / show limits)              │
//! │  err.report() → { "code": "ORDER_ALREADY_SERVED", "message": "..." }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tavola_core::{Capability, CoreError, ErrorKind};
use tavola_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule blocked the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failed, or a versioned write lost a race.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Entity missing, or owned by another tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor's role lacks the capability.
    ///
    /// ## When This Occurs
    /// - A waiter recording a payment
    /// - A cashier forcing an unsettled session closed
    /// - A guest modifying an order
    #[error("{actor} is not allowed to {capability:?}")]
    PermissionDenied {
        actor: String,
        capability: Capability,
    },

    /// Configuration is invalid or could not be read.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A snapshot could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Classifies this error.
    ///
    /// A lost version race is a state conflict: the caller refetches.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(err) => err.kind(),
            EngineError::Db(err) => match err {
                DbError::NotFound { .. } => ErrorKind::NotFound,
                DbError::VersionConflict { .. }
                | DbError::GuardFailed { .. }
                | DbError::UniqueViolation { .. } => ErrorKind::StateConflict,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => {
                    ErrorKind::Integrity
                }
                DbError::ConnectionFailed(_)
                | DbError::MigrationFailed(_)
                | DbError::QueryFailed(_)
                | DbError::PoolExhausted
                | DbError::Internal(_) => ErrorKind::Internal,
            },
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            EngineError::Config(_) | EngineError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Core(err) => err.code(),
            EngineError::Db(err) => match err {
                DbError::NotFound { .. } => "NOT_FOUND",
                DbError::VersionConflict { .. } => "CONCURRENT_MODIFICATION",
                DbError::GuardFailed { .. } => "GUARD_FAILED",
                DbError::UniqueViolation { .. } => "DUPLICATE",
                DbError::ForeignKeyViolation { .. } => "INVALID_REFERENCE",
                DbError::CheckViolation { .. } => "CONSTRAINT_VIOLATED",
                _ => "DATABASE_ERROR",
            },
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::PermissionDenied { .. } => "PERMISSION_DENIED",
            EngineError::Config(_) => "CONFIG_ERROR",
            EngineError::Serialization(_) => "INTERNAL",
        }
    }

    /// Serializable form for display surfaces.
    ///
    /// Internal failures are logged here and reported with a generic
    /// message.
    pub fn report(&self) -> ErrorReport {
        let message = match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = %self, "Internal engine error");
                "Operation failed, please retry".to_string()
            }
            _ => self.to_string(),
        };

        ErrorReport {
            code: self.code(),
            kind: self.kind(),
            message,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Error as returned to callers.
///
/// ```json
/// {
///   "code": "SESSION_NOT_SETTLED",
///   "kind": "state_conflict",
///   "message": "Session 7f3c… is not settled: total 300, paid 150"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_is_state_conflict() {
        let err = EngineError::from(DbError::version_conflict("Order", "o1"));
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(err.code(), "CONCURRENT_MODIFICATION");
    }

    #[test]
    fn test_core_codes_pass_through() {
        let err = EngineError::from(CoreError::OrderAlreadyServed {
            order_id: "o1".to_string(),
        });
        let report = err.report();
        assert_eq!(report.code, "ORDER_ALREADY_SERVED");
        assert_eq!(report.kind, ErrorKind::StateConflict);
        assert!(report.message.contains("o1"));
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = EngineError::from(DbError::QueryFailed("disk I/O error".to_string()));
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::Internal);
        assert!(!report.message.contains("disk"));
    }

    #[test]
    fn test_report_serializes() {
        let report = EngineError::not_found("Order", "o9").report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["kind"], "not_found");
    }
}
