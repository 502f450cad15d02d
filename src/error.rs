//! Error types for the Infrastructure operator
//!
//! Errors carry enough structure for the reconciler to decide retry behavior
//! and to classify actuator failures into stable error codes surfaced in the
//! Infrastructure status.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors that can occur during operator operations
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Cluster context could not be resolved for a namespace
    #[error("cluster context for namespace {namespace} unavailable: {message}")]
    ClusterContext {
        /// Namespace whose Cluster object was looked up
        namespace: String,
        /// Description of what failed
        message: String,
    },

    /// Actuator operation failed
    #[error("actuator {operation} failed: {message}")]
    Actuator {
        /// Operation that was running (Reconcile, Delete, Migrate, Restore)
        operation: String,
        /// Description of what failed
        message: String,
        /// Whether retrying the operation may succeed
        retryable: bool,
    },

    /// Optimistic write gave up after exhausting its conflict budget
    #[error("update of {object} still conflicting after {attempts} attempts")]
    ConflictBudgetExhausted {
        /// Object the write targeted
        object: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// Serialization error
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying serde error
        #[from]
        source: serde_json::Error,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Context where the error occurred (e.g. "finalizer", "dispatcher")
        context: String,
        /// Description of what failed
        message: String,
    },
}

impl OperatorError {
    /// Create an actuator error that is worth retrying
    pub fn actuator(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Actuator {
            operation: operation.into(),
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create an actuator error that will not succeed on retry
    pub fn actuator_permanent(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Actuator {
            operation: operation.into(),
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Whether this is an optimistic-concurrency conflict (HTTP 409)
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            OperatorError::Kube {
                source: kube::Error::Api(ae)
            } if ae.code == 409
        )
    }

    /// Whether this is a not-found response (HTTP 404)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OperatorError::Kube {
                source: kube::Error::Api(ae)
            } if ae.code == 404
        )
    }

    /// Whether retrying the failed pass may succeed
    ///
    /// 4xx Kubernetes responses and permanent actuator failures require a spec
    /// or environment fix; everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            OperatorError::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409
            ),
            OperatorError::ClusterContext { .. } => true,
            OperatorError::Actuator { retryable, .. } => *retryable,
            OperatorError::ConflictBudgetExhausted { .. } => true,
            OperatorError::Serialization { .. } => false,
            OperatorError::Internal { .. } => true,
        }
    }
}

/// Stable machine-readable codes describing why an operation failed.
///
/// Written into the Infrastructure status so that callers can react to
/// failure classes without parsing human-readable messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ErrorCode {
    /// Credentials rejected by the provider
    #[serde(rename = "ERR_INFRA_UNAUTHORIZED")]
    Unauthorized,
    /// Credentials accepted but lacking required permissions
    #[serde(rename = "ERR_INFRA_INSUFFICIENT_PRIVILEGES")]
    InsufficientPrivileges,
    /// Provider quota or limit exceeded
    #[serde(rename = "ERR_INFRA_QUOTA_EXCEEDED")]
    QuotaExceeded,
    /// A dependency of the operation is not ready
    #[serde(rename = "ERR_INFRA_DEPENDENCIES")]
    Dependencies,
}

impl ErrorCode {
    /// Classify a failure cause into zero or more stable codes.
    ///
    /// Matching is substring-based on the lowercased cause, mirroring the
    /// provider error strings seen in the wild.
    pub fn classify(cause: &str) -> Vec<ErrorCode> {
        let cause = cause.to_lowercase();
        let mut codes = Vec::new();

        if cause.contains("unauthorized") || cause.contains("authfailure") {
            codes.push(ErrorCode::Unauthorized);
        }
        if cause.contains("insufficientprivileges")
            || cause.contains("accessdenied")
            || cause.contains("forbidden")
        {
            codes.push(ErrorCode::InsufficientPrivileges);
        }
        if cause.contains("quota") || cause.contains("limitexceeded") {
            codes.push(ErrorCode::QuotaExceeded);
        }
        if cause.contains("pendingverification") || cause.contains("dependen") {
            codes.push(ErrorCode::Dependencies);
        }

        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> OperatorError {
        OperatorError::Kube {
            source: kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "test".to_string(),
                reason: "test".to_string(),
                code,
            }),
        }
    }

    #[test]
    fn test_conflict_detection() {
        assert!(api_error(409).is_conflict());
        assert!(!api_error(404).is_conflict());
        assert!(!OperatorError::actuator("Reconcile", "boom").is_conflict());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(409).is_not_found());
    }

    #[test]
    fn test_retryability() {
        // Transient actuator failures retry, permanent ones do not
        assert!(OperatorError::actuator("Reconcile", "timeout").is_retryable());
        assert!(!OperatorError::actuator_permanent("Reconcile", "bad region").is_retryable());

        // Conflicts are retryable, other 4xx are not
        assert!(api_error(409).is_retryable());
        assert!(!api_error(404).is_retryable());
        assert!(api_error(500).is_retryable());

        assert!(OperatorError::internal("dispatcher", "oops").is_retryable());
    }

    #[test]
    fn test_error_code_classification() {
        assert_eq!(
            ErrorCode::classify("RequestLimitExceeded: quota reached"),
            vec![ErrorCode::QuotaExceeded]
        );
        assert_eq!(
            ErrorCode::classify("UnauthorizedOperation"),
            vec![ErrorCode::Unauthorized]
        );
        assert_eq!(
            ErrorCode::classify("AccessDenied: missing iam permission"),
            vec![ErrorCode::InsufficientPrivileges]
        );
        assert_eq!(
            ErrorCode::classify("PendingVerification of the account"),
            vec![ErrorCode::Dependencies]
        );
        assert!(ErrorCode::classify("connection reset by peer").is_empty());
    }

    #[test]
    fn test_error_code_classification_multiple() {
        let codes = ErrorCode::classify("AuthFailure while checking quota");
        assert!(codes.contains(&ErrorCode::Unauthorized));
        assert!(codes.contains(&ErrorCode::QuotaExceeded));
    }

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::QuotaExceeded).unwrap();
        assert_eq!(json, "\"ERR_INFRA_QUOTA_EXCEEDED\"");
    }

    #[test]
    fn test_error_display() {
        let err = OperatorError::actuator("Migrate", "state export failed");
        assert!(err.to_string().contains("actuator Migrate failed"));

        let err = OperatorError::ConflictBudgetExhausted {
            object: "default/test".to_string(),
            attempts: 5,
        };
        assert!(err.to_string().contains("after 5 attempts"));
    }
}
