//! Error types, fault registry, and HTTP envelope translation
//!
//! Every failure leaving the gateway is rendered as a single stable JSON
//! envelope: `{"error_code": <int>, "error_message": <string>,
//! "error_name": <string|int>}` where `error_code` always equals the HTTP
//! status used on the response.
//!
//! Translation is a total function over a small closed set of failure shapes,
//! evaluated in strict priority order:
//!
//! 1. Typed domain errors keep their own code (default 400) and message.
//! 2. Remote faults matching a known peer namespace (enforcement, manager,
//!    common, cloud) propagate that kind's canonical code and message.
//! 3. Remote faults from the persistence namespace keep their per-kind code
//!    but the message is replaced with a generic one so schema or column
//!    details never reach clients.
//! 4. Everything else becomes a generic 500; the real cause is logged
//!    server-side with a captured backtrace and never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use thiserror::Error;

use crate::version::VersionError;

/// Result type alias using the gateway error
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Generic message used for obfuscated persistence faults
pub const DATABASE_ERROR_MESSAGE: &str = "A database error occurred";

/// Generic message used for unclassified faults
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

// ============================================================================
// Domain and remote failure shapes
// ============================================================================

/// A typed domain validation failure
///
/// Carries its own numeric code (default 400) and a message that is returned
/// to the client verbatim; these codes are part of the API's backward
/// compatibility contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DomainError {
    /// HTTP status code this error maps to
    pub code: u16,
    /// Client-facing message, returned verbatim
    pub message: String,
}

impl DomainError {
    /// Create a domain error with the default 400 code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: 400,
            message: message.into(),
        }
    }

    /// Create a domain error with an explicit code
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// An opaque failure descriptor crossing the domain-service boundary
///
/// Carries a `kind` tag resolved against the [`FAULT_REGISTRY`] and a payload
/// message. Unknown kinds fall through to the generic 500 branch by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {payload}")]
pub struct RemoteFault {
    /// Type-like tag identifying the fault at its origin
    pub kind: String,
    /// Message attached at the origin; only surfaced for non-persistence kinds
    pub payload: String,
}

impl RemoteFault {
    /// Create a remote fault
    pub fn new(kind: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

// ============================================================================
// Fault registry
// ============================================================================

/// Error namespace a remote fault kind belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultNamespace {
    /// Usage-enforcement layer
    Enforcement,
    /// Reservation manager layer
    Manager,
    /// Shared exception layer
    Common,
    /// Infrastructure/cloud client layer
    Cloud,
    /// Persistence layer; messages are obfuscated on translation
    Persistence,
}

/// A registered remote fault kind with its canonical status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEntry {
    /// Kind tag as emitted by the originating subsystem
    pub kind: &'static str,
    /// Canonical HTTP status code for this kind
    pub code: u16,
    /// Namespace the kind belongs to
    pub namespace: FaultNamespace,
}

const fn fault(kind: &'static str, code: u16, namespace: FaultNamespace) -> FaultEntry {
    FaultEntry {
        kind,
        code,
        namespace,
    }
}

/// Known remote fault kinds, consulted in order; first match wins.
///
/// Peer-layer namespaces come before persistence so the obfuscation policy
/// never swallows a typed peer error, and unknown kinds fall through to the
/// generic 500 branch.
pub const FAULT_REGISTRY: &[FaultEntry] = &[
    // Usage-enforcement layer
    fault("MaxLeaseDurationException", 400, FaultNamespace::Enforcement),
    fault("ExternalServiceFilterException", 400, FaultNamespace::Enforcement),
    fault("EnforcementNotSupported", 501, FaultNamespace::Enforcement),
    // Reservation manager layer
    fault("LeaseNotFound", 404, FaultNamespace::Manager),
    fault("HostNotFound", 404, FaultNamespace::Manager),
    fault("MissingParameter", 400, FaultNamespace::Manager),
    fault("MalformedParameter", 400, FaultNamespace::Manager),
    fault("NotEnoughHostsAvailable", 500, FaultNamespace::Manager),
    // Shared exception layer
    fault("NotAuthorized", 403, FaultNamespace::Common),
    fault("PolicyNotAuthorized", 403, FaultNamespace::Common),
    fault("InvalidInput", 400, FaultNamespace::Common),
    fault("InvalidDate", 400, FaultNamespace::Common),
    // Infrastructure/cloud client layer
    fault("HostHavingServersException", 409, FaultNamespace::Cloud),
    fault("AggregateNotFound", 404, FaultNamespace::Cloud),
    // Persistence layer
    fault("DBDuplicateEntry", 409, FaultNamespace::Persistence),
    fault("DBReferenceError", 400, FaultNamespace::Persistence),
    fault("DBNotFound", 404, FaultNamespace::Persistence),
    fault("DBDeadlock", 500, FaultNamespace::Persistence),
    fault("DBError", 500, FaultNamespace::Persistence),
];

/// Resolve a fault kind against the registry
pub fn resolve_fault(kind: &str) -> Option<FaultEntry> {
    FAULT_REGISTRY.iter().find(|entry| entry.kind == kind).copied()
}

// ============================================================================
// Error envelope
// ============================================================================

/// Name component of the envelope: the numeric code for typed domain errors,
/// the kind tag for remote faults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorName {
    /// Numeric code, mirroring `error_code`
    Code(u16),
    /// Remote fault kind tag
    Kind(String),
}

/// Stable JSON error body returned on any 4xx/5xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always equals the HTTP status code of the response
    pub error_code: u16,
    /// Client-facing message
    pub error_message: String,
    /// Name of the failure (code or remote fault kind)
    pub error_name: ErrorName,
}

impl ErrorEnvelope {
    fn coded(code: u16, message: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_message: message.into(),
            error_name: ErrorName::Code(code),
        }
    }

    fn named(code: u16, message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_message: message.into(),
            error_name: ErrorName::Kind(kind.into()),
        }
    }
}

// ============================================================================
// Gateway error
// ============================================================================

/// Main error type for the gateway pipeline
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Version negotiation failure
    #[error("{0}")]
    Version(#[from] VersionError),

    /// Client requested a media type other than JSON
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Request body failed to parse as a JSON object
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Typed domain validation failure
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Fault crossing the domain-service boundary
    #[error("{0}")]
    Remote(#[from] RemoteFault),

    /// Referenced resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Handler supplied extra fields for a non-mapping payload; an internal
    /// contract violation, not a client error
    #[error("encoder misuse: {0}")]
    Encoder(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other unexpected failure
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Translate this failure into its status code and envelope
    ///
    /// Total over every variant; evaluated in the priority order described in
    /// the module docs.
    pub fn translate(&self) -> (StatusCode, ErrorEnvelope) {
        match self {
            Self::Domain(err) => {
                let status =
                    StatusCode::from_u16(err.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, ErrorEnvelope::coded(err.code, err.message.clone()))
            }

            Self::Remote(fault) => match resolve_fault(&fault.kind) {
                Some(entry) if entry.namespace == FaultNamespace::Persistence => {
                    let status = StatusCode::from_u16(entry.code)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    (
                        status,
                        ErrorEnvelope::named(entry.code, DATABASE_ERROR_MESSAGE, &fault.kind),
                    )
                }
                Some(entry) => {
                    let status = StatusCode::from_u16(entry.code)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    (
                        status,
                        ErrorEnvelope::named(entry.code, fault.payload.clone(), &fault.kind),
                    )
                }
                None => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorEnvelope::coded(500, INTERNAL_ERROR_MESSAGE),
                ),
            },

            Self::Version(err) => {
                let status = match err {
                    VersionError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
                    VersionError::OutOfRange { .. } => StatusCode::NOT_ACCEPTABLE,
                };
                (status, ErrorEnvelope::coded(status.as_u16(), err.to_string()))
            }

            Self::UnsupportedMediaType(_) | Self::MalformedBody(_) => (
                StatusCode::BAD_REQUEST,
                ErrorEnvelope::coded(400, self.to_string()),
            ),

            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, ErrorEnvelope::coded(404, message.clone()))
            }

            Self::Encoder(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorEnvelope::coded(500, INTERNAL_ERROR_MESSAGE),
            ),
        }
    }

    /// Whether the real cause must stay server-side only
    fn is_unclassified(&self) -> bool {
        match self {
            Self::Encoder(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => true,
            Self::Remote(fault) => resolve_fault(&fault.kind).is_none(),
            _ => false,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, envelope) = self.translate();

        if self.is_unclassified() {
            let backtrace = Backtrace::force_capture();
            tracing::error!(
                status = status.as_u16(),
                cause = %self,
                %backtrace,
                "request failed with unclassified fault"
            );
        } else {
            tracing::warn!(
                status = status.as_u16(),
                message = %envelope.error_message,
                "request failed"
            );
        }

        (status, Json(envelope)).into_response()
    }
}

impl From<figment::Error> for GatewayError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_keeps_code_and_message() {
        let err = GatewayError::from(DomainError::with_code(409, "lease name already exists"));
        let (status, envelope) = err.translate();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            serde_json::json!({
                "error_code": 409,
                "error_message": "lease name already exists",
                "error_name": 409,
            })
        );
    }

    #[test]
    fn test_domain_error_defaults_to_400() {
        let err = GatewayError::from(DomainError::new("end_date must be after start_date"));
        let (status, envelope) = err.translate();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope.error_code, 400);
        assert_eq!(envelope.error_name, ErrorName::Code(400));
    }

    #[test]
    fn test_known_peer_fault_propagates_code_and_message() {
        let err = GatewayError::from(RemoteFault::new("LeaseNotFound", "lease abc not found"));
        let (status, envelope) = err.translate();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(envelope.error_message, "lease abc not found");
        assert_eq!(envelope.error_name, ErrorName::Kind("LeaseNotFound".into()));
    }

    #[test]
    fn test_persistence_fault_is_obfuscated() {
        let err = GatewayError::from(RemoteFault::new(
            "DBDuplicateEntry",
            "duplicate key value violates unique constraint leases_name_key",
        ));
        let (status, envelope) = err.translate();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(envelope.error_message, DATABASE_ERROR_MESSAGE);
        assert!(!envelope.error_message.contains("leases_name_key"));
        assert_eq!(envelope.error_name, ErrorName::Kind("DBDuplicateEntry".into()));
    }

    #[test]
    fn test_persistence_faults_keep_per_kind_status() {
        let cases = [
            ("DBDuplicateEntry", StatusCode::CONFLICT),
            ("DBReferenceError", StatusCode::BAD_REQUEST),
            ("DBNotFound", StatusCode::NOT_FOUND),
            ("DBDeadlock", StatusCode::INTERNAL_SERVER_ERROR),
            ("DBError", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, expected) in cases {
            let err = GatewayError::from(RemoteFault::new(kind, "detail"));
            let (status, envelope) = err.translate();
            assert_eq!(status, expected, "status for {kind}");
            assert_eq!(envelope.error_message, DATABASE_ERROR_MESSAGE);
        }
    }

    #[test]
    fn test_unrecognized_fault_becomes_generic_500() {
        let err = GatewayError::from(RemoteFault::new("SomethingNovel", "secret detail"));
        let (status, envelope) = err.translate();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.error_message, INTERNAL_ERROR_MESSAGE);
        assert!(!envelope.error_message.contains("secret detail"));
        assert_eq!(envelope.error_name, ErrorName::Code(500));
    }

    #[test]
    fn test_internal_detail_never_reaches_client() {
        let err = GatewayError::Internal("worker panicked at dispatch.rs:42".into());
        let (status, envelope) = err.translate();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.error_message, INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_version_errors_map_to_400_and_406() {
        let err = GatewayError::from(VersionError::InvalidFormat("abc".into()));
        assert_eq!(err.translate().0, StatusCode::BAD_REQUEST);

        let err = GatewayError::from(VersionError::OutOfRange {
            requested: crate::version::ApiVersion::new(9, 9),
            min: crate::version::ApiVersion::new(1, 0),
            max: crate::version::ApiVersion::new(1, 2),
        });
        let (status, envelope) = err.translate();
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        assert!(envelope.error_message.contains("1.0"));
        assert!(envelope.error_message.contains("1.2"));
    }

    #[test]
    fn test_envelope_code_always_matches_status() {
        let errors = [
            GatewayError::from(DomainError::with_code(409, "conflict")),
            GatewayError::from(RemoteFault::new("DBError", "detail")),
            GatewayError::from(RemoteFault::new("Unknown", "detail")),
            GatewayError::UnsupportedMediaType("application/xml".into()),
            GatewayError::NotFound("lease missing-1 could not be found".into()),
            GatewayError::Encoder("extra fields on scalar payload".into()),
        ];
        for err in errors {
            let (status, envelope) = err.translate();
            assert_eq!(status.as_u16(), envelope.error_code);
        }
    }

    #[test]
    fn test_registry_first_match_wins() {
        // Every kind resolves to exactly one entry even if listed once per
        // namespace; ordering puts peer layers ahead of persistence.
        let entry = resolve_fault("LeaseNotFound").unwrap();
        assert_eq!(entry.namespace, FaultNamespace::Manager);
        assert_eq!(entry.code, 404);
        assert!(resolve_fault("NoSuchKind").is_none());
    }

    #[test]
    fn test_error_name_round_trips_untagged() {
        let named: ErrorName = serde_json::from_str("\"DBError\"").unwrap();
        assert_eq!(named, ErrorName::Kind("DBError".into()));
        let coded: ErrorName = serde_json::from_str("404").unwrap();
        assert_eq!(coded, ErrorName::Code(404));
    }
}
