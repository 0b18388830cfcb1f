//! API microversion negotiation
//!
//! Clients request a microversion through the `OpenStack-API-Version` header
//! using a service-scoped value such as `reservation 1.0` (a bare `1.0` is
//! also accepted). The negotiator validates the requested version against the
//! configured `[min, max]` range and attaches the accepted version to the
//! request for the rest of the pipeline.
//!
//! Every response that had a parseable candidate version carries two headers:
//! a `Vary` entry naming the version header (so caches key on it correctly)
//! and an echo of the form `reservation <major>.<minor>`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

use crate::{error::GatewayError, state::AppState};

/// Service type token used in the scoped header value and the echo header
pub const SERVICE_TYPE: &str = "reservation";

/// Request/response header carrying the microversion (lowercase for axum)
pub const API_VERSION_HEADER: &str = "openstack-api-version";

/// Reserved token resolving to the maximum supported version
pub const LATEST: &str = "latest";

/// A negotiated API microversion
///
/// Ordered lexicographically by `(major, minor)`, which is exactly the
/// ordering the supported-range check relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    /// Major version component
    pub major: u16,
    /// Minor version component
    pub minor: u16,
}

impl ApiVersion {
    /// Create a version from its components
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Parse a `"<major>.<minor>"` token
    ///
    /// Any other shape (`"1"`, `"1.2.3"`, `"abc"`) fails with
    /// [`VersionError::InvalidFormat`].
    pub fn parse(token: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat(token.to_string());

        let mut parts = token.split('.');
        let (Some(major), Some(minor), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        // bare digits only; u16's parser would also admit a leading `+`
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(major) || !digits(minor) {
            return Err(invalid());
        }

        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Inclusive range of supported microversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    /// Minimum supported version (used when the header is absent)
    pub min: ApiVersion,
    /// Maximum supported version (used for the `latest` token)
    pub max: ApiVersion,
}

impl VersionRange {
    /// Create a new range
    pub const fn new(min: ApiVersion, max: ApiVersion) -> Self {
        Self { min, max }
    }

    /// Check whether a version falls inside the range
    pub fn contains(&self, version: ApiVersion) -> bool {
        self.min <= version && version <= self.max
    }
}

/// Negotiation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The version token did not parse as `"<major>.<minor>"`
    #[error("API version string {0:?} is of invalid format; it must be of format MajorNum.MinorNum")]
    InvalidFormat(String),

    /// The version parsed but falls outside the supported range
    #[error("version {requested} is not supported; the supported version range is [{min}, {max}]")]
    OutOfRange {
        /// The version the client asked for
        requested: ApiVersion,
        /// Minimum supported version
        min: ApiVersion,
        /// Maximum supported version
        max: ApiVersion,
    },
}

impl VersionError {
    /// The parsed candidate version, when one exists
    ///
    /// Out-of-range failures still have a well-formed candidate, so their
    /// responses carry the version headers; format failures do not.
    pub fn candidate(&self) -> Option<ApiVersion> {
        match self {
            Self::InvalidFormat(_) => None,
            Self::OutOfRange { requested, .. } => Some(*requested),
        }
    }
}

/// Negotiate the effective microversion for a request
///
/// An absent header resolves to `range.min`; the reserved `latest` token
/// resolves to `range.max`; anything else must parse as `"<major>.<minor>"`
/// and fall inside the range.
pub fn negotiate(headers: &HeaderMap, range: VersionRange) -> Result<ApiVersion, VersionError> {
    let Some(raw) = headers.get(API_VERSION_HEADER).and_then(|v| v.to_str().ok()) else {
        return Ok(range.min);
    };

    let token = raw.trim();
    // the service token only counts as a scope when whitespace follows it,
    // so `reservation1.1` stays a (malformed) bare token
    let token = match token.strip_prefix(SERVICE_TYPE) {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => token,
    };

    if token.eq_ignore_ascii_case(LATEST) {
        return Ok(range.max);
    }

    let version = ApiVersion::parse(token)?;
    if !range.contains(version) {
        return Err(VersionError::OutOfRange {
            requested: version,
            min: range.min,
            max: range.max,
        });
    }

    Ok(version)
}

/// Stamp the vary-by-version and echo headers onto a response
pub fn apply_version_headers(headers: &mut HeaderMap, version: ApiVersion) {
    headers.append(header::VARY, HeaderValue::from_static("OpenStack-API-Version"));
    if let Ok(value) = HeaderValue::from_str(&format!("{SERVICE_TYPE} {version}")) {
        headers.insert(HeaderName::from_static(API_VERSION_HEADER), value);
    }
}

/// Version negotiation middleware
///
/// Runs before dispatch: attaches the negotiated [`ApiVersion`] as a request
/// extension and stamps the version headers onto the response. Negotiation
/// failures short-circuit with the translated error envelope; out-of-range
/// failures still echo the candidate version.
pub async fn negotiate_version(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match negotiate(req.headers(), state.version_range()) {
        Ok(version) => {
            req.extensions_mut().insert(version);
            let mut response = next.run(req).await;
            apply_version_headers(response.headers_mut(), version);
            response
        }
        Err(err) => {
            let candidate = err.candidate();
            let mut response = GatewayError::from(err).into_response();
            if let Some(version) = candidate {
                apply_version_headers(response.headers_mut(), version);
            }
            response
        }
    }
}
