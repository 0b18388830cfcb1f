//! Domain service boundary
//!
//! The reservation business logic (lease scheduling, host allocation) lives
//! outside this gateway and is consumed as a black box through the
//! [`DomainService`] trait: five operations per resource, each raising typed
//! failures that the error translator knows how to render. The acting
//! identity is forwarded on every call through an [`AuthContext`] derived
//! from request headers.

pub mod memory;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{DomainError, GatewayError, RemoteFault};

/// Result type for domain-service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Failure raised at the domain-service boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The referenced resource does not exist
    #[error("{resource} {id} could not be found")]
    NotFound {
        /// Resource noun (`lease`, `host`)
        resource: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// Typed validation failure with its own code and message
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Opaque fault from a peer subsystem or the persistence layer
    #[error(transparent)]
    Remote(#[from] RemoteFault),
}

impl From<ServiceError> for GatewayError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { resource, id } => {
                GatewayError::NotFound(format!("{resource} {id} could not be found"))
            }
            ServiceError::Domain(err) => GatewayError::Domain(err),
            ServiceError::Remote(fault) => GatewayError::Remote(fault),
        }
    }
}

/// Acting identity forwarded to every domain-service call
///
/// Derived from headers populated by the auth middleware upstream of this
/// gateway; token validation itself is out of scope here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    /// Acting user id
    pub user_id: Option<String>,
    /// Project the request is scoped to
    pub project_id: Option<String>,
    /// Roles granted to the acting identity
    pub roles: Vec<String>,
}

impl AuthContext {
    /// Build the context from request headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        let roles = headers
            .get("x-roles")
            .and_then(|v| v.to_str().ok())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            user_id: get("x-user-id"),
            project_id: get("x-project-id"),
            roles,
        }
    }
}

/// The external reservation service, consumed as a black box
///
/// Resource representations cross this boundary as JSON values; the gateway
/// never interprets them beyond wrapping them in the success envelope.
#[async_trait]
pub trait DomainService: Send + Sync {
    /// List all leases visible to the caller
    async fn list_leases(&self, ctx: &AuthContext) -> ServiceResult<Vec<Value>>;

    /// Get a single lease by id
    async fn get_lease(&self, ctx: &AuthContext, id: &str) -> ServiceResult<Value>;

    /// Create a lease from the decoded request body
    async fn create_lease(&self, ctx: &AuthContext, data: Map<String, Value>)
        -> ServiceResult<Value>;

    /// Update an existing lease
    async fn update_lease(
        &self,
        ctx: &AuthContext,
        id: &str,
        data: Map<String, Value>,
    ) -> ServiceResult<Value>;

    /// Delete a lease
    async fn delete_lease(&self, ctx: &AuthContext, id: &str) -> ServiceResult<()>;

    /// List all reservable hosts
    async fn list_hosts(&self, ctx: &AuthContext) -> ServiceResult<Vec<Value>>;

    /// Get a single host by id
    async fn get_host(&self, ctx: &AuthContext, id: &str) -> ServiceResult<Value>;

    /// Enroll a host
    async fn create_host(&self, ctx: &AuthContext, data: Map<String, Value>)
        -> ServiceResult<Value>;

    /// Update an enrolled host
    async fn update_host(
        &self,
        ctx: &AuthContext,
        id: &str,
        data: Map<String, Value>,
    ) -> ServiceResult<Value>;

    /// Remove a host from the reservable pool
    async fn delete_host(&self, ctx: &AuthContext, id: &str) -> ServiceResult<()>;
}
