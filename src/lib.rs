//! # Reservation Gateway
//!
//! HTTP gateway for a resource-reservation service: a versioned REST surface
//! over a pluggable domain service. The gateway owns the protocol concerns
//! and keeps the domain service free of HTTP:
//!
//! - **Microversioning**: clients negotiate an API version per request via the
//!   `OpenStack-API-Version` header; responses echo the granted version.
//! - **Codec**: JSON request/response bodies, with a `.json` path alias and
//!   permissive `Accept` handling.
//! - **Error translation**: every failure, local or propagated from a peer
//!   service, renders as a stable `{error_code, error_message, error_name}`
//!   envelope.
//! - **Dispatch pipeline**: negotiate, decode, guard, invoke, encode, in a
//!   fixed order for every registered route.
//! - **Lazy service proxy**: the backing domain service is constructed once,
//!   on first use, and shared by all workers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reservation_gateway::{
//!     config::Config,
//!     handlers,
//!     proxy::ServiceProxy,
//!     server::Server,
//!     service::{memory::InMemoryService, DomainService},
//!     state::AppState,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     reservation_gateway::observability::init_tracing(&config)?;
//!     let proxy = ServiceProxy::new(|| async {
//!         Arc::new(InMemoryService::new()) as Arc<dyn DomainService>
//!     });
//!     let state = AppState::new(config.clone(), proxy)?;
//!     let app = handlers::router(state);
//!     Server::new(config).serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod observability;
pub mod proxy;
pub mod server;
pub mod service;
pub mod state;
pub mod version;

/// Commonly used types, re-exported for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dispatch::{ApiBuilder, ApiResponse, RequestContext, Route};
    pub use crate::error::{GatewayError, Result};
    pub use crate::proxy::ServiceProxy;
    pub use crate::server::Server;
    pub use crate::service::{AuthContext, DomainService, ServiceError};
    pub use crate::state::AppState;
    pub use crate::version::{ApiVersion, VersionRange};
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::proxy::ServiceProxy;
    use crate::service::{memory::InMemoryService, DomainService};
    use crate::state::AppState;

    /// Default state over a fresh in-memory service
    pub fn test_state() -> AppState {
        let proxy = ServiceProxy::new(|| async {
            Arc::new(InMemoryService::new()) as Arc<dyn DomainService>
        });
        AppState::new(Config::default(), proxy).unwrap()
    }
}
