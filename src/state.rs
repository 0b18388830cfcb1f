//! Shared application state
//!
//! Cloneable handle (cheap `Arc` clone) carrying the configuration, the
//! parsed version bounds, and the construct-once service proxy. Handlers
//! receive it through the request context rather than ambient globals.

use std::sync::Arc;

use crate::{
    config::Config,
    error::Result,
    proxy::ServiceProxy,
    service::DomainService,
    version::VersionRange,
};

/// Application state shared by all workers
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    config: Config,
    versions: VersionRange,
    proxy: ServiceProxy,
}

impl AppState {
    /// Build state from configuration and a service proxy
    ///
    /// Fails if the configured version bounds do not parse; that is a startup
    /// error, never a per-request one.
    pub fn new(config: Config, proxy: ServiceProxy) -> Result<Self> {
        let versions = config.api.version_range()?;
        Ok(Self {
            inner: Arc::new(StateInner {
                config,
                versions,
                proxy,
            }),
        })
    }

    /// The loaded configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Supported microversion bounds
    pub fn version_range(&self) -> VersionRange {
        self.inner.versions
    }

    /// The domain service, constructed on first use
    pub async fn service(&self) -> Arc<dyn DomainService> {
        self.inner.proxy.get().await
    }
}
