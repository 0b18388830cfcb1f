//! Pre-dispatch existence checks
//!
//! A guarded route looks the referenced resource up before its handler runs;
//! a missing resource short-circuits with a 404 and the handler is never
//! invoked. The guard is a fast-path check only: no lock is held between the
//! check and the handler's own access, so handlers must still return their own
//! not-found result if the resource vanishes in between.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::{error::GatewayError, state::AppState};

/// Lookup function consulted by the guard: does the resource with this id exist?
pub type LookupFn = Arc<dyn Fn(AppState, String) -> BoxFuture<'static, Result<bool, GatewayError>> + Send + Sync>;

/// Existence guard attached to a route at registration time
#[derive(Clone)]
pub struct ExistenceGuard {
    lookup: LookupFn,
    param: &'static str,
}

impl ExistenceGuard {
    /// Create a guard keyed on the named path parameter
    pub fn new<F, Fut>(param: &'static str, lookup: F) -> Self
    where
        F: Fn(AppState, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, GatewayError>> + Send + 'static,
    {
        Self {
            lookup: Arc::new(move |state, id| Box::pin(lookup(state, id))),
            param,
        }
    }

    /// Name of the path parameter carrying the resource id
    pub fn param(&self) -> &'static str {
        self.param
    }

    /// Run the lookup; anything other than a positive result is a 404
    ///
    /// A lookup failing for a reason other than "not found" is treated
    /// conservatively as not-found rather than propagated, keeping the 404
    /// contract uniform.
    pub async fn check(&self, state: AppState, id: &str) -> Result<(), GatewayError> {
        match (self.lookup)(state, id.to_string()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(GatewayError::NotFound(format!(
                "resource {id} could not be found"
            ))),
            Err(err) => {
                tracing::debug!(id, cause = %err, "existence lookup failed; treating as not found");
                Err(GatewayError::NotFound(format!(
                    "resource {id} could not be found"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteFault;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_guard_passes_existing_resource() {
        let guard = ExistenceGuard::new("lease_id", |_state, id| async move {
            Ok::<bool, GatewayError>(id == "present")
        });
        assert!(guard.check(test_state(), "present").await.is_ok());
    }

    #[tokio::test]
    async fn test_guard_missing_resource_is_404() {
        let guard = ExistenceGuard::new("lease_id", |_state, _id| async move {
            Ok::<bool, GatewayError>(false)
        });
        let err = guard.check(test_state(), "missing-1").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_guard_lookup_failure_collapses_to_404() {
        let guard = ExistenceGuard::new("lease_id", |_state, _id| async move {
            Err::<bool, GatewayError>(RemoteFault::new("DBDeadlock", "deadlock detected").into())
        });
        let err = guard.check(test_state(), "any").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
