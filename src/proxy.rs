//! Lazily-constructed, process-wide domain service handle
//!
//! Constructing the domain service can involve downstream connections, so it
//! is deferred until the first request that needs it rather than done at
//! startup purely to register routes. Initialization is guarded by a
//! `tokio::sync::OnceCell`: under concurrent first use, exactly one instance
//! is constructed and published, and every caller observes that instance.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::service::DomainService;

type ServiceFactory = Box<dyn Fn() -> BoxFuture<'static, Arc<dyn DomainService>> + Send + Sync>;

/// Construct-once proxy owning the single domain service instance for the
/// life of the process
pub struct ServiceProxy {
    cell: OnceCell<Arc<dyn DomainService>>,
    factory: ServiceFactory,
}

impl ServiceProxy {
    /// Create a proxy around a factory; the factory runs at most once
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Arc<dyn DomainService>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(move || Box::pin(factory())),
        }
    }

    /// Get the shared instance, constructing it on first use
    pub async fn get(&self) -> Arc<dyn DomainService> {
        self.cell.get_or_init(|| (self.factory)()).await.clone()
    }

    /// Whether the underlying service has been constructed yet
    pub fn initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::memory::InMemoryService;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_proxy(counter: Arc<AtomicUsize>) -> ServiceProxy {
        ServiceProxy::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(InMemoryService::new()) as Arc<dyn DomainService>
            }
        })
    }

    #[tokio::test]
    async fn test_construction_is_deferred_until_first_use() {
        let counter = Arc::new(AtomicUsize::new(0));
        let proxy = counting_proxy(counter.clone());
        assert!(!proxy.initialized());
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        proxy.get().await;
        assert!(proxy.initialized());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_first_use_constructs_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let proxy = Arc::new(counting_proxy(counter.clone()));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let proxy = proxy.clone();
            tasks.push(tokio::spawn(async move {
                proxy.get().await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_callers_observe_the_same_instance() {
        let counter = Arc::new(AtomicUsize::new(0));
        let proxy = counting_proxy(counter);
        let first = proxy.get().await;
        let second = proxy.get().await;
        assert!(Arc::ptr_eq(&first, &second));
    }
}
