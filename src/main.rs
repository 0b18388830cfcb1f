use std::sync::Arc;

use reservation_gateway::{
    config::Config,
    handlers, observability,
    proxy::ServiceProxy,
    server::Server,
    service::{memory::InMemoryService, DomainService},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    observability::init_tracing(&config)?;

    let proxy = ServiceProxy::new(|| async {
        Arc::new(InMemoryService::new()) as Arc<dyn DomainService>
    });
    let state = AppState::new(config.clone(), proxy)?;

    let app = handlers::router(state);
    Server::new(config).serve(app).await?;

    Ok(())
}
