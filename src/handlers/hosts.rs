//! Reservable-host resource handlers
//!
//! Same shape as the lease surface, exposed at `/os-hosts`.

use axum::http::StatusCode;
use serde_json::Value;

use crate::{
    dispatch::{ApiResponse, RequestContext, Route},
    error::Result,
    service::{AuthContext, ServiceError},
    state::AppState,
};

const ID_PARAM: &str = "host_id";

/// Routes for the host collection
pub fn routes() -> Vec<Route> {
    vec![
        Route::get("/os-hosts").with_query().handler(index),
        Route::post("/os-hosts")
            .status(StatusCode::CREATED)
            .handler(create),
        Route::get("/os-hosts/{host_id}")
            .guarded(ID_PARAM, host_exists)
            .handler(show),
        Route::put("/os-hosts/{host_id}")
            .guarded(ID_PARAM, host_exists)
            .handler(update),
        Route::delete("/os-hosts/{host_id}")
            .status(StatusCode::NO_CONTENT)
            .guarded(ID_PARAM, host_exists)
            .handler(destroy),
    ]
}

async fn host_exists(state: AppState, id: String) -> Result<bool> {
    let service = state.service().await;
    match service.get_host(&AuthContext::default(), &id).await {
        Ok(_) => Ok(true),
        Err(ServiceError::NotFound { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn index(ctx: RequestContext) -> Result<ApiResponse> {
    let service = ctx.state.service().await;
    let hosts = service.list_hosts(&ctx.auth).await?;
    Ok(ApiResponse::resource("hosts", Value::Array(hosts)))
}

async fn create(mut ctx: RequestContext) -> Result<ApiResponse> {
    let data = std::mem::take(&mut ctx.body).into_json();
    let service = ctx.state.service().await;
    let host = service.create_host(&ctx.auth, data).await?;
    Ok(ApiResponse::resource("host", host))
}

async fn show(ctx: RequestContext) -> Result<ApiResponse> {
    let id = ctx.param(ID_PARAM)?;
    let service = ctx.state.service().await;
    let host = service.get_host(&ctx.auth, id).await?;
    Ok(ApiResponse::resource("host", host))
}

async fn update(mut ctx: RequestContext) -> Result<ApiResponse> {
    let data = std::mem::take(&mut ctx.body).into_json();
    let id = ctx.param(ID_PARAM)?.to_string();
    let service = ctx.state.service().await;
    let host = service.update_host(&ctx.auth, &id, data).await?;
    Ok(ApiResponse::resource("host", host))
}

async fn destroy(ctx: RequestContext) -> Result<ApiResponse> {
    let id = ctx.param(ID_PARAM)?;
    let service = ctx.state.service().await;
    service.delete_host(&ctx.auth, id).await?;
    Ok(ApiResponse::empty())
}
