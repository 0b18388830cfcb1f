//! Lease resource handlers
//!
//! CRUD surface over the domain service's lease operations. Item routes are
//! guarded by an existence check; the handlers still translate their own
//! not-found results, since a lease may vanish between the guard and the
//! handler's own lookup.

use axum::http::StatusCode;
use serde_json::Value;

use crate::{
    dispatch::{ApiResponse, RequestContext, Route},
    error::Result,
    service::{AuthContext, ServiceError},
    state::AppState,
};

const ID_PARAM: &str = "lease_id";

/// Routes for the lease collection
pub fn routes() -> Vec<Route> {
    vec![
        Route::get("/leases").with_query().handler(index),
        Route::post("/leases")
            .status(StatusCode::CREATED)
            .handler(create),
        Route::get("/leases/{lease_id}")
            .guarded(ID_PARAM, lease_exists)
            .handler(show),
        Route::put("/leases/{lease_id}")
            .guarded(ID_PARAM, lease_exists)
            .handler(update),
        Route::delete("/leases/{lease_id}")
            .status(StatusCode::NO_CONTENT)
            .guarded(ID_PARAM, lease_exists)
            .handler(destroy),
    ]
}

async fn lease_exists(state: AppState, id: String) -> Result<bool> {
    let service = state.service().await;
    match service.get_lease(&AuthContext::default(), &id).await {
        Ok(_) => Ok(true),
        Err(ServiceError::NotFound { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn index(ctx: RequestContext) -> Result<ApiResponse> {
    let service = ctx.state.service().await;
    let leases = service.list_leases(&ctx.auth).await?;
    Ok(ApiResponse::resource("leases", Value::Array(leases)))
}

async fn create(mut ctx: RequestContext) -> Result<ApiResponse> {
    let data = std::mem::take(&mut ctx.body).into_json();
    let service = ctx.state.service().await;
    let lease = service.create_lease(&ctx.auth, data).await?;
    Ok(ApiResponse::resource("lease", lease))
}

async fn show(ctx: RequestContext) -> Result<ApiResponse> {
    let id = ctx.param(ID_PARAM)?;
    let service = ctx.state.service().await;
    let lease = service.get_lease(&ctx.auth, id).await?;
    Ok(ApiResponse::resource("lease", lease))
}

async fn update(mut ctx: RequestContext) -> Result<ApiResponse> {
    let data = std::mem::take(&mut ctx.body).into_json();
    let id = ctx.param(ID_PARAM)?.to_string();
    let service = ctx.state.service().await;
    let lease = service.update_lease(&ctx.auth, &id, data).await?;
    Ok(ApiResponse::resource("lease", lease))
}

async fn destroy(ctx: RequestContext) -> Result<ApiResponse> {
    let id = ctx.param(ID_PARAM)?;
    let service = ctx.state.service().await;
    service.delete_lease(&ctx.auth, id).await?;
    Ok(ApiResponse::empty())
}
