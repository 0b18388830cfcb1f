//! Resource handlers and router assembly

pub mod health;
pub mod hosts;
pub mod leases;

use axum::Router;

use crate::{dispatch::ApiBuilder, state::AppState};

/// Assemble the full gateway router
///
/// Versioned resource routes go through the dispatch pipeline; the health
/// probe is merged outside it.
pub fn router(state: AppState) -> Router {
    let api = ApiBuilder::new()
        .routes(leases::routes())
        .routes(hosts::routes())
        .build(state);

    api.merge(health::routes())
}
