//! Route registration and the per-request dispatch pipeline
//!
//! A [`Route`] binds an HTTP method and path pattern to a plain handler
//! function value, together with its success status code, query-parameter
//! opt-in, body mode, and optional existence guard. The [`ApiBuilder`]
//! composes the fixed pipeline around every registered handler:
//!
//! ```text
//! negotiate version -> resolve media type -> decode body -> existence guard
//!     -> invoke handler -> encode response
//! ```
//!
//! with every stage able to fail directly into the error translator. The
//! route table is built once at startup and is read-only thereafter; each
//! request runs the pipeline strictly sequentially.

use axum::{
    extract::{RawPathParams, Request, State},
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{on, MethodFilter},
    Router,
};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::{
    codec::{self, JsonSuffix},
    error::GatewayError,
    guard::ExistenceGuard,
    service::AuthContext,
    state::AppState,
    version::{self, ApiVersion},
};

/// How a route's request body is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Decode the body as a JSON object (the default for mutating routes)
    #[default]
    Json,
    /// Pass raw bytes through without JSON parsing (file-upload style routes)
    Raw,
}

/// Decoded request body handed to the handler
///
/// Parsed exactly once during dispatch; handlers read the cached result.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// Non-mutating request; no body was read
    #[default]
    None,
    /// Body decoded as a JSON object (empty body decodes to an empty object)
    Json(serde_json::Map<String, Value>),
    /// Raw bytes for routes registered with [`BodyMode::Raw`]
    Raw(axum::body::Bytes),
}

impl RequestBody {
    /// Consume the body as a JSON object; non-JSON bodies yield an empty map
    pub fn into_json(self) -> serde_json::Map<String, Value> {
        match self {
            Self::Json(map) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Raw bytes, when the route opted into raw mode
    pub fn raw(&self) -> Option<&axum::body::Bytes> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Everything a handler sees for one request
pub struct RequestContext {
    /// Shared application state (config + service proxy)
    pub state: AppState,
    /// Microversion negotiated for this request
    pub version: ApiVersion,
    /// Acting identity forwarded to the domain service
    pub auth: AuthContext,
    /// Path parameters captured by the route pattern
    pub params: HashMap<String, String>,
    /// Parsed query parameters; `None` unless the route opted in
    pub query: Option<HashMap<String, String>>,
    /// Request body, decoded once
    pub body: RequestBody,
}

impl RequestContext {
    /// Required path parameter; absence is a registration bug, not client error
    pub fn param(&self, name: &str) -> Result<&str, GatewayError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| GatewayError::Internal(format!("missing path parameter {name}")))
    }
}

/// Handler result: an optional payload plus encoding directives
#[derive(Debug, Default)]
pub struct ApiResponse {
    /// Response payload; `None` produces an empty body
    pub body: Option<Value>,
    /// Extra named fields shallow-merged into a mapping payload
    pub extra: Vec<(String, Value)>,
    /// Explicit status override; falls back to the route's registered status
    pub status: Option<StatusCode>,
}

impl ApiResponse {
    /// Wrap a resource representation under its top-level key
    pub fn resource(name: &str, value: Value) -> Self {
        Self {
            body: Some(json!({ name: value })),
            ..Self::default()
        }
    }

    /// Empty response body (used by deletes)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Override the status code established at route registration
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Merge an extra named field into the payload at encode time
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.push((name.into(), value));
        self
    }
}

type Handler =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<ApiResponse, GatewayError>> + Send + Sync>;

/// A registered route: method + path + handler + pipeline options
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: &'static str,
    status: StatusCode,
    supports_query: bool,
    body_mode: BodyMode,
    guard: Option<ExistenceGuard>,
    handler: Handler,
}

impl Route {
    /// Start building a GET route
    pub fn get(path: &'static str) -> RouteBuilder {
        RouteBuilder::new(Method::GET, path)
    }

    /// Start building a POST route
    pub fn post(path: &'static str) -> RouteBuilder {
        RouteBuilder::new(Method::POST, path)
    }

    /// Start building a PUT route
    pub fn put(path: &'static str) -> RouteBuilder {
        RouteBuilder::new(Method::PUT, path)
    }

    /// Start building a DELETE route
    pub fn delete(path: &'static str) -> RouteBuilder {
        RouteBuilder::new(Method::DELETE, path)
    }

    fn method_filter(&self) -> MethodFilter {
        match self.method {
            Method::POST => MethodFilter::POST,
            Method::PUT => MethodFilter::PUT,
            Method::DELETE => MethodFilter::DELETE,
            Method::PATCH => MethodFilter::PATCH,
            _ => MethodFilter::GET,
        }
    }

    fn is_mutating(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// Builder attaching pipeline options to a handler function value
pub struct RouteBuilder {
    method: Method,
    path: &'static str,
    status: StatusCode,
    supports_query: bool,
    body_mode: BodyMode,
    guard: Option<ExistenceGuard>,
}

impl RouteBuilder {
    fn new(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            status: StatusCode::OK,
            supports_query: false,
            body_mode: BodyMode::Json,
            guard: None,
        }
    }

    /// Success status code for this route (default 200)
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Opt in to structured query-parameter passthrough
    ///
    /// Routes that do not opt in never see query parameters, even when the
    /// client sends them.
    pub fn with_query(mut self) -> Self {
        self.supports_query = true;
        self
    }

    /// Bypass JSON parsing and hand the handler raw bytes
    pub fn raw_body(mut self) -> Self {
        self.body_mode = BodyMode::Raw;
        self
    }

    /// Attach an existence guard keyed on the named path parameter
    pub fn guarded<F, Fut>(mut self, param: &'static str, lookup: F) -> Self
    where
        F: Fn(AppState, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, GatewayError>> + Send + 'static,
    {
        self.guard = Some(ExistenceGuard::new(param, lookup));
        self
    }

    /// Finish the route with its handler function
    pub fn handler<F, Fut>(self, handler: F) -> Route
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse, GatewayError>> + Send + 'static,
    {
        Route {
            method: self.method,
            path: self.path,
            status: self.status,
            supports_query: self.supports_query,
            body_mode: self.body_mode,
            guard: self.guard,
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        }
    }
}

/// Builds the versioned API router from registered routes
#[derive(Default)]
pub struct ApiBuilder {
    routes: Vec<Route>,
}

impl ApiBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single route
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Register a batch of routes
    pub fn routes(mut self, routes: Vec<Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Build the axum router with the version-negotiation layer applied
    ///
    /// Registered once at startup; the resulting table is read-only and safe
    /// for concurrent use by all workers.
    pub fn build(self, state: AppState) -> Router {
        let mut router = Router::new();
        for route in self.routes {
            let filter = route.method_filter();
            let path = route.path;
            let route = Arc::new(route);
            let endpoint = move |State(state): State<AppState>,
                                 params: RawPathParams,
                                 req: Request| {
                let route = route.clone();
                async move { dispatch(route, state, params, req).await }
            };
            router = router.route(path, on(filter, endpoint));
        }

        router
            .layer(middleware::from_fn_with_state(
                state.clone(),
                version::negotiate_version,
            ))
            .with_state(state)
    }
}

async fn dispatch(
    route: Arc<Route>,
    state: AppState,
    params: RawPathParams,
    req: Request,
) -> Response {
    match run_pipeline(&route, state, params, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn run_pipeline(
    route: &Route,
    state: AppState,
    params: RawPathParams,
    req: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = req.into_parts();

    let version = parts
        .extensions
        .get::<ApiVersion>()
        .copied()
        .unwrap_or(state.version_range().min);
    let force_json = parts.extensions.get::<JsonSuffix>().is_some();

    codec::resolve_media_type(&parts.headers, force_json)?;

    let auth = AuthContext::from_headers(&parts.headers);
    let params: HashMap<String, String> = params
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    let query = route
        .supports_query
        .then(|| codec::parse_query(parts.uri.query()));

    let body = if route.is_mutating() {
        // capped here as well, so the pipeline is safe without the server's
        // outer body-limit layer
        let limit = state.config().middleware.body_limit_mb * 1024 * 1024;
        let bytes = axum::body::to_bytes(body, limit)
            .await
            .map_err(|err| GatewayError::MalformedBody(err.to_string()))?;
        match route.body_mode {
            BodyMode::Json => RequestBody::Json(codec::decode_body(&bytes)?),
            BodyMode::Raw => RequestBody::Raw(bytes),
        }
    } else {
        RequestBody::None
    };

    if let Some(guard) = &route.guard {
        let id = params.get(guard.param()).cloned().ok_or_else(|| {
            GatewayError::Internal(format!(
                "route {} has no path parameter {}",
                route.path,
                guard.param()
            ))
        })?;
        guard.check(state.clone(), &id).await?;
    }

    let ctx = RequestContext {
        state,
        version,
        auth,
        params,
        query,
        body,
    };

    let reply = (route.handler)(ctx).await?;
    let status = reply.status.unwrap_or(route.status);
    codec::encode(reply.body, reply.extra, status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::Body;
    use tower::ServiceExt;

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_query_passthrough_is_opt_in() {
        let seen = Route::get("/seen")
            .with_query()
            .handler(|ctx: RequestContext| async move {
                let query = ctx.query.expect("opted-in route receives a query map");
                Ok(ApiResponse::resource("query", json!(query)))
            });
        let unseen = Route::get("/unseen").handler(|ctx: RequestContext| async move {
            assert!(ctx.query.is_none(), "non-opted route must not see the query");
            Ok(ApiResponse::resource("ok", json!(true)))
        });

        let app = ApiBuilder::new().route(seen).route(unseen).build(test_state());

        let response = app
            .clone()
            .oneshot(get("/seen?status=active"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/unseen?status=active")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_raw_body_mode_bypasses_json_parsing() {
        let route = Route::post("/uploads")
            .status(StatusCode::CREATED)
            .raw_body()
            .handler(|ctx: RequestContext| async move {
                let bytes = ctx.body.raw().expect("raw route receives bytes").clone();
                Ok(ApiResponse::resource("size", json!(bytes.len())))
            });
        let app = ApiBuilder::new().route(route).build(test_state());

        // deliberately not JSON
        let request = Request::builder()
            .method(Method::POST)
            .uri("/uploads")
            .body(Body::from(&b"\x00\x01binary"[..]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_status_resolution_override_beats_route_default() {
        let route = Route::post("/things").status(StatusCode::CREATED).handler(
            |_ctx: RequestContext| async move {
                Ok(ApiResponse::resource("thing", json!({})).with_status(StatusCode::ACCEPTED))
            },
        );
        let app = ApiBuilder::new().route(route).build(test_state());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/things")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_body_read_is_capped_by_configured_limit() {
        let route = Route::post("/things").handler(|_ctx: RequestContext| async move {
            Ok(ApiResponse::resource("thing", json!({})))
        });
        let app = ApiBuilder::new().route(route).build(test_state());

        // one byte over the default 2 MB limit
        let oversized = vec![b'x'; 2 * 1024 * 1024 + 1];
        let request = Request::builder()
            .method(Method::POST)
            .uri("/things")
            .body(Body::from(oversized))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_mutating_body_is_empty_object() {
        let route = Route::post("/things").handler(|ctx: RequestContext| async move {
            assert!(ctx.body.into_json().is_empty());
            Ok(ApiResponse::resource("thing", json!({})))
        });
        let app = ApiBuilder::new().route(route).build(test_state());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/things")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
