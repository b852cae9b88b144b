//! HTTP route definitions and handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request, State,
    },
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};
use tracing::error;

use loadgraph_domain::error::DomainError;
use loadgraph_domain::model::{
    Deleted, NewPost, NewUser, Post, PostPatch, User, UserId, UserPatch,
};
use loadgraph_domain::mutation::{PostMutation, UserMutation};
use loadgraph_domain::resolver::{Overview, PostNode, Resolved, UserNode, UserPosts};
use loadgraph_server::config::{MetricsSettings, ServerSettings};
use loadgraph_server::MutationError;
use loadgraph_storage::DataStore;

use super::state::AppState;
use crate::middleware::{
    cors_layer, HttpMetricsLayer, RequestIdLayer, RequestLoggingLayer, RequestMetrics,
};
use crate::observability::{metrics_handler, MetricsState};

type SharedState<S> = Arc<AppState<S>>;

/// JSON body extractor that answers 400 `validation_error` instead of axum's
/// 422, and 413 when the body limit is hit.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(rejection.body_text())
    } else {
        ApiError::validation_error(rejection.body_text())
    }
}

/// Integer id taken from the single `:id` path parameter.
pub struct IdPath(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<i64>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| IdPath(id))
            .map_err(|rejection: PathRejection| {
                ApiError::validation_error(format!("invalid id: {}", rejection.body_text()))
            })
    }
}

/// Default request body size limit (1MB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Default time allowed to produce a response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Router settings taken from the server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    pub body_limit: usize,
    pub request_timeout: Duration,
    /// Path of the Prometheus endpoint; `None` disables it.
    pub metrics_path: Option<String>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            metrics_path: Some("/metrics".to_string()),
        }
    }
}

impl RouterOptions {
    pub fn from_settings(server: &ServerSettings, metrics: &MetricsSettings) -> Self {
        Self {
            request_timeout: Duration::from_secs(server.request_timeout_secs),
            metrics_path: metrics.enabled.then(|| metrics.path.clone()),
            ..Default::default()
        }
    }
}

fn api_routes<S: DataStore>() -> Router<SharedState<S>> {
    Router::new()
        .route("/hello", get(hello::<S>))
        .route("/overview", get(overview::<S>))
        .route("/users", get(list_users::<S>).post(create_user::<S>))
        .route(
            "/users/:id",
            get(get_user::<S>)
                .patch(update_user::<S>)
                .delete(delete_user::<S>),
        )
        .route("/posts", get(list_posts::<S>).post(create_post::<S>))
        .route("/posts/by-users", post(posts_by_users::<S>))
        .route(
            "/posts/:id",
            get(get_post::<S>)
                .patch(update_post::<S>)
                .delete(delete_post::<S>),
        )
        .route("/ready", get(readiness_check::<S>))
}

/// Creates the HTTP router with the API, health and readiness endpoints.
///
/// No middleware besides the default body size limit.
pub fn create_router<S: DataStore>(state: AppState<S>) -> Router {
    api_routes::<S>()
        .route("/health", get(health_check))
        .fallback(route_not_found)
        .with_state(Arc::new(state))
        .layer(RequestBodyLimitLayer::new(DEFAULT_BODY_LIMIT))
}

/// Creates the production router: API routes, `/health`, the metrics
/// endpoint and the full middleware stack.
///
/// Layer order, outermost first: CORS, request id, metrics, logging,
/// timeout, body limit.
pub fn create_router_with_observability<S: DataStore>(
    state: AppState<S>,
    metrics_state: MetricsState,
    options: RouterOptions,
) -> Router {
    let api_router = api_routes::<S>()
        .with_state(Arc::new(state))
        .layer(RequestBodyLimitLayer::new(options.body_limit));

    let mut observability_router = Router::new().route("/health", get(health_check));
    if let Some(path) = &options.metrics_path {
        observability_router = observability_router.route(path, get(metrics_handler));
    }

    api_router
        .merge(observability_router.with_state(metrics_state))
        .fallback(route_not_found)
        .layer(TimeoutLayer::new(options.request_timeout))
        .layer(RequestLoggingLayer::new())
        .layer(HttpMetricsLayer::new(Arc::new(RequestMetrics::new())))
        .layer(RequestIdLayer::new())
        .layer(cors_layer())
}

// ============================================================
// Error Handling
// ============================================================

/// Error codes and the HTTP status each one maps to.
pub mod error_codes {
    /// 400: malformed JSON, bad path parameter or failed validation.
    pub const VALIDATION_ERROR: &str = "validation_error";
    /// 404: the requested entity or route does not exist.
    pub const NOT_FOUND: &str = "not_found";
    /// 409: an insert collided with an existing id.
    pub const CONFLICT: &str = "conflict";
    /// 413: request body exceeds the size limit.
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    /// 500: unexpected internal error.
    pub const INTERNAL_ERROR: &str = "internal_error";
    /// 503: storage or a loader became unavailable.
    pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
}

/// API error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::VALIDATION_ERROR, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(error_codes::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(error_codes::CONFLICT, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(error_codes::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(error_codes::SERVICE_UNAVAILABLE, message)
    }

    pub fn status(&self) -> StatusCode {
        use error_codes::*;

        match self.code.as_str() {
            VALIDATION_ERROR => StatusCode::BAD_REQUEST,
            NOT_FOUND => StatusCode::NOT_FOUND,
            CONFLICT => StatusCode::CONFLICT,
            PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            SERVICE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::InvalidInput { field, message } => {
                ApiError::validation_error(format!("{field}: {message}"))
            }
            DomainError::DuplicateEntity { .. } => ApiError::conflict(err.to_string()),
            // Details stay in the logs; clients get a sanitized message.
            DomainError::StorageOperationFailed { reason } => {
                error!(reason = %reason, "storage operation failed");
                ApiError::internal_error("internal storage error")
            }
            DomainError::LoaderContractViolation { loader, message } => {
                error!(loader = %loader, message = %message, "loader contract violated");
                ApiError::internal_error("internal error while resolving query")
            }
            DomainError::LoaderUnavailable { loader, message } => {
                error!(loader = %loader, message = %message, "loader unavailable");
                ApiError::service_unavailable("query resolution was interrupted")
            }
        }
    }
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::InvalidInput { field, message } => {
                ApiError::validation_error(format!("{field}: {message}"))
            }
            MutationError::Domain(err) => err.into(),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn route_not_found() -> ApiError {
    ApiError::not_found("no such route")
}

// ============================================================
// Health and Readiness Checks
// ============================================================

/// Liveness probe. Does not touch storage.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness probe: 200 when the storage health check passes, 503 otherwise.
async fn readiness_check<S: DataStore>(State(state): State<SharedState<S>>) -> impl IntoResponse {
    match state.storage.health_check().await {
        Ok(health) if health.healthy => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "checks": {
                    "storage": {
                        "backend": health.backend,
                        "latency_ms": health.latency.as_millis() as u64,
                    }
                }
            })),
        ),
        Ok(health) => {
            error!(backend = health.backend, "readiness check failed: storage unhealthy");
            not_ready()
        }
        Err(e) => {
            error!("readiness check failed: {}", e);
            not_ready()
        }
    }
}

fn not_ready() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "status": "not_ready",
            "checks": { "storage": "unavailable" }
        })),
    )
}

// ============================================================
// Queries
// ============================================================

async fn hello<S: DataStore>(State(state): State<SharedState<S>>) -> Json<Resolved<&'static str>> {
    Json(Resolved::new(state.queries.hello(), Vec::new()))
}

async fn list_users<S: DataStore>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<Resolved<Vec<UserNode>>>> {
    Ok(Json(state.queries.users().await?))
}

async fn get_user<S: DataStore>(
    State(state): State<SharedState<S>>,
    IdPath(id): IdPath,
) -> ApiResult<Json<Resolved<UserNode>>> {
    let Resolved { data, errors } = state.queries.user(id).await?;
    let node = data.ok_or_else(|| ApiError::not_found(format!("user {id} not found")))?;
    Ok(Json(Resolved::new(node, errors)))
}

async fn list_posts<S: DataStore>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<Resolved<Vec<PostNode>>>> {
    Ok(Json(state.queries.posts().await?))
}

async fn get_post<S: DataStore>(
    State(state): State<SharedState<S>>,
    IdPath(id): IdPath,
) -> ApiResult<Json<Resolved<PostNode>>> {
    let Resolved { data, errors } = state.queries.post(id).await?;
    let node = data.ok_or_else(|| ApiError::not_found(format!("post {id} not found")))?;
    Ok(Json(Resolved::new(node, errors)))
}

/// Request body of `POST /posts/by-users`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostsByUsersBody {
    pub user_ids: Vec<UserId>,
}

async fn posts_by_users<S: DataStore>(
    State(state): State<SharedState<S>>,
    JsonBody(body): JsonBody<PostsByUsersBody>,
) -> ApiResult<Json<Resolved<Vec<UserPosts>>>> {
    Ok(Json(state.queries.posts_for_users(body.user_ids).await?))
}

async fn overview<S: DataStore>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<Resolved<Overview>>> {
    Ok(Json(state.queries.overview().await?))
}

// ============================================================
// Mutations
// ============================================================

async fn create_user<S: DataStore>(
    State(state): State<SharedState<S>>,
    JsonBody(input): JsonBody<NewUser>,
) -> ApiResult<Json<UserMutation<User>>> {
    Ok(Json(state.mutations.create_user(input).await?))
}

async fn update_user<S: DataStore>(
    State(state): State<SharedState<S>>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<Json<UserMutation<User>>> {
    Ok(Json(state.mutations.update_user(id, patch).await?))
}

async fn delete_user<S: DataStore>(
    State(state): State<SharedState<S>>,
    IdPath(id): IdPath,
) -> ApiResult<Json<UserMutation<Deleted>>> {
    Ok(Json(state.mutations.delete_user(id).await?))
}

async fn create_post<S: DataStore>(
    State(state): State<SharedState<S>>,
    JsonBody(input): JsonBody<NewPost>,
) -> ApiResult<Json<PostMutation<Post>>> {
    Ok(Json(state.mutations.create_post(input).await?))
}

async fn update_post<S: DataStore>(
    State(state): State<SharedState<S>>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<PostPatch>,
) -> ApiResult<Json<PostMutation<Post>>> {
    Ok(Json(state.mutations.update_post(id, patch).await?))
}

async fn delete_post<S: DataStore>(
    State(state): State<SharedState<S>>,
    IdPath(id): IdPath,
) -> ApiResult<Json<PostMutation<Deleted>>> {
    Ok(Json(state.mutations.delete_post(id).await?))
}
