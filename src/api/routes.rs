//! Gateway HTTP endpoints.
//!
//! Thin adapter over [`Gateway`]: resolve the caller from the identity header,
//! decode the inputs, call the facade, render an [`Envelope`]. Error kinds map
//! to status codes in [`ApiError`].

use crate::configurator::{ConfigureRequest, ConfigureResult};
use crate::error::{ErrorKind, GatewayError};
use crate::gateway::{Envelope, Gateway};
use crate::identity::{IdentityResolver, TenantId};
use crate::model::{
    AccountFilter, Component, ComponentFilter, ComponentSummary, ComponentType, ConnectToken,
    ExternalAccount, ExternalApp, Page,
};
use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;


/// Shared application state for the gateway API
#[derive(Clone)]
pub struct GatewayAppState {
    pub gateway: Arc<Gateway>,
    pub identity: Arc<dyn IdentityResolver>,
}

/// Acknowledgement for delete endpoints
#[derive(Serialize, Debug, PartialEq)]
pub struct Deleted {
    pub id: String,
}

/// Query for GET /api/accounts/:id
#[derive(Deserialize, Default)]
pub struct AccountQuery {
    #[serde(default)]
    pub include_credentials: bool,
}

/// Body for POST /api/connect/tokens
#[derive(Deserialize, Default)]
pub struct TokenRequest {
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
}

/// Query for paginated catalog listings
#[derive(Deserialize, Default)]
pub struct CatalogQuery {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Create gateway API router
pub fn create_gateway_router(state: GatewayAppState) -> Router {
    Router::new()
        .route("/api/accounts", get(list_accounts))
        .route("/api/accounts/:id", get(get_account).delete(delete_account))
        .route("/api/apps", get(list_apps))
        .route("/api/apps/:app_id", get(get_app))
        .route("/api/apps/:app_id/accounts", delete(delete_accounts_for_app))
        .route("/api/connect/tokens", post(create_connect_token))
        .route("/api/components/configure", post(configure_component))
        .route("/api/components/:type", get(list_components))
        .route("/api/components/:type/:key", get(get_component))
        .route("/api/users/:user_id", delete(delete_external_user))
        .fallback(unknown_route)
        .with_state(Arc::new(state))
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

fn caller(state: &GatewayAppState, headers: &HeaderMap) -> Result<TenantId, ApiError> {
    Ok(state.identity.resolve(headers)?)
}

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope::ok(data)))
}

/// Decode an optional JSON body; an empty body yields `T::default()`.
fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError(GatewayError::invalid(format!("malformed request body: {}", e))))
}

fn component_type(raw: &str) -> Result<ComponentType, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError(GatewayError::invalid(e)))
}

/// GET /api/accounts - List the caller's accounts
async fn list_accounts(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    filter: Result<Query<AccountFilter>, QueryRejection>,
) -> ApiResult<Vec<ExternalAccount>> {
    let tenant = caller(&state, &headers)?;
    let Query(filter) = filter?;
    ok(state.gateway.list_accounts(&tenant, filter).await?)
}

/// GET /api/accounts/:id - Fetch one of the caller's accounts
async fn get_account(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    id: Result<Path<String>, PathRejection>,
    query: Result<Query<AccountQuery>, QueryRejection>,
) -> ApiResult<ExternalAccount> {
    let tenant = caller(&state, &headers)?;
    let (Path(id), Query(query)) = (id?, query?);
    ok(state
        .gateway
        .get_account(&tenant, &id, query.include_credentials)
        .await?)
}

/// DELETE /api/accounts/:id
async fn delete_account(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Deleted> {
    let tenant = caller(&state, &headers)?;
    let Path(id) = id?;
    state.gateway.delete_account(&tenant, &id).await?;
    ok(Deleted { id })
}

/// DELETE /api/apps/:app_id/accounts - Cascade delete
///
/// Responds 200 when every account was deleted and 207 with the full outcome
/// when some deletes failed.
async fn delete_accounts_for_app(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    app_id: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let tenant = caller(&state, &headers)?;
    let Path(app_id) = app_id?;
    let outcome = state
        .gateway
        .delete_accounts_for_app(&tenant, &app_id)
        .await?;

    let status = if outcome.is_partial() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    Ok((status, Json(Envelope::from_cascade(Ok(outcome)))).into_response())
}

/// POST /api/connect/tokens - Issue a connect token for the caller
async fn create_connect_token(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ConnectToken> {
    let tenant = caller(&state, &headers)?;
    let request: TokenRequest = json_body(&body)?;
    ok(state
        .gateway
        .create_connect_token(&tenant, request.allowed_origins)
        .await?)
}

/// GET /api/components/:type
async fn list_components(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    raw_type: Result<Path<String>, PathRejection>,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> ApiResult<Page<ComponentSummary>> {
    let tenant = caller(&state, &headers)?;
    let (Path(raw_type), Query(query)) = (raw_type?, query?);
    let component_type = component_type(&raw_type)?;
    let filter = ComponentFilter {
        app: query.app,
        q: query.q,
    };
    ok(state
        .gateway
        .list_components(
            &tenant,
            component_type,
            &filter,
            query.cursor.as_deref(),
            query.limit,
        )
        .await?)
}

/// GET /api/components/:type/:key
async fn get_component(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Component> {
    let tenant = caller(&state, &headers)?;
    let Path((raw_type, key)) = path?;
    let component_type = component_type(&raw_type)?;
    ok(state
        .gateway
        .get_component(&tenant, component_type, &key)
        .await?)
}

/// POST /api/components/configure - Resolve one prop
async fn configure_component(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ConfigureResult> {
    let tenant = caller(&state, &headers)?;
    let request: ConfigureRequest = json_body(&body)?;
    debug!(tenant = %tenant, prop = ?request.prop_name, "Configure request");
    ok(state.gateway.configure_component(&tenant, &request).await?)
}

/// GET /api/apps
async fn list_apps(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> ApiResult<Page<ExternalApp>> {
    let tenant = caller(&state, &headers)?;
    let Query(query) = query?;
    ok(state
        .gateway
        .list_apps(
            &tenant,
            query.q.as_deref(),
            query.cursor.as_deref(),
            query.limit,
        )
        .await?)
}

/// GET /api/apps/:app_id
async fn get_app(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    app_id: Result<Path<String>, PathRejection>,
) -> ApiResult<ExternalApp> {
    let tenant = caller(&state, &headers)?;
    let Path(app_id) = app_id?;
    ok(state.gateway.get_app(&tenant, &app_id).await?)
}

/// DELETE /api/users/:user_id - Remove the caller's platform user
async fn delete_external_user(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    user_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Deleted> {
    let tenant = caller(&state, &headers)?;
    let Path(user_id) = user_id?;
    state.gateway.delete_external_user(&tenant, &user_id).await?;
    ok(Deleted { id: user_id })
}

async fn unknown_route() -> ApiError {
    ApiError(GatewayError::not_found("no such endpoint"))
}

/// Gateway error rendered as an error envelope
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError(GatewayError::invalid(format!("malformed query: {}", e.body_text())))
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError(GatewayError::invalid(format!("malformed path: {}", e.body_text())))
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::MissingDependency => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::UpstreamError => StatusCode::BAD_GATEWAY,
        ErrorKind::PartialFailure => StatusCode::MULTI_STATUS,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "Request failed upstream");
        }
        (status, Json(Envelope::<()>::err(&self.0))).into_response()
    }
}
